pub mod models;
pub mod publishers;
pub mod services;
pub mod subsystems;
pub mod traits;

use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

use tokio_graceful_shutdown::{SubsystemBuilder, Toplevel};
use tracing::{error, info, warn};
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::EnvFilter;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;

use crate::publishers::mastodon::{MastodonPoster, ensure_mastodon_token, load_token_from_secrets};
use crate::services::ai_generator::AiLibGenerator;
use crate::services::feed::FeedClient;
use crate::services::generator::ContentGenerator;
use crate::services::images::ImageResolver;
use crate::services::keywords::KeywordSet;
use crate::services::pipeline::Pipeline;
use crate::services::publisher::Publisher;
use crate::services::schedule::{format_slot, slot_times};
use crate::services::settings::{AppConfig, load_config};
use crate::subsystems::scheduler::SchedulerSubsystem;
use crate::traits::poster::Poster;
use crate::traits::text_generator::TextGenerator;

/// Timeout for article page and image downloads.
pub const PAGE_TIMEOUT: Duration = Duration::from_secs(10);

/// How the process was invoked.
#[derive(Debug, Clone, Default)]
pub struct RunOptions {
    pub config_path: String,
    pub keywords_path: Option<String>,
    pub log_dir: Option<String>,
    /// Run the pipeline once and exit instead of scheduling.
    pub immediate: bool,
}

/// Structured logging: `RUST_LOG` (default `info`) to stderr, plus a daily
/// rolling file when `log_dir` is set. Keep the guard alive for the process
/// lifetime or buffered file lines are lost.
pub fn init_logging(log_dir: Option<&str>) -> Option<WorkerGuard> {
    let log_spec = std::env::var("RUST_LOG").unwrap_or_else(|_| "info".to_string());
    let console = tracing_subscriber::fmt::layer().with_target(false).compact();
    match log_dir {
        Some(dir) => {
            let appender = tracing_appender::rolling::daily(dir, "feedposter.log");
            let (writer, guard) = tracing_appender::non_blocking(appender);
            let file = tracing_subscriber::fmt::layer()
                .with_target(false)
                .with_ansi(false)
                .with_writer(writer);
            let _ = tracing_subscriber::registry()
                .with(EnvFilter::new(log_spec))
                .with(console)
                .with(file)
                .try_init();
            Some(guard)
        }
        None => {
            let _ = tracing_subscriber::registry()
                .with(EnvFilter::new(log_spec))
                .with(console)
                .try_init();
            None
        }
    }
}

/// High-level entrypoint: init logging, load config and keywords, run.
pub async fn run(opts: RunOptions) -> std::io::Result<()> {
    let _guard = init_logging(opts.log_dir.as_deref());

    let cfg = load_config(&opts.config_path);
    let keywords_path = opts.keywords_path.clone().unwrap_or_else(|| cfg.keywords_path.clone());
    let keywords = KeywordSet::load(&keywords_path);

    let generator: Arc<dyn TextGenerator> = Arc::new(AiLibGenerator::from_config(&cfg.llm));
    let poster = build_poster(&cfg).await?;
    let pipeline = build_pipeline(&cfg, keywords, generator, poster)?;

    if opts.immediate {
        run_once(&pipeline).await
    } else {
        run_scheduler(&cfg, pipeline).await
    }
}

/// Resolves the Mastodon token: `MASTODON_ACCESS_TOKEN`, config, saved
/// secrets, then interactive login when `login_cli` is on. Live mode without a
/// token is a startup error; dry runs do not need one.
pub async fn build_poster(cfg: &AppConfig) -> std::io::Result<Option<Arc<dyn Poster>>> {
    let m = &cfg.mastodon;
    let base_url = std::env::var("MASTODON_BASE_URL")
        .ok()
        .filter(|s| !s.trim().is_empty())
        .unwrap_or_else(|| m.base_url.clone());

    let mut token = std::env::var("MASTODON_ACCESS_TOKEN")
        .ok()
        .or_else(|| m.access_token.clone())
        .filter(|t| !t.trim().is_empty());

    if token.is_none() {
        let secrets = Path::new(&m.secrets_path);
        token = match load_token_from_secrets(secrets) {
            Ok(t) => t,
            Err(e) => {
                warn!(path = %secrets.display(), error = %e, "mastodon secrets unreadable");
                None
            }
        };
        if token.is_none() && m.login_cli {
            match ensure_mastodon_token(&base_url, secrets).await {
                Ok(t) => token = Some(t),
                Err(e) => {
                    error!(error = %e, "mastodon login_cli failed");
                    return Err(std::io::Error::new(
                        std::io::ErrorKind::PermissionDenied,
                        format!("mastodon login failed: {}", e),
                    ));
                }
            }
        }
    }

    match token {
        Some(token) => {
            let poster = MastodonPoster::builder()
                .base_url(base_url)
                .access_token(token)
                .maybe_visibility(m.visibility.clone())
                .maybe_language(m.language.clone())
                .maybe_max_chars(m.max_chars)
                .build();
            Ok(Some(Arc::new(poster)))
        }
        None if cfg.dry_run => {
            info!("no mastodon token; dry run only");
            Ok(None)
        }
        None => Err(std::io::Error::new(
            std::io::ErrorKind::InvalidInput,
            "live posting needs a Mastodon token: set MASTODON_ACCESS_TOKEN, mastodon.access_token, or mastodon.login_cli: true",
        )),
    }
}

pub fn build_pipeline(
    cfg: &AppConfig,
    keywords: KeywordSet,
    generator: Arc<dyn TextGenerator>,
    poster: Option<Arc<dyn Poster>>,
) -> std::io::Result<Pipeline> {
    let feed = FeedClient::builder()
        .sources(cfg.sources.clone())
        .keywords(Arc::new(keywords))
        .timeout(Duration::from_secs(cfg.request_timeout_secs))
        .maybe_seed(cfg.feed_seed)
        .build()
        .map_err(std::io::Error::other)?;
    let images = ImageResolver::builder()
        .images_dir(&cfg.images_dir)
        .timeout(PAGE_TIMEOUT)
        .build()
        .map_err(std::io::Error::other)?;
    let generator = ContentGenerator::builder()
        .generator(generator)
        .template(cfg.custom_prompt.clone())
        .maybe_preview_chars(cfg.llm.log_prompt_preview_chars)
        .build();

    Ok(Pipeline::builder()
        .feed(feed)
        .images(images)
        .generator(generator)
        .publisher(Publisher::new(poster))
        .dry_run(cfg.dry_run)
        .build())
}

/// Immediate mode: one synchronous tick; any error ends the process non-zero.
pub async fn run_once(pipeline: &Pipeline) -> std::io::Result<()> {
    info!("running immediate test post");
    let outcome = pipeline.run_tick().await.map_err(std::io::Error::other)?;
    info!(outcome = %outcome, "immediate run finished");
    Ok(())
}

/// Continuous mode under graceful shutdown (Ctrl-C / SIGTERM).
pub async fn run_scheduler(cfg: &AppConfig, pipeline: Pipeline) -> std::io::Result<()> {
    let slots = slot_times(cfg.effective_posts_per_day(), cfg.base_hour);
    for s in &slots {
        info!(at = %format_slot(s), "scheduled post");
    }
    let subsystem = SchedulerSubsystem::builder()
        .pipeline(Arc::new(pipeline))
        .slots(slots)
        .poll_interval(Duration::from_secs(cfg.poll_interval_secs.max(1)))
        .build();

    info!("scheduler started");
    Toplevel::new(move |s| async move {
        s.start(SubsystemBuilder::new("scheduler", move |h| subsystem.run(h)));
    })
    .catch_signals()
    .handle_shutdown_requests(Duration::from_secs(5))
    .await
    .map_err(std::io::Error::other)
}
