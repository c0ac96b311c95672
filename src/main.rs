use clap::{Parser, ValueEnum};
use dotenv::dotenv;
use feedposter::{RunOptions, run};

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
enum Mode {
    /// Post once right now and exit
    Test,
}

/// feedposter - posts AI-written teasers for fresh news to Mastodon on a daily schedule
#[derive(Parser, Debug)]
#[command(version, about, long_about = None)]
struct Args {
    /// `test` runs the pipeline once; without it the scheduler runs forever
    #[arg(value_enum)]
    mode: Option<Mode>,

    /// Path to the configuration file
    #[arg(short, long, default_value = "config.yaml")]
    config: String,

    /// Keyword file, overrides `keywords_path` from the config
    #[arg(short, long)]
    keywords: Option<String>,

    /// Also write logs to a daily rolling file in this directory
    #[arg(long)]
    log_dir: Option<String>,
}

#[tokio::main]
async fn main() -> std::io::Result<()> {
    // Load environment variables from `.env` file into std::env (optional)
    dotenv().ok();

    let args = Args::parse();

    run(RunOptions {
        config_path: args.config,
        keywords_path: args.keywords,
        log_dir: args.log_dir,
        immediate: args.mode == Some(Mode::Test),
    })
    .await
}
