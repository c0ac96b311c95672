pub mod types;

pub use types::{Article, ArticleLink, PostText, PublishOutcome, TickOutcome};
