pub mod mastodon;
pub mod utils;

pub use mastodon::MastodonPoster;
pub use crate::traits::poster::Poster;
