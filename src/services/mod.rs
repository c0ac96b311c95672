pub mod ai_generator;
pub mod feed;
pub mod generator;
pub mod images;
pub mod keywords;
pub mod pipeline;
pub mod publisher;
pub mod schedule;
pub mod settings;
