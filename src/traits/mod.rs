pub mod poster;
pub mod text_generator;
