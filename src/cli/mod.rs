pub mod banner;
pub mod color;
pub mod highlighter;
pub mod prompt;
pub mod tony;
