pub mod content;
pub mod progress;
pub mod settings;
pub mod user;
