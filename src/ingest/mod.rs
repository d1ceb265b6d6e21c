pub mod content_dir;
pub mod scheduler;
pub mod source;
