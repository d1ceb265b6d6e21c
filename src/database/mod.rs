pub mod recorder;
pub mod repo;
pub mod schema;
