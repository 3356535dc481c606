//! HTTP handlers for resource CRUD and relation sub-paths.

pub mod resource;
pub use resource::*;
