//! Route composition and mounting.

pub mod api;
pub mod common;
pub mod compose;
pub mod resource;

pub use api::ApiBuilder;
pub use common::common_routes;
pub use compose::{compile, HandlerRef, RouteEntry, RouteTable};
pub use resource::{mount, resource_routes, to_axum_path};
