//! Request extractors shared by resource handlers.

pub mod page;
pub mod principal;

pub use page::PageQuery;
pub use principal::{Principal, PRINCIPAL_HEADER};
