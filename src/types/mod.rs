//! Shared types for DRY compliance.

mod pagination;
mod response;

pub use pagination::{PageRequest, Paginated, PaginationMeta};
pub use response::{ApiResponse, Created};
