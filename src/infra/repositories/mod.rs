//! Repository layer - Data access abstraction
//!
//! Services talk to [`UserRepository`]; [`UserStore`] is the SeaORM
//! implementation used at runtime.

pub(crate) mod entities;
mod user_repository;

pub use user_repository::{UserRepository, UserStore};

// Export mock for tests (both unit and integration)
#[cfg(any(test, feature = "test-utils"))]
pub use user_repository::MockUserRepository;
