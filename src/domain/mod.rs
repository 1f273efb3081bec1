//! Domain layer - Core business entities and logic
//!
//! This module contains the user model, the inbound DTOs with their
//! validation rules, password hashing and list-query translation.
//! Nothing here knows about the database or HTTP.

pub mod password;
pub mod query;
pub mod user;

pub use password::{Argon2Hasher, PasswordHasher};
pub use query::{FieldFilter, FilterValue, Predicate, SortDirection, SortKey, UserField, UserQuery};
pub use user::{
    parse_record_id, CreateUser, CreatedUser, DeleteOutcome, NewUser, UpdateOutcome, UpdateUser,
    User, UserChanges, UserProfile, VerificationCode,
};

#[cfg(any(test, feature = "test-utils"))]
pub use password::MockPasswordHasher;
