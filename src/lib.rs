//! Users API - user management service
//!
//! Create, register, list, fetch, update and delete users stored in
//! PostgreSQL, with salted password hashing and a query-string filter
//! language for listing.
//!
//! # Architecture Layers
//!
//! - **cli**: Command-line interface
//! - **commands**: CLI command implementations
//! - **config**: Application configuration and constants
//! - **domain**: User model, DTOs, password hashing, list-query parsing
//! - **services**: Application use cases
//! - **infra**: Database connection, migrations, repositories
//! - **api**: HTTP handlers and routes
//! - **types**: Shared types (pagination, responses)
//! - **errors**: Centralized error handling
//!
//! # CLI Usage
//!
//! ```bash
//! # Start the server
//! cargo run -- serve
//!
//! # Run migrations
//! cargo run -- migrate up
//! ```

pub mod api;
pub mod cli;
pub mod commands;
pub mod config;
pub mod domain;
pub mod errors;
pub mod infra;
pub mod services;
pub mod types;

// Re-export commonly used types at crate root
pub use api::AppState;
pub use config::Config;
pub use domain::{User, UserProfile};
pub use errors::{AppError, AppResult};
