//! OpenAPI documentation configuration.
//!
//! Provides Swagger UI for API exploration and testing.

use utoipa::OpenApi;

use crate::api::handlers::{auth_handler, user_handler};
use crate::domain::{CreateUser, CreatedUser, DeleteOutcome, UpdateOutcome, UpdateUser, UserProfile};
use crate::types::PaginationMeta;

/// OpenAPI documentation for the Users API
#[derive(OpenApi)]
#[openapi(
    info(
        title = "Users API",
        version = "0.1.0",
        description = "User management service: CRUD, registration and filtered listing"
    ),
    servers(
        (url = "http://localhost:8080", description = "Local development server")
    ),
    paths(
        // Authentication endpoints
        auth_handler::register,
        // User endpoints
        user_handler::create_user,
        user_handler::list_users,
        user_handler::get_user,
        user_handler::update_user,
        user_handler::delete_user,
    ),
    components(
        schemas(
            CreateUser,
            UpdateUser,
            UserProfile,
            CreatedUser,
            UpdateOutcome,
            DeleteOutcome,
            PaginationMeta,
        )
    ),
    tags(
        (name = "Authentication", description = "User registration"),
        (name = "Users", description = "User management operations")
    )
)]
pub struct ApiDoc;
