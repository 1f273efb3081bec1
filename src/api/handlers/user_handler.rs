//! User management handlers.

use axum::{
    extract::{rejection::QueryRejection, Path, Query, RawQuery, State},
    response::Json,
    routing::{get, post},
    Router,
};

use crate::api::extractors::ValidatedJson;
use crate::api::AppState;
use crate::domain::{
    parse_record_id, CreateUser, CreatedUser, DeleteOutcome, UpdateOutcome, UpdateUser,
    UserProfile,
};
use crate::errors::{AppError, AppResult, OptionExt};
use crate::types::{Created, PageRequest, Paginated};

/// Create user routes
pub fn user_routes() -> Router<AppState> {
    Router::new()
        .route("/", post(create_user).get(list_users).patch(update_user))
        .route("/:id", get(get_user).delete(delete_user))
}

/// Create a user
#[utoipa::path(
    post,
    path = "/api/v1/users",
    tag = "Users",
    request_body = CreateUser,
    responses(
        (status = 201, description = "User created", body = CreatedUser),
        (status = 400, description = "Validation error"),
        (status = 409, description = "Email already in use")
    )
)]
pub async fn create_user(
    State(state): State<AppState>,
    ValidatedJson(payload): ValidatedJson<CreateUser>,
) -> AppResult<Created<CreatedUser>> {
    let created = state.user_service.create(payload).await?;
    Ok(Created(created))
}

/// List users with filtering, sorting and pagination
///
/// Every query key other than `current`, `pageSize` and `sort` is a filter,
/// e.g. `name=/^ng/i`, `createdAt>=2024-01-01`, `email=a@x.com,b@x.com`.
#[utoipa::path(
    get,
    path = "/api/v1/users",
    tag = "Users",
    params(
        ("current" = Option<u64>, Query, description = "Page number, starting at 1"),
        ("pageSize" = Option<u64>, Query, description = "Records per page"),
        ("sort" = Option<String>, Query, description = "Comma-separated fields, `-` for descending")
    ),
    responses(
        (status = 200, description = "Page of users"),
        (status = 400, description = "Invalid filter or sort")
    )
)]
pub async fn list_users(
    State(state): State<AppState>,
    RawQuery(raw_query): RawQuery,
    page: Result<Query<PageRequest>, QueryRejection>,
) -> AppResult<Json<Paginated<UserProfile>>> {
    let Query(page) = page.map_err(|e| AppError::validation(e.body_text()))?;

    let users = state
        .user_service
        .list(raw_query.as_deref().unwrap_or_default(), page)
        .await?;

    Ok(Json(users))
}

/// Get user by ID
#[utoipa::path(
    get,
    path = "/api/v1/users/{id}",
    tag = "Users",
    params(("id" = String, Path, description = "User ID")),
    responses(
        (status = 200, description = "User found", body = UserProfile),
        (status = 400, description = "Malformed ID"),
        (status = 404, description = "User not found")
    )
)]
pub async fn get_user(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> AppResult<Json<UserProfile>> {
    let id = parse_record_id(&id)?;
    let user = state.user_service.get_by_id(id).await?.ok_or_not_found()?;
    Ok(Json(user))
}

/// Update user fields; the body selects the user with `_id`
#[utoipa::path(
    patch,
    path = "/api/v1/users",
    tag = "Users",
    request_body = UpdateUser,
    responses(
        (status = 200, description = "Update applied", body = UpdateOutcome),
        (status = 400, description = "Validation error")
    )
)]
pub async fn update_user(
    State(state): State<AppState>,
    ValidatedJson(payload): ValidatedJson<UpdateUser>,
) -> AppResult<Json<UpdateOutcome>> {
    let (id, changes) = payload.into_parts()?;
    let outcome = state.user_service.update(id, changes).await?;
    Ok(Json(outcome))
}

/// Delete user
#[utoipa::path(
    delete,
    path = "/api/v1/users/{id}",
    tag = "Users",
    params(("id" = String, Path, description = "User ID")),
    responses(
        (status = 200, description = "Delete outcome", body = DeleteOutcome),
        (status = 400, description = "Malformed ID")
    )
)]
pub async fn delete_user(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> AppResult<Json<DeleteOutcome>> {
    let outcome = state.user_service.remove(&id).await?;
    Ok(Json(outcome))
}
