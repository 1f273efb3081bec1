//! User service - Handles user-related business logic.
//!
//! Orchestrates the user repository and the password hasher. Both
//! collaborators are injected as trait objects so tests can swap them.

use async_trait::async_trait;
use chrono::{Duration, Utc};
use std::sync::Arc;
use uuid::Uuid;

use crate::config::VERIFICATION_CODE_TTL_MINUTES;
use crate::domain::{
    parse_record_id, CreateUser, CreatedUser, DeleteOutcome, NewUser, PasswordHasher,
    UpdateOutcome, User, UserChanges, UserProfile, UserQuery, VerificationCode,
};
use crate::errors::{AppError, AppResult};
use crate::infra::UserRepository;
use crate::types::{PageRequest, Paginated};

#[cfg(any(test, feature = "test-utils"))]
use mockall::automock;

/// User service trait for dependency injection.
#[cfg_attr(any(test, feature = "test-utils"), automock)]
#[async_trait]
pub trait UserService: Send + Sync {
    /// Create a user; fails with `DuplicateEmail` when the email is taken
    async fn create(&self, input: CreateUser) -> AppResult<CreatedUser>;

    /// Self-service sign-up; like `create` plus a verification code
    async fn register(&self, input: CreateUser) -> AppResult<CreatedUser>;

    /// Filtered page of users; `raw_query` is the URL query string
    async fn list(&self, raw_query: &str, page: PageRequest) -> AppResult<Paginated<UserProfile>>;

    /// User without password, or `None`
    async fn get_by_id(&self, id: Uuid) -> AppResult<Option<UserProfile>>;

    /// Full record including the password hash, or `None`
    async fn get_by_email(&self, email: &str) -> AppResult<Option<User>>;

    /// Overwrite the given fields of one user
    async fn update(&self, id: Uuid, changes: UserChanges) -> AppResult<UpdateOutcome>;

    /// Delete by textual id; zero matches is not an error
    async fn remove(&self, id: &str) -> AppResult<DeleteOutcome>;

    /// Full record when `email` exists and `password` matches its hash
    async fn verify_credentials(&self, email: &str, password: &str) -> AppResult<Option<User>>;
}

/// Concrete implementation of UserService.
pub struct UserManager {
    users: Arc<dyn UserRepository>,
    hasher: Arc<dyn PasswordHasher>,
}

impl UserManager {
    /// Create new user service instance
    pub fn new(users: Arc<dyn UserRepository>, hasher: Arc<dyn PasswordHasher>) -> Self {
        Self { users, hasher }
    }

    async fn insert_user(
        &self,
        input: CreateUser,
        verification: Option<VerificationCode>,
    ) -> AppResult<CreatedUser> {
        if self.users.exists_by_email(&input.email).await? {
            tracing::debug!(email = %input.email, "Email already registered");
            return Err(AppError::DuplicateEmail);
        }

        let password_hash = self.hasher.hash(&input.password).await?;

        let user = self
            .users
            .insert(NewUser {
                name: input.name,
                email: input.email,
                password_hash,
                phone: input.phone,
                address: input.address,
                image: input.image,
                verification,
            })
            .await?;

        tracing::info!(user_id = %user.id, "User created");
        Ok(CreatedUser { id: user.id })
    }
}

#[async_trait]
impl UserService for UserManager {
    async fn create(&self, input: CreateUser) -> AppResult<CreatedUser> {
        self.insert_user(input, None).await
    }

    async fn register(&self, input: CreateUser) -> AppResult<CreatedUser> {
        let code = VerificationCode::issue(
            Utc::now(),
            Duration::minutes(VERIFICATION_CODE_TTL_MINUTES),
        );
        self.insert_user(input, Some(code)).await
    }

    async fn list(&self, raw_query: &str, page: PageRequest) -> AppResult<Paginated<UserProfile>> {
        page.ensure_in_range()?;
        let query = UserQuery::parse(raw_query)?;

        let total = self.users.count(&query).await?;
        let records = self
            .users
            .find(&query, page.offset(), page.page_size())
            .await?;

        tracing::debug!(
            total,
            current = page.current(),
            page_size = page.page_size(),
            "Listed users"
        );
        Ok(Paginated::new(records, page, total))
    }

    async fn get_by_id(&self, id: Uuid) -> AppResult<Option<UserProfile>> {
        self.users.find_by_id(id).await
    }

    async fn get_by_email(&self, email: &str) -> AppResult<Option<User>> {
        self.users.find_by_email(email).await
    }

    async fn update(&self, id: Uuid, changes: UserChanges) -> AppResult<UpdateOutcome> {
        let matched_count = self.users.update_by_id(id, changes).await?;
        if matched_count == 0 {
            tracing::debug!(user_id = %id, "Update matched no user");
        }
        Ok(UpdateOutcome { matched_count })
    }

    async fn remove(&self, id: &str) -> AppResult<DeleteOutcome> {
        let id = parse_record_id(id)?;
        let deleted_count = self.users.delete_by_id(id).await?;
        if deleted_count > 0 {
            tracing::info!(user_id = %id, "User deleted");
        }
        Ok(DeleteOutcome { deleted_count })
    }

    async fn verify_credentials(&self, email: &str, password: &str) -> AppResult<Option<User>> {
        let Some(user) = self.users.find_by_email(email).await? else {
            return Ok(None);
        };

        if self.hasher.verify(password, &user.password_hash).await? {
            Ok(Some(user))
        } else {
            Ok(None)
        }
    }
}
