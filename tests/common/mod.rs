//! Shared fixtures for integration tests.

#![allow(dead_code)]

use std::cmp::Ordering;
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use chrono::Utc;
use uuid::Uuid;

use users_api::config::HashingConfig;
use users_api::domain::{
    Argon2Hasher, CreateUser, FilterValue, NewUser, Predicate, SortDirection, User, UserChanges,
    UserField, UserProfile, UserQuery,
};
use users_api::errors::{AppError, AppResult};
use users_api::infra::UserRepository;
use users_api::services::UserManager;

/// In-memory user store; the email uniqueness check mirrors the unique index.
#[derive(Default)]
pub struct InMemoryUserStore {
    users: Mutex<Vec<User>>,
}

impl InMemoryUserStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn matching(&self, query: &UserQuery) -> AppResult<Vec<User>> {
        let users = self.users.lock().unwrap();
        let mut matched = Vec::new();
        for user in users.iter() {
            if matches_all(user, query)? {
                matched.push(user.clone());
            }
        }
        Ok(matched)
    }
}

#[async_trait]
impl UserRepository for InMemoryUserStore {
    async fn exists_by_email(&self, email: &str) -> AppResult<bool> {
        Ok(self.users.lock().unwrap().iter().any(|u| u.email == email))
    }

    async fn insert(&self, new_user: NewUser) -> AppResult<User> {
        let mut users = self.users.lock().unwrap();
        if users.iter().any(|u| u.email == new_user.email) {
            return Err(AppError::DuplicateEmail);
        }

        let now = Utc::now();
        let user = User {
            id: Uuid::new_v4(),
            name: new_user.name,
            email: new_user.email,
            password_hash: new_user.password_hash,
            phone: new_user.phone,
            address: new_user.address,
            image: new_user.image,
            code_id: new_user.verification.as_ref().map(|c| c.code_id),
            code_expired: new_user.verification.as_ref().map(|c| c.expires_at),
            created_at: now,
            updated_at: now,
        };
        users.push(user.clone());
        Ok(user)
    }

    async fn find_by_id(&self, id: Uuid) -> AppResult<Option<UserProfile>> {
        let users = self.users.lock().unwrap();
        Ok(users
            .iter()
            .find(|u| u.id == id)
            .cloned()
            .map(User::into_profile))
    }

    async fn find_by_email(&self, email: &str) -> AppResult<Option<User>> {
        let users = self.users.lock().unwrap();
        Ok(users.iter().find(|u| u.email == email).cloned())
    }

    async fn find(
        &self,
        query: &UserQuery,
        skip: u64,
        limit: u64,
    ) -> AppResult<Vec<UserProfile>> {
        let mut matched = self.matching(query)?;

        // Vec order is insertion order, which stands in for created_at
        matched.sort_by(|a, b| {
            query
                .sort
                .iter()
                .map(|key| {
                    let ord = field_value(a, key.field).cmp(&field_value(b, key.field));
                    match key.direction {
                        SortDirection::Asc => ord,
                        SortDirection::Desc => ord.reverse(),
                    }
                })
                .find(|ord| *ord != Ordering::Equal)
                .unwrap_or(Ordering::Equal)
        });

        Ok(matched
            .into_iter()
            .skip(skip as usize)
            .take(limit as usize)
            .map(User::into_profile)
            .collect())
    }

    async fn count(&self, query: &UserQuery) -> AppResult<u64> {
        Ok(self.matching(query)?.len() as u64)
    }

    async fn update_by_id(&self, id: Uuid, changes: UserChanges) -> AppResult<u64> {
        let mut users = self.users.lock().unwrap();
        let Some(user) = users.iter_mut().find(|u| u.id == id) else {
            return Ok(0);
        };

        if let Some(name) = changes.name {
            user.name = name;
        }
        if let Some(phone) = changes.phone {
            user.phone = Some(phone);
        }
        if let Some(address) = changes.address {
            user.address = Some(address);
        }
        if let Some(image) = changes.image {
            user.image = Some(image);
        }
        user.updated_at = Utc::now();
        Ok(1)
    }

    async fn delete_by_id(&self, id: Uuid) -> AppResult<u64> {
        let mut users = self.users.lock().unwrap();
        let before = users.len();
        users.retain(|u| u.id != id);
        Ok((before - users.len()) as u64)
    }
}

fn field_value(user: &User, field: UserField) -> Option<String> {
    match field {
        UserField::Id => Some(user.id.to_string()),
        UserField::Name => Some(user.name.clone()),
        UserField::Email => Some(user.email.clone()),
        UserField::Phone => user.phone.clone(),
        UserField::Address => user.address.clone(),
        UserField::Image => user.image.clone(),
        UserField::CodeId => user.code_id.map(|id| id.to_string()),
        UserField::CodeExpired => user.code_expired.map(|t| t.to_rfc3339()),
        UserField::CreatedAt => Some(user.created_at.to_rfc3339()),
        UserField::UpdatedAt => Some(user.updated_at.to_rfc3339()),
    }
}

fn filter_value(value: &FilterValue) -> Option<String> {
    match value {
        FilterValue::Text(text) => Some(text.clone()),
        FilterValue::Id(id) => Some(id.to_string()),
        FilterValue::Timestamp(ts) => Some(ts.to_rfc3339()),
        FilterValue::Null => None,
    }
}

fn matches_all(user: &User, query: &UserQuery) -> AppResult<bool> {
    for filter in &query.filters {
        let actual = field_value(user, filter.field);
        let hit = match &filter.predicate {
            Predicate::Eq(v) => actual == filter_value(v),
            Predicate::Ne(v) => actual != filter_value(v),
            Predicate::Gt(v) => actual.is_some() && actual > filter_value(v),
            Predicate::Gte(v) => actual.is_some() && actual >= filter_value(v),
            Predicate::Lt(v) => actual.is_some() && actual < filter_value(v),
            Predicate::Lte(v) => actual.is_some() && actual <= filter_value(v),
            Predicate::In(values) => values.iter().any(|v| actual == filter_value(v)),
            Predicate::NotIn(values) => values.iter().all(|v| actual != filter_value(v)),
            Predicate::Exists(present) => actual.is_some() == *present,
            Predicate::Matches {
                pattern,
                case_insensitive,
            } => {
                let re = regex::RegexBuilder::new(pattern)
                    .case_insensitive(*case_insensitive)
                    .build()
                    .map_err(|e| AppError::invalid_query(e.to_string()))?;
                actual.is_some_and(|a| re.is_match(&a))
            }
        };
        if !hit {
            return Ok(false);
        }
    }
    Ok(true)
}

/// Argon2 with the smallest work factor, so tests stay fast.
pub fn cheap_hasher() -> Argon2Hasher {
    Argon2Hasher::new(HashingConfig {
        memory_kib: 1024,
        iterations: 1,
        parallelism: 1,
    })
    .unwrap()
}

/// Real service over the in-memory store and a cheap Argon2 hasher.
pub fn user_manager() -> UserManager {
    UserManager::new(Arc::new(InMemoryUserStore::new()), Arc::new(cheap_hasher()))
}

pub fn create_input(name: &str, email: &str, password: &str) -> CreateUser {
    CreateUser {
        name: name.to_string(),
        email: email.to_string(),
        password: password.to_string(),
        phone: None,
        address: None,
        image: None,
    }
}
