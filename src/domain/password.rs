//! Password hashing - one-way salted hashing of user credentials.
//!
//! SOLID (DIP): services depend on the [`PasswordHasher`] trait; the
//! Argon2id implementation is injected at startup.

use argon2::{
    password_hash::{
        rand_core::OsRng, Error as HashError, PasswordHash, PasswordHasher as _,
        PasswordVerifier as _, SaltString,
    },
    Algorithm, Argon2, Params, Version,
};
use async_trait::async_trait;

use crate::config::HashingConfig;
use crate::errors::{AppError, AppResult};

#[cfg(any(test, feature = "test-utils"))]
use mockall::automock;

/// Password hashing primitive.
///
/// `hash` never returns a plaintext or placeholder value: any failure is an
/// [`AppError::Hashing`]. `verify` returns `Ok(false)` on mismatch and an
/// error only when the comparison cannot run.
#[cfg_attr(any(test, feature = "test-utils"), automock)]
#[async_trait]
pub trait PasswordHasher: Send + Sync {
    /// Produce a salted, irreversible hash of `plain`.
    async fn hash(&self, plain: &str) -> AppResult<String>;

    /// Check `plain` against a previously produced hash.
    async fn verify(&self, plain: &str, hashed: &str) -> AppResult<bool>;
}

/// Argon2id hasher with a fixed work factor.
#[derive(Debug, Clone)]
pub struct Argon2Hasher {
    params: Params,
}

impl Argon2Hasher {
    /// Build a hasher from the configured work factor.
    pub fn new(config: HashingConfig) -> AppResult<Self> {
        let params = Params::new(config.memory_kib, config.iterations, config.parallelism, None)
            .map_err(|e| AppError::hashing(format!("Invalid Argon2 parameters: {}", e)))?;
        Ok(Self { params })
    }

    fn argon2(params: Params) -> Argon2<'static> {
        Argon2::new(Algorithm::Argon2id, Version::V0x13, params)
    }

    fn hash_blocking(params: Params, plain: &str) -> AppResult<String> {
        let salt = SaltString::generate(&mut OsRng);
        let hash = Self::argon2(params)
            .hash_password(plain.as_bytes(), &salt)
            .map_err(|e| AppError::hashing(format!("Password hash failed: {}", e)))?;
        Ok(hash.to_string())
    }

    fn verify_blocking(params: Params, plain: &str, hashed: &str) -> AppResult<bool> {
        let parsed = PasswordHash::new(hashed)
            .map_err(|e| AppError::hashing(format!("Invalid hash format: {}", e)))?;
        match Self::argon2(params).verify_password(plain.as_bytes(), &parsed) {
            Ok(()) => Ok(true),
            Err(HashError::Password) => Ok(false),
            Err(e) => Err(AppError::hashing(format!("Password verification failed: {}", e))),
        }
    }
}

#[async_trait]
impl PasswordHasher for Argon2Hasher {
    async fn hash(&self, plain: &str) -> AppResult<String> {
        let params = self.params.clone();
        let plain = plain.to_owned();
        tokio::task::spawn_blocking(move || Self::hash_blocking(params, &plain))
            .await
            .map_err(|e| AppError::hashing(format!("Hashing task failed: {}", e)))?
    }

    async fn verify(&self, plain: &str, hashed: &str) -> AppResult<bool> {
        let params = self.params.clone();
        let plain = plain.to_owned();
        let hashed = hashed.to_owned();
        tokio::task::spawn_blocking(move || Self::verify_blocking(params, &plain, &hashed))
            .await
            .map_err(|e| AppError::hashing(format!("Verification task failed: {}", e)))?
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    // Minimal work factor keeps the suite fast.
    fn hasher() -> Argon2Hasher {
        Argon2Hasher::new(HashingConfig {
            memory_kib: 1024,
            iterations: 1,
            parallelism: 1,
        })
        .unwrap()
    }

    #[tokio::test]
    async fn test_hash_and_verify() {
        let hasher = hasher();
        let hash = hasher.hash("p1").await.unwrap();

        assert_ne!(hash, "p1");
        assert!(hasher.verify("p1", &hash).await.unwrap());
        assert!(!hasher.verify("p2", &hash).await.unwrap());
    }

    #[tokio::test]
    async fn test_same_password_different_salts() {
        let hasher = hasher();
        let first = hasher.hash("SamePassword123").await.unwrap();
        let second = hasher.hash("SamePassword123").await.unwrap();

        assert_ne!(first, second);
        assert!(hasher.verify("SamePassword123", &first).await.unwrap());
        assert!(hasher.verify("SamePassword123", &second).await.unwrap());
    }

    #[tokio::test]
    async fn test_hash_is_argon2id_phc_string() {
        let hash = hasher().hash("secret").await.unwrap();
        assert!(hash.starts_with("$argon2id$"));
    }

    #[tokio::test]
    async fn test_verify_malformed_hash_is_error_not_mismatch() {
        let result = hasher().verify("secret", "not-a-hash").await;
        assert!(matches!(result, Err(AppError::Hashing(_))));
    }

    #[tokio::test]
    async fn test_verify_uses_params_embedded_in_hash() {
        let strong = Argon2Hasher::new(HashingConfig {
            memory_kib: 2048,
            iterations: 2,
            parallelism: 1,
        })
        .unwrap();
        let hash = strong.hash("secret").await.unwrap();

        assert!(hasher().verify("secret", &hash).await.unwrap());
    }

    #[test]
    fn test_invalid_params_rejected() {
        let result = Argon2Hasher::new(HashingConfig {
            memory_kib: 1,
            iterations: 0,
            parallelism: 1,
        });
        assert!(matches!(result, Err(AppError::Hashing(_))));
    }
}
