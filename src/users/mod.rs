//! User records and their storage.

pub mod memory;
pub mod password;
pub mod postgres;

pub use memory::MemoryUserRepository;
pub use postgres::PgUserRepository;

use async_trait::async_trait;
use regex::Regex;
use thiserror::Error;

pub const MIN_PASSWORD_LEN: usize = 6;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct User {
    pub id: i64,
    pub name: String,
    pub email: String,
    pub password_hash: String,
}

#[derive(Debug, Error)]
pub enum UserStoreError {
    #[error("email already registered")]
    EmailExists,
    #[error("user not found")]
    NotFound,
    #[error("user store error: {0}")]
    Backend(String),
}

#[async_trait]
pub trait UserRepository: Send + Sync {
    /// Insert a new user. `email` must already be normalized.
    async fn create(
        &self,
        name: &str,
        email: &str,
        password_hash: &str,
    ) -> Result<User, UserStoreError>;

    async fn find_by_email(&self, email: &str) -> Result<Option<User>, UserStoreError>;

    async fn find_by_id(&self, id: i64) -> Result<Option<User>, UserStoreError>;

    async fn update_password(&self, id: i64, password_hash: &str) -> Result<(), UserStoreError>;

    async fn ping(&self) -> Result<(), UserStoreError>;
}

#[must_use]
pub fn normalize_email(email: &str) -> String {
    email.trim().to_lowercase()
}

#[must_use]
pub fn valid_email(email: &str) -> bool {
    Regex::new(r"^[^@\s]+@[^@\s]+\.[^@\s]+$").is_ok_and(|re| re.is_match(email))
}

#[must_use]
pub fn valid_password(password: &str) -> bool {
    password.chars().count() >= MIN_PASSWORD_LEN
}
