use async_trait::async_trait;
use parking_lot::RwLock;
use std::collections::HashMap;

use super::{User, UserRepository, UserStoreError};

#[derive(Debug, Default)]
struct Users {
    next_id: i64,
    by_id: HashMap<i64, User>,
    ids_by_email: HashMap<String, i64>,
}

/// In-process user table used when no database DSN is configured.
#[derive(Debug, Default)]
pub struct MemoryUserRepository {
    users: RwLock<Users>,
}

impl MemoryUserRepository {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    fn insert(&self, name: &str, email: &str, password_hash: &str) -> Result<User, UserStoreError> {
        let mut users = self.users.write();
        if users.ids_by_email.contains_key(email) {
            return Err(UserStoreError::EmailExists);
        }

        users.next_id += 1;
        let user = User {
            id: users.next_id,
            name: name.to_string(),
            email: email.to_string(),
            password_hash: password_hash.to_string(),
        };
        users.ids_by_email.insert(user.email.clone(), user.id);
        users.by_id.insert(user.id, user.clone());
        Ok(user)
    }

    fn set_password(&self, id: i64, password_hash: &str) -> Result<(), UserStoreError> {
        let mut users = self.users.write();
        let user = users.by_id.get_mut(&id).ok_or(UserStoreError::NotFound)?;
        user.password_hash = password_hash.to_string();
        Ok(())
    }
}

#[async_trait]
impl UserRepository for MemoryUserRepository {
    async fn create(
        &self,
        name: &str,
        email: &str,
        password_hash: &str,
    ) -> Result<User, UserStoreError> {
        self.insert(name, email, password_hash)
    }

    async fn find_by_email(&self, email: &str) -> Result<Option<User>, UserStoreError> {
        let users = self.users.read();
        Ok(users
            .ids_by_email
            .get(email)
            .and_then(|id| users.by_id.get(id))
            .cloned())
    }

    async fn find_by_id(&self, id: i64) -> Result<Option<User>, UserStoreError> {
        Ok(self.users.read().by_id.get(&id).cloned())
    }

    async fn update_password(&self, id: i64, password_hash: &str) -> Result<(), UserStoreError> {
        self.set_password(id, password_hash)
    }

    async fn ping(&self) -> Result<(), UserStoreError> {
        Ok(())
    }
}
