use std::sync::atomic::{AtomicU64, Ordering};

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use dashmap::DashMap;
use dashmap::mapref::entry::Entry;
use serde::Serialize;

use crate::auth::Role;
use crate::error::StoreError;

/// A stored account.
#[derive(Clone, Debug)]
pub struct User {
    pub id: u64,
    pub name: String,
    /// Lower-cased.
    pub email: String,
    pub password_hash: String,
    pub role: Role,
    pub created_at: DateTime<Utc>,
}

/// The fields needed to create an account.
#[derive(Clone, Debug)]
pub struct NewUser {
    pub name: String,
    pub email: String,
    pub password_hash: String,
    pub role: Role,
}

/// What a user may see about an account.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct Profile {
    pub id: u64,
    pub name: String,
    pub email: String,
    pub role: Role,
    pub created_at: DateTime<Utc>,
}

impl From<&User> for Profile {
    fn from(user: &User) -> Self {
        Self {
            id: user.id,
            name: user.name.clone(),
            email: user.email.clone(),
            role: user.role,
            created_at: user.created_at,
        }
    }
}

#[async_trait]
pub trait UserStore: Send + Sync + 'static {
    /// Creates an account. Emails are unique, compared case-insensitively.
    async fn insert(&self, user: NewUser) -> Result<User, StoreError>;
    async fn find_by_email(&self, email: &str) -> Result<Option<User>, StoreError>;
    async fn find_by_id(&self, id: u64) -> Result<Option<User>, StoreError>;
    async fn count_by_role(&self, role: Role) -> Result<usize, StoreError>;
}

/// Accounts held in memory for the lifetime of the process.
#[derive(Debug)]
pub struct MemoryUserStore {
    users: DashMap<u64, User>,
    ids_by_email: DashMap<String, u64>,
    next_id: AtomicU64,
}

impl Default for MemoryUserStore {
    fn default() -> Self {
        Self {
            users: DashMap::new(),
            ids_by_email: DashMap::new(),
            next_id: AtomicU64::new(1),
        }
    }
}

impl MemoryUserStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl UserStore for MemoryUserStore {
    async fn insert(&self, new: NewUser) -> Result<User, StoreError> {
        let email = new.email.to_lowercase();
        match self.ids_by_email.entry(email.clone()) {
            Entry::Occupied(_) => Err(StoreError::DuplicateEmail(email)),
            Entry::Vacant(slot) => {
                let id = self.next_id.fetch_add(1, Ordering::Relaxed);
                let user = User {
                    id,
                    name: new.name,
                    email,
                    password_hash: new.password_hash,
                    role: new.role,
                    created_at: Utc::now(),
                };
                self.users.insert(id, user.clone());
                slot.insert(id);
                Ok(user)
            }
        }
    }

    async fn find_by_email(&self, email: &str) -> Result<Option<User>, StoreError> {
        let Some(id) = self.ids_by_email.get(&email.to_lowercase()).map(|r| *r.value()) else {
            return Ok(None);
        };
        self.find_by_id(id).await
    }

    async fn find_by_id(&self, id: u64) -> Result<Option<User>, StoreError> {
        Ok(self.users.get(&id).map(|r| r.value().clone()))
    }

    async fn count_by_role(&self, role: Role) -> Result<usize, StoreError> {
        Ok(self.users.iter().filter(|r| r.value().role == role).count())
    }
}
