use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use time::OffsetDateTime;

pub mod accounts;
pub mod flows;
pub mod password;

pub type UserId = u64;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum SubscriptionTier {
    #[default]
    Free,
    Premium,
    /// Accepted because the web client's user model allows it; no flow assigns it.
    Enterprise,
}

#[derive(Debug, Clone, PartialEq)]
pub struct User {
    pub user_id: UserId,
    pub email: String,
    pub password_hash: String,
    pub first_name: String,
    pub last_name: String,
    pub email_verified: bool,
    pub verification_code: Option<String>,
    pub verification_code_expiry: Option<OffsetDateTime>,
    pub reset_token: Option<String>,
    pub reset_token_expiry: Option<OffsetDateTime>,
    pub subscription_tier: SubscriptionTier,
    pub notification_preferences: bool,
    pub created_at: OffsetDateTime,
}

#[derive(Debug, Clone)]
pub struct NewUser {
    pub email: String,
    pub password_hash: String,
    pub first_name: String,
    pub last_name: String,
}

#[derive(Debug, Default)]
pub struct UserStore {
    users: BTreeMap<UserId, User>,
    next_id: UserId,
}

impl UserStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn all(&self) -> Vec<User> {
        self.users.values().cloned().collect()
    }

    pub fn get(&self, user_id: UserId) -> Option<&User> {
        self.users.get(&user_id)
    }

    pub fn get_mut(&mut self, user_id: UserId) -> Option<&mut User> {
        self.users.get_mut(&user_id)
    }

    pub fn find_by_email(&self, email: &str) -> Option<&User> {
        self.users.values().find(|u| u.email == email)
    }

    pub fn find_by_email_mut(&mut self, email: &str) -> Option<&mut User> {
        self.users.values_mut().find(|u| u.email == email)
    }

    /// Store a new, unverified account and return it with its assigned id.
    pub fn insert(&mut self, new_user: NewUser, created_at: OffsetDateTime) -> &mut User {
        self.next_id += 1;
        let user_id = self.next_id;
        self.users.entry(user_id).or_insert(User {
            user_id,
            email: new_user.email,
            password_hash: new_user.password_hash,
            first_name: new_user.first_name,
            last_name: new_user.last_name,
            email_verified: false,
            verification_code: None,
            verification_code_expiry: None,
            reset_token: None,
            reset_token_expiry: None,
            subscription_tier: SubscriptionTier::Free,
            notification_preferences: true,
            created_at,
        })
    }

    pub fn remove(&mut self, user_id: UserId) -> Option<User> {
        self.users.remove(&user_id)
    }

    pub fn len(&self) -> usize {
        self.users.len()
    }

    pub fn is_empty(&self) -> bool {
        self.users.is_empty()
    }
}
