//! Web account projection
//!
//! Accounts belong to the authentication collaborator; this is the read-only
//! shape the engine consumes through `AccountDirectory`.

use serde::{Deserialize, Serialize};

use crate::domain::value_objects::AccountId;

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct WebAccount {
    pub id: AccountId,
    pub name: String,
    pub email: Option<String>,
    pub phone: Option<String>,
    /// Opaque to this engine.
    #[serde(default, skip_serializing)]
    pub password_hash: String,
    pub token_epoch: u32,
}

impl WebAccount {
    pub fn new(id: impl Into<AccountId>, name: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
            email: None,
            phone: None,
            password_hash: String::new(),
            token_epoch: 0,
        }
    }

    pub fn with_phone(mut self, phone: impl Into<String>) -> Self {
        self.phone = Some(phone.into());
        self
    }

    pub fn with_email(mut self, email: impl Into<String>) -> Self {
        self.email = Some(email.into());
        self
    }
}
