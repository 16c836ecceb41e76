//! Value Objects module
//!
//! Immutable, validated domain primitives and the human-readable identifiers
//! issued by the engine.

pub mod address;
pub mod email;
pub mod money;
pub mod phone;

pub use address::{Address, AddressError};
pub use email::{Email, EmailError};
pub use money::{Money, MoneyError};
pub use phone::{Phone, PhoneError, PhonePattern};

use chrono::{DateTime, Datelike, Utc};
use rand::distributions::Alphanumeric;
use rand::Rng;
use serde::{Deserialize, Serialize};

macro_rules! string_id {
    ($(#[$meta:meta])* $name:ident) => {
        $(#[$meta])*
        #[derive(Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
        #[serde(transparent)]
        pub struct $name(String);

        impl $name {
            pub fn from_string(id: impl Into<String>) -> Self {
                Self(id.into())
            }

            pub fn as_str(&self) -> &str {
                &self.0
            }
        }

        impl std::fmt::Display for $name {
            fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
                f.write_str(&self.0)
            }
        }

        impl AsRef<str> for $name {
            fn as_ref(&self) -> &str {
                &self.0
            }
        }

        impl From<&str> for $name {
            fn from(value: &str) -> Self {
                Self(value.to_string())
            }
        }
    };
}

string_id!(
    /// Web account identifier, issued by the authentication collaborator.
    AccountId
);
string_id!(
    /// Offline customer profile identifier (`CUST<yy><digits>`).
    CustomerId
);
string_id!(
    /// Service contract identifier (`AMC-...` / `RNT-...`).
    ContractId
);
string_id!(
    /// Complaint / service ticket identifier (`SR-...` / `TKT-...`).
    TicketId
);
string_id!(OrderId);
string_id!(PlanId);

/// Uppercase alphanumeric suffix for display identifiers.
pub(crate) fn random_suffix(len: usize) -> String {
    rand::thread_rng()
        .sample_iter(&Alphanumeric)
        .take(len)
        .map(|b| char::from(b).to_ascii_uppercase())
        .collect()
}

impl CustomerId {
    /// `CUST` + two-digit year + six random digits.
    pub fn generate(now: DateTime<Utc>) -> Self {
        let digits: u32 = rand::thread_rng().gen_range(100_000..1_000_000);
        Self(format!("CUST{:02}{}", now.year() % 100, digits))
    }
}

impl TicketId {
    /// Timestamp plus a short random suffix; unique enough for a support desk.
    pub fn generate(prefix: &str, now: DateTime<Utc>) -> Self {
        Self(format!(
            "{}-{}-{}",
            prefix,
            now.format("%y%m%d%H%M%S"),
            random_suffix(4)
        ))
    }
}

/// What kind of catalog entry an order line or contract points at.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ItemKind {
    Product,
    Part,
}

/// Tagged reference into the catalog, resolved through a single lookup port.
#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ItemRef {
    pub kind: ItemKind,
    pub id: String,
}

impl ItemRef {
    pub fn product(id: impl Into<String>) -> Self {
        Self { kind: ItemKind::Product, id: id.into() }
    }

    pub fn part(id: impl Into<String>) -> Self {
        Self { kind: ItemKind::Part, id: id.into() }
    }
}

impl std::fmt::Display for ItemRef {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self.kind {
            ItemKind::Product => write!(f, "product:{}", self.id),
            ItemKind::Part => write!(f, "part:{}", self.id),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn test_customer_id_shape() {
        let now = Utc.with_ymd_and_hms(2024, 3, 1, 9, 0, 0).unwrap();
        let id = CustomerId::generate(now);
        assert!(id.as_str().starts_with("CUST24"));
        assert_eq!(id.as_str().len(), 12);
    }

    #[test]
    fn test_ticket_id_shape() {
        let now = Utc.with_ymd_and_hms(2024, 3, 1, 9, 30, 15).unwrap();
        let id = TicketId::generate("SR", now);
        assert!(id.as_str().starts_with("SR-240301093015-"));
        assert_eq!(id.as_str().len(), "SR-240301093015-".len() + 4);
    }

    #[test]
    fn test_item_ref_display() {
        assert_eq!(ItemRef::part("p-7").to_string(), "part:p-7");
        assert_eq!(ItemRef::product("x").to_string(), "product:x");
    }
}
