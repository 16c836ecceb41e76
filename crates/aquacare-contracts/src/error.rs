//! Error types
//!
//! Every use case returns [`ContractResult`]. Identity ambiguity and store
//! drift are not errors; they are [`Anomaly`] values that get logged and the
//! operation carries on.

use crate::domain::aggregates::{CustomerError, LifecycleError};
use crate::domain::value_objects::{
    AccountId, AddressError, ContractId, CustomerId, EmailError, MoneyError, PhoneError, TicketId,
};
use crate::ports::outbound::RepositoryError;

pub type ContractResult<T> = Result<T, ContractError>;

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ContractError {
    #[error("not found: {0}")]
    NotFound(String),

    #[error("conflict: {0}")]
    Conflict(String),

    #[error("all {services_total} service visits on contract {contract_id} are used; renew the contract to book more")]
    QuotaExhausted {
        contract_id: ContractId,
        services_total: u32,
    },

    #[error("validation failed: {0}")]
    Validation(String),

    #[error("storage unavailable: {0}")]
    Storage(String),
}

/// Coarse classification callers branch on.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    NotFound,
    Conflict,
    QuotaExhausted,
    Validation,
    Storage,
}

impl ContractError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::NotFound(_) => ErrorKind::NotFound,
            Self::Conflict(_) => ErrorKind::Conflict,
            Self::QuotaExhausted { .. } => ErrorKind::QuotaExhausted,
            Self::Validation(_) => ErrorKind::Validation,
            Self::Storage(_) => ErrorKind::Storage,
        }
    }

    /// Only storage failures are fatal; everything else is a client mistake
    /// or a state the caller can act on.
    pub fn is_fatal(&self) -> bool {
        self.kind() == ErrorKind::Storage
    }

    pub fn contract_not_found(id: &ContractId) -> Self {
        Self::NotFound(format!("contract {id}"))
    }

    pub fn customer_not_found(id: &CustomerId) -> Self {
        Self::NotFound(format!("customer {id}"))
    }

    pub fn ticket_not_found(id: &TicketId) -> Self {
        Self::NotFound(format!("ticket {id}"))
    }
}

impl From<LifecycleError> for ContractError {
    fn from(err: LifecycleError) -> Self {
        match err {
            LifecycleError::QuotaExhausted { id, services_total } => Self::QuotaExhausted {
                contract_id: id,
                services_total,
            },
            LifecycleError::InvalidTerm(_) | LifecycleError::PlanUnavailable(_) => {
                Self::Validation(err.to_string())
            }
            LifecycleError::AlreadyCancelled(_)
            | LifecycleError::AlreadyExpired(_)
            | LifecycleError::AlreadyArchived(_)
            | LifecycleError::InvalidTransition { .. }
            | LifecycleError::PaymentNotConfirmed(_) => Self::Conflict(err.to_string()),
        }
    }
}

impl From<CustomerError> for ContractError {
    fn from(err: CustomerError) -> Self {
        match err {
            CustomerError::UnknownTicket(id) => Self::ticket_not_found(&id),
            other => Self::Validation(other.to_string()),
        }
    }
}

impl From<RepositoryError> for ContractError {
    fn from(err: RepositoryError) -> Self {
        match err {
            RepositoryError::NotFound => Self::NotFound("record".into()),
            RepositoryError::DuplicateKey(_) | RepositoryError::VersionConflict { .. } => {
                Self::Conflict(err.to_string())
            }
            RepositoryError::ConnectionError(_) | RepositoryError::SerializationError(_) => {
                Self::Storage(err.to_string())
            }
        }
    }
}

macro_rules! validation_from {
    ($($err:ty),*) => {
        $(impl From<$err> for ContractError {
            fn from(err: $err) -> Self {
                Self::Validation(err.to_string())
            }
        })*
    };
}

validation_from!(PhoneError, EmailError, MoneyError, AddressError);

/// Data-quality observations that never fail an operation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Anomaly {
    /// More than one profile matched an account.
    AmbiguousIdentity {
        account_id: Option<AccountId>,
        candidates: Vec<CustomerId>,
        chosen: CustomerId,
    },
    /// The two stores disagree about a contract.
    SyncDrift {
        contract_id: ContractId,
        ticket_id: Option<TicketId>,
        detail: String,
    },
}

impl Anomaly {
    pub fn log(&self) {
        match self {
            Self::AmbiguousIdentity { account_id, candidates, chosen } => {
                tracing::warn!(
                    account_id = ?account_id.as_ref().map(AccountId::as_str),
                    candidates = candidates.len(),
                    chosen = %chosen,
                    "Ambiguous identity: several customer profiles match this account"
                );
            }
            Self::SyncDrift { contract_id, ticket_id, detail } => {
                tracing::warn!(
                    contract_id = %contract_id,
                    ticket_id = ?ticket_id.as_ref().map(TicketId::as_str),
                    detail = %detail,
                    "Sync drift between customer profile and contract record"
                );
            }
        }
    }
}
