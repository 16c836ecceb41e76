//! Startup snapshot
//!
//! A JSON dump of both stores, loaded into the repositories before the
//! sweeper starts. Contracts embedded in profiles may predate schema
//! versioning and are upgraded on the way in.

use serde::Deserialize;
use serde_json::Value;

use crate::domain::aggregates::{ArchiveReason, Contract, ContractKind, CustomerProfile};
use crate::infrastructure::migration::{ContractMigrator, MigrationError};
use crate::ports::outbound::{ContractRepository, CustomerRepository, RepositoryError};

/// `{ "customers": [...], "contracts": [...] }`, either list optional.
#[derive(Debug, Default, Deserialize)]
pub struct Snapshot {
    #[serde(default)]
    pub customers: Vec<Value>,
    #[serde(default)]
    pub contracts: Vec<Value>,
}

#[derive(Debug, thiserror::Error)]
pub enum SnapshotError {
    #[error("cannot read snapshot: {0}")]
    Io(#[from] std::io::Error),
    #[error("cannot parse document: {0}")]
    Parse(#[from] serde_json::Error),
    #[error(transparent)]
    Migration(#[from] MigrationError),
    #[error(transparent)]
    Repository(#[from] RepositoryError),
}

#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct LoadReport {
    pub customers: usize,
    pub contracts: usize,
    pub skipped: usize,
}

impl Snapshot {
    pub fn read(path: &str) -> Result<Self, SnapshotError> {
        let content = std::fs::read_to_string(path)?;
        Ok(serde_json::from_str(&content)?)
    }

    /// Insert every document it can; bad ones are logged and counted.
    pub async fn load_into(
        self,
        migrator: &ContractMigrator,
        customers: &dyn CustomerRepository,
        contracts: &dyn ContractRepository,
    ) -> LoadReport {
        let mut report = LoadReport::default();

        for (index, document) in self.customers.into_iter().enumerate() {
            let result = match upgrade_profile(migrator, document) {
                Ok(profile) => customers.insert(&profile).await.map_err(SnapshotError::from),
                Err(e) => Err(e),
            };
            match result {
                Ok(()) => report.customers += 1,
                Err(e) => {
                    tracing::warn!(index, error = %e, "Skipping customer document");
                    report.skipped += 1;
                }
            }
        }

        for (index, document) in self.contracts.into_iter().enumerate() {
            let result = match serde_json::from_value::<Contract>(document) {
                Ok(contract) => contracts.insert(&contract).await.map_err(SnapshotError::from),
                Err(e) => Err(e.into()),
            };
            match result {
                Ok(()) => report.contracts += 1,
                Err(e) => {
                    tracing::warn!(index, error = %e, "Skipping contract document");
                    report.skipped += 1;
                }
            }
        }

        tracing::info!(
            customers = report.customers,
            contracts = report.contracts,
            skipped = report.skipped,
            "Snapshot loaded"
        );
        report
    }
}

/// Upgrade the embedded contracts in place, then parse the profile.
fn upgrade_profile(migrator: &ContractMigrator, mut document: Value) -> Result<CustomerProfile, SnapshotError> {
    for (field, kind) in [("current_amc", ContractKind::Amc), ("current_rental", ContractKind::Rental)] {
        if let Some(slot) = document.get_mut(field).filter(|slot| !slot.is_null()) {
            let contract = migrator.upgrade(kind, slot.take())?;
            *slot = serde_json::to_value(contract)?;
        }
    }

    if let Some(Value::Array(archive)) = document.get_mut("archive") {
        for entry in archive.iter_mut() {
            let mut contract = migrator.upgrade(archived_kind(entry), entry.take())?;
            if contract.archived().is_none() {
                let ended = contract.end_date();
                contract.archive(ArchiveReason::Replaced, ended);
            }
            *entry = serde_json::to_value(contract)?;
        }
    }

    Ok(serde_json::from_value(document)?)
}

fn archived_kind(document: &Value) -> ContractKind {
    if let Some(kind) = document.get("kind").and_then(|k| serde_json::from_value(k.clone()).ok()) {
        return kind;
    }
    let rental_id = document
        .get("id")
        .and_then(Value::as_str)
        .is_some_and(|id| id.starts_with(ContractKind::Rental.id_prefix()));
    if rental_id || document.get("rentalId").is_some() {
        ContractKind::Rental
    } else {
        ContractKind::Amc
    }
}
