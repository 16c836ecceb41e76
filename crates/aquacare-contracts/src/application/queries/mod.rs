//! Query side
//!
//! Read models assembled from both stores. Nothing here writes.

use chrono::{DateTime, Utc};

use crate::application::dto::{ContractSummary, DashboardStats, ExpiringContract};
use crate::domain::aggregates::{Contract, ContractStatus, CustomerProfile};
use crate::domain::services::{ContractSource, SyncBridge};

/// Entries shown in the "expiring soon" list of a summary.
const SUMMARY_EXPIRING_LIMIT: usize = 5;

pub struct ContractQueries;

impl ContractQueries {
    /// One entry per contract id across the account's records and its
    /// profile, authoritative copy kept, newest first.
    pub fn merge(records: Vec<Contract>, profile: Option<&CustomerProfile>) -> Vec<(Contract, ContractSource)> {
        let mut merged: Vec<(Contract, ContractSource)> = records
            .into_iter()
            .map(|c| (c, ContractSource::SelfService))
            .collect();

        if let Some(profile) = profile {
            for embedded in profile.current_contracts().chain(profile.archive()) {
                match merged.iter_mut().find(|(c, _)| c.id() == embedded.id()) {
                    Some(slot) => {
                        let use_embedded = !std::ptr::eq(SyncBridge::authoritative(&slot.0, embedded).0, &slot.0);
                        if use_embedded {
                            *slot = (embedded.clone(), ContractSource::Profile);
                        }
                    }
                    None => merged.push((embedded.clone(), ContractSource::Profile)),
                }
            }
        }

        merged.sort_by(|a, b| b.0.created_at().cmp(&a.0.created_at()));
        merged
    }

    /// Every contract that is current somewhere: profile sub-documents plus
    /// self-service records that were never archived.
    pub fn current_set(records: Vec<Contract>, profiles: &[CustomerProfile]) -> Vec<Contract> {
        let mut current: Vec<Contract> = profiles
            .iter()
            .flat_map(|p| p.current_contracts().cloned())
            .collect();

        for record in records.into_iter().filter(|r| r.archived().is_none()) {
            match current.iter_mut().find(|c| c.id() == record.id()) {
                Some(slot) => {
                    let use_record = std::ptr::eq(SyncBridge::authoritative(&record, slot).0, &record);
                    if use_record {
                        *slot = record;
                    }
                }
                None => current.push(record),
            }
        }
        current
    }

    pub fn dashboard(current: &[Contract], now: DateTime<Utc>, expiring_soon_days: u32) -> DashboardStats {
        let mut stats = DashboardStats::default();
        for contract in current {
            stats.total += 1;
            stats.revenue = stats.revenue + contract.amount_paid();
            match contract.effective_status(now) {
                ContractStatus::Active => {
                    stats.active += 1;
                    if contract.days_remaining(now) <= expiring_soon_days {
                        stats.expiring_soon += 1;
                    }
                }
                ContractStatus::Expired => stats.expired += 1,
                ContractStatus::Pending | ContractStatus::OnHold | ContractStatus::Cancelled => stats.other += 1,
            }
        }
        stats
    }

    /// Counters and the expiring list; the caller fills in the current views.
    pub fn summarize(contracts: &[Contract], now: DateTime<Utc>, expiring_soon_days: u32) -> ContractSummary {
        let mut summary = ContractSummary::default();
        let mut expiring = vec![];

        for contract in contracts {
            summary.services_used += contract.services_used();
            match contract.effective_status(now) {
                ContractStatus::Active => {
                    summary.active += 1;
                    let days = contract.days_remaining(now);
                    if days <= expiring_soon_days {
                        expiring.push(ExpiringContract {
                            id: contract.id().clone(),
                            kind: contract.kind(),
                            plan_name: contract.plan_name().to_string(),
                            end_date: contract.end_date(),
                            days_remaining: days,
                        });
                    }
                }
                ContractStatus::Expired => summary.expired += 1,
                _ => {}
            }
        }

        expiring.sort_by_key(|e| e.days_remaining);
        expiring.truncate(SUMMARY_EXPIRING_LIMIT);
        summary.expiring_soon = expiring;
        summary
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::aggregates::contract::tests::draft;
    use crate::domain::aggregates::{ArchiveReason, ContractOrigin, NewCustomer};
    use crate::domain::value_objects::{ContractId, Money};
    use chrono::{Duration, TimeZone};

    fn start() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 1, 15, 10, 0, 0).unwrap()
    }

    fn contract(id: &str, paid: u32) -> Contract {
        let mut d = draft(start(), 2);
        d.id = ContractId::from_string(id);
        d.amount_paid = Money::rupees(paid);
        Contract::create(d, start()).unwrap()
    }

    #[test]
    fn test_dashboard_counts_by_effective_status() {
        let mut cancelled = contract("AMC-C", 500);
        cancelled.cancel("duplicate", start()).unwrap();
        let current = vec![contract("AMC-A", 1000), contract("AMC-B", 2000), cancelled];

        let near_end = Utc.with_ymd_and_hms(2025, 1, 1, 0, 0, 0).unwrap();
        let stats = ContractQueries::dashboard(&current, near_end, 30);
        assert_eq!(stats.active, 2);
        assert_eq!(stats.expiring_soon, 2);
        assert_eq!(stats.other, 1);
        assert_eq!(stats.total, 3);
        assert_eq!(stats.revenue, Money::rupees(3500));

        let after_end = Utc.with_ymd_and_hms(2025, 2, 1, 0, 0, 0).unwrap();
        let stats = ContractQueries::dashboard(&current, after_end, 30);
        assert_eq!(stats.active, 0);
        assert_eq!(stats.expired, 2);
    }

    #[test]
    fn test_merge_keeps_one_copy_per_id() {
        let record = contract("AMC-WEB", 1000);
        let mut profile = CustomerProfile::create(
            NewCustomer { name: "Asha".into(), mobile: "9876543210".into(), ..Default::default() },
            start(),
        )
        .unwrap();
        profile.install_contract(record.clone(), ArchiveReason::Replaced, start());

        let mut admin = draft(start() + Duration::days(1), 2);
        admin.id = ContractId::from_string("RNT-ADMIN");
        admin.kind = crate::domain::aggregates::ContractKind::Rental;
        admin.origin = ContractOrigin::Admin;
        profile.install_contract(Contract::create(admin, start() + Duration::days(1)).unwrap(), ArchiveReason::Replaced, start());

        let merged = ContractQueries::merge(vec![record], Some(&profile));
        assert_eq!(merged.len(), 2);
        assert_eq!(merged[0].0.id().as_str(), "RNT-ADMIN");
        assert_eq!(merged[0].1, ContractSource::Profile);
        assert_eq!(merged[1].1, ContractSource::SelfService);
    }

    #[test]
    fn test_summary_lists_expiring() {
        let contracts = vec![contract("AMC-A", 0), contract("AMC-B", 0)];
        let now = Utc.with_ymd_and_hms(2025, 1, 5, 10, 0, 0).unwrap();
        let summary = ContractQueries::summarize(&contracts, now, 30);
        assert_eq!(summary.active, 2);
        assert_eq!(summary.expiring_soon.len(), 2);
        assert_eq!(summary.expiring_soon[0].days_remaining, 10);
    }
}
