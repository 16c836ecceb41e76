//! Lifecycle rules that span more than one contract: replacement, renewal
//! and the expiry sweep.

use chrono::{DateTime, Utc};

use crate::domain::aggregates::{
    ArchiveReason, Contract, ContractStatus, CustomerProfile, LifecycleError, PlanTemplate,
};
use crate::domain::services::factory::{ContractFactory, CreationContext, RenewalTerms};
use crate::domain::value_objects::ContractId;

pub struct LifecycleManager;

impl LifecycleManager {
    /// Install `contract` on the profile, archiving the current one of the
    /// same kind as replaced.
    pub fn install(profile: &mut CustomerProfile, contract: Contract, now: DateTime<Utc>) -> Option<ContractId> {
        let replaced = profile.install_contract(contract, ArchiveReason::Replaced, now);
        if let Some(id) = &replaced {
            tracing::info!(customer_id = %profile.id(), archived = %id, "Archived replaced contract");
        }
        replaced
    }

    /// Build the successor term and archive `previous` as renewed.
    ///
    /// `previous` keeps its dates; the new term starts no earlier than its end.
    pub fn renew(
        factory: &ContractFactory,
        previous: &mut Contract,
        plan: &PlanTemplate,
        terms: RenewalTerms,
        now: DateTime<Utc>,
    ) -> Result<Contract, LifecycleError> {
        if previous.archived().is_some() {
            return Err(LifecycleError::AlreadyArchived(previous.id().clone()));
        }
        if previous.status() == ContractStatus::Cancelled {
            return Err(LifecycleError::AlreadyCancelled(previous.id().clone()));
        }
        let renewed = factory.create(previous.kind(), plan, CreationContext::Renewal(terms), now)?;
        previous.archive(ArchiveReason::Renewed, now);

        tracing::info!(
            previous = %previous.id(),
            renewed = %renewed.id(),
            start = %renewed.start_date(),
            "Contract renewed"
        );
        Ok(renewed)
    }

    /// Renew a contract embedded in the profile as its current term.
    pub fn renew_embedded(
        factory: &ContractFactory,
        profile: &mut CustomerProfile,
        contract_id: &ContractId,
        plan: &PlanTemplate,
        terms: RenewalTerms,
        now: DateTime<Utc>,
    ) -> Result<Contract, LifecycleError> {
        let mut previous = profile
            .current_by_id(contract_id)
            .cloned()
            .ok_or_else(|| LifecycleError::InvalidTerm(format!("{contract_id} is not a current contract")))?;
        let renewed = Self::renew(factory, &mut previous, plan, terms, now)?;
        profile.install_contract(renewed.clone(), ArchiveReason::Renewed, now);
        Ok(renewed)
    }

    /// Expire every current contract on the profile whose term is over.
    pub fn expire_profile(profile: &mut CustomerProfile, now: DateTime<Utc>) -> Vec<ContractId> {
        let mut expired = vec![];
        for contract in profile.current_contracts_mut() {
            if contract.expire(now) {
                expired.push(contract.id().clone());
            }
        }
        expired
    }

    /// Profiles need a sweep write only when this returns true.
    pub fn profile_has_due(profile: &CustomerProfile, now: DateTime<Utc>) -> bool {
        profile
            .current_contracts()
            .any(|c| c.status() == ContractStatus::Active && now > c.end_date())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::aggregates::{ContractKind, NewCustomer, PaymentState};
    use crate::domain::value_objects::{Money, PlanId};
    use crate::domain::services::factory::AdminTerms;
    use chrono::TimeZone;

    fn plan() -> PlanTemplate {
        PlanTemplate {
            id: PlanId::from_string("plan-silver"),
            name: "Silver".into(),
            price: Money::rupees(1499),
            duration_months: 12,
            service_quota: 2,
            parts_included: false,
            is_active: true,
            image_url: None,
        }
    }

    fn at(y: i32, m: u32, d: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(y, m, d, 9, 0, 0).unwrap()
    }

    fn profile_with_amc(factory: &ContractFactory) -> (CustomerProfile, ContractId) {
        let mut profile = CustomerProfile::create(
            NewCustomer { name: "Meera".into(), mobile: "9000000001".into(), ..Default::default() },
            at(2024, 1, 15),
        )
        .unwrap();
        let terms = AdminTerms { payment: PaymentState::Paid, ..Default::default() };
        let contract = factory
            .create_amc(&plan(), CreationContext::Admin(terms), at(2024, 1, 15))
            .unwrap();
        let id = contract.id().clone();
        LifecycleManager::install(&mut profile, contract, at(2024, 1, 15));
        (profile, id)
    }

    #[test]
    fn test_renew_embedded_archives_and_chains() {
        let factory = ContractFactory::new(12, 0);
        let (mut profile, id) = profile_with_amc(&factory);
        let previous_end = profile.current_amc().unwrap().end_date();
        let terms = RenewalTerms::following(profile.current_amc().unwrap());

        let renewed =
            LifecycleManager::renew_embedded(&factory, &mut profile, &id, &plan(), terms, at(2024, 6, 1)).unwrap();

        assert_eq!(profile.archive().len(), 1);
        assert_eq!(profile.archive()[0].archived(), Some(ArchiveReason::Renewed));
        assert_eq!(profile.archive()[0].end_date(), previous_end);
        assert_eq!(renewed.start_date(), previous_end);
        assert_eq!(profile.current(ContractKind::Amc).unwrap().id(), renewed.id());
    }

    #[test]
    fn test_cancelled_contract_cannot_be_renewed() {
        let factory = ContractFactory::new(12, 0);
        let (profile, _) = profile_with_amc(&factory);
        let mut previous = profile.current_amc().unwrap().clone();
        previous.cancel("customer request", at(2024, 2, 1)).unwrap();
        let terms = RenewalTerms::following(&previous);
        assert!(matches!(
            LifecycleManager::renew(&factory, &mut previous, &plan(), terms, at(2024, 3, 1)),
            Err(LifecycleError::AlreadyCancelled(_))
        ));
    }

    #[test]
    fn test_archived_contract_cannot_be_renewed_again() {
        let factory = ContractFactory::new(12, 0);
        let (profile, _) = profile_with_amc(&factory);
        let mut previous = profile.current_amc().unwrap().clone();
        let terms = RenewalTerms::following(&previous);
        LifecycleManager::renew(&factory, &mut previous, &plan(), terms.clone(), at(2024, 12, 1)).unwrap();

        assert!(matches!(
            LifecycleManager::renew(&factory, &mut previous, &plan(), terms, at(2024, 12, 2)),
            Err(LifecycleError::AlreadyArchived(_))
        ));
    }

    #[test]
    fn test_expire_profile_twice() {
        let factory = ContractFactory::new(12, 0);
        let (mut profile, id) = profile_with_amc(&factory);
        let after = at(2025, 1, 16);

        assert!(LifecycleManager::profile_has_due(&profile, after));
        assert_eq!(LifecycleManager::expire_profile(&mut profile, after), vec![id]);
        assert!(!LifecycleManager::profile_has_due(&profile, after));
        assert!(LifecycleManager::expire_profile(&mut profile, after).is_empty());
    }
}
