//! Shared wiring for the integration scenarios

#![allow(dead_code)]

use std::sync::Arc;

use aquacare_contracts::application::dto::{Fulfillment, OrderCompleted, OrderLine};
use aquacare_contracts::domain::aggregates::CatalogItem;
use aquacare_contracts::domain::value_objects::ItemRef;
use aquacare_contracts::infrastructure::{
    FixedClock, InMemoryAccountDirectory, InMemoryContractRepository, InMemoryCustomerRepository,
    InMemoryItemCatalog, InMemoryPlanCatalog, RecordingNotificationSink,
};
use aquacare_contracts::{
    AccountId, ContractService, ContractUseCases, CustomerProfile, EngineConfig, Money, NewCustomer, OrderId,
    PaymentState, PlanId, PlanTemplate, ServicePorts, WebAccount,
};
use chrono::{DateTime, TimeZone, Utc};

pub const GOLD: &str = "plan-gold";
pub const RENTAL: &str = "plan-rent";
pub const PURIFIER: &str = "ro-500";

pub fn at(y: i32, m: u32, d: u32) -> DateTime<Utc> {
    Utc.with_ymd_and_hms(y, m, d, 10, 0, 0).unwrap()
}

pub struct Harness {
    pub service: Arc<ContractService>,
    pub customers: Arc<InMemoryCustomerRepository>,
    pub contracts: Arc<InMemoryContractRepository>,
    pub accounts: Arc<InMemoryAccountDirectory>,
    pub plans: Arc<InMemoryPlanCatalog>,
    pub items: Arc<InMemoryItemCatalog>,
    pub notifier: Arc<RecordingNotificationSink>,
    pub clock: Arc<FixedClock>,
}

impl Harness {
    /// Engine at `now` with a 12-month Gold AMC plan of `quota` visits, a
    /// rental plan and one purifier in the catalog.
    pub fn new(now: DateTime<Utc>, quota: u32) -> Self {
        let customers = Arc::new(InMemoryCustomerRepository::new());
        let contracts = Arc::new(InMemoryContractRepository::new());
        let accounts = Arc::new(InMemoryAccountDirectory::new());
        let plans = Arc::new(InMemoryPlanCatalog::new());
        let items = Arc::new(InMemoryItemCatalog::new());
        let notifier = Arc::new(RecordingNotificationSink::new());
        let clock = Arc::new(FixedClock::new(now));

        plans.add(PlanTemplate {
            id: PlanId::from_string(GOLD),
            name: "Gold Care".into(),
            price: Money::rupees(2999),
            duration_months: 12,
            service_quota: quota,
            parts_included: true,
            is_active: true,
            image_url: Some("https://cdn.aquacare.in/plans/gold.png".into()),
        });
        plans.add(PlanTemplate {
            id: PlanId::from_string(RENTAL),
            name: "Home Rental".into(),
            price: Money::rupees(499),
            duration_months: 6,
            service_quota: 2,
            parts_included: true,
            is_active: true,
            image_url: None,
        });
        items.add(
            ItemRef::product(PURIFIER),
            CatalogItem {
                name: "AquaCare RO 500".into(),
                image_url: Some("https://cdn.aquacare.in/products/ro-500.png".into()),
                plan_ids: vec![PlanId::from_string(GOLD), PlanId::from_string(RENTAL)],
            },
        );

        let ports = ServicePorts {
            customers: customers.clone(),
            contracts: contracts.clone(),
            accounts: accounts.clone(),
            plans: plans.clone(),
            items: items.clone(),
            notifier: notifier.clone(),
            clock: clock.clone(),
        };
        let service = Arc::new(ContractService::new(ports, EngineConfig::default()));

        Self { service, customers, contracts, accounts, plans, items, notifier, clock }
    }

    pub fn account(&self, id: &str, phone: &str) -> AccountId {
        self.accounts.add(WebAccount::new(id, "Asha Verma").with_phone(phone));
        AccountId::from_string(id)
    }

    pub async fn profile(&self, mobile: &str) -> CustomerProfile {
        self.service
            .register_customer(NewCustomer {
                name: "Asha Verma".into(),
                mobile: mobile.into(),
                ..Default::default()
            })
            .await
            .unwrap()
    }

    pub fn paid_order(&self, account_id: &AccountId, order_id: &str) -> OrderCompleted {
        OrderCompleted {
            account_id: account_id.clone(),
            order_id: OrderId::from_string(order_id),
            items: vec![OrderLine {
                item: ItemRef::product(PURIFIER),
                plan_id: Some(PlanId::from_string(GOLD)),
                amount: Money::rupees(2999),
            }],
            fulfillment: Fulfillment::Purchase,
            payment: PaymentState::Paid,
            customer: None,
        }
    }
}
