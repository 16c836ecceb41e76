//! Contract factory
//!
//! Turns a plan template plus the context of a sale into a new contract:
//! dates, quota, pricing, initial status and a display id.

use chrono::{DateTime, Utc};

use crate::domain::aggregates::{
    Contract, ContractKind, ContractOrigin, ContractStatus, LifecycleError, NewContract, PaymentState,
    PlanTemplate,
};
use crate::domain::value_objects::{random_suffix, AccountId, ContractId, ItemRef, Money, OrderId};

/// Where a contract comes from and what the caller already decided.
#[derive(Clone, Debug)]
pub enum CreationContext {
    Order(OrderTerms),
    Admin(AdminTerms),
    Enquiry(EnquiryTerms),
    Renewal(RenewalTerms),
}

#[derive(Clone, Debug)]
pub struct OrderTerms {
    pub account_id: AccountId,
    pub order_id: OrderId,
    pub item: ItemRef,
    pub item_name: Option<String>,
    pub item_image: Option<String>,
    pub amount: Money,
    pub payment: PaymentState,
}

/// Admin form values. Every `Some` overrides the plan template.
#[derive(Clone, Debug, Default)]
pub struct AdminTerms {
    pub item: Option<ItemRef>,
    pub product_name: Option<String>,
    pub start_date: Option<DateTime<Utc>>,
    pub duration_months: Option<u32>,
    pub services_total: Option<u32>,
    pub amount: Option<Money>,
    pub amount_paid: Option<Money>,
    pub payment: PaymentState,
    pub technician: Option<String>,
    pub notes: Option<String>,
}

#[derive(Clone, Debug, Default)]
pub struct EnquiryTerms {
    pub product_name: Option<String>,
    pub start_date: Option<DateTime<Utc>>,
    pub amount_paid: Option<Money>,
    pub payment: PaymentState,
    pub notes: Option<String>,
}

#[derive(Clone, Debug)]
pub struct RenewalTerms {
    pub previous_id: ContractId,
    pub previous_end: DateTime<Utc>,
    pub origin: ContractOrigin,
    pub item: Option<ItemRef>,
    pub product_name: Option<String>,
    pub product_image: Option<String>,
    pub start_date: Option<DateTime<Utc>>,
    pub amount_paid: Option<Money>,
    pub payment: PaymentState,
}

impl RenewalTerms {
    /// Same customer and product lineage as `previous`.
    pub fn following(previous: &Contract) -> Self {
        Self {
            previous_id: previous.id().clone(),
            previous_end: previous.end_date(),
            origin: previous.origin().clone(),
            item: previous.item().cloned(),
            product_name: previous.product_name().map(String::from),
            product_image: previous.product_image().map(String::from),
            start_date: None,
            amount_paid: None,
            payment: PaymentState::Paid,
        }
    }
}

#[derive(Clone, Debug)]
pub struct ContractFactory {
    default_duration_months: u32,
    default_rental_quota: u32,
}

impl ContractFactory {
    pub fn new(default_duration_months: u32, default_rental_quota: u32) -> Self {
        Self {
            default_duration_months,
            default_rental_quota,
        }
    }

    pub fn create_amc(
        &self,
        plan: &PlanTemplate,
        context: CreationContext,
        now: DateTime<Utc>,
    ) -> Result<Contract, LifecycleError> {
        self.create(ContractKind::Amc, plan, context, now)
    }

    pub fn create_rental(
        &self,
        plan: &PlanTemplate,
        context: CreationContext,
        now: DateTime<Utc>,
    ) -> Result<Contract, LifecycleError> {
        self.create(ContractKind::Rental, plan, context, now)
    }

    pub fn create(
        &self,
        kind: ContractKind,
        plan: &PlanTemplate,
        context: CreationContext,
        now: DateTime<Utc>,
    ) -> Result<Contract, LifecycleError> {
        let self_service = matches!(context, CreationContext::Order(_) | CreationContext::Enquiry(_));
        if self_service && !plan.is_active {
            return Err(LifecycleError::PlanUnavailable(plan.id.clone()));
        }

        let mut draft = NewContract {
            id: generate_id(kind, now),
            kind,
            origin: ContractOrigin::Admin,
            item: None,
            plan_id: Some(plan.id.clone()),
            plan_name: plan.name.clone(),
            product_name: None,
            product_image: plan.image_url.clone(),
            start_date: now,
            duration_months: self.duration(plan, None),
            services_total: self.quota(kind, plan, None),
            parts_included: plan.parts_included,
            amount: Some(plan.price),
            amount_paid: Money::zero(),
            payment_state: PaymentState::Pending,
            status: ContractStatus::Pending,
            technician: None,
            notes: None,
            renewed_from: None,
        };

        match context {
            CreationContext::Order(terms) => {
                draft.origin = ContractOrigin::WebOrder {
                    account_id: terms.account_id,
                    order_id: Some(terms.order_id),
                };
                draft.item = Some(terms.item);
                draft.product_name = terms.item_name;
                if terms.item_image.is_some() {
                    draft.product_image = terms.item_image;
                }
                draft.amount = Some(terms.amount);
                draft.payment_state = terms.payment;
                if terms.payment == PaymentState::Paid {
                    draft.amount_paid = terms.amount;
                    draft.status = ContractStatus::Active;
                }
            }
            CreationContext::Admin(terms) => {
                draft.item = terms.item;
                draft.product_name = terms.product_name;
                draft.start_date = terms.start_date.unwrap_or(now);
                draft.duration_months = self.duration(plan, terms.duration_months);
                draft.services_total = self.quota(kind, plan, terms.services_total);
                if terms.amount.is_some() {
                    draft.amount = terms.amount;
                }
                draft.amount_paid = terms.amount_paid.unwrap_or_else(Money::zero);
                draft.payment_state = terms.payment;
                draft.status = ContractStatus::Active;
                draft.technician = terms.technician;
                draft.notes = terms.notes;
            }
            CreationContext::Enquiry(terms) => {
                draft.origin = ContractOrigin::Enquiry;
                draft.product_name = terms.product_name;
                draft.start_date = terms.start_date.unwrap_or(now);
                draft.amount_paid = terms.amount_paid.unwrap_or_else(Money::zero);
                draft.payment_state = terms.payment;
                if terms.payment == PaymentState::Paid {
                    draft.status = ContractStatus::Active;
                }
                draft.notes = terms.notes;
            }
            CreationContext::Renewal(terms) => {
                draft.origin = terms.origin;
                draft.item = terms.item;
                draft.product_name = terms.product_name;
                if terms.product_image.is_some() {
                    draft.product_image = terms.product_image;
                }
                let requested = terms.start_date.unwrap_or(now);
                draft.start_date = requested.max(terms.previous_end);
                draft.payment_state = terms.payment;
                draft.amount_paid = match (terms.amount_paid, terms.payment) {
                    (Some(paid), _) => paid,
                    (None, PaymentState::Paid) => plan.price,
                    (None, _) => Money::zero(),
                };
                draft.status = ContractStatus::Active;
                draft.renewed_from = Some(terms.previous_id);
            }
        }

        Contract::create(draft, now)
    }

    /// Explicit override, then the plan, then the configured default.
    fn duration(&self, plan: &PlanTemplate, explicit: Option<u32>) -> u32 {
        explicit
            .filter(|m| *m > 0)
            .or(Some(plan.duration_months).filter(|m| *m > 0))
            .unwrap_or(self.default_duration_months)
    }

    fn quota(&self, kind: ContractKind, plan: &PlanTemplate, explicit: Option<u32>) -> u32 {
        let quota = explicit.unwrap_or(plan.service_quota);
        if kind == ContractKind::Rental && quota == 0 {
            self.default_rental_quota
        } else {
            quota
        }
    }
}

/// `AMC-<yymmddHHMMSS>-<4 alphanumerics>`, `RNT-` for rentals.
pub fn generate_id(kind: ContractKind, now: DateTime<Utc>) -> ContractId {
    ContractId::from_string(format!(
        "{}-{}-{}",
        kind.id_prefix(),
        now.format("%y%m%d%H%M%S"),
        random_suffix(4)
    ))
}
