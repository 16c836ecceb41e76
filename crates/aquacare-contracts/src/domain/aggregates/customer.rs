//! Customer Profile Aggregate
//!
//! The admin-owned customer record. Holds at most one current AMC and one
//! current rental, an archive of past terms and the complaint tickets raised
//! against the customer's equipment.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::domain::aggregates::contract::{ArchiveReason, Contract, ContractKind};
use crate::domain::aggregates::ticket::{ComplaintTicket, TicketUpdate};
use crate::domain::events::{CustomerEvent, DomainEvent};
use crate::domain::value_objects::{
    Address, ContractId, CustomerId, Email, EmailError, Phone, PhoneError, TicketId,
};

/// Customer profile aggregate root
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct CustomerProfile {
    id: CustomerId,
    name: String,
    mobile: String,
    email: Option<String>,
    address: Option<Address>,
    customer_type: CustomerType,
    current_amc: Option<Contract>,
    current_rental: Option<Contract>,
    archive: Vec<Contract>,
    complaints: Vec<ComplaintTicket>,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
    version: u64,
    #[serde(skip)]
    events: Vec<DomainEvent>,
}

#[derive(Clone, Debug, Default)]
pub struct NewCustomer {
    pub name: String,
    pub mobile: String,
    pub email: Option<String>,
    pub address: Option<Address>,
}

impl CustomerProfile {
    /// Create a profile. The mobile is stored exactly as entered.
    pub fn create(new: NewCustomer, now: DateTime<Utc>) -> Result<Self, CustomerError> {
        let name = new.name.trim().to_string();
        if name.is_empty() {
            return Err(CustomerError::MissingName);
        }
        let mobile = Phone::new(new.mobile)?;
        let email = match new.email.as_deref().map(str::trim).filter(|e| !e.is_empty()) {
            Some(raw) => Some(Email::new(raw)?.as_str().to_string()),
            None => None,
        };

        let mut profile = Self {
            id: CustomerId::generate(now),
            name,
            mobile: mobile.raw().to_string(),
            email,
            address: new.address,
            customer_type: CustomerType::New,
            current_amc: None,
            current_rental: None,
            archive: vec![],
            complaints: vec![],
            created_at: now,
            updated_at: now,
            version: 0,
            events: vec![],
        };

        profile.raise_event(CustomerEvent::Created {
            customer_id: profile.id.clone(),
            created_at: now,
        });

        Ok(profile)
    }

    // Getters
    pub fn id(&self) -> &CustomerId { &self.id }
    pub fn name(&self) -> &str { &self.name }
    pub fn mobile(&self) -> &str { &self.mobile }
    pub fn email(&self) -> Option<&str> { self.email.as_deref() }
    pub fn address(&self) -> Option<&Address> { self.address.as_ref() }
    pub fn customer_type(&self) -> CustomerType { self.customer_type }
    pub fn current_amc(&self) -> Option<&Contract> { self.current_amc.as_ref() }
    pub fn current_rental(&self) -> Option<&Contract> { self.current_rental.as_ref() }
    pub fn archive(&self) -> &[Contract] { &self.archive }
    pub fn complaints(&self) -> &[ComplaintTicket] { &self.complaints }
    pub fn created_at(&self) -> DateTime<Utc> { self.created_at }
    pub fn updated_at(&self) -> DateTime<Utc> { self.updated_at }
    pub fn version(&self) -> u64 { self.version }

    pub fn current(&self, kind: ContractKind) -> Option<&Contract> {
        match kind {
            ContractKind::Amc => self.current_amc.as_ref(),
            ContractKind::Rental => self.current_rental.as_ref(),
        }
    }

    pub fn current_mut(&mut self, kind: ContractKind) -> Option<&mut Contract> {
        match kind {
            ContractKind::Amc => self.current_amc.as_mut(),
            ContractKind::Rental => self.current_rental.as_mut(),
        }
    }

    /// Current sub-documents, AMC first.
    pub fn current_contracts(&self) -> impl Iterator<Item = &Contract> {
        self.current_amc.iter().chain(self.current_rental.iter())
    }

    pub fn current_contracts_mut(&mut self) -> impl Iterator<Item = &mut Contract> {
        self.current_amc.iter_mut().chain(self.current_rental.iter_mut())
    }

    pub fn current_by_id(&self, id: &ContractId) -> Option<&Contract> {
        self.current_contracts().find(|c| c.id() == id)
    }

    pub fn current_by_id_mut(&mut self, id: &ContractId) -> Option<&mut Contract> {
        self.current_contracts_mut().find(|c| c.id() == id)
    }

    /// Install `contract` as the current one of its kind. An existing current
    /// contract is archived first. Returns the id of the archived term.
    pub fn install_contract(
        &mut self,
        mut contract: Contract,
        reason: ArchiveReason,
        now: DateTime<Utc>,
    ) -> Option<ContractId> {
        contract.take_events();
        let kind = contract.kind();
        let contract_id = contract.id().clone();

        let slot = match kind {
            ContractKind::Amc => &mut self.current_amc,
            ContractKind::Rental => &mut self.current_rental,
        };
        let replaced = slot.replace(contract).map(|mut previous| {
            if previous.archived().is_none() {
                previous.archive(reason, now);
            }
            previous.take_events();
            let id = previous.id().clone();
            self.archive.push(previous);
            id
        });

        if kind == ContractKind::Amc {
            self.customer_type = CustomerType::AmcCustomer;
        } else if self.customer_type == CustomerType::New {
            self.customer_type = CustomerType::Existing;
        }

        self.touch(now);
        self.raise_event(CustomerEvent::ContractInstalled {
            customer_id: self.id.clone(),
            contract_id,
            replaced: replaced.clone(),
        });
        replaced
    }

    /// Replace the embedded copy of `contract` if it is current here.
    pub fn sync_current(&mut self, contract: &Contract, now: DateTime<Utc>) -> bool {
        let Some(slot) = self.current_by_id_mut(contract.id()) else {
            return false;
        };
        let mut copy = contract.clone();
        copy.take_events();
        *slot = copy;
        self.touch(now);
        true
    }

    pub fn ticket(&self, id: &TicketId) -> Option<&ComplaintTicket> {
        self.complaints.iter().find(|t| &t.id == id)
    }

    pub fn open_ticket(&mut self, ticket: ComplaintTicket, now: DateTime<Utc>) {
        let ticket_id = ticket.id.clone();
        self.complaints.push(ticket);
        self.touch(now);
        self.raise_event(CustomerEvent::TicketOpened {
            customer_id: self.id.clone(),
            ticket_id,
        });
    }

    /// Apply an admin update to a ticket; `Ok(false)` when nothing changed.
    pub fn update_ticket(
        &mut self,
        id: &TicketId,
        update: &TicketUpdate,
        now: DateTime<Utc>,
    ) -> Result<bool, CustomerError> {
        let ticket = self
            .complaints
            .iter_mut()
            .find(|t| &t.id == id)
            .ok_or_else(|| CustomerError::UnknownTicket(id.clone()))?;

        if !ticket.apply(update) {
            return Ok(false);
        }
        let status = ticket.status;
        self.touch(now);
        self.raise_event(CustomerEvent::TicketUpdated {
            customer_id: self.id.clone(),
            ticket_id: id.clone(),
            status,
        });
        Ok(true)
    }

    pub fn set_version(&mut self, version: u64) {
        self.version = version;
    }

    pub(crate) fn archive_mut(&mut self) -> &mut Vec<Contract> {
        &mut self.archive
    }

    /// Get and clear accumulated domain events
    pub fn take_events(&mut self) -> Vec<DomainEvent> {
        std::mem::take(&mut self.events)
    }

    fn raise_event(&mut self, event: CustomerEvent) {
        self.events.push(DomainEvent::Customer(event));
    }

    fn touch(&mut self, now: DateTime<Utc>) {
        self.updated_at = now;
    }
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum CustomerType {
    #[default]
    New,
    Existing,
    AmcCustomer,
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum CustomerError {
    #[error("customer name is required")]
    MissingName,
    #[error("invalid mobile: {0}")]
    Phone(#[from] PhoneError),
    #[error("invalid email: {0}")]
    Email(#[from] EmailError),
    #[error("ticket {0} not found on this customer")]
    UnknownTicket(TicketId),
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::aggregates::contract::tests::draft;
    use crate::domain::aggregates::contract::ContractStatus;
    use crate::domain::aggregates::ticket::{ComplaintType, TicketPriority, TicketStatus};
    use chrono::TimeZone;

    fn now() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 1, 15, 10, 0, 0).unwrap()
    }

    fn profile() -> CustomerProfile {
        CustomerProfile::create(
            NewCustomer {
                name: "Asha Kulkarni".into(),
                mobile: "09876543210 (home)".into(),
                email: Some(" Asha@Example.com ".into()),
                address: None,
            },
            now(),
        )
        .unwrap()
    }

    #[test]
    fn test_create_keeps_raw_mobile() {
        let p = profile();
        assert_eq!(p.mobile(), "09876543210 (home)");
        assert_eq!(p.email(), Some("asha@example.com"));
        assert_eq!(p.customer_type(), CustomerType::New);
        assert!(p.id().as_str().starts_with("CUST24"));
    }

    #[test]
    fn test_create_requires_name() {
        let result = CustomerProfile::create(
            NewCustomer { mobile: "9876543210".into(), ..Default::default() },
            now(),
        );
        assert!(matches!(result, Err(CustomerError::MissingName)));
    }

    #[test]
    fn test_install_archives_previous_term() {
        let mut p = profile();
        let first = Contract::create(draft(now(), 2), now()).unwrap();
        assert!(p.install_contract(first, ArchiveReason::Replaced, now()).is_none());
        assert_eq!(p.customer_type(), CustomerType::AmcCustomer);

        let mut second_draft = draft(now(), 4);
        second_draft.id = ContractId::from_string("AMC-TEST-0002");
        let second = Contract::create(second_draft, now()).unwrap();
        let replaced = p.install_contract(second, ArchiveReason::Replaced, now());

        assert_eq!(replaced, Some(ContractId::from_string("AMC-TEST-0001")));
        assert_eq!(p.archive().len(), 1);
        assert_eq!(p.archive()[0].status(), ContractStatus::Expired);
        assert_eq!(p.archive()[0].archived(), Some(ArchiveReason::Replaced));
        assert_eq!(p.current_amc().map(|c| c.id().as_str()), Some("AMC-TEST-0002"));
    }

    #[test]
    fn test_update_unknown_ticket() {
        let mut p = profile();
        let result = p.update_ticket(&TicketId::from_string("TKT-x"), &TicketUpdate::default(), now());
        assert!(matches!(result, Err(CustomerError::UnknownTicket(_))));
    }

    #[test]
    fn test_ticket_update_raises_event_only_on_change() {
        let mut p = profile();
        p.take_events();
        let id = TicketId::from_string("TKT-1");
        p.open_ticket(
            ComplaintTicket::open(id.clone(), ComplaintType::NoWater, "No output", TicketPriority::High, now()),
            now(),
        );
        let update = TicketUpdate { status: Some(TicketStatus::Resolved), ..Default::default() };
        assert!(p.update_ticket(&id, &update, now()).unwrap());
        assert!(!p.update_ticket(&id, &update, now()).unwrap());
        assert_eq!(p.take_events().len(), 2);
    }
}
