//! Contract lifecycle across both stores

mod common;

use aquacare_contracts::application::dto::{
    BookRentalCommand, ConfirmPaymentCommand, CreateContractCommand, OrderLine, PageRequest, RenewContractCommand,
};
use aquacare_contracts::domain::aggregates::{ArchiveReason, CustomerType};
use aquacare_contracts::domain::services::AdminTerms;
use aquacare_contracts::domain::value_objects::ItemRef;
use aquacare_contracts::ports::outbound::NotificationKind;
use aquacare_contracts::{
    ContractKind, ContractRepository, ContractStatus, ContractUseCases, CustomerRepository, ErrorKind, Money,
    NewCustomer, OrderId, PaymentState, PlanId,
};
use chrono::Duration;
use common::{at, Harness, GOLD, RENTAL};

#[tokio::test]
async fn test_term_ends_and_sweep_expires_once() {
    let h = Harness::new(at(2024, 1, 15), 4);
    h.profile("9876543210").await;
    let account = h.account("acc-1", "9876543210");
    let contract = h.service.on_order_completed(h.paid_order(&account, "ord-1")).await.unwrap().remove(0);
    assert_eq!(contract.status(), ContractStatus::Active);
    assert_eq!(contract.end_date(), at(2025, 1, 15));

    let walk_in = h.profile("9123456780").await;
    let admin = h
        .service
        .create_contract(CreateContractCommand {
            customer_id: walk_in.id().clone(),
            kind: ContractKind::Amc,
            plan_id: PlanId::from_string(GOLD),
            terms: AdminTerms { start_date: Some(at(2024, 1, 1)), ..Default::default() },
        })
        .await
        .unwrap();

    let first = h.service.run_expiry_sweep(at(2025, 1, 16)).await.unwrap();
    assert_eq!(first.expired.len(), 2);
    assert!(first.expired.contains(contract.id()));
    assert!(first.expired.contains(admin.id()));
    assert!(first.failed.is_empty());

    let record = h.contracts.find_by_id(contract.id()).await.unwrap().unwrap();
    assert_eq!(record.status(), ContractStatus::Expired);
    let profile = h.service.resolve_customer(&account).await.unwrap().unwrap();
    assert_eq!(profile.current_amc().unwrap().status(), ContractStatus::Expired);

    let second = h.service.run_expiry_sweep(at(2025, 1, 16)).await.unwrap();
    assert!(second.is_noop());
    assert_eq!(h.notifier.count(NotificationKind::ContractExpired), 2);
}

#[tokio::test]
async fn test_renewal_archives_previous_and_starts_after_it() {
    let h = Harness::new(at(2024, 1, 15), 4);
    h.profile("9876543210").await;
    let account = h.account("acc-1", "9876543210");
    let previous = h.service.on_order_completed(h.paid_order(&account, "ord-1")).await.unwrap().remove(0);

    h.clock.set(at(2024, 12, 20));
    let renewed = h.service.renew_contract(RenewContractCommand::paid(previous.id().clone())).await.unwrap();

    assert_eq!(renewed.renewed_from(), Some(previous.id()));
    assert!(renewed.start_date() >= previous.end_date());
    assert_eq!(renewed.end_date(), at(2026, 1, 15));

    let old = h.contracts.find_by_id(previous.id()).await.unwrap().unwrap();
    assert_eq!(old.archived(), Some(ArchiveReason::Renewed));
    assert_eq!(old.start_date(), previous.start_date());
    assert_eq!(old.end_date(), previous.end_date());

    let profile = h.service.resolve_customer(&account).await.unwrap().unwrap();
    assert_eq!(profile.archive().len(), 1);
    assert_eq!(profile.archive()[0].id(), previous.id());
    assert_eq!(profile.current_amc().map(|c| c.id()), Some(renewed.id()));
    assert_eq!(h.notifier.count(NotificationKind::ContractRenewed), 1);
}

#[tokio::test]
async fn test_renewed_contract_cannot_be_renewed_again() {
    let h = Harness::new(at(2024, 1, 15), 4);
    h.profile("9876543210").await;
    let account = h.account("acc-1", "9876543210");
    let previous = h.service.on_order_completed(h.paid_order(&account, "ord-1")).await.unwrap().remove(0);

    h.clock.set(at(2024, 12, 20));
    let renewed = h.service.renew_contract(RenewContractCommand::paid(previous.id().clone())).await.unwrap();
    let err = h
        .service
        .renew_contract(RenewContractCommand::paid(previous.id().clone()))
        .await
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Conflict);

    let current: Vec<_> = h
        .contracts
        .find_by_account(&account)
        .await
        .unwrap()
        .into_iter()
        .filter(|c| c.kind() == ContractKind::Amc && c.archived().is_none())
        .collect();
    assert_eq!(current.len(), 1);
    assert_eq!(current[0].id(), renewed.id());

    let profile = h.service.resolve_customer(&account).await.unwrap().unwrap();
    assert_eq!(profile.archive().len(), 1);
    assert_eq!(profile.current_amc().map(|c| c.id()), Some(renewed.id()));
    assert_eq!(h.notifier.count(NotificationKind::ContractRenewed), 1);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_concurrent_renewals_keep_one_successor() {
    let h = Harness::new(at(2024, 12, 20), 4);
    let account = h.account("acc-1", "9876543210");
    let previous = h.service.on_order_completed(h.paid_order(&account, "ord-1")).await.unwrap().remove(0);

    let tasks: Vec<_> = (0..4)
        .map(|_| {
            let service = h.service.clone();
            let id = previous.id().clone();
            tokio::spawn(async move { service.renew_contract(RenewContractCommand::paid(id)).await })
        })
        .collect();
    let mut renewed = 0;
    for task in tasks {
        match task.await.unwrap() {
            Ok(_) => renewed += 1,
            Err(e) => assert_eq!(e.kind(), ErrorKind::Conflict),
        }
    }
    assert_eq!(renewed, 1);

    let unarchived = h
        .contracts
        .find_by_account(&account)
        .await
        .unwrap()
        .into_iter()
        .filter(|c| c.archived().is_none())
        .count();
    assert_eq!(unarchived, 1);
}

#[tokio::test]
async fn test_renewing_embedded_contract() {
    let h = Harness::new(at(2024, 1, 15), 4);
    let profile = h.profile("9876543210").await;
    let first = h
        .service
        .create_contract(CreateContractCommand {
            customer_id: profile.id().clone(),
            kind: ContractKind::Amc,
            plan_id: PlanId::from_string(GOLD),
            terms: AdminTerms::default(),
        })
        .await
        .unwrap();

    let renewed = h.service.renew_contract(RenewContractCommand::paid(first.id().clone())).await.unwrap();
    assert_eq!(renewed.start_date(), first.end_date());

    let stored = h.customers.find_by_id(profile.id()).await.unwrap().unwrap();
    assert_eq!(stored.archive().len(), 1);
    assert_eq!(stored.archive()[0].archived(), Some(ArchiveReason::Renewed));
    assert_eq!(stored.customer_type(), CustomerType::AmcCustomer);
}

#[tokio::test]
async fn test_cancelling_twice_conflicts_without_changes() {
    let h = Harness::new(at(2024, 1, 15), 4);
    let account = h.account("acc-1", "9876543210");
    let contract = h.service.on_order_completed(h.paid_order(&account, "ord-1")).await.unwrap().remove(0);

    let cancelled = h.service.cancel_contract(Some(&account), contract.id(), "moved city").await.unwrap();
    assert_eq!(cancelled.status(), ContractStatus::Cancelled);
    assert!(cancelled.notes().iter().any(|n| n.contains("moved city")));

    let before = h.contracts.find_by_id(contract.id()).await.unwrap().unwrap();
    let err = h.service.cancel_contract(Some(&account), contract.id(), "again").await.unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Conflict);

    let after = h.contracts.find_by_id(contract.id()).await.unwrap().unwrap();
    assert_eq!(after.version(), before.version());
    assert_eq!(after.notes(), before.notes());
}

#[tokio::test]
async fn test_terminal_contracts_reject_cancel_and_renew() {
    let h = Harness::new(at(2024, 1, 15), 4);
    let account = h.account("acc-1", "9876543210");
    let contract = h.service.on_order_completed(h.paid_order(&account, "ord-1")).await.unwrap().remove(0);

    h.service.run_expiry_sweep(at(2025, 2, 1)).await.unwrap();
    let before = h.contracts.find_by_id(contract.id()).await.unwrap().unwrap();
    let err = h.service.cancel_contract(None, contract.id(), "too late").await.unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Conflict);
    let after = h.contracts.find_by_id(contract.id()).await.unwrap().unwrap();
    assert_eq!(after.status(), ContractStatus::Expired);
    assert_eq!(after.version(), before.version());
    assert_eq!(after.notes(), before.notes());

    let cancelled = h.service.on_order_completed(h.paid_order(&account, "ord-2")).await.unwrap().remove(0);
    h.service.cancel_contract(None, cancelled.id(), "refund").await.unwrap();
    let err = h.service.renew_contract(RenewContractCommand::paid(cancelled.id().clone())).await.unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Conflict);
}

#[tokio::test]
async fn test_order_replay_returns_existing_contract() {
    let h = Harness::new(at(2024, 1, 15), 4);
    let account = h.account("acc-1", "9876543210");

    let first = h.service.on_order_completed(h.paid_order(&account, "ord-1")).await.unwrap();
    let replay = h.service.on_order_completed(h.paid_order(&account, "ord-1")).await.unwrap();

    assert_eq!(first.len(), 1);
    assert_eq!(replay.len(), 1);
    assert_eq!(first[0].id(), replay[0].id());
    assert_eq!(h.contracts.list_all().await.unwrap().len(), 1);
}

#[tokio::test]
async fn test_order_replay_installs_on_late_profile() {
    let h = Harness::new(at(2024, 1, 15), 4);
    let account = h.account("acc-1", "9876543210");
    let contract = h.service.on_order_completed(h.paid_order(&account, "ord-1")).await.unwrap().remove(0);
    assert!(h.service.resolve_customer(&account).await.unwrap().is_none());

    h.profile("9876543210").await;
    h.service.on_order_completed(h.paid_order(&account, "ord-1")).await.unwrap();

    let profile = h.service.resolve_customer(&account).await.unwrap().unwrap();
    assert_eq!(profile.current_amc().map(|c| c.id()), Some(contract.id()));
    let version = profile.version();

    h.service.on_order_completed(h.paid_order(&account, "ord-1")).await.unwrap();
    let profile = h.service.resolve_customer(&account).await.unwrap().unwrap();
    assert_eq!(profile.version(), version);
    assert!(profile.archive().is_empty());
    assert_eq!(h.contracts.list_all().await.unwrap().len(), 1);
}

#[tokio::test]
async fn test_order_cancellation_cancels_its_contracts() {
    let h = Harness::new(at(2024, 1, 15), 4);
    let account = h.account("acc-1", "9876543210");
    let mut order = h.paid_order(&account, "ord-1");
    order.items.push(OrderLine {
        item: ItemRef::part("filter-kit"),
        plan_id: Some(PlanId::from_string(GOLD)),
        amount: Money::rupees(2999),
    });
    order.items.push(OrderLine {
        item: ItemRef::part("tap"),
        plan_id: None,
        amount: Money::rupees(150),
    });
    let created = h.service.on_order_completed(order).await.unwrap();
    assert_eq!(created.len(), 2);

    let order_id = OrderId::from_string("ord-1");
    let cancelled = h.service.on_order_cancelled(&order_id, "returned").await.unwrap();
    assert_eq!(cancelled.len(), 2);
    assert!(cancelled.iter().all(|c| c.status() == ContractStatus::Cancelled));

    assert!(h.service.on_order_cancelled(&order_id, "returned").await.unwrap().is_empty());
}

#[tokio::test]
async fn test_pending_order_waits_for_payment() {
    let h = Harness::new(at(2024, 1, 15), 4);
    let account = h.account("acc-1", "9876543210");
    let mut order = h.paid_order(&account, "ord-1");
    order.payment = PaymentState::Pending;
    let contract = h.service.on_order_completed(order).await.unwrap().remove(0);
    assert_eq!(contract.status(), ContractStatus::Pending);

    let active = h
        .service
        .confirm_payment(ConfirmPaymentCommand {
            contract_id: contract.id().clone(),
            payment: PaymentState::Paid,
            amount_paid: Money::rupees(2999),
        })
        .await
        .unwrap();
    assert_eq!(active.status(), ContractStatus::Active);
    assert_eq!(h.notifier.count(NotificationKind::ContractActivated), 1);
}

#[tokio::test]
async fn test_self_service_record_wins_on_read() {
    let h = Harness::new(at(2024, 1, 15), 4);
    h.profile("9876543210").await;
    let account = h.account("acc-1", "9876543210");
    let contract = h.service.on_order_completed(h.paid_order(&account, "ord-1")).await.unwrap().remove(0);

    // Admin edits the embedded copy directly
    let mut profile = h.service.resolve_customer(&account).await.unwrap().unwrap();
    profile.current_mut(ContractKind::Amc).unwrap().hold(at(2024, 2, 1)).unwrap();
    h.customers.update(&profile).await.unwrap();

    let view = h
        .service
        .get_current_contract(&account, ContractKind::Amc)
        .await
        .unwrap()
        .unwrap();
    assert_eq!(&view.id, contract.id());
    assert!(view.self_service);
    assert_eq!(view.status, ContractStatus::Active);
    assert_eq!(view.plan_name, "Gold Care");
    assert_eq!(view.image_url.as_deref(), Some("https://cdn.aquacare.in/products/ro-500.png"));
    assert_eq!(view.amount, Some(Money::rupees(2999)));

    let page = h.service.get_my_contracts(&account, None, PageRequest::first()).await.unwrap();
    assert_eq!(page.total, 1);
    assert!(page.items[0].self_service);
}

#[tokio::test]
async fn test_summary_combines_both_stores() {
    let h = Harness::new(at(2024, 1, 15), 4);
    let profile = h.profile("9876543210").await;
    let account = h.account("acc-1", "9876543210");
    h.service.on_order_completed(h.paid_order(&account, "ord-1")).await.unwrap();
    h.service
        .create_contract(CreateContractCommand {
            customer_id: profile.id().clone(),
            kind: ContractKind::Rental,
            plan_id: PlanId::from_string(RENTAL),
            terms: AdminTerms::default(),
        })
        .await
        .unwrap();

    h.clock.set(at(2024, 7, 1));
    let summary = h.service.get_contract_summary(&account).await.unwrap();
    assert_eq!(summary.active, 2);
    assert_eq!(summary.expired, 0);
    assert!(summary.current_amc.as_ref().is_some_and(|v| v.self_service));
    assert!(summary.current_rental.as_ref().is_some_and(|v| !v.self_service));
    assert_eq!(summary.expiring_soon.len(), 1);
    assert_eq!(summary.expiring_soon[0].kind, ContractKind::Rental);

    let expired_only = h
        .service
        .get_my_contracts(&account, Some(ContractStatus::Expired), PageRequest::first())
        .await
        .unwrap();
    assert_eq!(expired_only.total, 0);
}

#[tokio::test]
async fn test_dashboard_counts_current_contracts() {
    let h = Harness::new(at(2024, 1, 15), 4);
    let walk_in = h.profile("9123456780").await;
    h.service
        .create_contract(CreateContractCommand {
            customer_id: walk_in.id().clone(),
            kind: ContractKind::Amc,
            plan_id: PlanId::from_string(GOLD),
            terms: AdminTerms { amount_paid: Some(Money::rupees(1000)), ..Default::default() },
        })
        .await
        .unwrap();

    let first = h.account("acc-1", "9876543210");
    h.service.on_order_completed(h.paid_order(&first, "ord-1")).await.unwrap();
    let second = h.account("acc-2", "9988776655");
    let dropped = h.service.on_order_completed(h.paid_order(&second, "ord-2")).await.unwrap().remove(0);
    h.service.cancel_contract(Some(&second), dropped.id(), "duplicate order").await.unwrap();

    let stats = h.service.admin_dashboard().await.unwrap();
    assert_eq!(stats.total, 3);
    assert_eq!(stats.active, 2);
    assert_eq!(stats.other, 1);
    assert_eq!(stats.expiring_soon, 0);
    assert_eq!(stats.revenue, Money::rupees(6998));

    h.clock.advance(Duration::days(345));
    let stats = h.service.admin_dashboard().await.unwrap();
    assert_eq!(stats.expiring_soon, 2);
    assert!(stats.expiring_soon <= stats.active);
}

#[tokio::test]
async fn test_rental_booking_creates_profile_then_activates() {
    let h = Harness::new(at(2024, 1, 15), 4);
    let booking = BookRentalCommand {
        customer: NewCustomer {
            name: "Kiran Rao".into(),
            mobile: "+91 99887 76655".into(),
            email: Some("Kiran@Example.com".into()),
            ..Default::default()
        },
        plan_id: PlanId::from_string(RENTAL),
        product_name: Some("AquaCare RO 500".into()),
        start_date: None,
        payment: PaymentState::Pending,
        amount_paid: None,
        notes: Some("Call before visiting".into()),
    };

    let rental = h.service.book_rental(booking.clone()).await.unwrap();
    assert_eq!(rental.kind(), ContractKind::Rental);
    assert_eq!(rental.status(), ContractStatus::Pending);

    let profile = h.customers.find_by_contract(rental.id()).await.unwrap().unwrap();
    assert_eq!(profile.customer_type(), CustomerType::Existing);
    assert_eq!(profile.email(), Some("kiran@example.com"));

    let active = h
        .service
        .confirm_payment(ConfirmPaymentCommand {
            contract_id: rental.id().clone(),
            payment: PaymentState::Paid,
            amount_paid: Money::rupees(499),
        })
        .await
        .unwrap();
    assert_eq!(active.status(), ContractStatus::Active);

    let second = h.service.book_rental(booking).await.unwrap();
    let profile = h.customers.find_by_contract(second.id()).await.unwrap().unwrap();
    assert_eq!(h.customers.list_all().await.unwrap().len(), 1);
    assert_eq!(profile.archive().len(), 1);
    assert_eq!(profile.archive()[0].id(), rental.id());
}

#[tokio::test]
async fn test_hold_and_resume() {
    let h = Harness::new(at(2024, 1, 15), 4);
    let account = h.account("acc-1", "9876543210");
    let contract = h.service.on_order_completed(h.paid_order(&account, "ord-1")).await.unwrap().remove(0);

    let held = h.service.hold_contract(contract.id()).await.unwrap();
    assert_eq!(held.status(), ContractStatus::OnHold);
    assert_eq!(h.service.hold_contract(contract.id()).await.unwrap_err().kind(), ErrorKind::Conflict);

    let resumed = h.service.resume_contract(contract.id()).await.unwrap();
    assert_eq!(resumed.status(), ContractStatus::Active);
}
