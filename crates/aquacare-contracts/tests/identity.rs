//! Account to profile reconciliation

mod common;

use aquacare_contracts::{ContractUseCases, ContractKind, ErrorKind, NewCustomer};
use common::{at, Harness};
use proptest::prelude::*;

#[tokio::test]
async fn test_formatted_numbers_link_to_same_profile() {
    let h = Harness::new(at(2024, 1, 15), 4);
    let profile = h.profile("09876543210 (home)").await;
    let account = h.account("acc-1", "+91 98765-43210");

    let resolved = h.service.resolve_customer(&account).await.unwrap().unwrap();
    assert_eq!(resolved.id(), profile.id());
}

#[tokio::test]
async fn test_unmatched_account_resolves_to_nothing() {
    let h = Harness::new(at(2024, 1, 15), 4);
    h.profile("9876543210").await;
    let account = h.account("acc-2", "9123456780");

    assert!(h.service.resolve_customer(&account).await.unwrap().is_none());
    assert!(h.service.get_current_contract(&account, ContractKind::Amc).await.unwrap().is_none());
}

#[tokio::test]
async fn test_registering_same_mobile_twice_conflicts() {
    let h = Harness::new(at(2024, 1, 15), 4);
    h.profile("98765 43210").await;

    let err = h
        .service
        .register_customer(NewCustomer {
            name: "Someone Else".into(),
            mobile: "9876543210".into(),
            ..Default::default()
        })
        .await
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Conflict);
}

#[tokio::test]
async fn test_order_contract_lands_on_matching_profile() {
    let h = Harness::new(at(2024, 1, 15), 4);
    let profile = h.profile("+91-98765-43210").await;
    let account = h.account("acc-1", "9876543210");

    let created = h.service.on_order_completed(h.paid_order(&account, "ord-1")).await.unwrap();
    assert_eq!(created.len(), 1);

    let stored = h.service.resolve_customer(&account).await.unwrap().unwrap();
    assert_eq!(stored.id(), profile.id());
    assert_eq!(stored.current_amc().map(|c| c.id()), Some(created[0].id()));
}

fn formatted(digits: &str, style: u8) -> String {
    match style % 5 {
        0 => digits.to_string(),
        1 => format!("+91 {}-{}", &digits[..5], &digits[5..]),
        2 => format!("0{digits}"),
        3 => format!("{} {} {}", &digits[..3], &digits[3..6], &digits[6..]),
        _ => format!("{digits} (home)"),
    }
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(32))]

    #[test]
    fn prop_same_ten_digits_resolve_to_same_profile(
        digits in "[6-9][0-9]{9}",
        stored_style in 0u8..5,
        account_style in 0u8..5,
    ) {
        let h = Harness::new(at(2024, 1, 15), 4);
        let resolved = tokio_test::block_on(async {
            let profile = h.profile(&formatted(&digits, stored_style)).await;
            let account = h.account("acc-prop", &formatted(&digits, account_style));
            let found = h.service.resolve_customer(&account).await.unwrap();
            (profile.id().clone(), found.map(|p| p.id().clone()))
        });
        prop_assert_eq!(Some(resolved.0), resolved.1);
    }
}
