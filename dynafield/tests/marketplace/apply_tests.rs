use super::support::*;

#[tokio::test]
async fn missing_required_fields_are_reported_together() {
    let market = Marketplace::new();
    let listing = market.add_listing("Deep clean", 3000);

    let raw = object(json!({"insured": true}));
    let err = market
        .engine
        .apply_values(listing.id, &raw, ApplyMode::Create)
        .await
        .expect_err("required fields missing");

    let EngineError::Validation(validation) = err else {
        panic!("expected a validation error, got {err:?}");
    };
    let fields = validation.fields();
    assert!(fields.contains(&"experience"));
    assert!(fields.contains(&"frequency"));
    assert_eq!(market.store().value_row_count(listing.id), 0);
}

#[tokio::test]
async fn non_numeric_value_rejects_naming_the_key() {
    let market = Marketplace::new();
    let listing = market.add_listing("Deep clean", 3000);

    let mut raw = full_values();
    raw.insert("experience".into(), json!("plenty"));
    let err = market
        .engine
        .apply_values(listing.id, &raw, ApplyMode::Create)
        .await
        .expect_err("non-numeric experience");

    let EngineError::Validation(validation) = err else {
        panic!("expected a validation error, got {err:?}");
    };
    assert_eq!(validation.fields(), vec!["experience"]);
    assert_eq!(market.store().value_row_count(listing.id), 0);
}

#[tokio::test]
async fn one_bad_key_aborts_the_whole_apply() {
    let market = Marketplace::new();
    let listing = market.add_listing("Deep clean", 3000);

    let mut raw = full_values();
    raw.insert("frequency".into(), json!("yearly"));
    let err = market
        .engine
        .apply_values(listing.id, &raw, ApplyMode::Create)
        .await
        .expect_err("unknown option");

    let EngineError::Validation(validation) = err else {
        panic!("expected a validation error, got {err:?}");
    };
    assert_eq!(validation.fields(), vec!["frequency"]);
    assert!(validation.issues[0].message.contains("yearly"));
    // The valid keys in the same call must not have been written either.
    assert_eq!(market.store().value_row_count(listing.id), 0);
}

#[tokio::test]
async fn applied_scalars_come_back_typed() {
    let market = Marketplace::new();
    let listing = market.add_listing("Deep clean", 3000);

    let applied: AppliedValues = market
        .engine
        .apply_values(listing.id, &full_values(), ApplyMode::Create)
        .await
        .expect("apply");

    assert_eq!(applied.get("experience"), Some(&AttrValue::Number(5.0)));
    assert_eq!(applied.get("insured"), Some(&AttrValue::Bool(true)));
    assert_eq!(
        applied.get("bio"),
        Some(&AttrValue::Text("Fast and friendly team".into()))
    );
    assert!(matches!(applied.get("frequency"), Some(AttrValue::Choice(Some(_)))));
    assert!(matches!(applied.get("available_from"), Some(AttrValue::Date(_))));
    assert!(matches!(applied.get("opening_hours"), Some(AttrValue::Json(_))));
    assert_eq!(market.store().value_row_count(listing.id), 7);
}

#[tokio::test]
async fn multiselect_drops_unknown_tokens_silently() {
    let market = Marketplace::new();
    let listing = market.add_listing("Deep clean", 3000);

    let mut raw = full_values();
    raw.insert("extras".into(), json!("windows,carwash,ironing"));
    market
        .engine
        .apply_values(listing.id, &raw, ApplyMode::Create)
        .await
        .expect("unknown tokens are dropped, not rejected");

    let stored = market.store().listing_values(listing.id).await.expect("values");
    let extras = stored
        .iter()
        .find(|value| value.field_id == market.extras.id)
        .expect("extras row");
    let AttrValue::Choices(linked) = &extras.value else {
        panic!("extras must be a multi-choice value");
    };
    assert_eq!(linked.len(), 2);
}

#[tokio::test]
async fn empty_multiselect_still_creates_a_row() {
    let market = Marketplace::new();
    let listing = market.add_listing("Deep clean", 3000);

    let mut raw = full_values();
    raw.insert("extras".into(), json!([]));
    market
        .engine
        .apply_values(listing.id, &raw, ApplyMode::Create)
        .await
        .expect("answered with nothing selected");

    let stored = market.store().listing_values(listing.id).await.expect("values");
    let extras = stored
        .iter()
        .find(|value| value.field_id == market.extras.id)
        .expect("row exists even with zero selections");
    assert_eq!(extras.value, AttrValue::Choices(vec![]));
    assert_eq!(market.store().option_link_count(listing.id), 1); // frequency only
}

#[tokio::test]
async fn toggle_coercion_never_fails() {
    let market = Marketplace::new();
    let listing = market.add_listing("Deep clean", 3000);

    let mut raw = full_values();
    raw.insert("insured".into(), json!("definitely"));
    let applied = market
        .engine
        .apply_values(listing.id, &raw, ApplyMode::Create)
        .await
        .expect("unrecognized tokens coerce to false");
    assert_eq!(applied.get("insured"), Some(&AttrValue::Bool(false)));
}

#[tokio::test]
async fn replace_mode_is_idempotent() {
    let market = Marketplace::new();
    let listing = market.add_listing("Deep clean", 3000);

    for _ in 0..2 {
        market
            .engine
            .apply_values(listing.id, &full_values(), ApplyMode::Replace)
            .await
            .expect("replace apply");
    }

    assert_eq!(market.store().value_row_count(listing.id), 7);
    // windows + ironing + the single frequency link.
    assert_eq!(market.store().option_link_count(listing.id), 3);
}

#[tokio::test]
async fn create_mode_conflicts_on_existing_rows() {
    let market = Marketplace::new();
    let listing = market.add_listing("Deep clean", 3000);

    market
        .engine
        .apply_values(listing.id, &full_values(), ApplyMode::Create)
        .await
        .expect("first apply");
    let err = market
        .engine
        .apply_values(listing.id, &full_values(), ApplyMode::Create)
        .await
        .expect_err("second create must conflict");

    assert!(err.is_retryable());
    assert!(matches!(err, EngineError::Conflict { .. }));
    assert_eq!(market.store().value_row_count(listing.id), 7);
}

#[tokio::test]
async fn replace_updates_values_in_place() {
    let market = Marketplace::new();
    let listing = market.add_listing("Deep clean", 3000);

    market
        .engine
        .apply_values(listing.id, &full_values(), ApplyMode::Create)
        .await
        .expect("initial apply");

    let mut raw = full_values();
    raw.insert("experience".into(), json!(12));
    raw.insert("extras".into(), json!("laundry"));
    market
        .engine
        .apply_values(listing.id, &raw, ApplyMode::Replace)
        .await
        .expect("replace apply");

    let stored = market.store().listing_values(listing.id).await.expect("values");
    let experience = stored.iter().find(|value| value.field_id == market.experience.id).expect("row");
    assert_eq!(experience.value, AttrValue::Number(12.0));
    let extras = stored.iter().find(|value| value.field_id == market.extras.id).expect("row");
    assert!(matches!(&extras.value, AttrValue::Choices(linked) if linked.len() == 1));
    assert_eq!(market.store().value_row_count(listing.id), 7);
}

#[tokio::test]
async fn out_of_bounds_number_is_a_validation_error() {
    let market = Marketplace::new();
    let listing = market.add_listing("Deep clean", 3000);

    let mut raw = full_values();
    raw.insert("experience".into(), json!(80));
    let err = market
        .engine
        .apply_values(listing.id, &raw, ApplyMode::Create)
        .await
        .expect_err("beyond the field's max");

    let EngineError::Validation(validation) = err else {
        panic!("expected a validation error, got {err:?}");
    };
    assert_eq!(validation.issues[0].code, "validation.range");
}

#[tokio::test]
async fn unknown_raw_keys_are_ignored() {
    let market = Marketplace::new();
    let listing = market.add_listing("Deep clean", 3000);

    let mut raw = full_values();
    raw.insert("pet_friendly".into(), json!("yes"));
    let applied = market
        .engine
        .apply_values(listing.id, &raw, ApplyMode::Create)
        .await
        .expect("unknown keys are skipped");
    assert!(!applied.contains_key("pet_friendly"));
    assert_eq!(market.store().value_row_count(listing.id), 7);
}

#[tokio::test]
async fn applying_to_a_missing_listing_is_not_found() {
    let market = Marketplace::new();
    let err = market
        .engine
        .apply_values(9999, &full_values(), ApplyMode::Create)
        .await
        .expect_err("listing does not exist");
    assert!(matches!(err, EngineError::NotFound { entity: "listing", .. }));
}
