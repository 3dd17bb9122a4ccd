use super::support::*;

#[tokio::test]
async fn document_carries_fixed_columns_and_every_bound_field() {
    let market = Marketplace::new();
    let listing = market.add_listing("Deep clean", 3000);
    market
        .engine
        .apply_values(listing.id, &full_values(), ApplyMode::Create)
        .await
        .expect("apply");

    let document = market.engine.project_for_index(listing.id).await.expect("project");
    assert_eq!(document.id, listing.id);

    let body = &document.body;
    assert_eq!(body["id"], json!(listing.id));
    assert_eq!(body["title"], json!("Deep clean"));
    assert_eq!(body["service_type"], json!("cleaning"));
    assert_eq!(body["service_type_id"], json!(market.cleaning.id));
    assert_eq!(body["price"], json!(3000));
    assert_eq!(body["location"], json!("Lyon"));
    assert_eq!(body["created_at"], json!(listing.created_at.timestamp()));
    assert_eq!(body["updated_at"], json!(listing.updated_at.timestamp()));

    assert_eq!(body["experience"], json!(5));
    assert_eq!(body["insured"], json!(true));
    assert_eq!(body["frequency"], json!("weekly"));
    assert_eq!(body["extras"], json!(["windows", "ironing"]));
    assert_eq!(body["bio"], json!("Fast and friendly team"));
    assert_eq!(body["available_from"], json!("2024-06-01T00:00:00Z"));
    assert_eq!(body["opening_hours"], json!({"mon": [9, 18], "sat": [10, 14]}));
}

#[tokio::test]
async fn fields_without_values_project_their_empty_shape() {
    let market = Marketplace::new();
    let listing = market.add_listing("Deep clean", 3000);

    let mut raw = full_values();
    raw.remove("insured");
    raw.remove("extras");
    raw.remove("bio");
    raw.remove("available_from");
    raw.remove("opening_hours");
    market
        .engine
        .apply_values(listing.id, &raw, ApplyMode::Create)
        .await
        .expect("apply");

    let body = market.engine.project_for_index(listing.id).await.expect("project").body;
    assert_eq!(body["insured"], json!(false));
    assert_eq!(body["extras"], json!([]));
    assert_eq!(body["bio"], json!(null));
    assert_eq!(body["available_from"], json!(null));
    assert_eq!(body["opening_hours"], json!(null));
}

#[tokio::test]
async fn reapplying_the_same_values_projects_byte_identical_documents() {
    let market = Marketplace::new();
    let listing = market.add_listing("Deep clean", 3000);

    market
        .engine
        .apply_values(listing.id, &full_values(), ApplyMode::Replace)
        .await
        .expect("first apply");
    let first = serde_json::to_string(&market.engine.project_for_index(listing.id).await.expect("project"))
        .expect("serialize");

    market
        .engine
        .apply_values(listing.id, &full_values(), ApplyMode::Replace)
        .await
        .expect("second apply");
    let second = serde_json::to_string(&market.engine.project_for_index(listing.id).await.expect("project"))
        .expect("serialize");

    assert_eq!(first, second);
}

#[tokio::test]
async fn sync_replaces_the_document_delete_first() {
    let market = Marketplace::new();
    let listing = market.add_listing("Deep clean", 3000);
    market
        .engine
        .apply_values(listing.id, &full_values(), ApplyMode::Create)
        .await
        .expect("apply");

    market.engine.sync_listing(listing.id).await.expect("sync");

    assert_eq!(market.index().deletions(), vec![listing.id]);
    let document = market.index().document_for(listing.id).expect("document stored");
    assert_eq!(document.body["frequency"], json!("weekly"));

    // A second sync after a value change replaces, never accumulates.
    let mut raw = full_values();
    raw.insert("frequency".into(), json!("monthly"));
    market
        .engine
        .apply_values(listing.id, &raw, ApplyMode::Replace)
        .await
        .expect("replace");
    market.engine.sync_listing(listing.id).await.expect("second sync");

    let document = market.index().document_for(listing.id).expect("document stored");
    assert_eq!(document.body["frequency"], json!("monthly"));
    assert_eq!(market.index().deletions(), vec![listing.id, listing.id]);
}

#[tokio::test]
async fn index_failures_never_fail_the_caller() {
    let market = Marketplace::new();
    let listing = market.add_listing("Deep clean", 3000);
    market
        .engine
        .apply_values(listing.id, &full_values(), ApplyMode::Create)
        .await
        .expect("apply");

    market.index().fail_writes(true);
    market
        .engine
        .sync_listing(listing.id)
        .await
        .expect("index outage is swallowed");
    assert!(market.index().document_for(listing.id).is_none());
}

#[tokio::test]
async fn rebuild_reprojects_every_listing_and_counts_failures() {
    let market = Marketplace::new();
    let first = market.add_listing("Deep clean", 3000);
    let second = market.add_listing("Office clean", 5000);
    for listing in [&first, &second] {
        market
            .engine
            .apply_values(listing.id, &full_values(), ApplyMode::Create)
            .await
            .expect("apply");
    }

    market.index().fail_writes(true);
    let report = market.engine.rebuild_index().await.expect("rebuild runs through");
    assert_eq!(report.projected, 0);
    assert_eq!(report.failed, 2);

    market.index().fail_writes(false);
    let report = market.engine.rebuild_index().await.expect("rebuild");
    assert_eq!(report.projected, 2);
    assert_eq!(report.failed, 0);
    assert!(market.index().document_for(first.id).is_some());
    assert!(market.index().document_for(second.id).is_some());
}

#[tokio::test]
async fn excerpt_is_truncated_in_the_document() {
    let market = Marketplace::new();
    let listing = market.store().add_listing(Listing {
        id: 0,
        service_type_id: market.cleaning.id,
        title: "Wordy".into(),
        body: "détail ".repeat(100),
        price: 100,
        location: "Lyon".into(),
        created_at: Utc.with_ymd_and_hms(2024, 5, 1, 8, 0, 0).unwrap(),
        updated_at: Utc.with_ymd_and_hms(2024, 5, 1, 8, 0, 0).unwrap(),
    });
    market
        .engine
        .apply_values(listing.id, &full_values(), ApplyMode::Create)
        .await
        .expect("apply");

    let body = market.engine.project_for_index(listing.id).await.expect("project").body;
    let excerpt = body["excerpt"].as_str().expect("excerpt is text");
    assert_eq!(excerpt.chars().count(), dynafield::EXCERPT_MAX_CHARS);
    assert!(excerpt.ends_with('…'));
}

#[tokio::test]
async fn configure_index_declares_the_schema_attribute_lists() {
    let market = Marketplace::new();
    market.engine.configure_index("cleaning").await.expect("configure");

    let settings = market.index().settings().expect("settings recorded");
    assert!(settings.searchable_attributes.contains(&"bio".to_string()));
    assert!(settings.filterable_attributes.contains(&"extras".to_string()));
    // Hidden-in-filter bindings stay out of the filterable list.
    assert!(!settings.filterable_attributes.contains(&"pro_equipment".to_string()));
    assert!(settings.sortable_attributes.contains(&"experience".to_string()));
    assert!(settings.sortable_attributes.contains(&"price".to_string()));
}

#[tokio::test]
async fn projecting_a_missing_listing_is_not_found() {
    let market = Marketplace::new();
    let err = market.engine.project_for_index(404).await.expect_err("no listing");
    assert!(matches!(err, EngineError::NotFound { entity: "listing", .. }));
}
