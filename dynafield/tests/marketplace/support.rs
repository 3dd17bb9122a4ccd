//! Shared fixtures: a home-cleaning service type with one field of every
//! flavor, an in-memory store, and a recording fake index.

use std::sync::Mutex;
use std::sync::atomic::{AtomicBool, Ordering};

pub(crate) use chrono::{TimeZone, Utc};
pub(crate) use dynafield::{
    AppliedValues, ApplyMode, AttrValue, AttributeEngine, EngineError, Field, IndexDocument, IndexError,
    IndexSettings, InputType, Listing, MemoryStore, RawValues, SearchHits, SearchIndex, SearchRequest,
    ServiceType, ServiceTypeField, ValueStore,
};
pub(crate) use serde_json::{Map, Value, json};

/// Recording stand-in for the external index. Failures are simulated via
/// `fail_writes`, which makes every call return a 503.
#[derive(Debug, Default)]
pub(crate) struct FakeIndex {
    documents: Mutex<Vec<IndexDocument>>,
    deletions: Mutex<Vec<i64>>,
    settings: Mutex<Option<IndexSettings>>,
    fail: AtomicBool,
}

impl FakeIndex {
    pub(crate) fn new() -> Self {
        Self::default()
    }

    pub(crate) fn fail_writes(&self, fail: bool) {
        self.fail.store(fail, Ordering::SeqCst);
    }

    pub(crate) fn document_for(&self, listing_id: i64) -> Option<IndexDocument> {
        self.documents
            .lock()
            .expect("index lock")
            .iter()
            .find(|document| document.id == listing_id)
            .cloned()
    }

    pub(crate) fn deletions(&self) -> Vec<i64> {
        self.deletions.lock().expect("index lock").clone()
    }

    pub(crate) fn settings(&self) -> Option<IndexSettings> {
        self.settings.lock().expect("index lock").clone()
    }

    fn check_available(&self) -> Result<(), IndexError> {
        if self.fail.load(Ordering::SeqCst) {
            return Err(IndexError::Status {
                status: 503,
                body: "index unavailable".into(),
            });
        }
        Ok(())
    }
}

impl SearchIndex for FakeIndex {
    async fn add_or_update(&self, document: &IndexDocument) -> Result<(), IndexError> {
        self.check_available()?;
        let mut documents = self.documents.lock().expect("index lock");
        documents.retain(|existing| existing.id != document.id);
        documents.push(document.clone());
        Ok(())
    }

    async fn delete_by_id(&self, listing_id: i64) -> Result<(), IndexError> {
        self.check_available()?;
        self.deletions.lock().expect("index lock").push(listing_id);
        self.documents
            .lock()
            .expect("index lock")
            .retain(|existing| existing.id != listing_id);
        Ok(())
    }

    async fn search(&self, _request: &SearchRequest) -> Result<SearchHits, IndexError> {
        self.check_available()?;
        Ok(SearchHits::default())
    }

    async fn configure(&self, settings: &IndexSettings) -> Result<(), IndexError> {
        self.check_available()?;
        *self.settings.lock().expect("index lock") = Some(settings.clone());
        Ok(())
    }
}

pub(crate) struct Marketplace {
    pub(crate) engine: AttributeEngine<MemoryStore, FakeIndex>,
    pub(crate) cleaning: ServiceType,
    pub(crate) experience: Field,
    pub(crate) extras: Field,
}

impl Marketplace {
    pub(crate) fn new() -> Self {
        let _ = env_logger::builder().is_test(true).try_init();

        let store = MemoryStore::new();
        let cleaning = store.add_service_type("Home cleaning", "cleaning");

        let experience = store.add_field(
            Field::new("experience", "Years of experience", InputType::Number)
                .with_bounds(Some(0.0), Some(50.0))
                .filterable()
                .sortable(),
        );
        store.bind(ServiceTypeField::new(cleaning.id, experience.id).required().at_position(0));

        let frequency = store.add_field(Field::new("frequency", "Frequency", InputType::Select).filterable());
        store.add_option(frequency.id, "Weekly", "weekly");
        store.add_option(frequency.id, "Biweekly", "biweekly");
        store.add_option(frequency.id, "Monthly", "monthly");
        store.bind(ServiceTypeField::new(cleaning.id, frequency.id).required().at_position(1));

        let insured = store.add_field(Field::new("insured", "Insured", InputType::Toggle).filterable());
        store.bind(ServiceTypeField::new(cleaning.id, insured.id).at_position(2));

        let extras = store.add_field(Field::new("extras", "Included extras", InputType::Multiselect).filterable());
        store.add_option(extras.id, "Windows", "windows");
        store.add_option(extras.id, "Ironing", "ironing");
        store.add_option(extras.id, "Laundry", "laundry");
        store.bind(ServiceTypeField::new(cleaning.id, extras.id).at_position(3));

        let bio = store.add_field(
            Field::new("bio", "About the provider", InputType::Textarea)
                .filterable()
                .searchable(),
        );
        store.bind(ServiceTypeField::new(cleaning.id, bio.id).at_position(4));

        let available_from = store.add_field(Field::new("available_from", "Available from", InputType::Date));
        store.bind(ServiceTypeField::new(cleaning.id, available_from.id).at_position(5));

        let opening_hours = store.add_field(Field::new("opening_hours", "Opening hours", InputType::Json));
        store.bind(ServiceTypeField::new(cleaning.id, opening_hours.id).at_position(6));

        // Filterable field whose binding hides it from this category's
        // filter surface.
        let pro_equipment =
            store.add_field(Field::new("pro_equipment", "Professional equipment", InputType::Toggle).filterable());
        store.bind(
            ServiceTypeField::new(cleaning.id, pro_equipment.id)
                .hidden_in_filter()
                .at_position(7),
        );

        Self {
            engine: AttributeEngine::new(store, FakeIndex::new()),
            cleaning,
            experience,
            extras,
        }
    }

    pub(crate) fn store(&self) -> &MemoryStore {
        self.engine.store()
    }

    pub(crate) fn index(&self) -> &FakeIndex {
        self.engine.index()
    }

    pub(crate) fn add_listing(&self, title: &str, price: i64) -> Listing {
        self.store().add_listing(Listing {
            id: 0,
            service_type_id: self.cleaning.id,
            title: title.to_string(),
            body: format!("{title}: reliable, references available, flexible schedule."),
            price,
            location: "Lyon".to_string(),
            created_at: Utc.with_ymd_and_hms(2024, 5, 1, 8, 0, 0).unwrap(),
            updated_at: Utc.with_ymd_and_hms(2024, 5, 2, 9, 30, 0).unwrap(),
        })
    }
}

/// Convert a json object literal into a parameter/value map.
pub(crate) fn object(value: Value) -> Map<String, Value> {
    match value {
        Value::Object(map) => map,
        other => panic!("expected a json object, got {other}"),
    }
}

/// A complete, valid value set covering every form-facing fixture field.
pub(crate) fn full_values() -> RawValues {
    object(json!({
        "experience": 5,
        "frequency": "weekly",
        "insured": "yes",
        "extras": "windows,ironing",
        "bio": "Fast and friendly team",
        "available_from": "2024-06-01",
        "opening_hours": {"mon": [9, 18], "sat": [10, 14]},
    }))
}
