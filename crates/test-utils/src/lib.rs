//! Tavola test utilities.
//!
//! Payload builders and naming helpers for integration tests that talk to
//! the kernel over HTTP.

use std::sync::atomic::{AtomicU64, Ordering};

use serde_json::{Map, Value as JsonValue, json};

static COUNTER: AtomicU64 = AtomicU64::new(0);

/// A name no other test run will produce.
///
/// Tests share one database, so anything with a uniqueness constraint
/// (place ids, name + address pairs) needs a fresh value per test.
pub fn unique_name(prefix: &str) -> String {
    let n = COUNTER.fetch_add(1, Ordering::Relaxed);
    let nanos = chrono::Utc::now().timestamp_micros();
    format!("{prefix}-{}-{nanos}-{n}", std::process::id())
}

/// Create a listing fixture with just a name.
pub fn test_listing(name: &str) -> TestListing {
    TestListing {
        name: name.to_string(),
        ..Default::default()
    }
}

/// Builder for restaurant and suggestion payloads.
#[derive(Debug, Clone, Default)]
pub struct TestListing {
    pub name: String,
    pub description: Option<String>,
    pub address: Option<String>,
    pub website: Option<String>,
    pub coordinates: Option<(f64, f64)>,
    pub place_id: Option<String>,
    pub category_id: Option<i64>,
    pub food_type_ids: Vec<i64>,
    pub notes: Option<String>,
}

impl TestListing {
    pub fn with_description(mut self, description: &str) -> Self {
        self.description = Some(description.to_string());
        self
    }

    pub fn with_address(mut self, address: &str) -> Self {
        self.address = Some(address.to_string());
        self
    }

    pub fn with_website(mut self, website: &str) -> Self {
        self.website = Some(website.to_string());
        self
    }

    /// Place the listing at `lat`, `lng`.
    pub fn at(mut self, lat: f64, lng: f64) -> Self {
        self.coordinates = Some((lat, lng));
        self
    }

    pub fn with_place_id(mut self, place_id: &str) -> Self {
        self.place_id = Some(place_id.to_string());
        self
    }

    pub fn in_category(mut self, category_id: i64) -> Self {
        self.category_id = Some(category_id);
        self
    }

    pub fn with_food_types(mut self, ids: &[i64]) -> Self {
        self.food_type_ids = ids.to_vec();
        self
    }

    /// Moderator notes; only sent with suggestion payloads.
    pub fn with_notes(mut self, notes: &str) -> Self {
        self.notes = Some(notes.to_string());
        self
    }

    fn fields(&self) -> Map<String, JsonValue> {
        let mut body = Map::new();
        body.insert("name".into(), json!(self.name));
        body.insert("description".into(), json!(self.description));
        body.insert("address".into(), json!(self.address));
        body.insert("website".into(), json!(self.website));
        body.insert("latitude".into(), json!(self.coordinates.map(|c| c.0)));
        body.insert("longitude".into(), json!(self.coordinates.map(|c| c.1)));
        body.insert("place_id".into(), json!(self.place_id));
        body.insert("category_id".into(), json!(self.category_id));
        body.insert("food_type_ids".into(), json!(self.food_type_ids));
        body
    }

    /// Body for `POST /api/restaurants`.
    pub fn restaurant_payload(&self) -> JsonValue {
        JsonValue::Object(self.fields())
    }

    /// Body for `POST /api/suggestions`.
    pub fn suggestion_payload(&self) -> JsonValue {
        let mut body = self.fields();
        body.insert("notes".into(), json!(self.notes));
        JsonValue::Object(body)
    }
}

/// Body for `POST /api/restaurants/{id}/ratings`.
pub fn rating_payload(food: i64, service: i64, ambiance: i64) -> JsonValue {
    json!({ "food": food, "service": service, "ambiance": ambiance })
}

/// Body for `POST /api/suggestions/{id}/convert`.
pub fn convert_payload(food: i64, service: i64, ambiance: i64) -> JsonValue {
    json!({
        "ratings": { "food": food, "service": service, "ambiance": ambiance }
    })
}
