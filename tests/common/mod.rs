//! In-memory doubles for the store traits and the delivery channel.
#![allow(dead_code)]

use async_trait::async_trait;
use std::collections::{BTreeMap, HashMap};
use std::sync::{Arc, Mutex};

use flat_notifier::admission::AdmissionGate;
use flat_notifier::buildings::{self, BuildingResolver};
use flat_notifier::dispatcher::Dispatcher;
use flat_notifier::errors::AppError;
use flat_notifier::feed_client::FeedClient;
use flat_notifier::models::{
    BuildingRecord, Listing, LookupFailure, StructuredAddress, Subscriber,
};
use flat_notifier::notifier::{DeliveryError, ListingMessage, Messenger, Notifier};
use flat_notifier::store::{BuildingStore, ListingStore, LookupLogStore, SessionStore};

#[derive(Default)]
pub struct MemoryStore {
    sessions: Mutex<BTreeMap<String, Option<String>>>,
    listings: Mutex<HashMap<String, serde_json::Value>>,
    buildings: Mutex<HashMap<String, BuildingRecord>>,
    failures: Mutex<Vec<LookupFailure>>,
}

impl MemoryStore {
    pub fn add_session(&self, key: &str, url: Option<&str>) {
        self.sessions
            .lock()
            .unwrap()
            .insert(key.to_string(), url.map(str::to_string));
    }

    pub fn search_url(&self, key: &str) -> Option<String> {
        self.sessions.lock().unwrap().get(key).cloned().flatten()
    }

    pub fn listing(&self, external_id: &str) -> Option<Listing> {
        self.listing_document(external_id)
            .map(|document| serde_json::from_value(document).unwrap())
    }

    pub fn listing_document(&self, external_id: &str) -> Option<serde_json::Value> {
        self.listings.lock().unwrap().get(external_id).cloned()
    }

    pub fn failures(&self) -> Vec<LookupFailure> {
        self.failures.lock().unwrap().clone()
    }

    pub fn building_count(&self) -> usize {
        self.buildings.lock().unwrap().len()
    }
}

#[async_trait]
impl SessionStore for MemoryStore {
    async fn active_subscribers(&self) -> Result<Vec<Subscriber>, AppError> {
        Ok(self
            .sessions
            .lock()
            .unwrap()
            .iter()
            .filter(|(_, url)| url.is_some())
            .map(|(key, url)| Subscriber {
                key: key.clone(),
                search_url: url.clone(),
            })
            .collect())
    }

    async fn clear_search_url(&self, key: &str) -> Result<(), AppError> {
        if let Some(url) = self.sessions.lock().unwrap().get_mut(key) {
            *url = None;
        }
        Ok(())
    }
}

#[async_trait]
impl ListingStore for MemoryStore {
    async fn find_listing(&self, external_id: &str) -> Result<Option<Listing>, AppError> {
        Ok(self.listing(external_id))
    }

    /// Shallow merge of top-level keys, like `document || EXCLUDED.document`.
    async fn upsert_listing(&self, listing: &Listing) -> Result<(), AppError> {
        let document = serde_json::to_value(listing)?;
        let mut listings = self.listings.lock().unwrap();
        match listings.get_mut(&listing.external_id) {
            Some(serde_json::Value::Object(existing)) => {
                if let serde_json::Value::Object(update) = document {
                    existing.extend(update);
                }
            }
            _ => {
                listings.insert(listing.external_id.clone(), document);
            }
        }
        Ok(())
    }
}

#[async_trait]
impl BuildingStore for MemoryStore {
    async fn count(&self) -> Result<u64, AppError> {
        Ok(self.buildings.lock().unwrap().len() as u64)
    }

    async fn insert_buildings(&self, records: &[BuildingRecord]) -> Result<u64, AppError> {
        let mut buildings = self.buildings.lock().unwrap();
        let mut inserted = 0;
        for record in records {
            let key = record.address.key();
            if !buildings.contains_key(&key) {
                buildings.insert(key, record.clone());
                inserted += 1;
            }
        }
        Ok(inserted)
    }

    async fn find_building(
        &self,
        address: &StructuredAddress,
    ) -> Result<Option<BuildingRecord>, AppError> {
        Ok(self.buildings.lock().unwrap().get(&address.key()).cloned())
    }
}

#[async_trait]
impl LookupLogStore for MemoryStore {
    async fn record_failure(&self, failure: &LookupFailure) -> Result<(), AppError> {
        let mut failures = self.failures.lock().unwrap();
        if !failures.contains(failure) {
            failures.push(failure.clone());
        }
        Ok(())
    }
}

/// Records every message; answers with a configured error code per recipient.
#[derive(Default)]
pub struct RecordingMessenger {
    sent: Mutex<Vec<(String, ListingMessage)>>,
    failing: Mutex<HashMap<String, i64>>,
}

impl RecordingMessenger {
    pub fn fail_for(&self, recipient_id: &str, code: i64) {
        self.failing
            .lock()
            .unwrap()
            .insert(recipient_id.to_string(), code);
    }

    pub fn sent(&self) -> Vec<(String, ListingMessage)> {
        self.sent.lock().unwrap().clone()
    }

    pub fn sent_to(&self, recipient_id: &str) -> Vec<ListingMessage> {
        self.sent()
            .into_iter()
            .filter(|(to, _)| to == recipient_id)
            .map(|(_, message)| message)
            .collect()
    }
}

#[async_trait]
impl Messenger for RecordingMessenger {
    async fn send_listing(
        &self,
        recipient_id: &str,
        message: &ListingMessage,
    ) -> Result<(), DeliveryError> {
        self.sent
            .lock()
            .unwrap()
            .push((recipient_id.to_string(), message.clone()));

        match self.failing.lock().unwrap().get(recipient_id) {
            Some(code) => Err(DeliveryError {
                code: Some(*code),
                message: "Forbidden: bot was blocked by the user".to_string(),
            }),
            None => Ok(()),
        }
    }
}

/// A store seeded with the embedded building dataset.
pub async fn seeded_store() -> Arc<MemoryStore> {
    let store = Arc::new(MemoryStore::default());
    let seeds = buildings::load_dataset(None).await.unwrap();
    buildings::seed_buildings(store.as_ref(), &seeds)
        .await
        .unwrap();
    store
}

pub fn gate(store: &Arc<MemoryStore>) -> AdmissionGate {
    let resolver = BuildingResolver::new(store.clone(), store.clone());
    AdmissionGate::new(resolver, store.clone())
}

pub fn dispatcher(
    store: &Arc<MemoryStore>,
    messenger: &Arc<RecordingMessenger>,
    feed_url: String,
) -> Dispatcher {
    Dispatcher::new(
        store.clone(),
        FeedClient::new(feed_url).unwrap(),
        gate(store),
        Notifier::new(messenger.clone()),
    )
}

/// Feed item in the search endpoint's wire format.
pub fn feed_apartment(id: u64, address: &str) -> serde_json::Value {
    serde_json::json!({
        "id": id,
        "price": {
            "amount": "1000.00",
            "currency": "BYN",
            "converted": {
                "BYN": { "amount": "1000.00", "currency": "BYN" },
                "USD": { "amount": "310.50", "currency": "USD" }
            }
        },
        "rent_type": "1_room",
        "location": {
            "address": address,
            "user_address": address,
            "latitude": 53.9,
            "longitude": 27.56
        },
        "photo": format!("https://content.example.com/apartments/{}.jpeg", id),
        "contact": { "owner": true },
        "created_at": "2024-03-01T12:30:00+0300",
        "last_time_up": "2024-03-01T12:30:00+0300",
        "up_available_in": 0,
        "url": format!("https://r.example.com/ak/apartments/{}", id)
    })
}

pub fn listing(id: &str, address: &str) -> Listing {
    let time = chrono::DateTime::parse_from_rfc3339("2024-03-01T12:30:00+03:00").unwrap();
    Listing {
        external_id: id.to_string(),
        price_usd: 310.5,
        rent_type: "1_room".to_string(),
        address: address.to_string(),
        photo_url: format!("https://content.example.com/apartments/{}.jpeg", id),
        url: format!("https://r.example.com/ak/apartments/{}", id),
        created_at: time,
        updated_at: time,
        building_info: None,
        delivered_to: BTreeMap::new(),
    }
}
