//! Client for the upstream apartment search feed.
//!
//! A subscriber's saved URL is a link to the public search page; its query
//! (and fragment, which the page also uses for filters) is replayed against
//! the JSON search endpoint. Only the first page of results is read.

use chrono::{DateTime, FixedOffset};
use reqwest::header::{ACCEPT, REFERER};
use reqwest::{Client, StatusCode};
use serde::{Deserialize, Deserializer};
use serde_json::Value;
use std::collections::BTreeMap;
use url::Url;

use crate::errors::AppError;
use crate::models::Listing;

/// Extracts the search parameters from a saved URL.
///
/// Returns the query with the fragment appended as further `&`-separated
/// parameters, or `None` when the URL has no query.
pub fn search_query(search_url: &str) -> Option<String> {
    let url = Url::parse(search_url.trim()).ok()?;
    let query = url.query().filter(|q| !q.is_empty())?;

    let params = match url.fragment().filter(|f| !f.is_empty()) {
        Some(fragment) => format!("{}&{}", query, fragment.replace('#', "&")),
        None => query.to_string(),
    };
    Some(params)
}

/// Parses feed timestamps, which use either RFC 3339 or a colon-less offset (`+0300`).
pub fn parse_feed_time(raw: &str) -> Result<DateTime<FixedOffset>, chrono::ParseError> {
    DateTime::parse_from_rfc3339(raw)
        .or_else(|_| DateTime::parse_from_str(raw, "%Y-%m-%dT%H:%M:%S%z"))
}

fn deserialize_feed_time<'de, D>(deserializer: D) -> Result<DateTime<FixedOffset>, D::Error>
where
    D: Deserializer<'de>,
{
    let raw = String::deserialize(deserializer)?;
    parse_feed_time(&raw).map_err(serde::de::Error::custom)
}

#[derive(Debug, Deserialize)]
struct FeedResponse {
    #[serde(default)]
    apartments: Option<Vec<Value>>,
}

#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum FeedScalar {
    Number(serde_json::Number),
    Text(String),
}

impl FeedScalar {
    fn as_id(&self) -> String {
        match self {
            FeedScalar::Number(n) => n.to_string(),
            FeedScalar::Text(s) => s.clone(),
        }
    }

    fn as_amount(&self) -> Option<f64> {
        match self {
            FeedScalar::Number(n) => n.as_f64(),
            FeedScalar::Text(s) => s.trim().parse().ok(),
        }
    }
}

#[derive(Debug, Deserialize)]
struct FeedAmount {
    amount: FeedScalar,
}

#[derive(Debug, Deserialize)]
struct FeedConverted {
    #[serde(rename = "USD")]
    usd: FeedAmount,
}

#[derive(Debug, Deserialize)]
struct FeedPrice {
    converted: FeedConverted,
}

#[derive(Debug, Deserialize)]
struct FeedLocation {
    address: String,
}

/// Apartment as returned by the search endpoint.
#[derive(Debug, Deserialize)]
struct FeedApartment {
    id: FeedScalar,
    price: FeedPrice,
    rent_type: String,
    location: FeedLocation,
    photo: String,
    url: String,
    #[serde(deserialize_with = "deserialize_feed_time")]
    created_at: DateTime<FixedOffset>,
    #[serde(deserialize_with = "deserialize_feed_time")]
    last_time_up: DateTime<FixedOffset>,
}

impl FeedApartment {
    fn into_listing(self) -> Option<Listing> {
        let price_usd = self.price.converted.usd.amount.as_amount()?;
        Some(Listing {
            external_id: self.id.as_id(),
            price_usd,
            rent_type: self.rent_type,
            address: self.location.address,
            photo_url: self.photo,
            url: self.url,
            created_at: self.created_at,
            updated_at: self.last_time_up,
            building_info: None,
            delivered_to: BTreeMap::new(),
        })
    }
}

/// Reads the current listings for a saved search.
#[derive(Clone)]
pub struct FeedClient {
    client: Client,
    feed_url: String,
}

impl FeedClient {
    /// Creates a client for the search endpoint at `feed_url`.
    pub fn new(feed_url: String) -> Result<Self, AppError> {
        let client = Client::builder().build().map_err(|e| {
            AppError::ExternalApiError(format!("Failed to create feed client: {}", e))
        })?;

        Ok(Self { client, feed_url })
    }

    /// Fetches the listings currently matching `search_url`.
    ///
    /// Never fails: a URL without a query, a non-200 status, an unreadable
    /// body or a network error all yield an empty list and a log line.
    pub async fn fetch(&self, search_url: &str) -> Vec<Listing> {
        let Some(query) = search_query(search_url) else {
            tracing::warn!("Saved URL has no search parameters: {}", search_url);
            return Vec::new();
        };

        match self.try_fetch(search_url, &query).await {
            Ok(listings) => listings,
            Err(e) => {
                tracing::error!("Can't get the apartments by the url = {}: {}", search_url, e);
                Vec::new()
            }
        }
    }

    async fn try_fetch(&self, search_url: &str, query: &str) -> Result<Vec<Listing>, AppError> {
        let request_url = format!("{}?{}", self.feed_url, query);
        tracing::debug!("Fetching feed: {}", request_url);

        let response = self
            .client
            .get(&request_url)
            .header(ACCEPT, "application/json, text/plain, */*")
            .header(REFERER, search_url)
            .send()
            .await
            .map_err(|e| AppError::ExternalApiError(format!("Feed request failed: {}", e)))?;

        if response.status() != StatusCode::OK {
            let status = response.status();
            let error_text = response
                .text()
                .await
                .unwrap_or_else(|_| "Unknown error".to_string());
            return Err(AppError::ExternalApiError(format!(
                "Feed returned {}: {}",
                status, error_text
            )));
        }

        let body: FeedResponse = response.json().await.map_err(|e| {
            AppError::ExternalApiError(format!("Failed to parse feed response: {}", e))
        })?;

        let raw_apartments = body.apartments.unwrap_or_default();
        let total = raw_apartments.len();
        let listings: Vec<Listing> = raw_apartments
            .into_iter()
            .filter_map(|raw| {
                match serde_json::from_value::<FeedApartment>(raw)
                    .ok()
                    .and_then(FeedApartment::into_listing)
                {
                    Some(listing) => Some(listing),
                    None => {
                        tracing::warn!("Skipping malformed apartment in feed response");
                        None
                    }
                }
            })
            .collect();

        tracing::info!("Feed returned {} apartments ({} usable)", total, listings.len());
        Ok(listings)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_search_query_plain() {
        assert_eq!(
            search_query("https://r.onliner.by/ak/?rent_type%5B%5D=1_room&price%5Bmax%5D=400"),
            Some("rent_type%5B%5D=1_room&price%5Bmax%5D=400".to_string())
        );
    }

    #[test]
    fn test_search_query_fragment_becomes_parameters() {
        assert_eq!(
            search_query("https://r.onliner.by/ak/?rooms=1#bounds=1#only_owner=true"),
            Some("rooms=1&bounds=1&only_owner=true".to_string())
        );
    }

    #[test]
    fn test_search_query_missing() {
        assert_eq!(search_query("https://r.onliner.by/ak/"), None);
        assert_eq!(search_query("https://r.onliner.by/ak/?"), None);
        assert_eq!(search_query("https://r.onliner.by/ak/#rooms=1"), None);
        assert_eq!(search_query("not a url"), None);
    }

    #[test]
    fn test_parse_feed_time_formats() {
        let colonless = parse_feed_time("2024-03-01T12:30:00+0300").unwrap();
        let rfc = parse_feed_time("2024-03-01T12:30:00+03:00").unwrap();
        assert_eq!(colonless, rfc);
        assert!(parse_feed_time("yesterday").is_err());
    }

    #[test]
    fn test_feed_apartment_into_listing() {
        let raw = json!({
            "id": 512345,
            "price": {"converted": {"USD": {"amount": "350.00"}}},
            "rent_type": "2_rooms",
            "location": {"address": "Минск, улица Ленина, 5"},
            "photo": "https://content.example/p.jpeg",
            "url": "https://r.onliner.by/ak/apartments/512345",
            "created_at": "2024-03-01T12:30:00+0300",
            "last_time_up": "2024-03-02T08:00:00+0300"
        });

        let listing = serde_json::from_value::<FeedApartment>(raw)
            .unwrap()
            .into_listing()
            .unwrap();
        assert_eq!(listing.external_id, "512345");
        assert_eq!(listing.price_usd, 350.0);
        assert_eq!(listing.rent_type, "2_rooms");
        assert!(listing.delivered_to.is_empty());
        assert!(listing.building_info.is_none());
    }

    #[test]
    fn test_unparseable_price_rejected() {
        let raw = json!({
            "id": "x1",
            "price": {"converted": {"USD": {"amount": "n/a"}}},
            "rent_type": "room",
            "location": {"address": "ул. Ленина, 5"},
            "photo": "p",
            "url": "u",
            "created_at": "2024-03-01T12:30:00+03:00",
            "last_time_up": "2024-03-01T12:30:00+03:00"
        });
        let apartment = serde_json::from_value::<FeedApartment>(raw).unwrap();
        assert!(apartment.into_listing().is_none());
    }
}
