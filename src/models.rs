//! Core data models: subscribers, listings, buildings and lookup diagnostics.

use chrono::{DateTime, FixedOffset};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};
use std::fmt;

/// Street type keyword recognised in an address.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StreetType {
    Street,
    Lane,
    Avenue,
    Tract,
}

impl StreetType {
    pub fn as_str(&self) -> &'static str {
        match self {
            StreetType::Street => "street",
            StreetType::Lane => "lane",
            StreetType::Avenue => "avenue",
            StreetType::Tract => "tract",
        }
    }
}

impl fmt::Display for StreetType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Parsed `{type, street, number}` form of a raw address.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct StructuredAddress {
    pub street_type: Option<StreetType>,
    pub street: String,
    pub building_number: String,
}

impl StructuredAddress {
    /// Stable key for the `(type, street, number)` triple.
    pub fn key(&self) -> String {
        format!(
            "{}|{}|{}",
            self.street_type.map(|t| t.as_str()).unwrap_or(""),
            self.street,
            self.building_number
        )
    }
}

/// Construction metadata attached to a listing.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct BuildingInfo {
    pub year: i32,
    pub floors: i32,
}

/// A known building, keyed by its structured address.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BuildingRecord {
    pub address: StructuredAddress,
    pub year: i32,
    pub floors: i32,
    #[serde(default)]
    pub types: BTreeSet<String>,
}

impl BuildingRecord {
    pub fn info(&self) -> BuildingInfo {
        BuildingInfo {
            year: self.year,
            floors: self.floors,
        }
    }
}

/// Entry of the static building reference dataset (address still raw).
#[derive(Debug, Clone, Deserialize)]
pub struct BuildingSeed {
    pub address: String,
    pub year: i32,
    pub floors: i32,
    #[serde(default)]
    pub types: Vec<String>,
}

/// A single apartment offering from the upstream feed, as persisted.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Listing {
    pub external_id: String,
    pub price_usd: f64,
    pub rent_type: String,
    pub address: String,
    pub photo_url: String,
    pub url: String,
    pub created_at: DateTime<FixedOffset>,
    pub updated_at: DateTime<FixedOffset>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub building_info: Option<BuildingInfo>,
    /// Recipients this listing was handed to. Entries are never removed.
    #[serde(default)]
    pub delivered_to: BTreeMap<String, bool>,
}

impl Listing {
    pub fn is_delivered_to(&self, recipient_id: &str) -> bool {
        self.delivered_to.get(recipient_id).copied().unwrap_or(false)
    }
}

/// A chat session holding at most one saved search URL.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Subscriber {
    /// Session key, `chatId:userId`.
    pub key: String,
    pub search_url: Option<String>,
}

impl Subscriber {
    /// Chat id the notifications go to.
    pub fn recipient_id(&self) -> &str {
        self.key.split(':').next().unwrap_or(&self.key)
    }
}

/// Why a building lookup produced no metadata.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LookupReason {
    ParsingFailed,
    AddressNotFound,
}

impl LookupReason {
    pub fn as_str(&self) -> &'static str {
        match self {
            LookupReason::ParsingFailed => "parsing_failed",
            LookupReason::AddressNotFound => "address_not_found",
        }
    }
}

impl fmt::Display for LookupReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Diagnostic trail entry, one per distinct `(address, reason)`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct LookupFailure {
    pub address: String,
    pub reason: LookupReason,
}
