//! Free-text address parsing.
//!
//! Upstream addresses look like `[locality, ][type] street-name [type], number[, ...]`,
//! e.g. `Минск, улица Якуба Коласа, 44` or `Независимости пр., 10`. The street
//! type keyword is placed inconsistently, so the street span is scanned for two
//! candidate slots (its first and its last word) and the pre-slot wins when it
//! holds a keyword.

use crate::models::{StreetType, StructuredAddress};
use std::fmt;

/// Why an address could not be turned into a [`StructuredAddress`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AddressParseError {
    Empty,
    /// No comma segment after the street starts with a digit.
    MissingBuildingNumber,
    /// Building number does not start with a letter or digit.
    InvalidBuildingNumber(String),
    /// Nothing left of the street span once keywords are removed.
    MissingStreet,
}

impl fmt::Display for AddressParseError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AddressParseError::Empty => write!(f, "address is empty"),
            AddressParseError::MissingBuildingNumber => {
                write!(f, "no building number after the street")
            }
            AddressParseError::InvalidBuildingNumber(raw) => {
                write!(f, "invalid building number '{}'", raw)
            }
            AddressParseError::MissingStreet => write!(f, "no street name"),
        }
    }
}

impl std::error::Error for AddressParseError {}

/// Maps a word to a street type keyword, full form or abbreviation.
pub fn street_type_keyword(word: &str) -> Option<StreetType> {
    match word.to_lowercase().as_str() {
        "улица" | "ул." | "ул" => Some(StreetType::Street),
        "переулок" | "пер." | "пер" => Some(StreetType::Lane),
        "проспект" | "пр." | "пр-т" | "просп." => Some(StreetType::Avenue),
        "тракт" | "тр." => Some(StreetType::Tract),
        _ => None,
    }
}

/// Parses a raw address into `{type, street, number}`.
pub fn parse(raw: &str) -> Result<StructuredAddress, AddressParseError> {
    let raw = raw.trim();
    if raw.is_empty() {
        return Err(AddressParseError::Empty);
    }

    // The number is the first digit-led segment after the street. Segments
    // before the street are a locality prefix, later ones (block, entrance)
    // are ignored.
    let segments: Vec<&str> = raw.split(',').collect();
    let number_index = segments
        .iter()
        .enumerate()
        .skip(1)
        .find(|(_, segment)| segment.trim_start().starts_with(|c: char| c.is_ascii_digit()))
        .map(|(index, _)| index)
        .ok_or(AddressParseError::MissingBuildingNumber)?;
    let building_number = normalize_building_number(segments[number_index])?;

    let slots = scan_street_span(segments[number_index - 1]);
    if slots.name.is_empty() {
        return Err(AddressParseError::MissingStreet);
    }

    Ok(StructuredAddress {
        street_type: slots.resolve_type(),
        street: slots.name.join(" "),
        building_number,
    })
}

/// Strips all whitespace and keeps the leading alphanumeric run.
pub fn normalize_building_number(raw: &str) -> Result<String, AddressParseError> {
    let compact: String = raw.chars().filter(|c| !c.is_whitespace()).collect();
    if compact.is_empty() {
        return Err(AddressParseError::MissingBuildingNumber);
    }

    let number: String = compact
        .chars()
        .take_while(|c| c.is_alphanumeric())
        .collect();
    if number.is_empty() {
        return Err(AddressParseError::InvalidBuildingNumber(compact));
    }
    Ok(number)
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum ScanState {
    /// Nothing consumed yet; the next word is the pre-slot candidate.
    Start,
    /// Inside the street name.
    Name,
}

#[derive(Debug, Default)]
struct SpanSlots<'a> {
    pre: Option<StreetType>,
    name: Vec<&'a str>,
    post: Option<StreetType>,
}

impl SpanSlots<'_> {
    fn resolve_type(&self) -> Option<StreetType> {
        match self.pre {
            Some(street_type) => Some(street_type),
            None => self.post,
        }
    }
}

fn scan_street_span(span: &str) -> SpanSlots<'_> {
    let mut slots = SpanSlots::default();
    let mut state = ScanState::Start;

    for word in span.split_whitespace() {
        match state {
            ScanState::Start => {
                state = ScanState::Name;
                if let Some(street_type) = street_type_keyword(word) {
                    slots.pre = Some(street_type);
                } else {
                    slots.name.push(word);
                }
            }
            ScanState::Name => slots.name.push(word),
        }
    }

    // The post-slot only counts when a street name remains in front of it.
    if slots.name.len() > 1 {
        if let Some(street_type) = slots.name.last().and_then(|w| street_type_keyword(w)) {
            slots.post = Some(street_type);
            slots.name.pop();
        }
    }

    slots
}
