//! Listing notifications: message formatting, delivery and failure classification.

use async_trait::async_trait;
use chrono::{DateTime, FixedOffset};
use std::fmt;
use std::sync::Arc;

use crate::models::Listing;

/// Error code the delivery channel uses for a recipient that blocked the bot.
pub const RECIPIENT_UNREACHABLE: i64 = 403;

/// An image with a caption and a single link button.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ListingMessage {
    pub photo_url: String,
    pub caption: String,
    pub button_text: String,
    pub button_url: String,
}

/// Failure reported by the delivery channel.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DeliveryError {
    /// Numeric error code, absent for transport failures.
    pub code: Option<i64>,
    pub message: String,
}

impl fmt::Display for DeliveryError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.code {
            Some(code) => write!(f, "delivery failed with code {}: {}", code, self.message),
            None => write!(f, "delivery failed: {}", self.message),
        }
    }
}

impl std::error::Error for DeliveryError {}

/// Outbound delivery channel.
#[async_trait]
pub trait Messenger: Send + Sync {
    async fn send_listing(
        &self,
        recipient_id: &str,
        message: &ListingMessage,
    ) -> Result<(), DeliveryError>;
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DeliveryOutcome {
    Delivered,
    /// Recipient is unreachable; stop sending to them.
    PermanentFailure,
    TransientFailure(String),
}

/// What the dispatch loop must do once a delivery has completed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SideEffect {
    None,
    Unsubscribe,
    Log(String),
}

pub fn classify(result: Result<(), DeliveryError>) -> DeliveryOutcome {
    match result {
        Ok(()) => DeliveryOutcome::Delivered,
        Err(e) if e.code == Some(RECIPIENT_UNREACHABLE) => DeliveryOutcome::PermanentFailure,
        Err(e) => DeliveryOutcome::TransientFailure(e.to_string()),
    }
}

pub fn completion_effect(outcome: &DeliveryOutcome) -> SideEffect {
    match outcome {
        DeliveryOutcome::Delivered => SideEffect::None,
        DeliveryOutcome::PermanentFailure => SideEffect::Unsubscribe,
        DeliveryOutcome::TransientFailure(reason) => SideEffect::Log(reason.clone()),
    }
}

/// Human label for a rent type: `room` vs. `N_rooms`.
pub fn format_rent_type(rent_type: &str) -> String {
    if rent_type == "room" {
        "Комната".to_string()
    } else {
        let rooms = rent_type.split('_').next().unwrap_or(rent_type);
        format!("Комнаты: {}", rooms)
    }
}

/// Renders a timestamp in its own offset, e.g. `3/1/2024, 12:30:00 PM`.
pub fn format_timestamp(time: &DateTime<FixedOffset>) -> String {
    time.format("%-m/%-d/%Y, %-I:%M:%S %p").to_string()
}

pub fn format_caption(listing: &Listing) -> String {
    let created = format_timestamp(&listing.created_at);
    let updated = format_timestamp(&listing.updated_at);

    let mut caption = String::new();
    caption.push_str(&format!("💵 ${:.2}\n", listing.price_usd));
    caption.push_str(&format!("🚪 {}\n", format_rent_type(&listing.rent_type)));
    caption.push_str(&format!("📍 {}\n", listing.address));
    if let Some(info) = listing.building_info {
        caption.push_str(&format!(
            "Year build: {}, floors: {}\n",
            info.year, info.floors
        ));
    }
    caption.push_str(&format!("🌟 {}\n", created));
    if updated != created {
        caption.push_str(&format!("♻️ {}\n", updated));
    }
    caption
}

pub fn build_message(listing: &Listing) -> ListingMessage {
    ListingMessage {
        photo_url: listing.photo_url.clone(),
        caption: format_caption(listing),
        button_text: "View".to_string(),
        button_url: listing.url.clone(),
    }
}

/// Formats and delivers listing notifications.
#[derive(Clone)]
pub struct Notifier {
    messenger: Arc<dyn Messenger>,
}

impl Notifier {
    pub fn new(messenger: Arc<dyn Messenger>) -> Self {
        Self { messenger }
    }

    pub async fn notify(&self, recipient_id: &str, listing: &Listing) -> DeliveryOutcome {
        let message = build_message(listing);
        let outcome = classify(self.messenger.send_listing(recipient_id, &message).await);
        if outcome == DeliveryOutcome::Delivered {
            tracing::debug!(
                "Apartment {} delivered to {}",
                listing.external_id,
                recipient_id
            );
        }
        outcome
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::BuildingInfo;
    use std::collections::BTreeMap;

    fn listing(created: &str, updated: &str) -> Listing {
        Listing {
            external_id: "X".to_string(),
            price_usd: 350.0,
            rent_type: "2_rooms".to_string(),
            address: "пр. Независимости, 10".to_string(),
            photo_url: "https://example.com/p.jpeg".to_string(),
            url: "https://r.onliner.by/ak/apartments/X".to_string(),
            created_at: DateTime::parse_from_rfc3339(created).unwrap(),
            updated_at: DateTime::parse_from_rfc3339(updated).unwrap(),
            building_info: None,
            delivered_to: BTreeMap::new(),
        }
    }

    #[test]
    fn test_rent_type_labels() {
        assert_eq!(format_rent_type("room"), "Комната");
        assert_eq!(format_rent_type("1_room"), "Комнаты: 1");
        assert_eq!(format_rent_type("3_rooms"), "Комнаты: 3");
    }

    #[test]
    fn test_caption_without_building_info() {
        let caption = format_caption(&listing(
            "2024-03-01T12:30:00+03:00",
            "2024-03-01T12:30:00+03:00",
        ));
        assert_eq!(
            caption,
            "💵 $350.00\n🚪 Комнаты: 2\n📍 пр. Независимости, 10\n🌟 3/1/2024, 12:30:00 PM\n"
        );
    }

    #[test]
    fn test_caption_with_building_info_and_update() {
        let mut item = listing("2024-03-01T09:05:00+03:00", "2024-03-02T18:00:00+03:00");
        item.building_info = Some(BuildingInfo {
            year: 1975,
            floors: 9,
        });
        let caption = format_caption(&item);
        assert!(caption.contains("Year build: 1975, floors: 9\n"));
        assert!(caption.contains("🌟 3/1/2024, 9:05:00 AM\n"));
        assert!(caption.ends_with("♻️ 3/2/2024, 6:00:00 PM\n"));
    }

    #[test]
    fn test_message_has_view_button() {
        let message = build_message(&listing(
            "2024-03-01T12:30:00+03:00",
            "2024-03-01T12:30:00+03:00",
        ));
        assert_eq!(message.button_text, "View");
        assert_eq!(message.button_url, "https://r.onliner.by/ak/apartments/X");
        assert_eq!(message.photo_url, "https://example.com/p.jpeg");
    }

    #[test]
    fn test_classification() {
        assert_eq!(classify(Ok(())), DeliveryOutcome::Delivered);
        assert_eq!(
            classify(Err(DeliveryError {
                code: Some(403),
                message: "Forbidden: bot was blocked by the user".to_string(),
            })),
            DeliveryOutcome::PermanentFailure
        );
        assert!(matches!(
            classify(Err(DeliveryError {
                code: Some(429),
                message: "Too Many Requests".to_string(),
            })),
            DeliveryOutcome::TransientFailure(_)
        ));
        assert!(matches!(
            classify(Err(DeliveryError {
                code: None,
                message: "connection reset".to_string(),
            })),
            DeliveryOutcome::TransientFailure(_)
        ));
    }

    #[test]
    fn test_completion_effects() {
        assert_eq!(completion_effect(&DeliveryOutcome::Delivered), SideEffect::None);
        assert_eq!(
            completion_effect(&DeliveryOutcome::PermanentFailure),
            SideEffect::Unsubscribe
        );
        assert_eq!(
            completion_effect(&DeliveryOutcome::TransientFailure("boom".to_string())),
            SideEffect::Log("boom".to_string())
        );
    }
}
