//! Delivery-id dedup helpers over `converge_types::WebhookDelivery`. The
//! store owns persistence (`webhook_deliveries` table); this just computes
//! the TTL window and expiry check so every caller agrees on the math.

use chrono::{DateTime, Duration as ChronoDuration, Utc};
use converge_types::WebhookDelivery;

pub const DEFAULT_DELIVERY_TTL_SECONDS: i64 = 86_400;

pub fn new_delivery(delivery_id: impl Into<String>, received_at: DateTime<Utc>, ttl_seconds: i64) -> WebhookDelivery {
    WebhookDelivery {
        delivery_id: delivery_id.into(),
        received_at,
        expires_at: received_at + ChronoDuration::seconds(ttl_seconds),
    }
}

/// Whether `delivery` is still within its dedup window as of `now`. An
/// expired record behaves as if it were never recorded, so a delivery id
/// can legitimately be reused once its TTL lapses.
pub fn is_live(delivery: &WebhookDelivery, now: DateTime<Utc>) -> bool {
    now < delivery.expires_at
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fresh_delivery_is_live() {
        let now = converge_types::now();
        let delivery = new_delivery("d-1", now, DEFAULT_DELIVERY_TTL_SECONDS);
        assert!(is_live(&delivery, now));
    }

    #[test]
    fn expired_delivery_is_not_live() {
        let now = converge_types::now();
        let delivery = new_delivery("d-1", now - ChronoDuration::seconds(DEFAULT_DELIVERY_TTL_SECONDS + 1), DEFAULT_DELIVERY_TTL_SECONDS);
        assert!(!is_live(&delivery, now));
    }
}
