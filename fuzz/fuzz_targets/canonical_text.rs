#![no_main]

use converge_events::compute_event_hash;
use converge_types::{Event, EventType};
use libfuzzer_sys::fuzz_target;

fuzz_target!(|data: &[u8]| {
    let Ok(text) = std::str::from_utf8(data) else { return };
    let Ok(payload) = serde_json::from_str::<serde_json::Value>(text) else { return };

    let event = Event::new(EventType::IntentCreated, "trace", payload);

    let hash_a = compute_event_hash(&event, "0".repeat(64).as_str());
    let hash_b = compute_event_hash(&event, "0".repeat(64).as_str());
    assert_eq!(hash_a, hash_b, "hashing the same event twice must be deterministic");
    assert_eq!(hash_a.len(), 64);
    assert!(hash_a.chars().all(|c| c.is_ascii_hexdigit()));

    // Changing the previous link must change the computed hash.
    let hash_c = compute_event_hash(&event, "1".repeat(64).as_str());
    assert_ne!(hash_a, hash_c);
});
