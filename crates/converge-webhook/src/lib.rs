//! Webhook I/O: inbound GitHub delivery verification + intent derivation,
//! outbound signed notifications, and delivery-id dedup math. The HTTP
//! transport itself (route handlers, server) is a collaborator; this crate
//! implements the primitives they call.

mod dedup;
mod github;
mod notify;
mod signature;

pub use dedup::{DEFAULT_DELIVERY_TTL_SECONDS, is_live, new_delivery};
pub use github::{PullRequestWebhookPayload, intent_from_pull_request, should_upsert_intent, verify_github_signature};
pub use notify::{NotificationOutcome, resolve_url, send};
pub use signature::{sign_header, verify_signature};
