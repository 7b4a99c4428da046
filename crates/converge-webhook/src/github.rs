//! GitHub webhook intake: signature verification plumbing plus the
//! `pull_request` → `Intent` upsert derivation, ported from
//! `api/routers/webhooks.py`. The HTTP route itself is a collaborator; this
//! module implements the primitives it calls.

use converge_types::{Intent, IntentSemantic, IntentTechnical, Status};
use serde::Deserialize;

use crate::signature::verify_signature;

#[derive(Debug, Deserialize)]
pub struct PullRequestRef {
    #[serde(default)]
    pub r#ref: String,
    #[serde(default)]
    pub sha: String,
}

#[derive(Debug, Deserialize)]
pub struct PullRequestPayloadInner {
    #[serde(default)]
    pub number: u64,
    #[serde(default)]
    pub title: String,
    #[serde(default)]
    pub head: PullRequestRef,
    #[serde(default)]
    pub base: PullRequestRef,
}

impl Default for PullRequestRef {
    fn default() -> Self {
        PullRequestRef { r#ref: String::new(), sha: String::new() }
    }
}

impl Default for PullRequestPayloadInner {
    fn default() -> Self {
        PullRequestPayloadInner { number: 0, title: String::new(), head: PullRequestRef::default(), base: PullRequestRef::default() }
    }
}

#[derive(Debug, Deserialize)]
pub struct Repository {
    #[serde(default)]
    pub full_name: String,
}

impl Default for Repository {
    fn default() -> Self {
        Repository { full_name: String::new() }
    }
}

#[derive(Debug, Deserialize)]
pub struct PullRequestWebhookPayload {
    #[serde(default)]
    pub action: String,
    #[serde(default)]
    pub pull_request: PullRequestPayloadInner,
    #[serde(default)]
    pub repository: Repository,
}

/// Returns `true` if the delivery's `action` should upsert an intent
/// (GitHub's `opened`/`synchronize` pull_request actions).
pub fn should_upsert_intent(github_event: &str, action: &str) -> bool {
    github_event == "pull_request" && matches!(action, "opened" | "synchronize")
}

/// Verifies the `X-Hub-Signature-256` header against `secret`. When no
/// secret is configured, the caller decides whether that's acceptable
/// (matches the reference: missing secret is a 403 only when auth is
/// otherwise required).
pub fn verify_github_signature(secret: &str, body: &[u8], header: &str) -> bool {
    verify_signature(secret, body, header)
}

/// Builds the `Intent` to upsert for a `pull_request` delivery. Intent id is
/// `"{repo_full_name}:pr-{number}"`, or bare `"pr-{number}"` when the
/// repository name is unknown.
pub fn intent_from_pull_request(payload: &PullRequestWebhookPayload, default_tenant: Option<String>) -> Intent {
    let pr = &payload.pull_request;
    let source = pr.head.r#ref.clone();
    let target = if pr.base.r#ref.is_empty() { "main".to_string() } else { pr.base.r#ref.clone() };
    let repo_full_name = payload.repository.full_name.clone();

    let intent_id =
        if repo_full_name.is_empty() { format!("pr-{}", pr.number) } else { format!("{repo_full_name}:pr-{}", pr.number) };

    let mut intent = Intent::new(intent_id, source.clone(), target.clone());
    intent.status = Status::Ready;
    intent.created_by = Some("github-webhook".to_string());
    intent.tenant_id = default_tenant;
    intent.semantic = IntentSemantic { problem: Some(pr.title.clone()), objective: Some(pr.title.clone()), description: None };
    intent.technical = IntentTechnical {
        refs: None,
        scope_hints: None,
        base_commit: Some(pr.base.sha.clone()),
        repo: Some(repo_full_name),
    };
    intent
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn upserts_on_opened_and_synchronize_only() {
        assert!(should_upsert_intent("pull_request", "opened"));
        assert!(should_upsert_intent("pull_request", "synchronize"));
        assert!(!should_upsert_intent("pull_request", "closed"));
        assert!(!should_upsert_intent("push", "opened"));
    }

    #[test]
    fn intent_id_includes_repo_and_pr_number() {
        let payload = PullRequestWebhookPayload {
            action: "opened".to_string(),
            pull_request: PullRequestPayloadInner {
                number: 42,
                title: "Add login page".to_string(),
                head: PullRequestRef { r#ref: "feature/login".to_string(), sha: "abc".to_string() },
                base: PullRequestRef { r#ref: "main".to_string(), sha: "def".to_string() },
            },
            repository: Repository { full_name: "acme/widgets".to_string() },
        };
        let intent = intent_from_pull_request(&payload, None);
        assert_eq!(intent.id, "acme/widgets:pr-42");
        assert_eq!(intent.source, "feature/login");
        assert_eq!(intent.target, "main");
    }

    #[test]
    fn falls_back_to_main_when_base_ref_is_missing() {
        let payload = PullRequestWebhookPayload {
            action: "opened".to_string(),
            pull_request: PullRequestPayloadInner::default(),
            repository: Repository::default(),
        };
        let intent = intent_from_pull_request(&payload, None);
        assert_eq!(intent.target, "main");
        assert_eq!(intent.id, "pr-0");
    }
}
