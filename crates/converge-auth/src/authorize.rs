//! Agent action authorization, ported from `agents.py`'s `authorize()`.
//! Pure decision function: the caller supplies the agent's policy plus
//! whatever intent/risk/compliance context it already has on hand (fetched
//! from the store), and this only computes the verdict — appending the
//! resulting `AGENT_AUTHORIZED` event is the caller's job.

use chrono::{DateTime, Utc};
use converge_types::{AgentPolicy, RiskLevel};
use serde::Serialize;

#[derive(Debug, Clone, Serialize)]
pub struct EffectiveLimits {
    pub max_risk_score: f64,
    pub max_blast_severity: f64,
    pub min_test_coverage: f64,
}

/// Risk-evaluation context for the intent under authorization, if one
/// exists (an agent may authorize an action before any risk eval has run).
#[derive(Debug, Clone, Copy)]
pub struct RiskContext {
    pub risk_score: f64,
    pub damage_score: f64,
}

pub struct AuthorizeRequest<'a> {
    pub agent_id: &'a str,
    pub action: &'a str,
    pub intent_id: &'a str,
    pub policy: &'a AgentPolicy,
    pub intent_risk_level: Option<RiskLevel>,
    pub risk: Option<RiskContext>,
    pub compliance_passing: Option<bool>,
    pub human_approvals: u32,
    pub now: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize)]
pub struct AuthorizationResult {
    pub agent_id: String,
    pub action: String,
    pub intent_id: String,
    pub allowed: bool,
    pub reasons: Vec<String>,
    pub atl: u8,
    pub effective_limits: EffectiveLimits,
    pub human_approvals: u32,
    pub timestamp: DateTime<Utc>,
}

pub fn authorize(req: AuthorizeRequest<'_>) -> AuthorizationResult {
    let pol = req.policy;
    let mut reasons: Vec<String> = Vec::new();
    let mut allowed = true;

    if let Some(expires_at) = pol.expires_at {
        if req.now > expires_at {
            reasons.push(format!("Policy expired at {expires_at}"));
            allowed = false;
        }
    }

    let mut limits = EffectiveLimits {
        max_risk_score: pol.max_risk_score,
        max_blast_severity: pol.max_blast_severity,
        min_test_coverage: pol.min_test_coverage,
    };
    if let Some(ov) = pol.action_overrides.get(req.action) {
        if let Some(v) = ov.max_risk_score {
            limits.max_risk_score = v;
        }
        if let Some(v) = ov.max_blast_severity {
            limits.max_blast_severity = v;
        }
    }

    if !pol.allow_actions.iter().any(|a| a == req.action) {
        reasons.push(format!("Action '{}' not in allowed actions: {:?}", req.action, pol.allow_actions));
        allowed = false;
    }

    if let Some(risk) = req.risk {
        if risk.risk_score > limits.max_risk_score {
            reasons.push(format!("Risk score {:.0} > agent limit {}", risk.risk_score, limits.max_risk_score));
            allowed = false;
        }
        if risk.damage_score > limits.max_blast_severity {
            reasons.push(format!(
                "Blast severity {:.1} exceeds agent limit {}",
                risk.damage_score, limits.max_blast_severity
            ));
            allowed = false;
        }

        if pol.require_compliance_pass {
            match req.compliance_passing {
                Some(false) => {
                    reasons.push("Compliance check not passing".to_string());
                    allowed = false;
                }
                Some(true) => {}
                None => {
                    reasons.push("Compliance check not passing".to_string());
                    allowed = false;
                }
            }
        }
    }

    if pol.require_human_approval && req.human_approvals < 1 {
        reasons.push("Human approval required but none provided".to_string());
        allowed = false;
    }

    if matches!(req.intent_risk_level, Some(RiskLevel::Critical)) && pol.require_dual_approval_on_critical && req.human_approvals < 2 {
        reasons.push(format!("Critical risk requires 2 approvals, got {}", req.human_approvals));
        allowed = false;
    }

    AuthorizationResult {
        agent_id: req.agent_id.to_string(),
        action: req.action.to_string(),
        intent_id: req.intent_id.to_string(),
        allowed,
        reasons,
        atl: pol.atl,
        effective_limits: limits,
        human_approvals: req.human_approvals,
        timestamp: req.now,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use converge_types::now;

    fn policy() -> AgentPolicy {
        AgentPolicy {
            agent_id: "bot-1".to_string(),
            tenant_id: None,
            atl: 1,
            max_risk_score: 30.0,
            max_blast_severity: 30.0,
            min_test_coverage: 0.0,
            require_compliance_pass: false,
            require_human_approval: false,
            require_dual_approval_on_critical: true,
            allow_actions: vec!["analyze".to_string()],
            action_overrides: Default::default(),
            expires_at: None,
        }
    }

    #[test]
    fn denies_when_action_not_allowed() {
        let pol = policy();
        let result = authorize(AuthorizeRequest {
            agent_id: "bot-1",
            action: "merge",
            intent_id: "i-1",
            policy: &pol,
            intent_risk_level: None,
            risk: None,
            compliance_passing: None,
            human_approvals: 0,
            now: now(),
        });
        assert!(!result.allowed);
        assert!(result.reasons.iter().any(|r| r.contains("not in allowed actions")));
    }

    #[test]
    fn denies_when_risk_score_exceeds_limit() {
        let pol = policy();
        let result = authorize(AuthorizeRequest {
            agent_id: "bot-1",
            action: "analyze",
            intent_id: "i-1",
            policy: &pol,
            intent_risk_level: Some(RiskLevel::Low),
            risk: Some(RiskContext { risk_score: 80.0, damage_score: 5.0 }),
            compliance_passing: Some(true),
            human_approvals: 0,
            now: now(),
        });
        assert!(!result.allowed);
    }

    #[test]
    fn requires_two_approvals_on_critical() {
        let pol = policy();
        let result = authorize(AuthorizeRequest {
            agent_id: "bot-1",
            action: "analyze",
            intent_id: "i-1",
            policy: &pol,
            intent_risk_level: Some(RiskLevel::Critical),
            risk: Some(RiskContext { risk_score: 5.0, damage_score: 5.0 }),
            compliance_passing: Some(true),
            human_approvals: 1,
            now: now(),
        });
        assert!(!result.allowed);
        assert!(result.reasons.iter().any(|r| r.contains("Critical risk")));
    }

    #[test]
    fn allows_when_everything_is_within_limits() {
        let pol = policy();
        let result = authorize(AuthorizeRequest {
            agent_id: "bot-1",
            action: "analyze",
            intent_id: "i-1",
            policy: &pol,
            intent_risk_level: Some(RiskLevel::Low),
            risk: Some(RiskContext { risk_score: 5.0, damage_score: 5.0 }),
            compliance_passing: Some(true),
            human_approvals: 0,
            now: now(),
        });
        assert!(result.allowed, "{:?}", result.reasons);
    }
}
