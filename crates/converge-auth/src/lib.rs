//! Agent authorization: policy-driven action authorization and
//! separation-of-duties enforcement.

mod authorize;
mod sod;

use converge_types::AgentPolicy;

pub use authorize::{AuthorizationResult, AuthorizeRequest, EffectiveLimits, RiskContext, authorize};
pub use sod::{SodCheck, check_sod};

/// The fallback policy for agents with no stored policy: ATL 0, analyze-only,
/// human approval and compliance required. Matches the reference's
/// `DEFAULT_POLICY`.
pub fn default_policy(agent_id: impl Into<String>) -> AgentPolicy {
    AgentPolicy {
        agent_id: agent_id.into(),
        tenant_id: None,
        atl: 0,
        max_risk_score: 30.0,
        max_blast_severity: 30.0,
        min_test_coverage: 0.0,
        require_compliance_pass: true,
        require_human_approval: true,
        require_dual_approval_on_critical: true,
        allow_actions: vec!["analyze".to_string()],
        action_overrides: Default::default(),
        expires_at: None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_policy_is_analyze_only() {
        let pol = default_policy("agent-x");
        assert_eq!(pol.allow_actions, vec!["analyze".to_string()]);
        assert_eq!(pol.atl, 0);
    }
}
