//! Agent policy CRUD and the authorization/SoD event wiring that
//! `converge-auth`'s pure decision functions defer to a caller holding the
//! event log. Ported from `agents.py`'s store-backed half.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use converge_auth::{authorize, check_sod, default_policy, AuthorizationResult, AuthorizeRequest, RiskContext, SodCheck};
use converge_events::EventLog;
use converge_store::ConvergeStore;
use converge_types::{AgentPolicy, ConvergeError, Event, EventType, OwnershipConfig, RiskLevel};

pub struct Agents {
    store: Arc<dyn ConvergeStore>,
    events: EventLog,
}

impl Agents {
    pub fn new(store: Arc<dyn ConvergeStore>) -> Self {
        let events = EventLog::new(store.clone());
        Agents { store, events }
    }

    pub fn set_policy(&self, policy: &AgentPolicy) -> Result<(), ConvergeError> {
        self.store.upsert_agent_policy(policy)?;
        self.events.append(
            Event::new(
                EventType::AgentPolicyUpdated,
                String::new(),
                serde_json::json!({"atl": policy.atl, "allow_actions": policy.allow_actions}),
            )
            .with_agent(&policy.agent_id),
        )?;
        Ok(())
    }

    /// Stored policy for `agent_id`, falling back to the conservative
    /// analyze-only default when none is on record.
    pub fn get_policy(&self, agent_id: &str, tenant_id: Option<&str>) -> Result<AgentPolicy, ConvergeError> {
        Ok(self.store.get_agent_policy(agent_id, tenant_id)?.unwrap_or_else(|| default_policy(agent_id)))
    }

    pub fn list_policies(&self, tenant_id: Option<&str>) -> Result<Vec<AgentPolicy>, ConvergeError> {
        self.store.list_agent_policies(tenant_id)
    }

    /// Runs `converge_auth::authorize` against the agent's stored (or
    /// default) policy and the intent's latest risk evaluation, then
    /// appends `AGENT_AUTHORIZED` with the full decision.
    #[allow(clippy::too_many_arguments)]
    pub fn authorize_action(
        &self,
        agent_id: &str,
        action: &str,
        intent_id: &str,
        tenant_id: Option<&str>,
        intent_risk_level: Option<RiskLevel>,
        risk: Option<RiskContext>,
        compliance_passing: Option<bool>,
        human_approvals: u32,
        now: DateTime<Utc>,
    ) -> Result<AuthorizationResult, ConvergeError> {
        let policy = self.get_policy(agent_id, tenant_id)?;
        let result = authorize(AuthorizeRequest {
            agent_id,
            action,
            intent_id,
            policy: &policy,
            intent_risk_level,
            risk,
            compliance_passing,
            human_approvals,
            now,
        });

        self.events.append(
            Event::new(EventType::AgentAuthorized, String::new(), serde_json::to_value(&result).unwrap_or_default())
                .with_intent(intent_id)
                .with_agent(agent_id),
        )?;

        Ok(result)
    }

    /// Runs `converge_auth::check_sod`; emits `SOD_VIOLATION` only when the
    /// check actually denies the action.
    pub fn enforce_sod(
        &self,
        agent_id: &str,
        files: &[String],
        action: &str,
        intent_id: &str,
        config: &OwnershipConfig,
    ) -> Result<SodCheck, ConvergeError> {
        let result = check_sod(agent_id, files, action, config);
        if !result.allowed {
            self.events.append(
                Event::new(
                    EventType::SodViolation,
                    String::new(),
                    serde_json::json!({"action": action, "owned_files": result.owned_files, "reason": result.reason}),
                )
                .with_intent(intent_id)
                .with_agent(agent_id),
            )?;
        }
        Ok(result)
    }
}
