use std::sync::Arc;

use chrono::Utc;
use gateway::Gateway;
use serde_json::Value;
use shared::domain::{AccessLogEntry, UserId};
use tracing::warn;

pub const ACCESS_LOG_TABLE: &str = "access_logs";

/// Best-effort audit trail. A failed write is logged and never fails the admin action.
#[derive(Clone)]
pub struct AuditLog {
    gateway: Arc<dyn Gateway>,
    actor: Option<UserId>,
    user_agent: Option<String>,
}

impl AuditLog {
    pub fn new(
        gateway: Arc<dyn Gateway>,
        actor: Option<UserId>,
        user_agent: Option<String>,
    ) -> Self {
        Self {
            gateway,
            actor,
            user_agent,
        }
    }

    pub fn actor(&self) -> Option<&UserId> {
        self.actor.as_ref()
    }

    pub fn entry(&self, action_type: &str, details: &Value) -> AccessLogEntry {
        AccessLogEntry {
            user_id: self.actor.clone(),
            action_type: action_type.to_string(),
            details: details.to_string(),
            user_agent: self.user_agent.clone(),
            created_at: Utc::now(),
        }
    }

    /// Returns whether the entry reached the store.
    pub async fn record(&self, action_type: &str, details: Value) -> bool {
        let entry = self.entry(action_type, &details);
        let Ok(Value::Object(record)) = serde_json::to_value(&entry) else {
            warn!(action_type, "audit entry did not serialize to an object");
            return false;
        };

        match self.gateway.insert(ACCESS_LOG_TABLE, &record).await {
            Ok(_) => true,
            Err(err) => {
                warn!(action_type, error = %err, "could not write audit entry");
                false
            }
        }
    }
}
