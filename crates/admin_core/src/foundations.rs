use chrono::Utc;
use gateway::Record;
use serde_json::json;
use shared::{
    domain::{Foundation, Role, User},
    error::ValidationError,
};
use tracing::info;

use crate::actions::{ActionDispatcher, DispatchError};

impl ActionDispatcher {
    /// Approves a foundation and turns its owner into a verified foundation profile.
    pub async fn approve_foundation(
        &self,
        foundation_id: &str,
    ) -> Result<Foundation, DispatchError> {
        let foundation = self.require_by_id::<Foundation>(foundation_id).await?;
        let owner = foundation
            .user_id
            .clone()
            .ok_or_else(|| ValidationError::new("user_id", "foundation has no owner profile"))?;

        let mut payload = Record::new();
        payload.insert("status".into(), json!("approved"));
        payload.insert("verified_at".into(), json!(Utc::now().to_rfc3339()));
        let approved = self
            .update_typed::<Foundation>(foundation_id, payload)
            .await?;

        let mut promotion = Record::new();
        promotion.insert("role".into(), json!(Role::Foundation.as_str()));
        promotion.insert("is_verified".into(), json!(true));
        self.update_typed::<User>(owner.as_str(), promotion).await?;

        info!(foundation_id, user_id = %owner, "foundation approved");
        self.audit()
            .record(
                "FOUNDATION_APPROVED",
                json!({ "foundationId": foundation_id, "userId": owner.as_str() }),
            )
            .await;
        Ok(approved)
    }

    pub async fn reject_foundation(
        &self,
        foundation_id: &str,
        reason: &str,
    ) -> Result<Foundation, DispatchError> {
        let reason = reason.trim();
        let mut payload = Record::new();
        payload.insert("status".into(), json!("rejected"));
        payload.insert("rejection_reason".into(), json!(reason));
        let rejected = self
            .update_typed::<Foundation>(foundation_id, payload)
            .await?;

        self.audit()
            .record(
                "FOUNDATION_REJECTED",
                json!({ "foundationId": foundation_id, "reason": reason }),
            )
            .await;
        Ok(rejected)
    }
}

#[cfg(test)]
#[path = "tests/foundations_tests.rs"]
mod tests;
