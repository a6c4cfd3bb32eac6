use chrono::Utc;
use gateway::{decode_rows, Gateway, Record};
use serde_json::{json, Value};
use shared::{
    domain::{Breed, DeletionRequest, User},
    entity::Entity,
    error::{GatewayError, ValidationError},
    query::{Operation, QueryDescriptor},
};
use tracing::info;

use crate::actions::{Action, ActionDispatcher, ActionOutcome, DispatchError};

pub const BREEDS_TABLE: &str = "breeds";
pub const BREED_SPECIES: [&str; 5] = ["dog", "cat", "bird", "rabbit", "other"];

/// Fields of the breed form.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BreedDraft {
    pub name: String,
    pub species: String,
    pub is_active: bool,
}

impl BreedDraft {
    pub fn into_record(self) -> Result<Record, ValidationError> {
        let name = self.name.trim();
        if name.is_empty() {
            return Err(ValidationError::new("name", "is required"));
        }
        let species = self.species.trim().to_lowercase();
        if !BREED_SPECIES.contains(&species.as_str()) {
            return Err(ValidationError::new(
                "species",
                format!("'{}' is not one of {}", self.species, BREED_SPECIES.join(", ")),
            ));
        }

        let mut record = Record::new();
        record.insert("name".into(), json!(name));
        record.insert("species".into(), json!(species));
        record.insert("is_active".into(), json!(self.is_active));
        Ok(record)
    }
}

/// The whole catalogue, alphabetical.
pub async fn list_breeds(gateway: &dyn Gateway) -> Result<Vec<Breed>, GatewayError> {
    let descriptor = QueryDescriptor::new(BREEDS_TABLE)
        .select("id, name, species, is_active")
        .order_by("name", true);
    gateway::fetch(gateway, &descriptor).await
}

fn breed_from(outcome: ActionOutcome, operation: Operation) -> Result<Breed, DispatchError> {
    let ActionOutcome::Record(row) = outcome else {
        return Err(GatewayError::new(BREEDS_TABLE, operation, "store returned no row").into());
    };
    let mut rows = decode_rows::<Breed>(BREEDS_TABLE, operation, vec![row])?;
    rows.pop()
        .ok_or_else(|| GatewayError::new(BREEDS_TABLE, operation, "no row matched").into())
}

impl ActionDispatcher {
    /// New breeds always start active.
    pub async fn add_breed(&self, draft: BreedDraft) -> Result<Breed, DispatchError> {
        let payload = BreedDraft {
            is_active: true,
            ..draft
        }
        .into_record()?;
        let details = json!({ "breedData": Value::Object(payload.clone()) });
        let outcome = self
            .perform(Action::Insert {
                table: BREEDS_TABLE.to_string(),
                payload,
            })
            .await?;
        let breed = breed_from(outcome, Operation::Insert)?;
        self.audit().record("BREED_ADDED", details).await;
        Ok(breed)
    }

    pub async fn update_breed(
        &self,
        breed_id: &str,
        draft: BreedDraft,
    ) -> Result<Breed, DispatchError> {
        let payload = draft.into_record()?;
        let details = json!({ "breedId": breed_id, "updates": Value::Object(payload.clone()) });
        let outcome = self
            .perform(Action::Update {
                table: BREEDS_TABLE.to_string(),
                id: breed_id.to_string(),
                payload,
            })
            .await?;
        let breed = breed_from(outcome, Operation::Update)?;
        self.audit().record("BREED_UPDATED", details).await;
        Ok(breed)
    }

    pub async fn delete_breed(&self, breed_id: &str) -> Result<bool, DispatchError> {
        let removed = self.delete_row(BREEDS_TABLE, breed_id).await?;
        self.audit()
            .record("BREED_DELETED", json!({ "breedId": breed_id }))
            .await;
        Ok(removed)
    }

    async fn pending_deletion(&self, request_id: &str) -> Result<DeletionRequest, DispatchError> {
        let request = self.require_by_id::<DeletionRequest>(request_id).await?;
        if !request.is_pending() {
            return Err(ValidationError::new(
                "status",
                format!(
                    "request {request_id} is already {}",
                    request.status.as_deref().unwrap_or("closed")
                ),
            )
            .into());
        }
        Ok(request)
    }

    async fn close_deletion(
        &self,
        request_id: &str,
        status: &str,
    ) -> Result<DeletionRequest, DispatchError> {
        let mut payload = Record::new();
        payload.insert("status".into(), json!(status));
        payload.insert("processed_at".into(), json!(Utc::now().to_rfc3339()));
        self.update_typed::<DeletionRequest>(request_id, payload).await
    }

    /// Deletes the requesting profile, then marks the request completed.
    pub async fn process_deletion(
        &self,
        request_id: &str,
    ) -> Result<DeletionRequest, DispatchError> {
        let request = self.pending_deletion(request_id).await?;
        let user_id = request.user_id().cloned();
        if let Some(user_id) = &user_id {
            self.delete_row(User::TABLE, user_id.as_str()).await?;
        }
        let closed = self.close_deletion(request_id, "completed").await?;

        info!(request_id, user_id = ?user_id, "account deleted on request");
        self.audit()
            .record(
                "ACCOUNT_DELETED",
                json!({ "requestId": request_id, "userId": user_id }),
            )
            .await;
        Ok(closed)
    }

    pub async fn reject_deletion(
        &self,
        request_id: &str,
    ) -> Result<DeletionRequest, DispatchError> {
        self.pending_deletion(request_id).await?;
        let closed = self.close_deletion(request_id, "rejected").await?;
        self.audit()
            .record("DELETION_REJECTED", json!({ "requestId": request_id }))
            .await;
        Ok(closed)
    }
}

#[cfg(test)]
#[path = "tests/system_tests.rs"]
mod tests;
