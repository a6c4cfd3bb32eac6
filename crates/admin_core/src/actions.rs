use std::sync::Arc;

use async_trait::async_trait;
use chrono::Utc;
use gateway::{decode_rows, Gateway, Record};
use serde_json::{json, Value};
use shared::{
    domain::{Pet, Report, ReportStatus, Role, User},
    entity::Entity,
    error::{GatewayError, ValidationError},
    query::{Operation, QueryDescriptor},
};
use thiserror::Error;
use tracing::info;

use crate::audit::AuditLog;

/// Trust score assumed for profiles that never had one.
pub const DEFAULT_TRUST_SCORE: i32 = 50;
pub const WARNING_TRUST_PENALTY: i32 = 10;

#[derive(Debug, Clone, PartialEq)]
pub enum Action {
    Insert {
        table: String,
        payload: Record,
    },
    Update {
        table: String,
        id: String,
        payload: Record,
    },
    Delete {
        table: String,
        id: String,
    },
}

impl Action {
    pub fn table(&self) -> &str {
        match self {
            Action::Insert { table, .. }
            | Action::Update { table, .. }
            | Action::Delete { table, .. } => table,
        }
    }

    pub fn operation(&self) -> Operation {
        match self {
            Action::Insert { .. } => Operation::Insert,
            Action::Update { .. } => Operation::Update,
            Action::Delete { .. } => Operation::Delete,
        }
    }

    pub fn validate(&self) -> Result<(), ValidationError> {
        if self.table().trim().is_empty() {
            return Err(ValidationError::new("table", "must not be empty"));
        }
        match self {
            Action::Insert { payload, .. } => require_payload(payload),
            Action::Update { id, payload, .. } => {
                require_id(id)?;
                require_payload(payload)
            }
            Action::Delete { id, .. } => require_id(id),
        }
    }
}

fn require_id(id: &str) -> Result<(), ValidationError> {
    if id.trim().is_empty() {
        return Err(ValidationError::new("id", "must not be empty"));
    }
    Ok(())
}

fn require_payload(payload: &Record) -> Result<(), ValidationError> {
    if payload.is_empty() {
        return Err(ValidationError::new("payload", "must set at least one field"));
    }
    Ok(())
}

#[derive(Debug, Clone, PartialEq)]
pub enum ActionOutcome {
    Record(Value),
    /// `removed` is false when no row matched the id.
    Deleted { removed: bool },
}

#[derive(Debug, Error)]
pub enum DispatchError {
    #[error(transparent)]
    Validation(#[from] ValidationError),
    #[error(transparent)]
    Gateway(#[from] GatewayError),
}

/// Edits accepted from the user edit form.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct UserUpdate {
    pub username: String,
    pub role: Option<Role>,
    pub trust_score: Option<i32>,
    pub country: Option<String>,
    pub city: Option<String>,
}

impl UserUpdate {
    pub fn into_record(self) -> Result<Record, ValidationError> {
        let username = self.username.trim();
        if username.is_empty() {
            return Err(ValidationError::new("username", "is required"));
        }

        let mut record = Record::new();
        record.insert("username".into(), json!(username));
        if let Some(role) = self.role {
            record.insert("role".into(), json!(role.as_str()));
        }
        if let Some(score) = self.trust_score {
            if !(0..=100).contains(&score) {
                return Err(ValidationError::new(
                    "trust_score",
                    format!("{score} is outside 0-100"),
                ));
            }
            record.insert("trust_score".into(), json!(score));
        }
        if let Some(country) = self.country {
            record.insert("country".into(), json!(country));
        }
        if let Some(city) = self.city {
            record.insert("city".into(), json!(city));
        }
        Ok(record)
    }
}

/// Edits accepted from the pet edit form.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct PetUpdate {
    pub name: String,
    pub species: Option<String>,
    pub breed: Option<String>,
    pub gender: Option<String>,
    pub bio: Option<String>,
    pub lost: bool,
    pub adopted: bool,
}

impl PetUpdate {
    /// `lost` wins over `adopted`; neither flag means `active`.
    pub fn status(&self) -> &'static str {
        if self.lost {
            "lost"
        } else if self.adopted {
            "adopted"
        } else {
            "active"
        }
    }

    pub fn into_record(self) -> Result<Record, ValidationError> {
        let name = self.name.trim();
        if name.is_empty() {
            return Err(ValidationError::new("name", "is required"));
        }

        let mut record = Record::new();
        record.insert("name".into(), json!(name));
        record.insert("status".into(), json!(self.status()));
        for (key, value) in [
            ("species", &self.species),
            ("breed", &self.breed),
            ("gender", &self.gender),
            ("bio", &self.bio),
        ] {
            if let Some(value) = value {
                record.insert(key.into(), json!(value));
            }
        }
        Ok(record)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReportDecision {
    Resolve,
    Dismiss,
}

impl ReportDecision {
    fn status(self) -> ReportStatus {
        match self {
            ReportDecision::Resolve => ReportStatus::Resolved,
            ReportDecision::Dismiss => ReportStatus::Dismissed,
        }
    }

    fn audit_action(self) -> &'static str {
        match self {
            ReportDecision::Resolve => "REPORT_RESOLVED",
            ReportDecision::Dismiss => "REPORT_DISMISSED",
        }
    }
}

/// Row-level operations a list view exposes for one entity type.
#[async_trait]
pub trait RowActions<E: Entity>: Send + Sync {
    type Edit: Send + 'static;

    async fn view(&self, id: &str) -> Result<Option<E>, DispatchError>;
    async fn edit(&self, id: &str, edit: Self::Edit) -> Result<E, DispatchError>;
    /// Returns whether a row was actually removed.
    async fn delete(&self, id: &str) -> Result<bool, DispatchError>;
}

/// Executes mutations through the gateway. Callers confirm destructive actions first and
/// reload their list afterwards.
#[derive(Clone)]
pub struct ActionDispatcher {
    pub(crate) gateway: Arc<dyn Gateway>,
    audit: AuditLog,
}

impl ActionDispatcher {
    pub fn new(gateway: Arc<dyn Gateway>, audit: AuditLog) -> Self {
        Self { gateway, audit }
    }

    pub fn audit(&self) -> &AuditLog {
        &self.audit
    }

    pub async fn perform(&self, action: Action) -> Result<ActionOutcome, DispatchError> {
        action.validate()?;
        let outcome = match &action {
            Action::Insert { table, payload } => {
                ActionOutcome::Record(self.gateway.insert(table, payload).await?)
            }
            Action::Update { table, id, payload } => {
                ActionOutcome::Record(self.gateway.update(table, id, payload).await?)
            }
            Action::Delete { table, id } => ActionOutcome::Deleted {
                removed: self.gateway.delete(table, id).await?,
            },
        };
        info!(table = action.table(), operation = %action.operation(), "action applied");
        Ok(outcome)
    }

    pub(crate) async fn update_typed<E: Entity>(
        &self,
        id: &str,
        payload: Record,
    ) -> Result<E, DispatchError> {
        let outcome = self
            .perform(Action::Update {
                table: E::TABLE.to_string(),
                id: id.to_string(),
                payload,
            })
            .await?;
        let ActionOutcome::Record(row) = outcome else {
            let err = GatewayError::new(E::TABLE, Operation::Update, "store returned no row");
            return Err(err.into());
        };
        let mut rows = decode_rows::<E>(E::TABLE, Operation::Update, vec![row])?;
        rows.pop()
            .ok_or_else(|| GatewayError::new(E::TABLE, Operation::Update, "no row matched").into())
    }

    pub(crate) async fn delete_row(&self, table: &str, id: &str) -> Result<bool, DispatchError> {
        let outcome = self
            .perform(Action::Delete {
                table: table.to_string(),
                id: id.to_string(),
            })
            .await?;
        Ok(matches!(outcome, ActionOutcome::Deleted { removed: true }))
    }

    async fn fetch_by_id<E: Entity>(&self, id: &str) -> Result<Option<E>, DispatchError> {
        require_id(id)?;
        let descriptor = QueryDescriptor::new(E::TABLE)
            .select(E::SELECT)
            .eq("id", id)
            .limit(1);
        let mut rows = gateway::fetch::<E>(self.gateway.as_ref(), &descriptor).await?;
        Ok(rows.pop())
    }

    pub(crate) async fn require_by_id<E: Entity>(&self, id: &str) -> Result<E, DispatchError> {
        let missing = || GatewayError::new(E::TABLE, Operation::Query, "no row matched");
        Ok(self.fetch_by_id::<E>(id).await?.ok_or_else(missing)?)
    }

    async fn set_user_status(&self, user_id: &str, status: &str) -> Result<User, DispatchError> {
        let mut payload = Record::new();
        payload.insert("status".into(), json!(status));
        self.update_typed::<User>(user_id, payload).await
    }

    pub async fn ban_user(&self, user_id: &str) -> Result<User, DispatchError> {
        let user = self.set_user_status(user_id, "banned").await?;
        self.audit
            .record("USER_BANNED", json!({ "userId": user_id }))
            .await;
        Ok(user)
    }

    pub async fn unban_user(&self, user_id: &str) -> Result<User, DispatchError> {
        let user = self.set_user_status(user_id, "active").await?;
        self.audit
            .record("USER_UNBANNED", json!({ "userId": user_id }))
            .await;
        Ok(user)
    }

    /// Bans the reported user and resolves the report that led to it.
    pub async fn ban_user_from_report(
        &self,
        user_id: &str,
        report_id: &str,
    ) -> Result<User, DispatchError> {
        let user = self.set_user_status(user_id, "banned").await?;
        self.decide_report(report_id, ReportDecision::Resolve).await?;
        self.audit
            .record(
                "USER_BANNED_FROM_REPORT",
                json!({ "userId": user_id, "reportId": report_id }),
            )
            .await;
        Ok(user)
    }

    /// Flips the manual veterinarian verification of a profile.
    pub async fn toggle_vet_verification(&self, user_id: &str) -> Result<User, DispatchError> {
        let user = self.require_by_id::<User>(user_id).await?;
        let mut payload = Record::new();
        payload.insert("is_verified_vet".into(), json!(!user.is_verified_vet()));
        let user = self.update_typed::<User>(user_id, payload).await?;
        info!(user_id, verified = user.is_verified_vet(), "vet verification changed");
        Ok(user)
    }

    pub async fn decide_report(
        &self,
        report_id: &str,
        decision: ReportDecision,
    ) -> Result<Report, DispatchError> {
        let mut payload = Record::new();
        payload.insert("status".into(), json!(decision.status().as_str()));
        payload.insert("resolved_at".into(), json!(Utc::now().to_rfc3339()));
        payload.insert(
            "resolved_by".into(),
            self.audit
                .actor()
                .map(|actor| json!(actor.as_str()))
                .unwrap_or(Value::Null),
        );
        let report = self.update_typed::<Report>(report_id, payload).await?;
        self.audit
            .record(decision.audit_action(), json!({ "reportId": report_id }))
            .await;
        Ok(report)
    }

    /// Lowers the reported user's trust score and closes the report.
    pub async fn warn_user(&self, user_id: &str, report_id: &str) -> Result<User, DispatchError> {
        let user = self.require_by_id::<User>(user_id).await?;
        let base = user.trust_score.unwrap_or(DEFAULT_TRUST_SCORE);
        let score = (base - WARNING_TRUST_PENALTY).max(0);

        let mut payload = Record::new();
        payload.insert("trust_score".into(), json!(score));
        let warned = self.update_typed::<User>(user_id, payload).await?;
        self.decide_report(report_id, ReportDecision::Resolve).await?;
        self.audit
            .record(
                "USER_WARNED",
                json!({ "userId": user_id, "reportId": report_id }),
            )
            .await;
        Ok(warned)
    }

    /// Deletes the post or comment a report points at, then closes the report.
    pub async fn delete_reported_content(
        &self,
        report: &Report,
    ) -> Result<Report, DispatchError> {
        if let Some((table, content_id)) = report.content_target() {
            self.delete_row(table, content_id).await?;
        }
        let resolved = self
            .decide_report(report.id.as_str(), ReportDecision::Resolve)
            .await?;
        self.audit
            .record(
                "CONTENT_DELETED_FROM_REPORT",
                json!({ "reportId": report.id.as_str(), "contentType": report.content_type }),
            )
            .await;
        Ok(resolved)
    }
}

#[async_trait]
impl RowActions<User> for ActionDispatcher {
    type Edit = UserUpdate;

    async fn view(&self, id: &str) -> Result<Option<User>, DispatchError> {
        self.fetch_by_id(id).await
    }

    async fn edit(&self, id: &str, edit: UserUpdate) -> Result<User, DispatchError> {
        let payload = edit.into_record()?;
        let details = json!({ "userId": id, "updates": Value::Object(payload.clone()) });
        let user = self.update_typed::<User>(id, payload).await?;
        self.audit.record("USER_EDITED", details).await;
        Ok(user)
    }

    async fn delete(&self, id: &str) -> Result<bool, DispatchError> {
        let removed = self.delete_row(User::TABLE, id).await?;
        self.audit
            .record("USER_DELETED", json!({ "userId": id }))
            .await;
        Ok(removed)
    }
}

#[async_trait]
impl RowActions<Pet> for ActionDispatcher {
    type Edit = PetUpdate;

    async fn view(&self, id: &str) -> Result<Option<Pet>, DispatchError> {
        self.fetch_by_id(id).await
    }

    async fn edit(&self, id: &str, edit: PetUpdate) -> Result<Pet, DispatchError> {
        let payload = edit.into_record()?;
        let pet = self.update_typed::<Pet>(id, payload).await?;
        self.audit.record("PET_EDITED", json!({ "petId": id })).await;
        Ok(pet)
    }

    async fn delete(&self, id: &str) -> Result<bool, DispatchError> {
        let removed = self.delete_row(Pet::TABLE, id).await?;
        self.audit.record("PET_DELETED", json!({ "petId": id })).await;
        Ok(removed)
    }
}

#[async_trait]
impl RowActions<Report> for ActionDispatcher {
    type Edit = ReportDecision;

    async fn view(&self, id: &str) -> Result<Option<Report>, DispatchError> {
        self.fetch_by_id(id).await
    }

    async fn edit(&self, id: &str, decision: ReportDecision) -> Result<Report, DispatchError> {
        self.decide_report(id, decision).await
    }

    async fn delete(&self, id: &str) -> Result<bool, DispatchError> {
        let removed = self.delete_row(Report::TABLE, id).await?;
        self.audit
            .record("REPORT_DELETED", json!({ "reportId": id }))
            .await;
        Ok(removed)
    }
}

#[cfg(test)]
#[path = "tests/actions_tests.rs"]
mod tests;
