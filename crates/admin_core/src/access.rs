use std::sync::Arc;

use chrono::{DateTime, TimeZone, Utc};
use gateway::Gateway;
use jsonwebtoken::{decode, DecodingKey, Validation};
use serde::Deserialize;
use serde_json::json;
use shared::{
    domain::{Role, User, UserId},
    entity::Entity,
    error::GatewayError,
    query::QueryDescriptor,
};
use thiserror::Error;
use tracing::{info, warn};

use crate::audit::AuditLog;

pub const ADMIN_LOGIN: &str = "ADMIN_LOGIN";

#[derive(Debug, Error)]
pub enum AccessError {
    #[error("no active session")]
    NoSession,
    #[error("malformed access token: {0}")]
    MalformedToken(String),
    #[error("session expired at {0}")]
    Expired(DateTime<Utc>),
    #[error("no profile found for user {0}")]
    MissingProfile(UserId),
    #[error("role '{}' may not use the admin panel", .role.as_deref().unwrap_or("none"))]
    InsufficientRole { role: Option<String> },
    #[error(transparent)]
    Gateway(#[from] GatewayError),
}

#[derive(Debug, Deserialize)]
struct SessionClaims {
    sub: String,
    #[serde(default)]
    email: Option<String>,
    exp: i64,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Session {
    pub user_id: UserId,
    pub email: Option<String>,
    pub expires_at: DateTime<Utc>,
}

impl Session {
    /// Reads the claims of an auth-service access token. The signature is not checked here;
    /// the store verifies it on every request the token is attached to.
    pub fn from_access_token(token: &str) -> Result<Self, AccessError> {
        let mut validation = Validation::default();
        validation.insecure_disable_signature_validation();
        validation.validate_exp = false;
        validation.validate_aud = false;
        validation.required_spec_claims.clear();

        let key = DecodingKey::from_secret(&[]);
        let data = decode::<SessionClaims>(token.trim(), &key, &validation)
            .map_err(|err| AccessError::MalformedToken(err.to_string()))?;
        let claims = data.claims;
        let expires_at = Utc
            .timestamp_opt(claims.exp, 0)
            .single()
            .ok_or_else(|| AccessError::MalformedToken(format!("invalid exp {}", claims.exp)))?;

        Ok(Self {
            user_id: UserId(claims.sub),
            email: claims.email,
            expires_at,
        })
    }

    pub fn is_expired_at(&self, now: DateTime<Utc>) -> bool {
        self.expires_at <= now
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AdminPrincipal {
    pub user_id: UserId,
    pub email: Option<String>,
    pub username: Option<String>,
    pub role: Role,
}

/// Confirms a session belongs to an admin before any list view is mounted.
pub struct AccessValidator {
    gateway: Arc<dyn Gateway>,
}

impl AccessValidator {
    pub fn new(gateway: Arc<dyn Gateway>) -> Self {
        Self { gateway }
    }

    pub async fn validate(
        &self,
        session: Option<&Session>,
        now: DateTime<Utc>,
    ) -> Result<AdminPrincipal, AccessError> {
        let session = session.ok_or(AccessError::NoSession)?;
        if session.is_expired_at(now) {
            return Err(AccessError::Expired(session.expires_at));
        }

        // Full row: the role check must not depend on optional profile columns.
        let descriptor = QueryDescriptor::new(User::TABLE)
            .select("*")
            .eq("id", session.user_id.as_str())
            .limit(1);
        let profile = gateway::fetch::<User>(self.gateway.as_ref(), &descriptor)
            .await?
            .pop()
            .ok_or_else(|| AccessError::MissingProfile(session.user_id.clone()))?;

        let role = match profile.parsed_role() {
            Some(role) if role.is_admin() => role,
            _ => {
                warn!(user_id = %session.user_id, role = ?profile.role, "admin access denied");
                return Err(AccessError::InsufficientRole {
                    role: profile.role.clone(),
                });
            }
        };

        info!(user_id = %session.user_id, role = role.as_str(), "admin access granted");
        Ok(AdminPrincipal {
            user_id: session.user_id.clone(),
            email: profile.email.or_else(|| session.email.clone()),
            username: profile.username,
            role,
        })
    }

    /// Validates the session and opens the audit trail of the granted admin with an
    /// `ADMIN_LOGIN` entry.
    pub async fn sign_in(
        &self,
        session: Option<&Session>,
        now: DateTime<Utc>,
        user_agent: Option<String>,
    ) -> Result<(AdminPrincipal, AuditLog), AccessError> {
        let principal = self.validate(session, now).await?;
        let audit = AuditLog::new(
            self.gateway.clone(),
            Some(principal.user_id.clone()),
            user_agent,
        );
        audit.record(ADMIN_LOGIN, json!({})).await;
        Ok((principal, audit))
    }
}

#[cfg(test)]
#[path = "tests/access_tests.rs"]
mod tests;
