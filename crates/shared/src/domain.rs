use std::{fmt, str::FromStr};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::ValidationError;

macro_rules! id_newtype {
    ($name:ident) => {
        #[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
        #[serde(transparent)]
        pub struct $name(pub String);

        impl $name {
            pub fn as_str(&self) -> &str {
                &self.0
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str(&self.0)
            }
        }

        impl From<&str> for $name {
            fn from(value: &str) -> Self {
                Self(value.to_string())
            }
        }
    };
}

id_newtype!(UserId);
id_newtype!(PetId);
id_newtype!(ReportId);
id_newtype!(FoundationId);
id_newtype!(DeletionRequestId);
id_newtype!(BreedId);

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Role {
    User,
    Foundation,
    Vet,
    Admin,
    AdminGlobal,
    SuperAdmin,
}

impl Role {
    pub const ALL: [Role; 6] = [
        Role::User,
        Role::Foundation,
        Role::Vet,
        Role::Admin,
        Role::AdminGlobal,
        Role::SuperAdmin,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            Role::User => "user",
            Role::Foundation => "foundation",
            Role::Vet => "vet",
            Role::Admin => "admin",
            Role::AdminGlobal => "admin_global",
            Role::SuperAdmin => "super_admin",
        }
    }

    pub fn label(self) -> &'static str {
        match self {
            Role::User => "User",
            Role::Foundation => "Foundation",
            Role::Vet => "Veterinarian",
            Role::Admin => "Admin",
            Role::AdminGlobal => "Global Admin",
            Role::SuperAdmin => "Super Admin",
        }
    }

    /// Roles allowed into the back office.
    pub fn is_admin(self) -> bool {
        matches!(self, Role::Admin | Role::AdminGlobal | Role::SuperAdmin)
    }
}

impl FromStr for Role {
    type Err = ValidationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Role::ALL
            .into_iter()
            .find(|role| role.as_str() == s)
            .ok_or_else(|| ValidationError::new("role", format!("unknown role '{s}'")))
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ReportStatus {
    Pending,
    Resolved,
    Dismissed,
}

impl ReportStatus {
    pub fn as_str(self) -> &'static str {
        match self {
            ReportStatus::Pending => "pending",
            ReportStatus::Resolved => "resolved",
            ReportStatus::Dismissed => "dismissed",
        }
    }
}

/// Row of the `profiles` table.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct User {
    pub id: UserId,
    pub created_at: DateTime<Utc>,
    #[serde(default)]
    pub username: Option<String>,
    #[serde(default)]
    pub email: Option<String>,
    #[serde(default)]
    pub first_name: Option<String>,
    #[serde(default)]
    pub last_name: Option<String>,
    #[serde(default)]
    pub avatar_url: Option<String>,
    #[serde(default)]
    pub role: Option<String>,
    #[serde(default)]
    pub trust_score: Option<i32>,
    #[serde(default)]
    pub country: Option<String>,
    #[serde(default)]
    pub city: Option<String>,
    #[serde(default)]
    pub status: Option<String>,
    #[serde(default)]
    pub is_verified: Option<bool>,
    #[serde(default)]
    pub is_verified_vet: Option<bool>,
}

impl User {
    pub fn display_name(&self) -> &str {
        self.username
            .as_deref()
            .or(self.first_name.as_deref())
            .unwrap_or("Unnamed")
    }

    pub fn parsed_role(&self) -> Option<Role> {
        self.role.as_deref().and_then(|r| r.parse().ok())
    }

    pub fn is_banned(&self) -> bool {
        self.status.as_deref() == Some("banned")
    }

    pub fn is_verified_vet(&self) -> bool {
        self.is_verified_vet.unwrap_or(false)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PetOwner {
    pub id: UserId,
    #[serde(default)]
    pub username: Option<String>,
    #[serde(default)]
    pub email: Option<String>,
    #[serde(default)]
    pub avatar_url: Option<String>,
}

/// Row of the `pets` table with its owner profile embedded.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Pet {
    pub id: PetId,
    pub created_at: DateTime<Utc>,
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub species: Option<String>,
    #[serde(default)]
    pub breed: Option<String>,
    #[serde(default)]
    pub gender: Option<String>,
    #[serde(default)]
    pub bio: Option<String>,
    #[serde(default)]
    pub status: Option<String>,
    #[serde(default)]
    pub owner: Option<PetOwner>,
}

impl Pet {
    /// Status bucket used for filtering: `lost`, `adopted`, anything else is `normal`.
    pub fn status_bucket(&self) -> &'static str {
        match self.status.as_deref() {
            Some("lost") => "lost",
            Some("adopted") => "adopted",
            _ => "normal",
        }
    }

    pub fn owner_username(&self) -> Option<&str> {
        self.owner.as_ref().and_then(|o| o.username.as_deref())
    }
}

/// Row of the `moderation_reports` table.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Report {
    pub id: ReportId,
    pub created_at: DateTime<Utc>,
    #[serde(default)]
    pub reason: Option<String>,
    #[serde(default)]
    pub status: Option<String>,
    #[serde(default)]
    pub content_type: Option<String>,
    #[serde(default)]
    pub reporter_id: Option<UserId>,
    #[serde(default)]
    pub reported_user_id: Option<UserId>,
    #[serde(default)]
    pub post_id: Option<String>,
    #[serde(default)]
    pub comment_id: Option<String>,
    #[serde(default)]
    pub resolved_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub resolved_by: Option<UserId>,
}

impl Report {
    pub fn is_pending(&self) -> bool {
        self.status.as_deref() == Some(ReportStatus::Pending.as_str())
    }

    /// Table and row id of the reported content, when the report points at one.
    pub fn content_target(&self) -> Option<(&'static str, &str)> {
        match (self.content_type.as_deref(), &self.post_id, &self.comment_id) {
            (Some("post"), Some(post_id), _) => Some(("posts", post_id.as_str())),
            (Some("comment"), _, Some(comment_id)) => Some(("comments", comment_id.as_str())),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FoundationOwner {
    #[serde(default)]
    pub display_name: Option<String>,
    #[serde(default)]
    pub username: Option<String>,
    #[serde(default)]
    pub email: Option<String>,
}

/// Row of the `foundations` table: a shelter asking to be verified.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Foundation {
    pub id: FoundationId,
    pub created_at: DateTime<Utc>,
    #[serde(default)]
    pub user_id: Option<UserId>,
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub status: Option<String>,
    #[serde(default)]
    pub rut_url: Option<String>,
    #[serde(default)]
    pub id_card_url: Option<String>,
    #[serde(default)]
    pub verified_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub rejection_reason: Option<String>,
    #[serde(default)]
    pub profiles: Option<FoundationOwner>,
}

impl Foundation {
    pub fn owner_name(&self) -> Option<&str> {
        let owner = self.profiles.as_ref()?;
        owner
            .display_name
            .as_deref()
            .or(owner.username.as_deref())
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RequestingUser {
    pub id: UserId,
    #[serde(default)]
    pub username: Option<String>,
    #[serde(default)]
    pub email: Option<String>,
}

/// Row of `account_deletion_requests`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DeletionRequest {
    pub id: DeletionRequestId,
    pub created_at: DateTime<Utc>,
    #[serde(default)]
    pub status: Option<String>,
    #[serde(default)]
    pub reason: Option<String>,
    #[serde(default)]
    pub processed_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub user: Option<RequestingUser>,
}

impl DeletionRequest {
    pub fn is_pending(&self) -> bool {
        self.status.as_deref() == Some("pending")
    }

    pub fn user_id(&self) -> Option<&UserId> {
        self.user.as_ref().map(|user| &user.id)
    }
}

/// Row of the `breeds` catalogue.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Breed {
    pub id: BreedId,
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub species: Option<String>,
    #[serde(default)]
    pub is_active: Option<bool>,
}

impl Breed {
    /// Only an explicit `false` retires a breed.
    pub fn is_active(&self) -> bool {
        self.is_active != Some(false)
    }
}

/// Audit trail entry written to `access_logs`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AccessLogEntry {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub user_id: Option<UserId>,
    pub action_type: String,
    pub details: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub user_agent: Option<String>,
    pub created_at: DateTime<Utc>,
}
