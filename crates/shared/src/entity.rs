use std::{fmt::Debug, hash::Hash};

use chrono::{DateTime, Utc};
use serde::de::DeserializeOwned;

use crate::{
    domain::{DeletionRequest, Foundation, Pet, Report, User},
    error::ValidationError,
    query::{QueryDescriptor, DEFAULT_ORDER_FIELD},
};

/// Filter value meaning "no constraint on this key".
pub const FILTER_ALL: &str = "all";

/// Closed set of filterable columns for one entity type.
pub trait FilterField: Copy + Eq + Hash + Debug + Send + Sync + 'static {
    const ALL: &'static [Self];

    fn key(self) -> &'static str;

    fn parse(key: &str) -> Result<Self, ValidationError> {
        Self::ALL
            .iter()
            .copied()
            .find(|field| field.key() == key)
            .ok_or_else(|| ValidationError::new("filter", format!("unknown filter key '{key}'")))
    }
}

/// A store row with a known schema that can back a list view.
pub trait Entity: DeserializeOwned + Clone + Send + Sync + 'static {
    type Field: FilterField;

    const TABLE: &'static str;
    const SELECT: &'static str;
    const PAGE_SIZE: usize;

    fn id(&self) -> &str;
    fn created_at(&self) -> DateTime<Utc>;

    /// Value compared for equality against an active filter.
    fn field_value(&self, field: Self::Field) -> Option<&str>;

    /// Texts matched by the free-text search; missing fields are skipped.
    fn search_texts(&self) -> Vec<&str>;

    fn default_filter(_field: Self::Field) -> &'static str {
        FILTER_ALL
    }

    /// Fixed descriptor used by every list load.
    fn list_descriptor() -> QueryDescriptor {
        QueryDescriptor::new(Self::TABLE)
            .select(Self::SELECT)
            .order_by(DEFAULT_ORDER_FIELD, false)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum UserField {
    Role,
    Country,
}

impl FilterField for UserField {
    const ALL: &'static [Self] = &[UserField::Role, UserField::Country];

    fn key(self) -> &'static str {
        match self {
            UserField::Role => "role",
            UserField::Country => "country",
        }
    }
}

impl Entity for User {
    type Field = UserField;

    const TABLE: &'static str = "profiles";
    // Moderation columns (`status`, verification flags) are not on every deployment, so
    // the whole row is requested and absent columns decode as `None`.
    const SELECT: &'static str = "*";
    const PAGE_SIZE: usize = 20;

    fn id(&self) -> &str {
        self.id.as_str()
    }

    fn created_at(&self) -> DateTime<Utc> {
        self.created_at
    }

    fn field_value(&self, field: UserField) -> Option<&str> {
        match field {
            UserField::Role => self.role.as_deref(),
            UserField::Country => self.country.as_deref(),
        }
    }

    fn search_texts(&self) -> Vec<&str> {
        [
            self.username.as_deref(),
            self.email.as_deref(),
            self.first_name.as_deref(),
            self.last_name.as_deref(),
        ]
        .into_iter()
        .flatten()
        .collect()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PetField {
    Species,
    Status,
}

impl FilterField for PetField {
    const ALL: &'static [Self] = &[PetField::Species, PetField::Status];

    fn key(self) -> &'static str {
        match self {
            PetField::Species => "species",
            PetField::Status => "status",
        }
    }
}

impl Entity for Pet {
    type Field = PetField;

    const TABLE: &'static str = "pets";
    const SELECT: &'static str = "id, name, species, breed, gender, bio, status, created_at, \
        owner:profiles!owner_id(id, username, email, avatar_url)";
    const PAGE_SIZE: usize = 20;

    fn id(&self) -> &str {
        self.id.as_str()
    }

    fn created_at(&self) -> DateTime<Utc> {
        self.created_at
    }

    fn field_value(&self, field: PetField) -> Option<&str> {
        match field {
            PetField::Species => self.species.as_deref(),
            PetField::Status => Some(self.status_bucket()),
        }
    }

    fn search_texts(&self) -> Vec<&str> {
        [
            self.name.as_deref(),
            self.breed.as_deref(),
            self.owner_username(),
        ]
        .into_iter()
        .flatten()
        .collect()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ReportField {
    Status,
    ContentType,
}

impl FilterField for ReportField {
    const ALL: &'static [Self] = &[ReportField::Status, ReportField::ContentType];

    fn key(self) -> &'static str {
        match self {
            ReportField::Status => "status",
            ReportField::ContentType => "content_type",
        }
    }
}

impl Entity for Report {
    type Field = ReportField;

    const TABLE: &'static str = "moderation_reports";
    const SELECT: &'static str = "*";
    const PAGE_SIZE: usize = 15;

    fn id(&self) -> &str {
        self.id.as_str()
    }

    fn created_at(&self) -> DateTime<Utc> {
        self.created_at
    }

    fn field_value(&self, field: ReportField) -> Option<&str> {
        match field {
            ReportField::Status => self.status.as_deref(),
            ReportField::ContentType => self.content_type.as_deref(),
        }
    }

    fn search_texts(&self) -> Vec<&str> {
        self.reason.as_deref().into_iter().collect()
    }

    fn default_filter(field: ReportField) -> &'static str {
        match field {
            ReportField::Status => "pending",
            ReportField::ContentType => FILTER_ALL,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum FoundationField {
    Status,
}

impl FilterField for FoundationField {
    const ALL: &'static [Self] = &[FoundationField::Status];

    fn key(self) -> &'static str {
        match self {
            FoundationField::Status => "status",
        }
    }
}

impl Entity for Foundation {
    type Field = FoundationField;

    const TABLE: &'static str = "foundations";
    const SELECT: &'static str = "*, profiles:user_id(display_name, email, username)";
    const PAGE_SIZE: usize = 20;

    fn id(&self) -> &str {
        self.id.as_str()
    }

    fn created_at(&self) -> DateTime<Utc> {
        self.created_at
    }

    fn field_value(&self, field: FoundationField) -> Option<&str> {
        match field {
            FoundationField::Status => self.status.as_deref(),
        }
    }

    fn search_texts(&self) -> Vec<&str> {
        let owner = self.profiles.as_ref();
        [
            self.name.as_deref(),
            owner.and_then(|o| o.display_name.as_deref()),
            owner.and_then(|o| o.username.as_deref()),
            owner.and_then(|o| o.email.as_deref()),
        ]
        .into_iter()
        .flatten()
        .collect()
    }

    fn default_filter(_field: FoundationField) -> &'static str {
        "pending"
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum DeletionRequestField {
    Status,
}

impl FilterField for DeletionRequestField {
    const ALL: &'static [Self] = &[DeletionRequestField::Status];

    fn key(self) -> &'static str {
        match self {
            DeletionRequestField::Status => "status",
        }
    }
}

impl Entity for DeletionRequest {
    type Field = DeletionRequestField;

    const TABLE: &'static str = "account_deletion_requests";
    const SELECT: &'static str =
        "id, status, reason, created_at, user:profiles!user_id(id, username, email)";
    const PAGE_SIZE: usize = 20;

    fn id(&self) -> &str {
        self.id.as_str()
    }

    fn created_at(&self) -> DateTime<Utc> {
        self.created_at
    }

    fn field_value(&self, field: DeletionRequestField) -> Option<&str> {
        match field {
            DeletionRequestField::Status => self.status.as_deref(),
        }
    }

    fn search_texts(&self) -> Vec<&str> {
        let user = self.user.as_ref();
        [
            self.reason.as_deref(),
            user.and_then(|u| u.username.as_deref()),
            user.and_then(|u| u.email.as_deref()),
        ]
        .into_iter()
        .flatten()
        .collect()
    }
}
