use chrono::{DateTime, Utc};
use shared::domain::{DeletionRequest, Foundation, Pet, Report, Role, User};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Tone {
    Neutral,
    Info,
    Success,
    Warning,
    Danger,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Badge {
    pub label: String,
    pub tone: Tone,
}

impl Badge {
    fn new(label: impl Into<String>, tone: Tone) -> Self {
        Self {
            label: label.into(),
            tone,
        }
    }
}

/// Presentation-ready row. Holds no reference back to the entity.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DisplayRow {
    pub id: String,
    pub title: String,
    pub subtitle: String,
    pub columns: Vec<(&'static str, String)>,
    pub badges: Vec<Badge>,
    pub created: String,
    pub created_relative: String,
}

impl DisplayRow {
    pub fn column(&self, name: &str) -> Option<&str> {
        self.columns
            .iter()
            .find(|(key, _)| *key == name)
            .map(|(_, value)| value.as_str())
    }
}

pub trait Project {
    fn project(&self, now: DateTime<Utc>) -> DisplayRow;
}

pub fn project_page<'a, E, I>(items: I, now: DateTime<Utc>) -> Vec<DisplayRow>
where
    E: Project + 'a,
    I: IntoIterator<Item = &'a E>,
{
    items.into_iter().map(|item| item.project(now)).collect()
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum TrustTier {
    Low,
    Medium,
    High,
}

impl TrustTier {
    pub fn from_score(score: Option<i32>) -> Self {
        match score.unwrap_or(0) {
            s if s < 30 => TrustTier::Low,
            s if s < 70 => TrustTier::Medium,
            _ => TrustTier::High,
        }
    }

    pub fn badge(self) -> Badge {
        match self {
            TrustTier::Low => Badge::new("Low", Tone::Danger),
            TrustTier::Medium => Badge::new("Medium", Tone::Warning),
            TrustTier::High => Badge::new("High", Tone::Success),
        }
    }
}

pub fn role_label(role: Option<&str>) -> String {
    match role {
        None | Some("") => Role::User.label().to_string(),
        Some(raw) => raw
            .parse::<Role>()
            .map(|role| role.label().to_string())
            .unwrap_or_else(|_| raw.to_string()),
    }
}

pub fn species_label(species: Option<&str>) -> String {
    let Some(raw) = species.filter(|s| !s.is_empty()) else {
        return "-".to_string();
    };
    let label = match raw.to_lowercase().as_str() {
        "dog" => "Dog",
        "cat" => "Cat",
        "bird" => "Bird",
        "rabbit" => "Rabbit",
        "hamster" => "Hamster",
        "fish" => "Fish",
        "other" => "Other",
        _ => return raw.to_string(),
    };
    label.to_string()
}

pub fn pet_status_badge(pet: &Pet) -> Badge {
    match pet.status_bucket() {
        "lost" => Badge::new("Lost", Tone::Danger),
        "adopted" => Badge::new("Adopted", Tone::Info),
        _ => Badge::new("Normal", Tone::Success),
    }
}

pub fn report_status_badge(status: Option<&str>) -> Badge {
    match status {
        Some("pending") => Badge::new("Pending", Tone::Warning),
        Some("resolved") => Badge::new("Resolved", Tone::Success),
        Some("dismissed") => Badge::new("Dismissed", Tone::Neutral),
        Some(other) => Badge::new(other, Tone::Neutral),
        None => Badge::new("-", Tone::Neutral),
    }
}

/// Badge for review workflows (foundation verification, account deletion).
pub fn request_status_badge(status: Option<&str>) -> Badge {
    match status {
        Some("pending") => Badge::new("Pending", Tone::Warning),
        Some("approved") => Badge::new("Approved", Tone::Success),
        Some("rejected") => Badge::new("Rejected", Tone::Danger),
        Some("completed") => Badge::new("Completed", Tone::Info),
        Some(other) => Badge::new(other, Tone::Neutral),
        None => Badge::new("-", Tone::Neutral),
    }
}

pub fn format_date(at: DateTime<Utc>) -> String {
    at.format("%d %b %Y").to_string()
}

pub fn relative_time(at: DateTime<Utc>, now: DateTime<Utc>) -> String {
    let elapsed = now.signed_duration_since(at);
    let minutes = elapsed.num_minutes();
    let hours = elapsed.num_hours();
    let days = elapsed.num_days();

    if minutes < 1 {
        "just now".to_string()
    } else if minutes < 60 {
        format!("{minutes}m ago")
    } else if hours < 24 {
        format!("{hours}h ago")
    } else if days < 7 {
        format!("{days}d ago")
    } else {
        format_date(at)
    }
}

/// Compact tally formatting: 1.2M, 3.4K, 999.
pub fn format_count(value: u64) -> String {
    if value >= 1_000_000 {
        format!("{:.1}M", value as f64 / 1_000_000.0)
    } else if value >= 1_000 {
        format!("{:.1}K", value as f64 / 1_000.0)
    } else {
        value.to_string()
    }
}

fn or_dash(value: Option<&str>) -> String {
    value
        .filter(|v| !v.is_empty())
        .unwrap_or("-")
        .to_string()
}

impl Project for User {
    fn project(&self, now: DateTime<Utc>) -> DisplayRow {
        let tier = TrustTier::from_score(self.trust_score);
        let mut badges = vec![tier.badge()];
        if self.is_banned() {
            badges.push(Badge::new("Banned", Tone::Danger));
        }
        if self.is_verified_vet() {
            badges.push(Badge::new("Verified vet", Tone::Info));
        }

        DisplayRow {
            id: self.id.to_string(),
            title: self.display_name().to_string(),
            subtitle: self.email.clone().unwrap_or_default(),
            columns: vec![
                ("role", role_label(self.role.as_deref())),
                ("trust", self.trust_score.unwrap_or(0).to_string()),
                ("country", or_dash(self.country.as_deref())),
                ("city", or_dash(self.city.as_deref())),
            ],
            badges,
            created: format_date(self.created_at),
            created_relative: relative_time(self.created_at, now),
        }
    }
}

impl Project for Pet {
    fn project(&self, now: DateTime<Utc>) -> DisplayRow {
        let subtitle = self
            .breed
            .clone()
            .or_else(|| self.species.clone())
            .unwrap_or_default();

        DisplayRow {
            id: self.id.to_string(),
            title: self.name.clone().unwrap_or_else(|| "Unnamed".to_string()),
            subtitle,
            columns: vec![
                ("species", species_label(self.species.as_deref())),
                ("owner", or_dash(self.owner_username())),
                ("gender", or_dash(self.gender.as_deref())),
            ],
            badges: vec![pet_status_badge(self)],
            created: format_date(self.created_at),
            created_relative: relative_time(self.created_at, now),
        }
    }
}

impl Project for Report {
    fn project(&self, now: DateTime<Utc>) -> DisplayRow {
        DisplayRow {
            id: self.id.to_string(),
            title: self
                .reason
                .clone()
                .unwrap_or_else(|| "No reason given".to_string()),
            subtitle: self
                .content_type
                .clone()
                .unwrap_or_else(|| "content".to_string()),
            columns: vec![
                (
                    "reporter",
                    or_dash(self.reporter_id.as_ref().map(|id| id.as_str())),
                ),
                (
                    "reported",
                    or_dash(self.reported_user_id.as_ref().map(|id| id.as_str())),
                ),
            ],
            badges: vec![report_status_badge(self.status.as_deref())],
            created: format_date(self.created_at),
            created_relative: relative_time(self.created_at, now),
        }
    }
}

impl Project for Foundation {
    fn project(&self, now: DateTime<Utc>) -> DisplayRow {
        let owner = self.profiles.as_ref();
        let documents: Vec<&str> = [("RUT", &self.rut_url), ("ID card", &self.id_card_url)]
            .into_iter()
            .filter(|(_, url)| url.as_deref().is_some_and(|u| !u.is_empty()))
            .map(|(label, _)| label)
            .collect();

        DisplayRow {
            id: self.id.to_string(),
            title: self.name.clone().unwrap_or_else(|| "Unnamed".to_string()),
            subtitle: self.owner_name().unwrap_or("No owner").to_string(),
            columns: vec![
                ("owner", or_dash(owner.and_then(|o| o.username.as_deref()))),
                ("documents", or_dash(Some(documents.join(", ").as_str()))),
            ],
            badges: vec![request_status_badge(self.status.as_deref())],
            created: format_date(self.created_at),
            created_relative: relative_time(self.created_at, now),
        }
    }
}

impl Project for DeletionRequest {
    fn project(&self, now: DateTime<Utc>) -> DisplayRow {
        let user = self.user.as_ref();
        DisplayRow {
            id: self.id.to_string(),
            title: user
                .and_then(|u| u.username.clone())
                .unwrap_or_else(|| "User".to_string()),
            subtitle: user.and_then(|u| u.email.clone()).unwrap_or_default(),
            columns: vec![("reason", or_dash(self.reason.as_deref()))],
            badges: vec![request_status_badge(self.status.as_deref())],
            created: format_date(self.created_at),
            created_relative: relative_time(self.created_at, now),
        }
    }
}

#[cfg(test)]
#[path = "tests/render_tests.rs"]
mod tests;
