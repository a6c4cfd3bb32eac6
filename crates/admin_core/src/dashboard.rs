use gateway::Gateway;
use shared::{
    domain::{Pet, Report, ReportStatus, User},
    entity::Entity,
    error::GatewayError,
    query::{Filters, QueryDescriptor},
};
use tracing::info;

use crate::render::format_count;

pub const POSTS_TABLE: &str = "posts";
pub const LOST_REPORTS_TABLE: &str = "lost_reports";
/// Rows shown in each "recent" panel.
pub const RECENT_LIMIT: u64 = 5;

/// Headline tallies shown on the overview screen.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct DashboardStats {
    pub total_users: u64,
    pub total_pets: u64,
    pub total_posts: u64,
    pub pending_reports: u64,
    pub lost_pets: u64,
}

impl DashboardStats {
    pub async fn load(gateway: &dyn Gateway) -> Result<Self, GatewayError> {
        let no_filters = Filters::new();
        let pending = status_filter(ReportStatus::Pending.as_str());
        let active = status_filter("active");

        let (total_users, total_pets, total_posts, pending_reports, lost_pets) = futures::try_join!(
            gateway.count(User::TABLE, &no_filters),
            gateway.count(Pet::TABLE, &no_filters),
            gateway.count(POSTS_TABLE, &no_filters),
            gateway.count(Report::TABLE, &pending),
            gateway.count(LOST_REPORTS_TABLE, &active),
        )?;

        let stats = Self {
            total_users,
            total_pets,
            total_posts,
            pending_reports,
            lost_pets,
        };
        info!(?stats, "dashboard tallies loaded");
        Ok(stats)
    }

    pub fn cards(&self) -> Vec<(&'static str, String)> {
        vec![
            ("Total users", format_count(self.total_users)),
            ("Registered pets", format_count(self.total_pets)),
            ("Posts", format_count(self.total_posts)),
            ("Pending reports", format_count(self.pending_reports)),
            ("Lost pets", format_count(self.lost_pets)),
        ]
    }
}

fn status_filter(status: &str) -> Filters {
    Filters::from([("status".to_string(), status.to_string())])
}

fn recent<E: Entity>() -> QueryDescriptor {
    QueryDescriptor::new(E::TABLE)
        .select(E::SELECT)
        .order_by("created_at", false)
        .limit(RECENT_LIMIT)
}

pub async fn recent_users(gateway: &dyn Gateway) -> Result<Vec<User>, GatewayError> {
    gateway::fetch(gateway, &recent::<User>()).await
}

pub async fn recent_pets(gateway: &dyn Gateway) -> Result<Vec<Pet>, GatewayError> {
    gateway::fetch(gateway, &recent::<Pet>()).await
}

/// Newest reports still waiting for a decision.
pub async fn pending_reports(gateway: &dyn Gateway) -> Result<Vec<Report>, GatewayError> {
    let descriptor = recent::<Report>().eq("status", ReportStatus::Pending.as_str());
    gateway::fetch(gateway, &descriptor).await
}

/// Per-status report counts over the loaded collection.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ReportTally {
    pub pending: usize,
    pub resolved: usize,
    pub dismissed: usize,
}

impl ReportTally {
    pub fn from_reports(reports: &[Report]) -> Self {
        reports
            .iter()
            .fold(Self::default(), |mut tally, report| {
                match report.status.as_deref() {
                    Some("pending") => tally.pending += 1,
                    Some("resolved") => tally.resolved += 1,
                    Some("dismissed") => tally.dismissed += 1,
                    _ => {}
                }
                tally
            })
    }
}

#[cfg(test)]
#[path = "tests/dashboard_tests.rs"]
mod tests;
