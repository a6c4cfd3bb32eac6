use std::sync::Arc;

use super::*;
use serde_json::json;
use shared::query::Operation;

use crate::stub_gateway::StubGateway;

fn seeded() -> Arc<StubGateway> {
    let users = (1..=7)
        .map(|n| json!({ "id": format!("u{n}"), "created_at": format!("2024-05-0{n}T00:00:00Z") }))
        .collect();
    let pets = (1..=3)
        .map(|n| json!({ "id": format!("p{n}"), "created_at": "2024-05-01T00:00:00Z" }))
        .collect();
    let reports = ["pending", "pending", "resolved", "dismissed", "pending"]
        .iter()
        .enumerate()
        .map(|(n, status)| {
            json!({
                "id": format!("r{n}"),
                "status": status,
                "created_at": "2024-05-01T00:00:00Z"
            })
        })
        .collect();
    let lost = ["active", "found", "active"]
        .iter()
        .map(|status| json!({ "status": status }))
        .collect();

    Arc::new(
        StubGateway::new()
            .with_rows("profiles", users)
            .with_rows("pets", pets)
            .with_rows("posts", vec![json!({ "id": "post-1" }), json!({ "id": "post-2" })])
            .with_rows("moderation_reports", reports)
            .with_rows("lost_reports", lost),
    )
}

#[tokio::test]
async fn stats_count_each_table_with_its_filter() {
    let stub = seeded();
    let stats = DashboardStats::load(stub.as_ref()).await.expect("stats");
    assert_eq!(
        stats,
        DashboardStats {
            total_users: 7,
            total_pets: 3,
            total_posts: 2,
            pending_reports: 3,
            lost_pets: 2,
        }
    );

    let counts: Vec<_> = stub
        .calls()
        .into_iter()
        .filter(|call| call.operation == Operation::Count)
        .collect();
    assert_eq!(counts.len(), 5);
    let pending_filter = counts
        .iter()
        .find(|call| call.table == "moderation_reports")
        .and_then(|call| call.payload.clone())
        .expect("report count filter");
    assert_eq!(pending_filter["status"], json!("pending"));
}

#[tokio::test]
async fn one_failed_count_fails_the_whole_load() {
    let stub = seeded();
    stub.fail("posts", Operation::Count, "timeout");
    let err = DashboardStats::load(stub.as_ref()).await.expect_err("load fails");
    assert_eq!(err.table, "posts");
    assert_eq!(err.operation, Operation::Count);
}

#[test]
fn cards_use_compact_counts() {
    let stats = DashboardStats {
        total_users: 12_400,
        total_pets: 950,
        total_posts: 1_500_000,
        pending_reports: 0,
        lost_pets: 3,
    };
    let cards = stats.cards();
    assert_eq!(cards[0], ("Total users", "12.4K".to_string()));
    assert_eq!(cards[1].1, "950");
    assert_eq!(cards[2].1, "1.5M");
    assert_eq!(cards.len(), 5);
}

#[tokio::test]
async fn recent_users_are_capped_and_newest_first() {
    let stub = seeded();
    let users = recent_users(stub.as_ref()).await.expect("recent users");
    assert_eq!(users.len(), RECENT_LIMIT as usize);

    let descriptor = stub.calls()[0].descriptor.clone().expect("descriptor");
    assert_eq!(descriptor.limit, Some(RECENT_LIMIT));
    let order = descriptor.effective_order();
    assert_eq!(order.field, "created_at");
    assert!(!order.ascending);
}

#[tokio::test]
async fn recent_pets_come_newest_first() {
    let stub = seeded();
    let pets = recent_pets(stub.as_ref()).await.expect("recent pets");
    assert_eq!(pets.len(), 3);

    let descriptor = stub.calls_to("pets")[0]
        .descriptor
        .clone()
        .expect("descriptor");
    assert_eq!(descriptor.limit, Some(RECENT_LIMIT));
    assert!(!descriptor.effective_order().ascending);
    assert!(descriptor.compact_select().contains("owner:profiles!owner_id"));
}

#[tokio::test]
async fn pending_reports_panel_only_shows_pending() {
    let stub = seeded();
    let reports = pending_reports(stub.as_ref()).await.expect("pending reports");
    let ids: Vec<&str> = reports.iter().map(|r| r.id.as_str()).collect();
    assert_eq!(ids, vec!["r0", "r1", "r4"]);
    assert!(reports.iter().all(Report::is_pending));

    let descriptor = stub.calls_to("moderation_reports")[0]
        .descriptor
        .clone()
        .expect("descriptor");
    assert_eq!(descriptor.filters.get("status").map(String::as_str), Some("pending"));
    assert_eq!(descriptor.limit, Some(RECENT_LIMIT));
}

#[tokio::test]
async fn pending_reports_panel_is_capped() {
    let reports = (0..8)
        .map(|n| {
            json!({
                "id": format!("r{n}"),
                "status": "pending",
                "created_at": "2024-05-01T00:00:00Z"
            })
        })
        .collect();
    let stub = StubGateway::new().with_rows("moderation_reports", reports);
    let panel = pending_reports(&stub).await.expect("pending reports");
    assert_eq!(panel.len(), RECENT_LIMIT as usize);
}

#[test]
fn report_tally_groups_by_status() {
    let reports: Vec<Report> = ["pending", "resolved", "pending", "dismissed", "escalated"]
        .iter()
        .enumerate()
        .map(|(n, status)| {
            serde_json::from_value(json!({
                "id": format!("r{n}"),
                "status": status,
                "created_at": "2024-05-01T00:00:00Z"
            }))
            .expect("report")
        })
        .collect();

    assert_eq!(
        ReportTally::from_reports(&reports),
        ReportTally {
            pending: 2,
            resolved: 1,
            dismissed: 1,
        }
    );
    assert_eq!(ReportTally::from_reports(&[]), ReportTally::default());
}
