use super::*;
use serde_json::json;
use shared::domain::UserId;

use crate::{audit::ACCESS_LOG_TABLE, list::ListController, stub_gateway::StubGateway};

fn profile(id: &str, username: &str, trust_score: Option<i32>) -> Value {
    json!({
        "id": id,
        "username": username,
        "role": "user",
        "trust_score": trust_score,
        "created_at": "2024-04-01T09:00:00Z"
    })
}

fn report(
    id: &str,
    content_type: &str,
    post_id: Option<&str>,
    comment_id: Option<&str>,
) -> Value {
    json!({
        "id": id,
        "reason": "spam",
        "status": "pending",
        "content_type": content_type,
        "reporter_id": "u2",
        "reported_user_id": "u1",
        "post_id": post_id,
        "comment_id": comment_id,
        "created_at": "2024-04-02T09:00:00Z"
    })
}

fn single_profile() -> StubGateway {
    StubGateway::new().with_rows("profiles", vec![profile("u1", "maxine", Some(40))])
}

fn dispatcher(stub: &Arc<StubGateway>) -> ActionDispatcher {
    let audit = AuditLog::new(
        stub.clone(),
        Some(UserId::from("admin-1")),
        Some("petadmin-test".to_string()),
    );
    ActionDispatcher::new(stub.clone(), audit)
}

fn audit_actions(stub: &StubGateway) -> Vec<String> {
    stub.rows(ACCESS_LOG_TABLE)
        .iter()
        .filter_map(|row| row["action_type"].as_str().map(str::to_string))
        .collect()
}

#[tokio::test]
async fn invalid_actions_never_reach_the_gateway() {
    let stub = Arc::new(StubGateway::new());
    let dispatcher = dispatcher(&stub);

    let cases = vec![
        Action::Delete {
            table: "profiles".into(),
            id: "  ".into(),
        },
        Action::Update {
            table: "profiles".into(),
            id: "u1".into(),
            payload: Record::new(),
        },
        Action::Insert {
            table: String::new(),
            payload: Record::from_iter([("name".to_string(), json!("Toby"))]),
        },
    ];
    for action in cases {
        let err = dispatcher.perform(action).await.expect_err("rejected");
        assert!(matches!(err, DispatchError::Validation(_)), "{err:?}");
    }
    assert!(stub.calls().is_empty());
}

#[tokio::test]
async fn gateway_failures_surface_as_dispatch_errors() {
    let stub = Arc::new(StubGateway::new());
    stub.fail("pets", Operation::Delete, "permission denied");
    let dispatcher = dispatcher(&stub);

    let err = RowActions::<Pet>::delete(&dispatcher, "p1")
        .await
        .expect_err("delete fails");
    let err = match err {
        DispatchError::Gateway(err) => err,
        other => panic!("expected gateway error, got {other:?}"),
    };
    assert_eq!(err.operation, Operation::Delete);
    assert_eq!(err.message, "permission denied");
    assert!(audit_actions(&stub).is_empty());
}

#[test]
fn user_update_requires_a_username_and_bounded_score() {
    let err = UserUpdate {
        username: "   ".into(),
        ..Default::default()
    }
    .into_record()
    .expect_err("blank username");
    assert_eq!(err.field, "username");

    let err = UserUpdate {
        username: "maxine".into(),
        trust_score: Some(101),
        ..Default::default()
    }
    .into_record()
    .expect_err("score too high");
    assert_eq!(err.field, "trust_score");

    let record = UserUpdate {
        username: " maxine ".into(),
        role: Some(Role::Vet),
        trust_score: Some(0),
        country: Some("CL".into()),
        city: None,
    }
    .into_record()
    .expect("valid edit");
    assert_eq!(record["username"], json!("maxine"));
    assert_eq!(record["role"], json!("vet"));
    assert_eq!(record["trust_score"], json!(0));
    assert!(!record.contains_key("city"));
}

#[test]
fn pet_update_derives_status_from_flags() {
    let mut edit = PetUpdate {
        name: "Toby".into(),
        ..Default::default()
    };
    assert_eq!(edit.status(), "active");
    edit.adopted = true;
    assert_eq!(edit.status(), "adopted");
    edit.lost = true;
    assert_eq!(edit.status(), "lost");

    let err = PetUpdate::default().into_record().expect_err("name required");
    assert_eq!(err.field, "name");
}

#[tokio::test]
async fn edited_user_is_visible_after_reload() {
    let stub = Arc::new(StubGateway::new().with_rows(
        "profiles",
        vec![profile("u1", "maxine", Some(40)), profile("u2", "alex", None)],
    ));
    let dispatcher = dispatcher(&stub);
    let users: ListController<User> = ListController::new(stub.clone());
    users.load().await.expect("load");

    let updated = RowActions::<User>::edit(
        &dispatcher,
        "u1",
        UserUpdate {
            username: "maxine_v".into(),
            role: Some(Role::Foundation),
            trust_score: Some(80),
            ..Default::default()
        },
    )
    .await
    .expect("edit");
    assert_eq!(updated.username.as_deref(), Some("maxine_v"));

    users.load().await.expect("reload");
    let reloaded = users.find("u1").await.expect("u1 still listed");
    assert_eq!(reloaded.username.as_deref(), Some("maxine_v"));
    assert_eq!(reloaded.role.as_deref(), Some("foundation"));
    assert_eq!(reloaded.trust_score, Some(80));

    let entries = stub.rows(ACCESS_LOG_TABLE);
    assert_eq!(entries.len(), 1);
    assert_eq!(entries[0]["action_type"], json!("USER_EDITED"));
    assert_eq!(entries[0]["user_id"], json!("admin-1"));
    assert_eq!(entries[0]["user_agent"], json!("petadmin-test"));
    let details: Value =
        serde_json::from_str(entries[0]["details"].as_str().expect("details text")).expect("json");
    assert_eq!(details["userId"], json!("u1"));
    assert_eq!(details["updates"]["trust_score"], json!(80));
}

#[tokio::test]
async fn deleted_pet_disappears_from_the_next_load() {
    let stub = Arc::new(StubGateway::new().with_rows(
        "pets",
        vec![
            json!({ "id": "p1", "name": "Toby", "created_at": "2024-04-01T00:00:00Z" }),
            json!({ "id": "p2", "name": "Luna", "created_at": "2024-04-01T00:00:00Z" }),
        ],
    ));
    let dispatcher = dispatcher(&stub);
    let pets: ListController<Pet> = ListController::new(stub.clone());
    pets.load().await.expect("load");

    let removed = RowActions::<Pet>::delete(&dispatcher, "p1")
        .await
        .expect("delete");
    assert!(removed);
    pets.load().await.expect("reload");

    assert!(pets.find("p1").await.is_none());
    assert!(pets.find("p2").await.is_some());
    assert_eq!(audit_actions(&stub), vec!["PET_DELETED"]);
}

#[tokio::test]
async fn ban_marks_the_profile_banned() {
    let stub = Arc::new(single_profile());
    let dispatcher = dispatcher(&stub);

    let banned = dispatcher.ban_user("u1").await.expect("ban");
    assert!(banned.is_banned());
    assert_eq!(stub.rows("profiles")[0]["status"], json!("banned"));
    assert_eq!(audit_actions(&stub), vec!["USER_BANNED"]);
}

#[tokio::test]
async fn deleting_a_missing_row_reports_nothing_removed() {
    let stub = Arc::new(single_profile());
    let dispatcher = dispatcher(&stub);

    let removed = RowActions::<User>::delete(&dispatcher, "ghost")
        .await
        .expect("delete");
    assert!(!removed);
    assert_eq!(stub.rows("profiles").len(), 1);

    let outcome = dispatcher
        .perform(Action::Delete {
            table: "pets".into(),
            id: "ghost".into(),
        })
        .await
        .expect("delete");
    assert_eq!(outcome, ActionOutcome::Deleted { removed: false });
}

#[tokio::test]
async fn unban_restores_an_active_status() {
    let stub = Arc::new(single_profile());
    let dispatcher = dispatcher(&stub);

    dispatcher.ban_user("u1").await.expect("ban");
    let restored = dispatcher.unban_user("u1").await.expect("unban");
    assert!(!restored.is_banned());
    assert_eq!(restored.status.as_deref(), Some("active"));
    assert_eq!(audit_actions(&stub), vec!["USER_BANNED", "USER_UNBANNED"]);
}

#[tokio::test]
async fn ban_from_report_bans_and_resolves() {
    let stub = Arc::new(single_profile().with_rows(
        "moderation_reports",
        vec![report("r1", "post", Some("post-1"), None)],
    ));
    let dispatcher = dispatcher(&stub);

    let banned = dispatcher
        .ban_user_from_report("u1", "r1")
        .await
        .expect("ban from report");
    assert!(banned.is_banned());
    assert_eq!(stub.rows("moderation_reports")[0]["status"], json!("resolved"));
    assert_eq!(
        audit_actions(&stub),
        vec!["REPORT_RESOLVED", "USER_BANNED_FROM_REPORT"]
    );

    let entry = stub.rows(ACCESS_LOG_TABLE).pop().expect("entry");
    let details: Value =
        serde_json::from_str(entry["details"].as_str().expect("details")).expect("json");
    assert_eq!(details, json!({ "userId": "u1", "reportId": "r1" }));
}

#[tokio::test]
async fn ban_from_report_of_unknown_user_leaves_the_report_open() {
    let stub = Arc::new(StubGateway::new().with_rows(
        "moderation_reports",
        vec![report("r1", "post", Some("post-1"), None)],
    ));
    let dispatcher = dispatcher(&stub);

    assert!(dispatcher.ban_user_from_report("ghost", "r1").await.is_err());
    assert_eq!(stub.rows("moderation_reports")[0]["status"], json!("pending"));
    assert!(audit_actions(&stub).is_empty());
}

#[tokio::test]
async fn vet_verification_flips_each_time() {
    let stub = Arc::new(single_profile());
    let dispatcher = dispatcher(&stub);

    let verified = dispatcher
        .toggle_vet_verification("u1")
        .await
        .expect("verify");
    assert!(verified.is_verified_vet());
    assert_eq!(stub.rows("profiles")[0]["is_verified_vet"], json!(true));

    let unverified = dispatcher
        .toggle_vet_verification("u1")
        .await
        .expect("unverify");
    assert!(!unverified.is_verified_vet());
    assert!(dispatcher.toggle_vet_verification("ghost").await.is_err());
}

#[tokio::test]
async fn ban_of_unknown_user_fails() {
    let stub = Arc::new(StubGateway::new());
    let dispatcher = dispatcher(&stub);
    let err = dispatcher.ban_user("ghost").await.expect_err("no such user");
    assert!(matches!(err, DispatchError::Gateway(_)));
    assert!(audit_actions(&stub).is_empty());
}

#[tokio::test]
async fn report_decisions_record_who_resolved_them() {
    let stub = Arc::new(StubGateway::new().with_rows(
        "moderation_reports",
        vec![
            report("r1", "post", Some("post-1"), None),
            report("r2", "comment", None, Some("c-1")),
        ],
    ));
    let dispatcher = dispatcher(&stub);

    let resolved = dispatcher
        .decide_report("r1", ReportDecision::Resolve)
        .await
        .expect("resolve");
    assert_eq!(resolved.status.as_deref(), Some("resolved"));
    assert_eq!(resolved.resolved_by, Some(UserId::from("admin-1")));
    assert!(resolved.resolved_at.is_some());

    let dismissed = RowActions::<Report>::edit(&dispatcher, "r2", ReportDecision::Dismiss)
        .await
        .expect("dismiss");
    assert_eq!(dismissed.status.as_deref(), Some("dismissed"));
    assert_eq!(
        audit_actions(&stub),
        vec!["REPORT_RESOLVED", "REPORT_DISMISSED"]
    );
}

#[tokio::test]
async fn anonymous_decisions_leave_resolved_by_empty() {
    let stub = Arc::new(StubGateway::new().with_rows(
        "moderation_reports",
        vec![report("r1", "post", Some("post-1"), None)],
    ));
    let dispatcher = ActionDispatcher::new(stub.clone(), AuditLog::new(stub.clone(), None, None));

    let resolved = dispatcher
        .decide_report("r1", ReportDecision::Resolve)
        .await
        .expect("resolve");
    assert_eq!(resolved.resolved_by, None);

    let entry = &stub.rows(ACCESS_LOG_TABLE)[0];
    assert!(entry.get("user_id").is_none());
    assert!(entry.get("user_agent").is_none());
}

#[tokio::test]
async fn warning_lowers_trust_and_resolves_the_report() {
    let stub = Arc::new(
        StubGateway::new()
            .with_rows(
                "profiles",
                vec![
                    profile("u1", "maxine", Some(35)),
                    profile("u2", "alex", None),
                    profile("u3", "carla", Some(4)),
                ],
            )
            .with_rows(
                "moderation_reports",
                vec![
                    report("r1", "post", Some("post-1"), None),
                    report("r2", "post", Some("post-2"), None),
                    report("r3", "post", Some("post-3"), None),
                ],
            ),
    );
    let dispatcher = dispatcher(&stub);

    let warned = dispatcher.warn_user("u1", "r1").await.expect("warn u1");
    assert_eq!(warned.trust_score, Some(25));

    let warned = dispatcher.warn_user("u2", "r2").await.expect("warn u2");
    assert_eq!(warned.trust_score, Some(DEFAULT_TRUST_SCORE - WARNING_TRUST_PENALTY));

    let warned = dispatcher.warn_user("u3", "r3").await.expect("warn u3");
    assert_eq!(warned.trust_score, Some(0));

    let statuses: Vec<Value> = stub
        .rows("moderation_reports")
        .iter()
        .map(|row| row["status"].clone())
        .collect();
    assert_eq!(statuses, vec![json!("resolved"); 3]);
    assert_eq!(
        audit_actions(&stub)
            .iter()
            .filter(|action| action.as_str() == "USER_WARNED")
            .count(),
        3
    );
}

#[tokio::test]
async fn warning_an_unknown_user_touches_nothing() {
    let stub = Arc::new(StubGateway::new().with_rows(
        "moderation_reports",
        vec![report("r1", "post", Some("post-1"), None)],
    ));
    let dispatcher = dispatcher(&stub);

    assert!(dispatcher.warn_user("ghost", "r1").await.is_err());
    assert_eq!(stub.rows("moderation_reports")[0]["status"], json!("pending"));
    assert!(stub.calls_to("moderation_reports").is_empty());
}

#[tokio::test]
async fn deleting_reported_content_removes_the_target_row() {
    let stub = Arc::new(
        StubGateway::new()
            .with_rows("comments", vec![json!({ "id": "c-1" }), json!({ "id": "c-2" })])
            .with_rows(
                "moderation_reports",
                vec![report("r2", "comment", None, Some("c-1"))],
            ),
    );
    let dispatcher = dispatcher(&stub);
    let target: Report =
        serde_json::from_value(report("r2", "comment", None, Some("c-1"))).expect("report");

    let resolved = dispatcher
        .delete_reported_content(&target)
        .await
        .expect("delete content");
    assert_eq!(resolved.status.as_deref(), Some("resolved"));
    assert_eq!(stub.rows("comments"), vec![json!({ "id": "c-2" })]);
    assert_eq!(
        audit_actions(&stub),
        vec!["REPORT_RESOLVED", "CONTENT_DELETED_FROM_REPORT"]
    );
}

#[tokio::test]
async fn audit_failures_do_not_fail_the_action() {
    let stub = Arc::new(single_profile());
    stub.fail(ACCESS_LOG_TABLE, Operation::Insert, "audit table missing");
    let dispatcher = dispatcher(&stub);

    RowActions::<User>::delete(&dispatcher, "u1")
        .await
        .expect("delete still succeeds");
    assert!(stub.rows("profiles").is_empty());
    assert!(!dispatcher.audit().record("AUDIT_CHECK", json!({})).await);
}

#[tokio::test]
async fn view_returns_none_for_missing_rows() {
    let stub = Arc::new(single_profile());
    let dispatcher = dispatcher(&stub);

    let found = RowActions::<User>::view(&dispatcher, "u1").await.expect("view");
    assert_eq!(found.map(|u| u.id), Some(UserId::from("u1")));
    let missing = RowActions::<User>::view(&dispatcher, "nobody").await.expect("view");
    assert!(missing.is_none());

    let descriptor = stub.calls_to("profiles")[0]
        .descriptor
        .clone()
        .expect("query descriptor");
    assert_eq!(descriptor.filters.get("id").map(String::as_str), Some("u1"));
    assert_eq!(descriptor.limit, Some(1));
}
