mod common;

use std::sync::Arc;

use redshift_migrate::apply::ScheduledTaskMigrator;
use redshift_migrate::config::settings::Settings;
use redshift_migrate::executor::clock::Clock;
use redshift_migrate::provider::memory::InMemoryControlPlane;
use redshift_migrate::provider::models::{DataApiInput, ScheduleDescription, DATA_API_TARGET_ARN};
use redshift_migrate::provider::CloudError;

use common::{clock, task};

const ROLE: &str = "RedshiftServerlessSchedulerRole";

fn migrator(plane: Arc<InMemoryControlPlane>) -> ScheduledTaskMigrator {
    let clock: Arc<dyn Clock> = clock();
    ScheduledTaskMigrator::new(plane.clone(), plane, Settings::default(), clock)
}

fn input_of(plane: &InMemoryControlPlane, schedule: &str) -> DataApiInput {
    let target = plane.schedule(schedule).unwrap().target.unwrap();
    assert_eq!(target.arn, DATA_API_TARGET_ARN);
    serde_json::from_str(&target.input.unwrap()).unwrap()
}

#[tokio::test]
async fn test_creates_schedule_per_task() {
    let plane = Arc::new(InMemoryControlPlane::new().with_region("eu-west-1").with_role(ROLE));
    let tasks = vec![task("vacuum", "vacuum"), task("analyze", "analyze")];

    let report = migrator(plane.clone()).migrate(&tasks, "wg1", "dev", None).await;
    assert_eq!(report.created.len(), 2);
    assert!(report.updated.is_empty() && report.failed.is_empty() && report.skipped.is_empty());
    assert_eq!(report.created[0].action.as_deref(), Some("created"));
    let arn = report.created[0].schedule_arn.as_deref().unwrap();
    assert!(arn.starts_with("arn:aws:scheduler:eu-west-1:"));

    let input = input_of(&plane, "wg1-vacuum");
    assert_eq!(input.workgroup_name.as_deref(), Some("wg1"));
    assert_eq!(input.cluster_identifier, None);
    assert_eq!(input.sql, "vacuum");

    // existing role is reused as is
    assert_eq!(plane.call_count("get_role"), 1);
    assert_eq!(plane.call_count("create_role"), 0);
}

#[tokio::test]
async fn test_existing_schedule_is_updated() {
    let plane = Arc::new(
        InMemoryControlPlane::new()
            .with_role(ROLE)
            .with_schedule(ScheduleDescription {
                name: "wg1-vacuum".to_string(),
                group: "default".to_string(),
                schedule_expression: "rate(7 days)".to_string(),
                enabled: false,
                target: None,
            }),
    );

    let report = migrator(plane.clone())
        .migrate(&[task("vacuum", "vacuum full")], "wg1", "dev", None)
        .await;
    assert!(report.created.is_empty());
    assert_eq!(report.updated.len(), 1);
    assert_eq!(report.updated[0].action.as_deref(), Some("updated"));
    assert_eq!(plane.call_count("create_schedule"), 1);
    assert_eq!(plane.call_count("update_schedule"), 1);

    let schedule = plane.schedule("wg1-vacuum").unwrap();
    assert_eq!(schedule.schedule_expression, "rate(1 day)");
    assert!(schedule.enabled);
    assert_eq!(input_of(&plane, "wg1-vacuum").sql, "vacuum full");
}

#[tokio::test]
async fn test_missing_role_is_created_with_policy() {
    let plane = Arc::new(InMemoryControlPlane::new());

    let report = migrator(plane.clone()).migrate(&[task("t", "select 1")], "wg1", "dev", None).await;
    assert_eq!(report.created.len(), 1);
    assert_eq!(plane.call_count("create_role"), 1);

    let policy: serde_json::Value =
        serde_json::from_str(&plane.role_policy(ROLE, "RedshiftDataAPIAccess").unwrap()).unwrap();
    let actions = policy["Statement"][0]["Action"].as_array().unwrap();
    assert!(actions.iter().any(|a| a == "redshift-data:ExecuteStatement"));
}

#[tokio::test]
async fn test_role_is_resolved_once_for_many_tasks() {
    let plane = Arc::new(InMemoryControlPlane::new());
    let tasks: Vec<_> = (0..4).map(|i| task(&format!("t{}", i), "select 1")).collect();

    let report = migrator(plane.clone()).migrate(&tasks, "wg1", "dev", None).await;
    assert_eq!(report.created.len(), 4);
    assert_eq!(plane.call_count("get_role"), 1);
    assert_eq!(plane.call_count("create_role"), 1);
}

#[tokio::test]
async fn test_explicit_role_skips_lookup() {
    let plane = Arc::new(InMemoryControlPlane::new());
    let report = migrator(plane.clone())
        .migrate(&[task("t", "select 1")], "wg1", "dev", Some("arn:aws:iam::1:role/custom"))
        .await;
    assert_eq!(report.created.len(), 1);
    assert_eq!(plane.call_count("get_role"), 0);
}

#[tokio::test]
async fn test_role_failure_fails_every_task() {
    let plane = Arc::new(InMemoryControlPlane::new());
    plane.fail_next("get_role", CloudError::AccessDenied("iam:GetRole".into()));

    let tasks = vec![task("a", "select 1"), task("b", "select 2")];
    let report = migrator(plane.clone()).migrate(&tasks, "wg1", "dev", None).await;
    assert_eq!(report.failed.len(), 2);
    for entry in &report.failed {
        assert!(entry.error.as_deref().unwrap().starts_with("execution role unavailable"));
    }
    assert_eq!(plane.call_count("create_schedule"), 0);
}

#[tokio::test]
async fn test_invalid_tasks_are_skipped() {
    let plane = Arc::new(InMemoryControlPlane::new().with_role(ROLE));
    let mut unscheduled = task("b", "select 1");
    unscheduled.schedule_expression = String::new();
    let tasks = vec![task("a", "  "), unscheduled, task("c", "select 3")];

    let report = migrator(plane.clone()).migrate(&tasks, "wg1", "dev", None).await;
    assert_eq!(report.skipped.len(), 2);
    assert_eq!(report.created.len(), 1);
    assert_eq!(report.total(), 3);
    assert_eq!(report.skipped[0].reason.as_deref(), Some("task has no SQL text"));
    assert_eq!(plane.call_count("create_schedule"), 1);
}

#[tokio::test]
async fn test_catalog_fills_missing_database() {
    let plane = Arc::new(InMemoryControlPlane::new().with_role(ROLE));
    let mut no_db = task("t", "select 1");
    no_db.database = String::new();

    migrator(plane.clone()).migrate(&[no_db, task("u", "select 2")], "wg1", "analytics", None).await;
    assert_eq!(input_of(&plane, "wg1-t").database, "analytics");
    assert_eq!(input_of(&plane, "wg1-u").database, "dev");
}

#[tokio::test]
async fn test_failed_schedule_does_not_stop_the_rest() {
    let plane = Arc::new(InMemoryControlPlane::new().with_role(ROLE));
    plane.fail_next(
        "create_schedule",
        CloudError::Service {
            code: "ValidationException".into(),
            message: "bad expression".into(),
        },
    );

    let tasks = vec![task("a", "select 1"), task("b", "select 2")];
    let report = migrator(plane.clone()).migrate(&tasks, "wg1", "dev", None).await;
    assert_eq!(report.failed.len(), 1);
    assert_eq!(report.failed[0].name, "a");
    assert_eq!(report.created.len(), 1);
    assert!(plane.schedule("wg1-b").is_some());
}

#[tokio::test]
async fn test_dry_run_makes_no_calls() {
    let plane = Arc::new(InMemoryControlPlane::new());
    let tasks = vec![task("a", "select 1"), task("b", "")];

    let report = migrator(plane.clone())
        .with_dry_run(true)
        .migrate(&tasks, "wg1", "dev", None)
        .await;
    assert_eq!(plane.total_calls(), 0);
    assert_eq!(report.created.len(), 1);
    assert_eq!(report.created[0].target_name, "wg1-a");
    assert_eq!(report.skipped.len(), 1);
}
