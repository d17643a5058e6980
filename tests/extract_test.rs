mod common;

use std::sync::Arc;

use redshift_migrate::config::types::{SnapshotSchedule, TaskOrigin, UsageLimit};
use redshift_migrate::error::ErrorKind;
use redshift_migrate::provider::models::{InvocationTarget, RuleSummary, ScheduleDescription};
use redshift_migrate::provider::CloudError;

use common::{clock, data_api_target, engine, CLUSTER, DEFAULT_ROLE};

#[tokio::test]
async fn test_extracts_full_cluster() {
    let plane = Arc::new(
        common::plane()
            .with_usage_limits(
                CLUSTER,
                vec![UsageLimit {
                    limit_id: "limit-1".to_string(),
                    feature_type: "concurrency-scaling".to_string(),
                    limit_type: "time".to_string(),
                    amount: 60,
                    period: "daily".to_string(),
                    breach_action: "log".to_string(),
                    tags: Default::default(),
                }],
            )
            .with_snapshot_schedules(
                CLUSTER,
                vec![SnapshotSchedule {
                    schedule_identifier: "every-12h".to_string(),
                    schedule_definitions: vec!["rate(12 hours)".to_string()],
                    tags: Default::default(),
                }],
            ),
    );
    let extraction = engine(plane, clock()).extract_with_warnings(CLUSTER).await.unwrap();
    assert!(extraction.warnings.is_empty());

    let config = extraction.config;
    assert_eq!(config.identifier, CLUSTER);
    assert_eq!(config.network.subnet_ids, vec!["subnet-a", "subnet-b"]);
    assert_eq!(config.network.security_group_ids, vec!["sg-1"]);
    assert_eq!(config.default_role(), Some(DEFAULT_ROLE));
    assert_eq!(config.iam_roles.len(), 2);
    assert_eq!(config.tags.get("env").map(String::as_str), Some("prod"));
    assert_eq!(config.maintenance_window.as_deref(), Some("sun:05:00-sun:05:30"));
    assert_eq!(config.maintenance_track.as_deref(), Some("current"));
    assert_eq!(config.usage_limits.len(), 1);
    assert_eq!(config.snapshot_schedules[0].schedule_identifier, "every-12h");

    let group = config.parameter_group.unwrap();
    assert_eq!(group.name, "c1-params");
    assert_eq!(group.family.as_deref(), Some("redshift-1.0"));
    assert!(!group.parameters.contains_key("some_param"));
    assert_eq!(group.parameters.len(), 3);

    assert_eq!(config.scheduled_tasks.len(), 1);
    let task = &config.scheduled_tasks[0];
    assert_eq!(task.name, "nightly-vacuum");
    assert_eq!(task.sql, "vacuum");
    assert_eq!(task.database, "dev");
    assert_eq!(task.schedule_expression, "cron(0 3 * * ? *)");
}

#[tokio::test]
async fn test_missing_cluster_is_fatal() {
    let plane = Arc::new(common::plane());
    let err = engine(plane.clone(), clock()).extract("c2").await.unwrap_err();
    assert_eq!(err.kind(), ErrorKind::NotFound);
    assert_eq!(plane.call_count("describe_subnet_group"), 0);
}

#[tokio::test]
async fn test_unreadable_subnet_group_degrades() {
    let plane = Arc::new(common::plane());
    plane.fail_next("describe_subnet_group", CloudError::AccessDenied("ec2".into()));

    let extraction = engine(plane, clock()).extract_with_warnings(CLUSTER).await.unwrap();
    assert_eq!(extraction.warnings.len(), 1);
    assert_eq!(extraction.warnings[0].component, "network");

    let network = &extraction.config.network;
    assert!(network.subnet_ids.is_empty());
    assert_eq!(network.vpc_id, "vpc-1");
    assert_eq!(network.security_group_ids, vec!["sg-1"]);
    assert!(extraction.config.parameter_group.is_some());
}

#[tokio::test]
async fn test_unreadable_parameter_group_degrades() {
    let plane = Arc::new(common::plane());
    plane.fail_next("describe_parameters", CloudError::Transport("reset".into()));

    let extraction = engine(plane, clock()).extract_with_warnings(CLUSTER).await.unwrap();
    assert_eq!(extraction.warnings.len(), 1);
    assert_eq!(extraction.warnings[0].component, "parameter_group");
    assert!(extraction.config.parameter_group.is_none());
    assert_eq!(extraction.config.scheduled_tasks.len(), 1);
}

#[tokio::test]
async fn test_throttled_reads_are_retried() {
    let plane = Arc::new(common::plane());
    plane.fail_next("describe_cluster", CloudError::Throttled("slow down".into()));

    let extraction = engine(plane.clone(), clock()).extract_with_warnings(CLUSTER).await.unwrap();
    assert!(extraction.warnings.is_empty());
    assert_eq!(plane.call_count("describe_cluster"), 2);
}

#[tokio::test]
async fn test_tasks_from_both_backends_are_merged() {
    let plane = Arc::new(
        common::plane()
            .with_rule(
                RuleSummary {
                    name: "other-cluster".to_string(),
                    schedule_expression: Some("rate(1 hour)".to_string()),
                    enabled: true,
                },
                vec![InvocationTarget {
                    arn: "arn:aws:redshift-data:us-east-1:123456789012:cluster:c9".to_string(),
                    input: Some(r#"{"ClusterIdentifier":"c9","Database":"dev","Sql":"select 1"}"#.to_string()),
                }],
            )
            .with_rule(
                RuleSummary {
                    name: "lambda-job".to_string(),
                    schedule_expression: Some("rate(1 hour)".to_string()),
                    enabled: true,
                },
                vec![InvocationTarget {
                    arn: "arn:aws:lambda:us-east-1:123456789012:function:job".to_string(),
                    input: None,
                }],
            )
            .with_schedule(ScheduleDescription {
                name: "nightly-vacuum".to_string(),
                group: "default".to_string(),
                schedule_expression: "cron(0 4 * * ? *)".to_string(),
                enabled: true,
                target: Some(data_api_target("vacuum full")),
            })
            .with_schedule(ScheduleDescription {
                name: "hourly-stats".to_string(),
                group: "default".to_string(),
                schedule_expression: "rate(1 hour)".to_string(),
                enabled: false,
                target: Some(data_api_target("analyze")),
            }),
    );

    let config = engine(plane, clock()).extract(CLUSTER).await.unwrap();
    let names: Vec<&str> = config.scheduled_tasks.iter().map(|t| t.name.as_str()).collect();
    assert_eq!(names, vec!["nightly-vacuum", "hourly-stats"]);

    let vacuum = &config.scheduled_tasks[0];
    assert_eq!(vacuum.origin, TaskOrigin::Rule);
    assert_eq!(vacuum.sql, "vacuum");

    let stats = &config.scheduled_tasks[1];
    assert_eq!(stats.origin, TaskOrigin::Scheduler);
    assert!(!stats.enabled);
}

#[tokio::test]
async fn test_unlistable_rules_keep_scheduler_tasks() {
    let plane = Arc::new(common::plane().with_schedule(ScheduleDescription {
        name: "hourly-stats".to_string(),
        group: "default".to_string(),
        schedule_expression: "rate(1 hour)".to_string(),
        enabled: true,
        target: Some(data_api_target("analyze")),
    }));
    plane.fail_next("list_rules", CloudError::AccessDenied("events".into()));

    let extraction = engine(plane, clock()).extract_with_warnings(CLUSTER).await.unwrap();
    assert_eq!(extraction.warnings.len(), 1);
    assert_eq!(extraction.warnings[0].component, "scheduled_tasks");
    assert_eq!(extraction.config.scheduled_tasks.len(), 1);
    assert_eq!(extraction.config.scheduled_tasks[0].name, "hourly-stats");
}
