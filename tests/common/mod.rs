#![allow(dead_code)]

use std::collections::BTreeMap;
use std::sync::Arc;

use chrono::{TimeZone, Utc};

use redshift_migrate::config::settings::Settings;
use redshift_migrate::config::types::{ENGINE_DEFAULT_SOURCE, ScheduledTaskDefinition, TaskOrigin};
use redshift_migrate::executor::clock::{Clock, ManualClock};
use redshift_migrate::executor::MigrationEngine;
use redshift_migrate::provider::memory::InMemoryControlPlane;
use redshift_migrate::provider::models::{
    ClusterDescription, ClusterParameter, InvocationTarget, ParameterGroupDescription, RuleSummary,
};

pub const CLUSTER: &str = "c1";
pub const DEFAULT_ROLE: &str = "arn:aws:iam::123456789012:role/loader";
pub const OTHER_ROLE: &str = "arn:aws:iam::123456789012:role/spectrum";

pub fn origin() -> chrono::DateTime<Utc> {
    Utc.with_ymd_and_hms(2024, 3, 1, 12, 0, 0).unwrap()
}

pub fn clock() -> Arc<ManualClock> {
    Arc::new(ManualClock::new(origin()))
}

pub fn cluster() -> ClusterDescription {
    ClusterDescription {
        identifier: CLUSTER.to_string(),
        vpc_id: "vpc-1".to_string(),
        subnet_group_name: Some("c1-subnets".to_string()),
        security_group_ids: vec!["sg-1".to_string()],
        publicly_accessible: false,
        iam_role_arns: vec![OTHER_ROLE.to_string(), DEFAULT_ROLE.to_string()],
        default_iam_role_arn: Some(DEFAULT_ROLE.to_string()),
        parameter_group_name: Some("c1-params".to_string()),
        maintenance_window: Some("sun:05:00-sun:05:30".to_string()),
        maintenance_track: Some("current".to_string()),
        snapshot_copy: None,
        tags: BTreeMap::from([("env".to_string(), "prod".to_string())]),
    }
}

fn parameter(name: &str, value: &str, source: &str) -> ClusterParameter {
    ClusterParameter {
        name: name.to_string(),
        value: Some(value.to_string()),
        data_type: Some("string".to_string()),
        source: Some(source.to_string()),
        is_modifiable: true,
        description: None,
    }
}

pub fn parameters() -> Vec<ClusterParameter> {
    vec![
        parameter("enable_user_activity_logging", "true", "user"),
        parameter("max_query_execution_time", "3600000", "user"),
        parameter("some_param", "x", ENGINE_DEFAULT_SOURCE),
        parameter("wlm_json_configuration", "[]", "user"),
    ]
}

pub fn data_api_target(sql: &str) -> InvocationTarget {
    InvocationTarget {
        arn: "arn:aws:redshift-data:us-east-1:123456789012:cluster:c1".to_string(),
        input: Some(format!(
            r#"{{"ClusterIdentifier":"{}","Database":"dev","Sql":"{}"}}"#,
            CLUSTER, sql
        )),
    }
}

/// A cluster with network, roles, a parameter group, tags and one scheduled rule.
pub fn plane() -> InMemoryControlPlane {
    InMemoryControlPlane::new()
        .with_cluster(cluster())
        .with_subnet_group("c1-subnets", &["subnet-a", "subnet-b"])
        .with_parameter_group(
            ParameterGroupDescription {
                name: "c1-params".to_string(),
                family: Some("redshift-1.0".to_string()),
                ..Default::default()
            },
            parameters(),
        )
        .with_rule(
            RuleSummary {
                name: "nightly-vacuum".to_string(),
                schedule_expression: Some("cron(0 3 * * ? *)".to_string()),
                enabled: true,
            },
            vec![data_api_target("vacuum")],
        )
}

pub fn engine(plane: Arc<InMemoryControlPlane>, clock: Arc<ManualClock>) -> MigrationEngine<InMemoryControlPlane> {
    let clock: Arc<dyn Clock> = clock;
    MigrationEngine::new(plane, Settings::default()).with_clock(clock)
}

pub fn task(name: &str, sql: &str) -> ScheduledTaskDefinition {
    ScheduledTaskDefinition {
        name: name.to_string(),
        schedule_expression: "rate(1 day)".to_string(),
        sql: sql.to_string(),
        database: "dev".to_string(),
        enabled: true,
        origin: TaskOrigin::Rule,
    }
}

/// Recursively reduce a JSON value to its key structure.
pub fn shape(value: &serde_json::Value) -> serde_json::Value {
    use serde_json::Value;
    match value {
        Value::Object(map) => Value::Object(map.iter().map(|(k, v)| (k.clone(), shape(v))).collect()),
        Value::Array(items) => Value::Array(items.iter().take(1).map(shape).collect()),
        _ => Value::Null,
    }
}
