mod common;

use std::collections::BTreeMap;

use redshift_migrate::config::loader::{load_config, save_config};
use redshift_migrate::config::types::{
    IamRoleRef, NetworkConfig, ParameterGroup, ParameterSetting, SourceResourceConfig,
    ENGINE_DEFAULT_SOURCE,
};
use redshift_migrate::mapping::parameters::{classify, map_to_target_format};
use redshift_migrate::mapping::target;

use common::{task, DEFAULT_ROLE, OTHER_ROLE};

fn setting(value: &str, source: &str) -> ParameterSetting {
    ParameterSetting {
        source: Some(source.to_string()),
        ..ParameterSetting::user(value)
    }
}

fn source() -> SourceResourceConfig {
    let mut config = SourceResourceConfig::new(
        "c1",
        NetworkConfig {
            vpc_id: "vpc-1".into(),
            subnet_ids: vec!["subnet-a".into()],
            security_group_ids: vec!["sg-1".into()],
            publicly_accessible: false,
        },
    );
    config.iam_roles = vec![
        IamRoleRef { role_arn: OTHER_ROLE.into(), is_default: false },
        IamRoleRef { role_arn: DEFAULT_ROLE.into(), is_default: true },
    ];
    config.parameter_group = Some(ParameterGroup {
        name: "c1-params".into(),
        family: Some("redshift-1.0".into()),
        description: None,
        parameters: BTreeMap::from([
            ("max_query_execution_time".to_string(), setting("3600000", "user")),
            ("enable_user_activity_logging".to_string(), setting("true", "user")),
            ("some_param".to_string(), setting("x", ENGINE_DEFAULT_SOURCE)),
        ]),
        tags: BTreeMap::new(),
    });
    config.tags = BTreeMap::from([("team".to_string(), "data".to_string())]);
    config.scheduled_tasks = vec![task("vacuum", "vacuum")];
    config
}

#[test]
fn test_only_user_set_allow_listed_parameters_map() {
    let params = source().parameter_group.unwrap().parameters;
    let mapped = map_to_target_format(&params);

    let pairs: Vec<(&str, &str)> = mapped.iter().map(|p| (p.key.as_str(), p.value.as_str())).collect();
    assert_eq!(
        pairs,
        vec![("enable_user_activity_logging", "true"), ("max_query_execution_time", "3600000")]
    );

    let compat = classify(&params);
    assert_eq!(compat.incompatible, vec!["some_param"]);
    assert!(!compat.is_fully_compatible());
}

#[test]
fn test_allow_listed_engine_default_is_warned_not_mapped() {
    let params = BTreeMap::from([("search_path".to_string(), setting("$user", ENGINE_DEFAULT_SOURCE))]);
    assert!(map_to_target_format(&params).is_empty());

    let compat = classify(&params);
    assert!(compat.compatible.is_empty());
    assert!(compat.is_fully_compatible());
    assert_eq!(compat.warnings.len(), 1);
}

#[test]
fn test_derive_target_is_deterministic() {
    let config = source();
    let first = target::derive(&config, "wg1", "ns1");
    let second = target::derive(&config, "wg1", "ns1");
    assert_eq!(first, second);

    assert_eq!(first.workgroup_name, "wg1");
    assert_eq!(first.namespace_name, "ns1");
    assert_eq!(first.iam_roles, vec![DEFAULT_ROLE, OTHER_ROLE]);
    assert_eq!(first.network, config.network);
    assert_eq!(first.parameters.len(), 2);
    assert_eq!(first.tags, config.tags);
}

#[test]
fn test_saved_config_loads_back() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("out").join("c1.json");
    let config = source();

    save_config(&config, &path).unwrap();
    let loaded = load_config(&path).unwrap();
    assert_eq!(loaded, config);

    let raw: serde_json::Value = serde_json::from_str(&std::fs::read_to_string(&path).unwrap()).unwrap();
    assert_eq!(raw["identifier"], "c1");
    assert_eq!(raw["scheduled_tasks"][0]["origin"], "rule");
    assert!(raw.get("maintenance_window").is_none());
}

#[test]
fn test_load_tolerates_missing_optional_sections() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("minimal.json");
    std::fs::write(&path, r#"{"identifier":"c1","network":{"vpc_id":"vpc-1"}}"#).unwrap();

    let config = load_config(&path).unwrap();
    assert_eq!(config.identifier, "c1");
    assert!(config.iam_roles.is_empty());
    assert!(config.parameter_group.is_none());
    assert!(config.scheduled_tasks.is_empty());
}

#[test]
fn test_load_rejects_malformed_file() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("bad.json");
    std::fs::write(&path, "{not json").unwrap();
    assert!(load_config(&path).is_err());
    assert!(load_config(&dir.path().join("missing.json")).is_err());
}
