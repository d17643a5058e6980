use std::collections::BTreeMap;

use serde::Serialize;

use crate::config::types::ParameterSetting;
use crate::provider::models::ConfigParameter;

/// Parameters that carry over to a serverless workgroup unchanged.
pub const MAPPABLE_PARAMETERS: &[&str] = &[
    "enable_user_activity_logging",
    "query_group",
    "max_query_execution_time",
    "enable_case_sensitive_identifier",
    "search_path",
    "statement_timeout",
    "datestyle",
    "timezone",
    "require_ssl",
    "use_fips_ssl",
];

pub fn is_mappable(name: &str) -> bool {
    MAPPABLE_PARAMETERS.contains(&name)
}

/// Result of checking a parameter set against the allow-list.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct Compatibility {
    pub compatible: Vec<String>,
    pub incompatible: Vec<String>,
    pub warnings: Vec<String>,
}

impl Compatibility {
    pub fn is_fully_compatible(&self) -> bool {
        self.incompatible.is_empty()
    }
}

/// Sort parameters into migratable and non-migratable.
///
/// Nothing is dropped silently: unsupported names and allow-listed names left
/// at the engine default both produce a warning.
pub fn classify(parameters: &BTreeMap<String, ParameterSetting>) -> Compatibility {
    let mut result = Compatibility::default();

    for (name, setting) in parameters {
        if !is_mappable(name) {
            result.incompatible.push(name.clone());
            result.warnings.push(format!(
                "Parameter '{}' is not supported in Redshift Serverless",
                name
            ));
        } else if setting.is_engine_default() {
            result.warnings.push(format!(
                "Parameter '{}' is at its engine default and will not be migrated",
                name
            ));
        } else {
            result.compatible.push(name.clone());
        }
    }

    result
}

/// Render the migratable parameters as target key/value pairs, sorted by key.
/// Values are passed through as text.
pub fn map_to_target_format(parameters: &BTreeMap<String, ParameterSetting>) -> Vec<ConfigParameter> {
    parameters
        .iter()
        .filter(|(name, setting)| is_mappable(name) && !setting.is_engine_default())
        .map(|(name, setting)| ConfigParameter {
            key: name.clone(),
            value: setting.value.clone(),
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn engine_default(value: &str) -> ParameterSetting {
        ParameterSetting {
            source: Some("engine-default".into()),
            ..ParameterSetting::user(value)
        }
    }

    #[test]
    fn classify_warns_on_everything_not_migrated() {
        let mut params = BTreeMap::new();
        params.insert("query_group".to_string(), ParameterSetting::user("etl"));
        params.insert("wlm_json_configuration".to_string(), ParameterSetting::user("[]"));
        params.insert("timezone".to_string(), engine_default("UTC"));

        let c = classify(&params);
        assert_eq!(c.compatible, vec!["query_group"]);
        assert_eq!(c.incompatible, vec!["wlm_json_configuration"]);
        assert_eq!(c.warnings.len(), 2);
        assert!(!c.is_fully_compatible());
    }

    #[test]
    fn values_stay_textual() {
        let mut params = BTreeMap::new();
        params.insert(
            "statement_timeout".to_string(),
            ParameterSetting {
                data_type: Some("integer".into()),
                ..ParameterSetting::user("007")
            },
        );
        let mapped = map_to_target_format(&params);
        assert_eq!(mapped[0].value, "007");
    }
}
