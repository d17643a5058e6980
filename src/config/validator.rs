use std::sync::OnceLock;

use regex::Regex;

use super::types::ApplyOptions;
use crate::error::{MigrationError, Result};

pub const MIN_CAPACITY: i32 = 8;
pub const MAX_CAPACITY: i32 = 1024;

fn name_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| Regex::new(r"^[a-z0-9-]{1,64}$").unwrap())
}

/// Validate workflow inputs before any remote call is made.
///
/// Shared by `extract`, `apply` and `migrate`; callers pass `None` for
/// options when the workflow has none (extract).
pub fn validate_options(source_id: &str, options: Option<&ApplyOptions>) -> Result<()> {
    if source_id.trim().is_empty() {
        return Err(MigrationError::Validation(
            "source identifier must not be empty".to_string(),
        ));
    }

    let Some(opts) = options else {
        return Ok(());
    };

    validate_snapshot_options(opts)?;

    let workgroup = opts.resolved_workgroup(source_id);
    let namespace = opts.resolved_namespace(source_id);
    validate_name("workgroup", &workgroup)?;
    validate_name("namespace", &namespace)?;

    if let Some(capacity) = opts.max_capacity {
        validate_capacity(capacity)?;
    }

    if let Some(user) = &opts.admin_username {
        if user.trim().is_empty() {
            return Err(MigrationError::Validation(
                "admin username must not be empty".to_string(),
            ));
        }
    }

    Ok(())
}

/// Snapshot creation, a named snapshot and the latest snapshot are mutually exclusive,
/// and all of them only make sense when the target is being created.
fn validate_snapshot_options(opts: &ApplyOptions) -> Result<()> {
    let named = opts
        .snapshot_name
        .as_deref()
        .map(|n| !n.trim().is_empty())
        .unwrap_or(false);

    if opts.snapshot_name.is_some() && !named {
        return Err(MigrationError::Validation(
            "snapshot name must not be empty".to_string(),
        ));
    }

    let selected = [opts.create_snapshot, named, opts.use_latest_snapshot]
        .iter()
        .filter(|set| **set)
        .count();

    if selected > 1 {
        return Err(MigrationError::Validation(
            "create_snapshot, snapshot_name and use_latest_snapshot are mutually exclusive"
                .to_string(),
        ));
    }

    if selected == 1 && !opts.create_if_missing {
        return Err(MigrationError::Validation(
            "snapshot options require create_if_missing".to_string(),
        ));
    }

    Ok(())
}

/// Serverless names: 1-64 characters of lowercase letters, digits and hyphens.
pub fn validate_name(what: &str, name: &str) -> Result<()> {
    if name_pattern().is_match(name) {
        Ok(())
    } else {
        Err(MigrationError::Validation(format!(
            "{} name '{}' must be 1-64 characters of lowercase letters, digits or hyphens",
            what, name
        )))
    }
}

pub fn validate_capacity(capacity: i32) -> Result<()> {
    if !(MIN_CAPACITY..=MAX_CAPACITY).contains(&capacity) || capacity % 8 != 0 {
        return Err(MigrationError::Validation(format!(
            "max capacity {} must be a multiple of 8 between {} and {}",
            capacity, MIN_CAPACITY, MAX_CAPACITY
        )));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn opts() -> ApplyOptions {
        ApplyOptions {
            create_if_missing: true,
            ..Default::default()
        }
    }

    #[test]
    fn rejects_both_snapshot_options() {
        let o = ApplyOptions {
            create_snapshot: true,
            snapshot_name: Some("snap-1".into()),
            ..opts()
        };
        let err = validate_options("c1-cluster", Some(&o)).unwrap_err();
        assert!(err.to_string().contains("mutually exclusive"));
    }

    #[test]
    fn rejects_latest_with_create() {
        let o = ApplyOptions {
            create_snapshot: true,
            use_latest_snapshot: true,
            ..opts()
        };
        assert!(validate_options("c1-cluster", Some(&o)).is_err());
    }

    #[test]
    fn snapshot_options_need_create_if_missing() {
        let o = ApplyOptions {
            create_snapshot: true,
            ..Default::default()
        };
        let err = validate_options("c1-cluster", Some(&o)).unwrap_err();
        assert!(err.to_string().contains("create_if_missing"));
    }

    #[test]
    fn empty_identifiers_are_rejected() {
        assert!(validate_options("", None).is_err());
        assert!(validate_options("   ", None).is_err());

        let o = ApplyOptions {
            snapshot_name: Some(String::new()),
            ..opts()
        };
        assert!(validate_options("c1-cluster", Some(&o)).is_err());
    }

    #[test]
    fn short_cluster_names_resolve_to_valid_targets() {
        let o = ApplyOptions {
            create_snapshot: true,
            ..opts()
        };
        assert!(validate_options("c1", Some(&o)).is_ok());

        let named = ApplyOptions {
            workgroup_name: Some("c1".into()),
            namespace_name: Some("c1".into()),
            ..opts()
        };
        assert!(validate_options("c1", Some(&named)).is_ok());
    }

    #[test]
    fn naming_rules() {
        assert!(validate_name("workgroup", "wg-01").is_ok());
        assert!(validate_name("workgroup", "c1").is_ok());
        assert!(validate_name("workgroup", "").is_err());
        assert!(validate_name("workgroup", "Upper").is_err());
        assert!(validate_name("workgroup", "under_score").is_err());
        assert!(validate_name("workgroup", &"a".repeat(65)).is_err());
    }

    #[test]
    fn capacity_bounds() {
        assert!(validate_capacity(8).is_ok());
        assert!(validate_capacity(512).is_ok());
        assert!(validate_capacity(1024).is_ok());
        assert!(validate_capacity(0).is_err());
        assert!(validate_capacity(12).is_err());
        assert!(validate_capacity(1032).is_err());
    }

    #[test]
    fn plain_apply_is_valid() {
        assert!(validate_options("c1-cluster", Some(&ApplyOptions::default())).is_ok());
        assert!(validate_options("c1-cluster", None).is_ok());
    }
}
