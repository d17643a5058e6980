use crate::config::types::{SourceResourceConfig, TargetResourceConfig};

use super::parameters::map_to_target_format;

/// Derive the target settings for a namespace/workgroup pair from an extracted source.
///
/// Pure and deterministic: the same source and names always yield the same target.
pub fn derive(
    source: &SourceResourceConfig,
    workgroup_name: &str,
    namespace_name: &str,
) -> TargetResourceConfig {
    TargetResourceConfig {
        workgroup_name: workgroup_name.to_string(),
        namespace_name: namespace_name.to_string(),
        iam_roles: ordered_roles(source),
        network: source.network.clone(),
        parameters: source
            .parameter_group
            .as_ref()
            .map(|pg| map_to_target_format(&pg.parameters))
            .unwrap_or_default(),
        tags: source.tags.clone(),
    }
}

/// Role ARNs with the default role first, otherwise in source order.
fn ordered_roles(source: &SourceResourceConfig) -> Vec<String> {
    let defaults = source.iam_roles.iter().filter(|r| r.is_default);
    let others = source.iam_roles.iter().filter(|r| !r.is_default);
    defaults.chain(others).map(|r| r.role_arn.clone()).collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::types::{IamRoleRef, NetworkConfig};

    #[test]
    fn default_role_is_first() {
        let mut source = SourceResourceConfig::new("c1", NetworkConfig::default());
        source.iam_roles = vec![
            IamRoleRef { role_arn: "r2".into(), is_default: false },
            IamRoleRef { role_arn: "r1".into(), is_default: true },
            IamRoleRef { role_arn: "r3".into(), is_default: false },
        ];
        let target = derive(&source, "wg", "ns");
        assert_eq!(target.iam_roles, vec!["r1", "r2", "r3"]);
        assert_eq!(target.default_role(), Some("r1"));
        assert!(target.parameters.is_empty());
    }
}
