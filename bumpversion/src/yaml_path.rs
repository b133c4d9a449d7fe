//! Dot-path YAML field updates.
//!
//! The original shells out to `yqlib`'s full yq expression evaluator
//! (`(path.to.key)="value"`). This crate supports the common subset that
//! covers every real-world bump target: a dotted key path addressing a
//! scalar or map entry, e.g. `image.tag` or `spec.replicas`. Missing
//! intermediate maps are created; a path that resolves through a
//! non-map value is an error rather than silently overwriting structure.

use crate::errors::{BumpError, BumpResult};

fn split_address(address: &str) -> Vec<&str> {
    address.trim_start_matches('.').split('.').collect()
}

/// Parses `content` as YAML, sets `address` (dot-separated) to `value`
/// (itself parsed as a YAML scalar, so `true`/`42`/quoted strings behave
/// the way a human editing the file by hand would expect), and
/// re-serializes.
pub fn set_address(content: &str, address: &str, value: &str) -> BumpResult<String> {
    let mut root: serde_yaml::Value = if content.trim().is_empty() {
        serde_yaml::Value::Mapping(serde_yaml::Mapping::new())
    } else {
        serde_yaml::from_str(content)?
    };

    let segments = split_address(address);
    let new_value: serde_yaml::Value = serde_yaml::from_str(value).unwrap_or(serde_yaml::Value::String(value.to_string()));

    set_recursive(&mut root, &segments, new_value, address)?;

    Ok(serde_yaml::to_string(&root)?)
}

fn set_recursive(
    node: &mut serde_yaml::Value,
    segments: &[&str],
    new_value: serde_yaml::Value,
    full_address: &str,
) -> BumpResult<()> {
    let (head, rest) = segments
        .split_first()
        .expect("address always has at least one segment");

    if !node.is_mapping() {
        if node.is_null() {
            *node = serde_yaml::Value::Mapping(serde_yaml::Mapping::new());
        } else {
            return Err(BumpError::YamlAddressNotFound(full_address.to_string()));
        }
    }
    let mapping = node.as_mapping_mut().expect("just ensured this is a mapping");
    let key = serde_yaml::Value::String((*head).to_string());

    if rest.is_empty() {
        mapping.insert(key, new_value);
        return Ok(());
    }

    if mapping.get(&key).is_none() {
        mapping.insert(key.clone(), serde_yaml::Value::Mapping(serde_yaml::Mapping::new()));
    }
    let child = mapping.get_mut(&key).expect("just inserted or already present");
    set_recursive(child, rest, new_value, full_address)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sets_a_nested_scalar() {
        let yaml = "image:\n  tag: v1.0.0\n  repository: acme/app\n";
        let out = set_address(yaml, "image.tag", "v1.1.0").unwrap();
        let parsed: serde_yaml::Value = serde_yaml::from_str(&out).unwrap();
        assert_eq!(
            parsed["image"]["tag"].as_str(),
            Some("v1.1.0")
        );
        assert_eq!(parsed["image"]["repository"].as_str(), Some("acme/app"));
    }

    #[test]
    fn creates_missing_intermediate_maps() {
        let out = set_address("{}\n", "spec.replicas", "3").unwrap();
        let parsed: serde_yaml::Value = serde_yaml::from_str(&out).unwrap();
        assert_eq!(parsed["spec"]["replicas"].as_i64(), Some(3));
    }

    #[test]
    fn leading_dot_address_is_accepted() {
        let out = set_address("{}\n", ".tag", "v2").unwrap();
        let parsed: serde_yaml::Value = serde_yaml::from_str(&out).unwrap();
        assert_eq!(parsed["tag"].as_str(), Some("v2"));
    }
}
