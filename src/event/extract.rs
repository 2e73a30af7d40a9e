use once_cell::sync::Lazy;
use regex::Regex;
use serde_json::Value;

use super::GenericResources;

/// Bounded-depth recursive walk of request/response payloads.
pub const MAX_WALK_DEPTH: u32 = 10;

static ARN_KEY: Lazy<Regex> = Lazy::new(|| Regex::new(r"(?i)arn").unwrap());
static ID_KEY: Lazy<Regex> = Lazy::new(|| {
    Regex::new(
        r"(?i)^(id|identifier|resourceid|instanceid|volumeid|snapshotid|imageid|groupid|vpcid|subnetid|clusterid|dbinstanceidentifier|filesystemid|streamname|topicarn|queueurl|functionname)$",
    )
    .unwrap()
});
static NAME_KEY: Lazy<Regex> = Lazy::new(|| {
    Regex::new(
        r"(?i)^(name|bucketname|username|rolename|policyname|tablename|clustername|loadbalancername)$",
    )
    .unwrap()
});
static ARN_VALUE: Lazy<Regex> = Lazy::new(|| Regex::new(r"^arn:").unwrap());

/// Walks `value`, classifying string leaves by the key that led to them and
/// by the value's own shape, collecting ARNs/IDs/names into `out`.
///
/// `key` is the JSON key (or array-index placeholder) that produced `value`,
/// empty at the root. Recursion stops at `MAX_WALK_DEPTH` to bound adversarial
/// payloads.
pub fn walk(value: &Value, key: &str, depth: u32, out: &mut GenericResources) {
    if depth > MAX_WALK_DEPTH {
        return;
    }

    match value {
        Value::Object(map) => {
            for (k, v) in map {
                walk(v, k, depth + 1, out);
            }
        }
        Value::Array(items) => {
            for item in items {
                walk(item, key, depth + 1, out);
            }
        }
        Value::String(s) => classify_leaf(key, s, out),
        _ => {}
    }
}

fn classify_leaf(key: &str, value: &str, out: &mut GenericResources) {
    if value.is_empty() {
        return;
    }
    if ARN_VALUE.is_match(value) || ARN_KEY.is_match(key) {
        out.arns.insert(value.to_string());
    } else if ID_KEY.is_match(key) {
        out.ids.insert(value.to_string());
    } else if NAME_KEY.is_match(key) {
        out.names.insert(value.to_string());
    }
}

/// Runs the generic walk over the full event `detail` (request and response
/// combined fall out naturally since both are nested under `detail`).
pub fn generic_resources(detail: &Value) -> GenericResources {
    let mut resources = GenericResources::default();
    walk(detail, "", 0, &mut resources);
    resources
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn classifies_arn_by_value_shape() {
        let detail = json!({ "someField": "arn:aws:s3:::my-bucket" });
        let resources = generic_resources(&detail);
        assert!(resources.arns.contains("arn:aws:s3:::my-bucket"));
    }

    #[test]
    fn classifies_id_by_key_name() {
        let detail = json!({ "instanceId": "i-0123456789abcdef0" });
        let resources = generic_resources(&detail);
        assert!(resources.ids.contains("i-0123456789abcdef0"));
    }

    #[test]
    fn classifies_name_by_key_name() {
        let detail = json!({ "bucketName": "acme-logs" });
        let resources = generic_resources(&detail);
        assert!(resources.names.contains("acme-logs"));
    }

    #[test]
    fn walks_nested_arrays_and_objects() {
        let detail = json!({
            "instancesSet": { "items": [
                { "instanceId": "i-aaa" },
                { "instanceId": "i-bbb" },
            ]}
        });
        let resources = generic_resources(&detail);
        assert_eq!(resources.ids.len(), 2);
    }

    #[test]
    fn depth_beyond_limit_is_not_walked() {
        let mut value = json!("deep-id");
        for _ in 0..(MAX_WALK_DEPTH + 5) {
            value = json!({ "wrapper": value });
        }
        let mut resources = GenericResources::default();
        walk(&value, "", 0, &mut resources);
        assert!(resources.names.is_empty() && resources.ids.is_empty() && resources.arns.is_empty());
    }
}
