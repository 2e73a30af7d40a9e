use serde_json::Value;

use crate::resources::Filter as EventFilter;

/// Extension seam for the policy DSL's filter library, treated as a black
/// box beyond this trait. Only equality matching is implemented here; a
/// real engine would provide richer filter types behind this trait without
/// requiring any change upstream or to the adapter's ordering guarantees.
pub trait Filter: Send + Sync {
    fn matches(&self, resource: &Value) -> bool;
}

/// `{key: value}` equality filter, both the shape the filter/prefetch
/// builder emits and the shorthand authored policy YAML uses for simple
/// field matches.
#[derive(Debug, Clone)]
pub struct ValueFilter {
    pub key: String,
    pub value: Value,
}

impl ValueFilter {
    pub fn from_event_filter(filter: &EventFilter) -> Self {
        Self {
            key: filter.key.clone(),
            value: Value::String(filter.value.clone()),
        }
    }

    /// Parses one authored filter from policy YAML. Supports the `value`
    /// filter shorthand: `{key: <field>, value: <expected>}` or a bare
    /// single-entry map `{<field>: <expected>}`. Anything else is not a
    /// recognised filter type (the black-box DSL may support more) and is
    /// skipped rather than erroring the whole policy.
    pub fn from_authored(raw: &Value) -> Option<Self> {
        let map = raw.as_object()?;
        if let (Some(key), Some(value)) = (map.get("key"), map.get("value")) {
            return Some(Self {
                key: key.as_str()?.to_string(),
                value: value.clone(),
            });
        }
        if map.len() == 1 {
            let (key, value) = map.iter().next()?;
            return Some(Self {
                key: key.clone(),
                value: value.clone(),
            });
        }
        None
    }
}

impl Filter for ValueFilter {
    fn matches(&self, resource: &Value) -> bool {
        resource.get(&self.key) == Some(&self.value)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn event_filter_matches_on_string_equality() {
        let filter = ValueFilter::from_event_filter(&EventFilter {
            key: "InstanceId".to_string(),
            value: "i-abc".to_string(),
        });
        assert!(filter.matches(&json!({ "InstanceId": "i-abc" })));
        assert!(!filter.matches(&json!({ "InstanceId": "i-xyz" })));
    }

    #[test]
    fn authored_shorthand_map_parses_as_filter() {
        let filter = ValueFilter::from_authored(&json!({ "Encrypted": false })).unwrap();
        assert!(filter.matches(&json!({ "Encrypted": false })));
    }

    #[test]
    fn unrecognised_authored_filter_shape_is_skipped() {
        assert!(ValueFilter::from_authored(&json!({ "and": [] })).is_none());
    }
}
