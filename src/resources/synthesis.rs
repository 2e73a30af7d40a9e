use serde_json::{Map, Value};

/// camelCase -> PascalCase, recursively over object keys, used to turn a
/// CloudTrail `responseElements` payload into SDK-shaped field names.
pub fn camel_to_pascal_keys(value: &Value) -> Value {
    match value {
        Value::Object(map) => {
            let mut out = Map::new();
            for (key, v) in map {
                out.insert(pascalize(key), camel_to_pascal_keys(v));
            }
            Value::Object(out)
        }
        Value::Array(items) => Value::Array(items.iter().map(camel_to_pascal_keys).collect()),
        other => other.clone(),
    }
}

fn pascalize(key: &str) -> String {
    let mut chars = key.chars();
    match chars.next() {
        Some(first) => first.to_uppercase().collect::<String>() + chars.as_str(),
        None => String::new(),
    }
}

/// Well-known defaults for descriptors synthesized from `responseElements`
/// when the live resource is not yet queryable. Only fields the cloud SDK
/// would otherwise populate on a fully-provisioned resource are defaulted;
/// everything present in the event is preserved untouched.
pub fn apply_well_known_defaults(resource_type: &str, mut descriptor: Value) -> Value {
    let Value::Object(map) = &mut descriptor else {
        return descriptor;
    };
    match resource_type {
        "aws.cache-cluster" => {
            map.entry("CacheClusterStatus")
                .or_insert_with(|| Value::String("creating".to_string()));
        }
        "aws.distribution" => {
            map.entry("Status")
                .or_insert_with(|| Value::String("InProgress".to_string()));
        }
        _ => {}
    }
    descriptor
}

/// Name-only stub for object storage buckets: downstream filters are
/// expected to describe further on demand.
pub fn bucket_stub(name: &str, creator: Option<&str>) -> Value {
    let mut map = Map::new();
    map.insert("Name".to_string(), Value::String(name.to_string()));
    map.insert(
        "c7n:MatchedFilters".to_string(),
        Value::Array(vec![Value::String("event-filter".to_string())]),
    );
    if let Some(creator) = creator {
        map.insert("c7n:CreatorName".to_string(), Value::String(creator.to_string()));
    }
    Value::Object(map)
}
