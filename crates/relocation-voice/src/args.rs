//! Parsed tool arguments with alias canonicalization.
//!
//! The agent is inconsistent about field names (`serviceId`, `service_id`,
//! `service`, ...). Each handler declares the [`AliasGroup`]s it reads and
//! the dispatcher rewrites the arguments so only the canonical name remains.

use serde_json::{Map, Value};

/// One canonical field and the names the agent may use for it.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AliasGroup {
    pub canonical: &'static str,
    pub aliases: &'static [&'static str],
}

pub const SERVICE_ID: AliasGroup = AliasGroup {
    canonical: "serviceId",
    aliases: &["service_id", "service", "serviceName", "name"],
};

pub const SERVICE_LIST: AliasGroup = AliasGroup {
    canonical: "services",
    aliases: &["serviceIds", "service_ids", "ids"],
};

pub const TASK_ID: AliasGroup = AliasGroup {
    canonical: "id",
    aliases: &["taskId", "task_id"],
};

pub const TASK_LIST: AliasGroup = AliasGroup {
    canonical: "ids",
    aliases: &["taskIds", "task_ids"],
};

pub const FROM_CITY: AliasGroup = AliasGroup {
    canonical: "from_city",
    aliases: &["fromCity", "origin"],
};

pub const TO_CITY: AliasGroup = AliasGroup {
    canonical: "to_city",
    aliases: &["toCity", "destination"],
};

pub const MOVE_DATE: AliasGroup = AliasGroup {
    canonical: "move_date",
    aliases: &["moveDate", "date"],
};

/// Arguments of one tool call. Always an object.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ToolArguments {
    fields: Map<String, Value>,
}

impl ToolArguments {
    /// Wrap a parsed value. Anything other than an object becomes empty.
    pub fn from_value(value: Value) -> Self {
        match value {
            Value::Object(fields) => Self { fields },
            _ => Self::default(),
        }
    }

    /// Wrap `value` and fold every alias in `groups` into its canonical
    /// field. When the canonical field is already present the aliases are
    /// dropped; otherwise the first alias present wins.
    pub fn canonicalize(value: Value, groups: &[AliasGroup]) -> Self {
        let mut args = Self::from_value(value);
        for group in groups {
            let mut found: Option<Value> = None;
            for alias in group.aliases {
                if let Some(value) = args.fields.remove(*alias) {
                    if found.is_none() && !value.is_null() {
                        found = Some(value);
                    }
                }
            }
            if let Some(value) = found {
                if !args.fields.contains_key(group.canonical) {
                    args.fields.insert(group.canonical.to_string(), value);
                }
            }
        }
        args
    }

    pub fn get(&self, key: &str) -> Option<&Value> {
        self.fields.get(key)
    }

    /// Trimmed, non-empty string field.
    pub fn str(&self, key: &str) -> Option<&str> {
        self.fields
            .get(key)
            .and_then(Value::as_str)
            .map(str::trim)
            .filter(|s| !s.is_empty())
    }

    /// A list of strings. A single string counts as a one-element list and
    /// non-string entries are skipped.
    pub fn string_list(&self, key: &str) -> Vec<String> {
        match self.fields.get(key) {
            Some(Value::Array(items)) => items
                .iter()
                .filter_map(Value::as_str)
                .map(str::trim)
                .filter(|s| !s.is_empty())
                .map(String::from)
                .collect(),
            Some(Value::String(s)) if !s.trim().is_empty() => vec![s.trim().to_string()],
            _ => Vec::new(),
        }
    }

    /// A non-negative integer, given as a number or a numeric string.
    pub fn u32(&self, key: &str) -> Option<u32> {
        match self.fields.get(key)? {
            Value::Number(n) => n
                .as_u64()
                .or_else(|| n.as_f64().filter(|f| *f >= 0.0).map(|f| f as u64))
                .and_then(|n| u32::try_from(n).ok()),
            Value::String(s) => s.trim().parse().ok(),
            _ => None,
        }
    }

    /// Array of objects, e.g. the batch entries of `update_tasks`.
    pub fn objects(&self, key: &str) -> Vec<Value> {
        match self.fields.get(key) {
            Some(Value::Array(items)) => items.iter().filter(|v| v.is_object()).cloned().collect(),
            _ => Vec::new(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }

    pub fn into_value(self) -> Value {
        Value::Object(self.fields)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_service_id_aliases() {
        for key in ["serviceId", "service_id", "service", "serviceName", "name"] {
            let mut raw = Map::new();
            raw.insert(key.to_string(), json!("visa"));
            let args = ToolArguments::canonicalize(Value::Object(raw), &[SERVICE_ID]);
            assert_eq!(args.str("serviceId"), Some("visa"), "alias {}", key);
            if key != "serviceId" {
                assert!(args.get(key).is_none());
            }
        }
    }

    #[test]
    fn test_canonical_field_wins_over_alias() {
        let args = ToolArguments::canonicalize(
            json!({"serviceId": "housing", "service": "moving"}),
            &[SERVICE_ID],
        );
        assert_eq!(args.str("serviceId"), Some("housing"));
        assert!(args.get("service").is_none());
    }

    #[test]
    fn test_service_list_accepts_single_string() {
        let args = ToolArguments::canonicalize(json!({"serviceIds": "housing"}), &[SERVICE_LIST]);
        assert_eq!(args.string_list("services"), vec!["housing"]);

        let args = ToolArguments::canonicalize(json!({"ids": ["a", 3, " b "]}), &[SERVICE_LIST]);
        assert_eq!(args.string_list("services"), vec!["a", "b"]);
    }

    #[test]
    fn test_task_aliases() {
        let args =
            ToolArguments::canonicalize(json!({"task_id": "t1", "taskIds": ["t2"]}), &[TASK_ID, TASK_LIST]);
        assert_eq!(args.str("id"), Some("t1"));
        assert_eq!(args.string_list("ids"), vec!["t2"]);
    }

    #[test]
    fn test_profile_aliases() {
        let args = ToolArguments::canonicalize(
            json!({"origin": "Paris", "toCity": "Berlin", "date": "2026-03-01"}),
            &[FROM_CITY, TO_CITY, MOVE_DATE],
        );
        assert_eq!(args.str("from_city"), Some("Paris"));
        assert_eq!(args.str("to_city"), Some("Berlin"));
        assert_eq!(args.str("move_date"), Some("2026-03-01"));
    }

    #[test]
    fn test_groups_not_requested_are_untouched() {
        let args = ToolArguments::canonicalize(json!({"name": "x"}), &[TASK_ID]);
        assert_eq!(args.str("name"), Some("x"));
        assert!(args.get("serviceId").is_none());
    }

    #[test]
    fn test_null_alias_is_skipped() {
        let args = ToolArguments::canonicalize(
            json!({"service_id": null, "service": "finances"}),
            &[SERVICE_ID],
        );
        assert_eq!(args.str("serviceId"), Some("finances"));
    }

    #[test]
    fn test_typed_accessors() {
        let args = ToolArguments::from_value(json!({
            "limit": 5,
            "max_price": "3200",
            "bad": -1,
            "blank": "  ",
            "updates": [{"id": "a"}, "skip", {"id": "b"}]
        }));
        assert_eq!(args.u32("limit"), Some(5));
        assert_eq!(args.u32("max_price"), Some(3200));
        assert_eq!(args.u32("bad"), None);
        assert_eq!(args.str("blank"), None);
        assert_eq!(args.objects("updates").len(), 2);
    }

    #[test]
    fn test_non_object_is_empty() {
        assert!(ToolArguments::from_value(json!([1, 2])).is_empty());
        assert_eq!(ToolArguments::from_value(json!(null)).into_value(), json!({}));
    }
}
