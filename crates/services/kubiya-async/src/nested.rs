//! Payload shaping for webhook tests.
//!
//! Converts `a.b.c` keys into nested objects and derives sample payloads from
//! the `{{ .path }}` variables used in webhook prompts.

use regex::Regex;
use serde_json::{Map, Value, json};
use std::sync::LazyLock;

/// Key that keeps a scalar displaced by a nested key with the same prefix
pub const DISPLACED_VALUE_KEY: &str = "_value";

const TEST_TIMESTAMP: &str = "2024-01-01T00:00:00Z";

#[expect(clippy::expect_used, reason = "pattern is a literal")]
static TEMPLATE_VAR: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\{\{\s*\.([^{}]+?)\s*\}\}").expect("template variable regex"));

/// Stores `value` at `path` below `map`, creating objects as needed
///
/// A non-object found on the way is moved under [`DISPLACED_VALUE_KEY`].
fn insert_at(map: &mut Map<String, Value>, path: &[&str], value: Value) {
    let Some((first, rest)) = path.split_first() else {
        return;
    };
    if rest.is_empty() {
        map.insert((*first).to_string(), value);
        return;
    }

    let slot = map
        .entry((*first).to_string())
        .or_insert_with(|| Value::Object(Map::new()));
    if let Value::Object(child) = slot {
        insert_at(child, rest, value);
    } else {
        let mut child = Map::new();
        child.insert(DISPLACED_VALUE_KEY.into(), slot.take());
        insert_at(&mut child, rest, value);
        *slot = Value::Object(child);
    }
}

/// Expands dotted keys into nested objects
///
/// Keys without a dot are copied as-is. When a dotted key needs an object
/// where a scalar already sits, the scalar is kept under `_value`.
#[must_use]
pub fn dot_to_nested(flat: &Map<String, Value>) -> Map<String, Value> {
    let mut out = Map::new();
    for (key, value) in flat {
        if !key.contains('.') {
            out.insert(key.clone(), value.clone());
            continue;
        }
        let parts: Vec<&str> = key.split('.').collect();
        insert_at(&mut out, &parts, value.clone());
    }
    out
}

/// Variable paths referenced in `prompt`, in order of appearance
///
/// `{{ .event.pull_request.title }}` yields `event.pull_request.title`.
#[must_use]
pub fn template_variables(prompt: &str) -> Vec<String> {
    TEMPLATE_VAR
        .captures_iter(prompt)
        .filter_map(|c| c.get(1))
        .map(|m| m.as_str().trim().to_string())
        .collect()
}

/// Payload sent when a test has no data of its own
#[must_use]
pub fn default_test_payload(message: &str) -> Value {
    json!({
        "test": true,
        "timestamp": TEST_TIMESTAMP,
        "message": message,
    })
}

/// Builds a sample payload covering every variable in `prompt`
///
/// Each leaf becomes `sample-<leaf>` and a `_test` block is added. A bare
/// `{{ .event }}` is skipped. Prompts without variables produce the default
/// test payload.
#[must_use]
pub fn generate_test_data(prompt: &str) -> Value {
    let mut data = Map::new();
    for path in template_variables(prompt) {
        if path == "event" {
            continue;
        }
        let parts: Vec<&str> = path.split('.').collect();
        let leaf = parts.last().copied().unwrap_or_default();
        insert_at(&mut data, &parts, json!(format!("sample-{leaf}")));
    }

    if data.is_empty() {
        return default_test_payload("Auto-generated test webhook data");
    }
    data.insert(
        "_test".into(),
        json!({
            "timestamp": TEST_TIMESTAMP,
            "message": "Auto-generated test webhook data",
        }),
    );
    Value::Object(data)
}
