use schemars::schema::{RootSchema, Schema};
use schemars::schema_for;
use serde_json::json;

use crate::LookoutConfig;

/// JSON schema for `lookout.toml`, for editor tooling and CI checks.
#[must_use]
pub fn json_schema() -> RootSchema {
    let mut schema = schema_for!(LookoutConfig);
    apply_semantic_constraints(&mut schema);
    schema
}

fn apply_semantic_constraints(schema: &mut RootSchema) {
    // Defaults are not applied during schema validation, so this only fires
    // when `eval_enabled = true` is written out explicitly.
    push_all_of(
        schema,
        json!({
            "if": {
                "required": ["eval_enabled"],
                "properties": { "eval_enabled": { "const": true } }
            },
            "then": {
                "required": ["password"],
                "properties": {
                    "password": { "type": "string", "minLength": 1 }
                }
            }
        }),
    );

    push_all_of(
        schema,
        json!({
            "properties": {
                "password": { "type": "string", "minLength": 1 }
            }
        }),
    );
}

fn push_all_of(root: &mut RootSchema, value: serde_json::Value) {
    let Ok(schema) = serde_json::from_value::<Schema>(value) else {
        return;
    };
    let subschemas = root.schema.subschemas();
    subschemas.all_of.get_or_insert_with(Vec::new).push(schema);
}
