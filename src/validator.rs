//! JSON Schema export of loaded models, and payload validation through it.

use std::collections::BTreeSet;

use serde_json::{json, Map, Value};

use crate::error::{RegistryError, SchemaError, ValidateError};
use crate::registry::TypeRegistry;
use crate::types::{ModelSchema, TypeDescriptor, ValueType, NUMBER_TYPE, STRING_TYPE};

const DRAFT_2020_12: &str = "https://json-schema.org/draft/2020-12/schema";

/// Produce a JSON Schema describing payloads for the model `type_name`.
///
/// Every model reachable from the root is emitted under `$defs` and linked
/// with `$ref`. Mixed collections can hold any registered model, so their
/// items become a `oneOf` over all schemas, each pinned by a `const` on the
/// discriminator key.
///
/// # Errors
///
/// Returns `RegistryError` if `type_name` is not a loaded model or a
/// property refers to an unregistered type.
pub fn to_json_schema(registry: &TypeRegistry, type_name: &str) -> Result<Value, RegistryError> {
    let root = registry.schema(type_name)?;

    let mut defs = Map::new();
    for name in reachable_models(registry, root)? {
        let schema = registry.schema(&name)?;
        defs.insert(name, model_schema(registry, schema)?);
    }

    Ok(json!({
        "$schema": DRAFT_2020_12,
        "$ref": def_ref(root.name()),
        "$defs": defs,
    }))
}

/// Validate a payload against the model `type_name`.
///
/// # Errors
///
/// Returns `ValidateError::Invalid` with every violation found, or
/// `ValidateError::Registry` if the model is not loaded.
pub fn validate_payload(
    registry: &TypeRegistry,
    type_name: &str,
    payload: &Value,
) -> Result<(), ValidateError> {
    let schema = to_json_schema(registry, type_name)?;
    validate_against_schema(&schema, payload)
}

/// Validate a payload against an already-generated schema.
///
/// Use this when validating many payloads against the same model.
pub fn validate_against_schema(schema: &Value, payload: &Value) -> Result<(), ValidateError> {
    let validator = jsonschema::validator_for(schema).map_err(|e| ValidateError::InvalidSchema {
        message: e.to_string(),
    })?;

    let errors: Vec<SchemaError> = validator
        .iter_errors(payload)
        .map(|e| SchemaError {
            path: e.instance_path.to_string(),
            message: e.to_string(),
        })
        .collect();

    if errors.is_empty() {
        Ok(())
    } else {
        Err(ValidateError::Invalid { errors })
    }
}

/// Names of all models reachable from `root`, root included.
fn reachable_models(
    registry: &TypeRegistry,
    root: &ModelSchema,
) -> Result<BTreeSet<String>, RegistryError> {
    let mut seen = BTreeSet::new();
    let mut pending = vec![root.name().to_string()];

    while let Some(name) = pending.pop() {
        if !seen.insert(name.clone()) {
            continue;
        }
        for property in registry.schema(&name)?.properties() {
            match property.value_type() {
                ValueType::MixedCollection(_) => {
                    pending.extend(registry.all_schemas().keys().map(|n| n.to_string()));
                }
                _ => {
                    if let Some(TypeDescriptor::Model(target)) = registry.value_type_of(property)? {
                        pending.push(target.name().to_string());
                    }
                }
            }
        }
    }
    Ok(seen)
}

fn model_schema(registry: &TypeRegistry, schema: &ModelSchema) -> Result<Value, RegistryError> {
    let mut properties = Map::new();
    let mut required = Vec::new();

    for property in schema.properties() {
        let mut value = value_schema(registry, property.value_type())?;
        if property.is_required() {
            required.push(Value::String(property.name_in_transport().to_string()));
        } else {
            value = json!({ "anyOf": [value, { "type": "null" }] });
        }
        properties.insert(property.name_in_transport().to_string(), value);
    }

    let mut out = Map::new();
    out.insert("type".to_string(), json!("object"));
    out.insert("properties".to_string(), Value::Object(properties));
    if !required.is_empty() {
        out.insert("required".to_string(), Value::Array(required));
    }
    Ok(Value::Object(out))
}

fn value_schema(registry: &TypeRegistry, value_type: &ValueType) -> Result<Value, RegistryError> {
    match value_type {
        ValueType::Type { name } => named_schema(registry, name),
        ValueType::TypedCollection(collection) => Ok(json!({
            "type": "array",
            "items": named_schema(registry, collection.item_type())?,
        })),
        ValueType::MixedCollection(collection) => {
            let field = collection.type_field_name();
            let branches: Vec<Value> = registry
                .all_schemas()
                .keys()
                .map(|name| {
                    json!({
                        "$ref": def_ref(name),
                        "properties": { field: { "const": name } },
                        "required": [field],
                    })
                })
                .collect();
            Ok(json!({
                "type": "array",
                "items": { "oneOf": branches },
            }))
        }
    }
}

fn named_schema(registry: &TypeRegistry, name: &str) -> Result<Value, RegistryError> {
    Ok(match registry.resolve(name)? {
        TypeDescriptor::Model(schema) => json!({ "$ref": def_ref(schema.name()) }),
        TypeDescriptor::Primitive(p) if p.name() == STRING_TYPE => json!({ "type": "string" }),
        TypeDescriptor::Primitive(p) if p.name() == NUMBER_TYPE => json!({ "type": "number" }),
        TypeDescriptor::Primitive(_) => json!({}),
    })
}

/// `$ref` pointer to a `$defs` entry, escaped per RFC 6901.
fn def_ref(name: &str) -> String {
    format!("#/$defs/{}", name.replace('~', "~0").replace('/', "~1"))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{MixedCollectionType, PropertyDescriptor, TypedCollectionType};

    fn registry() -> TypeRegistry {
        let mut tag = ModelSchema::new("tag", "App\\Tag");
        tag.add_property(PropertyDescriptor::new("id", "id", ValueType::named(NUMBER_TYPE)))
            .unwrap();
        tag.add_property(PropertyDescriptor::new("name", "name", ValueType::named(STRING_TYPE)))
            .unwrap();

        let mut article = ModelSchema::new("article", "App\\Article");
        article
            .add_property(
                PropertyDescriptor::new("region", "region", ValueType::named(STRING_TYPE))
                    .required(false),
            )
            .unwrap();
        article
            .add_property(PropertyDescriptor::new(
                "tags",
                "tags",
                ValueType::TypedCollection(TypedCollectionType::new("tag")),
            ))
            .unwrap();

        let mut registry = TypeRegistry::new();
        registry.register("tag", TypeDescriptor::Model(tag)).unwrap();
        registry
            .register("article", TypeDescriptor::Model(article))
            .unwrap();
        registry
    }

    #[test]
    fn export_links_reachable_models() {
        let schema = to_json_schema(&registry(), "article").unwrap();
        assert_eq!(schema["$ref"], "#/$defs/article");
        assert_eq!(
            schema["$defs"]["article"]["properties"]["tags"]["items"]["$ref"],
            "#/$defs/tag"
        );
        assert_eq!(schema["$defs"]["article"]["required"], json!(["tags"]));
        assert_eq!(schema["$defs"]["tag"]["required"], json!(["id", "name"]));
    }

    #[test]
    fn export_only_includes_reachable_models() {
        let schema = to_json_schema(&registry(), "tag").unwrap();
        assert!(schema["$defs"].get("article").is_none());
    }

    #[test]
    fn export_unknown_model_fails() {
        assert_eq!(
            to_json_schema(&registry(), "comment").unwrap_err(),
            RegistryError::UnknownType {
                name: "comment".into()
            }
        );
    }

    #[test]
    fn mixed_collection_exports_one_of_all_schemas() {
        let mut page = ModelSchema::new("page", "App\\Page");
        page.add_property(PropertyDescriptor::new(
            "blocks",
            "blocks",
            ValueType::MixedCollection(MixedCollectionType::new("type")),
        ))
        .unwrap();
        let mut registry = registry();
        registry.register("page", TypeDescriptor::Model(page)).unwrap();

        let schema = to_json_schema(&registry, "page").unwrap();
        let branches = schema["$defs"]["page"]["properties"]["blocks"]["items"]["oneOf"]
            .as_array()
            .unwrap();
        assert_eq!(branches.len(), 3);
        assert!(schema["$defs"].get("tag").is_some());
    }

    #[test]
    fn def_ref_escapes_pointer_characters() {
        assert_eq!(def_ref("a/b~c"), "#/$defs/a~1b~0c");
    }

    #[test]
    fn validate_collects_errors() {
        let registry = registry();
        assert!(validate_payload(
            &registry,
            "article",
            &json!({ "tags": [{ "id": 1, "name": "rust" }] })
        )
        .is_ok());

        let result = validate_payload(
            &registry,
            "article",
            &json!({ "region": 5, "tags": [{ "id": "x" }] }),
        );
        match result {
            Err(ValidateError::Invalid { errors }) => assert!(errors.len() >= 2),
            other => panic!("expected validation errors, got {:?}", other),
        }
    }
}
