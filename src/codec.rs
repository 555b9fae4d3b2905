//! Decoding transport payloads into model instances, and encoding them back.
//!
//! This walks a loaded schema alongside a JSON payload. Transport keys are
//! mapped to model field names and back. Mixed collections are the one place
//! where the schema is not enough on its own: each element names its schema
//! under the collection's discriminator key, and that name is looked up in
//! the registry per element.

use std::collections::BTreeMap;

use serde::Serialize;
use serde_json::{Map, Number, Value};

use crate::error::DecodeError;
use crate::registry::TypeRegistry;
use crate::types::{json_type_name, ModelSchema, TypeDescriptor, ValueType, NUMBER_TYPE, STRING_TYPE};

/// Options for decoding.
#[derive(Debug, Clone, Default)]
pub struct DecodeOptions {
    /// When true, payload keys that the schema does not declare are
    /// rejected. Defaults to false so producers can add fields freely.
    pub strict: bool,
}

impl DecodeOptions {
    pub fn new() -> Self {
        Self::default()
    }

    /// Set strict mode (reject undeclared payload keys).
    pub fn strict(mut self, strict: bool) -> Self {
        self.strict = strict;
        self
    }
}

/// A decoded field value.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum FieldValue {
    String(String),
    Number(Number),
    Model(ModelInstance),
    Collection(Vec<FieldValue>),
    /// Value of a primitive the codec has no mapping for, kept as-is.
    Other(Value),
}

impl FieldValue {
    fn kind(&self) -> &'static str {
        match self {
            FieldValue::String(_) => "string",
            FieldValue::Number(_) => "number",
            FieldValue::Model(_) => "model",
            FieldValue::Collection(_) => "collection",
            FieldValue::Other(v) => json_type_name(v),
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            FieldValue::String(s) => Some(s),
            _ => None,
        }
    }

    pub fn as_number(&self) -> Option<&Number> {
        match self {
            FieldValue::Number(n) => Some(n),
            _ => None,
        }
    }

    pub fn as_model(&self) -> Option<&ModelInstance> {
        match self {
            FieldValue::Model(m) => Some(m),
            _ => None,
        }
    }

    pub fn as_collection(&self) -> Option<&[FieldValue]> {
        match self {
            FieldValue::Collection(items) => Some(items),
            _ => None,
        }
    }
}

impl From<&str> for FieldValue {
    fn from(s: &str) -> Self {
        FieldValue::String(s.to_string())
    }
}

impl From<String> for FieldValue {
    fn from(s: String) -> Self {
        FieldValue::String(s)
    }
}

impl From<i64> for FieldValue {
    fn from(n: i64) -> Self {
        FieldValue::Number(n.into())
    }
}

impl From<ModelInstance> for FieldValue {
    fn from(m: ModelInstance) -> Self {
        FieldValue::Model(m)
    }
}

impl From<Vec<FieldValue>> for FieldValue {
    fn from(items: Vec<FieldValue>) -> Self {
        FieldValue::Collection(items)
    }
}

/// A model object: its schema name and fields keyed by model name.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ModelInstance {
    schema: String,
    fields: BTreeMap<String, FieldValue>,
}

impl ModelInstance {
    pub fn new(schema: impl Into<String>) -> Self {
        Self {
            schema: schema.into(),
            fields: BTreeMap::new(),
        }
    }

    /// Builder-style field setter.
    pub fn with(mut self, name: impl Into<String>, value: impl Into<FieldValue>) -> Self {
        self.set(name, value);
        self
    }

    pub fn set(&mut self, name: impl Into<String>, value: impl Into<FieldValue>) {
        self.fields.insert(name.into(), value.into());
    }

    pub fn get(&self, name: &str) -> Option<&FieldValue> {
        self.fields.get(name)
    }

    pub fn schema_name(&self) -> &str {
        &self.schema
    }

    pub fn fields(&self) -> &BTreeMap<String, FieldValue> {
        &self.fields
    }
}

/// Decode a payload into an instance of the schema named `type_name`.
///
/// # Errors
///
/// Returns `DecodeError` on the first payload that does not fit the schema.
pub fn decode(
    registry: &TypeRegistry,
    type_name: &str,
    payload: &Value,
    options: &DecodeOptions,
) -> Result<ModelInstance, DecodeError> {
    let schema = registry.schema(type_name)?;
    decode_model(registry, schema, payload, "", None, options)
}

/// Encode an instance back into its transport form.
///
/// # Errors
///
/// Returns `DecodeError` if the instance does not fit its schema.
pub fn encode(registry: &TypeRegistry, instance: &ModelInstance) -> Result<Value, DecodeError> {
    let schema = registry.schema(instance.schema_name())?;
    encode_model(registry, schema, instance, "")
}

// --- Internal implementation ---

fn decode_model(
    registry: &TypeRegistry,
    schema: &ModelSchema,
    value: &Value,
    path: &str,
    discriminator: Option<&str>,
    options: &DecodeOptions,
) -> Result<ModelInstance, DecodeError> {
    let Value::Object(obj) = value else {
        return Err(mismatch(path, "object", value));
    };

    if options.strict {
        for key in obj.keys() {
            let declared = schema.property_by_name_in_transport(key).is_some()
                || discriminator == Some(key.as_str());
            if !declared {
                return Err(DecodeError::UnknownProperty {
                    path: path_or_root(path),
                    name: key.clone(),
                });
            }
        }
    }

    let mut instance = ModelInstance::new(schema.name());
    for property in schema.properties() {
        let child_path = format!("{}/{}", path, property.name_in_transport());
        match obj.get(property.name_in_transport()) {
            None | Some(Value::Null) => {
                if property.is_required() {
                    return Err(DecodeError::MissingRequiredProperty { path: child_path });
                }
            }
            Some(v) => {
                let field = decode_value(registry, property.value_type(), v, &child_path, options)?;
                instance.set(property.name_in_model(), field);
            }
        }
    }
    Ok(instance)
}

fn decode_value(
    registry: &TypeRegistry,
    value_type: &ValueType,
    value: &Value,
    path: &str,
    options: &DecodeOptions,
) -> Result<FieldValue, DecodeError> {
    match value_type {
        ValueType::Type { name } => decode_named(registry, name, value, path, options),
        ValueType::TypedCollection(collection) => {
            let items = as_array(value, path)?;
            items
                .iter()
                .enumerate()
                .map(|(i, item)| {
                    let item_path = format!("{}/{}", path, i);
                    decode_named(registry, collection.item_type(), item, &item_path, options)
                })
                .collect::<Result<Vec<_>, _>>()
                .map(FieldValue::Collection)
        }
        ValueType::MixedCollection(collection) => {
            let field = collection.type_field_name();
            let items = as_array(value, path)?;
            let mut decoded = Vec::with_capacity(items.len());
            for (i, item) in items.iter().enumerate() {
                let item_path = format!("{}/{}", path, i);
                let schema = discriminated_schema(registry, item, field, &item_path)?;
                let instance =
                    decode_model(registry, schema, item, &item_path, Some(field), options)?;
                decoded.push(FieldValue::Model(instance));
            }
            Ok(FieldValue::Collection(decoded))
        }
    }
}

fn decode_named(
    registry: &TypeRegistry,
    name: &str,
    value: &Value,
    path: &str,
    options: &DecodeOptions,
) -> Result<FieldValue, DecodeError> {
    match registry.resolve(name)? {
        TypeDescriptor::Model(schema) => {
            decode_model(registry, schema, value, path, None, options).map(FieldValue::Model)
        }
        TypeDescriptor::Primitive(primitive) => match (primitive.name(), value) {
            (STRING_TYPE, Value::String(s)) => Ok(FieldValue::String(s.clone())),
            (NUMBER_TYPE, Value::Number(n)) => Ok(FieldValue::Number(n.clone())),
            (STRING_TYPE, other) | (NUMBER_TYPE, other) => {
                Err(mismatch(path, primitive.name(), other))
            }
            (_, other) => Ok(FieldValue::Other(other.clone())),
        },
    }
}

/// Pick the schema an element of a mixed collection names.
fn discriminated_schema<'r>(
    registry: &'r TypeRegistry,
    item: &Value,
    field: &str,
    path: &str,
) -> Result<&'r ModelSchema, DecodeError> {
    if !item.is_object() {
        return Err(mismatch(path, "object", item));
    }
    let discriminator = item
        .get(field)
        .ok_or_else(|| DecodeError::MissingDiscriminator {
            path: path.to_string(),
            field: field.to_string(),
        })?;
    let Value::String(tag) = discriminator else {
        return Err(mismatch(&format!("{}/{}", path, field), "string", discriminator));
    };

    match registry.resolve(tag) {
        Ok(TypeDescriptor::Model(schema)) => Ok(schema),
        _ => Err(DecodeError::UnknownDiscriminator {
            path: path.to_string(),
            value: tag.clone(),
        }),
    }
}

fn encode_model(
    registry: &TypeRegistry,
    schema: &ModelSchema,
    instance: &ModelInstance,
    path: &str,
) -> Result<Value, DecodeError> {
    if let Some(name) = instance
        .fields()
        .keys()
        .find(|name| schema.property_by_name_in_model(name).is_none())
    {
        return Err(DecodeError::UnknownProperty {
            path: path_or_root(path),
            name: name.clone(),
        });
    }

    let mut obj = Map::new();
    for property in schema.properties() {
        let child_path = format!("{}/{}", path, property.name_in_transport());
        match instance.get(property.name_in_model()) {
            None => {
                if property.is_required() {
                    return Err(DecodeError::MissingRequiredProperty { path: child_path });
                }
            }
            Some(field) => {
                let value = encode_value(registry, property.value_type(), field, &child_path)?;
                obj.insert(property.name_in_transport().to_string(), value);
            }
        }
    }
    Ok(Value::Object(obj))
}

fn encode_value(
    registry: &TypeRegistry,
    value_type: &ValueType,
    field: &FieldValue,
    path: &str,
) -> Result<Value, DecodeError> {
    match value_type {
        ValueType::Type { name } => encode_named(registry, name, field, path),
        ValueType::TypedCollection(collection) => {
            let items = collection_items(field, path)?;
            items
                .iter()
                .enumerate()
                .map(|(i, item)| {
                    let item_path = format!("{}/{}", path, i);
                    encode_named(registry, collection.item_type(), item, &item_path)
                })
                .collect::<Result<Vec<_>, _>>()
                .map(Value::Array)
        }
        ValueType::MixedCollection(collection) => {
            let items = collection_items(field, path)?;
            let mut encoded = Vec::with_capacity(items.len());
            for (i, item) in items.iter().enumerate() {
                let item_path = format!("{}/{}", path, i);
                let Some(instance) = item.as_model() else {
                    return Err(DecodeError::TypeMismatch {
                        path: item_path,
                        expected: "model".to_string(),
                        actual: item.kind().to_string(),
                    });
                };
                let schema = registry.schema(instance.schema_name()).map_err(|_| {
                    DecodeError::UnknownDiscriminator {
                        path: item_path.clone(),
                        value: instance.schema_name().to_string(),
                    }
                })?;
                let mut value = encode_model(registry, schema, instance, &item_path)?;
                if let Value::Object(obj) = &mut value {
                    obj.insert(
                        collection.type_field_name().to_string(),
                        Value::String(schema.name().to_string()),
                    );
                }
                encoded.push(value);
            }
            Ok(Value::Array(encoded))
        }
    }
}

fn encode_named(
    registry: &TypeRegistry,
    name: &str,
    field: &FieldValue,
    path: &str,
) -> Result<Value, DecodeError> {
    match (registry.resolve(name)?, field) {
        (TypeDescriptor::Model(schema), FieldValue::Model(instance))
            if instance.schema_name() == schema.name() =>
        {
            encode_model(registry, schema, instance, path)
        }
        (TypeDescriptor::Primitive(p), FieldValue::String(s)) if p.name() == STRING_TYPE => {
            Ok(Value::String(s.clone()))
        }
        (TypeDescriptor::Primitive(p), FieldValue::Number(n)) if p.name() == NUMBER_TYPE => {
            Ok(Value::Number(n.clone()))
        }
        (TypeDescriptor::Primitive(p), FieldValue::Other(v))
            if p.name() != STRING_TYPE && p.name() != NUMBER_TYPE =>
        {
            Ok(v.clone())
        }
        (descriptor, other) => Err(DecodeError::TypeMismatch {
            path: path.to_string(),
            expected: descriptor.name().to_string(),
            actual: other.kind().to_string(),
        }),
    }
}

fn as_array<'v>(value: &'v Value, path: &str) -> Result<&'v Vec<Value>, DecodeError> {
    value.as_array().ok_or_else(|| mismatch(path, "array", value))
}

fn collection_items<'f>(field: &'f FieldValue, path: &str) -> Result<&'f [FieldValue], DecodeError> {
    field
        .as_collection()
        .ok_or_else(|| DecodeError::TypeMismatch {
            path: path.to_string(),
            expected: "collection".to_string(),
            actual: field.kind().to_string(),
        })
}

fn mismatch(path: &str, expected: &str, actual: &Value) -> DecodeError {
    DecodeError::TypeMismatch {
        path: path_or_root(path),
        expected: expected.to_string(),
        actual: json_type_name(actual).to_string(),
    }
}

fn path_or_root(path: &str) -> String {
    if path.is_empty() {
        "/".to_string()
    } else {
        path.to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{PropertyDescriptor, TypedCollectionType};
    use serde_json::json;

    fn tag_registry() -> TypeRegistry {
        let mut schema = ModelSchema::new("tag", "App\\Tag");
        schema
            .add_property(PropertyDescriptor::new("id", "id", ValueType::named(NUMBER_TYPE)))
            .unwrap();
        schema
            .add_property(
                PropertyDescriptor::new("display_name", "displayName", ValueType::named(STRING_TYPE))
                    .required(false),
            )
            .unwrap();
        let mut registry = TypeRegistry::new();
        registry.register("tag", TypeDescriptor::Model(schema)).unwrap();
        registry
    }

    #[test]
    fn decode_maps_transport_to_model_names() {
        let registry = tag_registry();
        let tag = decode(
            &registry,
            "tag",
            &json!({ "id": 7, "display_name": "rust" }),
            &DecodeOptions::new(),
        )
        .unwrap();

        assert_eq!(tag.schema_name(), "tag");
        assert_eq!(tag.get("displayName").and_then(FieldValue::as_str), Some("rust"));
        assert!(tag.get("display_name").is_none());
    }

    #[test]
    fn optional_property_may_be_absent_or_null() {
        let registry = tag_registry();
        let options = DecodeOptions::new();
        let tag = decode(&registry, "tag", &json!({ "id": 1 }), &options).unwrap();
        assert!(tag.get("displayName").is_none());

        let tag = decode(&registry, "tag", &json!({ "id": 1, "display_name": null }), &options)
            .unwrap();
        assert!(tag.get("displayName").is_none());
    }

    #[test]
    fn root_type_mismatch_reports_root_path() {
        let registry = tag_registry();
        let err = decode(&registry, "tag", &json!([1, 2]), &DecodeOptions::new()).unwrap_err();
        assert!(matches!(
            err,
            DecodeError::TypeMismatch { path, expected, actual }
                if path == "/" && expected == "object" && actual == "array"
        ));
    }

    #[test]
    fn strict_rejects_undeclared_keys() {
        let registry = tag_registry();
        let payload = json!({ "id": 1, "colour": "red" });

        assert!(decode(&registry, "tag", &payload, &DecodeOptions::new()).is_ok());
        let err = decode(&registry, "tag", &payload, &DecodeOptions::new().strict(true))
            .unwrap_err();
        assert!(matches!(err, DecodeError::UnknownProperty { name, .. } if name == "colour"));
    }

    #[test]
    fn encode_rejects_wrong_primitive() {
        let registry = tag_registry();
        let tag = ModelInstance::new("tag").with("id", "seven");
        let err = encode(&registry, &tag).unwrap_err();
        assert!(matches!(
            err,
            DecodeError::TypeMismatch { path, expected, actual }
                if path == "/id" && expected == "number" && actual == "string"
        ));
    }

    #[test]
    fn encode_rejects_unknown_field() {
        let registry = tag_registry();
        let tag = ModelInstance::new("tag").with("id", 1).with("colour", "red");
        assert!(matches!(
            encode(&registry, &tag),
            Err(DecodeError::UnknownProperty { name, .. }) if name == "colour"
        ));
    }

    #[test]
    fn typed_collection_of_primitives() {
        let mut schema = ModelSchema::new("bag", "App\\Bag");
        schema
            .add_property(PropertyDescriptor::new(
                "labels",
                "labels",
                ValueType::TypedCollection(TypedCollectionType::new(STRING_TYPE)),
            ))
            .unwrap();
        let mut registry = TypeRegistry::new();
        registry.register("bag", TypeDescriptor::Model(schema)).unwrap();

        let bag = decode(
            &registry,
            "bag",
            &json!({ "labels": ["a", "b"] }),
            &DecodeOptions::new(),
        )
        .unwrap();
        assert_eq!(
            bag.get("labels").and_then(FieldValue::as_collection).map(<[_]>::len),
            Some(2)
        );

        let err = decode(
            &registry,
            "bag",
            &json!({ "labels": ["a", 2] }),
            &DecodeOptions::new(),
        )
        .unwrap_err();
        assert!(matches!(err, DecodeError::TypeMismatch { path, .. } if path == "/labels/1"));
    }
}
