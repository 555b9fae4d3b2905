//! Core types for model schemas.

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Registry name of the string primitive.
pub const STRING_TYPE: &str = "string";

/// Registry name of the number primitive.
pub const NUMBER_TYPE: &str = "number";

/// Primitives registered by every fresh registry.
pub const PRIMITIVE_TYPES: &[&str] = &[STRING_TYPE, NUMBER_TYPE];

/// Returns the JSON type name for error messages.
pub fn json_type_name(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "boolean",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}

/// A single declarative metadata entry attached to a model class or property.
///
/// Manifests spell these as tagged objects:
/// ```json
/// { "kind": "property", "name": "id", "type": "number" }
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Declaration {
    /// Marks a class as a model and names its schema.
    Model { name: String },
    /// Marks a property as the model's identifier.
    Id,
    /// Scalar property holding a primitive or a nested model.
    Property {
        name: String,
        #[serde(rename = "type")]
        type_name: String,
        #[serde(default)]
        optional: bool,
    },
    /// Homogeneous array of one item type.
    TypedCollection {
        name: String,
        #[serde(rename = "type")]
        type_name: String,
        #[serde(default)]
        optional: bool,
    },
    /// Heterogeneous array whose elements name their own schema.
    MixedCollection {
        name: String,
        type_field_name: String,
        #[serde(default)]
        optional: bool,
    },
}

impl Declaration {
    /// True for declarations that give a property its shape.
    pub fn is_property_shape(&self) -> bool {
        matches!(
            self,
            Declaration::Property { .. }
                | Declaration::TypedCollection { .. }
                | Declaration::MixedCollection { .. }
        )
    }

    /// Short kind label, matching the serialized `kind` tag.
    pub fn kind(&self) -> &'static str {
        match self {
            Declaration::Model { .. } => "model",
            Declaration::Id => "id",
            Declaration::Property { .. } => "property",
            Declaration::TypedCollection { .. } => "typed_collection",
            Declaration::MixedCollection { .. } => "mixed_collection",
        }
    }
}

/// Leaf type with a fixed name and no structure.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PrimitiveType {
    name: String,
}

impl PrimitiveType {
    pub fn new(name: impl Into<String>) -> Self {
        Self { name: name.into() }
    }

    pub fn name(&self) -> &str {
        &self.name
    }
}

/// Homogeneous array value type.
///
/// The item type is held by name and resolved through the registry, which is
/// what lets two models hold collections of each other.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TypedCollectionType {
    item_type: String,
}

impl TypedCollectionType {
    pub fn new(item_type: impl Into<String>) -> Self {
        Self {
            item_type: item_type.into(),
        }
    }

    /// Registry name of the element type.
    pub fn item_type(&self) -> &str {
        &self.item_type
    }

    pub fn name(&self) -> String {
        format!("{}[]", self.item_type)
    }
}

/// Heterogeneous array value type.
///
/// Members are not known when the schema is built. Each element carries a
/// discriminator under `type_field_name` that is looked up at decode time.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct MixedCollectionType {
    type_field_name: String,
}

impl MixedCollectionType {
    pub fn new(type_field_name: impl Into<String>) -> Self {
        Self {
            type_field_name: type_field_name.into(),
        }
    }

    pub fn type_field_name(&self) -> &str {
        &self.type_field_name
    }

    pub fn name(&self) -> String {
        format!("mixed<{}>", self.type_field_name)
    }
}

/// Type of a property's value.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum ValueType {
    /// A registered primitive or model, by registry name.
    Type { name: String },
    TypedCollection(TypedCollectionType),
    MixedCollection(MixedCollectionType),
}

impl ValueType {
    pub fn named(name: impl Into<String>) -> Self {
        ValueType::Type { name: name.into() }
    }

    pub fn name(&self) -> String {
        match self {
            ValueType::Type { name } => name.clone(),
            ValueType::TypedCollection(c) => c.name(),
            ValueType::MixedCollection(c) => c.name(),
        }
    }

    pub fn as_typed_collection(&self) -> Option<&TypedCollectionType> {
        match self {
            ValueType::TypedCollection(c) => Some(c),
            _ => None,
        }
    }

    pub fn as_mixed_collection(&self) -> Option<&MixedCollectionType> {
        match self {
            ValueType::MixedCollection(c) => Some(c),
            _ => None,
        }
    }
}

/// Mapping of one transport key onto one model field.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PropertyDescriptor {
    name_in_transport: String,
    name_in_model: String,
    value_type: ValueType,
    required: bool,
    #[serde(skip_serializing_if = "std::ops::Not::not")]
    identifier: bool,
}

impl PropertyDescriptor {
    /// Create a required, non-identifier property.
    pub fn new(
        name_in_transport: impl Into<String>,
        name_in_model: impl Into<String>,
        value_type: ValueType,
    ) -> Self {
        Self {
            name_in_transport: name_in_transport.into(),
            name_in_model: name_in_model.into(),
            value_type,
            required: true,
            identifier: false,
        }
    }

    pub fn required(mut self, required: bool) -> Self {
        self.required = required;
        self
    }

    pub fn identifier(mut self, identifier: bool) -> Self {
        self.identifier = identifier;
        self
    }

    pub fn name_in_transport(&self) -> &str {
        &self.name_in_transport
    }

    pub fn name_in_model(&self) -> &str {
        &self.name_in_model
    }

    pub fn value_type(&self) -> &ValueType {
        &self.value_type
    }

    pub fn is_required(&self) -> bool {
        self.required
    }

    pub fn is_identifier(&self) -> bool {
        self.identifier
    }
}

/// Resolved description of one model's transport-to-model mapping.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ModelSchema {
    name: String,
    model_identifier: String,
    properties: Vec<PropertyDescriptor>,
}

impl ModelSchema {
    /// Create a schema with no properties yet.
    pub fn new(name: impl Into<String>, model_identifier: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            model_identifier: model_identifier.into(),
            properties: Vec::new(),
        }
    }

    /// Transport-facing type tag, unique in the registry.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Identifier of the model class this schema describes.
    pub fn model_identifier(&self) -> &str {
        &self.model_identifier
    }

    /// Properties in declaration order.
    pub fn properties(&self) -> &[PropertyDescriptor] {
        &self.properties
    }

    pub fn property_by_name_in_transport(&self, name: &str) -> Option<&PropertyDescriptor> {
        self.properties
            .iter()
            .find(|p| p.name_in_transport == name)
    }

    pub fn property_by_name_in_model(&self, name: &str) -> Option<&PropertyDescriptor> {
        self.properties.iter().find(|p| p.name_in_model == name)
    }

    /// The property marked with an `Id` declaration, if any.
    pub fn identifier_property(&self) -> Option<&PropertyDescriptor> {
        self.properties.iter().find(|p| p.identifier)
    }

    /// Attach a property.
    ///
    /// Returns the rejected descriptor when its transport name is already
    /// taken within this schema.
    pub fn add_property(&mut self, property: PropertyDescriptor) -> Result<(), PropertyDescriptor> {
        if self
            .property_by_name_in_transport(&property.name_in_transport)
            .is_some()
        {
            return Err(property);
        }
        self.properties.push(property);
        Ok(())
    }
}

/// A registry entry.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum TypeDescriptor {
    Primitive(PrimitiveType),
    Model(ModelSchema),
}

impl TypeDescriptor {
    pub fn name(&self) -> &str {
        match self {
            TypeDescriptor::Primitive(p) => p.name(),
            TypeDescriptor::Model(m) => m.name(),
        }
    }

    pub fn as_model(&self) -> Option<&ModelSchema> {
        match self {
            TypeDescriptor::Model(m) => Some(m),
            TypeDescriptor::Primitive(_) => None,
        }
    }

    pub fn is_primitive(&self) -> bool {
        matches!(self, TypeDescriptor::Primitive(_))
    }
}
