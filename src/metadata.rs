//! Metadata reading - where model declarations come from.
//!
//! The engine never inspects model classes itself. It asks a
//! [`MetadataReader`] for the declarations attached to a class and to each
//! of its properties. [`ModelManifest`] is the bundled reader: an in-memory
//! description that can be built in code or deserialized from JSON:
//!
//! ```json
//! {
//!   "models": [
//!     {
//!       "model": "App\\Model\\Tag",
//!       "declarations": [{ "kind": "model", "name": "tag" }],
//!       "properties": [
//!         {
//!           "name": "id",
//!           "declarations": [{ "kind": "property", "name": "id", "type": "number" }]
//!         }
//!       ]
//!     }
//!   ]
//! }
//! ```

use serde::{Deserialize, Serialize};

use crate::types::Declaration;

/// Supplies declarations for model classes and their properties.
pub trait MetadataReader {
    /// Whether `model` names a class this reader knows.
    fn has_model(&self, model: &str) -> bool;

    /// Class-level declarations, in order.
    fn class_declarations(&self, model: &str) -> Vec<Declaration>;

    /// Names of the class's properties, in declaration order.
    fn property_names(&self, model: &str) -> Vec<String>;

    /// Declarations attached to one property, in order.
    fn property_declarations(&self, model: &str, property: &str) -> Vec<Declaration>;

    /// Identifier of the model whose `Model` declaration uses `name`, if
    /// the reader can tell without loading anything.
    fn model_for_schema_name(&self, _name: &str) -> Option<String> {
        None
    }
}

impl<R: MetadataReader + ?Sized> MetadataReader for &R {
    fn has_model(&self, model: &str) -> bool {
        (**self).has_model(model)
    }

    fn class_declarations(&self, model: &str) -> Vec<Declaration> {
        (**self).class_declarations(model)
    }

    fn property_names(&self, model: &str) -> Vec<String> {
        (**self).property_names(model)
    }

    fn property_declarations(&self, model: &str, property: &str) -> Vec<Declaration> {
        (**self).property_declarations(model, property)
    }

    fn model_for_schema_name(&self, name: &str) -> Option<String> {
        (**self).model_for_schema_name(name)
    }
}

/// One property of a model class and its declarations.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PropertyDefinition {
    pub name: String,
    #[serde(default)]
    pub declarations: Vec<Declaration>,
}

/// One model class: its identifier, class declarations, and properties.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ModelDefinition {
    #[serde(rename = "model")]
    pub identifier: String,
    #[serde(default)]
    pub declarations: Vec<Declaration>,
    #[serde(default)]
    pub properties: Vec<PropertyDefinition>,
}

impl ModelDefinition {
    pub fn new(identifier: impl Into<String>) -> Self {
        Self {
            identifier: identifier.into(),
            declarations: Vec::new(),
            properties: Vec::new(),
        }
    }

    /// Add a class-level declaration.
    pub fn declare(mut self, declaration: Declaration) -> Self {
        self.declarations.push(declaration);
        self
    }

    /// Shorthand for declaring the class a model named `name`.
    pub fn named(self, name: impl Into<String>) -> Self {
        self.declare(Declaration::Model { name: name.into() })
    }

    /// Add a property with its declarations (possibly none).
    pub fn property(mut self, name: impl Into<String>, declarations: Vec<Declaration>) -> Self {
        self.properties.push(PropertyDefinition {
            name: name.into(),
            declarations,
        });
        self
    }

    fn find_property(&self, name: &str) -> Option<&PropertyDefinition> {
        self.properties.iter().find(|p| p.name == name)
    }
}

/// In-memory metadata for a set of model classes.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ModelManifest {
    #[serde(default)]
    pub models: Vec<ModelDefinition>,
}

impl ModelManifest {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a model definition.
    pub fn model(mut self, definition: ModelDefinition) -> Self {
        self.models.push(definition);
        self
    }

    /// Model identifiers in manifest order.
    pub fn identifiers(&self) -> Vec<&str> {
        self.models.iter().map(|m| m.identifier.as_str()).collect()
    }

    fn find_model(&self, model: &str) -> Option<&ModelDefinition> {
        self.models.iter().find(|m| m.identifier == model)
    }
}

impl MetadataReader for ModelManifest {
    fn has_model(&self, model: &str) -> bool {
        self.find_model(model).is_some()
    }

    fn class_declarations(&self, model: &str) -> Vec<Declaration> {
        self.find_model(model)
            .map(|m| m.declarations.clone())
            .unwrap_or_default()
    }

    fn property_names(&self, model: &str) -> Vec<String> {
        self.find_model(model)
            .map(|m| m.properties.iter().map(|p| p.name.clone()).collect())
            .unwrap_or_default()
    }

    fn property_declarations(&self, model: &str, property: &str) -> Vec<Declaration> {
        self.find_model(model)
            .and_then(|m| m.find_property(property))
            .map(|p| p.declarations.clone())
            .unwrap_or_default()
    }

    fn model_for_schema_name(&self, name: &str) -> Option<String> {
        self.models
            .iter()
            .find(|m| {
                m.declarations
                    .iter()
                    .any(|d| matches!(d, Declaration::Model { name: n } if n == name))
            })
            .map(|m| m.identifier.clone())
    }
}
