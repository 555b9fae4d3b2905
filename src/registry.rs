//! Type registry - owns every resolved type descriptor by name.

use std::collections::{BTreeMap, HashMap};

use crate::error::RegistryError;
use crate::types::{
    ModelSchema, PrimitiveType, PropertyDescriptor, TypeDescriptor, TypedCollectionType,
    ValueType, PRIMITIVE_TYPES,
};

/// Mapping from type name to descriptor.
///
/// Property value types refer to entries by name, so models may reference
/// each other in cycles. The registry also indexes model schemas by model
/// identifier, which doubles as the visited set while loading.
#[derive(Debug, Clone)]
pub struct TypeRegistry {
    types: BTreeMap<String, TypeDescriptor>,
    by_model: HashMap<String, String>,
}

impl Default for TypeRegistry {
    fn default() -> Self {
        Self::new()
    }
}

impl TypeRegistry {
    /// Create a registry holding the built-in primitives.
    pub fn new() -> Self {
        let mut registry = Self::empty();
        for name in PRIMITIVE_TYPES {
            registry.types.insert(
                (*name).to_string(),
                TypeDescriptor::Primitive(PrimitiveType::new(*name)),
            );
        }
        registry
    }

    fn empty() -> Self {
        Self {
            types: BTreeMap::new(),
            by_model: HashMap::new(),
        }
    }

    /// Register a descriptor under `name`.
    ///
    /// Registering an identical descriptor again is a no-op.
    ///
    /// # Errors
    ///
    /// Returns `RegistryError::DuplicateType` if `name` is bound to a
    /// different descriptor.
    pub fn register(
        &mut self,
        name: impl Into<String>,
        descriptor: TypeDescriptor,
    ) -> Result<(), RegistryError> {
        let name = name.into();
        if let Some(existing) = self.types.get(&name) {
            if *existing == descriptor {
                return Ok(());
            }
            return Err(RegistryError::DuplicateType { name });
        }

        if let TypeDescriptor::Model(schema) = &descriptor {
            self.by_model
                .insert(schema.model_identifier().to_string(), name.clone());
        }
        self.types.insert(name, descriptor);
        Ok(())
    }

    /// Look up a descriptor by name.
    pub fn resolve(&self, name: &str) -> Result<&TypeDescriptor, RegistryError> {
        self.types.get(name).ok_or_else(|| RegistryError::UnknownType {
            name: name.to_string(),
        })
    }

    pub fn has_type(&self, name: &str) -> bool {
        self.types.contains_key(name)
    }

    /// Look up a model schema by registry name.
    pub fn schema(&self, name: &str) -> Result<&ModelSchema, RegistryError> {
        self.resolve(name)?
            .as_model()
            .ok_or_else(|| RegistryError::NotAModel {
                name: name.to_string(),
            })
    }

    /// Look up the schema registered for a model identifier.
    pub fn schema_for_model(&self, model_identifier: &str) -> Option<&ModelSchema> {
        let name = self.by_model.get(model_identifier)?;
        self.types.get(name).and_then(TypeDescriptor::as_model)
    }

    pub(crate) fn schema_mut(&mut self, name: &str) -> Option<&mut ModelSchema> {
        match self.types.get_mut(name) {
            Some(TypeDescriptor::Model(schema)) => Some(schema),
            _ => None,
        }
    }

    /// Every registered model schema, keyed by name.
    pub fn all_schemas(&self) -> BTreeMap<&str, &ModelSchema> {
        self.types
            .iter()
            .filter_map(|(name, descriptor)| descriptor.as_model().map(|s| (name.as_str(), s)))
            .collect()
    }

    pub fn len(&self) -> usize {
        self.types.len()
    }

    pub fn is_empty(&self) -> bool {
        self.types.is_empty()
    }

    /// Resolve a typed collection's element type.
    pub fn item_type(
        &self,
        collection: &TypedCollectionType,
    ) -> Result<&TypeDescriptor, RegistryError> {
        self.resolve(collection.item_type())
    }

    /// Resolve a property's value type to its registry entry.
    ///
    /// Returns `None` for mixed collections, whose members are only known
    /// per element at decode time.
    pub fn value_type_of(
        &self,
        property: &PropertyDescriptor,
    ) -> Result<Option<&TypeDescriptor>, RegistryError> {
        match property.value_type() {
            ValueType::Type { name } => self.resolve(name).map(Some),
            ValueType::TypedCollection(c) => self.item_type(c).map(Some),
            ValueType::MixedCollection(_) => Ok(None),
        }
    }
}
