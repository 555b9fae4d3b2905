//! Schema engine - derives model schemas from declarations.
//!
//! For each requested model the engine reads the class declarations, requires
//! exactly one `Model` declaration, registers an empty schema under the
//! declared name, and then resolves each annotated property. Referenced
//! models that are not registered yet are loaded depth-first, inline.
//!
//! The schema is registered *before* its properties are resolved. A property
//! that leads back to a model currently being loaded finds it in the registry
//! and stops there, so self references, mutual references, and longer cycles
//! all terminate without a separate visited set.
//!
//! Loading is all-or-nothing per call: the engine works on a staging copy of
//! its registry and only keeps it when every requested model loaded.

use std::collections::{BTreeMap, HashMap};

use tracing::{debug, info, warn};

use crate::error::{LoadSchemaError, RegistryError};
use crate::metadata::MetadataReader;
use crate::registry::TypeRegistry;
use crate::types::{
    Declaration, MixedCollectionType, ModelSchema, PropertyDescriptor, TypeDescriptor,
    TypedCollectionType, ValueType,
};

/// Builds and owns a [`TypeRegistry`] from model declarations.
#[derive(Debug)]
pub struct SchemaEngine<R> {
    reader: R,
    registry: TypeRegistry,
}

impl<R: MetadataReader> SchemaEngine<R> {
    /// Create an engine whose registry holds only the built-in primitives.
    pub fn new(reader: R) -> Self {
        Self::with_registry(reader, TypeRegistry::new())
    }

    /// Create an engine on top of an existing registry.
    pub fn with_registry(reader: R, registry: TypeRegistry) -> Self {
        Self { reader, registry }
    }

    /// Load schemas for the given model identifiers, in order.
    ///
    /// Models that are already loaded are skipped. Models referenced by
    /// properties are loaded as they are encountered.
    ///
    /// # Errors
    ///
    /// Returns the first `LoadSchemaError` encountered. The registry is left
    /// exactly as it was before the call.
    pub fn load_schema_for_models<I, S>(&mut self, models: I) -> Result<(), LoadSchemaError>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let models: Vec<String> = models
            .into_iter()
            .map(|m| m.as_ref().to_string())
            .collect();

        let mut staging = self.registry.clone();
        let result = Loader::new(&self.reader, &mut staging).load_all(&models);

        match result {
            Ok(()) => {
                info!(
                    requested = models.len(),
                    schemas = staging.all_schemas().len(),
                    "loaded model schemas"
                );
                self.registry = staging;
                Ok(())
            }
            Err(e) => {
                warn!(error = %e, "schema load failed, registry unchanged");
                Err(e)
            }
        }
    }

    /// Every loaded model schema, keyed by schema name.
    pub fn all_model_schemas(&self) -> BTreeMap<&str, &ModelSchema> {
        self.registry.all_schemas()
    }

    /// Look up a loaded schema by name.
    pub fn schema(&self, name: &str) -> Result<&ModelSchema, RegistryError> {
        self.registry.schema(name)
    }

    pub fn registry(&self) -> &TypeRegistry {
        &self.registry
    }

    /// Consume the engine, keeping the registry as a read-only snapshot.
    pub fn into_registry(self) -> TypeRegistry {
        self.registry
    }
}

/// State for a single load call.
struct Loader<'a, R> {
    reader: &'a R,
    registry: &'a mut TypeRegistry,
    /// Schema name to model identifier, for the models requested in this call.
    requested: HashMap<String, String>,
}

impl<'a, R: MetadataReader> Loader<'a, R> {
    fn new(reader: &'a R, registry: &'a mut TypeRegistry) -> Self {
        Self {
            reader,
            registry,
            requested: HashMap::new(),
        }
    }

    fn load_all(&mut self, models: &[String]) -> Result<(), LoadSchemaError> {
        self.index_requested(models)?;
        for model in models {
            self.load_model(model)?;
        }
        Ok(())
    }

    /// Record the schema name of every requested model so that properties
    /// can reference a model by schema name before it is loaded.
    fn index_requested(&mut self, models: &[String]) -> Result<(), LoadSchemaError> {
        for model in models {
            if self.registry.schema_for_model(model).is_some() {
                continue;
            }
            if !self.reader.has_model(model) {
                return Err(LoadSchemaError::UnknownModel {
                    model: model.clone(),
                });
            }

            let name = model_name(self.reader, model)?;
            self.ensure_name_free(&name, model)?;
            match self.requested.get(&name) {
                Some(existing) if existing != model => {
                    return Err(LoadSchemaError::DuplicateSchemaName {
                        name,
                        existing: existing.clone(),
                        model: model.clone(),
                    });
                }
                _ => {
                    self.requested.insert(name, model.clone());
                }
            }
        }
        Ok(())
    }

    /// Load one model and return its schema name.
    fn load_model(&mut self, model: &str) -> Result<String, LoadSchemaError> {
        if let Some(schema) = self.registry.schema_for_model(model) {
            return Ok(schema.name().to_string());
        }
        if !self.reader.has_model(model) {
            return Err(LoadSchemaError::UnknownModel {
                model: model.to_string(),
            });
        }

        let name = model_name(self.reader, model)?;
        self.ensure_name_free(&name, model)?;
        self.registry.register(
            name.clone(),
            TypeDescriptor::Model(ModelSchema::new(name.clone(), model)),
        )?;
        debug!(model, schema = %name, "registered schema");

        for property in self.reader.property_names(model) {
            let Some(descriptor) = self.load_property(model, &property)? else {
                debug!(model, property = %property, "skipping unannotated property");
                continue;
            };

            let schema = self
                .registry
                .schema_mut(&name)
                .ok_or_else(|| RegistryError::UnknownType { name: name.clone() })?;
            schema
                .add_property(descriptor)
                .map_err(|rejected| LoadSchemaError::DuplicateTransportName {
                    model: model.to_string(),
                    name: rejected.name_in_transport().to_string(),
                })?;
        }

        Ok(name)
    }

    /// Build the descriptor for one property, or `None` if it carries no
    /// shape declaration.
    fn load_property(
        &mut self,
        model: &str,
        property: &str,
    ) -> Result<Option<PropertyDescriptor>, LoadSchemaError> {
        let declarations = self.reader.property_declarations(model, property);
        let identifier = declarations.iter().any(|d| matches!(d, Declaration::Id));

        let mut shapes: Vec<Declaration> = declarations
            .into_iter()
            .filter(Declaration::is_property_shape)
            .collect();
        if shapes.len() > 1 {
            return Err(LoadSchemaError::DuplicatePropertyDeclaration {
                model: model.to_string(),
                property: property.to_string(),
                count: shapes.len(),
                kinds: shapes.iter().map(Declaration::kind).collect(),
            });
        }
        let Some(shape) = shapes.pop() else {
            return Ok(None);
        };

        let (name, value_type, optional) = match shape {
            Declaration::Property {
                name,
                type_name,
                optional,
            } => {
                let resolved = self.resolve_type(model, property, &type_name)?;
                (name, ValueType::named(resolved), optional)
            }
            Declaration::TypedCollection {
                name,
                type_name,
                optional,
            } => {
                let resolved = self.resolve_type(model, property, &type_name)?;
                (
                    name,
                    ValueType::TypedCollection(TypedCollectionType::new(resolved)),
                    optional,
                )
            }
            // Members are resolved per element at decode time.
            Declaration::MixedCollection {
                name,
                type_field_name,
                optional,
            } => (
                name,
                ValueType::MixedCollection(MixedCollectionType::new(type_field_name)),
                optional,
            ),
            Declaration::Model { .. } | Declaration::Id => return Ok(None),
        };

        Ok(Some(
            PropertyDescriptor::new(name, property, value_type)
                .required(!optional)
                .identifier(identifier),
        ))
    }

    /// Resolve a declared type string to a registry name, loading the
    /// referenced model first when needed.
    fn resolve_type(
        &mut self,
        model: &str,
        property: &str,
        type_name: &str,
    ) -> Result<String, LoadSchemaError> {
        if self.registry.has_type(type_name) {
            return Ok(type_name.to_string());
        }

        let target = if self.reader.has_model(type_name) {
            type_name.to_string()
        } else if let Some(identifier) = self.requested.get(type_name) {
            identifier.clone()
        } else if let Some(identifier) = self.reader.model_for_schema_name(type_name) {
            identifier
        } else {
            return Err(LoadSchemaError::UnknownTypeReference {
                model: model.to_string(),
                property: property.to_string(),
                type_name: type_name.to_string(),
            });
        };

        debug!(model, property, referenced = %target, "loading referenced model");
        self.load_model(&target)
            .map_err(|source| LoadSchemaError::UnresolvableModel {
                model: target.clone(),
                referenced_by: model.to_string(),
                source: Box::new(source),
            })
    }

    /// Fail if `name` is already bound to something other than `model`.
    fn ensure_name_free(&self, name: &str, model: &str) -> Result<(), LoadSchemaError> {
        match self.registry.resolve(name) {
            Ok(TypeDescriptor::Model(existing)) if existing.model_identifier() != model => {
                Err(LoadSchemaError::DuplicateSchemaName {
                    name: name.to_string(),
                    existing: existing.model_identifier().to_string(),
                    model: model.to_string(),
                })
            }
            Ok(TypeDescriptor::Primitive(_)) => Err(RegistryError::DuplicateType {
                name: name.to_string(),
            }
            .into()),
            _ => Ok(()),
        }
    }
}

/// Read the schema name from a model's single `Model` declaration.
fn model_name<R: MetadataReader>(reader: &R, model: &str) -> Result<String, LoadSchemaError> {
    let mut names: Vec<String> = reader
        .class_declarations(model)
        .into_iter()
        .filter_map(|d| match d {
            Declaration::Model { name } => Some(name),
            _ => None,
        })
        .collect();

    if names.len() > 1 {
        return Err(LoadSchemaError::DuplicateModelDeclaration {
            model: model.to_string(),
            count: names.len(),
        });
    }
    names
        .pop()
        .ok_or_else(|| LoadSchemaError::MissingModelDeclaration {
            model: model.to_string(),
        })
}
