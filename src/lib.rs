//! Model Schema
//!
//! Derives schemas from declaratively annotated model classes, and uses them
//! to map JSON transport payloads onto model instances and back.
//!
//! Declarations come from a [`MetadataReader`]. The [`SchemaEngine`] reads
//! them for each requested model and builds a [`TypeRegistry`] of
//! [`ModelSchema`]s. The registry can then decode payloads, encode
//! instances, or export a JSON Schema.
//!
//! # Example
//!
//! ```
//! use model_schema::{
//!     decode, Declaration, DecodeOptions, ModelDefinition, ModelManifest, SchemaEngine,
//! };
//! use serde_json::json;
//!
//! let manifest = ModelManifest::new().model(
//!     ModelDefinition::new("App\\Model\\Tag")
//!         .named("tag")
//!         .property(
//!             "id",
//!             vec![Declaration::Property {
//!                 name: "id".into(),
//!                 type_name: "number".into(),
//!                 optional: false,
//!             }],
//!         )
//!         .property(
//!             "displayName",
//!             vec![Declaration::Property {
//!                 name: "display_name".into(),
//!                 type_name: "string".into(),
//!                 optional: true,
//!             }],
//!         ),
//! );
//!
//! let mut engine = SchemaEngine::new(manifest);
//! engine.load_schema_for_models(["App\\Model\\Tag"]).unwrap();
//!
//! let tag = decode(
//!     engine.registry(),
//!     "tag",
//!     &json!({ "id": 1, "display_name": "rust" }),
//!     &DecodeOptions::new(),
//! )
//! .unwrap();
//! assert_eq!(tag.get("displayName").and_then(|v| v.as_str()), Some("rust"));
//! ```
//!
//! # Declarations
//!
//! | Declaration | Attached to | Effect |
//! |-------------|-------------|--------|
//! | `Model { name }` | class | Required exactly once; names the schema |
//! | `Property { name, type, optional }` | property | Primitive or nested model |
//! | `TypedCollection { name, type, optional }` | property | Array of one item type |
//! | `MixedCollection { name, type_field_name, optional }` | property | Array of self-describing elements |
//! | `Id` | property | Marks the identifier property |
//!
//! A property carries at most one shape declaration. Properties with none
//! are left out of the schema.

mod codec;
mod engine;
mod error;
mod loader;
mod metadata;
mod registry;
mod source;
mod types;
mod validator;

pub use codec::{decode, encode, DecodeOptions, FieldValue, ModelInstance};
pub use engine::SchemaEngine;
pub use error::{
    DataSourceError, DecodeError, FetchError, LoadSchemaError, ManifestError, RegistryError,
    SchemaError, ValidateError,
};
pub use loader::{load_manifest, load_manifest_str, load_payload};
pub use metadata::{MetadataReader, ModelDefinition, ModelManifest, PropertyDefinition};
pub use registry::TypeRegistry;
pub use source::{fetch_model, DataSource, FileDataSource, RequestContext, ROUTE_KEY};
pub use types::{
    json_type_name, Declaration, MixedCollectionType, ModelSchema, PrimitiveType,
    PropertyDescriptor, TypeDescriptor, TypedCollectionType, ValueType, NUMBER_TYPE,
    PRIMITIVE_TYPES, STRING_TYPE,
};
pub use validator::{to_json_schema, validate_against_schema, validate_payload};

#[cfg(feature = "remote")]
pub use source::HttpDataSource;
