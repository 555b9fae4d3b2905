//! Error types for schema loading, decoding, and validation.

use std::path::PathBuf;
use thiserror::Error;

/// Errors from the type registry.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum RegistryError {
    #[error("type '{name}' is already registered with a different descriptor")]
    DuplicateType { name: String },

    #[error("unknown type '{name}'")]
    UnknownType { name: String },

    #[error("type '{name}' is not a model schema")]
    NotAModel { name: String },
}

/// Errors while deriving schemas from model declarations.
///
/// Any of these aborts the whole load call.
#[derive(Debug, Error)]
pub enum LoadSchemaError {
    #[error("model '{model}' is missing its Model declaration")]
    MissingModelDeclaration { model: String },

    #[error("model '{model}' has too many Model declarations ({count})")]
    DuplicateModelDeclaration { model: String, count: usize },

    #[error("property '{property}' of model '{model}' has too many property declarations ({count}: {})", kinds.join(", "))]
    DuplicatePropertyDeclaration {
        model: String,
        property: String,
        count: usize,
        kinds: Vec<&'static str>,
    },

    #[error("property '{property}' of model '{model}' references unknown type '{type_name}'")]
    UnknownTypeReference {
        model: String,
        property: String,
        type_name: String,
    },

    #[error("model '{model}' referenced by '{referenced_by}' could not be loaded: {source}")]
    UnresolvableModel {
        model: String,
        referenced_by: String,
        #[source]
        source: Box<LoadSchemaError>,
    },

    #[error("schema name '{name}' is declared by both '{existing}' and '{model}'")]
    DuplicateSchemaName {
        name: String,
        existing: String,
        model: String,
    },

    #[error("model '{model}' maps transport name '{name}' more than once")]
    DuplicateTransportName { model: String, name: String },

    #[error("unknown model '{model}'")]
    UnknownModel { model: String },

    #[error(transparent)]
    Registry(#[from] RegistryError),
}

impl LoadSchemaError {
    /// Returns the exit code for this error type.
    pub fn exit_code(&self) -> i32 {
        2
    }

    /// The innermost error, following `UnresolvableModel` chains.
    pub fn root_cause(&self) -> &LoadSchemaError {
        match self {
            LoadSchemaError::UnresolvableModel { source, .. } => source.root_cause(),
            other => other,
        }
    }
}

/// Errors reading a model manifest.
#[derive(Debug, Error)]
pub enum ManifestError {
    #[error("file not found: {path}")]
    FileNotFound { path: PathBuf },

    #[error("cannot read {path}: {source}")]
    ReadError {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("invalid JSON: {source}")]
    InvalidJson {
        #[source]
        source: serde_json::Error,
    },
}

impl ManifestError {
    /// Returns the exit code for this error type.
    pub fn exit_code(&self) -> i32 {
        match self {
            ManifestError::FileNotFound { .. } | ManifestError::ReadError { .. } => 3,
            ManifestError::InvalidJson { .. } => 2,
        }
    }
}

/// Errors while mapping payloads onto model instances and back.
#[derive(Debug, Error)]
pub enum DecodeError {
    #[error("missing required property at {path}")]
    MissingRequiredProperty { path: String },

    #[error("type mismatch at {path}: expected {expected}, got {actual}")]
    TypeMismatch {
        path: String,
        expected: String,
        actual: String,
    },

    #[error("element at {path} has no discriminator field '{field}'")]
    MissingDiscriminator { path: String, field: String },

    #[error("element at {path} names unknown schema '{value}'")]
    UnknownDiscriminator { path: String, value: String },

    #[error("unknown property '{name}' at {path}")]
    UnknownProperty { path: String, name: String },

    #[error(transparent)]
    Registry(#[from] RegistryError),
}

impl DecodeError {
    /// Returns the exit code for this error type.
    pub fn exit_code(&self) -> i32 {
        2
    }
}

/// Errors from a data source.
#[derive(Debug, Error)]
pub enum DataSourceError {
    #[error("request context has no route")]
    MissingRoute,

    #[error("route placeholder '{{{name}}}' has no value in the request context")]
    MissingPlaceholder { name: String },

    #[error("route placeholder '{{{name}}}' has value '{value}', which is not a single path segment")]
    InvalidPlaceholder { name: String, value: String },

    #[error("route '{route}' points outside {base}")]
    OutsideBaseDir { route: String, base: PathBuf },

    #[error("not found: {location}")]
    NotFound { location: String },

    #[error("cannot read {path}: {source}")]
    ReadError {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[cfg(feature = "remote")]
    #[error("failed to fetch {url}: {source}")]
    NetworkError {
        url: String,
        #[source]
        source: reqwest::Error,
    },

    #[error("invalid JSON from {location}: {source}")]
    InvalidJson {
        location: String,
        #[source]
        source: serde_json::Error,
    },
}

impl DataSourceError {
    /// Returns the exit code for this error type.
    pub fn exit_code(&self) -> i32 {
        match self {
            DataSourceError::NotFound { .. } | DataSourceError::ReadError { .. } => 3,
            #[cfg(feature = "remote")]
            DataSourceError::NetworkError { .. } => 3,
            _ => 2,
        }
    }
}

/// Errors from fetching a payload and decoding it.
#[derive(Debug, Error)]
pub enum FetchError {
    #[error(transparent)]
    Source(#[from] DataSourceError),

    #[error(transparent)]
    Decode(#[from] DecodeError),
}

/// Errors during payload validation.
#[derive(Debug, Error)]
pub enum ValidateError {
    #[error(transparent)]
    Registry(#[from] RegistryError),

    #[error("invalid generated schema: {message}")]
    InvalidSchema { message: String },

    #[error("validation failed with {} error(s)", errors.len())]
    Invalid { errors: Vec<SchemaError> },
}

impl ValidateError {
    /// Returns the exit code for this error type.
    pub fn exit_code(&self) -> i32 {
        match self {
            ValidateError::Invalid { .. } => 1,
            _ => 2,
        }
    }
}

/// Single validation error with path context.
#[derive(Debug, Clone, serde::Serialize)]
pub struct SchemaError {
    /// JSON Pointer (RFC 6901) to the invalid field.
    pub path: String,
    /// Human-readable error message.
    pub message: String,
}

impl std::fmt::Display for SchemaError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}: {}", self.path, self.message)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn load_error_messages_name_the_model() {
        let err = LoadSchemaError::MissingModelDeclaration {
            model: "App\\Tag".into(),
        };
        assert_eq!(
            err.to_string(),
            "model 'App\\Tag' is missing its Model declaration"
        );

        let err = LoadSchemaError::DuplicateModelDeclaration {
            model: "App\\Tag".into(),
            count: 2,
        };
        assert!(err.to_string().contains("too many Model declarations (2)"));
    }

    #[test]
    fn root_cause_follows_unresolvable_chain() {
        let err = LoadSchemaError::UnresolvableModel {
            model: "B".into(),
            referenced_by: "A".into(),
            source: Box::new(LoadSchemaError::UnresolvableModel {
                model: "C".into(),
                referenced_by: "B".into(),
                source: Box::new(LoadSchemaError::MissingModelDeclaration { model: "C".into() }),
            }),
        };
        assert!(matches!(
            err.root_cause(),
            LoadSchemaError::MissingModelDeclaration { model } if model == "C"
        ));
    }

    #[test]
    fn exit_codes() {
        let err = ManifestError::FileNotFound {
            path: PathBuf::from("models.json"),
        };
        assert_eq!(err.exit_code(), 3);

        let err = ValidateError::Invalid {
            errors: vec![SchemaError {
                path: "/id".into(),
                message: "missing required field".into(),
            }],
        };
        assert_eq!(err.exit_code(), 1);

        let err = DataSourceError::MissingRoute;
        assert_eq!(err.exit_code(), 2);
    }

    #[test]
    fn placeholder_message_keeps_braces() {
        let err = DataSourceError::MissingPlaceholder { name: "id".into() };
        assert_eq!(
            err.to_string(),
            "route placeholder '{id}' has no value in the request context"
        );
    }

    #[test]
    fn schema_error_display() {
        let err = SchemaError {
            path: "/tags/0/name".into(),
            message: "expected string, got number".into(),
        };
        assert_eq!(err.to_string(), "/tags/0/name: expected string, got number");
    }
}
