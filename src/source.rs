//! Data sources - where transport payloads come from.
//!
//! A [`DataSource`] turns a request context (a route plus named parameters)
//! into a raw JSON payload. Pair it with a loaded registry through
//! [`fetch_model`] to get a decoded model instance.

use std::collections::BTreeMap;
use std::path::{Component, Path, PathBuf};

use serde_json::Value;
use tracing::debug;

use crate::codec::{decode, DecodeOptions, ModelInstance};
use crate::error::{DataSourceError, FetchError};
use crate::registry::TypeRegistry;

#[cfg(feature = "remote")]
use std::time::Duration;

/// Default timeout for HTTP requests (10 seconds).
#[cfg(feature = "remote")]
const HTTP_TIMEOUT: Duration = Duration::from_secs(10);

/// Context key holding the route template.
pub const ROUTE_KEY: &str = "route";

/// Key-value description of a request.
///
/// The `route` entry is a template such as `/articles/{id}`. Every other
/// entry can fill a `{placeholder}` in it.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RequestContext {
    values: BTreeMap<String, String>,
}

impl RequestContext {
    pub fn new(route: impl Into<String>) -> Self {
        let mut values = BTreeMap::new();
        values.insert(ROUTE_KEY.to_string(), route.into());
        Self { values }
    }

    /// Build a context from an arbitrary map. It may lack a route.
    pub fn from_map(values: BTreeMap<String, String>) -> Self {
        Self { values }
    }

    /// Builder-style parameter setter.
    pub fn with(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.values.insert(key.into(), value.into());
        self
    }

    pub fn get(&self, key: &str) -> Option<&str> {
        self.values.get(key).map(String::as_str)
    }

    /// The route with every `{placeholder}` substituted.
    ///
    /// Each value must be a single path segment: no `/` or `\`, and not
    /// `.` or `..`.
    ///
    /// # Errors
    ///
    /// Returns `DataSourceError::MissingRoute` if there is no route,
    /// `DataSourceError::MissingPlaceholder` for a placeholder with no value,
    /// or `DataSourceError::InvalidPlaceholder` for a value that is not a
    /// single segment.
    pub fn resolve_route(&self) -> Result<String, DataSourceError> {
        self.substitute(str::to_string)
    }

    /// Substitute placeholders, passing each checked value through `encode`.
    fn substitute(&self, encode: impl Fn(&str) -> String) -> Result<String, DataSourceError> {
        let route = self.get(ROUTE_KEY).ok_or(DataSourceError::MissingRoute)?;

        let mut out = String::with_capacity(route.len());
        let mut rest = route;
        while let Some(open) = rest.find('{') {
            let Some(close) = rest[open..].find('}') else {
                break;
            };
            let name = &rest[open + 1..open + close];
            let value = self
                .values
                .get(name)
                .filter(|_| name != ROUTE_KEY)
                .ok_or_else(|| DataSourceError::MissingPlaceholder {
                    name: name.to_string(),
                })?;
            if value == "." || value == ".." || value.contains(['/', '\\']) {
                return Err(DataSourceError::InvalidPlaceholder {
                    name: name.to_string(),
                    value: value.clone(),
                });
            }
            out.push_str(&rest[..open]);
            out.push_str(&encode(value));
            rest = &rest[open + close + 1..];
        }
        out.push_str(rest);
        Ok(out)
    }
}

/// Fetches raw transport payloads.
pub trait DataSource {
    /// Fetch the payload addressed by `context`.
    fn request_url(&self, context: &RequestContext) -> Result<Value, DataSourceError>;
}

/// Serves payloads from JSON files under a base directory.
///
/// Routes that climb out of the base directory are rejected.
#[derive(Debug, Clone)]
pub struct FileDataSource {
    base_dir: PathBuf,
}

impl FileDataSource {
    pub fn new(base_dir: impl Into<PathBuf>) -> Self {
        Self {
            base_dir: base_dir.into(),
        }
    }
}

impl DataSource for FileDataSource {
    fn request_url(&self, context: &RequestContext) -> Result<Value, DataSourceError> {
        let route = context.resolve_route()?;
        let relative = Path::new(route.trim_start_matches('/'));
        if !relative
            .components()
            .all(|c| matches!(c, Component::Normal(_) | Component::CurDir))
        {
            return Err(DataSourceError::OutsideBaseDir {
                route: route.clone(),
                base: self.base_dir.clone(),
            });
        }
        let path = self.base_dir.join(relative);
        debug!(path = %path.display(), "reading payload");

        if !path.is_file() {
            return Err(DataSourceError::NotFound {
                location: path.display().to_string(),
            });
        }
        let content = std::fs::read_to_string(&path).map_err(|source| {
            DataSourceError::ReadError {
                path: path.clone(),
                source,
            }
        })?;
        serde_json::from_str(&content).map_err(|source| DataSourceError::InvalidJson {
            location: path.display().to_string(),
            source,
        })
    }
}

/// Fetches payloads over HTTP with blocking GET requests.
///
/// Placeholder values are percent-encoded before they enter the URL.
///
/// Requires the `remote` feature (enabled by default).
#[cfg(feature = "remote")]
#[derive(Debug, Clone)]
pub struct HttpDataSource {
    base_url: String,
    client: reqwest::blocking::Client,
}

#[cfg(feature = "remote")]
impl HttpDataSource {
    /// Create a source that resolves routes against `base_url`.
    ///
    /// # Errors
    ///
    /// Returns `DataSourceError::NetworkError` if the HTTP client cannot be built.
    pub fn new(base_url: impl Into<String>) -> Result<Self, DataSourceError> {
        let base_url = base_url.into();
        let client = reqwest::blocking::Client::builder()
            .timeout(HTTP_TIMEOUT)
            .build()
            .map_err(|source| DataSourceError::NetworkError {
                url: base_url.clone(),
                source,
            })?;
        Ok(Self { base_url, client })
    }

    /// Full URL for a resolved route.
    pub fn url_for(&self, route: &str) -> String {
        format!(
            "{}/{}",
            self.base_url.trim_end_matches('/'),
            route.trim_start_matches('/')
        )
    }

    fn url_for_context(&self, context: &RequestContext) -> Result<String, DataSourceError> {
        let route = context.substitute(|value| urlencoding::encode(value).into_owned())?;
        Ok(self.url_for(&route))
    }
}

#[cfg(feature = "remote")]
impl DataSource for HttpDataSource {
    fn request_url(&self, context: &RequestContext) -> Result<Value, DataSourceError> {
        let url = self.url_for_context(context)?;
        debug!(url = %url, "fetching payload");

        let network_error = |source: reqwest::Error| DataSourceError::NetworkError {
            url: url.clone(),
            source,
        };

        let response = self.client.get(&url).send().map_err(network_error)?;

        if response.status() == reqwest::StatusCode::NOT_FOUND {
            return Err(DataSourceError::NotFound {
                location: url.clone(),
            });
        }

        // Check for HTTP errors before parsing
        let response = response.error_for_status().map_err(network_error)?;
        response.json().map_err(network_error)
    }
}

/// Fetch a payload and decode it as the model `type_name`.
///
/// # Errors
///
/// Returns `FetchError::Source` if the fetch fails, or `FetchError::Decode`
/// if the payload does not fit the schema.
pub fn fetch_model<S: DataSource + ?Sized>(
    source: &S,
    registry: &TypeRegistry,
    type_name: &str,
    context: &RequestContext,
    options: &DecodeOptions,
) -> Result<ModelInstance, FetchError> {
    let payload = source.request_url(context)?;
    Ok(decode(registry, type_name, &payload, options)?)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn resolve_route_substitutes_placeholders() {
        let context = RequestContext::new("/articles/{id}/tags/{tag}.json")
            .with("id", "7")
            .with("tag", "rust");
        assert_eq!(context.resolve_route().unwrap(), "/articles/7/tags/rust.json");
    }

    #[test]
    fn resolve_route_without_placeholders() {
        let context = RequestContext::new("/tags.json");
        assert_eq!(context.resolve_route().unwrap(), "/tags.json");
    }

    #[test]
    fn resolve_route_missing_placeholder() {
        let context = RequestContext::new("/articles/{id}");
        assert!(matches!(
            context.resolve_route(),
            Err(DataSourceError::MissingPlaceholder { name }) if name == "id"
        ));
    }

    #[test]
    fn resolve_route_leaves_unclosed_brace() {
        let context = RequestContext::new("/odd/{path");
        assert_eq!(context.resolve_route().unwrap(), "/odd/{path");
    }

    #[test]
    fn route_cannot_reference_itself() {
        let context = RequestContext::new("/{route}");
        assert!(matches!(
            context.resolve_route(),
            Err(DataSourceError::MissingPlaceholder { .. })
        ));
    }

    #[test]
    fn resolve_route_rejects_values_that_are_not_one_segment() {
        for value in ["../secret", "a/b", "a\\b", "..", "."] {
            let context = RequestContext::new("/tags/{id}.json").with("id", value);
            assert!(
                matches!(
                    context.resolve_route(),
                    Err(DataSourceError::InvalidPlaceholder { ref name, .. }) if name == "id"
                ),
                "accepted {value:?}"
            );
        }

        let context = RequestContext::new("/tags/{id}.json").with("id", "v1..2");
        assert_eq!(context.resolve_route().unwrap(), "/tags/v1..2.json");
    }

    #[test]
    fn missing_route() {
        let context = RequestContext::from_map(BTreeMap::new());
        assert!(matches!(
            context.resolve_route(),
            Err(DataSourceError::MissingRoute)
        ));
    }

    #[test]
    fn file_source_reads_relative_to_base() {
        let dir = tempfile::TempDir::new().unwrap();
        std::fs::write(dir.path().join("tag-1.json"), r#"{"id": 1}"#).unwrap();
        let source = FileDataSource::new(dir.path());

        let payload = source
            .request_url(&RequestContext::new("/tag-{id}.json").with("id", "1"))
            .unwrap();
        assert_eq!(payload["id"], 1);

        let err = source
            .request_url(&RequestContext::new("/tag-2.json"))
            .unwrap_err();
        assert!(matches!(err, DataSourceError::NotFound { .. }));
    }

    #[test]
    fn file_source_stays_inside_base() {
        let dir = tempfile::TempDir::new().unwrap();
        std::fs::create_dir(dir.path().join("payloads")).unwrap();
        std::fs::write(dir.path().join("secret.json"), r#"{"secret": true}"#).unwrap();
        let source = FileDataSource::new(dir.path().join("payloads"));

        let err = source
            .request_url(&RequestContext::new("/{id}.json").with("id", "../secret"))
            .unwrap_err();
        assert!(matches!(err, DataSourceError::InvalidPlaceholder { .. }));

        let err = source
            .request_url(&RequestContext::new("/../secret.json"))
            .unwrap_err();
        assert!(matches!(err, DataSourceError::OutsideBaseDir { .. }));
        assert_eq!(err.exit_code(), 2);
    }

    #[cfg(feature = "remote")]
    mod remote {
        use super::*;

        #[test]
        fn url_for_joins_with_single_slash() {
            let source = HttpDataSource::new("http://localhost:8080/api/").unwrap();
            assert_eq!(source.url_for("/tags"), "http://localhost:8080/api/tags");
        }

        #[test]
        fn placeholder_values_are_percent_encoded() {
            let source = HttpDataSource::new("http://h/api").unwrap();
            let context = RequestContext::new("/tags/{id}").with("id", "1?admin=1#x");
            assert_eq!(
                source.url_for_context(&context).unwrap(),
                "http://h/api/tags/1%3Fadmin%3D1%23x"
            );
        }

        #[test]
        fn http_source_fetches_json() {
            let mut server = mockito::Server::new();
            let mock = server
                .mock("GET", "/tags/3")
                .with_status(200)
                .with_header("content-type", "application/json")
                .with_body(r#"{"id": 3, "name": "rust"}"#)
                .create();

            let source = HttpDataSource::new(server.url()).unwrap();
            let payload = source
                .request_url(&RequestContext::new("/tags/{id}").with("id", "3"))
                .unwrap();

            mock.assert();
            assert_eq!(payload["name"], "rust");
        }

        #[test]
        fn http_source_maps_404_to_not_found() {
            let mut server = mockito::Server::new();
            server.mock("GET", "/tags/9").with_status(404).create();

            let source = HttpDataSource::new(server.url()).unwrap();
            let err = source
                .request_url(&RequestContext::new("/tags/9"))
                .unwrap_err();
            assert!(matches!(err, DataSourceError::NotFound { .. }));
        }

        #[test]
        fn http_source_reports_server_errors() {
            let mut server = mockito::Server::new();
            server.mock("GET", "/tags").with_status(500).create();

            let source = HttpDataSource::new(server.url()).unwrap();
            let err = source
                .request_url(&RequestContext::new("/tags"))
                .unwrap_err();
            assert_eq!(err.exit_code(), 3);
            assert!(matches!(err, DataSourceError::NetworkError { .. }));
        }
    }
}
