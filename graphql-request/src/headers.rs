//! Header configuration and resolution.

use http::header::{HeaderName, HeaderValue};
use http::HeaderMap;
use std::collections::HashMap;
use std::sync::Arc;

use crate::{GraphQLError, Result};

/// Accept header name.
pub const ACCEPT_HEADER: &str = "accept";
/// Content-Type header name.
pub const CONTENT_TYPE_HEADER: &str = "content-type";
/// Generic JSON media type.
pub const CONTENT_TYPE_JSON: &str = "application/json";
/// GraphQL-over-HTTP response media type.
pub const CONTENT_TYPE_GQL: &str = "application/graphql-response+json";

/// Headers in any of the accepted shapes.
#[derive(Debug, Clone)]
pub enum HeadersInit {
    /// Name to value map.
    Map(HashMap<String, String>),
    /// Ordered name/value pairs. Pairs with an empty name are skipped.
    Pairs(Vec<(String, String)>),
    /// A ready header collection.
    Headers(HeaderMap),
}

impl HeadersInit {
    /// Insert every header into `target`, replacing existing values of the same name.
    pub fn apply_to(&self, target: &mut HeaderMap) -> Result<()> {
        match self {
            Self::Map(map) => {
                for (name, value) in map {
                    target.insert(header_name(name)?, header_value(value)?);
                }
            }
            Self::Pairs(pairs) => {
                for (name, value) in pairs.iter().filter(|(name, _)| !name.is_empty()) {
                    target.insert(header_name(name)?, header_value(value)?);
                }
            }
            Self::Headers(headers) => {
                for name in headers.keys() {
                    target.remove(name);
                }
                for (name, value) in headers {
                    target.append(name.clone(), value.clone());
                }
            }
        }
        Ok(())
    }

    /// Convert into a header collection.
    pub fn to_header_map(&self) -> Result<HeaderMap> {
        let mut headers = HeaderMap::new();
        self.apply_to(&mut headers)?;
        Ok(headers)
    }

    /// Set a single header, replacing any existing value.
    pub fn set(&mut self, name: impl Into<String>, value: impl Into<String>) -> Result<()> {
        let name = name.into();
        let value = value.into();
        let parsed_name = header_name(&name)?;
        let parsed_value = header_value(&value)?;
        match self {
            Self::Map(map) => {
                map.retain(|existing, _| !existing.eq_ignore_ascii_case(&name));
                map.insert(name, value);
            }
            Self::Pairs(pairs) => {
                pairs.retain(|(existing, _)| !existing.eq_ignore_ascii_case(&name));
                pairs.push((name, value));
            }
            Self::Headers(headers) => {
                headers.insert(parsed_name, parsed_value);
            }
        }
        Ok(())
    }
}

impl Default for HeadersInit {
    fn default() -> Self {
        Self::Map(HashMap::new())
    }
}

impl From<HashMap<String, String>> for HeadersInit {
    fn from(map: HashMap<String, String>) -> Self {
        Self::Map(map)
    }
}

impl From<Vec<(String, String)>> for HeadersInit {
    fn from(pairs: Vec<(String, String)>) -> Self {
        Self::Pairs(pairs)
    }
}

impl<const N: usize> From<[(&str, &str); N]> for HeadersInit {
    fn from(pairs: [(&str, &str); N]) -> Self {
        Self::Pairs(
            pairs
                .into_iter()
                .map(|(name, value)| (name.to_string(), value.to_string()))
                .collect(),
        )
    }
}

impl From<HeaderMap> for HeadersInit {
    fn from(headers: HeaderMap) -> Self {
        Self::Headers(headers)
    }
}

/// Producer re-evaluated on every call.
pub type HeadersProducer = Arc<dyn Fn() -> HeadersInit + Send + Sync>;

/// Client-level headers: a fixed value or a producer.
#[derive(Clone)]
pub enum HeadersConfig {
    /// Same headers for every call.
    Static(HeadersInit),
    /// Headers computed at call time.
    Producer(HeadersProducer),
}

impl HeadersConfig {
    /// Create a producer configuration from a closure.
    pub fn producer<F>(f: F) -> Self
    where
        F: Fn() -> HeadersInit + Send + Sync + 'static,
    {
        Self::Producer(Arc::new(f))
    }

    /// Resolve the headers for one call.
    pub fn resolve(&self) -> HeadersInit {
        match self {
            Self::Static(init) => init.clone(),
            Self::Producer(produce) => produce(),
        }
    }

    /// Set a single header on every subsequent call.
    ///
    /// For a producer the header is layered on top of whatever it returns.
    pub fn set(&mut self, name: impl Into<String>, value: impl Into<String>) -> Result<()> {
        let name = name.into();
        let value = value.into();
        match self {
            Self::Static(init) => init.set(name, value),
            Self::Producer(produce) => {
                header_name(&name)?;
                header_value(&value)?;
                let inner = Arc::clone(produce);
                *self = Self::producer(move || {
                    let mut init = inner();
                    // Name and value were validated above.
                    let _ = init.set(name.clone(), value.clone());
                    init
                });
                Ok(())
            }
        }
    }
}

impl Default for HeadersConfig {
    fn default() -> Self {
        Self::Static(HeadersInit::default())
    }
}

impl std::fmt::Debug for HeadersConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Static(init) => f.debug_tuple("Static").field(init).finish(),
            Self::Producer(_) => f.write_str("Producer(..)"),
        }
    }
}

impl From<HeadersInit> for HeadersConfig {
    fn from(init: HeadersInit) -> Self {
        Self::Static(init)
    }
}

impl From<HashMap<String, String>> for HeadersConfig {
    fn from(map: HashMap<String, String>) -> Self {
        Self::Static(map.into())
    }
}

impl From<Vec<(String, String)>> for HeadersConfig {
    fn from(pairs: Vec<(String, String)>) -> Self {
        Self::Static(pairs.into())
    }
}

impl<const N: usize> From<[(&str, &str); N]> for HeadersConfig {
    fn from(pairs: [(&str, &str); N]) -> Self {
        Self::Static(pairs.into())
    }
}

impl From<HeaderMap> for HeadersConfig {
    fn from(headers: HeaderMap) -> Self {
        Self::Static(headers.into())
    }
}

/// Merge client defaults with per-call headers; per-call values win.
pub(crate) fn resolve_headers(
    defaults: Option<&HeadersConfig>,
    request_headers: Option<&HeadersInit>,
) -> Result<HeaderMap> {
    let mut headers = HeaderMap::new();
    if let Some(defaults) = defaults {
        defaults.resolve().apply_to(&mut headers)?;
    }
    if let Some(request_headers) = request_headers {
        request_headers.apply_to(&mut headers)?;
    }
    Ok(headers)
}

fn header_name(name: &str) -> Result<HeaderName> {
    HeaderName::try_from(name)
        .map_err(|e| GraphQLError::InvalidArgument(format!("invalid header name `{}`: {}", name, e)))
}

fn header_value(value: &str) -> Result<HeaderValue> {
    HeaderValue::try_from(value)
        .map_err(|e| GraphQLError::InvalidArgument(format!("invalid header value: {}", e)))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    #[test]
    fn test_pairs_skip_empty_names() {
        let init = HeadersInit::Pairs(vec![
            ("x-a".to_string(), "1".to_string()),
            (String::new(), "ignored".to_string()),
        ]);
        let headers = init.to_header_map().unwrap();
        assert_eq!(headers.len(), 1);
        assert_eq!(headers.get("X-A").unwrap(), "1");
    }

    #[test]
    fn test_invalid_header_name_is_rejected() {
        let init = HeadersInit::from([("bad header", "1")]);
        assert!(matches!(
            init.to_header_map(),
            Err(GraphQLError::InvalidArgument(_))
        ));
    }

    #[test]
    fn test_request_headers_override_defaults() {
        let defaults = HeadersConfig::from([("authorization", "a"), ("x-client", "c")]);
        let request = HeadersInit::from([("Authorization", "b")]);
        let headers = resolve_headers(Some(&defaults), Some(&request)).unwrap();
        assert_eq!(headers.get("authorization").unwrap(), "b");
        assert_eq!(headers.get("x-client").unwrap(), "c");
    }

    #[test]
    fn test_producer_is_evaluated_per_call() {
        let calls = Arc::new(AtomicUsize::new(0));
        let counter = Arc::clone(&calls);
        let config = HeadersConfig::producer(move || {
            let n = counter.fetch_add(1, Ordering::SeqCst) + 1;
            HeadersInit::Pairs(vec![("x-call".to_string(), n.to_string())])
        });

        let first = resolve_headers(Some(&config), None).unwrap();
        let second = resolve_headers(Some(&config), None).unwrap();
        assert_eq!(first.get("x-call").unwrap(), "1");
        assert_eq!(second.get("x-call").unwrap(), "2");
        assert_eq!(calls.load(Ordering::SeqCst), 2);
    }

    #[test]
    fn test_set_header_on_each_shape() {
        let mut config = HeadersConfig::from([("X-Token", "old")]);
        config.set("x-token", "new").unwrap();
        let headers = resolve_headers(Some(&config), None).unwrap();
        assert_eq!(headers.get_all("x-token").iter().count(), 1);
        assert_eq!(headers.get("x-token").unwrap(), "new");

        let mut config = HeadersConfig::producer(|| HeadersInit::from([("x-a", "1")]));
        config.set("x-b", "2").unwrap();
        let headers = resolve_headers(Some(&config), None).unwrap();
        assert_eq!(headers.get("x-a").unwrap(), "1");
        assert_eq!(headers.get("x-b").unwrap(), "2");

        let mut config = HeadersConfig::from(HeaderMap::new());
        assert!(config.set("bad header", "1").is_err());
    }

    #[test]
    fn test_set_rejects_invalid_header_on_every_shape() {
        let mut map = HeadersInit::default();
        assert!(map.set("bad header", "1").is_err());
        assert!(map.set("x-ok", "bad\nvalue").is_err());
        assert!(map.to_header_map().unwrap().is_empty());

        let mut pairs = HeadersInit::from(vec![("x-a".to_string(), "1".to_string())]);
        assert!(pairs.set("bad header", "1").is_err());
        assert_eq!(pairs.to_header_map().unwrap().len(), 1);

        let mut config = HeadersConfig::from([("x-a", "1")]);
        assert!(config.set("bad header", "1").is_err());
        assert!(resolve_headers(Some(&config), None).is_ok());
    }
}
