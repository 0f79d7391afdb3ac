//! Page routes
//!
//! The binding engine only needs to turn a page id plus parameters into a
//! link; matching incoming urls is the router's own business. Patterns use
//! `:name` for one segment and `*name` for the rest of the path.

use std::collections::BTreeMap;

use url::{Url, form_urlencoded};

use crate::error::ConfigurationError;
use crate::value::Value;

/// Link target consumed by the `page` binder
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RouteInfo {
    /// Logical page id
    pub page: String,
    /// Path relative to the application base, always starting with `/`
    pub path: String,
    pub full_url: String,
}

/// Route errors
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum RouteError {
    #[error("Unknown page \"{0}\"")]
    UnknownPage(String),

    #[error("Page \"{page}\" takes {expected} parameter(s), got {found}")]
    MissingParams { page: String, expected: usize, found: usize },

    #[error("Page \"{page}\" takes {expected} parameter(s), got {found}")]
    SurplusParams { page: String, expected: usize, found: usize },

    #[error("Invalid base url: {0}")]
    InvalidBase(String),
}

/// Link generation capability of a router
pub trait PageRouter {
    /// Path of a page with its parameters substituted
    fn page_url(&self, page: &str, params: &[Value]) -> Result<String, RouteError>;

    /// Absolute url of a path returned by `page_url`
    fn full_url(&self, path: &str) -> String;

    fn route(&self, page: &str, params: &[Value]) -> Result<RouteInfo, RouteError> {
        let path = self.page_url(page, params)?;
        Ok(RouteInfo { page: page.to_string(), full_url: self.full_url(&path), path })
    }
}

/// Page id to path pattern table
#[derive(Debug, Clone)]
pub struct RouteTable {
    base: Url,
    pages: BTreeMap<String, String>,
}

impl RouteTable {
    /// `base` is the absolute url the application is served from
    pub fn new(base: &str) -> Result<Self, RouteError> {
        let mut base = Url::parse(base).map_err(|e| RouteError::InvalidBase(e.to_string()))?;
        if base.cannot_be_a_base() {
            return Err(RouteError::InvalidBase(base.to_string()));
        }
        if !base.path().ends_with('/') {
            let path = format!("{}/", base.path());
            base.set_path(&path);
        }
        Ok(Self { base, pages: BTreeMap::new() })
    }

    pub fn add_page(&mut self, page: &str, pattern: &str) -> Result<(), ConfigurationError> {
        if self.pages.contains_key(page) {
            return Err(ConfigurationError::DuplicatePage(page.to_string()));
        }
        self.pages.insert(page.to_string(), pattern.to_string());
        Ok(())
    }

    pub fn base(&self) -> &Url {
        &self.base
    }
}

fn is_param(segment: &str) -> bool {
    segment.starts_with(':') || segment.starts_with('*')
}

impl PageRouter for RouteTable {
    fn page_url(&self, page: &str, params: &[Value]) -> Result<String, RouteError> {
        let pattern = self.pages.get(page).ok_or_else(|| RouteError::UnknownPage(page.to_string()))?;
        let segments: Vec<&str> = pattern.split('/').filter(|s| !s.is_empty()).collect();
        let expected = segments.iter().filter(|s| is_param(s)).count();
        if params.len() < expected {
            return Err(RouteError::MissingParams { page: page.to_string(), expected, found: params.len() });
        }
        if params.len() > expected {
            return Err(RouteError::SurplusParams { page: page.to_string(), expected, found: params.len() });
        }

        // Encode through the url crate; scratch url keeps path rules intact
        let mut scratch = self.base.clone();
        scratch.set_path("/");
        {
            let Ok(mut path) = scratch.path_segments_mut() else {
                return Err(RouteError::InvalidBase(self.base.to_string()));
            };
            path.clear();
            let mut params = params.iter();
            for segment in segments {
                if !is_param(segment) {
                    path.push(segment);
                    continue;
                }
                let text = params.next().map(Value::to_display_string).unwrap_or_default();
                if segment.starts_with('*') {
                    path.extend(text.split('/').filter(|s| !s.is_empty()));
                } else {
                    path.push(&text);
                }
            }
        }
        Ok(scratch.path().to_string())
    }

    fn full_url(&self, path: &str) -> String {
        match self.base.join(path.trim_start_matches('/')) {
            Ok(url) => url.to_string(),
            Err(_) => format!("{}{}", self.base, path.trim_start_matches('/')),
        }
    }
}

/// Append url-encoded query arguments
pub fn with_query(url: &str, args: &[(&str, &str)]) -> String {
    if args.is_empty() {
        return url.to_string();
    }
    let query = form_urlencoded::Serializer::new(String::new())
        .extend_pairs(args.iter().copied())
        .finish();
    let separator = if url.contains('?') { '&' } else { '?' };
    format!("{url}{separator}{query}")
}

#[cfg(test)]
mod tests {
    use super::*;

    fn routes() -> RouteTable {
        let mut table = RouteTable::new("https://example.com/app").unwrap();
        table.add_page("home", "/").unwrap();
        table.add_page("user", "/users/:id").unwrap();
        table.add_page("docs", "/docs/*path").unwrap();
        table
    }

    #[test]
    fn test_param_substitution() {
        let table = routes();
        assert_eq!(table.page_url("home", &[]).unwrap(), "/");
        assert_eq!(table.page_url("user", &[Value::from(7)]).unwrap(), "/users/7");
        assert_eq!(table.page_url("user", &[Value::from("a b")]).unwrap(), "/users/a%20b");
        assert_eq!(table.page_url("docs", &[Value::from("guide/intro")]).unwrap(), "/docs/guide/intro");
    }

    #[test]
    fn test_route_info() {
        let route = routes().route("user", &[Value::from(7)]).unwrap();
        assert_eq!(route.page, "user");
        assert_eq!(route.path, "/users/7");
        assert_eq!(route.full_url, "https://example.com/app/users/7");
    }

    #[test]
    fn test_param_count_errors() {
        let table = routes();
        assert_eq!(
            table.page_url("user", &[]),
            Err(RouteError::MissingParams { page: "user".into(), expected: 1, found: 0 })
        );
        assert!(matches!(table.page_url("home", &[Value::from(1)]), Err(RouteError::SurplusParams { .. })));
        assert_eq!(table.page_url("nope", &[]), Err(RouteError::UnknownPage("nope".into())));
    }

    #[test]
    fn test_duplicate_page() {
        let mut table = routes();
        assert_eq!(table.add_page("home", "/again"), Err(ConfigurationError::DuplicatePage("home".into())));
    }

    #[test]
    fn test_with_query() {
        assert_eq!(with_query("/search", &[("q", "a b"), ("page", "2")]), "/search?q=a+b&page=2");
        assert_eq!(with_query("/search?x=1", &[("y", "&")]), "/search?x=1&y=%26");
        assert_eq!(with_query("/plain", &[]), "/plain");
    }
}
