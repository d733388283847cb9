use percent_encoding::{NON_ALPHANUMERIC, utf8_percent_encode};
use std::collections::BTreeMap;
use std::sync::Arc;

/// Offered to callers that submit no pattern.
pub const SUGGESTED_PATTERN: &str =
    r"Hello,? (world|you( (fantastic|wonderful|amazing) (human|person|individual))?)[.!]";

/// Name of the route that serves generation requests.
pub const QUERY_ROUTE: &str = "query";

/// Resolves a named route plus query parameters to an absolute URL.
pub trait RouteResolver: Send + Sync {
    fn resolve(&self, route: &str, params: &[(&str, &str)]) -> Option<String>;
}

/// Read-only table of route names to paths, rooted at `base_url`.
#[derive(Debug, Clone, Default)]
pub struct RouteTable {
    base_url: String,
    routes: BTreeMap<String, String>,
}

impl RouteTable {
    pub fn new(base_url: impl Into<String>) -> Self {
        let base_url = base_url.into();
        Self {
            base_url: base_url.trim_end_matches('/').to_string(),
            routes: BTreeMap::new(),
        }
    }

    pub fn with_route(mut self, name: impl Into<String>, path: impl Into<String>) -> Self {
        self.routes.insert(name.into(), path.into());
        self
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }
}

impl RouteResolver for RouteTable {
    fn resolve(&self, route: &str, params: &[(&str, &str)]) -> Option<String> {
        let path = self.routes.get(route)?;
        let mut url = format!("{}{}", self.base_url, path);
        for (idx, (key, value)) in params.iter().enumerate() {
            url.push(if idx == 0 { '?' } else { '&' });
            url.push_str(&encode_component(key));
            url.push('=');
            url.push_str(&encode_component(value));
        }
        Some(url)
    }
}

fn encode_component(value: &str) -> String {
    utf8_percent_encode(value, NON_ALPHANUMERIC).to_string()
}

/// Example pattern together with the URL that would run it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Suggestion {
    pub pattern: String,
    pub url: String,
}

#[derive(Clone)]
pub struct SuggestionBuilder {
    resolver: Arc<dyn RouteResolver>,
}

impl SuggestionBuilder {
    pub fn new(resolver: Arc<dyn RouteResolver>) -> Self {
        Self { resolver }
    }

    /// `None` when the query route cannot be resolved, so pattern and URL
    /// are only ever exposed together.
    pub fn build(&self) -> Option<Suggestion> {
        let url = self
            .resolver
            .resolve(QUERY_ROUTE, &[("pattern", SUGGESTED_PATTERN)])?;
        Some(Suggestion {
            pattern: SUGGESTED_PATTERN.to_string(),
            url,
        })
    }

    /// Where the query form submits.
    pub fn query_route(&self) -> Option<String> {
        self.resolver.resolve(QUERY_ROUTE, &[])
    }
}
