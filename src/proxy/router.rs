//! Table-driven route resolution: inbound prefix -> upstream base URLs.

use axum::http::{HeaderName, HeaderValue};

use crate::config::{ApiVersionHeader, RouteConfig};
use crate::proxy::transform::ResponseTransform;

/// A configured route with its prefix normalized and header names parsed.
#[derive(Debug, Clone)]
pub struct Route {
    pub name: String,
    /// Normalized: leading `/`, no trailing `/`; empty for a catch-all route.
    pub prefix: String,
    pub primary_url: String,
    pub secondary_url: Option<String>,
    pub api_version_header: Option<(HeaderName, HeaderValue)>,
    pub forward_headers: Vec<HeaderName>,
    pub transform: ResponseTransform,
}

impl Route {
    pub fn from_config(config: &RouteConfig) -> Result<Self, String> {
        let api_version_header = match &config.api_version_header {
            Some(ApiVersionHeader { name, value }) => {
                let value = HeaderValue::from_str(value).map_err(|e| {
                    format!(
                        "Route '{}': invalid value for header '{}': {}",
                        config.name, name, e
                    )
                })?;
                Some((parse_header(&config.name, name)?, value))
            }
            None => None,
        };
        let forward_headers = config
            .forward_headers
            .iter()
            .map(|h| parse_header(&config.name, h))
            .collect::<Result<Vec<_>, _>>()?;

        Ok(Route {
            name: config.name.clone(),
            prefix: normalize_prefix(&config.prefix),
            primary_url: config.primary_url.clone(),
            secondary_url: config.secondary_url.clone(),
            api_version_header,
            forward_headers,
            transform: config.transform.clone(),
        })
    }

    /// Strips the prefix from `path`. `None` when the path is not under this route.
    pub fn rewrite<'a>(&self, path: &'a str) -> Option<&'a str> {
        let rest = path.strip_prefix(self.prefix.as_str())?;
        if rest.is_empty() {
            Some("/")
        } else if rest.starts_with('/') {
            Some(rest)
        } else {
            None
        }
    }

    pub fn primary_target(&self, rest: &str, query: Option<&str>) -> String {
        target_url(&self.primary_url, rest, query)
    }

    pub fn secondary_target(&self, rest: &str, query: Option<&str>) -> Option<String> {
        self.secondary_url
            .as_deref()
            .map(|base| target_url(base, rest, query))
    }
}

fn parse_header(route: &str, name: &str) -> Result<HeaderName, String> {
    HeaderName::from_bytes(name.as_bytes())
        .map_err(|e| format!("Route '{}': invalid header name '{}': {}", route, name, e))
}

fn normalize_prefix(prefix: &str) -> String {
    let trimmed = prefix.trim().trim_end_matches('/');
    if trimmed.is_empty() || trimmed.starts_with('/') {
        trimmed.to_string()
    } else {
        format!("/{}", trimmed)
    }
}

/// Joins a base URL with an already-rewritten path and the raw query string.
pub fn target_url(base: &str, rest: &str, query: Option<&str>) -> String {
    let mut url = format!("{}{}", base.trim_end_matches('/'), rest);
    if let Some(q) = query.filter(|q| !q.is_empty()) {
        url.push('?');
        url.push_str(q);
    }
    url
}

/// All routes, longest prefix first.
#[derive(Debug, Clone, Default)]
pub struct RouteTable {
    routes: Vec<Route>,
}

impl RouteTable {
    pub fn new(configs: &[RouteConfig]) -> Result<Self, String> {
        let mut routes = configs
            .iter()
            .map(Route::from_config)
            .collect::<Result<Vec<_>, _>>()?;
        routes.sort_by(|a, b| b.prefix.len().cmp(&a.prefix.len()));
        Ok(RouteTable { routes })
    }

    /// Finds the most specific route for `path` and the path left after its prefix.
    pub fn resolve<'a>(&self, path: &'a str) -> Option<(&Route, &'a str)> {
        self.routes
            .iter()
            .find_map(|route| route.rewrite(path).map(|rest| (route, rest)))
    }

    pub fn routes(&self) -> &[Route] {
        &self.routes
    }
}
