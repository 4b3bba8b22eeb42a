//! Named CORS policies and their conversion into a tower-http layer.

use crate::config::{CorsConfig, CorsPolicyConfig};
use crate::error::StartupError;
use axum::http::{HeaderName, HeaderValue, Method};
use std::collections::BTreeMap;
use tower_http::cors::{AllowHeaders, AllowMethods, AllowOrigin, Any, CorsLayer, ExposeHeaders};
use tracing::info;

/// Development policy: every origin, method and header, all response headers exposed.
pub const DEVELOP_POLICY: &str = "develop";

/// Either a wildcard or an explicit list of values.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Allowance {
    Any,
    List(Vec<String>),
}

impl Allowance {
    /// `None` and lists containing `*` collapse to `Any`.
    fn from_config(values: Option<&Vec<String>>) -> Self {
        match values {
            None => Allowance::Any,
            Some(list) if list.iter().any(|v| v.trim() == "*") => Allowance::Any,
            Some(list) => Allowance::List(list.clone()),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CorsPolicy {
    pub name: String,
    pub origins: Allowance,
    pub methods: Allowance,
    pub headers: Allowance,
    pub exposed_headers: Allowance,
}

impl CorsPolicy {
    pub fn permissive(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            origins: Allowance::Any,
            methods: Allowance::Any,
            headers: Allowance::Any,
            exposed_headers: Allowance::Any,
        }
    }

    pub fn from_config(config: &CorsPolicyConfig) -> Self {
        Self {
            name: config.name.clone(),
            origins: Allowance::from_config(config.allowed_origins.as_ref()),
            methods: Allowance::from_config(config.allowed_methods.as_ref()),
            headers: Allowance::from_config(config.allowed_headers.as_ref()),
            exposed_headers: Allowance::from_config(config.exposed_headers.as_ref()),
        }
    }

    pub fn to_layer(&self) -> Result<CorsLayer, StartupError> {
        let origins = match &self.origins {
            Allowance::Any => AllowOrigin::from(Any),
            Allowance::List(values) => AllowOrigin::list(
                values
                    .iter()
                    .map(|v| parse_value(v, "origin", |s| HeaderValue::from_str(s).ok()))
                    .collect::<Result<Vec<_>, _>>()?,
            ),
        };
        let methods = match &self.methods {
            Allowance::Any => AllowMethods::from(Any),
            Allowance::List(values) => AllowMethods::list(
                values
                    .iter()
                    .map(|v| {
                        parse_value(v, "method", |s| {
                            Method::from_bytes(s.to_ascii_uppercase().as_bytes()).ok()
                        })
                    })
                    .collect::<Result<Vec<_>, _>>()?,
            ),
        };
        let headers = match &self.headers {
            Allowance::Any => AllowHeaders::from(Any),
            Allowance::List(values) => AllowHeaders::list(parse_header_names(values)?),
        };
        let exposed = match &self.exposed_headers {
            Allowance::Any => ExposeHeaders::from(Any),
            Allowance::List(values) => ExposeHeaders::list(parse_header_names(values)?),
        };

        Ok(CorsLayer::new()
            .allow_origin(origins)
            .allow_methods(methods)
            .allow_headers(headers)
            .expose_headers(exposed))
    }
}

fn parse_value<T>(
    raw: &str,
    kind: &'static str,
    parse: impl Fn(&str) -> Option<T>,
) -> Result<T, StartupError> {
    parse(raw.trim()).ok_or_else(|| StartupError::InvalidCorsValue {
        kind,
        value: raw.to_string(),
    })
}

fn parse_header_names(values: &[String]) -> Result<Vec<HeaderName>, StartupError> {
    values
        .iter()
        .map(|v| parse_value(v, "header", |s| HeaderName::from_bytes(s.as_bytes()).ok()))
        .collect()
}

/// Registry of named policies plus the one applied to the router.
#[derive(Debug, Clone)]
pub struct CorsOptions {
    policies: BTreeMap<String, CorsPolicy>,
    active: String,
}

impl CorsOptions {
    pub fn new(active: impl Into<String>) -> Self {
        Self {
            policies: BTreeMap::new(),
            active: active.into(),
        }
    }

    /// Registers `develop` and every policy declared in config.
    pub fn from_config(config: &CorsConfig) -> Result<Self, StartupError> {
        let mut options = Self::new(config.policy.clone());
        options.add_policy(CorsPolicy::permissive(DEVELOP_POLICY))?;
        for policy in &config.policies {
            options.add_policy(CorsPolicy::from_config(policy))?;
        }
        Ok(options)
    }

    pub fn add_policy(&mut self, policy: CorsPolicy) -> Result<(), StartupError> {
        if self.policies.contains_key(&policy.name) {
            return Err(StartupError::DuplicateCorsPolicy(policy.name));
        }
        info!("Registered CORS policy {}", policy.name);
        self.policies.insert(policy.name.clone(), policy);
        Ok(())
    }

    pub fn merge(&mut self, other: CorsOptions) -> Result<(), StartupError> {
        for policy in other.policies.into_values() {
            self.add_policy(policy)?;
        }
        Ok(())
    }

    pub fn policy(&self, name: &str) -> Option<&CorsPolicy> {
        self.policies.get(name)
    }

    pub fn active_policy(&self) -> &str {
        &self.active
    }

    pub fn layer(&self, name: &str) -> Result<CorsLayer, StartupError> {
        self.policy(name)
            .ok_or_else(|| StartupError::UnknownCorsPolicy(name.to_string()))?
            .to_layer()
    }

    pub fn active_layer(&self) -> Result<CorsLayer, StartupError> {
        self.layer(&self.active)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::body::Body;
    use axum::http::{header, Request, StatusCode};
    use axum::routing::get;
    use axum::Router;
    use tower::ServiceExt;

    fn app_with(layer: CorsLayer) -> Router {
        Router::new().route("/ping", get(|| async { "pong" })).layer(layer)
    }

    #[test]
    fn test_develop_policy_is_permissive() {
        let options = CorsOptions::from_config(&CorsConfig::default()).unwrap();
        let policy = options.policy(DEVELOP_POLICY).unwrap();
        assert_eq!(policy, &CorsPolicy::permissive(DEVELOP_POLICY));
        assert_eq!(options.active_policy(), DEVELOP_POLICY);
    }

    #[test]
    fn test_duplicate_policy_name_rejected() {
        let config = CorsConfig {
            policies: vec![CorsPolicyConfig {
                name: DEVELOP_POLICY.to_string(),
                allowed_origins: None,
                allowed_methods: None,
                allowed_headers: None,
                exposed_headers: None,
            }],
            ..CorsConfig::default()
        };
        let err = CorsOptions::from_config(&config).unwrap_err();
        assert!(matches!(err, StartupError::DuplicateCorsPolicy(name) if name == "develop"));
    }

    #[test]
    fn test_unknown_active_policy() {
        let config = CorsConfig {
            policy: "production".to_string(),
            ..CorsConfig::default()
        };
        let options = CorsOptions::from_config(&config).unwrap();
        assert!(matches!(
            options.active_layer(),
            Err(StartupError::UnknownCorsPolicy(_))
        ));
    }

    #[test]
    fn test_invalid_method_rejected() {
        let policy = CorsPolicy {
            methods: Allowance::List(vec!["GE T".to_string()]),
            ..CorsPolicy::permissive("broken")
        };
        assert!(matches!(
            policy.to_layer(),
            Err(StartupError::InvalidCorsValue { kind: "method", .. })
        ));
    }

    #[test]
    fn test_wildcard_in_list_means_any() {
        let config = CorsPolicyConfig {
            name: "mixed".to_string(),
            allowed_origins: Some(vec!["*".to_string()]),
            allowed_methods: Some(vec!["GET".to_string()]),
            allowed_headers: None,
            exposed_headers: None,
        };
        let policy = CorsPolicy::from_config(&config);
        assert_eq!(policy.origins, Allowance::Any);
        assert_eq!(policy.methods, Allowance::List(vec!["GET".to_string()]));
    }

    #[tokio::test]
    async fn test_preflight_from_arbitrary_origin() {
        let layer = CorsPolicy::permissive(DEVELOP_POLICY).to_layer().unwrap();
        let response = app_with(layer)
            .oneshot(
                Request::builder()
                    .uri("/ping")
                    .method("OPTIONS")
                    .header(header::ORIGIN, "https://somewhere.example.org")
                    .header(header::ACCESS_CONTROL_REQUEST_METHOD, "PATCH")
                    .header(header::ACCESS_CONTROL_REQUEST_HEADERS, "x-custom-thing")
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::OK);
        let headers = response.headers();
        assert_eq!(headers[header::ACCESS_CONTROL_ALLOW_ORIGIN], "*");
        assert_eq!(headers[header::ACCESS_CONTROL_ALLOW_METHODS], "*");
        assert_eq!(headers[header::ACCESS_CONTROL_ALLOW_HEADERS], "*");
    }

    #[tokio::test]
    async fn test_simple_request_exposes_all_headers() {
        let layer = CorsPolicy::permissive(DEVELOP_POLICY).to_layer().unwrap();
        let response = app_with(layer)
            .oneshot(
                Request::builder()
                    .uri("/ping")
                    .header(header::ORIGIN, "http://localhost:3000")
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::OK);
        let headers = response.headers();
        assert_eq!(headers[header::ACCESS_CONTROL_ALLOW_ORIGIN], "*");
        assert_eq!(headers[header::ACCESS_CONTROL_EXPOSE_HEADERS], "*");
    }

    #[tokio::test]
    async fn test_listed_origin_is_echoed() {
        let policy = CorsPolicy {
            origins: Allowance::List(vec!["https://maps.example.com".to_string()]),
            ..CorsPolicy::permissive("frontend")
        };
        let response = app_with(policy.to_layer().unwrap())
            .oneshot(
                Request::builder()
                    .uri("/ping")
                    .header(header::ORIGIN, "https://maps.example.com")
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();

        assert_eq!(
            response.headers()[header::ACCESS_CONTROL_ALLOW_ORIGIN],
            "https://maps.example.com"
        );
    }
}
