//! Startup registration of CORS, API documentation and localization.
//!
//! Each `add_*` call runs once while the process starts. Any failure is a
//! [`StartupError`] and the service does not come up.

use crate::config::AppConfig;
use crate::cors::CorsOptions;
use crate::docs::{executable_dir, ApiDocs, XmlComments};
use crate::error::StartupError;
use crate::localization::{Culture, Localization, NumberFormat, StringLocalizer};
use crate::observability::AppMetrics;
use crate::routes::{create_router, AppState, ROUTE_PATHS};
use axum::Router;
use std::sync::Arc;
use tower_http::trace::TraceLayer;
use tracing::info;
use utoipa_swagger_ui::SwaggerUi;

pub struct ServiceCollection {
    config: AppConfig,
    cors: Option<CorsOptions>,
    /// Validated UI mount path and the generated document
    docs: Option<(String, utoipa::openapi::OpenApi)>,
    localization: Option<Arc<Localization>>,
}

impl ServiceCollection {
    pub fn new(config: AppConfig) -> Self {
        Self {
            config,
            cors: None,
            docs: None,
            localization: None,
        }
    }

    pub fn config(&self) -> &AppConfig {
        &self.config
    }

    /// Registers the `develop` policy plus configured ones. Registering twice
    /// fails on the duplicate `develop` name.
    pub fn add_cors_service(mut self) -> Result<Self, StartupError> {
        let registered = CorsOptions::from_config(&self.config.cors)?;
        let options = match self.cors.take() {
            Some(mut existing) => {
                existing.merge(registered)?;
                existing
            }
            None => registered,
        };
        options.active_layer()?;
        info!("CORS enabled with policy {}", options.active_policy());
        self.cors = Some(options);
        Ok(self)
    }

    pub fn add_swagger_service(mut self) -> Result<Self, StartupError> {
        if !self.config.docs.enabled {
            info!("API documentation disabled");
            return Ok(self);
        }

        let ui_path = ui_mount_path(&self.config.docs.ui_path)?;
        let dir = match &self.config.docs.comments_dir {
            Some(dir) => dir.clone(),
            None => executable_dir()?,
        };
        let comments = XmlComments::load_optional(&dir)?;
        let openapi = ApiDocs::generate(comments.as_ref());
        info!(
            "API documentation {} {} generated with {} paths",
            openapi.info.title,
            openapi.info.version,
            openapi.paths.paths.len()
        );
        self.docs = Some((ui_path, openapi));
        Ok(self)
    }

    pub fn add_localization_service(mut self) -> Result<Self, StartupError> {
        let localization = Localization::from_config(&self.config.localization)?;
        info!(
            "Localization enabled, default culture {} with {} supported",
            localization.default_culture().name,
            localization.supported().len()
        );
        self.localization = Some(Arc::new(localization));
        Ok(self)
    }

    /// Composes routes, documentation UI, CORS and request tracing.
    pub fn build(self) -> Result<Router, StartupError> {
        let localization = match self.localization {
            Some(localization) => localization,
            None => {
                let default = Culture::new("en")?.with_number_format(NumberFormat::from_override(
                    &self.config.localization.number_format,
                ));
                Arc::new(Localization::new(default, Vec::new(), StringLocalizer::default()))
            }
        };

        let state = AppState {
            metrics: Arc::new(AppMetrics::new()),
            localization,
            docs_enabled: self.docs.is_some(),
        };
        let mut app = create_router(state);

        if let Some((ui_path, openapi)) = self.docs {
            let spec_url = format!("{}/{}/swagger.json", ui_path, crate::docs::API_VERSION);
            info!("Swagger UI at {} serving {}", ui_path, spec_url);
            app = app.merge(SwaggerUi::new(ui_path).url(spec_url, openapi));
        }

        if let Some(cors) = &self.cors {
            app = app.layer(cors.active_layer()?);
        }

        Ok(app.layer(TraceLayer::new_for_http()))
    }
}

/// Normalises the Swagger UI mount path: a leading `/`, no trailing `/`,
/// no characters axum would read as route parameters, and no overlap with
/// the application's own routes.
fn ui_mount_path(raw: &str) -> Result<String, StartupError> {
    let path = raw.trim().trim_end_matches('/');
    let valid = path.len() > 1
        && path.starts_with('/')
        && !path.contains("//")
        && !path
            .chars()
            .any(|c| c.is_whitespace() || matches!(c, '{' | '}' | '*' | ':'))
        && !ROUTE_PATHS.iter().any(|route| {
            *route == path || route.starts_with(&format!("{path}/"))
        });
    if !valid {
        return Err(StartupError::InvalidUiPath(raw.to_string()));
    }
    Ok(path.to_string())
}

/// The standard startup sequence.
pub fn build_app(config: AppConfig) -> Result<Router, StartupError> {
    ServiceCollection::new(config)
        .add_cors_service()?
        .add_swagger_service()?
        .add_localization_service()?
        .build()
}
