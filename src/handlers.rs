use crate::error::{AppError, AppResult};
use crate::localization::{Localization, RequestCulture, MAX_DECIMAL_DIGITS};
use crate::observability::AppMetrics;
use crate::types::{CultureInfo, CultureList, FormatQuery, FormattedNumber, LocalizedString};
use axum::{
    extract::{Path, Query, State},
    response::Json,
};
use std::sync::Arc;
use tracing::info;

/// Format a number using the request culture.
///
/// The culture comes from `Accept-Language`, falling back to the service default.
#[utoipa::path(
    get,
    path = "/api/numbers/{value}/format",
    params(
        ("value" = f64, Path, description = "Number to format"),
        FormatQuery
    ),
    responses(
        (status = 200, description = "Formatted number", body = FormattedNumber),
        (status = 400, description = "Bad request")
    ),
    tag = "Localization"
)]
pub async fn format_number(
    State(metrics): State<Arc<AppMetrics>>,
    RequestCulture(culture): RequestCulture,
    Path(value): Path<f64>,
    Query(query): Query<FormatQuery>,
) -> AppResult<Json<FormattedNumber>> {
    if let Some(digits) = query.digits {
        if digits > MAX_DECIMAL_DIGITS {
            return Err(AppError::InvalidInput(format!(
                "digits must be between 0 and {}, got {}",
                MAX_DECIMAL_DIGITS, digits
            )));
        }
    }

    let formatted = culture.number_format.format(value, query.digits);
    metrics.increment_formatting().await;
    info!("Formatted {} as {:?} for culture {}", value, formatted, culture.name);

    Ok(Json(FormattedNumber {
        value,
        formatted,
        culture: culture.name.to_string(),
    }))
}

#[utoipa::path(
    get,
    path = "/api/localization/cultures",
    responses((status = 200, description = "Supported cultures", body = CultureList)),
    tag = "Localization"
)]
pub async fn list_cultures(
    State(localization): State<Arc<Localization>>,
    RequestCulture(culture): RequestCulture,
) -> Json<CultureList> {
    Json(CultureList {
        default_culture: localization.default_culture().name.to_string(),
        request_culture: culture.name.to_string(),
        supported: localization.supported().iter().map(CultureInfo::from).collect(),
    })
}

/// Look up a localized string
#[utoipa::path(
    get,
    path = "/api/localization/strings/{key}",
    params(("key" = String, Path, description = "Resource key")),
    responses((status = 200, description = "Localized string", body = LocalizedString)),
    tag = "Localization"
)]
pub async fn localized_string(
    State(localization): State<Arc<Localization>>,
    RequestCulture(culture): RequestCulture,
    Path(key): Path<String>,
) -> Json<LocalizedString> {
    let text = localization.localize(&key, &culture);
    Json(LocalizedString {
        resource_found: text.resource_found(),
        source_culture: text.source_culture.map(|c| c.to_string()),
        value: text.value,
        culture: culture.name.to_string(),
        key,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::LocalizationConfig;
    use crate::localization::{CultureName, StringLocalizer};
    use crate::routes::{create_router, AppState};
    use axum::body::Body;
    use axum::http::{header, Request, StatusCode};
    use axum::Router;
    use http_body_util::BodyExt;
    use tower::ServiceExt;

    fn test_app(localization: Localization) -> (Router, Arc<AppMetrics>) {
        let metrics = Arc::new(AppMetrics::new());
        let state = AppState {
            metrics: metrics.clone(),
            localization: Arc::new(localization),
            docs_enabled: false,
        };
        (create_router(state), metrics)
    }

    fn default_app() -> (Router, Arc<AppMetrics>) {
        test_app(Localization::from_config(&LocalizationConfig::default()).unwrap())
    }

    async fn get_json<T: serde::de::DeserializeOwned>(
        app: Router,
        uri: &str,
        accept_language: Option<&str>,
    ) -> (StatusCode, Option<T>) {
        let mut builder = Request::builder().uri(uri);
        if let Some(lang) = accept_language {
            builder = builder.header(header::ACCEPT_LANGUAGE, lang);
        }
        let response = app
            .oneshot(builder.body(Body::empty()).unwrap())
            .await
            .unwrap();
        let status = response.status();
        let body = response.into_body().collect().await.unwrap().to_bytes();
        (status, serde_json::from_slice(&body).ok())
    }

    #[tokio::test]
    async fn test_format_with_default_culture() {
        let (app, metrics) = default_app();
        let (status, body) =
            get_json::<FormattedNumber>(app, "/api/numbers/1234567/format", None).await;

        assert_eq!(status, StatusCode::OK);
        let body = body.unwrap();
        assert_eq!(body.formatted, "1.234.567");
        assert_eq!(body.culture, "en");
        assert_eq!(*metrics.formatting_operations.read().await, 1);
    }

    #[tokio::test]
    async fn test_format_follows_accept_language() {
        let (app, _) = default_app();
        let (status, body) = get_json::<FormattedNumber>(
            app,
            "/api/numbers/1234567.5/format",
            Some("en-US,en;q=0.8"),
        )
        .await;

        assert_eq!(status, StatusCode::OK);
        let body = body.unwrap();
        assert_eq!(body.formatted, "1,234,567.50");
        assert_eq!(body.culture, "en-US");
    }

    #[tokio::test]
    async fn test_concurrent_requests_do_not_share_culture() {
        let (app, _) = default_app();
        let german = get_json::<FormattedNumber>(
            app.clone(),
            "/api/numbers/-9876.5/format?digits=1",
            Some("de-DE"),
        );
        let default = get_json::<FormattedNumber>(app, "/api/numbers/-9876.5/format", None);
        let ((_, german), (_, default)) = tokio::join!(german, default);

        assert_eq!(german.unwrap().formatted, "-9.876,5");
        assert_eq!(default.unwrap().formatted, "-9.877");
    }

    #[tokio::test]
    async fn test_format_rejects_too_many_digits() {
        let (app, metrics) = default_app();
        let (status, _) = get_json::<serde_json::Value>(
            app,
            "/api/numbers/1/format?digits=16",
            None,
        )
        .await;

        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(*metrics.failed_requests.read().await, 1);
    }

    #[tokio::test]
    async fn test_extractor_rejections_count_as_failures() {
        let (app, metrics) = default_app();
        let (status, _) =
            get_json::<serde_json::Value>(app.clone(), "/api/numbers/twelve/format", None).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        let (status, _) =
            get_json::<serde_json::Value>(app.clone(), "/api/numbers/1/format?digits=two", None)
                .await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        let (status, _) =
            get_json::<FormattedNumber>(app.clone(), "/api/numbers/1/format", None).await;
        assert_eq!(status, StatusCode::OK);

        assert_eq!(*metrics.total_requests.read().await, 3);
        assert_eq!(*metrics.failed_requests.read().await, 2);
        assert_eq!(*metrics.successful_requests.read().await, 1);
        assert_eq!(*metrics.formatting_operations.read().await, 1);

        // health checks are not counted
        let (status, _) = get_json::<serde_json::Value>(app, "/health", None).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(*metrics.total_requests.read().await, 3);
    }

    #[tokio::test]
    async fn test_list_cultures() {
        let (app, _) = default_app();
        let (status, body) =
            get_json::<CultureList>(app, "/api/localization/cultures", Some("de")).await;

        assert_eq!(status, StatusCode::OK);
        let body = body.unwrap();
        assert_eq!(body.default_culture, "en");
        // plain `de` is not supported and has no parent, so the default wins
        assert_eq!(body.request_culture, "en");
        let names: Vec<&str> = body.supported.iter().map(|c| c.name.as_str()).collect();
        assert_eq!(names, vec!["en", "en-US", "de-DE"]);
        assert_eq!(body.supported[0].sample, "1.234.567");
        assert_eq!(body.supported[2].sample, "1.234.567,00");
    }

    #[tokio::test]
    async fn test_localized_string_lookup() {
        let mut localization = Localization::from_config(&LocalizationConfig::default()).unwrap();
        let mut strings = StringLocalizer::default();
        strings.insert(CultureName::parse("en").unwrap(), "map.title", "World map");
        strings.insert(CultureName::parse("de-DE").unwrap(), "map.title", "Weltkarte");
        localization = Localization::new(
            localization.default_culture().clone(),
            localization.supported().to_vec(),
            strings,
        );
        let (app, _) = test_app(localization);

        let (status, body) = get_json::<LocalizedString>(
            app.clone(),
            "/api/localization/strings/map.title",
            Some("de-DE"),
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        let body = body.unwrap();
        assert_eq!(body.value, "Weltkarte");
        assert_eq!(body.source_culture.as_deref(), Some("de-DE"));

        let (_, body) = get_json::<LocalizedString>(
            app,
            "/api/localization/strings/missing.key",
            Some("de-DE"),
        )
        .await;
        let body = body.unwrap();
        assert_eq!(body.value, "missing.key");
        assert!(!body.resource_found);
    }
}
