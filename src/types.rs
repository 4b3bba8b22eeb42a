use crate::localization::{Culture, NumberFormat};
use serde::{Deserialize, Serialize};
use utoipa::{IntoParams, ToSchema};

#[derive(Debug, Clone, Default, Deserialize, IntoParams)]
#[into_params(parameter_in = Query)]
pub struct FormatQuery {
    /// Fractional digits to render, overriding the culture's default (0-15)
    pub digits: Option<usize>,
}

#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct FormattedNumber {
    /// Number as received
    pub value: f64,
    /// Number rendered with the request culture's number format
    pub formatted: String,
    /// Culture used for formatting
    pub culture: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct NumberFormatInfo {
    pub decimal_digits: usize,
    pub decimal_separator: String,
    pub group_separator: String,
    pub group_size: usize,
    pub negative_sign: String,
}

impl From<&NumberFormat> for NumberFormatInfo {
    fn from(format: &NumberFormat) -> Self {
        Self {
            decimal_digits: format.decimal_digits,
            decimal_separator: format.decimal_separator.clone(),
            group_separator: format.group_separator.clone(),
            group_size: format.group_size,
            negative_sign: format.negative_sign.clone(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct CultureInfo {
    /// Culture tag, e.g. `en-US`
    pub name: String,
    pub number_format: NumberFormatInfo,
    /// Sample rendering of 1234567
    pub sample: String,
}

impl From<&Culture> for CultureInfo {
    fn from(culture: &Culture) -> Self {
        Self {
            name: culture.name.to_string(),
            number_format: NumberFormatInfo::from(&culture.number_format),
            sample: culture.number_format.format_integer(1_234_567),
        }
    }
}

#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct CultureList {
    /// Culture used when a request does not ask for a supported one
    pub default_culture: String,
    /// Culture resolved for this request
    pub request_culture: String,
    pub supported: Vec<CultureInfo>,
}

#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct LocalizedString {
    pub key: String,
    /// Localized text, or the key itself when no resource matched
    pub value: String,
    /// Culture resolved for this request
    pub culture: String,
    /// Culture whose resources supplied the value
    pub source_culture: Option<String>,
    pub resource_found: bool,
}

/// Application health status
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct HealthStatus {
    pub status: String,
    pub version: String,
    pub uptime_seconds: u64,
    pub checks: HealthChecks,
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct HealthChecks {
    pub api: String,
    pub localization: String,
    pub docs: String,
}

#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct MetricsResponse {
    pub uptime_seconds: u64,
    pub total_requests: u64,
    pub successful_requests: u64,
    pub failed_requests: u64,
    pub formatting_operations: u64,
    pub success_rate: f64,
}
