//! Cultures, number formatting and string resources.
//!
//! The default culture is never installed as process-wide state. It lives in
//! [`Localization`], which is shared read-only across requests, and each request
//! resolves its own culture through the [`RequestCulture`] extractor.

use crate::config::{LocalizationConfig, NumberFormatOverride};
use crate::error::StartupError;
use axum::extract::{FromRef, FromRequestParts};
use axum::http::{header, request::Parts};
use std::collections::HashMap;
use std::convert::Infallible;
use std::fmt;
use std::path::Path;
use std::sync::Arc;
use tracing::{debug, info};

/// Normalised culture tag such as `en`, `en-US` or `zh-Hant-TW`.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct CultureName(String);

impl CultureName {
    pub fn parse(raw: &str) -> Result<Self, StartupError> {
        let invalid = || StartupError::InvalidCulture(raw.to_string());
        let mut subtags = raw.trim().split('-');

        let language = subtags.next().ok_or_else(invalid)?;
        if !(2..=3).contains(&language.len()) || !language.chars().all(|c| c.is_ascii_alphabetic())
        {
            return Err(invalid());
        }
        let mut normalised = language.to_ascii_lowercase();

        for subtag in subtags {
            let alpha = subtag.chars().all(|c| c.is_ascii_alphabetic());
            let digits = subtag.chars().all(|c| c.is_ascii_digit());
            let alnum = subtag.chars().all(|c| c.is_ascii_alphanumeric());
            let part = match subtag.len() {
                2 if alpha => subtag.to_ascii_uppercase(),
                3 if digits => subtag.to_string(),
                4 if alpha => {
                    let lower = subtag.to_ascii_lowercase();
                    let mut chars = lower.chars();
                    match chars.next() {
                        Some(first) => first.to_ascii_uppercase().to_string() + chars.as_str(),
                        None => return Err(invalid()),
                    }
                }
                5..=8 if alnum => subtag.to_ascii_lowercase(),
                _ => return Err(invalid()),
            };
            normalised.push('-');
            normalised.push_str(&part);
        }

        Ok(Self(normalised))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn language(&self) -> &str {
        self.0.split('-').next().unwrap_or(&self.0)
    }

    /// `de-CH` -> `de`; a bare language has no parent.
    pub fn parent(&self) -> Option<CultureName> {
        self.0
            .rsplit_once('-')
            .map(|(parent, _)| CultureName(parent.to_string()))
    }

    /// The culture itself followed by its ancestors, most specific first.
    pub fn lineage(&self) -> Vec<CultureName> {
        let mut chain = vec![self.clone()];
        while let Some(parent) = chain.last().and_then(CultureName::parent) {
            chain.push(parent);
        }
        chain
    }
}

impl fmt::Display for CultureName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NumberFormat {
    pub decimal_digits: usize,
    pub decimal_separator: String,
    pub group_separator: String,
    pub group_size: usize,
    pub negative_sign: String,
}

/// Largest number of fractional digits `format` will render.
pub const MAX_DECIMAL_DIGITS: usize = 15;

impl NumberFormat {
    pub fn invariant() -> Self {
        Self::with_separators(",", ".")
    }

    fn with_separators(group: &str, decimal: &str) -> Self {
        Self {
            decimal_digits: 2,
            decimal_separator: decimal.to_string(),
            group_separator: group.to_string(),
            group_size: 3,
            negative_sign: "-".to_string(),
        }
    }

    /// Built-in format for a culture, walking up to its parent language
    /// and finally to the invariant format.
    pub fn for_culture(name: &CultureName) -> Self {
        for candidate in name.lineage() {
            match candidate.as_str() {
                "en" | "en-US" | "en-GB" | "en-AU" | "en-CA" => {
                    return Self::with_separators(",", ".")
                }
                "de" | "de-DE" | "de-AT" | "es" | "es-ES" | "it" | "it-IT" | "nl" | "nl-NL" => {
                    return Self::with_separators(".", ",")
                }
                "fr" | "fr-FR" => return Self::with_separators("\u{202f}", ","),
                _ => {}
            }
        }
        Self::invariant()
    }

    /// The override starts from the invariant format, not the culture's own.
    pub fn from_override(overrides: &NumberFormatOverride) -> Self {
        let mut format = Self::invariant();
        if let Some(digits) = overrides.decimal_digits {
            format.decimal_digits = digits.min(MAX_DECIMAL_DIGITS);
        }
        if let Some(sep) = &overrides.decimal_separator {
            format.decimal_separator = sep.clone();
        }
        if let Some(sep) = &overrides.group_separator {
            format.group_separator = sep.clone();
        }
        format
    }

    pub fn format_integer(&self, value: i64) -> String {
        let magnitude = i128::from(value).abs().to_string();
        let mut out = String::new();
        if value < 0 {
            out.push_str(&self.negative_sign);
        }
        out.push_str(&self.group(&magnitude));
        if self.decimal_digits > 0 {
            out.push_str(&self.decimal_separator);
            out.push_str(&"0".repeat(self.decimal_digits));
        }
        out
    }

    /// Formats with grouping; midpoints round away from zero.
    pub fn format(&self, value: f64, digits: Option<usize>) -> String {
        let digits = digits.unwrap_or(self.decimal_digits).min(MAX_DECIMAL_DIGITS);

        if value.is_nan() {
            return "NaN".to_string();
        }
        if value.is_infinite() {
            return if value > 0.0 {
                "∞".to_string()
            } else {
                format!("{}∞", self.negative_sign)
            };
        }

        let factor = 10f64.powi(digits as i32);
        let scaled = value.abs() * factor;
        let rounded = if scaled.is_finite() {
            scaled.round() / factor
        } else {
            value.abs()
        };
        let text = format!("{:.*}", digits, rounded);
        let (integer, fraction) = match text.split_once('.') {
            Some((integer, fraction)) => (integer, Some(fraction)),
            None => (text.as_str(), None),
        };

        let mut out = String::new();
        if value < 0.0 && rounded != 0.0 {
            out.push_str(&self.negative_sign);
        }
        out.push_str(&self.group(integer));
        if let Some(fraction) = fraction {
            out.push_str(&self.decimal_separator);
            out.push_str(fraction);
        }
        out
    }

    fn group(&self, digits: &str) -> String {
        if self.group_size == 0 {
            return digits.to_string();
        }
        let len = digits.len();
        let mut out = String::with_capacity(len + len / self.group_size * self.group_separator.len());
        for (i, ch) in digits.chars().enumerate() {
            if i > 0 && (len - i) % self.group_size == 0 {
                out.push_str(&self.group_separator);
            }
            out.push(ch);
        }
        out
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Culture {
    pub name: CultureName,
    pub number_format: NumberFormat,
}

impl Culture {
    pub fn new(name: &str) -> Result<Self, StartupError> {
        let name = CultureName::parse(name)?;
        let number_format = NumberFormat::for_culture(&name);
        Ok(Self {
            name,
            number_format,
        })
    }

    pub fn with_number_format(mut self, number_format: NumberFormat) -> Self {
        self.number_format = number_format;
        self
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LocalizedText {
    pub value: String,
    /// Culture whose resource file supplied the value
    pub source_culture: Option<CultureName>,
}

impl LocalizedText {
    pub fn resource_found(&self) -> bool {
        self.source_culture.is_some()
    }
}

/// Per-culture `key = "value"` tables read from `<dir>/<culture>.toml`.
#[derive(Debug, Clone, Default)]
pub struct StringLocalizer {
    resources: HashMap<CultureName, HashMap<String, String>>,
}

impl StringLocalizer {
    pub fn load(dir: &Path, cultures: &[Culture]) -> Result<Self, StartupError> {
        let mut resources = HashMap::new();
        for name in cultures.iter().flat_map(|c| c.name.lineage()) {
            if resources.contains_key(&name) {
                continue;
            }
            let path = dir.join(format!("{}.toml", name));
            if !path.is_file() {
                continue;
            }
            let content =
                std::fs::read_to_string(&path).map_err(|source| StartupError::ResourceRead {
                    path: path.clone(),
                    source,
                })?;
            let table: HashMap<String, String> =
                toml::from_str(&content).map_err(|source| StartupError::ResourceParse {
                    path: path.clone(),
                    source,
                })?;
            info!("Loaded {} strings for culture {}", table.len(), name);
            resources.insert(name, table);
        }
        Ok(Self { resources })
    }

    pub fn insert(&mut self, culture: CultureName, key: impl Into<String>, value: impl Into<String>) {
        self.resources
            .entry(culture)
            .or_default()
            .insert(key.into(), value.into());
    }

    /// Looks up `culture` and its parents, then `fallback` and its parents.
    /// Without a match the key itself is returned.
    pub fn get(&self, key: &str, culture: &CultureName, fallback: &CultureName) -> LocalizedText {
        culture
            .lineage()
            .into_iter()
            .chain(fallback.lineage())
            .find_map(|name| {
                let value = self.resources.get(&name)?.get(key)?.clone();
                Some(LocalizedText {
                    value,
                    source_culture: Some(name),
                })
            })
            .unwrap_or_else(|| LocalizedText {
                value: key.to_string(),
                source_culture: None,
            })
    }
}

/// Shared localization state: default culture, supported cultures and strings.
#[derive(Debug, Clone)]
pub struct Localization {
    default: Culture,
    supported: Vec<Culture>,
    strings: StringLocalizer,
}

impl Localization {
    pub fn new(default: Culture, others: Vec<Culture>, strings: StringLocalizer) -> Self {
        let mut supported = vec![default.clone()];
        for culture in others {
            if !supported.iter().any(|c| c.name == culture.name) {
                supported.push(culture);
            }
        }
        Self {
            default,
            supported,
            strings,
        }
    }

    pub fn from_config(config: &LocalizationConfig) -> Result<Self, StartupError> {
        let default = Culture::new(&config.default_culture)?
            .with_number_format(NumberFormat::from_override(&config.number_format));
        let others = config
            .supported_cultures
            .iter()
            .map(|name| Culture::new(name))
            .collect::<Result<Vec<_>, _>>()?;

        let localization = Self::new(default, others, StringLocalizer::default());
        let strings = match &config.resources_dir {
            Some(dir) => StringLocalizer::load(dir, &localization.supported)?,
            None => StringLocalizer::default(),
        };

        Ok(Self {
            strings,
            ..localization
        })
    }

    pub fn default_culture(&self) -> &Culture {
        &self.default
    }

    pub fn supported(&self) -> &[Culture] {
        &self.supported
    }

    pub fn strings(&self) -> &StringLocalizer {
        &self.strings
    }

    pub fn localize(&self, key: &str, culture: &Culture) -> LocalizedText {
        self.strings.get(key, &culture.name, &self.default.name)
    }

    /// Picks the best supported culture for an `Accept-Language` value.
    pub fn resolve(&self, accept_language: Option<&str>) -> Culture {
        accept_language
            .map(parse_accept_language)
            .unwrap_or_default()
            .into_iter()
            .filter_map(|tag| CultureName::parse(&tag).ok())
            .find_map(|requested| {
                requested.lineage().into_iter().find_map(|candidate| {
                    self.supported.iter().find(|c| c.name == candidate).cloned()
                })
            })
            .unwrap_or_else(|| self.default.clone())
    }
}

/// Language tags ordered by descending quality; `*` and `q=0` entries are dropped.
pub fn parse_accept_language(header: &str) -> Vec<String> {
    let mut entries: Vec<(String, f32)> = header
        .split(',')
        .filter_map(|entry| {
            let mut parts = entry.split(';');
            let tag = parts.next()?.trim();
            if tag.is_empty() || tag == "*" {
                return None;
            }
            let quality = parts
                .filter_map(|p| p.trim().strip_prefix("q="))
                .find_map(|q| q.trim().parse::<f32>().ok())
                .unwrap_or(1.0);
            (quality > 0.0).then(|| (tag.to_string(), quality))
        })
        .collect();

    entries.sort_by(|a, b| b.1.partial_cmp(&a.1).unwrap_or(std::cmp::Ordering::Equal));
    entries.into_iter().map(|(tag, _)| tag).collect()
}

/// Culture resolved for the current request, used for both number
/// formatting and string lookup.
#[derive(Debug, Clone)]
pub struct RequestCulture(pub Culture);

impl<S> FromRequestParts<S> for RequestCulture
where
    Arc<Localization>: FromRef<S>,
    S: Send + Sync,
{
    type Rejection = Infallible;

    async fn from_request_parts(parts: &mut Parts, state: &S) -> Result<Self, Self::Rejection> {
        let localization = Arc::<Localization>::from_ref(state);
        let accept_language = parts
            .headers
            .get(header::ACCEPT_LANGUAGE)
            .and_then(|v| v.to_str().ok());
        let culture = localization.resolve(accept_language);
        debug!("Request culture resolved to {}", culture.name);
        Ok(RequestCulture(culture))
    }
}
