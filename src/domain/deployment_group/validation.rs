//! Deployment group validation
//!
//! Pure functions over candidate attributes. Every failing field is reported,
//! not just the first one.

use std::collections::{BTreeMap, HashSet};

use once_cell::sync::Lazy;
use regex::Regex;
use serde::Serialize;
use thiserror::Error;
use url::Url;

use super::attrs::{DeploymentGroupAttrs, EntryAttrs};
use super::entity::{AuthorizationGroup, Clustering, DeploymentMode};
use super::secret::normalize_secret_name;

static ENTRY_NAME_PATTERN: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^[A-Za-z0-9_]+$").unwrap());

/// A single field-level failure
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum FieldError {
    #[error("can't be blank")]
    Blank,

    #[error("is invalid")]
    Invalid,

    #[error("must be a well-formed URL")]
    MalformedUrl,

    #[error("must start with \"http://\" or \"https://\"")]
    InvalidUrlScheme,

    #[error("should contain only alphanumeric characters and underscore")]
    InvalidNameCharacters,

    #[error("should not start with a number")]
    NameStartsWithDigit,

    #[error("has duplicated entries")]
    Duplicated,

    #[error("has already been taken")]
    AlreadyTaken,
}

/// Field errors collected in the order they were found
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FieldErrors {
    errors: Vec<(String, FieldError)>,
}

impl FieldErrors {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add(&mut self, field: impl Into<String>, error: FieldError) {
        self.errors.push((field.into(), error));
    }

    pub fn is_empty(&self) -> bool {
        self.errors.is_empty()
    }

    pub fn len(&self) -> usize {
        self.errors.len()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &FieldError)> {
        self.errors.iter().map(|(field, error)| (field.as_str(), error))
    }

    /// Errors reported against one field
    pub fn get(&self, field: &str) -> Vec<&FieldError> {
        self.iter()
            .filter(|(f, _)| *f == field)
            .map(|(_, e)| e)
            .collect()
    }

    /// Rendered messages for one field
    pub fn messages(&self, field: &str) -> Vec<String> {
        self.get(field).into_iter().map(ToString::to_string).collect()
    }

    /// True when the only failures are uniqueness violations
    pub fn is_conflict_only(&self) -> bool {
        !self.is_empty()
            && self
                .errors
                .iter()
                .all(|(_, e)| *e == FieldError::AlreadyTaken)
    }

    pub fn to_map(&self) -> BTreeMap<String, Vec<String>> {
        let mut map: BTreeMap<String, Vec<String>> = BTreeMap::new();

        for (field, error) in &self.errors {
            map.entry(field.clone()).or_default().push(error.to_string());
        }

        map
    }

    pub fn into_result<T>(self, value: T) -> Result<T, FieldErrors> {
        if self.is_empty() {
            Ok(value)
        } else {
            Err(self)
        }
    }
}

impl std::fmt::Display for FieldErrors {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        for (i, (field, error)) in self.errors.iter().enumerate() {
            if i > 0 {
                write!(f, "; ")?;
            }
            write!(f, "{} {}", field, error)?;
        }
        Ok(())
    }
}

impl std::error::Error for FieldErrors {}

impl Serialize for FieldErrors {
    fn serialize<S: serde::Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        self.to_map().serialize(serializer)
    }
}

/// Deployment group attributes that passed validation and normalization
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ValidatedGroup {
    pub(super) name: String,
    pub(super) mode: DeploymentMode,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub(super) clustering: Option<Clustering>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub(super) url: Option<String>,
    pub(super) teams_auth: bool,
    pub(super) groups_auth: bool,
    pub(super) authorization_groups: Vec<AuthorizationGroup>,
}

impl ValidatedGroup {
    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn mode(&self) -> DeploymentMode {
        self.mode
    }

    pub fn clustering(&self) -> Option<Clustering> {
        self.clustering
    }

    pub fn url(&self) -> Option<&str> {
        self.url.as_deref()
    }
}

/// Validated name/value pair for a secret or environment variable
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ValidatedEntry {
    pub name: String,
    pub value: String,
}

/// Validate a candidate deployment group
///
/// `existing_names` are the names already used by other groups of the same
/// team; a clash is reported as `name: has already been taken`.
pub fn validate<I, S>(
    candidate: &DeploymentGroupAttrs,
    existing_names: I,
) -> Result<ValidatedGroup, FieldErrors>
where
    I: IntoIterator<Item = S>,
    S: AsRef<str>,
{
    let mut errors = candidate.rejected().clone();

    let name = candidate
        .name
        .as_deref()
        .map(str::trim)
        .unwrap_or_default()
        .to_string();

    if name.is_empty() {
        errors.add("name", FieldError::Blank);
    }

    if candidate.mode.is_none() && errors.get("mode").is_empty() {
        errors.add("mode", FieldError::Blank);
    }

    let url = match candidate.url.as_deref().map(str::trim) {
        Some(raw) if !raw.is_empty() => {
            let normalized = normalize_url(raw);

            if let Err(e) = validate_url(&normalized) {
                errors.add("url", e);
            }

            Some(normalized)
        }
        _ => None,
    };

    validate_authorization_groups(&candidate.authorization_groups, &mut errors);

    if !name.is_empty()
        && existing_names
            .into_iter()
            .any(|existing| existing.as_ref() == name)
    {
        errors.add("name", FieldError::AlreadyTaken);
    }

    let mode = candidate.mode.unwrap_or(DeploymentMode::Offline);
    let clustering = match mode {
        DeploymentMode::Online => candidate.clustering,
        DeploymentMode::Offline => None,
    };

    errors.into_result(ValidatedGroup {
        name,
        mode,
        clustering,
        url,
        teams_auth: candidate.teams_auth.unwrap_or(true),
        groups_auth: candidate.groups_auth.unwrap_or(false),
        authorization_groups: candidate.authorization_groups.clone(),
    })
}

/// Strip trailing slashes so `https://example.com/` and `https://example.com`
/// are stored identically
pub fn normalize_url(url: &str) -> String {
    url.trim_end_matches('/').to_string()
}

/// Check that a URL is absolute, http(s) and has a host
pub fn validate_url(url: &str) -> Result<(), FieldError> {
    let parsed = match Url::parse(url) {
        Ok(parsed) => parsed,
        Err(url::ParseError::RelativeUrlWithoutBase) => {
            return Err(FieldError::InvalidUrlScheme);
        }
        Err(_) => return Err(FieldError::MalformedUrl),
    };

    if !matches!(parsed.scheme(), "http" | "https") {
        return Err(FieldError::InvalidUrlScheme);
    }

    match parsed.host_str() {
        Some(host) if !host.is_empty() => Ok(()),
        _ => Err(FieldError::MalformedUrl),
    }
}

fn validate_authorization_groups(groups: &[AuthorizationGroup], errors: &mut FieldErrors) {
    let mut seen = HashSet::new();

    for (i, group) in groups.iter().enumerate() {
        if group.provider_id.trim().is_empty() {
            errors.add(
                format!("authorization_groups[{}].provider_id", i),
                FieldError::Blank,
            );
        }

        if group.group_name.trim().is_empty() {
            errors.add(
                format!("authorization_groups[{}].group_name", i),
                FieldError::Blank,
            );
        }

        if !seen.insert((group.provider_id.trim(), group.group_name.trim())) {
            errors.add("authorization_groups", FieldError::Duplicated);
        }
    }
}

/// Validate a secret; the returned name is upper-cased
pub fn validate_secret<I, S>(
    candidate: &EntryAttrs,
    existing_names: I,
) -> Result<ValidatedEntry, FieldErrors>
where
    I: IntoIterator<Item = S>,
    S: AsRef<str>,
{
    let name = normalize_secret_name(candidate.name.as_deref().unwrap_or_default());
    let value = candidate.value.clone().unwrap_or_default();
    let mut errors = FieldErrors::new();

    validate_entry_name(&name, existing_names, &mut errors);

    if value.is_empty() {
        errors.add("value", FieldError::Blank);
    }

    errors.into_result(ValidatedEntry { name, value })
}

/// Validate an environment variable; empty values are allowed
pub fn validate_environment_variable<I, S>(
    candidate: &EntryAttrs,
    existing_names: I,
) -> Result<ValidatedEntry, FieldErrors>
where
    I: IntoIterator<Item = S>,
    S: AsRef<str>,
{
    let name = candidate
        .name
        .as_deref()
        .unwrap_or_default()
        .trim()
        .to_string();
    let value = candidate.value.clone().unwrap_or_default();
    let mut errors = FieldErrors::new();

    validate_entry_name(&name, existing_names, &mut errors);

    errors.into_result(ValidatedEntry { name, value })
}

fn validate_entry_name<I, S>(name: &str, existing_names: I, errors: &mut FieldErrors)
where
    I: IntoIterator<Item = S>,
    S: AsRef<str>,
{
    if name.is_empty() {
        errors.add("name", FieldError::Blank);
        return;
    }

    if !ENTRY_NAME_PATTERN.is_match(name) {
        errors.add("name", FieldError::InvalidNameCharacters);
    } else if name.starts_with(|c: char| c.is_ascii_digit()) {
        errors.add("name", FieldError::NameStartsWithDigit);
    }

    if existing_names.into_iter().any(|n| n.as_ref() == name) {
        errors.add("name", FieldError::AlreadyTaken);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const NONE: [&str; 0] = [];

    fn online(name: &str) -> DeploymentGroupAttrs {
        DeploymentGroupAttrs::new(name, DeploymentMode::Online)
    }

    #[test]
    fn test_valid_group() {
        let validated = validate(&online("production"), NONE).unwrap();

        assert_eq!(validated.name(), "production");
        assert_eq!(validated.mode(), DeploymentMode::Online);
        assert!(validated.teams_auth);
        assert!(!validated.groups_auth);
        assert!(validated.url().is_none());
    }

    #[test]
    fn test_name_and_mode_required() {
        let errors = validate(&DeploymentGroupAttrs::default(), NONE).unwrap_err();

        assert_eq!(errors.messages("name"), vec!["can't be blank"]);
        assert_eq!(errors.messages("mode"), vec!["can't be blank"]);
        assert_eq!(errors.len(), 2);
    }

    #[test]
    fn test_blank_name_after_trim() {
        let errors = validate(&online("   "), NONE).unwrap_err();
        assert_eq!(errors.get("name"), vec![&FieldError::Blank]);
    }

    #[test]
    fn test_unparsable_mode_reported_once() {
        let attrs: DeploymentGroupAttrs =
            serde_json::from_str(r#"{"name": "n", "mode": "hybrid"}"#).unwrap();
        let errors = validate(&attrs, NONE).unwrap_err();

        assert_eq!(errors.messages("mode"), vec!["is invalid"]);
        assert_eq!(errors.len(), 1);
    }

    #[test]
    fn test_long_name_accepted() {
        let name = "n".repeat(101);
        let validated = validate(&online(&name), NONE).unwrap();
        assert_eq!(validated.name(), name);
    }

    #[test]
    fn test_url_trailing_slash_stripped() {
        let with_slash = validate(&online("a").with_url("https://example.com/"), NONE).unwrap();
        let without = validate(&online("a").with_url("https://example.com"), NONE).unwrap();

        assert_eq!(with_slash.url(), Some("https://example.com"));
        assert_eq!(without.url(), Some("https://example.com"));
    }

    #[test]
    fn test_normalize_url_idempotent() {
        for url in ["https://example.com/", "https://example.com", "http://h/a//"] {
            let once = normalize_url(url);
            assert_eq!(normalize_url(&once), once);
        }

        assert_eq!(normalize_url("https://example.com//"), "https://example.com");
    }

    #[test]
    fn test_url_with_spaces_is_malformed() {
        let errors = validate(&online("n").with_url("http://not a valid url"), NONE).unwrap_err();
        assert_eq!(errors.messages("url"), vec!["must be a well-formed URL"]);
    }

    #[test]
    fn test_url_without_scheme() {
        let errors = validate(&online("n").with_url("url.without.scheme.com"), NONE).unwrap_err();
        assert_eq!(
            errors.messages("url"),
            vec!["must start with \"http://\" or \"https://\""]
        );
    }

    #[test]
    fn test_url_with_other_scheme() {
        assert_eq!(
            validate_url("ftp://example.com"),
            Err(FieldError::InvalidUrlScheme)
        );
        assert_eq!(validate_url("mailto:ops@example.com"), Err(FieldError::InvalidUrlScheme));
    }

    #[test]
    fn test_url_without_host() {
        assert_eq!(validate_url("http://"), Err(FieldError::MalformedUrl));
    }

    #[test]
    fn test_valid_urls() {
        assert_eq!(validate_url("http://localhost:4000"), Ok(()));
        assert_eq!(validate_url("https://apps.example.com/base"), Ok(()));
    }

    #[test]
    fn test_empty_url_is_absent() {
        let validated = validate(&online("n").with_url("  "), NONE).unwrap();
        assert!(validated.url().is_none());
    }

    #[test]
    fn test_offline_drops_clustering() {
        let attrs = DeploymentGroupAttrs::new("n", DeploymentMode::Offline)
            .with_clustering(Clustering::Dns);
        assert!(validate(&attrs, NONE).unwrap().clustering().is_none());

        let attrs = online("n").with_clustering(Clustering::Dns);
        assert_eq!(
            validate(&attrs, NONE).unwrap().clustering(),
            Some(Clustering::Dns)
        );
    }

    #[test]
    fn test_name_taken() {
        let errors = validate(&online("production"), ["staging", "production"]).unwrap_err();

        assert_eq!(errors.messages("name"), vec!["has already been taken"]);
        assert!(errors.is_conflict_only());
    }

    #[test]
    fn test_taken_with_other_errors_is_not_conflict_only() {
        let attrs = online("production").with_url("ftp://x");
        let errors = validate(&attrs, ["production"]).unwrap_err();

        assert!(!errors.is_conflict_only());
        assert_eq!(errors.len(), 2);
    }

    #[test]
    fn test_authorization_groups() {
        let attrs = online("n").with_groups_auth(vec![
            AuthorizationGroup::new("okta", "admins"),
            AuthorizationGroup::new("okta", ""),
            AuthorizationGroup::new("okta", "admins"),
        ]);
        let errors = validate(&attrs, NONE).unwrap_err();

        assert_eq!(
            errors.messages("authorization_groups[1].group_name"),
            vec!["can't be blank"]
        );
        assert_eq!(
            errors.messages("authorization_groups"),
            vec!["has duplicated entries"]
        );
    }

    #[test]
    fn test_errors_display_and_map() {
        let errors = validate(&DeploymentGroupAttrs::default(), NONE).unwrap_err();

        assert_eq!(errors.to_string(), "name can't be blank; mode can't be blank");
        let json = serde_json::to_value(&errors).unwrap();
        assert_eq!(json["mode"][0], "can't be blank");
    }

    #[test]
    fn test_validate_secret() {
        let entry = validate_secret(&EntryAttrs::new("db_url", "postgres://db"), NONE).unwrap();
        assert_eq!(entry.name, "DB_URL");

        let errors = validate_secret(&EntryAttrs::new("1ST", ""), NONE).unwrap_err();
        assert_eq!(errors.get("name"), vec![&FieldError::NameStartsWithDigit]);
        assert_eq!(errors.get("value"), vec![&FieldError::Blank]);

        let errors = validate_secret(&EntryAttrs::new("MY-SECRET", "x"), NONE).unwrap_err();
        assert_eq!(errors.get("name"), vec![&FieldError::InvalidNameCharacters]);
    }

    #[test]
    fn test_validate_secret_taken() {
        let errors = validate_secret(&EntryAttrs::new("token", "x"), ["TOKEN"]).unwrap_err();
        assert!(errors.is_conflict_only());
    }

    #[test]
    fn test_validate_environment_variable() {
        let entry =
            validate_environment_variable(&EntryAttrs::new(" Port ", ""), NONE).unwrap();
        assert_eq!(entry.name, "Port");
        assert_eq!(entry.value, "");

        let errors =
            validate_environment_variable(&EntryAttrs::default(), NONE).unwrap_err();
        assert_eq!(errors.get("name"), vec![&FieldError::Blank]);
    }
}
