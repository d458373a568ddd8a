//! Raw attributes as received from a form or API layer

use std::collections::HashMap;

use serde::{Deserialize, Serialize};

use super::entity::{AuthorizationGroup, Clustering, DeploymentMode};
use super::validation::{FieldError, FieldErrors};

/// Candidate deployment group attributes, not yet validated
///
/// Upstream callers send the mode either as `mode` or as `value`; both name
/// the same field and `mode` wins when both are present. `hub_id` and
/// `team_id` are likewise interchangeable. Enum values that fail to parse are
/// kept as field errors and reported by `validate`, so a bad `mode` never
/// rejects the whole document.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(from = "RawGroupAttrs")]
pub struct DeploymentGroupAttrs {
    pub name: Option<String>,
    pub mode: Option<DeploymentMode>,
    pub clustering: Option<Clustering>,
    pub url: Option<String>,
    pub hub_id: Option<String>,
    pub teams_auth: Option<bool>,
    pub groups_auth: Option<bool>,
    pub authorization_groups: Vec<AuthorizationGroup>,
    #[serde(skip)]
    pub(super) rejected: FieldErrors,
}

/// Wire shape of `DeploymentGroupAttrs`, with enums still as text
#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct RawGroupAttrs {
    name: Option<String>,
    mode: Option<String>,
    value: Option<String>,
    clustering: Option<String>,
    url: Option<String>,
    hub_id: Option<String>,
    team_id: Option<String>,
    teams_auth: Option<bool>,
    groups_auth: Option<bool>,
    authorization_groups: Vec<AuthorizationGroup>,
}

impl From<RawGroupAttrs> for DeploymentGroupAttrs {
    fn from(raw: RawGroupAttrs) -> Self {
        let mut rejected = FieldErrors::new();

        let mode = non_blank(raw.mode.as_deref()).or_else(|| non_blank(raw.value.as_deref()));
        let mode = parse_field(mode, "mode", &mut rejected);
        let clustering = parse_field(
            non_blank(raw.clustering.as_deref()),
            "clustering",
            &mut rejected,
        );

        Self {
            name: raw.name,
            mode,
            clustering,
            url: raw.url,
            hub_id: raw.hub_id.or(raw.team_id),
            teams_auth: raw.teams_auth,
            groups_auth: raw.groups_auth,
            authorization_groups: raw.authorization_groups,
            rejected,
        }
    }
}

impl DeploymentGroupAttrs {
    pub fn new(name: impl Into<String>, mode: DeploymentMode) -> Self {
        Self {
            name: Some(name.into()),
            mode: Some(mode),
            ..Self::default()
        }
    }

    pub fn with_url(mut self, url: impl Into<String>) -> Self {
        self.url = Some(url.into());
        self
    }

    pub fn with_clustering(mut self, clustering: Clustering) -> Self {
        self.clustering = Some(clustering);
        self
    }

    pub fn with_hub_id(mut self, hub_id: impl Into<String>) -> Self {
        self.hub_id = Some(hub_id.into());
        self
    }

    pub fn with_groups_auth(mut self, groups: Vec<AuthorizationGroup>) -> Self {
        self.groups_auth = Some(true);
        self.authorization_groups = groups;
        self
    }

    /// Field errors found while parsing the raw input
    pub fn rejected(&self) -> &FieldErrors {
        &self.rejected
    }

    /// Parse a string-keyed parameter map
    ///
    /// Blank values count as absent. Unknown enum values and unparsable
    /// booleans are reported as `is invalid` against their field.
    pub fn from_params(params: &HashMap<String, String>) -> Result<Self, FieldErrors> {
        let raw = RawGroupAttrs {
            name: params.get("name").cloned(),
            mode: params.get("mode").cloned(),
            value: params.get("value").cloned(),
            clustering: params.get("clustering").cloned(),
            url: params.get("url").cloned(),
            hub_id: lookup(params, "hub_id").map(str::to_string),
            team_id: lookup(params, "team_id").map(str::to_string),
            ..RawGroupAttrs::default()
        };

        let mut attrs = Self::from(raw);
        attrs.teams_auth =
            parse_bool(lookup(params, "teams_auth"), "teams_auth", &mut attrs.rejected);
        attrs.groups_auth =
            parse_bool(lookup(params, "groups_auth"), "groups_auth", &mut attrs.rejected);

        let errors = std::mem::take(&mut attrs.rejected);
        errors.into_result(attrs)
    }
}

fn non_blank(value: Option<&str>) -> Option<&str> {
    value.map(str::trim).filter(|v| !v.is_empty())
}

fn lookup<'a>(params: &'a HashMap<String, String>, key: &str) -> Option<&'a str> {
    non_blank(params.get(key).map(String::as_str))
}

fn parse_field<T: std::str::FromStr>(
    raw: Option<&str>,
    field: &str,
    errors: &mut FieldErrors,
) -> Option<T> {
    let raw = raw?;

    match raw.parse() {
        Ok(value) => Some(value),
        Err(_) => {
            errors.add(field, FieldError::Invalid);
            None
        }
    }
}

fn parse_bool(raw: Option<&str>, field: &str, errors: &mut FieldErrors) -> Option<bool> {
    let raw = raw?;

    match raw.to_ascii_lowercase().as_str() {
        "true" | "1" | "on" => Some(true),
        "false" | "0" | "off" => Some(false),
        _ => {
            errors.add(field, FieldError::Invalid);
            None
        }
    }
}

/// Candidate secret or environment variable attributes
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(from = "RawEntryAttrs")]
pub struct EntryAttrs {
    pub name: Option<String>,
    pub value: Option<String>,
    pub hub_id: Option<String>,
    pub deployment_group_id: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct RawEntryAttrs {
    name: Option<String>,
    value: Option<String>,
    hub_id: Option<String>,
    team_id: Option<String>,
    deployment_group_id: Option<String>,
}

impl From<RawEntryAttrs> for EntryAttrs {
    fn from(raw: RawEntryAttrs) -> Self {
        Self {
            name: raw.name,
            value: raw.value,
            hub_id: raw.hub_id.or(raw.team_id),
            deployment_group_id: raw.deployment_group_id,
        }
    }
}

pub type SecretAttrs = EntryAttrs;
pub type EnvironmentVariableAttrs = EntryAttrs;

impl EntryAttrs {
    pub fn new(name: impl Into<String>, value: impl Into<String>) -> Self {
        Self {
            name: Some(name.into()),
            value: Some(value.into()),
            ..Self::default()
        }
    }

    pub fn from_params(params: &HashMap<String, String>) -> Self {
        Self {
            name: params.get("name").cloned(),
            value: params.get("value").cloned(),
            hub_id: params
                .get("hub_id")
                .or_else(|| params.get("team_id"))
                .cloned(),
            deployment_group_id: params.get("deployment_group_id").cloned(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn params(pairs: &[(&str, &str)]) -> HashMap<String, String> {
        pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect()
    }

    #[test]
    fn test_from_params_accepts_value_as_mode() {
        let attrs = DeploymentGroupAttrs::from_params(&params(&[
            ("name", "production"),
            ("value", "offline"),
            ("hub_id", "team-acme"),
        ]))
        .unwrap();

        assert_eq!(attrs.name.as_deref(), Some("production"));
        assert_eq!(attrs.mode, Some(DeploymentMode::Offline));
        assert_eq!(attrs.hub_id.as_deref(), Some("team-acme"));
    }

    #[test]
    fn test_from_params_prefers_mode_over_value() {
        let attrs = DeploymentGroupAttrs::from_params(&params(&[
            ("mode", "online"),
            ("value", "offline"),
        ]))
        .unwrap();

        assert_eq!(attrs.mode, Some(DeploymentMode::Online));
    }

    #[test]
    fn test_from_params_blank_mode_is_absent() {
        let attrs = DeploymentGroupAttrs::from_params(&params(&[("name", "x"), ("mode", " ")]))
            .unwrap();
        assert!(attrs.mode.is_none());
    }

    #[test]
    fn test_from_params_reports_invalid_values() {
        let errors = DeploymentGroupAttrs::from_params(&params(&[
            ("mode", "sideways"),
            ("clustering", "gossip"),
            ("teams_auth", "maybe"),
        ]))
        .unwrap_err();

        assert_eq!(errors.messages("mode"), vec!["is invalid"]);
        assert_eq!(errors.messages("clustering"), vec!["is invalid"]);
        assert_eq!(errors.messages("teams_auth"), vec!["is invalid"]);
    }

    #[test]
    fn test_from_params_booleans() {
        let attrs = DeploymentGroupAttrs::from_params(&params(&[
            ("teams_auth", "false"),
            ("groups_auth", "on"),
        ]))
        .unwrap();

        assert_eq!(attrs.teams_auth, Some(false));
        assert_eq!(attrs.groups_auth, Some(true));
    }

    #[test]
    fn test_json_aliases() {
        let attrs: DeploymentGroupAttrs = serde_json::from_str(
            r#"{"name": "staging", "value": "online", "team_id": "team-acme", "clustering": "dns"}"#,
        )
        .unwrap();

        assert_eq!(attrs.mode, Some(DeploymentMode::Online));
        assert_eq!(attrs.clustering, Some(Clustering::Dns));
        assert_eq!(attrs.hub_id.as_deref(), Some("team-acme"));
    }

    #[test]
    fn test_json_mode_and_value_both_present() {
        let attrs: DeploymentGroupAttrs =
            serde_json::from_str(r#"{"name": "n", "mode": "online", "value": "offline"}"#)
                .unwrap();

        assert_eq!(attrs.mode, Some(DeploymentMode::Online));
        assert!(attrs.rejected().is_empty());
    }

    #[test]
    fn test_json_unknown_mode_is_field_error() {
        let attrs: DeploymentGroupAttrs =
            serde_json::from_str(r#"{"name": "n", "mode": "hybrid", "clustering": "gossip"}"#)
                .unwrap();

        assert!(attrs.mode.is_none());
        assert_eq!(attrs.rejected().messages("mode"), vec!["is invalid"]);
        assert_eq!(attrs.rejected().messages("clustering"), vec!["is invalid"]);
    }

    #[test]
    fn test_entry_json_team_id_alias() {
        let attrs: EntryAttrs = serde_json::from_str(
            r#"{"name": "TOKEN", "value": "x", "hub_id": "team-a", "team_id": "team-b"}"#,
        )
        .unwrap();

        assert_eq!(attrs.hub_id.as_deref(), Some("team-a"));
    }

    #[test]
    fn test_entry_from_params() {
        let attrs = EntryAttrs::from_params(&params(&[
            ("name", "DATABASE_URL"),
            ("value", "postgres://db"),
            ("hub_id", "team-acme"),
            ("deployment_group_id", "dg-1"),
        ]));

        assert_eq!(attrs.name.as_deref(), Some("DATABASE_URL"));
        assert_eq!(attrs.deployment_group_id.as_deref(), Some("dg-1"));
    }
}
