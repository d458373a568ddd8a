//! Validate command - checks a deployment group attribute document

use std::path::PathBuf;

use anyhow::Context;
use clap::Args;
use serde::Serialize;
use tracing::info;

use crate::domain::deployment_group::{validate, DeploymentGroupAttrs, FieldErrors, ValidatedGroup};

/// Arguments for the validate command
#[derive(Args, Clone)]
pub struct ValidateArgs {
    /// JSON file holding one attribute object
    pub file: PathBuf,

    /// Names already used in the team; a clash is reported as a field error
    #[arg(long = "existing", value_delimiter = ',')]
    pub existing_names: Vec<String>,
}

/// Result of validating one document
#[derive(Debug, Serialize)]
#[serde(tag = "status", rename_all = "lowercase")]
pub enum Outcome {
    Valid { deployment_group: ValidatedGroup },
    Invalid { errors: FieldErrors },
}

impl Outcome {
    pub fn is_valid(&self) -> bool {
        matches!(self, Self::Valid { .. })
    }
}

/// Run the validate command
pub async fn run(args: ValidateArgs) -> anyhow::Result<()> {
    super::load_config();

    let document = tokio::fs::read_to_string(&args.file)
        .await
        .with_context(|| format!("Failed to read {}", args.file.display()))?;

    let outcome = validate_document(&document, &args.existing_names)?;
    println!("{}", serde_json::to_string_pretty(&outcome)?);

    if !outcome.is_valid() {
        anyhow::bail!("{} is not a valid deployment group", args.file.display());
    }

    info!(file = %args.file.display(), "Deployment group is valid");
    Ok(())
}

/// Parse and validate a JSON attribute document
///
/// Malformed JSON is an error; field failures are a regular outcome.
pub fn validate_document(document: &str, existing_names: &[String]) -> anyhow::Result<Outcome> {
    let attrs: DeploymentGroupAttrs =
        serde_json::from_str(document).context("Invalid deployment group document")?;

    Ok(match validate(&attrs, existing_names) {
        Ok(deployment_group) => Outcome::Valid { deployment_group },
        Err(errors) => Outcome::Invalid { errors },
    })
}
