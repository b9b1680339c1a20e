use std::path::Path;

use anyhow::Result;
use clap::Args;
use tracing::info;

use inkpress_appwrite::client::DEFAULT_ENDPOINT;

use crate::config::{AppConfig, BackendConfig};

#[derive(Args)]
pub struct InitArgs {
    /// Backend type: appwrite or local
    #[arg(long)]
    backend: String,

    /// Directory for the local backend
    #[arg(long)]
    path: Option<String>,

    /// Appwrite API endpoint
    #[arg(long, default_value = DEFAULT_ENDPOINT)]
    endpoint: String,

    /// Appwrite project ID
    #[arg(long)]
    project_id: Option<String>,

    /// Server API key (prompted for when omitted on a terminal)
    #[arg(long, conflicts_with = "jwt")]
    api_key: Option<String>,

    /// Account JWT to act as a signed-in user instead of using an API key
    #[arg(long)]
    jwt: Option<String>,

    /// Database holding the posts collection
    #[arg(long)]
    database_id: Option<String>,

    /// Collection holding posts
    #[arg(long)]
    collection_id: Option<String>,

    /// Storage bucket holding images
    #[arg(long)]
    bucket_id: Option<String>,

    /// Overwrite an existing config file
    #[arg(long)]
    force: bool,
}

pub async fn run(args: InitArgs, config_path: &Path) -> Result<()> {
    if config_path.exists() && !args.force {
        anyhow::bail!(
            "config already exists at {} (use --force to overwrite)",
            config_path.display()
        );
    }

    let backend = match args.backend.as_str() {
        "local" => {
            let path = args
                .path
                .ok_or_else(|| anyhow::anyhow!("--path required for local backend"))?;
            BackendConfig::Local { path }
        }
        "appwrite" => {
            let project_id = args
                .project_id
                .ok_or_else(|| anyhow::anyhow!("--project-id required for appwrite backend"))?;
            let database_id = args
                .database_id
                .ok_or_else(|| anyhow::anyhow!("--database-id required for appwrite backend"))?;
            let collection_id = args.collection_id.ok_or_else(|| {
                anyhow::anyhow!("--collection-id required for appwrite backend")
            })?;
            let bucket_id = args
                .bucket_id
                .ok_or_else(|| anyhow::anyhow!("--bucket-id required for appwrite backend"))?;
            let api_key = match (args.api_key, &args.jwt) {
                (Some(key), _) => Some(key),
                (None, Some(_)) => None,
                (None, None) => prompt_api_key()?,
            };
            BackendConfig::Appwrite {
                endpoint: args.endpoint,
                project_id,
                api_key,
                jwt: args.jwt,
                database_id,
                collection_id,
                bucket_id,
                timeout_secs: None,
                max_retries: None,
            }
        }
        other => anyhow::bail!("unknown backend: {other} (supported: appwrite, local)"),
    };

    let config = AppConfig { backend };

    // Fail before writing anything if the settings cannot produce a client
    config.open_service()?;
    config.save(config_path)?;

    info!(config_path = %config_path.display(), "Config saved.");
    println!(
        "{} Config written to {}",
        console::style("✓").green(),
        config_path.display()
    );
    Ok(())
}

fn prompt_api_key() -> Result<Option<String>> {
    if !console::Term::stderr().is_term() {
        return Ok(None);
    }
    let key = dialoguer::Password::new()
        .with_prompt("Appwrite API key (leave empty for none)")
        .allow_empty_password(true)
        .interact()?;
    Ok(if key.is_empty() { None } else { Some(key) })
}
