use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};

use inkpress_appwrite::{AppwriteClient, ClientConfig, Credentials};
use inkpress_core::ContentService;
use inkpress_core::backend::appwrite::{AppwriteBackend, AppwriteTargets};
use inkpress_core::backend::local::LocalBackend;

const CONFIG_FILE: &str = "inkpress.toml";

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AppConfig {
    pub backend: BackendConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum BackendConfig {
    #[serde(rename = "local")]
    Local { path: String },
    #[serde(rename = "appwrite")]
    Appwrite {
        endpoint: String,
        project_id: String,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        api_key: Option<String>,
        /// Account JWT, for acting as a signed-in user instead of a server key.
        #[serde(default, skip_serializing_if = "Option::is_none")]
        jwt: Option<String>,
        database_id: String,
        collection_id: String,
        bucket_id: String,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        timeout_secs: Option<u64>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        max_retries: Option<u32>,
    },
}

impl AppConfig {
    pub fn default_path() -> PathBuf {
        dirs::config_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join("inkpress")
            .join(CONFIG_FILE)
    }

    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path).with_context(|| {
            format!(
                "config not found at {} (run `inkpress init` first)",
                path.display()
            )
        })?;
        toml::from_str(&content).context("failed to parse config")
    }

    pub fn save(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let content = toml::to_string_pretty(self)?;
        std::fs::write(path, content)
            .with_context(|| format!("failed to write config to {}", path.display()))?;
        Ok(())
    }

    /// Build the content service for the configured backend.
    pub fn open_service(&self) -> Result<ContentService> {
        match &self.backend {
            BackendConfig::Local { path } => {
                let backend = LocalBackend::init(path)
                    .with_context(|| format!("failed to open local store at {path}"))?;
                Ok(ContentService::from_backend(Arc::new(backend)))
            }
            BackendConfig::Appwrite {
                endpoint,
                project_id,
                api_key,
                jwt,
                database_id,
                collection_id,
                bucket_id,
                timeout_secs,
                max_retries,
            } => {
                let mut config = ClientConfig::new(endpoint, project_id)
                    .with_credentials(credentials(api_key.as_deref(), jwt.as_deref())?);
                if let Some(secs) = timeout_secs {
                    config = config.with_timeout(Duration::from_secs(*secs));
                }
                if let Some(retries) = max_retries {
                    config = config.with_max_retries(*retries);
                }
                let client = AppwriteClient::new(config).context("invalid Appwrite settings")?;
                let backend = AppwriteBackend::new(
                    client,
                    AppwriteTargets {
                        database_id: database_id.clone(),
                        collection_id: collection_id.clone(),
                        bucket_id: bucket_id.clone(),
                    },
                );
                Ok(ContentService::from_backend(Arc::new(backend)))
            }
        }
    }
}

fn credentials(api_key: Option<&str>, jwt: Option<&str>) -> Result<Credentials> {
    match (api_key, jwt) {
        (Some(_), Some(_)) => anyhow::bail!("set either api_key or jwt, not both"),
        (Some(key), None) => Ok(Credentials::api_key(key)),
        (None, Some(token)) => Ok(Credentials::jwt(token)),
        (None, None) => Ok(Credentials::Anonymous),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_appwrite_config() {
        let raw = r#"
            [backend]
            type = "appwrite"
            endpoint = "https://cloud.appwrite.io/v1"
            project_id = "blog"
            database_id = "main"
            collection_id = "posts"
            bucket_id = "images"
            max_retries = 2
        "#;
        let config: AppConfig = toml::from_str(raw).unwrap();
        match &config.backend {
            BackendConfig::Appwrite {
                project_id,
                api_key,
                max_retries,
                ..
            } => {
                assert_eq!(project_id, "blog");
                assert!(api_key.is_none());
                assert_eq!(*max_retries, Some(2));
            }
            other => panic!("unexpected backend: {other:?}"),
        }
        assert!(config.open_service().is_ok());
    }

    #[test]
    fn jwt_selects_user_credentials() {
        assert!(matches!(
            credentials(None, Some("token")).unwrap(),
            Credentials::Jwt(_)
        ));
        assert!(matches!(
            credentials(Some("key"), None).unwrap(),
            Credentials::ApiKey(_)
        ));
        assert!(matches!(
            credentials(None, None).unwrap(),
            Credentials::Anonymous
        ));

        let raw = r#"
            [backend]
            type = "appwrite"
            endpoint = "https://cloud.appwrite.io/v1"
            project_id = "blog"
            api_key = "key"
            jwt = "token"
            database_id = "main"
            collection_id = "posts"
            bucket_id = "images"
        "#;
        let config: AppConfig = toml::from_str(raw).unwrap();
        let err = config.open_service().err().unwrap();
        assert!(err.to_string().contains("not both"));
    }

    #[test]
    fn save_and_load_local_config() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join(CONFIG_FILE);
        let store = dir.path().join("store");
        let config = AppConfig {
            backend: BackendConfig::Local {
                path: store.display().to_string(),
            },
        };
        config.save(&path).unwrap();

        let loaded = AppConfig::load(&path).unwrap();
        assert!(matches!(loaded.backend, BackendConfig::Local { .. }));
        loaded.open_service().unwrap();
        assert!(store.join("posts").is_dir());
    }

    #[test]
    fn missing_config_mentions_init() {
        let dir = tempfile::tempdir().unwrap();
        let err = AppConfig::load(&dir.path().join("absent.toml")).unwrap_err();
        assert!(err.to_string().contains("inkpress init"));
    }
}
