use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use anyhow::{Result, anyhow};

pub const DEFAULT_SERVICE_URL: &str = "https://lntcs.ai/chatservice/chat";
pub const DEFAULT_SPACE_NAME: &str = "Insurance_usecase";
pub const DEFAULT_FLOW_NAME: &str = "Quote-Comp";

/// Environment variable consulted before the config file for the bearer token.
pub const TOKEN_ENV_VAR: &str = "POLICHAT_TOKEN";

#[derive(Serialize, Deserialize, Debug, Clone)]
pub struct Config {
    pub service_url: Option<String>,
    pub space_name: Option<String>,
    pub flow_name: Option<String>,
    pub api_token: Option<String>,
}

impl Config {
    pub fn new() -> Self {
        Self {
            service_url: Some(DEFAULT_SERVICE_URL.to_string()),
            space_name: Some(DEFAULT_SPACE_NAME.to_string()),
            flow_name: Some(DEFAULT_FLOW_NAME.to_string()),
            api_token: None,
        }
    }

    pub fn load() -> Result<Self> {
        Self::load_from(&Self::config_path()?)
    }

    pub fn load_from(path: &Path) -> Result<Self> {
        if !path.exists() {
            return Ok(Self::new());
        }

        let content = fs::read_to_string(path)?;
        let config: Config = serde_json::from_str(&content)?;
        Ok(config)
    }

    pub fn save(&self) -> Result<()> {
        self.save_to(&Self::config_path()?)
    }

    pub fn save_to(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }

        let content = serde_json::to_string_pretty(self)?;
        fs::write(path, content)?;
        Ok(())
    }

    /// Bearer token for the chat service: the environment wins over the
    /// config file. The token is never baked into the binary.
    pub fn resolve_token(&self) -> Option<String> {
        std::env::var(TOKEN_ENV_VAR)
            .ok()
            .filter(|t| !t.is_empty())
            .or_else(|| self.api_token.clone())
    }

    pub fn service_url(&self) -> String {
        self.service_url
            .clone()
            .unwrap_or_else(|| DEFAULT_SERVICE_URL.to_string())
    }

    pub fn space_name(&self) -> String {
        self.space_name
            .clone()
            .unwrap_or_else(|| DEFAULT_SPACE_NAME.to_string())
    }

    pub fn flow_name(&self) -> String {
        self.flow_name
            .clone()
            .unwrap_or_else(|| DEFAULT_FLOW_NAME.to_string())
    }

    fn config_path() -> Result<PathBuf> {
        let config_dir = dirs::config_dir()
            .ok_or_else(|| anyhow!("Could not determine config directory"))?;

        Ok(config_dir.join("polichat").join("config.json"))
    }
}
