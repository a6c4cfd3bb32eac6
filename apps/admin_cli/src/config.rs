use std::{
    collections::HashMap,
    fs, io,
    path::{Path, PathBuf},
};

use anyhow::{bail, Context};
use gateway::RestGatewayConfig;

pub const DEFAULT_CONFIG_FILE: &str = "petadmin.toml";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Settings {
    pub backend_url: Option<String>,
    pub api_key: Option<String>,
    pub access_token: Option<String>,
    pub user_agent: String,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            backend_url: None,
            api_key: None,
            access_token: None,
            user_agent: concat!("petadmin/", env!("CARGO_PKG_VERSION")).into(),
        }
    }
}

/// Values passed on the command line; they win over every other layer.
#[derive(Debug, Clone, Default)]
pub struct Overrides {
    pub backend_url: Option<String>,
    pub api_key: Option<String>,
    pub access_token: Option<String>,
}

impl Settings {
    pub fn apply_file(&mut self, raw: &str) -> anyhow::Result<()> {
        let file_cfg = toml::from_str::<HashMap<String, String>>(raw)
            .context("config file must be a flat table of strings")?;

        if let Some(v) = file_cfg.get("backend_url") {
            self.backend_url = Some(v.clone());
        }
        if let Some(v) = file_cfg.get("api_key") {
            self.api_key = Some(v.clone());
        }
        if let Some(v) = file_cfg.get("access_token") {
            self.access_token = Some(v.clone());
        }
        if let Some(v) = file_cfg.get("user_agent") {
            self.user_agent = v.clone();
        }
        Ok(())
    }

    /// Later names in each pair take precedence.
    pub fn apply_env(&mut self, var: impl Fn(&str) -> Option<String>) {
        if let Some(v) = var("SUPABASE_URL") {
            self.backend_url = Some(v);
        }
        if let Some(v) = var("APP__BACKEND_URL") {
            self.backend_url = Some(v);
        }

        if let Some(v) = var("SUPABASE_ANON_KEY") {
            self.api_key = Some(v);
        }
        if let Some(v) = var("APP__API_KEY") {
            self.api_key = Some(v);
        }

        if let Some(v) = var("PETADMIN_ACCESS_TOKEN") {
            self.access_token = Some(v);
        }
        if let Some(v) = var("APP__ACCESS_TOKEN") {
            self.access_token = Some(v);
        }
    }

    pub fn apply_overrides(&mut self, overrides: Overrides) {
        if let Some(v) = overrides.backend_url {
            self.backend_url = Some(v);
        }
        if let Some(v) = overrides.api_key {
            self.api_key = Some(v);
        }
        if let Some(v) = overrides.access_token {
            self.access_token = Some(v);
        }
    }

    pub fn gateway_config(&self) -> anyhow::Result<RestGatewayConfig> {
        let Some(base_url) = non_blank(&self.backend_url) else {
            bail!("backend url is not configured (set SUPABASE_URL or --backend-url)");
        };
        let Some(api_key) = non_blank(&self.api_key) else {
            bail!("api key is not configured (set SUPABASE_ANON_KEY or --api-key)");
        };

        Ok(RestGatewayConfig {
            base_url,
            api_key,
            access_token: non_blank(&self.access_token),
            user_agent: Some(self.user_agent.clone()),
        })
    }
}

fn non_blank(value: &Option<String>) -> Option<String> {
    value
        .as_deref()
        .map(str::trim)
        .filter(|v| !v.is_empty())
        .map(str::to_string)
}

/// Defaults, then the config file, then the process environment.
pub fn load_settings(config_path: Option<&Path>) -> anyhow::Result<Settings> {
    let mut settings = Settings::default();

    let path = config_path
        .map(Path::to_path_buf)
        .unwrap_or_else(|| PathBuf::from(DEFAULT_CONFIG_FILE));
    match fs::read_to_string(&path) {
        Ok(raw) => settings
            .apply_file(&raw)
            .with_context(|| format!("failed to parse '{}'", path.display()))?,
        // Only the implicit default file may be absent.
        Err(err) if err.kind() == io::ErrorKind::NotFound && config_path.is_none() => {}
        Err(err) => {
            return Err(err).with_context(|| format!("failed to read '{}'", path.display()));
        }
    }

    settings.apply_env(|key| std::env::var(key).ok());
    Ok(settings)
}

#[cfg(test)]
#[path = "tests/config_tests.rs"]
mod tests;
