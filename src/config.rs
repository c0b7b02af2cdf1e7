use std::fs;

use camino::{Utf8Path, Utf8PathBuf};
use chrono::{DateTime, Utc};
use reqwest::Url;
use serde::{Deserialize, Serialize};

use crate::error::SoundrawError;
use crate::store::{Store, app_config_dir};

pub const CONFIG_FILE: &str = "config.json";

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SoundrawConfig {
    #[serde(default)]
    pub token: String,
    #[serde(default)]
    pub api_base_url: String,
    pub created_at: DateTime<Utc>,
}

impl SoundrawConfig {
    pub fn new(token: impl Into<String>, api_base_url: impl Into<String>) -> Self {
        Self {
            token: token.into().trim().to_string(),
            api_base_url: api_base_url.into().trim().to_string(),
            created_at: Utc::now(),
        }
    }

    pub fn validate(&self) -> Result<ResolvedConfig, SoundrawError> {
        let token = self.token.trim();
        if token.is_empty() {
            return Err(SoundrawError::MissingToken);
        }
        let base = self.api_base_url.trim();
        if base.is_empty() {
            return Err(SoundrawError::MissingBaseUrl);
        }
        let parsed =
            Url::parse(base).map_err(|err| SoundrawError::InvalidBaseUrl(format!("{base}: {err}")))?;
        if !matches!(parsed.scheme(), "http" | "https") {
            return Err(SoundrawError::InvalidBaseUrl(format!(
                "{base}: scheme must be http or https"
            )));
        }
        Ok(ResolvedConfig {
            token: token.to_string(),
            api_base_url: base.trim_end_matches('/').to_string(),
        })
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResolvedConfig {
    pub token: String,
    pub api_base_url: String,
}

impl ResolvedConfig {
    pub fn endpoint(&self, path: &str) -> String {
        format!("{}/{}", self.api_base_url, path.trim_start_matches('/'))
    }
}

#[derive(Debug, Clone)]
pub struct ConfigStore {
    path: Utf8PathBuf,
}

impl ConfigStore {
    pub fn new() -> Result<Self, SoundrawError> {
        Ok(Self {
            path: app_config_dir()?.join(CONFIG_FILE),
        })
    }

    pub fn at(path: impl Into<Utf8PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Utf8Path {
        &self.path
    }

    pub fn load(&self) -> Result<Option<SoundrawConfig>, SoundrawError> {
        if !self.path.as_std_path().exists() {
            return Ok(None);
        }
        let content = fs::read_to_string(self.path.as_std_path())
            .map_err(|_| SoundrawError::ConfigRead(self.path.clone().into_std_path_buf()))?;
        let config = serde_json::from_str(&content)
            .map_err(|err| SoundrawError::ConfigParse(err.to_string()))?;
        Ok(Some(config))
    }

    pub fn require(&self) -> Result<ResolvedConfig, SoundrawError> {
        match self.load()? {
            Some(config) => config.validate(),
            None => Err(SoundrawError::MissingToken),
        }
    }

    pub fn save(&self, config: &SoundrawConfig) -> Result<(), SoundrawError> {
        config.validate()?;
        let content = serde_json::to_vec_pretty(config)
            .map_err(|err| SoundrawError::ConfigParse(err.to_string()))?;
        Store::write_bytes_atomic(&self.path, &content)
    }

    pub fn reset(&self) -> Result<bool, SoundrawError> {
        Store::remove_file_if_exists(&self.path)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn validate_trims_trailing_slash() {
        let config = SoundrawConfig::new(" tok ", "https://api.example.com/v2/");
        let resolved = config.validate().unwrap();
        assert_eq!(resolved.token, "tok");
        assert_eq!(resolved.endpoint("/tags"), "https://api.example.com/v2/tags");
    }

    #[test]
    fn validate_rejects_non_http_scheme() {
        let config = SoundrawConfig::new("tok", "ftp://api.example.com");
        assert!(matches!(
            config.validate(),
            Err(SoundrawError::InvalidBaseUrl(_))
        ));
    }
}
