use std::path::PathBuf;

use miette::Diagnostic;
use thiserror::Error;

#[derive(Debug, Error, Diagnostic)]
pub enum SoundrawError {
    #[error("no API token configured (run `soundraw setup`)")]
    #[diagnostic(code(soundraw::config::token))]
    MissingToken,

    #[error("no API base URL configured (run `soundraw setup`)")]
    #[diagnostic(code(soundraw::config::base_url))]
    MissingBaseUrl,

    #[error("invalid API base URL: {0}")]
    #[diagnostic(code(soundraw::config::base_url))]
    InvalidBaseUrl(String),

    #[error("failed to read config file at {0}")]
    ConfigRead(PathBuf),

    #[error("failed to parse config: {0}")]
    ConfigParse(String),

    #[error("Soundraw request failed: {0}")]
    Network(String),

    #[error("Soundraw returned status {status}: {message}")]
    Api { status: u16, message: String },

    #[error("download failed with status {status}: {message}")]
    Download { status: u16, message: String },

    #[error("download produced no content: {0}")]
    EmptyDownload(String),

    #[error("automation failed: {0}")]
    #[diagnostic(help("check that the terminal may control other apps in System Settings > Privacy & Security > Automation"))]
    Automation(String),

    #[error("{app} did not come to the foreground after {attempts} attempts")]
    FocusTimeout { app: String, attempts: u32 },

    #[error("playback coordinator has been shut down")]
    PlaybackClosed,

    #[error("filesystem error: {0}")]
    Filesystem(String),

    #[error("invalid search query: {0}")]
    InvalidQuery(String),
}

impl SoundrawError {
    pub fn is_configuration(&self) -> bool {
        matches!(
            self,
            SoundrawError::MissingToken
                | SoundrawError::MissingBaseUrl
                | SoundrawError::InvalidBaseUrl(_)
                | SoundrawError::ConfigRead(_)
                | SoundrawError::ConfigParse(_)
        )
    }
}
