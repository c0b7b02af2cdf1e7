pub mod api;
pub mod app;
pub mod automation;
pub mod browser;
pub mod config;
pub mod domain;
pub mod download;
pub mod error;
pub mod fingerprint;
pub mod output;
pub mod playback;
pub mod player;
pub mod store;
pub mod tui;
