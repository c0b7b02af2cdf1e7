use std::thread;
use std::time::Duration;

use reqwest::blocking::{Client, RequestBuilder, Response};
use reqwest::header::{ACCEPT, HeaderMap, HeaderValue, USER_AGENT};
use serde::de::DeserializeOwned;

use crate::config::{ConfigStore, ResolvedConfig};
use crate::domain::{BeatsResponse, GenreOptions, SearchQuery, TagsResponse};
use crate::error::SoundrawError;

pub trait SoundrawApi: Send + Sync {
    fn genres(&self) -> Result<GenreOptions, SoundrawError>;
    fn search(&self, query: &SearchQuery) -> Result<BeatsResponse, SoundrawError>;
}

#[derive(Clone)]
pub struct SoundrawHttpClient {
    client: Client,
    config: ConfigStore,
}

impl SoundrawHttpClient {
    pub fn new(config: ConfigStore) -> Result<Self, SoundrawError> {
        let mut headers = HeaderMap::new();
        headers.insert(
            USER_AGENT,
            HeaderValue::from_str(&format!("soundraw-browser/{}", env!("CARGO_PKG_VERSION")))
                .map_err(|err| SoundrawError::Network(err.to_string()))?,
        );
        headers.insert(ACCEPT, HeaderValue::from_static("application/json"));
        let client = Client::builder()
            .default_headers(headers)
            .timeout(Duration::from_secs(30))
            .build()
            .map_err(|err| SoundrawError::Network(err.to_string()))?;
        Ok(Self { client, config })
    }

    fn get_json<T: DeserializeOwned>(
        &self,
        path: &str,
        query: &[(&str, String)],
    ) -> Result<T, SoundrawError> {
        // Credential problems must surface before anything goes on the wire.
        let resolved = self.config.require()?;
        let url = resolved.endpoint(path);
        tracing::debug!(%url, "soundraw request");
        let response = self.send_with_retries(|| self.authorized(&resolved, &url).query(query))?;
        let response = handle_status(response)?;
        response
            .json::<T>()
            .map_err(|err| SoundrawError::Network(format!("decode {path}: {err}")))
    }

    fn authorized(&self, resolved: &ResolvedConfig, url: &str) -> RequestBuilder {
        self.client.get(url).bearer_auth(&resolved.token)
    }

    fn send_with_retries<F>(&self, mut make_req: F) -> Result<Response, SoundrawError>
    where
        F: FnMut() -> RequestBuilder,
    {
        const MAX_RETRIES: usize = 3;
        const BASE_DELAY_MS: u64 = 200;
        let mut attempt = 0usize;
        loop {
            match make_req().send() {
                Ok(resp) => {
                    let status = resp.status().as_u16();
                    if attempt < MAX_RETRIES && is_retryable_status(status) {
                        tracing::debug!(status, attempt, "retrying soundraw request");
                        thread::sleep(Duration::from_millis(BASE_DELAY_MS * (attempt as u64 + 1)));
                        attempt += 1;
                        continue;
                    }
                    return Ok(resp);
                }
                // Transport failures go straight back to the caller.
                Err(err) => return Err(SoundrawError::Network(err.to_string())),
            }
        }
    }
}

impl SoundrawApi for SoundrawHttpClient {
    fn genres(&self) -> Result<GenreOptions, SoundrawError> {
        let tags: TagsResponse = self.get_json("tags", &[])?;
        Ok(GenreOptions::from(tags))
    }

    fn search(&self, query: &SearchQuery) -> Result<BeatsResponse, SoundrawError> {
        let query = query.clone().validated()?;
        self.get_json("beats", &query.to_pairs())
    }
}

fn handle_status(response: Response) -> Result<Response, SoundrawError> {
    if response.status().is_success() {
        return Ok(response);
    }
    let status = response.status().as_u16();
    let message = response
        .text()
        .ok()
        .map(|body| api_error_message(&body))
        .filter(|message| !message.is_empty())
        .unwrap_or_else(|| "Soundraw request failed".to_string());
    Err(SoundrawError::Api { status, message })
}

fn api_error_message(body: &str) -> String {
    serde_json::from_str::<serde_json::Value>(body)
        .ok()
        .and_then(|value| {
            value
                .get("message")
                .or_else(|| value.get("error"))
                .and_then(|field| field.as_str())
                .map(|field| field.to_string())
        })
        .unwrap_or_else(|| body.trim().to_string())
}

pub(crate) fn is_retryable_status(status: u16) -> bool {
    matches!(status, 429 | 500 | 502 | 503 | 504)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn error_message_prefers_json_field() {
        assert_eq!(api_error_message(r#"{"message":"bad token"}"#), "bad token");
        assert_eq!(api_error_message(r#"{"error":"nope"}"#), "nope");
        assert_eq!(api_error_message(" plain text "), "plain text");
    }
}
