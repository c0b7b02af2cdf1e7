use std::collections::BTreeMap;
use std::fmt;

use serde::{Deserialize, Serialize};

use crate::error::SoundrawError;

pub const DEFAULT_PAGE_SIZE: u32 = 20;
pub const MAX_PAGE_SIZE: u32 = 100;

#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(from = "RawSampleId")]
pub struct SampleId(String);

impl SampleId {
    pub fn new(value: impl Into<String>) -> Self {
        Self(value.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for SampleId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

#[derive(Deserialize)]
#[serde(untagged)]
enum RawSampleId {
    Text(String),
    Number(i64),
}

impl From<RawSampleId> for SampleId {
    fn from(raw: RawSampleId) -> Self {
        match raw {
            RawSampleId::Text(value) => Self(value),
            RawSampleId::Number(value) => Self(value.to_string()),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Sample {
    pub id: SampleId,
    pub name: String,
    #[serde(rename = "sample")]
    pub url: String,
    #[serde(default)]
    pub bpm: Option<f64>,
    #[serde(default)]
    pub genres: Vec<String>,
    #[serde(default)]
    pub duration: Option<f64>,
}

impl Sample {
    pub fn new(id: impl Into<String>, name: impl Into<String>, url: impl Into<String>) -> Self {
        Self {
            id: SampleId::new(id),
            name: name.into(),
            url: url.into(),
            bpm: None,
            genres: Vec::new(),
            duration: None,
        }
    }

    pub fn bpm_label(&self) -> Option<String> {
        self.bpm.map(|bpm| format!("{} BPM", bpm.round() as i64))
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Genre {
    pub key: String,
    pub name: String,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct GenreOptions {
    pub genres: Vec<Genre>,
    pub total_count: u64,
}

impl GenreOptions {
    pub fn get(&self, key: &str) -> Option<&Genre> {
        self.genres.iter().find(|genre| genre.key == key)
    }

    pub fn as_map(&self) -> BTreeMap<&str, &str> {
        self.genres
            .iter()
            .map(|genre| (genre.key.as_str(), genre.name.as_str()))
            .collect()
    }
}

impl From<TagsResponse> for GenreOptions {
    fn from(response: TagsResponse) -> Self {
        let total_count = response
            .total_count
            .unwrap_or(response.genres.len() as u64);
        let genres = response
            .genres
            .into_iter()
            .map(|(key, name)| Genre { key, name })
            .collect();
        Self {
            genres,
            total_count,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct TagsResponse {
    #[serde(default)]
    pub genres: BTreeMap<String, String>,
    #[serde(default)]
    pub total_count: Option<u64>,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct BeatsResponse {
    #[serde(default)]
    pub samples: Vec<Sample>,
    #[serde(default)]
    pub total_count: Option<u64>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SearchQuery {
    pub genres: Vec<String>,
    pub page: u32,
    pub limit: u32,
}

impl Default for SearchQuery {
    fn default() -> Self {
        Self {
            genres: Vec::new(),
            page: 1,
            limit: DEFAULT_PAGE_SIZE,
        }
    }
}

impl SearchQuery {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn genre(mut self, genre: impl Into<String>) -> Self {
        let genre = genre.into();
        let trimmed = genre.trim();
        if !trimmed.is_empty() && !self.genres.iter().any(|g| g == trimmed) {
            self.genres.push(trimmed.to_string());
        }
        self
    }

    pub fn page(mut self, page: u32) -> Self {
        self.page = page;
        self
    }

    pub fn limit(mut self, limit: u32) -> Self {
        self.limit = limit;
        self
    }

    pub fn validated(mut self) -> Result<Self, SoundrawError> {
        if self.page == 0 {
            return Err(SoundrawError::InvalidQuery(
                "page numbers start at 1".to_string(),
            ));
        }
        self.limit = self.limit.clamp(1, MAX_PAGE_SIZE);
        Ok(self)
    }

    pub fn to_pairs(&self) -> Vec<(&'static str, String)> {
        let mut pairs = self
            .genres
            .iter()
            .map(|genre| ("genres[]", genre.clone()))
            .collect::<Vec<_>>();
        pairs.push(("page", self.page.to_string()));
        pairs.push(("limit", self.limit.to_string()));
        pairs
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sample_id_accepts_numbers_and_strings() {
        let numeric: Sample =
            serde_json::from_str(r#"{"id": 42, "name": "A", "sample": "https://x/a.m4a"}"#)
                .unwrap();
        let text: Sample =
            serde_json::from_str(r#"{"id": "b-7", "name": "B", "sample": "https://x/b.m4a", "bpm": 120}"#)
                .unwrap();
        assert_eq!(numeric.id.as_str(), "42");
        assert_eq!(text.id.as_str(), "b-7");
        assert_eq!(text.bpm_label().as_deref(), Some("120 BPM"));
        assert!(numeric.bpm.is_none());
    }

    #[test]
    fn query_rejects_page_zero_and_clamps_limit() {
        assert!(SearchQuery::new().page(0).validated().is_err());
        let query = SearchQuery::new().limit(5000).validated().unwrap();
        assert_eq!(query.limit, MAX_PAGE_SIZE);
    }

    #[test]
    fn query_pairs_repeat_genres() {
        let query = SearchQuery::new().genre("rock").genre("jazz").genre("rock");
        let pairs = query.to_pairs();
        assert_eq!(
            pairs,
            vec![
                ("genres[]", "rock".to_string()),
                ("genres[]", "jazz".to_string()),
                ("page", "1".to_string()),
                ("limit", "20".to_string()),
            ]
        );
    }
}
