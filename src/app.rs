use std::sync::Arc;

use camino::Utf8Path;
use serde::Serialize;

use crate::api::SoundrawApi;
use crate::automation::{Clipboard, ScriptRunner};
use crate::domain::{GenreOptions, Sample, SearchQuery};
use crate::download::{CachedFile, Downloader, Fetcher};
use crate::error::SoundrawError;
use crate::player::Player;
use crate::playback::PlaybackCoordinator;
use crate::store::{ClearResult, Store};

#[derive(Debug, Clone, Serialize)]
pub struct SearchResult {
    pub page: u32,
    pub limit: u32,
    pub genres: Vec<String>,
    pub total_count: Option<u64>,
    pub samples: Vec<Sample>,
}

#[derive(Debug, Clone, Serialize)]
pub struct FileResult {
    pub id: String,
    pub name: String,
    pub path: String,
    pub content_type: String,
    pub bytes: usize,
    pub action: String,
}

impl FileResult {
    fn new(sample: &Sample, file: &CachedFile) -> Self {
        Self {
            id: sample.id.to_string(),
            name: sample.name.clone(),
            path: file.path.to_string(),
            content_type: file.content_type.clone(),
            bytes: file.len(),
            action: if file.downloaded { "download" } else { "cache" }.to_string(),
        }
    }
}

pub struct App<A: SoundrawApi, F: Fetcher> {
    store: Store,
    api: A,
    downloader: Arc<Downloader<F>>,
}

impl<A: SoundrawApi, F: Fetcher + 'static> App<A, F> {
    pub fn new(store: Store, api: A, fetcher: F) -> Self {
        Self {
            store,
            api,
            downloader: Arc::new(Downloader::new(fetcher)),
        }
    }

    pub fn store(&self) -> &Store {
        &self.store
    }

    pub fn api(&self) -> &A {
        &self.api
    }

    pub fn downloader(&self) -> &Arc<Downloader<F>> {
        &self.downloader
    }

    pub fn genres(&self) -> Result<GenreOptions, SoundrawError> {
        self.api.genres()
    }

    pub fn search(&self, query: SearchQuery) -> Result<SearchResult, SoundrawError> {
        let query = query.validated()?;
        let response = self.api.search(&query)?;
        tracing::debug!(count = response.samples.len(), page = query.page, "search finished");
        Ok(SearchResult {
            page: query.page,
            limit: query.limit,
            genres: query.genres,
            total_count: response.total_count,
            samples: response.samples,
        })
    }

    pub fn export_sample(&self, sample: &Sample) -> Result<FileResult, SoundrawError> {
        self.store.ensure_export_root()?;
        let file =
            self.downloader
                .get_or_fetch(&sample.url, self.store.export_root(), &sample.name)?;
        tracing::info!(sample = %sample.id, path = %file.path, "exported sample");
        Ok(FileResult::new(sample, &file))
    }

    pub fn prepare_sample(&self, sample: &Sample) -> Result<FileResult, SoundrawError> {
        self.store.ensure_scratch_root()?;
        let file =
            self.downloader
                .get_or_fetch(&sample.url, self.store.scratch_root(), &sample.name)?;
        Ok(FileResult::new(sample, &file))
    }

    pub fn share_url(&self, sample: &Sample) -> String {
        sample.url.clone()
    }

    pub fn export_to_clipboard<R: ScriptRunner>(
        &self,
        sample: &Sample,
        clipboard: &Clipboard<R>,
    ) -> Result<FileResult, SoundrawError> {
        let result = self.export_sample(sample)?;
        clipboard.copy_file(Utf8Path::new(&result.path))?;
        Ok(result)
    }

    pub fn share_to_clipboard<R: ScriptRunner>(
        &self,
        sample: &Sample,
        clipboard: &Clipboard<R>,
    ) -> Result<String, SoundrawError> {
        let url = self.share_url(sample);
        clipboard.copy_text(&url)?;
        tracing::debug!(sample = %sample.id, "copied share link");
        Ok(url)
    }

    pub fn clear_cache(&self) -> Result<ClearResult, SoundrawError> {
        self.store.clear_scratch()
    }

    pub fn playback<P: Player>(&self, player: P) -> Result<PlaybackCoordinator, SoundrawError> {
        self.store.ensure_scratch_root()?;
        PlaybackCoordinator::new(
            Arc::clone(&self.downloader),
            player,
            self.store.scratch_root().to_path_buf(),
        )
    }
}
