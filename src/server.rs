use crate::config::ServerConfig;
use crate::diff::DiffFile;
use crate::load::{FragmentSource, LoadError, LoadQueueEntry, LoadTask};
use anyhow::{Context, Result};
use reqwest::blocking::Client;
use reqwest::header::{HeaderMap, HeaderValue, ACCEPT, AUTHORIZATION};
use serde::Deserialize;
use std::time::Duration;

/// Where a review request's diff fragments live
#[derive(Debug, Clone)]
pub struct FragmentEndpoint {
    /// Server base URL without trailing slash
    pub server: String,
    pub review_request: u64,
    pub context_lines: Option<u32>,
    pub show_deleted: bool,
    /// Fixed for one page load; busts intermediate caches between loads
    pub serial: u64,
}

impl FragmentEndpoint {
    pub fn new(server: &str, review_request: u64) -> Self {
        FragmentEndpoint {
            server: server.trim_end_matches('/').to_string(),
            review_request,
            context_lines: None,
            show_deleted: false,
            serial: 0,
        }
    }

    /// `.../diff/<rev>[-<interdiff>]/fragment/<filediff>[-<interfilediff>]/[chunk/<n>/]?...`
    pub fn url_for(&self, entry: &LoadQueueEntry) -> String {
        let file = &entry.file;
        let mut url = format!(
            "{}/r/{}/diff/{}/fragment/{}/",
            self.server,
            self.review_request,
            file.revision_segment(),
            file.file_segment()
        );
        if let LoadTask::Chunk { chunk_index, .. } = entry.task {
            url.push_str(&format!("chunk/{}/", chunk_index));
        }

        url.push_str(&format!("?index={}", file.index));
        if let Some(lines) = self.context_lines {
            url.push_str(&format!("&lines-of-context={}", lines));
        }
        url.push_str(&format!(
            "&show-deleted={}&_={}",
            if self.show_deleted { 1 } else { 0 },
            self.serial
        ));
        url
    }
}

/// Blocking HTTP client with the configured timeout and auth token
pub fn build_client(config: &ServerConfig) -> Result<Client> {
    let mut headers = HeaderMap::new();
    if let Some(token) = &config.api_token {
        let value = HeaderValue::from_str(&format!("token {}", token))
            .context("API token contains characters not allowed in a header")?;
        headers.insert(AUTHORIZATION, value);
    }
    Client::builder()
        .timeout(Duration::from_secs(config.timeout_secs))
        .user_agent(concat!("rbd/", env!("CARGO_PKG_VERSION")))
        .default_headers(headers)
        .build()
        .context("Failed to build HTTP client")
}

/// Fragment source talking to the review server
pub struct HttpFragmentSource {
    client: Client,
    endpoint: FragmentEndpoint,
}

impl HttpFragmentSource {
    pub fn new(client: Client, endpoint: FragmentEndpoint) -> Self {
        HttpFragmentSource { client, endpoint }
    }
}

impl FragmentSource for HttpFragmentSource {
    fn fetch(&self, entry: &LoadQueueEntry) -> Result<String, LoadError> {
        let url = self.endpoint.url_for(entry);
        log::debug!("GET {}", url);
        let response = self
            .client
            .get(&url)
            .header(ACCEPT, "text/x-patch")
            .send()?;
        let status = response.status();
        if !status.is_success() {
            return Err(LoadError::Status {
                status: status.as_u16(),
                url,
            });
        }
        Ok(response.text()?)
    }
}

#[derive(Debug, Deserialize)]
struct FileListResponse {
    files: Vec<FileEntry>,
}

#[derive(Debug, Deserialize)]
struct FileEntry {
    id: u64,
    #[serde(default)]
    source_file: String,
    #[serde(default)]
    dest_file: String,
    #[serde(default)]
    interfilediff: Option<FileLink>,
}

#[derive(Debug, Deserialize)]
struct FileLink {
    id: u64,
}

/// List the files of a diff revision (or interdiff) through the web API
pub fn list_files(
    client: &Client,
    server: &str,
    review_request: u64,
    revision: u32,
    interdiff_revision: Option<u32>,
) -> Result<Vec<DiffFile>> {
    let mut url = format!(
        "{}/api/review-requests/{}/diffs/{}/files/",
        server.trim_end_matches('/'),
        review_request,
        revision
    );
    if let Some(interdiff) = interdiff_revision {
        url.push_str(&format!("?interdiff-revision={}", interdiff));
    }
    log::info!("listing files from {}", url);

    let response = client
        .get(&url)
        .header(ACCEPT, "application/json")
        .send()
        .with_context(|| format!("Failed to reach {}", url))?;
    let status = response.status();
    if !status.is_success() {
        anyhow::bail!("Server returned HTTP {} for {}", status.as_u16(), url);
    }
    let list: FileListResponse = response
        .json()
        .with_context(|| format!("Unexpected file list from {}", url))?;

    Ok(files_from_list(list, revision, interdiff_revision))
}

fn files_from_list(list: FileListResponse, revision: u32, interdiff_revision: Option<u32>) -> Vec<DiffFile> {
    list.files
        .into_iter()
        .enumerate()
        .map(|(index, entry)| DiffFile {
            filediff_id: entry.id,
            interfilediff_id: entry.interfilediff.map(|l| l.id),
            revision,
            interdiff_revision,
            index,
            path: if entry.dest_file.is_empty() {
                entry.source_file
            } else {
                entry.dest_file
            },
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn file(interdiff: Option<u32>, inter: Option<u64>) -> DiffFile {
        DiffFile {
            filediff_id: 31,
            interfilediff_id: inter,
            revision: 2,
            interdiff_revision: interdiff,
            index: 4,
            path: "src/a.c".into(),
        }
    }

    fn endpoint() -> FragmentEndpoint {
        let mut endpoint = FragmentEndpoint::new("https://reviews.example.com/", 88);
        endpoint.serial = 1700000000000;
        endpoint
    }

    #[test]
    fn file_fragment_url() {
        let url = endpoint().url_for(&LoadQueueEntry::file(4, file(None, None)));
        assert_eq!(
            url,
            "https://reviews.example.com/r/88/diff/2/fragment/31/?index=4&show-deleted=0&_=1700000000000"
        );
    }

    #[test]
    fn interdiff_chunk_url_with_context() {
        let mut endpoint = endpoint();
        endpoint.context_lines = Some(10);
        endpoint.show_deleted = true;
        let entry = LoadQueueEntry {
            container: 4,
            file: file(Some(3), Some(57)),
            task: LoadTask::Chunk { group: 6, chunk_index: 5 },
            generation: 0,
        };
        assert_eq!(
            endpoint.url_for(&entry),
            "https://reviews.example.com/r/88/diff/2-3/fragment/31-57/chunk/5/?index=4&lines-of-context=10&show-deleted=1&_=1700000000000"
        );
    }

    #[test]
    fn file_list_maps_to_descriptors() {
        let json = r#"{"files": [
            {"id": 5, "source_file": "old.c", "dest_file": "new.c"},
            {"id": 6, "source_file": "gone.c", "dest_file": "", "interfilediff": {"id": 60}}
        ], "total_results": 2}"#;
        let list: FileListResponse = serde_json::from_str(json).unwrap();
        let files = files_from_list(list, 2, Some(3));
        assert_eq!(files.len(), 2);
        assert_eq!(files[0].path, "new.c");
        assert_eq!(files[0].index, 0);
        assert_eq!(files[1].path, "gone.c");
        assert_eq!(files[1].interfilediff_id, Some(60));
        assert_eq!(files[1].interdiff_revision, Some(3));
    }
}
