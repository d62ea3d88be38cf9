//! Where submitted notebooks come from.
//!
//! A source turns a location into bytes; failures never reach the matcher.
//! They are logged and the submission is carried on as absent.
use crate::notebook::Notebook;
use crate::util::sha256_hex;
use anyhow::{anyhow, Context, Result};
use rayon::prelude::*;
use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Upper bound on a single downloaded notebook; embedded images add up.
const MAX_NOTEBOOK_BYTES: u64 = 64 * 1024 * 1024;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Submission {
    pub id: String,
    pub location: String,
}

impl Submission {
    pub fn new(id: impl Into<String>, location: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            location: location.into(),
        }
    }

    /// Parse `ID=LOCATION` or a bare `LOCATION`.
    ///
    /// A bare URL is named after its first path segment, which is the account
    /// name for `raw.githubusercontent.com/<user>/<repo>/...`. A bare path is
    /// named after its file stem.
    pub fn parse(entry: &str) -> Result<Self> {
        let entry = entry.trim();
        if entry.is_empty() {
            return Err(anyhow!("empty submission"));
        }
        if let Some((id, location)) = entry.split_once('=') {
            let id = id.trim();
            if !id.is_empty() && !id.contains(['/', ':', '\\']) {
                let location = location.trim();
                if location.is_empty() {
                    return Err(anyhow!("submission {id} has no location"));
                }
                return Ok(Self::new(id, location));
            }
        }
        let id = if is_url(entry) {
            entry
                .split('/')
                .nth(3)
                .filter(|segment| !segment.is_empty())
                .ok_or_else(|| anyhow!("cannot name submission from URL {entry}; use ID=URL"))?
                .to_string()
        } else {
            Path::new(entry)
                .file_stem()
                .map(|stem| stem.to_string_lossy().to_string())
                .ok_or_else(|| anyhow!("cannot name submission from path {entry}; use ID=PATH"))?
        };
        Ok(Self::new(id, entry))
    }
}

/// Read one submission per line; blank lines and `#` comments are skipped.
pub fn load_submissions_file(path: &Path) -> Result<Vec<Submission>> {
    let text =
        fs::read_to_string(path).with_context(|| format!("read submissions {}", path.display()))?;
    text.lines()
        .enumerate()
        .map(|(idx, line)| (idx, line.trim()))
        .filter(|(_, line)| !line.is_empty() && !line.starts_with('#'))
        .map(|(idx, line)| {
            Submission::parse(line).with_context(|| format!("{}:{}", path.display(), idx + 1))
        })
        .collect()
}

#[derive(Debug, Clone)]
pub struct FetchedSubmission {
    pub submission: Submission,
    pub notebook: Option<Notebook>,
}

pub trait DocumentSource: Sync {
    /// Raw notebook bytes at `location`.
    fn load(&self, location: &str) -> Result<Vec<u8>>;

    /// Parsed notebook, or `None` when it cannot be loaded or parsed.
    fn fetch(&self, submission: &Submission) -> Option<Notebook> {
        let parsed = self
            .load(&submission.location)
            .and_then(|bytes| Notebook::from_slice(&bytes));
        match parsed {
            Ok(notebook) => Some(notebook),
            Err(err) => {
                tracing::warn!(
                    submission = %submission.id,
                    location = %submission.location,
                    error = %format!("{err:#}"),
                    "notebook unavailable"
                );
                None
            }
        }
    }
}

fn is_url(location: &str) -> bool {
    location.starts_with("http://") || location.starts_with("https://")
}

pub struct FileSource;

impl DocumentSource for FileSource {
    fn load(&self, location: &str) -> Result<Vec<u8>> {
        fs::read(location).with_context(|| format!("read {location}"))
    }
}

pub struct HttpSource {
    agent: ureq::Agent,
}

impl HttpSource {
    pub fn new(timeout: Duration) -> Self {
        let agent = ureq::Agent::config_builder()
            .timeout_global(Some(timeout))
            .build()
            .into();
        Self { agent }
    }
}

impl DocumentSource for HttpSource {
    fn load(&self, location: &str) -> Result<Vec<u8>> {
        let mut response = self
            .agent
            .get(location)
            .call()
            .with_context(|| format!("GET {location}"))?;
        response
            .body_mut()
            .with_config()
            .limit(MAX_NOTEBOOK_BYTES)
            .read_to_vec()
            .with_context(|| format!("read body of {location}"))
    }
}

/// Sends URLs to `http` and everything else straight to the filesystem.
pub struct LocationSource {
    files: FileSource,
    http: Box<dyn DocumentSource>,
}

impl LocationSource {
    pub fn new(http: impl DocumentSource + 'static) -> Self {
        Self {
            files: FileSource,
            http: Box::new(http),
        }
    }
}

impl DocumentSource for LocationSource {
    fn load(&self, location: &str) -> Result<Vec<u8>> {
        if is_url(location) {
            self.http.load(location)
        } else {
            self.files.load(location)
        }
    }
}

/// Keeps a copy of every notebook downloaded through `inner` on disk, keyed
/// by URL, so reruns over the same class do not refetch.
pub struct CachedSource<S> {
    inner: S,
    dir: PathBuf,
}

impl<S: DocumentSource> CachedSource<S> {
    pub fn new(inner: S, cache_root: &Path) -> Self {
        Self {
            inner,
            dir: cache_root.join("fetch"),
        }
    }

    fn entry_path(&self, location: &str) -> PathBuf {
        self.dir.join(format!("{}.json", sha256_hex(location.as_bytes())))
    }
}

impl<S: DocumentSource> DocumentSource for CachedSource<S> {
    fn load(&self, location: &str) -> Result<Vec<u8>> {
        let path = self.entry_path(location);
        if let Ok(bytes) = fs::read(&path) {
            if serde_json::from_slice::<serde_json::Value>(&bytes).is_ok() {
                tracing::debug!(location, "fetch cache hit");
                return Ok(bytes);
            }
            tracing::debug!(location, path = %path.display(), "ignoring corrupt cache entry");
        }

        let bytes = self.inner.load(location)?;
        if serde_json::from_slice::<serde_json::Value>(&bytes).is_ok() {
            if let Err(err) = write_entry(&self.dir, &path, &bytes) {
                tracing::warn!(location, error = %format!("{err:#}"), "fetch cache write failed");
            }
        }
        Ok(bytes)
    }
}

fn write_entry(dir: &Path, path: &Path, bytes: &[u8]) -> Result<()> {
    fs::create_dir_all(dir).with_context(|| format!("create {}", dir.display()))?;
    let mut tmp = tempfile::NamedTempFile::new_in(dir).context("create cache temp file")?;
    tmp.write_all(bytes).context("write cache entry")?;
    tmp.persist(path).with_context(|| format!("persist {}", path.display()))?;
    Ok(())
}

/// Fetch every submission on a pool of `workers` threads. Output order
/// matches input order regardless of completion order.
pub fn fetch_all(
    source: &dyn DocumentSource,
    submissions: Vec<Submission>,
    workers: usize,
) -> Result<Vec<FetchedSubmission>> {
    let pool = rayon::ThreadPoolBuilder::new()
        .num_threads(workers)
        .thread_name(|idx| format!("fetch-{idx}"))
        .build()
        .context("build fetch pool")?;
    let fetched: Vec<FetchedSubmission> = pool.install(|| {
        submissions
            .into_par_iter()
            .map(|submission| {
                let notebook = source.fetch(&submission);
                FetchedSubmission {
                    submission,
                    notebook,
                }
            })
            .collect()
    });
    let absent = fetched.iter().filter(|f| f.notebook.is_none()).count();
    tracing::info!(
        fetched = fetched.len() - absent,
        absent,
        workers,
        "fetched submissions"
    );
    Ok(fetched)
}
