//! Concurrent directory walk collecting candidate source files

use crate::cache::cache_key;
use crate::error::{TestIdError, TestIdResult};
use crate::fsutil::metadata_millis;
use crate::jobs::JobCounter;
use std::collections::HashSet;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use testid_config::AppConfig;
use tokio::sync::mpsc;

/// A file selected by the walk
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SourceFile {
    pub path: PathBuf,
    /// Cache key of `path`
    pub key: String,
    /// Modification time in epoch milliseconds, as seen by the walk
    pub mod_time: i64,
}

/// What to walk and what to keep
#[derive(Debug, Clone)]
pub struct WalkOptions {
    pub include_dirs: Vec<PathBuf>,
    /// Normalized exclusions; entries without a `/` match a directory name anywhere
    pub exclude_dirs: HashSet<String>,
    /// Suffixes including the dot, e.g. `.jsx`
    pub extensions: Vec<String>,
}

impl WalkOptions {
    pub fn from_config(config: &AppConfig) -> Self {
        Self {
            include_dirs: config.scan.include_dirs.clone(),
            exclude_dirs: config
                .scan
                .exclude_dirs
                .iter()
                .map(|dir| normalize(dir))
                .collect(),
            extensions: config.dotted_extensions(),
        }
    }

    fn is_excluded(&self, dir: &Path) -> bool {
        if self.exclude_dirs.contains(&normalize(dir)) {
            return true;
        }
        dir.file_name()
            .and_then(|name| name.to_str())
            .is_some_and(|name| self.exclude_dirs.contains(name))
    }

    fn is_source(&self, path: &Path) -> bool {
        let name = path.to_string_lossy();
        self.extensions.iter().any(|ext| name.ends_with(ext.as_str()))
    }
}

fn normalize(path: &Path) -> String {
    let normalized = cache_key(path);
    let trimmed = normalized.trim_end_matches('/');
    if trimmed.is_empty() {
        normalized
    } else {
        trimmed.to_string()
    }
}

/// Walk every include directory and return the matching files sorted by path
///
/// Each directory is listed by its own task; subdirectories are registered with the
/// job counter before their task is spawned.
pub async fn collect_source_files(options: Arc<WalkOptions>) -> TestIdResult<Vec<SourceFile>> {
    let jobs = JobCounter::new();
    let (sender, mut receiver) = mpsc::unbounded_channel();

    let roots = distinct_roots(&options.include_dirs).await?;
    let root = jobs.enter();
    for dir in roots {
        spawn_walk(dir, &jobs, &options, &sender);
    }
    drop(root);
    drop(sender);

    jobs.wait().await?;

    let mut files = Vec::new();
    while let Some(file) = receiver.recv().await {
        files.push(file);
    }
    files.sort_by(|a: &SourceFile, b: &SourceFile| a.path.cmp(&b.path));
    // Symlinked directories can still reach one file twice under the same walked path
    files.dedup_by(|a, b| a.key == b.key);

    tracing::debug!(files = files.len(), "Collected source files");
    Ok(files)
}

/// Drop include roots that repeat or lie inside another root
///
/// Two overlapping roots would hand the same file to two concurrent rewrites. Roots are
/// compared by canonical path but walked as given, so cache keys keep their form.
async fn distinct_roots(include_dirs: &[PathBuf]) -> TestIdResult<Vec<PathBuf>> {
    let mut resolved = Vec::with_capacity(include_dirs.len());
    for dir in include_dirs {
        let canonical = tokio::fs::canonicalize(dir)
            .await
            .map_err(|e| TestIdError::io("resolve", dir, e))?;
        resolved.push((canonical, dir.clone()));
    }
    // Ancestors sort before their descendants
    resolved.sort();

    let mut kept: Vec<(PathBuf, PathBuf)> = Vec::with_capacity(resolved.len());
    for (canonical, dir) in resolved {
        if let Some((_, outer)) = kept.iter().find(|(root, _)| canonical.starts_with(root)) {
            tracing::debug!(
                dir = %dir.display(),
                covered_by = %outer.display(),
                "Skipping include directory already covered by another"
            );
            continue;
        }
        kept.push((canonical, dir));
    }

    Ok(kept.into_iter().map(|(_, dir)| dir).collect())
}

fn spawn_walk(
    dir: PathBuf,
    jobs: &JobCounter,
    options: &Arc<WalkOptions>,
    sender: &mpsc::UnboundedSender<SourceFile>,
) {
    if options.is_excluded(&dir) {
        tracing::debug!(dir = %dir.display(), "Skipping excluded directory");
        return;
    }

    let guard = jobs.enter();
    let jobs = jobs.clone();
    let options = Arc::clone(options);
    let sender = sender.clone();
    tokio::spawn(async move {
        let _guard = guard;
        if jobs.is_cancelled() {
            return;
        }
        if let Err(e) = walk_dir(&dir, &jobs, &options, &sender).await {
            jobs.fail(e);
        }
    });
}

async fn walk_dir(
    dir: &Path,
    jobs: &JobCounter,
    options: &Arc<WalkOptions>,
    sender: &mpsc::UnboundedSender<SourceFile>,
) -> TestIdResult<()> {
    let mut entries = tokio::fs::read_dir(dir)
        .await
        .map_err(|e| TestIdError::io("read dir", dir, e))?;

    loop {
        if jobs.is_cancelled() {
            return Ok(());
        }
        let entry = match entries.next_entry().await {
            Ok(Some(entry)) => entry,
            Ok(None) => break,
            Err(e) => return Err(TestIdError::io("read dir", dir, e)),
        };

        let path = entry.path();
        // Follows symlinks, like stat(2)
        let metadata = tokio::fs::metadata(&path)
            .await
            .map_err(|e| TestIdError::io("get stat for", &path, e))?;

        if metadata.is_dir() {
            spawn_walk(path, jobs, options, sender);
        } else if options.is_source(&path) {
            let mod_time = metadata_millis(&path, &metadata)?;
            let file = SourceFile {
                key: cache_key(&path),
                path,
                mod_time,
            };
            // The receiver lives until every walk task has finished
            let _ = sender.send(file);
        }
    }

    Ok(())
}
