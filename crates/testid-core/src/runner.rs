//! Run orchestration
//!
//! A run walks the include directories, splits the files into changed and unchanged ones,
//! and processes the changed files in two fan-out phases:
//!
//! 1. read, parse and classify every changed file, registering the identifiers already
//!    present in markup with the shared [`IdPool`];
//! 2. plan, patch and rewrite every file that has candidates.
//!
//! Identifiers are minted only in the second phase, once every pre-existing identifier of
//! the run is known. The cache is replaced at the very end, and only if the run succeeded.

use crate::cache::{ChangeDetector, FileRecord, FileState};
use crate::classify::{classify_tags, ElementRules, FileClassification};
use crate::error::{TestIdError, TestIdResult};
use crate::fsutil::{modified_millis, write_replacing};
use crate::ids::{generator_for, IdGenerator, IdPool};
use crate::jobs::JobCounter;
use crate::markup::parse_tags;
use crate::patch::apply_edits;
use crate::plan::{plan_edits, AttributeStyle};
use crate::report::RunReport;
use crate::walk::{collect_source_files, SourceFile, WalkOptions};
use std::future::Future;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Instant;
use testid_config::logging::file_span;
use testid_config::AppConfig;
use tokio::sync::{mpsc, Mutex};
use tracing::Instrument;

#[derive(Debug, Default)]
struct RunStats {
    scanned: AtomicUsize,
    changed: AtomicUsize,
    modified: AtomicUsize,
}

/// A changed file waiting for its edits
#[derive(Debug)]
struct PendingFile {
    file: SourceFile,
    source: String,
    classification: FileClassification,
}

/// Shared state of one run; cheap to clone into file tasks
#[derive(Debug, Clone)]
pub struct Runner {
    config: Arc<AppConfig>,
    rules: Arc<ElementRules>,
    style: Arc<AttributeStyle>,
    pool: Arc<Mutex<IdPool>>,
    detector: Arc<ChangeDetector>,
    stats: Arc<RunStats>,
    started: Instant,
}

impl Runner {
    /// Create a runner for `config`, loading the cache when caching is enabled
    pub async fn new(config: AppConfig) -> Self {
        let detector = if config.cache.enabled {
            ChangeDetector::load(&config.cache.path).await
        } else {
            tracing::debug!("Identifier cache disabled");
            ChangeDetector::empty()
        };
        let generator = generator_for(&config.ids);
        Self::with_parts(config, generator, detector)
    }

    /// Create a runner from explicit parts; lets tests inject a deterministic generator
    pub fn with_parts(
        config: AppConfig,
        generator: Box<dyn IdGenerator>,
        detector: ChangeDetector,
    ) -> Self {
        Self {
            rules: Arc::new(ElementRules::from_config(&config)),
            style: Arc::new(AttributeStyle::from_config(&config.attribute)),
            pool: Arc::new(Mutex::new(IdPool::new(generator))),
            detector: Arc::new(detector),
            stats: Arc::new(RunStats::default()),
            started: Instant::now(),
            config: Arc::new(config),
        }
    }

    pub fn config(&self) -> &AppConfig {
        &self.config
    }

    /// Process every file under the include directories
    ///
    /// Returns [`TestIdError::DuplicateIds`] when duplicates were seen and are not allowed;
    /// source files have been rewritten by then, but the cache is left untouched.
    pub async fn run(&self) -> TestIdResult<()> {
        let options = Arc::new(WalkOptions::from_config(&self.config));
        let files = collect_source_files(options).await?;
        self.stats.scanned.store(files.len(), Ordering::SeqCst);

        let mut changed = Vec::new();
        {
            let mut pool = self.pool.lock().await;
            for file in files {
                match self.detector.detect(&file.key, file.mod_time) {
                    FileState::Unchanged(ids) => {
                        tracing::trace!(path = %file.key, ids = ids.len(), "Unchanged file");
                        pool.seed_from_unchanged(ids);
                    }
                    FileState::Changed => changed.push(file),
                }
            }
        }
        self.stats.changed.store(changed.len(), Ordering::SeqCst);

        tracing::info!(
            scanned = self.stats.scanned.load(Ordering::SeqCst),
            changed = changed.len(),
            cached_files = self.detector.original_len(),
            "Detected changed files"
        );

        let pending = fan_out(changed, |file, jobs| {
            let span = file_span(&file.key);
            let runner = self.clone();
            async move { runner.scan_file(file, &jobs).await }.instrument(span)
        })
        .await?;

        fan_out(pending, |pending, jobs| {
            let span = file_span(&pending.file.key);
            let runner = self.clone();
            async move { runner.rewrite_file(pending, &jobs).await.map(Some) }.instrument(span)
        })
        .await?;

        let duplicates = {
            let pool = self.pool.lock().await;
            pool.duplicates()
        };
        if !duplicates.is_empty() {
            if self.config.ids.allow_duplicates {
                tracing::warn!(count = duplicates.len(), "Duplicate identifiers allowed by configuration");
            } else {
                return Err(TestIdError::DuplicateIds { ids: duplicates });
            }
        }

        if self.config.persists_cache() {
            self.detector.persist(&self.config.cache.path).await?;
        }

        Ok(())
    }

    /// Summary of the run so far
    pub async fn report(&self) -> RunReport {
        let pool = self.pool.lock().await;
        RunReport {
            files_scanned: self.stats.scanned.load(Ordering::SeqCst),
            files_changed: self.stats.changed.load(Ordering::SeqCst),
            files_modified: self.stats.modified.load(Ordering::SeqCst),
            ids_minted: pool.minted_count(),
            ids_known: pool.known_count(),
            duplicates: pool.duplicates(),
            elapsed_ms: self.started.elapsed().as_millis(),
            dry_run: self.config.run.dry_run,
        }
    }

    /// Phase one: read, parse and classify one changed file
    ///
    /// Files without candidates are finished here and return `None`.
    async fn scan_file(
        &self,
        file: SourceFile,
        jobs: &JobCounter,
    ) -> TestIdResult<Option<PendingFile>> {
        if jobs.is_cancelled() {
            return Ok(None);
        }
        let source = tokio::fs::read_to_string(&file.path)
            .await
            .map_err(|e| TestIdError::io("read", &file.path, e))?;

        let tags = parse_tags(&source, &file.path)?;
        let classification = {
            let mut pool = self.pool.lock().await;
            classify_tags(&tags, &self.rules, &mut pool)
        };

        tracing::debug!(
            tags = tags.len(),
            candidates = classification.candidates.len(),
            retained = classification.retained_ids.len(),
            duplicates = classification.duplicates.len(),
            "Classified file"
        );

        if classification.candidates.is_empty() {
            self.detector.record(
                file.key,
                FileRecord {
                    mod_time: file.mod_time,
                    ids: classification.retained_ids,
                },
            );
            return Ok(None);
        }

        Ok(Some(PendingFile {
            file,
            source,
            classification,
        }))
    }

    /// Phase two: mint identifiers, patch the text and replace the file
    async fn rewrite_file(&self, pending: PendingFile, jobs: &JobCounter) -> TestIdResult<()> {
        let PendingFile {
            file,
            source,
            classification,
        } = pending;

        let edits = {
            let mut pool = self.pool.lock().await;
            plan_edits(&source, classification.candidates, &self.style, &mut pool)?
        };
        let output = apply_edits(&source, &edits)?;

        let mut ids = classification.retained_ids;
        ids.extend(edits.iter().map(|edit| edit.id.clone()));

        let mod_time = if self.config.run.dry_run {
            tracing::info!(edits = edits.len(), "Would rewrite file (dry run)");
            file.mod_time
        } else {
            if jobs.is_cancelled() {
                return Ok(());
            }
            write_replacing(&file.path, &output).await?;
            let mod_time = modified_millis(&file.path).await?;
            tracing::info!(edits = edits.len(), "Rewrote file");
            mod_time
        };

        self.stats.modified.fetch_add(1, Ordering::SeqCst);
        self.detector.record(file.key, FileRecord { mod_time, ids });
        Ok(())
    }
}

/// Run `work` for every item in its own task and collect the `Some` results
///
/// The first error cancels the items that have not started yet and is returned once
/// every task has finished.
async fn fan_out<T, R, F, Fut>(items: Vec<T>, work: F) -> TestIdResult<Vec<R>>
where
    T: Send + 'static,
    R: Send + 'static,
    F: Fn(T, JobCounter) -> Fut,
    Fut: Future<Output = TestIdResult<Option<R>>> + Send + 'static,
{
    let jobs = JobCounter::new();
    let (sender, mut receiver) = mpsc::unbounded_channel();

    for item in items {
        let guard = jobs.enter();
        let task = work(item, jobs.clone());
        let jobs = jobs.clone();
        let sender = sender.clone();
        tokio::spawn(async move {
            let _guard = guard;
            match task.await {
                Ok(Some(result)) => {
                    let _ = sender.send(result);
                }
                Ok(None) => {}
                Err(e) => jobs.fail(e),
            }
        });
    }
    drop(sender);

    jobs.wait().await?;

    let mut results = Vec::new();
    while let Some(result) = receiver.recv().await {
        results.push(result);
    }
    Ok(results)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ids::UuidGenerator;
    use pretty_assertions::assert_eq;
    use tempfile::TempDir;

    fn config_for(dir: &TempDir) -> AppConfig {
        let mut config = AppConfig::default();
        config.scan.include_dirs = vec![dir.path().to_path_buf()];
        config.cache.path = dir.path().join("cache.json");
        config
    }

    #[tokio::test]
    async fn test_fan_out_collects_results() {
        let results = fan_out((0..10).collect(), |n: usize, _jobs| async move {
            Ok(if n % 2 == 0 { Some(n) } else { None })
        })
        .await
        .unwrap();

        let mut results = results;
        results.sort();
        assert_eq!(results, vec![0, 2, 4, 6, 8]);
    }

    #[tokio::test]
    async fn test_fan_out_returns_first_error() {
        let result = fan_out(vec![1usize], |_, _jobs| async move {
            Err::<Option<usize>, _>(TestIdError::internal("boom"))
        })
        .await;
        assert!(matches!(result, Err(TestIdError::Internal { .. })));
    }

    #[tokio::test]
    async fn test_run_inserts_and_records() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("App.jsx");
        std::fs::write(&path, "const a = <div><span data-testid=\"keep\" /></div>;\n").unwrap();

        let config = config_for(&dir);
        let runner = Runner::with_parts(
            config.clone(),
            Box::new(UuidGenerator::seeded(11)),
            ChangeDetector::empty(),
        );
        runner.run().await.unwrap();

        let output = std::fs::read_to_string(&path).unwrap();
        assert!(output.starts_with("const a = <div data-testid=\""));
        assert!(output.contains("<span data-testid=\"keep\" />"));

        let report = runner.report().await;
        assert_eq!(report.files_scanned, 1);
        assert_eq!(report.files_modified, 1);
        assert_eq!(report.ids_minted, 1);
        assert_eq!(report.ids_known, 2);

        let snapshot = runner.detector.snapshot();
        let record = &snapshot[&crate::cache::cache_key(&path)];
        assert_eq!(record.ids.len(), 2);
        assert!(record.ids.contains("keep"));
        assert!(config.cache.path.exists());
    }

    #[tokio::test]
    async fn test_parse_failure_fails_run_without_cache() {
        let dir = TempDir::new().unwrap();
        std::fs::write(dir.path().join("Broken.jsx"), "const a = <div>;\n").unwrap();

        let config = config_for(&dir);
        let runner = Runner::new(config.clone()).await;
        let result = runner.run().await;

        assert!(matches!(result, Err(TestIdError::Parse { .. })));
        assert!(!config.cache.path.exists());
    }
}
