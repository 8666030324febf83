//! End-to-end runs over scratch source trees

use pretty_assertions::assert_eq;
use std::collections::BTreeMap;
use std::fs;
use std::path::PathBuf;
use tempfile::TempDir;
use testid_config::AppConfig;
use testid_core::{ChangeDetector, FileRecord, IdGenerator, Runner, TestIdError, UuidGenerator};

/// Replays a fixed list of identifiers, then numbers the rest
struct Scripted {
    script: Vec<&'static str>,
    next: usize,
}

impl Scripted {
    fn new(script: Vec<&'static str>) -> Self {
        Self { script, next: 0 }
    }
}

impl IdGenerator for Scripted {
    fn generate(&mut self) -> String {
        self.next += 1;
        if self.script.is_empty() {
            format!("gen-{}", self.next)
        } else {
            self.script.remove(0).to_string()
        }
    }
}

struct Tree {
    dir: TempDir,
}

impl Tree {
    fn new() -> Self {
        Self {
            dir: TempDir::new().unwrap(),
        }
    }

    fn write(&self, relative: &str, contents: &str) -> PathBuf {
        let path = self.dir.path().join(relative);
        fs::create_dir_all(path.parent().unwrap()).unwrap();
        fs::write(&path, contents).unwrap();
        path
    }

    fn read(&self, relative: &str) -> String {
        fs::read_to_string(self.dir.path().join(relative)).unwrap()
    }

    fn cache_path(&self) -> PathBuf {
        self.dir.path().join(".add-testid-cache.json")
    }

    fn config(&self) -> AppConfig {
        let mut config = AppConfig::default();
        config.scan.include_dirs = vec![self.dir.path().join("src")];
        config.cache.path = self.cache_path();
        config
    }

    fn cache(&self) -> BTreeMap<String, FileRecord> {
        serde_json::from_str(&fs::read_to_string(self.cache_path()).unwrap()).unwrap()
    }
}

const APP: &str = "\
export const App = () => (
\t<main>
\t\t<button onClick={go}>Go</button>
\t\t<Input
\t\t\tvalue={value}
\t\t/>
\t</main>
);
";

#[tokio::test]
async fn test_second_run_is_a_no_op() {
    let tree = Tree::new();
    tree.write("src/App.jsx", APP);
    tree.write("src/forms/Form.tsx", "export const F = () => <form data-testid=\"form\" />;\n");

    let first = Runner::new(tree.config()).await;
    first.run().await.unwrap();
    let report = first.report().await;
    assert_eq!(report.files_scanned, 2);
    assert_eq!(report.files_changed, 2);
    assert_eq!(report.files_modified, 1);
    assert_eq!(report.ids_minted, 3);

    let after_first = tree.read("src/App.jsx");
    let cache_after_first = tree.cache();

    let second = Runner::new(tree.config()).await;
    second.run().await.unwrap();
    let report = second.report().await;
    assert_eq!(report.files_changed, 0);
    assert_eq!(report.files_modified, 0);
    assert_eq!(report.ids_minted, 0);
    assert_eq!(report.ids_known, 4);

    assert_eq!(tree.read("src/App.jsx"), after_first);
    assert_eq!(tree.cache(), cache_after_first);
}

#[tokio::test]
async fn test_only_insertions_differ_from_original() {
    let tree = Tree::new();
    tree.write("src/App.jsx", APP);

    let runner = Runner::with_parts(
        tree.config(),
        Box::new(Scripted::new(vec!["a1", "a2", "a3"])),
        ChangeDetector::empty(),
    );
    runner.run().await.unwrap();

    let expected = "\
export const App = () => (
\t<main data-testid=\"a1\">
\t\t<button onClick={go} data-testid=\"a2\">Go</button>
\t\t<Input
\t\t\tvalue={value}
\t\t\tdata-testid=\"a3\"
\t\t/>
\t</main>
);
";
    assert_eq!(tree.read("src/App.jsx"), expected);
}

#[tokio::test]
async fn test_unchanged_file_is_not_opened_but_seeds_ids() {
    let tree = Tree::new();
    let cached = tree.write("src/Cached.jsx", "export const C = <div data-testid=\"shared\" />;\n");

    Runner::new(tree.config()).await.run().await.unwrap();

    // Unparseable content with the recorded modification time: reading it would fail the run
    let modified = fs::metadata(&cached).unwrap().modified().unwrap();
    fs::write(&cached, "<<< not markup").unwrap();
    fs::File::options()
        .write(true)
        .open(&cached)
        .unwrap()
        .set_modified(modified)
        .unwrap();

    tree.write("src/Other.jsx", "export const O = <span data-testid=\"shared\" />;\n");

    let runner = Runner::new(tree.config()).await;
    let result = runner.run().await;

    match result {
        Err(TestIdError::DuplicateIds { ids }) => assert_eq!(ids, vec!["shared".to_string()]),
        other => panic!("expected a duplicate failure, got {:?}", other),
    }
    let report = runner.report().await;
    assert_eq!(report.files_changed, 1);
    assert_eq!(report.duplicates, vec!["shared".to_string()]);
}

#[tokio::test]
async fn test_minted_ids_avoid_existing_markup() {
    let tree = Tree::new();
    // The generator proposes the identifier a later file already carries
    tree.write("src/a/First.jsx", "export const A = <div />;\n");
    tree.write("src/b/Second.jsx", "export const B = <div data-testid=\"taken\" />;\n");

    let runner = Runner::with_parts(
        tree.config(),
        Box::new(Scripted::new(vec!["taken"])),
        ChangeDetector::empty(),
    );
    runner.run().await.unwrap();

    assert_eq!(
        tree.read("src/a/First.jsx"),
        "export const A = <div data-testid=\"gen-2\" />;\n"
    );
    assert!(runner.report().await.duplicates.is_empty());
}

#[tokio::test]
async fn test_duplicates_fail_run_and_keep_old_cache() {
    let tree = Tree::new();
    tree.write("src/A.jsx", "export const A = <a data-testid=\"dup\" />;\n");
    tree.write("src/B.jsx", "export const B = <b data-testid=\"dup\"><i /></b>;\n");
    fs::write(tree.cache_path(), "{}").unwrap();

    let runner = Runner::new(tree.config()).await;
    let result = runner.run().await;

    assert!(matches!(result, Err(TestIdError::DuplicateIds { .. })));
    assert_eq!(fs::read_to_string(tree.cache_path()).unwrap(), "{}");
    // Files are still patched
    assert!(tree.read("src/B.jsx").contains("<i data-testid=\""));
}

#[tokio::test]
async fn test_allowed_duplicates_persist_cache() {
    let tree = Tree::new();
    tree.write("src/A.jsx", "export const A = <a data-testid=\"dup\" />;\n");
    tree.write("src/B.jsx", "export const B = <b data-testid=\"dup\" />;\n");

    let mut config = tree.config();
    config.ids.allow_duplicates = true;
    let runner = Runner::new(config).await;
    runner.run().await.unwrap();

    assert_eq!(runner.report().await.duplicates, vec!["dup".to_string()]);
    assert_eq!(tree.cache().len(), 2);
}

#[tokio::test]
async fn test_dry_run_writes_nothing() {
    let tree = Tree::new();
    tree.write("src/App.jsx", APP);

    let mut config = tree.config();
    config.run.dry_run = true;
    let runner = Runner::new(config).await;
    runner.run().await.unwrap();

    let report = runner.report().await;
    assert!(report.dry_run);
    assert_eq!(report.files_modified, 1);
    assert_eq!(tree.read("src/App.jsx"), APP);
    assert!(!tree.cache_path().exists());
}

#[tokio::test]
async fn test_empty_values_refreshed_only_for_wanted_tags() {
    let tree = Tree::new();
    let source = "export const A = <div><a data-testid=\"\" /><b data-testid='' /></div>;\n";
    tree.write("src/A.jsx", source);

    let mut config = tree.config();
    config.elements.include = vec!["a".to_string()];
    config.attribute.quotes = testid_config::QuoteStyle::Single;
    let runner = Runner::with_parts(
        config.clone(),
        Box::new(Scripted::new(vec!["x"])),
        ChangeDetector::empty(),
    );
    runner.run().await.unwrap();
    assert_eq!(
        tree.read("src/A.jsx"),
        "export const A = <div><a data-testid='x' /><b data-testid='' /></div>;\n"
    );

    // Forcing the refresh reaches the unwanted <b> as well
    tree.write("src/A.jsx", source);
    config.elements.always_refresh_empty = true;
    let runner = Runner::with_parts(
        config,
        Box::new(Scripted::new(vec!["x", "y"])),
        ChangeDetector::empty(),
    );
    runner.run().await.unwrap();
    assert_eq!(
        tree.read("src/A.jsx"),
        "export const A = <div><a data-testid='x' /><b data-testid='y' /></div>;\n"
    );
}

#[tokio::test]
async fn test_cache_disabled_neither_reads_nor_writes() {
    let tree = Tree::new();
    tree.write("src/App.jsx", "export const A = <div />;\n");

    let mut config = tree.config();
    config.cache.enabled = false;
    let runner = Runner::new(config.clone()).await;
    runner.run().await.unwrap();
    assert!(!tree.cache_path().exists());

    // Without a cache every file is changed again, but nothing is left to insert
    let runner = Runner::new(config).await;
    runner.run().await.unwrap();
    let report = runner.report().await;
    assert_eq!(report.files_changed, 1);
    assert_eq!(report.files_modified, 0);
}

#[tokio::test]
async fn test_excluded_and_foreign_files_are_ignored() {
    let tree = Tree::new();
    tree.write("src/node_modules/lib/Lib.jsx", "export const L = <div />;\n");
    tree.write("src/styles.css", "div {}\n");
    tree.write("src/App.jsx", "export const A = <div />;\n");

    let runner = Runner::with_parts(
        tree.config(),
        Box::new(UuidGenerator::seeded(5)),
        ChangeDetector::empty(),
    );
    runner.run().await.unwrap();

    assert_eq!(runner.report().await.files_scanned, 1);
    assert_eq!(
        tree.read("src/node_modules/lib/Lib.jsx"),
        "export const L = <div />;\n"
    );
    assert!(!tree.dir.path().join("src/App.jsx.tmp").exists());
}

#[tokio::test]
async fn test_overlapping_include_dirs_rewrite_each_file_once() {
    let tree = Tree::new();
    tree.write("src/a/App.jsx", "<div />\n");

    let mut config = tree.config();
    let src = tree.dir.path().join("src");
    config.scan.include_dirs = vec![src.clone(), src.join("a"), src.clone()];

    let runner = Runner::new(config.clone()).await;
    runner.run().await.unwrap();
    let report = runner.report().await;
    assert_eq!(report.files_scanned, 1);
    assert_eq!(report.files_changed, 1);
    assert_eq!(report.files_modified, 1);
    assert_eq!(report.ids_minted, 1);

    let output = tree.read("src/a/App.jsx");
    assert_eq!(output.matches("data-testid=\"").count(), 1);
    let id = output
        .split("data-testid=\"")
        .nth(1)
        .and_then(|rest| rest.split('"').next())
        .unwrap()
        .to_string();

    let cache = tree.cache();
    assert_eq!(cache.len(), 1);
    let record = cache.values().next().unwrap();
    assert_eq!(record.ids.iter().cloned().collect::<Vec<_>>(), vec![id]);

    let again = Runner::new(config).await;
    again.run().await.unwrap();
    let report = again.report().await;
    assert_eq!(report.files_scanned, 1);
    assert_eq!(report.files_changed, 0);
    assert_eq!(tree.read("src/a/App.jsx"), output);
}
