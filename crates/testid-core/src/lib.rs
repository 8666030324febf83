//! testid-core: incremental insertion of test identifiers into JSX/TSX markup
//!
//! The engine walks a source tree, skips files whose modification time matches the
//! persisted cache, parses the rest with SWC, and splices a unique identifier attribute
//! into every wanted tag that lacks one. Bytes outside the inserted fragments are never
//! touched.

pub mod cache;
pub mod classify;
pub mod error;
pub mod fsutil;
pub mod ids;
pub mod jobs;
pub mod markup;
pub mod patch;
pub mod plan;
pub mod report;
pub mod runner;
pub mod walk;

// Cache
pub use cache::{cache_key, ChangeDetector, FileRecord, FileState};

// Classifier
pub use classify::{classify_tags, Candidate, ElementRules, FileClassification};

// Error types
pub use error::{TestIdError, TestIdResult};

// Identifier pool
pub use ids::{generator_for, IdGenerator, IdPool, Registration, ShortCodeGenerator, UuidGenerator};

// Concurrency
pub use jobs::{JobCounter, JobGuard};

// Markup
pub use markup::{parse_tags, Attribute, AttributeValue, ByteSpan, TagInstance};

// Planning and patching
pub use patch::{apply_edits, insertion_edit, refresh_edit, TextEdit};
pub use plan::{plan_edits, AttributeStyle};

// Run orchestration
pub use report::RunReport;
pub use runner::Runner;
pub use walk::{collect_source_files, SourceFile, WalkOptions};
