//! Identifier pool: minting, registration and duplicate tracking
//!
//! The pool is created once per run and shared by every file task. It owns the set of
//! identifiers known so far (from untouched files, from markup already carrying one, and
//! from freshly minted ones) and records every literal seen more than once.

use crate::error::{TestIdError, TestIdResult};
use rand::rngs::StdRng;
use rand::{Rng, RngCore, SeedableRng};
use std::collections::{BTreeSet, HashSet};
use testid_config::{IdConfig, IdStrategy};

/// Give up minting after this many consecutive collisions
const MAX_ALLOCATION_ATTEMPTS: usize = 10_000;

const SHORT_ALPHABET: &[u8] = b"abcdefghijklmnopqrstuvwxyz0123456789";

/// Source of candidate identifiers
///
/// Implementations only propose values; the pool decides whether a value is free.
pub trait IdGenerator: Send {
    fn generate(&mut self) -> String;
}

/// Random v4 UUIDs
#[derive(Debug, Default)]
pub struct UuidGenerator {
    rng: Option<StdRng>,
}

impl UuidGenerator {
    pub fn new() -> Self {
        Self::default()
    }

    /// Deterministic sequence, for tests
    pub fn seeded(seed: u64) -> Self {
        Self {
            rng: Some(StdRng::seed_from_u64(seed)),
        }
    }
}

impl IdGenerator for UuidGenerator {
    fn generate(&mut self) -> String {
        match self.rng.as_mut() {
            Some(rng) => {
                let mut bytes = [0u8; 16];
                rng.fill_bytes(&mut bytes);
                uuid::Builder::from_random_bytes(bytes)
                    .into_uuid()
                    .to_string()
            }
            None => uuid::Uuid::new_v4().to_string(),
        }
    }
}

/// Random lowercase alphanumeric codes of a fixed length
#[derive(Debug)]
pub struct ShortCodeGenerator {
    rng: StdRng,
    length: usize,
}

impl ShortCodeGenerator {
    pub fn new(length: usize) -> Self {
        Self::seeded(length, rand::random())
    }

    pub fn seeded(length: usize, seed: u64) -> Self {
        Self {
            rng: StdRng::seed_from_u64(seed),
            length,
        }
    }
}

impl IdGenerator for ShortCodeGenerator {
    fn generate(&mut self) -> String {
        (0..self.length)
            .map(|_| SHORT_ALPHABET[self.rng.random_range(0..SHORT_ALPHABET.len())] as char)
            .collect()
    }
}

/// Build the generator selected by configuration
pub fn generator_for(config: &IdConfig) -> Box<dyn IdGenerator> {
    match config.strategy {
        IdStrategy::Uuid => Box::new(UuidGenerator::new()),
        IdStrategy::Short => Box::new(ShortCodeGenerator::new(config.short_length)),
    }
}

/// Outcome of registering an identifier found in markup
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Registration {
    NewlyKnown,
    AlreadyKnown,
}

/// Run-wide identifier state
pub struct IdPool {
    known: HashSet<String>,
    duplicates: BTreeSet<String>,
    minted: usize,
    generator: Box<dyn IdGenerator>,
}

impl IdPool {
    pub fn new(generator: Box<dyn IdGenerator>) -> Self {
        Self {
            known: HashSet::new(),
            duplicates: BTreeSet::new(),
            minted: 0,
            generator,
        }
    }

    /// Mint an identifier distinct from every identifier known so far
    pub fn allocate(&mut self) -> TestIdResult<String> {
        for attempt in 0..MAX_ALLOCATION_ATTEMPTS {
            let candidate = self.generator.generate();
            if !is_embeddable(&candidate) {
                return Err(TestIdError::internal(format!(
                    "identifier generator produced '{}', which can not be embedded in an attribute",
                    candidate.escape_debug()
                )));
            }
            if self.known.insert(candidate.clone()) {
                self.minted += 1;
                return Ok(candidate);
            }
            tracing::trace!(attempt, candidate = %candidate, "Generated identifier already known, retrying");
        }
        Err(TestIdError::internal(format!(
            "no free identifier after {} attempts ({} identifiers known)",
            MAX_ALLOCATION_ATTEMPTS,
            self.known.len()
        )))
    }

    /// Record an identifier already present in markup
    pub fn register_existing(&mut self, value: &str) -> Registration {
        if self.known.contains(value) {
            self.duplicates.insert(value.to_string());
            Registration::AlreadyKnown
        } else {
            self.known.insert(value.to_string());
            Registration::NewlyKnown
        }
    }

    /// Bulk-insert identifiers of files left untouched this run, without duplicate checks
    pub fn seed_from_unchanged<I>(&mut self, ids: I)
    where
        I: IntoIterator<Item = String>,
    {
        self.known.extend(ids);
    }

    pub fn known_count(&self) -> usize {
        self.known.len()
    }

    pub fn minted_count(&self) -> usize {
        self.minted
    }

    /// Duplicates seen so far, sorted
    pub fn duplicates(&self) -> Vec<String> {
        self.duplicates.iter().cloned().collect()
    }
}

impl std::fmt::Debug for IdPool {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("IdPool")
            .field("known", &self.known.len())
            .field("duplicates", &self.duplicates)
            .field("minted", &self.minted)
            .finish()
    }
}

fn is_embeddable(value: &str) -> bool {
    !value.is_empty() && !value.chars().any(|c| c == '"' || c == '\'' || c.is_control())
}
