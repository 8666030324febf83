//! Element classification: which tags get an identifier inserted or refreshed

use crate::ids::{IdPool, Registration};
use crate::markup::{AttributeValue, ByteSpan, TagInstance};
use std::collections::{BTreeSet, HashSet};
use testid_config::AppConfig;

/// Static rules deciding what happens to each tag
#[derive(Debug, Clone, Default)]
pub struct ElementRules {
    /// Attribute carrying the identifier
    pub id_attribute: String,
    /// Empty means every element
    pub include_elements: HashSet<String>,
    pub exclude_elements: HashSet<String>,
    /// Empty means no prerequisite
    pub expected_attributes: HashSet<String>,
    /// Refresh empty values on tags that are not wanted too
    pub always_refresh_empty: bool,
    /// Insert attributes into tags lacking one
    pub insert: bool,
}

impl ElementRules {
    pub fn from_config(config: &AppConfig) -> Self {
        Self {
            id_attribute: config.attribute.name.clone(),
            include_elements: config.elements.include.iter().cloned().collect(),
            exclude_elements: config.elements.exclude.iter().cloned().collect(),
            expected_attributes: config.elements.expected_attributes.iter().cloned().collect(),
            always_refresh_empty: config.elements.always_refresh_empty,
            insert: config.run.insert,
        }
    }

    /// Whether the tag passes the include, exclude and prerequisite filters
    pub fn is_wanted(&self, tag: &TagInstance) -> bool {
        (self.include_elements.is_empty() || self.include_elements.contains(&tag.name))
            && !self.exclude_elements.contains(&tag.name)
            && (self.expected_attributes.is_empty()
                || tag
                    .attributes
                    .iter()
                    .any(|attr| self.expected_attributes.contains(&attr.name)))
    }
}

/// A tag selected for an edit
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Candidate {
    /// No identifier attribute yet; `span` is the whole opening tag
    Insert {
        element: String,
        span: ByteSpan,
        self_closing: bool,
    },
    /// Identifier attribute with an empty literal; `value_span` covers the two quotes
    Refresh { element: String, value_span: ByteSpan },
}

impl Candidate {
    /// The span whose end orders candidates within a file
    pub fn span(&self) -> ByteSpan {
        match self {
            Candidate::Insert { span, .. } => *span,
            Candidate::Refresh { value_span, .. } => *value_span,
        }
    }

    pub fn element(&self) -> &str {
        match self {
            Candidate::Insert { element, .. } | Candidate::Refresh { element, .. } => element,
        }
    }
}

/// What a single tag contributes
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Decision {
    Candidate(Candidate),
    /// Carries a non-empty identifier that stays as it is
    Retain(String),
    Skip,
}

/// Result of classifying every tag of one file
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FileClassification {
    pub candidates: Vec<Candidate>,
    /// Non-empty identifiers already in the file
    pub retained_ids: BTreeSet<String>,
    /// Retained identifiers that were already known when this file registered them
    pub duplicates: Vec<String>,
}

/// Decide what to do with one tag; pure
pub fn classify_tag(tag: &TagInstance, rules: &ElementRules) -> Decision {
    let wanted = rules.is_wanted(tag);

    match tag.attribute(&rules.id_attribute) {
        Some(attr) => match &attr.value {
            Some(AttributeValue::Literal { raw, span }) if raw.is_empty() => {
                if wanted || rules.always_refresh_empty {
                    Decision::Candidate(Candidate::Refresh {
                        element: tag.name.clone(),
                        value_span: *span,
                    })
                } else {
                    Decision::Skip
                }
            }
            Some(AttributeValue::Literal { raw, .. }) => Decision::Retain(raw.clone()),
            // `data-testid={expr}` or a bare `data-testid`: not ours to manage
            Some(AttributeValue::Expression) | None => Decision::Skip,
        },
        None if wanted && rules.insert => Decision::Candidate(Candidate::Insert {
            element: tag.name.clone(),
            span: tag.span,
            self_closing: tag.self_closing,
        }),
        None => Decision::Skip,
    }
}

/// Classify every tag of a file, registering retained identifiers with the pool
pub fn classify_tags(
    tags: &[TagInstance],
    rules: &ElementRules,
    pool: &mut IdPool,
) -> FileClassification {
    let mut result = FileClassification::default();

    for tag in tags {
        match classify_tag(tag, rules) {
            Decision::Candidate(candidate) => result.candidates.push(candidate),
            Decision::Retain(id) => {
                if pool.register_existing(&id) == Registration::AlreadyKnown {
                    tracing::warn!(id = %id, element = %tag.name, "more than one occurrence of identifier");
                    result.duplicates.push(id.clone());
                }
                result.retained_ids.insert(id);
            }
            Decision::Skip => {}
        }
    }

    result
}
