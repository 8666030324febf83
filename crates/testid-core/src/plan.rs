//! Edit planning: order candidates, mint identifiers and compute edits

use crate::classify::Candidate;
use crate::error::{TestIdError, TestIdResult};
use crate::ids::IdPool;
use crate::patch::{insertion_edit, refresh_edit, TextEdit};
use testid_config::AttributeConfig;

/// How the identifier attribute is rendered
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AttributeStyle {
    pub name: String,
    pub quote: char,
    /// One indentation level, e.g. `"\t"` or four spaces
    pub indentation: String,
}

impl AttributeStyle {
    pub fn from_config(config: &AttributeConfig) -> Self {
        Self {
            name: config.name.clone(),
            quote: config.quotes.as_char(),
            indentation: config.indentation.unit(),
        }
    }

    /// `id` wrapped in the configured quotes
    pub fn quoted(&self, id: &str) -> String {
        format!("{q}{id}{q}", q = self.quote, id = id)
    }

    /// The full `name="id"` fragment
    pub fn render(&self, id: &str) -> String {
        format!("{}={}", self.name, self.quoted(id))
    }
}

/// Turn the candidates of one file into ordered, non-overlapping edits
///
/// Candidates are sorted by the end of their span (ties broken by start) and each one
/// consumes a freshly minted identifier from `pool`.
pub fn plan_edits(
    source: &str,
    mut candidates: Vec<Candidate>,
    style: &AttributeStyle,
    pool: &mut IdPool,
) -> TestIdResult<Vec<TextEdit>> {
    candidates.sort_by_key(|candidate| {
        let span = candidate.span();
        (span.end, span.start)
    });

    let mut edits = Vec::with_capacity(candidates.len());
    let mut cursor = 0;

    for candidate in candidates {
        let id = pool.allocate()?;
        let edit = match &candidate {
            Candidate::Refresh { value_span, .. } => refresh_edit(source, *value_span, style, id)?,
            Candidate::Insert {
                span, self_closing, ..
            } => insertion_edit(source, *span, *self_closing, style, id)?,
        };

        // Only the replaced range has to clear the previous edit: a tag may contain
        // elements nested in its attribute values, which end (and are edited) first.
        if edit.start < cursor {
            let span = candidate.span();
            return Err(TestIdError::internal(format!(
                "candidate <{}> at {}..{} overlaps the previous edit ending at {}",
                candidate.element(),
                span.start,
                span.end,
                cursor
            )));
        }

        tracing::trace!(
            element = %candidate.element(),
            id = %edit.id,
            start = edit.start,
            end = edit.end,
            "Planned edit"
        );

        cursor = edit.end;
        edits.push(edit);
    }

    Ok(edits)
}
