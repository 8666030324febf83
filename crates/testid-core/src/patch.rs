//! Text patching: synthesize attribute text and splice it into the original source
//!
//! Every edit replaces a small byte range (the closing token of a tag, or the two quotes
//! of an empty value); everything else is copied through untouched.

use crate::error::{TestIdError, TestIdResult};
use crate::markup::ByteSpan;
use crate::plan::AttributeStyle;

/// A replacement of `source[start..end]` by `new_text`
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TextEdit {
    pub start: usize,
    pub end: usize,
    pub new_text: String,
    /// Identifier embedded by this edit
    pub id: String,
}

/// Edit filling an empty attribute value (`""` or `''`) with `id`
pub fn refresh_edit(
    source: &str,
    value_span: ByteSpan,
    style: &AttributeStyle,
    id: String,
) -> TestIdResult<TextEdit> {
    let literal = source
        .get(value_span.start..value_span.end)
        .ok_or_else(|| TestIdError::internal(format!("value span {:?} out of bounds", value_span)))?;
    if literal != "\"\"" && literal != "''" {
        return Err(TestIdError::internal(format!(
            "expected an empty string literal at {:?}, found {}",
            value_span, literal
        )));
    }

    Ok(TextEdit {
        start: value_span.start,
        end: value_span.end,
        new_text: style.quoted(&id),
        id,
    })
}

/// Edit inserting `name="id"` in front of the closing token (`/>` or `>`) of the tag at `tag`
///
/// Tags whose closing token sits alone on its own line get the attribute on a new line,
/// indented one level deeper than the closing token; all other tags get it inline,
/// separated by a single space.
pub fn insertion_edit(
    source: &str,
    tag: ByteSpan,
    self_closing: bool,
    style: &AttributeStyle,
    id: String,
) -> TestIdResult<TextEdit> {
    let bytes = source.as_bytes();
    if tag.end > bytes.len() || tag.len() < 2 || bytes[tag.end - 1] != b'>' {
        return Err(TestIdError::internal(format!(
            "tag span {:?} does not end with '>'",
            tag
        )));
    }

    if self_closing != (bytes[tag.end - 2] == b'/') {
        return Err(TestIdError::internal(format!(
            "tag span {:?} does not end with '{}'",
            tag,
            if self_closing { "/>" } else { ">" }
        )));
    }
    let close_start = tag.end - if self_closing { 2 } else { 1 };
    let head = &source[tag.start..close_start];
    let attribute = style.render(&id);

    let new_text = match head.rfind('\n') {
        Some(newline) if is_blank(&head[newline + 1..]) => {
            let leading = &head[newline + 1..];
            let line_break = if head[..newline].ends_with('\r') {
                "\r\n"
            } else {
                "\n"
            };
            let closing = if self_closing { "/>" } else { ">" };
            format!(
                "{}{}{}{}{}",
                style.indentation, attribute, line_break, leading, closing
            )
        }
        _ => {
            let separator = if head.ends_with(|c: char| c.is_whitespace()) {
                ""
            } else {
                " "
            };
            let closing = if self_closing { " />" } else { ">" };
            format!("{}{}{}", separator, attribute, closing)
        }
    };

    Ok(TextEdit {
        start: close_start,
        end: tag.end,
        new_text,
        id,
    })
}

/// Apply edits sorted by position; output equals input outside the edited ranges
pub fn apply_edits(source: &str, edits: &[TextEdit]) -> TestIdResult<String> {
    let added: usize = edits.iter().map(|edit| edit.new_text.len()).sum();
    let mut output = String::with_capacity(source.len() + added);
    let mut cursor = 0;

    for edit in edits {
        if edit.start < cursor || edit.end < edit.start || edit.end > source.len() {
            return Err(TestIdError::internal(format!(
                "edit {}..{} overlaps a previous edit or is out of bounds (cursor {}, length {})",
                edit.start,
                edit.end,
                cursor,
                source.len()
            )));
        }
        if !source.is_char_boundary(edit.start) || !source.is_char_boundary(edit.end) {
            return Err(TestIdError::internal(format!(
                "edit {}..{} is not on a character boundary",
                edit.start, edit.end
            )));
        }

        output.push_str(&source[cursor..edit.start]);
        output.push_str(&edit.new_text);
        cursor = edit.end;
    }
    output.push_str(&source[cursor..]);

    tracing::trace!(
        edits = edits.len(),
        bytes_added = output.len().saturating_sub(source.len()),
        "Applied edits"
    );

    Ok(output)
}

fn is_blank(text: &str) -> bool {
    text.chars().all(|c| c == ' ' || c == '\t')
}
