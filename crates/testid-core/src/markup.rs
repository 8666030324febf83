//! JSX tag extraction backed by SWC
//!
//! Produces one [`TagInstance`] per opening tag with byte offsets into the original
//! source, which is all the classifier and the patcher need to know about the tree.

use crate::error::{TestIdError, TestIdResult};
use std::path::Path;
use swc_common::{sync::Lrc, BytePos, FileName, SourceMap, Span, Spanned};
use swc_ecma_ast::{JSXAttrOrSpread, JSXOpeningElement};
use swc_ecma_parser::{lexer::Lexer, EsSyntax, Parser, StringInput, Syntax, TsSyntax};
use swc_ecma_visit::{Visit, VisitWith};

/// Half-open byte range `[start, end)` into a source file
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct ByteSpan {
    pub start: usize,
    pub end: usize,
}

impl ByteSpan {
    pub fn new(start: usize, end: usize) -> Self {
        Self { start, end }
    }

    pub fn len(&self) -> usize {
        self.end.saturating_sub(self.start)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// Value of a JSX attribute
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AttributeValue {
    /// Quoted string; `raw` is the text between the quotes, `span` covers the quotes
    Literal { raw: String, span: ByteSpan },
    /// `{...}` container or nested element
    Expression,
}

/// A named attribute on an opening tag
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Attribute {
    pub name: String,
    /// `None` for boolean attributes such as `<input disabled />`
    pub value: Option<AttributeValue>,
}

/// One opening tag occurrence
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TagInstance {
    /// Element name as written, e.g. `div`, `Foo.Bar`, `svg:rect`
    pub name: String,
    /// Named attributes in source order; spreads are omitted
    pub attributes: Vec<Attribute>,
    /// From `<` to the closing `>` inclusive
    pub span: ByteSpan,
    pub self_closing: bool,
}

impl TagInstance {
    /// First attribute with the given name
    pub fn attribute(&self, name: &str) -> Option<&Attribute> {
        self.attributes.iter().find(|attr| attr.name == name)
    }
}

/// Parse `source` and return every JSX opening tag in it
///
/// The syntax is picked from the extension of `path`. Recoverable parser errors are
/// treated as failures as well: a file that does not parse cleanly is never patched.
pub fn parse_tags(source: &str, path: &Path) -> TestIdResult<Vec<TagInstance>> {
    let cm: Lrc<SourceMap> = Default::default();
    let fm = cm.new_source_file(
        FileName::Real(path.to_path_buf()).into(),
        source.to_string(),
    );
    let lexer = Lexer::new(
        syntax_for(path),
        Default::default(),
        StringInput::from(&*fm),
        None,
    );
    let mut parser = Parser::new_from(lexer);

    let module = parser.parse_module().map_err(|e| {
        let line = cm.lookup_char_pos(e.span().lo).line;
        TestIdError::parse(path, format!("line {}: {:?}", line, e.kind()))
    })?;

    if let Some(e) = parser.take_errors().into_iter().next() {
        let line = cm.lookup_char_pos(e.span().lo).line;
        return Err(TestIdError::parse(
            path,
            format!("line {}: {:?}", line, e.kind()),
        ));
    }

    let mut collector = TagCollector {
        source,
        base: fm.start_pos,
        tags: Vec::new(),
    };
    module.visit_with(&mut collector);

    tracing::trace!(
        file_path = %path.display(),
        tags = collector.tags.len(),
        "Collected JSX opening tags"
    );

    Ok(collector.tags)
}

fn syntax_for(path: &Path) -> Syntax {
    match path.extension().and_then(|ext| ext.to_str()) {
        Some("ts") => Syntax::Typescript(TsSyntax {
            tsx: false,
            decorators: true,
            ..Default::default()
        }),
        Some("tsx") | Some("mts") | Some("cts") => Syntax::Typescript(TsSyntax {
            tsx: true,
            decorators: true,
            ..Default::default()
        }),
        _ => Syntax::Es(EsSyntax {
            jsx: true,
            decorators: true,
            ..Default::default()
        }),
    }
}

struct TagCollector<'a> {
    source: &'a str,
    base: BytePos,
    tags: Vec<TagInstance>,
}

impl TagCollector<'_> {
    fn byte_span(&self, span: Span) -> ByteSpan {
        ByteSpan::new(
            span.lo.0.saturating_sub(self.base.0) as usize,
            span.hi.0.saturating_sub(self.base.0) as usize,
        )
    }

    fn text(&self, span: ByteSpan) -> &str {
        self.source.get(span.start..span.end).unwrap_or_default()
    }

    fn attribute_value(&self, span: ByteSpan) -> AttributeValue {
        let text = self.text(span);
        let mut chars = text.chars();
        match (chars.next(), chars.next_back()) {
            (Some(open), Some(close)) if open == close && matches!(open, '"' | '\'') => {
                AttributeValue::Literal {
                    raw: text[1..text.len() - 1].to_string(),
                    span,
                }
            }
            _ => AttributeValue::Expression,
        }
    }

    fn tag_instance(&self, element: &JSXOpeningElement) -> TagInstance {
        let span = self.byte_span(element.span);
        let attributes = element
            .attrs
            .iter()
            .filter_map(|attr| match attr {
                JSXAttrOrSpread::JSXAttr(attr) => Some(Attribute {
                    name: self.text(self.byte_span(attr.name.span())).to_string(),
                    value: attr
                        .value
                        .as_ref()
                        .map(|value| self.attribute_value(self.byte_span(value.span()))),
                }),
                JSXAttrOrSpread::SpreadElement(_) => None,
            })
            .collect();

        TagInstance {
            name: self.text(self.byte_span(element.name.span())).to_string(),
            attributes,
            span,
            self_closing: span.len() >= 2 && self.source.as_bytes().get(span.end - 2) == Some(&b'/'),
        }
    }
}

impl Visit for TagCollector<'_> {
    fn visit_jsx_opening_element(&mut self, element: &JSXOpeningElement) {
        let tag = self.tag_instance(element);
        self.tags.push(tag);
        // Attribute values may hold further elements: `wow={<div>wow</div>}`
        element.visit_children_with(self);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn tags_of(source: &str, file: &str) -> Vec<TagInstance> {
        parse_tags(source, Path::new(file)).unwrap()
    }

    #[test]
    fn test_spans_cover_opening_tags() {
        let source = r#"const a = <div className="x"><span /></div>;"#;
        let tags = tags_of(source, "a.jsx");
        assert_eq!(tags.len(), 2);

        let div = &tags[0];
        assert_eq!(div.name, "div");
        assert_eq!(&source[div.span.start..div.span.end], r#"<div className="x">"#);
        assert!(!div.self_closing);

        let span = &tags[1];
        assert_eq!(span.name, "span");
        assert_eq!(&source[span.span.start..span.span.end], "<span />");
        assert!(span.self_closing);
    }

    #[test]
    fn test_attribute_values() {
        let source = r#"<X a="one" b='' c={value} d {...rest} />;"#;
        let tags = tags_of(source, "a.js");
        let tag = &tags[0];

        assert_eq!(tag.attributes.len(), 4);
        match &tag.attributes[0].value {
            Some(AttributeValue::Literal { raw, span }) => {
                assert_eq!(raw, "one");
                assert_eq!(&source[span.start..span.end], r#""one""#);
            }
            other => panic!("unexpected value {:?}", other),
        }
        match &tag.attributes[1].value {
            Some(AttributeValue::Literal { raw, span }) => {
                assert_eq!(raw, "");
                assert_eq!(span.len(), 2);
            }
            other => panic!("unexpected value {:?}", other),
        }
        assert_eq!(tag.attributes[2].value, Some(AttributeValue::Expression));
        assert_eq!(tag.attributes[3].value, None);
        assert!(tag.attribute("d").is_some());
        assert!(tag.attribute("rest").is_none());
    }

    #[test]
    fn test_nested_elements_in_attributes() {
        let source = "<X\n\tx=\"x\"\n\twow={() => <div>wow</div>}\n/>;";
        let names: Vec<_> = tags_of(source, "a.jsx")
            .into_iter()
            .map(|tag| tag.name)
            .collect();
        assert_eq!(names, vec!["X", "div"]);
    }

    #[test]
    fn test_member_and_namespaced_names() {
        let source = "<>\n<Foo.Bar />\n<svg:rect />\n</>;";
        let names: Vec<_> = tags_of(source, "a.jsx")
            .into_iter()
            .map(|tag| tag.name)
            .collect();
        assert_eq!(names, vec!["Foo.Bar", "svg:rect"]);
    }

    #[test]
    fn test_tsx_with_types() {
        let source = r#"
interface Props { label: string }
export const Button = ({ label }: Props): JSX.Element => <button type="button">{label}</button>;
"#;
        let tags = tags_of(source, "Button.tsx");
        assert_eq!(tags.len(), 1);
        assert_eq!(tags[0].name, "button");
    }

    #[test]
    fn test_offsets_with_multibyte_text() {
        let source = "const s = \"héllo ✓\";\nconst a = <p title=\"ünïcode\">x</p>;";
        let tags = tags_of(source, "a.jsx");
        let tag = &tags[0];
        assert_eq!(&source[tag.span.start..tag.span.end], "<p title=\"ünïcode\">");
    }

    #[test]
    fn test_parse_error_is_reported() {
        let result = parse_tags("const a = <div>;", Path::new("broken.jsx"));
        assert!(matches!(result, Err(TestIdError::Parse { .. })));
    }
}
