//! Confluence storage-format markup to plain text.
//!
//! Storage format is XHTML with Confluence extensions (`ac:` macros,
//! `ri:` resource identifiers, CDATA bodies for code blocks). It is parsed
//! with the lenient HTML5 parser from `scraper`, so unbalanced or invalid
//! markup never fails; the worst case is best-effort text. XML-only syntax
//! (CDATA, empty `<x/>` tags) is rewritten first so the parser keeps it.

use std::borrow::Cow;

use scraper::{ElementRef, Html, Node};

/// Elements that start a new line in the extracted text.
const BLOCK_ELEMENTS: &[&str] = &[
    "address",
    "article",
    "aside",
    "blockquote",
    "br",
    "caption",
    "dd",
    "div",
    "dl",
    "dt",
    "figcaption",
    "figure",
    "footer",
    "h1",
    "h2",
    "h3",
    "h4",
    "h5",
    "h6",
    "header",
    "hr",
    "li",
    "main",
    "nav",
    "ol",
    "p",
    "pre",
    "section",
    "table",
    "tbody",
    "td",
    "tfoot",
    "th",
    "thead",
    "tr",
    "ul",
    "ac:structured-macro",
    "ac:rich-text-body",
    "ac:plain-text-body",
    "ac:layout",
    "ac:layout-section",
    "ac:layout-cell",
    "ac:task",
    "ac:task-body",
];

/// Elements whose content never reaches the text.
///
/// `ac:parameter` holds macro settings (`language=java`, `title=...`),
/// not page prose.
const SKIPPED_ELEMENTS: &[&str] = &["script", "style", "head", "ac:parameter"];

/// HTML void elements; `/>` on these is already understood by the parser.
const VOID_ELEMENTS: &[&str] = &[
    "area", "base", "br", "col", "embed", "hr", "img", "input", "link", "meta", "param", "source",
    "track", "wbr",
];

/// Strip markup from `markup`, keeping block boundaries as newlines.
///
/// Lines are trimmed and whitespace inside a line is collapsed; empty lines
/// are dropped. Empty input yields an empty string.
pub fn to_plain_text(markup: &str) -> String {
    if markup.trim().is_empty() {
        return String::new();
    }

    let unwrapped = unwrap_cdata(markup);
    let source = expand_empty_tags(&unwrapped);
    let fragment = Html::parse_fragment(&source);

    let mut raw = String::with_capacity(source.len());
    walk(fragment.root_element(), &mut raw);

    raw.lines()
        .map(|line| line.split_whitespace().collect::<Vec<_>>().join(" "))
        .filter(|line| !line.is_empty())
        .collect::<Vec<_>>()
        .join("\n")
}

fn walk(element: ElementRef<'_>, out: &mut String) {
    for child in element.children() {
        match child.value() {
            Node::Text(text) => out.push_str(text),
            Node::Element(el) => {
                let name = el.name();
                if SKIPPED_ELEMENTS.contains(&name) {
                    continue;
                }
                let block = BLOCK_ELEMENTS.contains(&name);
                if block {
                    out.push('\n');
                }
                if let Some(child_el) = ElementRef::wrap(child) {
                    walk(child_el, out);
                }
                if block {
                    out.push('\n');
                }
            }
            _ => {}
        }
    }
}

/// Replace `<![CDATA[...]]>` sections with their escaped contents.
///
/// The HTML5 parser turns CDATA outside foreign content into a comment,
/// which would drop Confluence code-macro bodies entirely. An unterminated
/// section runs to the end of the input.
fn unwrap_cdata(markup: &str) -> Cow<'_, str> {
    const OPEN: &str = "<![CDATA[";
    const CLOSE: &str = "]]>";

    if !markup.contains(OPEN) {
        return Cow::Borrowed(markup);
    }

    let mut out = String::with_capacity(markup.len());
    let mut rest = markup;
    while let Some(start) = rest.find(OPEN) {
        out.push_str(&rest[..start]);
        let body_start = start + OPEN.len();
        let (body, after) = match rest[body_start..].find(CLOSE) {
            Some(end) => (
                &rest[body_start..body_start + end],
                &rest[body_start + end + CLOSE.len()..],
            ),
            None => (&rest[body_start..], ""),
        };
        out.push_str(&escape_text(body));
        rest = after;
    }
    out.push_str(rest);
    Cow::Owned(out)
}

/// Rewrite XML empty tags such as `<ac:parameter ac:name="icon" />` as an
/// open/close pair.
///
/// The HTML5 parser ignores `/>` on non-void elements, so an empty macro
/// parameter would stay open and swallow the rest of its macro body.
fn expand_empty_tags(markup: &str) -> Cow<'_, str> {
    if !markup.contains("/>") {
        return Cow::Borrowed(markup);
    }

    let mut out = String::with_capacity(markup.len() + 64);
    let mut rest = markup;
    while let Some(start) = rest.find('<') {
        out.push_str(&rest[..start]);
        let tag = &rest[start..];
        match empty_tag(tag) {
            Some((len, name)) => {
                out.push('<');
                out.push_str(tag[1..len - 2].trim_end());
                out.push_str("></");
                out.push_str(name);
                out.push('>');
                rest = &tag[len..];
            }
            None => {
                out.push('<');
                rest = &tag[1..];
            }
        }
    }
    out.push_str(rest);
    Cow::Owned(out)
}

/// For a `tag` starting at `<` with a non-void empty element, its byte
/// length and element name. Quoted attribute values may contain `>`.
fn empty_tag(tag: &str) -> Option<(usize, &str)> {
    let body = &tag[1..];
    let name_len = body
        .find(|c: char| !(c.is_ascii_alphanumeric() || matches!(c, ':' | '-' | '_' | '.')))
        .unwrap_or(body.len());
    let name = &body[..name_len];
    if !name.starts_with(|c: char| c.is_ascii_alphabetic()) {
        return None;
    }

    let mut quote: Option<char> = None;
    for (offset, c) in body[name_len..].char_indices() {
        match quote {
            Some(q) if c == q => quote = None,
            Some(_) => {}
            None => match c {
                '"' | '\'' => quote = Some(c),
                '<' => return None,
                '>' => {
                    let end = name_len + offset;
                    let is_void = VOID_ELEMENTS.iter().any(|v| name.eq_ignore_ascii_case(v));
                    if !body[..end].ends_with('/') || is_void {
                        return None;
                    }
                    // '<' + body up to and including '>'
                    return Some((end + 2, name));
                }
                _ => {}
            },
        }
    }
    None
}

fn escape_text(text: &str) -> String {
    text.replace('&', "&amp;")
        .replace('<', "&lt;")
        .replace('>', "&gt;")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_empty_input() {
        assert_eq!(to_plain_text(""), "");
        assert_eq!(to_plain_text("   \n "), "");
    }

    #[test]
    fn test_block_boundaries_become_newlines() {
        let html = "<h1>ADR-012</h1><p>Status: <strong>Accepted</strong></p><p>Use Kafka.</p>";
        assert_eq!(to_plain_text(html), "ADR-012\nStatus: Accepted\nUse Kafka.");
    }

    #[test]
    fn test_lists_and_tables() {
        let html = "<ul><li>one</li><li>two</li></ul><table><tr><td>a</td><td>b</td></tr></table>";
        assert_eq!(to_plain_text(html), "one\ntwo\na\nb");
    }

    #[test]
    fn test_entities_decoded() {
        assert_eq!(to_plain_text("<p>R&amp;D &lt;team&gt;</p>"), "R&D <team>");
    }

    #[test]
    fn test_malformed_markup_does_not_fail() {
        let html = "<p>unclosed <b>bold <div>nested</p></span> tail";
        let text = to_plain_text(html);
        assert!(text.contains("unclosed"));
        assert!(text.contains("nested"));
        assert!(text.contains("tail"));
    }

    #[test]
    fn test_plain_text_passthrough() {
        assert_eq!(to_plain_text("just   words"), "just words");
    }

    #[test]
    fn test_script_and_macro_parameters_skipped() {
        let html = r#"<script>var x = 1;</script><ac:structured-macro ac:name="code"><ac:parameter ac:name="language">java</ac:parameter><ac:plain-text-body><![CDATA[if (a < b) { run(); }]]></ac:plain-text-body></ac:structured-macro>"#;
        let text = to_plain_text(html);
        assert!(!text.contains("var x"));
        assert!(!text.contains("java"));
        assert_eq!(text, "if (a < b) { run(); }");
    }

    #[test]
    fn test_empty_macro_parameter_keeps_panel_body() {
        let html = r#"<ac:structured-macro ac:name="info"><ac:parameter ac:name="icon" /><ac:rich-text-body><p>Decision: use Kafka</p></ac:rich-text-body></ac:structured-macro><p>After</p>"#;
        assert_eq!(to_plain_text(html), "Decision: use Kafka\nAfter");
    }

    #[test]
    fn test_empty_resource_tag_in_link() {
        let html = r#"<p>See <ac:link><ri:page ri:content-title="ADR-7 a/b > c" /></ac:link> for details.</p><p>Next</p>"#;
        assert_eq!(to_plain_text(html), "See for details.\nNext");
    }

    #[test]
    fn test_expand_empty_tags() {
        assert_eq!(
            expand_empty_tags(r#"<ac:parameter ac:name="x"/>"#),
            r#"<ac:parameter ac:name="x"></ac:parameter>"#
        );
        assert_eq!(expand_empty_tags("a<br/>b<hr />"), "a<br/>b<hr />");
        assert_eq!(expand_empty_tags("1 < 2 and <p>x</p>"), "1 < 2 and <p>x</p>");
        assert_eq!(expand_empty_tags("<a/>"), "<a></a>");
    }

    #[test]
    fn test_unterminated_cdata() {
        assert_eq!(unwrap_cdata("a<![CDATA[b<c"), "ab&lt;c");
    }
}
