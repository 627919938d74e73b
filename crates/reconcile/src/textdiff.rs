//! Semantic equivalence of markup documents
//!
//! Policy documents are markup that may embed an expression language the
//! markup grammar does not allow (`@(...)` with raw quotes inside attribute
//! values, `${...}` templates). Comparison is two-tier:
//!
//! 1. If both sides parse, compare trees ignoring attribute order, element
//!    order and insignificant whitespace.
//! 2. Otherwise strip all whitespace, reverse the five standard entity
//!    escapes and compare the resulting strings exactly.

use quick_xml::events::{BytesStart, Event};
use quick_xml::reader::Reader;
use std::collections::BTreeMap;

/// How two documents were compared.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Comparison {
    /// Both documents parsed as markup
    Structural { equal: bool },
    /// At least one side did not parse; normalized text was compared
    Normalized { equal: bool },
}

impl Comparison {
    pub fn is_equivalent(&self) -> bool {
        match self {
            Comparison::Structural { equal } | Comparison::Normalized { equal } => *equal,
        }
    }
}

/// Whether two documents are semantically the same.
pub fn equivalent(old: &str, new: &str) -> bool {
    compare(old, new).is_equivalent()
}

/// Compare two documents, reporting which tier decided.
pub fn compare(old: &str, new: &str) -> Comparison {
    match (parse_document(old), parse_document(new)) {
        (Some(a), Some(b)) => Comparison::Structural { equal: a == b },
        _ => {
            log::debug!("document did not parse as markup, comparing normalized text");
            Comparison::Normalized {
                equal: normalize(old) == normalize(new),
            }
        }
    }
}

/// Best-effort textual normalization.
///
/// Removes every whitespace character and unescapes `&quot;`, `&gt;`, `&lt;`,
/// `&amp;` and `&apos;` until no escape remains, so applying it twice gives
/// the same result as applying it once.
pub fn normalize(text: &str) -> String {
    let mut current: String = text.chars().filter(|c| !c.is_whitespace()).collect();
    loop {
        let next = unescape_once(&current);
        if next == current {
            return current;
        }
        current = next;
    }
}

const ENTITIES: [(&str, char); 5] = [
    ("&quot;", '"'),
    ("&gt;", '>'),
    ("&lt;", '<'),
    ("&amp;", '&'),
    ("&apos;", '\''),
];

fn unescape_once(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    let mut rest = text;
    while let Some(pos) = rest.find('&') {
        out.push_str(&rest[..pos]);
        let tail = &rest[pos..];
        match ENTITIES.iter().find(|(entity, _)| tail.starts_with(entity)) {
            Some((entity, ch)) => {
                out.push(*ch);
                rest = &tail[entity.len()..];
            }
            None => {
                out.push('&');
                rest = &tail[1..];
            }
        }
    }
    out.push_str(rest);
    out
}

#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord)]
enum Node {
    Element {
        name: String,
        attributes: BTreeMap<String, String>,
        children: Vec<Node>,
    },
    Text(String),
}

struct Open {
    name: String,
    attributes: BTreeMap<String, String>,
    children: Vec<Node>,
}

impl Open {
    fn close(mut self) -> Node {
        self.children.sort();
        Node::Element {
            name: self.name,
            attributes: self.attributes,
            children: self.children,
        }
    }
}

/// Parse into canonical top-level nodes, or `None` if not well-formed.
fn parse_document(input: &str) -> Option<Vec<Node>> {
    let mut reader = Reader::from_str(input);
    reader.config_mut().trim_text(true);

    let mut stack: Vec<Open> = Vec::new();
    let mut top: Vec<Node> = Vec::new();

    loop {
        let event = reader.read_event().ok()?;
        match event {
            Event::Start(start) => stack.push(open_element(&start)?),
            Event::Empty(start) => {
                let node = open_element(&start)?.close();
                push_node(&mut stack, &mut top, node);
            }
            Event::End(end) => {
                let open = stack.pop()?;
                if end.name().as_ref() != open.name.as_bytes() {
                    return None;
                }
                push_node(&mut stack, &mut top, open.close());
            }
            Event::Text(text) => {
                let text = collapse_whitespace(&text.unescape().ok()?);
                if !text.is_empty() {
                    // bare text outside any element is not a document
                    stack.last()?;
                    push_node(&mut stack, &mut top, Node::Text(text));
                }
            }
            Event::CData(data) => {
                let text = String::from_utf8(data.into_inner().into_owned()).ok()?;
                let text = collapse_whitespace(&text);
                if !text.is_empty() {
                    stack.last()?;
                    push_node(&mut stack, &mut top, Node::Text(text));
                }
            }
            Event::Eof => break,
            Event::Comment(_) | Event::Decl(_) | Event::PI(_) | Event::DocType(_) => {}
        }
    }

    if !stack.is_empty() || top.is_empty() {
        return None;
    }
    top.sort();
    Some(top)
}

fn open_element(start: &BytesStart<'_>) -> Option<Open> {
    let name = String::from_utf8(start.name().as_ref().to_vec()).ok()?;
    let mut attributes = BTreeMap::new();
    for attr in start.attributes() {
        let attr = attr.ok()?;
        let key = String::from_utf8(attr.key.as_ref().to_vec()).ok()?;
        let value = attr.unescape_value().ok()?.into_owned();
        attributes.insert(key, value);
    }
    Some(Open {
        name,
        attributes,
        children: Vec::new(),
    })
}

fn push_node(stack: &mut [Open], top: &mut Vec<Node>, node: Node) {
    match stack.last_mut() {
        Some(parent) => parent.children.push(node),
        None => top.push(node),
    }
}

fn collapse_whitespace(text: &str) -> String {
    text.split_whitespace().collect::<Vec<_>>().join(" ")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_whitespace_only_difference_is_structural_match() {
        let a = "<p><a/></p>";
        let b = "<p>\n  <a/>\n</p>";
        assert_eq!(compare(a, b), Comparison::Structural { equal: true });
    }

    #[test]
    fn test_escaped_expression_matches_raw_expression() {
        let raw = r#"<x v="@(Foo("a"))" />"#;
        let escaped = r#"<x v="@(Foo(&quot;a&quot;))" />"#;
        assert_eq!(compare(raw, escaped), Comparison::Normalized { equal: true });
    }

    #[test]
    fn test_attribute_order_is_ignored() {
        assert!(equivalent(
            r#"<set-header name="x" exists-action="override"/>"#,
            r#"<set-header exists-action="override" name="x"/>"#,
        ));
    }

    #[test]
    fn test_element_order_is_ignored() {
        assert!(equivalent(
            "<policies><inbound/><outbound/></policies>",
            "<policies><outbound/><inbound/></policies>",
        ));
    }

    #[test]
    fn test_real_content_change_is_detected() {
        let a = r#"<rate-limit calls="10" renewal-period="60"/>"#;
        let b = r#"<rate-limit calls="20" renewal-period="60"/>"#;
        assert_eq!(compare(a, b), Comparison::Structural { equal: false });
    }

    #[test]
    fn test_content_change_detected_in_fallback_tier() {
        let a = r#"<x v="@(Foo("a"))" />"#;
        let b = r#"<x v="@(Foo("b"))" />"#;
        assert_eq!(compare(a, b), Comparison::Normalized { equal: false });
    }

    #[test]
    fn test_text_whitespace_is_collapsed() {
        assert!(equivalent(
            "<value>@(context.Request\n     .Headers)</value>",
            "<value>@(context.Request .Headers)</value>",
        ));
    }

    #[test]
    fn test_text_whitespace_is_content_in_structural_tier() {
        let x = "<p>a b</p>";
        let stripped = normalize(x);
        assert_eq!(stripped, "<p>ab</p>");
        assert_eq!(compare(&stripped, x), Comparison::Structural { equal: false });
    }

    #[test]
    fn test_empty_documents() {
        assert!(equivalent("", ""));
        assert!(!equivalent("", "<p/>"));
        assert!(!equivalent("<p/>", ""));
        assert!(equivalent("   ", "\n"));
    }

    #[test]
    fn test_mismatched_tags_fall_back() {
        assert_eq!(
            compare("<a></b>", "<a></b>"),
            Comparison::Normalized { equal: true }
        );
        assert!(!equivalent("<a><b></a>", "<a><b/></a>"));
    }

    #[test]
    fn test_unclosed_element_is_not_markup() {
        assert!(parse_document("<a><b/>").is_none());
        assert!(parse_document("text only").is_none());
    }

    #[test]
    fn test_comments_are_ignored() {
        assert!(equivalent("<p><!-- note --><a/></p>", "<p><a/></p>"));
    }

    #[test]
    fn test_normalize_strips_and_unescapes() {
        assert_eq!(normalize("a &lt; b\n&amp;&amp; c"), "a<b&&c");
        assert_eq!(normalize("&apos;x&apos;"), "'x'");
        assert_eq!(normalize("&unknown; &"), "&unknown;&");
    }

    #[test]
    fn test_normalize_reaches_fixpoint() {
        let once = normalize("&amp;amp;quot;");
        assert_eq!(once, "\"");
        assert_eq!(normalize(&once), once);
    }

    #[test]
    fn test_reflexive_on_mixed_input() {
        for doc in [
            "",
            "<p/>",
            "<p>${named-value}</p>",
            r#"<x v="@(Foo("a"))" />"#,
            "<<<",
            "&amp;&",
        ] {
            assert!(equivalent(doc, doc), "not reflexive: {doc:?}");
        }
    }
}
