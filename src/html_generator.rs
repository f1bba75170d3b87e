//! HTML serialization of host document subtrees
use crate::errors::ReconcilerError;
use crate::host::{HostDocument, HostNodeKind};
use crate::types::HostId;
use phf::phf_set;

/// Attribute carrying the host id when [`HtmlOptions::annotate_ids`] is set.
pub const ID_ATTRIBUTE: &str = "data-vdom-id";

// Elements that never have a closing tag or children.
static VOID_ELEMENTS: phf::Set<&'static str> = phf_set! {
    "area", "base", "br", "col", "embed", "hr", "img",
    "input", "link", "meta", "source", "track", "wbr",
};

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct HtmlOptions {
    /// Emit `data-vdom-id` on every element so patch consumers can address it.
    pub annotate_ids: bool,
}

/// Consistent HTML escaping for text and attribute values
fn html_escape(s: &str) -> String {
    s.replace('&', "&amp;")
        .replace('<', "&lt;")
        .replace('>', "&gt;")
        .replace('"', "&quot;")
        .replace('\'', "&#x27;")
}

pub fn is_void_element(tag: &str) -> bool {
    VOID_ELEMENTS.contains(tag)
}

/// HTML of `id` itself and its subtree.
pub fn outer_html(doc: &HostDocument, id: HostId, options: HtmlOptions) -> Result<String, ReconcilerError> {
    let mut out = String::new();
    write_node(doc, id, options, &mut out)?;
    Ok(out)
}

/// HTML of the children of `id`.
pub fn inner_html(doc: &HostDocument, id: HostId, options: HtmlOptions) -> Result<String, ReconcilerError> {
    let mut out = String::new();
    for &child in doc.node(id)?.children() {
        write_node(doc, child, options, &mut out)?;
    }
    Ok(out)
}

fn write_node(
    doc: &HostDocument,
    id: HostId,
    options: HtmlOptions,
    out: &mut String,
) -> Result<(), ReconcilerError> {
    let node = doc.node(id)?;
    match node.kind() {
        HostNodeKind::Root => {
            for &child in node.children() {
                write_node(doc, child, options, out)?;
            }
        }
        HostNodeKind::Text(text) => out.push_str(&html_escape(text)),
        HostNodeKind::Element { tag, attributes } => {
            out.push('<');
            out.push_str(tag);
            if options.annotate_ids {
                out.push_str(&format!(r#" {ID_ATTRIBUTE}="{}""#, id.get()));
            }
            for (name, value) in attributes {
                out.push_str(&format!(r#" {}="{}""#, html_escape(name), html_escape(value)));
            }
            out.push('>');

            // Content of void elements is kept in the host but never serialized.
            if is_void_element(tag) {
                return Ok(());
            }
            for &child in node.children() {
                write_node(doc, child, options, out)?;
            }
            out.push_str(&format!("</{tag}>"));
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::host::Host;
    use pretty_assertions::assert_eq;

    #[test]
    fn escapes_text_and_attributes() {
        let mut doc = HostDocument::new();
        let a = doc.create_element("a").unwrap();
        doc.set_attribute(a, "title", r#"say "hi" & 'bye'"#).unwrap();
        let text = doc.create_text("<b>").unwrap();
        doc.append_child(a, text).unwrap();
        doc.append_child(doc.root(), a).unwrap();

        assert_eq!(
            doc.to_html().unwrap(),
            r#"<a title="say &quot;hi&quot; &amp; &#x27;bye&#x27;">&lt;b&gt;</a>"#
        );
    }

    #[test]
    fn void_elements_have_no_content() {
        let mut doc = HostDocument::new();
        let input = doc.create_element("input").unwrap();
        doc.set_text_content(input, "ignored").unwrap();
        doc.append_child(doc.root(), input).unwrap();

        assert_eq!(doc.to_html().unwrap(), "<input>");
        assert_eq!(
            outer_html(&doc, input, HtmlOptions { annotate_ids: true }).unwrap(),
            r#"<input data-vdom-id="1">"#
        );
        assert!(is_void_element("br"));
        assert!(!is_void_element("div"));
    }

    #[test]
    fn unknown_handles_fail() {
        let doc = HostDocument::new();
        assert!(matches!(
            inner_html(&doc, HostId::new(42), HtmlOptions::default()),
            Err(ReconcilerError::UnknownHandle(_))
        ));
    }
}
