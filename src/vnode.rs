//! Virtual node model and the identity comparator
use crate::errors::ReconcilerError;
use crate::types::HostId;
use indexmap::IndexMap;
use phf::phf_set;
use std::cell::Cell;
use std::rc::Rc;

/// Attribute name to value, in insertion order.
pub type Props = IndexMap<String, String>;

// Tags that `VNode::autodetect` treats as elements; anything else becomes text.
static KNOWN_TAGS: phf::Set<&'static str> = phf_set! {
    "div", "p", "h1", "h2", "h3", "h4", "h5", "h6", "span",
    "a", "i", "b", "img", "input", "button",
};

/// Content of an element node.
#[derive(Debug, Default)]
pub enum Children {
    #[default]
    Empty,
    /// Text content, replaced wholesale on change.
    Text(String),
    /// Ordered child nodes. Two versions may share one list through the `Rc`.
    Nodes(Rc<[VNode]>),
}

impl Children {
    pub fn nodes(&self) -> &[VNode] {
        match self {
            Children::Nodes(nodes) => &nodes[..],
            _ => &[],
        }
    }

    pub(crate) fn shape(&self) -> &'static str {
        match self {
            Children::Empty => "empty",
            Children::Text(_) => "text",
            Children::Nodes(_) => "nodes",
        }
    }
}

// Deep copy: a cloned list is made of fresh, unbound instances.
impl Clone for Children {
    fn clone(&self) -> Self {
        match self {
            Children::Empty => Children::Empty,
            Children::Text(text) => Children::Text(text.clone()),
            Children::Nodes(nodes) => Children::Nodes(nodes.iter().cloned().collect()),
        }
    }
}

impl PartialEq for Children {
    fn eq(&self, other: &Self) -> bool {
        match (self, other) {
            (Children::Empty, Children::Empty) => true,
            (Children::Text(a), Children::Text(b)) => a == b,
            (Children::Nodes(a), Children::Nodes(b)) => a[..] == b[..],
            _ => false,
        }
    }
}

impl From<&str> for Children {
    fn from(text: &str) -> Self {
        Children::Text(text.to_string())
    }
}

impl From<String> for Children {
    fn from(text: String) -> Self {
        Children::Text(text)
    }
}

impl From<Vec<VNode>> for Children {
    fn from(nodes: Vec<VNode>) -> Self {
        Children::Nodes(Rc::from(nodes))
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum NodeKind {
    Element {
        tag: String,
        props: Option<Props>,
        children: Children,
    },
    Text {
        text: String,
    },
}

/// One position in a virtual tree.
///
/// A node is created fresh for every tree version. Reconciliation binds it to
/// the host node it produced or was patched onto; that binding is set at most
/// once. Cloning yields an unbound deep copy.
#[derive(Debug)]
pub struct VNode {
    kind: NodeKind,
    key: Option<String>,
    // Set while `key` is the text of a text leaf rather than a caller's key.
    default_key: bool,
    host_ref: Cell<Option<HostId>>,
}

impl Clone for VNode {
    fn clone(&self) -> Self {
        VNode {
            kind: self.kind.clone(),
            key: self.key.clone(),
            default_key: self.default_key,
            host_ref: Cell::new(None),
        }
    }
}

/// Value equality; host bindings are not compared.
impl PartialEq for VNode {
    fn eq(&self, other: &Self) -> bool {
        self.key == other.key && self.kind == other.kind
    }
}

impl VNode {
    pub fn element(tag: impl Into<String>) -> Self {
        VNode {
            kind: NodeKind::Element {
                tag: tag.into(),
                props: None,
                children: Children::Empty,
            },
            key: None,
            default_key: false,
            host_ref: Cell::new(None),
        }
    }

    /// Text leaf; its key defaults to the text itself.
    pub fn text(text: impl Into<String>) -> Self {
        let text = text.into();
        VNode {
            key: Some(text.clone()),
            default_key: true,
            kind: NodeKind::Text { text },
            host_ref: Cell::new(None),
        }
    }

    /// Builds an element when `tag` is one of a small set of known HTML tags
    /// and a text node holding `tag` otherwise.
    pub fn autodetect(tag: &str, props: Option<Props>, children: impl Into<Children>) -> Self {
        if KNOWN_TAGS.contains(tag) {
            h(tag, props, children)
        } else {
            VNode::text(tag)
        }
    }

    pub fn with_key(mut self, key: impl Into<String>) -> Self {
        self.key = Some(key.into());
        self.default_key = false;
        self
    }

    /// Ignored on text nodes.
    pub fn with_prop(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        if let NodeKind::Element { props, .. } = &mut self.kind {
            props.get_or_insert_with(Props::new).insert(name.into(), value.into());
        }
        self
    }

    /// Ignored on text nodes.
    pub fn with_props(mut self, new_props: Props) -> Self {
        if let NodeKind::Element { props, .. } = &mut self.kind {
            *props = Some(new_props);
        }
        self
    }

    /// Ignored on text nodes.
    pub fn with_children(self, nodes: impl IntoIterator<Item = VNode>) -> Self {
        self.with_content(Children::Nodes(nodes.into_iter().collect()))
    }

    /// Uses `nodes` as the children list without copying it. Every node in a
    /// shared list keeps the binding it already has.
    pub fn with_shared_children(self, nodes: Rc<[VNode]>) -> Self {
        self.with_content(Children::Nodes(nodes))
    }

    /// Ignored on text nodes.
    pub fn with_text(self, text: impl Into<String>) -> Self {
        self.with_content(Children::Text(text.into()))
    }

    pub fn with_content(mut self, content: Children) -> Self {
        if let NodeKind::Element { children, .. } = &mut self.kind {
            *children = content;
        }
        self
    }

    pub fn kind(&self) -> &NodeKind {
        &self.kind
    }

    pub fn tag(&self) -> Option<&str> {
        match &self.kind {
            NodeKind::Element { tag, .. } => Some(tag),
            NodeKind::Text { .. } => None,
        }
    }

    pub fn text_content(&self) -> Option<&str> {
        match &self.kind {
            NodeKind::Text { text } => Some(text),
            NodeKind::Element { .. } => None,
        }
    }

    pub fn is_text(&self) -> bool {
        matches!(self.kind, NodeKind::Text { .. })
    }

    pub fn key(&self) -> Option<&str> {
        self.key.as_deref()
    }

    /// True for a text leaf keyed by its own text. Equal siblings of that
    /// kind are ordinary content, not duplicate keys.
    pub fn has_default_key(&self) -> bool {
        self.default_key
    }

    pub fn props(&self) -> Option<&Props> {
        match &self.kind {
            NodeKind::Element { props, .. } => props.as_ref(),
            NodeKind::Text { .. } => None,
        }
    }

    pub fn prop(&self, name: &str) -> Option<&str> {
        self.props().and_then(|props| props.get(name)).map(String::as_str)
    }

    pub fn children(&self) -> Option<&Children> {
        match &self.kind {
            NodeKind::Element { children, .. } => Some(children),
            NodeKind::Text { .. } => None,
        }
    }

    /// Child nodes, empty unless the content is a children list.
    pub fn child_nodes(&self) -> &[VNode] {
        self.children().map(Children::nodes).unwrap_or(&[])
    }

    pub fn host_ref(&self) -> Option<HostId> {
        self.host_ref.get()
    }

    pub(crate) fn host(&self) -> Result<HostId, ReconcilerError> {
        self.host_ref.get().ok_or_else(|| ReconcilerError::UnboundNode {
            what: self.describe(),
        })
    }

    pub(crate) fn bind(&self, id: HostId) -> Result<(), ReconcilerError> {
        match self.host_ref.get() {
            Some(existing) => Err(ReconcilerError::AlreadyBound { existing }),
            None => {
                self.host_ref.set(Some(id));
                Ok(())
            }
        }
    }

    pub(crate) fn describe(&self) -> String {
        match (&self.kind, &self.key) {
            (NodeKind::Element { tag, .. }, Some(key)) => format!("{tag} key={key}"),
            (NodeKind::Element { tag, .. }, None) => tag.clone(),
            (NodeKind::Text { .. }, _) => "#text".to_string(),
        }
    }

    pub fn same_identity(&self, other: &VNode) -> bool {
        same_identity(self, other)
    }
}

/// Two nodes denote the same logical node iff their keys and tags are equal.
/// Text nodes have no tag and compare by key alone.
pub fn same_identity(a: &VNode, b: &VNode) -> bool {
    a.key == b.key && a.tag() == b.tag()
}

/// Element constructor in the style of `createElement`: a `key` prop also
/// becomes the node's key.
pub fn h(tag: &str, props: Option<Props>, children: impl Into<Children>) -> VNode {
    let key = props.as_ref().and_then(|props| props.get("key")).cloned();
    let mut node = VNode::element(tag).with_content(children.into());
    if let Some(props) = props {
        node = node.with_props(props);
    }
    node.key = key;
    node
}

#[cfg(test)]
mod tests {
    use super::*;

    fn props(pairs: &[(&str, &str)]) -> Props {
        pairs.iter().map(|(k, v)| (k.to_string(), v.to_string())).collect()
    }

    #[test]
    fn text_nodes_default_their_key_to_the_text() {
        let node = VNode::text("hello");
        assert!(node.is_text());
        assert_eq!(node.key(), Some("hello"));
        assert_eq!(node.tag(), None);
        assert_eq!(node.text_content(), Some("hello"));
        assert!(node.children().is_none());
        assert!(node.has_default_key());
        assert!(!node.with_key("greeting").has_default_key());
        assert!(!VNode::element("p").with_key("hello").has_default_key());
    }

    #[test]
    fn h_lifts_the_key_prop() {
        let node = h("p", Some(props(&[("key", "3"), ("style", "color: red;")])), "test-3");
        assert_eq!(node.key(), Some("3"));
        assert_eq!(node.prop("style"), Some("color: red;"));
        assert_eq!(node.prop("key"), Some("3"));
        assert_eq!(node.children(), Some(&Children::Text("test-3".into())));

        let unkeyed = h("div", None, vec![node]);
        assert_eq!(unkeyed.key(), None);
        assert_eq!(unkeyed.child_nodes().len(), 1);
    }

    #[test]
    fn autodetect_turns_unknown_tags_into_text() {
        assert_eq!(VNode::autodetect("span", None, Children::Empty).tag(), Some("span"));

        let node = VNode::autodetect("hello world", Some(props(&[("key", "1")])), "ignored");
        assert!(node.is_text());
        assert_eq!(node.key(), Some("hello world"));
        assert!(node.props().is_none());
    }

    #[test]
    fn builders_do_not_touch_text_nodes() {
        let node = VNode::text("x").with_prop("a", "b").with_children([VNode::text("y")]);
        assert_eq!(node, VNode::text("x"));
    }

    #[test]
    fn binding_is_set_once() {
        let node = VNode::element("div");
        assert!(matches!(node.host(), Err(ReconcilerError::UnboundNode { .. })));
        node.bind(HostId::new(4)).unwrap();
        assert_eq!(node.host_ref(), Some(HostId::new(4)));
        assert!(matches!(
            node.bind(HostId::new(5)),
            Err(ReconcilerError::AlreadyBound { existing }) if existing == HostId::new(4)
        ));
    }

    #[test]
    fn clones_are_deep_and_unbound() {
        let tree = VNode::element("ul").with_children([VNode::element("li").with_key("a")]);
        tree.bind(HostId::new(1)).unwrap();
        tree.child_nodes()[0].bind(HostId::new(2)).unwrap();

        let copy = tree.clone();
        assert_eq!(copy, tree);
        assert_eq!(copy.host_ref(), None);
        assert_eq!(copy.child_nodes()[0].host_ref(), None);
    }

    #[test]
    fn shared_children_keep_their_bindings() {
        let shared: Rc<[VNode]> = Rc::from(vec![VNode::text("a")]);
        shared[0].bind(HostId::new(9)).unwrap();
        let node = VNode::element("div").with_shared_children(shared.clone());
        match node.children() {
            Some(Children::Nodes(nodes)) => assert!(Rc::ptr_eq(nodes, &shared)),
            other => panic!("unexpected children {other:?}"),
        }
        assert_eq!(node.child_nodes()[0].host_ref(), Some(HostId::new(9)));
    }

    #[test]
    fn identity_requires_key_and_tag() {
        let div3 = VNode::element("div").with_key("3");
        let p3 = VNode::element("p").with_key("3");
        let div4 = VNode::element("div").with_key("4");
        assert!(!same_identity(&div3, &p3));
        assert!(!same_identity(&div3, &div4));
        assert!(same_identity(&div3, &VNode::element("div").with_key("3")));
        assert!(same_identity(&VNode::element("div"), &VNode::element("div")));
        assert!(same_identity(&VNode::text("a"), &VNode::text("a")));
        assert!(!same_identity(&VNode::text("a"), &VNode::text("b")));
        assert!(!same_identity(&VNode::text("div"), &VNode::element("div").with_key("div")));
    }
}
