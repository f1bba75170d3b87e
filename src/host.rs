//! Host capability consumed by the reconciler, plus an in-memory host document
//! that records every visible mutation as a [`Patch`].
use crate::errors::ReconcilerError;
use crate::html_generator::{self, HtmlOptions};
use crate::types::{HostId, Patch, PatchAction};
use crate::vnode::{Children, NodeKind, VNode};
use indexmap::IndexMap;
use log::{debug, trace};
use serde_json::json;
use std::collections::HashMap;

/// The live tree a virtual tree is rendered onto.
///
/// Mutation semantics follow the DOM: inserting a node that already has a
/// parent moves it, and removing or replacing a node discards its subtree.
pub trait Host {
    fn create_element(&mut self, tag: &str) -> Result<HostId, ReconcilerError>;

    fn create_text(&mut self, text: &str) -> Result<HostId, ReconcilerError>;

    fn set_attribute(&mut self, node: HostId, name: &str, value: &str) -> Result<(), ReconcilerError>;

    fn remove_attribute(&mut self, node: HostId, name: &str) -> Result<(), ReconcilerError>;

    /// Replaces the whole content of `node` with `text`.
    fn set_text_content(&mut self, node: HostId, text: &str) -> Result<(), ReconcilerError>;

    /// Inserts `child` before `reference`, or last when `reference` is `None`.
    fn insert_before(
        &mut self,
        parent: HostId,
        child: HostId,
        reference: Option<HostId>,
    ) -> Result<(), ReconcilerError>;

    fn append_child(&mut self, parent: HostId, child: HostId) -> Result<(), ReconcilerError> {
        self.insert_before(parent, child, None)
    }

    fn remove_child(&mut self, parent: HostId, child: HostId) -> Result<(), ReconcilerError>;

    fn replace_child(
        &mut self,
        parent: HostId,
        new_child: HostId,
        old_child: HostId,
    ) -> Result<(), ReconcilerError>;

    fn next_sibling(&self, node: HostId) -> Result<Option<HostId>, ReconcilerError>;

    /// Materializes a detached host subtree for an unbound node and binds
    /// every node of the subtree to what it produced.
    fn render(&mut self, node: &VNode) -> Result<HostId, ReconcilerError> {
        render_subtree(self, node)
    }
}

/// Default render primitive, built from the other [`Host`] capabilities.
pub fn render_subtree<H: Host + ?Sized>(host: &mut H, node: &VNode) -> Result<HostId, ReconcilerError> {
    if let Some(existing) = node.host_ref() {
        return Err(ReconcilerError::AlreadyBound { existing });
    }
    let id = match node.kind() {
        NodeKind::Text { text } => host.create_text(text)?,
        NodeKind::Element { tag, props, children } => {
            let id = host.create_element(tag)?;
            for (name, value) in props.iter().flatten() {
                host.set_attribute(id, name, value)?;
            }
            match children {
                Children::Empty => {}
                Children::Text(text) => {
                    let text_id = host.create_text(text)?;
                    host.append_child(id, text_id)?;
                }
                Children::Nodes(nodes) => {
                    for child in nodes.iter() {
                        let child_id = host.render(child)?;
                        host.append_child(id, child_id)?;
                    }
                }
            }
            id
        }
    };
    node.bind(id)?;
    Ok(id)
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum HostNodeKind {
    Root,
    Element {
        tag: String,
        attributes: IndexMap<String, String>,
    },
    Text(String),
}

#[derive(Debug, Clone)]
pub struct HostNode {
    kind: HostNodeKind,
    parent: Option<HostId>,
    children: Vec<HostId>,
}

impl HostNode {
    pub fn kind(&self) -> &HostNodeKind {
        &self.kind
    }

    pub fn parent(&self) -> Option<HostId> {
        self.parent
    }

    pub fn children(&self) -> &[HostId] {
        &self.children
    }

    pub fn tag(&self) -> Option<&str> {
        match &self.kind {
            HostNodeKind::Element { tag, .. } => Some(tag),
            _ => None,
        }
    }

    pub fn attribute(&self, name: &str) -> Option<&str> {
        match &self.kind {
            HostNodeKind::Element { attributes, .. } => attributes.get(name).map(String::as_str),
            _ => None,
        }
    }
}

/// Id-addressed host tree with a root container.
///
/// Ids are sequential and never reused; removed subtrees are dropped from
/// storage. Mutations reachable from the root are recorded as patches, while
/// work on detached subtrees stays silent until the `INSERT` that attaches them.
#[derive(Debug, Clone)]
pub struct HostDocument {
    nodes: HashMap<HostId, HostNode>,
    root: HostId,
    next_id: u64,
    patches: Vec<Patch>,
    // Root children as of the last `take_patches`, i.e. what a patch
    // consumer currently shows.
    delivered: Vec<HostId>,
}

impl Default for HostDocument {
    fn default() -> Self {
        Self::new()
    }
}

impl HostDocument {
    pub fn new() -> Self {
        let root = HostId::new(0);
        let nodes = HashMap::from([(
            root,
            HostNode {
                kind: HostNodeKind::Root,
                parent: None,
                children: Vec::new(),
            },
        )]);
        HostDocument {
            nodes,
            root,
            next_id: 1,
            patches: Vec::new(),
            delivered: Vec::new(),
        }
    }

    pub fn root(&self) -> HostId {
        self.root
    }

    pub fn node(&self, id: HostId) -> Result<&HostNode, ReconcilerError> {
        self.nodes.get(&id).ok_or(ReconcilerError::UnknownHandle(id))
    }

    fn node_mut(&mut self, id: HostId) -> Result<&mut HostNode, ReconcilerError> {
        self.nodes.get_mut(&id).ok_or(ReconcilerError::UnknownHandle(id))
    }

    pub fn contains(&self, id: HostId) -> bool {
        self.node(id).is_ok()
    }

    /// Number of live nodes, the root included.
    pub fn live_nodes(&self) -> usize {
        self.nodes.len()
    }

    pub fn children(&self, id: HostId) -> Result<&[HostId], ReconcilerError> {
        Ok(self.node(id)?.children())
    }

    pub fn patches(&self) -> &[Patch] {
        &self.patches
    }

    /// Hands the patch log over to the consumer, which is then assumed to
    /// mirror the current tree.
    pub fn take_patches(&mut self) -> Vec<Patch> {
        self.delivered = self.node(self.root).map(|root| root.children.clone()).unwrap_or_default();
        std::mem::take(&mut self.patches)
    }

    /// HTML of everything under the root container.
    pub fn to_html(&self) -> Result<String, ReconcilerError> {
        html_generator::inner_html(self, self.root, HtmlOptions::default())
    }

    pub fn outer_html(&self, id: HostId) -> Result<String, ReconcilerError> {
        html_generator::outer_html(self, id, HtmlOptions::default())
    }

    /// Drops every node except the root container, and the patch log.
    /// Ids handed out so far stay retired.
    pub fn clear(&mut self) {
        self.drop_tree();
        self.patches.clear();
        self.delivered.clear();
    }

    /// Discards the tree and every undelivered patch after a failed pass.
    ///
    /// The log is left holding one `REMOVE` per root child the consumer was
    /// last given, so the next delivery starts from an empty root on both
    /// sides. Repeated resets before a delivery yield the same removals.
    pub fn reset(&mut self) {
        self.drop_tree();
        self.patches.clear();
        let root = self.root;
        for child in self.delivered.clone() {
            self.record(PatchAction::Remove, child, json!({ "parent": root }));
        }
        debug!("HostDocument: reset, {} delivered root children to remove", self.delivered.len());
    }

    fn drop_tree(&mut self) {
        let root = self.root;
        self.nodes.retain(|&id, _| id == root);
        if let Some(node) = self.nodes.get_mut(&root) {
            node.children.clear();
        }
    }

    pub fn is_connected(&self, id: HostId) -> bool {
        let mut current = Some(id);
        while let Some(node_id) = current {
            if node_id == self.root {
                return true;
            }
            current = self.node(node_id).ok().and_then(HostNode::parent);
        }
        false
    }

    fn push_node(&mut self, kind: HostNodeKind) -> HostId {
        let id = HostId::new(self.next_id);
        self.next_id += 1;
        self.nodes.insert(
            id,
            HostNode {
                kind,
                parent: None,
                children: Vec::new(),
            },
        );
        id
    }

    fn record(&mut self, action: PatchAction, target: HostId, data: serde_json::Value) {
        trace!("HostDocument: {action} {target} {data}");
        self.patches.push(Patch { action, target, data });
    }

    fn annotated_html(&self, id: HostId) -> Result<String, ReconcilerError> {
        html_generator::outer_html(self, id, HtmlOptions { annotate_ids: true })
    }

    fn position_in(&self, parent: HostId, child: HostId) -> Result<usize, ReconcilerError> {
        self.node(parent)?
            .children
            .iter()
            .position(|&c| c == child)
            .ok_or(ReconcilerError::NotAChild { parent, child })
    }

    fn ensure_container(&self, parent: HostId, child: HostId) -> Result<(), ReconcilerError> {
        self.node(child)?;
        if matches!(self.node(parent)?.kind, HostNodeKind::Text(_)) {
            return Err(ReconcilerError::HierarchyViolation {
                parent,
                child,
                details: "text nodes cannot have children".into(),
            });
        }
        let mut current = Some(parent);
        while let Some(node_id) = current {
            if node_id == child {
                return Err(ReconcilerError::HierarchyViolation {
                    parent,
                    child,
                    details: "a node cannot be inserted into its own subtree".into(),
                });
            }
            current = self.node(node_id)?.parent;
        }
        Ok(())
    }

    fn detach(&mut self, child: HostId) -> Result<(), ReconcilerError> {
        if let Some(parent) = self.node(child)?.parent {
            let position = self.position_in(parent, child)?;
            self.node_mut(parent)?.children.remove(position);
            self.node_mut(child)?.parent = None;
        }
        Ok(())
    }

    fn free_subtree(&mut self, id: HostId) {
        let mut stack = vec![id];
        while let Some(node_id) = stack.pop() {
            if let Some(node) = self.nodes.remove(&node_id) {
                stack.extend(node.children);
            }
        }
    }
}

impl Host for HostDocument {
    fn create_element(&mut self, tag: &str) -> Result<HostId, ReconcilerError> {
        Ok(self.push_node(HostNodeKind::Element {
            tag: tag.to_string(),
            attributes: IndexMap::new(),
        }))
    }

    fn create_text(&mut self, text: &str) -> Result<HostId, ReconcilerError> {
        Ok(self.push_node(HostNodeKind::Text(text.to_string())))
    }

    fn set_attribute(&mut self, node: HostId, name: &str, value: &str) -> Result<(), ReconcilerError> {
        match &mut self.node_mut(node)?.kind {
            HostNodeKind::Element { attributes, .. } => {
                attributes.insert(name.to_string(), value.to_string());
            }
            _ => return Err(ReconcilerError::NotAnElement(node)),
        }
        if self.is_connected(node) {
            self.record(PatchAction::SetAttribute, node, json!({ "name": name, "value": value }));
        }
        Ok(())
    }

    fn remove_attribute(&mut self, node: HostId, name: &str) -> Result<(), ReconcilerError> {
        let removed = match &mut self.node_mut(node)?.kind {
            HostNodeKind::Element { attributes, .. } => attributes.shift_remove(name).is_some(),
            _ => return Err(ReconcilerError::NotAnElement(node)),
        };
        if removed && self.is_connected(node) {
            self.record(PatchAction::RemoveAttribute, node, json!({ "name": name }));
        }
        Ok(())
    }

    fn set_text_content(&mut self, node: HostId, text: &str) -> Result<(), ReconcilerError> {
        if let HostNodeKind::Text(current) = &mut self.node_mut(node)?.kind {
            *current = text.to_string();
        } else {
            let old_children = std::mem::take(&mut self.node_mut(node)?.children);
            for child in old_children {
                self.free_subtree(child);
            }
            if !text.is_empty() {
                let text_id = self.push_node(HostNodeKind::Text(text.to_string()));
                self.node_mut(text_id)?.parent = Some(node);
                self.node_mut(node)?.children.push(text_id);
            }
        }
        if self.is_connected(node) {
            self.record(PatchAction::SetText, node, json!({ "text": text }));
        }
        Ok(())
    }

    fn insert_before(
        &mut self,
        parent: HostId,
        child: HostId,
        reference: Option<HostId>,
    ) -> Result<(), ReconcilerError> {
        self.ensure_container(parent, child)?;
        if let Some(reference) = reference {
            if reference == child {
                return Ok(());
            }
            self.position_in(parent, reference)?;
        }

        let was_connected = self.is_connected(child);
        self.detach(child)?;
        let position = match reference {
            Some(reference) => self.position_in(parent, reference)?,
            None => self.node(parent)?.children.len(),
        };
        self.node_mut(parent)?.children.insert(position, child);
        self.node_mut(child)?.parent = Some(parent);

        match (was_connected, self.is_connected(parent)) {
            (true, true) => self.record(
                PatchAction::Move,
                child,
                json!({ "parent": parent, "before": reference }),
            ),
            (false, true) => {
                let html = self.annotated_html(child)?;
                self.record(
                    PatchAction::Insert,
                    child,
                    json!({ "parent": parent, "before": reference, "html": html }),
                );
            }
            (true, false) => self.record(PatchAction::Remove, child, json!({ "parent": null })),
            (false, false) => {}
        }
        Ok(())
    }

    fn remove_child(&mut self, parent: HostId, child: HostId) -> Result<(), ReconcilerError> {
        self.position_in(parent, child)?;
        let connected = self.is_connected(parent);
        self.detach(child)?;
        self.free_subtree(child);
        if connected {
            self.record(PatchAction::Remove, child, json!({ "parent": parent }));
        }
        Ok(())
    }

    fn replace_child(
        &mut self,
        parent: HostId,
        new_child: HostId,
        old_child: HostId,
    ) -> Result<(), ReconcilerError> {
        self.position_in(parent, old_child)?;
        if new_child == old_child {
            return Ok(());
        }
        self.ensure_container(parent, new_child)?;

        self.detach(new_child)?;
        let position = self.position_in(parent, old_child)?;
        self.node_mut(parent)?.children[position] = new_child;
        self.node_mut(new_child)?.parent = Some(parent);
        self.node_mut(old_child)?.parent = None;
        self.free_subtree(old_child);

        if self.is_connected(parent) {
            let html = self.annotated_html(new_child)?;
            self.record(
                PatchAction::Replace,
                old_child,
                json!({ "parent": parent, "new": new_child, "html": html }),
            );
        }
        Ok(())
    }

    fn next_sibling(&self, node: HostId) -> Result<Option<HostId>, ReconcilerError> {
        let Some(parent) = self.node(node)?.parent else {
            return Ok(None);
        };
        let position = self.position_in(parent, node)?;
        Ok(self.node(parent)?.children.get(position + 1).copied())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn list_doc() -> (HostDocument, HostId, [HostId; 3]) {
        let mut doc = HostDocument::new();
        let ul = doc.create_element("ul").unwrap();
        let items = ["a", "b", "c"].map(|text| {
            let li = doc.create_element("li").unwrap();
            let t = doc.create_text(text).unwrap();
            doc.append_child(li, t).unwrap();
            doc.append_child(ul, li).unwrap();
            li
        });
        doc.append_child(doc.root(), ul).unwrap();
        (doc, ul, items)
    }

    #[test]
    fn detached_construction_is_reported_by_one_insert() {
        let (mut doc, ul, _) = list_doc();
        let patches = doc.take_patches();
        assert_eq!(patches.len(), 1);
        assert_eq!(patches[0].action, PatchAction::Insert);
        assert_eq!(patches[0].target, ul);
        assert_eq!(
            patches[0].data["html"],
            r#"<ul data-vdom-id="1"><li data-vdom-id="2">a</li><li data-vdom-id="4">b</li><li data-vdom-id="6">c</li></ul>"#
        );
        assert_eq!(doc.to_html().unwrap(), "<ul><li>a</li><li>b</li><li>c</li></ul>");
    }

    #[test]
    fn inserting_an_attached_node_moves_it() {
        let (mut doc, ul, [a, b, c]) = list_doc();
        doc.take_patches();

        doc.insert_before(ul, c, Some(a)).unwrap();
        assert_eq!(doc.children(ul).unwrap(), &[c, a, b]);
        assert_eq!(doc.next_sibling(a).unwrap(), Some(b));
        assert_eq!(doc.next_sibling(b).unwrap(), None);

        let patches = doc.take_patches();
        assert_eq!(patches.len(), 1);
        assert_eq!(patches[0].action, PatchAction::Move);
        assert_eq!(patches[0].data["before"], a.get());
    }

    #[test]
    fn removal_frees_the_subtree() {
        let (mut doc, ul, [_, b, _]) = list_doc();
        let before = doc.live_nodes();
        let b_text = doc.children(b).unwrap()[0];

        doc.remove_child(ul, b).unwrap();
        assert_eq!(doc.live_nodes(), before - 2);
        assert!(matches!(doc.node(b_text), Err(ReconcilerError::UnknownHandle(_))));
        assert_eq!(doc.to_html().unwrap(), "<ul><li>a</li><li>c</li></ul>");

        let fresh = doc.create_element("li").unwrap();
        assert!(fresh.get() > b_text.get());
    }

    #[test]
    fn replace_swaps_in_place() {
        let (mut doc, ul, [_, b, _]) = list_doc();
        doc.take_patches();
        let p = doc.create_element("p").unwrap();
        doc.set_attribute(p, "class", "x").unwrap();
        assert!(doc.patches().is_empty());

        doc.replace_child(ul, p, b).unwrap();
        assert_eq!(doc.to_html().unwrap(), r#"<ul><li>a</li><p class="x"></p><li>c</li></ul>"#);
        assert!(!doc.contains(b));
        let patches = doc.take_patches();
        assert_eq!(patches[0].action, PatchAction::Replace);
        assert_eq!(patches[0].target, b);
    }

    #[test]
    fn text_content_replaces_children() {
        let (mut doc, ul, _) = list_doc();
        doc.set_text_content(ul, "empty").unwrap();
        assert_eq!(doc.to_html().unwrap(), "<ul>empty</ul>");
        doc.set_text_content(ul, "").unwrap();
        assert_eq!(doc.children(ul).unwrap().len(), 0);
    }

    #[test]
    fn rejects_invalid_hierarchies() {
        let (mut doc, ul, [a, b, _]) = list_doc();
        let text = doc.children(a).unwrap()[0];
        assert!(matches!(
            doc.append_child(text, b),
            Err(ReconcilerError::HierarchyViolation { .. })
        ));
        assert!(matches!(
            doc.append_child(a, ul),
            Err(ReconcilerError::HierarchyViolation { .. })
        ));
        assert!(matches!(
            doc.remove_child(a, b),
            Err(ReconcilerError::NotAChild { .. })
        ));
        assert!(matches!(
            doc.set_attribute(text, "x", "y"),
            Err(ReconcilerError::NotAnElement(_))
        ));
        assert!(matches!(
            doc.append_child(ul, HostId::new(999)),
            Err(ReconcilerError::UnknownHandle(_))
        ));
    }

    #[test]
    fn render_binds_every_node() {
        let mut doc = HostDocument::new();
        let tree = VNode::element("ul")
            .with_prop("class", "list")
            .with_children([VNode::element("li").with_text("one"), VNode::text("two")]);
        let id = doc.render(&tree).unwrap();
        assert_eq!(tree.host_ref(), Some(id));
        assert!(tree.child_nodes().iter().all(|child| child.host_ref().is_some()));
        assert_eq!(
            doc.outer_html(id).unwrap(),
            r#"<ul class="list"><li>one</li>two</ul>"#
        );
        assert!(!doc.is_connected(id));

        assert!(matches!(
            doc.render(&tree),
            Err(ReconcilerError::AlreadyBound { .. })
        ));
    }

    #[test]
    fn clear_keeps_only_the_root() {
        let (mut doc, ..) = list_doc();
        doc.clear();
        assert_eq!(doc.live_nodes(), 1);
        assert!(doc.patches().is_empty());
        assert_eq!(doc.to_html().unwrap(), "");

        let fresh = doc.create_element("p").unwrap();
        assert!(fresh.get() > 6);
    }

    #[test]
    fn storage_stays_bounded_across_repeated_swaps() {
        let mut doc = HostDocument::new();
        let ul = doc.create_element("ul").unwrap();
        doc.append_child(doc.root(), ul).unwrap();

        let mut last_id = ul;
        for round in 0..200 {
            let tag = if round % 2 == 0 { "li" } else { "p" };
            let old_children = doc.children(ul).unwrap().to_vec();
            for child in old_children {
                doc.remove_child(ul, child).unwrap();
            }
            for _ in 0..10 {
                let child = doc.create_element(tag).unwrap();
                assert!(child > last_id);
                last_id = child;
                doc.append_child(ul, child).unwrap();
            }
            doc.take_patches();
            assert_eq!(doc.live_nodes(), 12);
            assert_eq!(doc.nodes.len(), 12);
        }
    }

    #[test]
    fn reset_removes_what_the_consumer_was_last_given() {
        let (mut doc, ul, [a, _, c]) = list_doc();
        doc.take_patches();

        // Undelivered work is discarded together with the tree.
        doc.insert_before(ul, c, Some(a)).unwrap();
        let extra = doc.create_element("p").unwrap();
        doc.append_child(doc.root(), extra).unwrap();
        doc.reset();

        let expected = vec![Patch {
            action: PatchAction::Remove,
            target: ul,
            data: json!({ "parent": doc.root() }),
        }];
        assert_eq!(doc.patches(), &expected[..]);
        assert_eq!(doc.live_nodes(), 1);

        doc.reset();
        assert_eq!(doc.patches(), &expected[..]);

        assert_eq!(doc.take_patches(), expected);
        doc.reset();
        assert!(doc.patches().is_empty());
    }
}
