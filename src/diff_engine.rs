//! Core diffing engine: identity dispatch, in-place node patching and the
//! two-ended keyed list scan with a key-map fallback.
use crate::errors::ReconcilerError;
use crate::host::Host;
use crate::types::{
    Anomaly, DuplicateKeyPolicy, HostId, ListSide, ReconcileOptions, ReconciliationResult,
};
use crate::vnode::{Children, VNode, same_identity};
use log::{debug, trace, warn};
use std::collections::HashMap;
use std::collections::hash_map::Entry;
use std::rc::Rc;

/// One reconciliation pass over a host.
///
/// The old tree must be bound to the host (it is the result of an earlier
/// render or pass); the new tree must be unbound. Surviving and created nodes
/// of the new tree come out bound, ready to serve as the next old tree.
pub struct DiffEngine<'a, H: Host + ?Sized> {
    host: &'a mut H,
    options: &'a ReconcileOptions,
    result: ReconciliationResult,
}

impl<'a, H: Host + ?Sized> DiffEngine<'a, H> {
    pub fn new(host: &'a mut H, options: &'a ReconcileOptions) -> Self {
        DiffEngine {
            host,
            options,
            result: ReconciliationResult::default(),
        }
    }

    /// Reconciles the single slot of `parent` that `old` occupies.
    pub fn patch(
        &mut self,
        old: Option<&VNode>,
        new: Option<&VNode>,
        parent: HostId,
    ) -> Result<(), ReconcilerError> {
        match (old, new) {
            (None, None) => {}
            (None, Some(new)) => {
                let id = self.render(new)?;
                self.host.append_child(parent, id)?;
            }
            (Some(old), None) => self.remove(old, parent)?,
            (Some(old), Some(new)) if same_identity(old, new) => self.patch_node(old, new)?,
            (Some(old), Some(new)) => {
                trace!("DiffEngine: replacing <{}> with <{}>", old.describe(), new.describe());
                let id = self.render(new)?;
                self.host.replace_child(parent, id, old.host()?)?;
                self.result.stats.replacements += 1;
            }
        }
        Ok(())
    }

    pub fn finish(self) -> ReconciliationResult {
        debug!(
            "DiffEngine: pass complete {:?}, {} anomalies",
            self.result.stats,
            self.result.anomalies.len()
        );
        self.result
    }

    // Callers guarantee `same_identity(old, new)`.
    fn patch_node(&mut self, old: &VNode, new: &VNode) -> Result<(), ReconcilerError> {
        if std::ptr::eq(old, new) {
            return Ok(());
        }
        let el = old.host()?;
        self.result.stats.patched += 1;

        if old.is_text() {
            if old.text_content() != new.text_content() {
                self.host.set_text_content(el, new.text_content().unwrap_or_default())?;
                self.result.stats.text_writes += 1;
            }
        } else {
            if let (Some(old_children), Some(new_children)) = (old.children(), new.children()) {
                self.patch_children(old_children, new_children, el)?;
            }
            self.update_props(old, new, el)?;
        }

        new.bind(el)
    }

    fn patch_children(
        &mut self,
        old: &Children,
        new: &Children,
        el: HostId,
    ) -> Result<(), ReconcilerError> {
        match (old, new) {
            (Children::Nodes(old_nodes), Children::Nodes(new_nodes)) => {
                if !Rc::ptr_eq(old_nodes, new_nodes) {
                    self.reconcile_children(old_nodes, new_nodes, el)?;
                }
            }
            (Children::Text(old_text), Children::Text(new_text)) => {
                if old_text != new_text {
                    self.host.set_text_content(el, new_text)?;
                    self.result.stats.text_writes += 1;
                }
            }
            (Children::Empty, Children::Empty) => {}
            _ if !self.options.clear_stale_children => {
                debug!(
                    "DiffEngine: leaving {} children of {el} in place (new content is {})",
                    old.shape(),
                    new.shape()
                );
            }
            _ => {
                match old {
                    Children::Nodes(old_nodes) => {
                        for child in old_nodes.iter() {
                            self.remove(child, el)?;
                        }
                    }
                    Children::Text(_) => {
                        self.host.set_text_content(el, "")?;
                        self.result.stats.text_writes += 1;
                    }
                    Children::Empty => {}
                }
                match new {
                    Children::Nodes(new_nodes) => {
                        for child in new_nodes.iter() {
                            let id = self.render(child)?;
                            self.host.append_child(el, id)?;
                        }
                    }
                    Children::Text(new_text) => {
                        self.host.set_text_content(el, new_text)?;
                        self.result.stats.text_writes += 1;
                    }
                    Children::Empty => {}
                }
            }
        }
        Ok(())
    }

    fn update_props(&mut self, old: &VNode, new: &VNode, el: HostId) -> Result<(), ReconcilerError> {
        for name in old.props().into_iter().flat_map(|props| props.keys()) {
            if new.prop(name).is_none() {
                self.host.remove_attribute(el, name)?;
                self.result.stats.attribute_removals += 1;
            }
        }
        for (name, value) in new.props().into_iter().flatten() {
            if old.prop(name) != Some(value.as_str()) {
                self.host.set_attribute(el, name, value)?;
                self.result.stats.attribute_writes += 1;
            }
        }
        Ok(())
    }

    /// Diffs two sibling lists under `parent`.
    ///
    /// Ends are compared first (start/start, end/end, start/end, end/start);
    /// only when none of them match is a key map of the remaining old range
    /// built, once per call. `old_end` and `new_end` are exclusive.
    fn reconcile_children(
        &mut self,
        old: &[VNode],
        new: &[VNode],
        parent: HostId,
    ) -> Result<(), ReconcilerError> {
        let mut consumed = vec![false; old.len()];
        let mut key_map: Option<HashMap<&str, usize>> = None;
        let (mut old_start, mut old_end) = (0, old.len());
        let (mut new_start, mut new_end) = (0, new.len());

        while old_start < old_end && new_start < new_end {
            if consumed[old_start] {
                old_start += 1;
                continue;
            }
            if consumed[old_end - 1] {
                old_end -= 1;
                continue;
            }

            let old_first = &old[old_start];
            let old_last = &old[old_end - 1];
            let new_first = &new[new_start];
            let new_last = &new[new_end - 1];

            if same_identity(old_first, new_first) {
                trace!("DiffEngine: start/start <{}>", new_first.describe());
                self.patch_node(old_first, new_first)?;
                consumed[old_start] = true;
                old_start += 1;
                new_start += 1;
            } else if same_identity(old_last, new_last) {
                trace!("DiffEngine: end/end <{}>", new_last.describe());
                self.patch_node(old_last, new_last)?;
                consumed[old_end - 1] = true;
                old_end -= 1;
                new_end -= 1;
            } else if same_identity(old_first, new_last) {
                trace!("DiffEngine: <{}> moves to the back", new_last.describe());
                self.patch_node(old_first, new_last)?;
                let after = self.host.next_sibling(old_last.host()?)?;
                self.host.insert_before(parent, old_first.host()?, after)?;
                self.result.stats.moves += 1;
                consumed[old_start] = true;
                old_start += 1;
                new_end -= 1;
            } else if same_identity(old_last, new_first) {
                trace!("DiffEngine: <{}> moves to the front", new_first.describe());
                self.patch_node(old_last, new_first)?;
                self.host
                    .insert_before(parent, old_last.host()?, Some(old_first.host()?))?;
                self.result.stats.moves += 1;
                consumed[old_end - 1] = true;
                old_end -= 1;
                new_start += 1;
            } else {
                if key_map.is_none() {
                    key_map = Some(self.build_key_map(old, old_start..old_end, &consumed)?);
                }
                let anchor = old_first.host()?;
                let found = match (&key_map, new_first.key()) {
                    (Some(map), Some(key)) => map.get(key).copied(),
                    _ => None,
                };

                match found {
                    Some(index) if consumed[index] => {
                        if !new_first.has_default_key() && !old[index].has_default_key() {
                            let key = new_first.key().unwrap_or_default();
                            self.report_duplicate(key, ListSide::New)?;
                        }
                        self.insert_fresh(new_first, parent, Some(anchor))?;
                    }
                    Some(index) if same_identity(&old[index], new_first) => {
                        trace!("DiffEngine: <{}> found by key at {index}", new_first.describe());
                        let to_move = &old[index];
                        self.patch_node(to_move, new_first)?;
                        consumed[index] = true;
                        self.host.insert_before(parent, to_move.host()?, Some(anchor))?;
                        self.result.stats.moves += 1;
                    }
                    _ => self.insert_fresh(new_first, parent, Some(anchor))?,
                }
                new_start += 1;
            }
        }

        if old_start >= old_end {
            // Nodes after the batch are already reconciled and in place.
            let before = match new.get(new_end) {
                Some(next) => Some(next.host()?),
                None => None,
            };
            for node in &new[new_start..new_end] {
                self.insert_fresh(node, parent, before)?;
            }
        } else if new_start >= new_end {
            for (node, _) in old[old_start..old_end]
                .iter()
                .zip(&consumed[old_start..old_end])
                .filter(|(_, done)| !**done)
            {
                self.remove(node, parent)?;
            }
        }
        Ok(())
    }

    /// Maps keys of the unconsumed old range to their index. Only a key given
    /// twice by the caller is a duplicate; text leaves keyed by their own text
    /// may repeat, and a caller's key takes the slot over such a leaf.
    fn build_key_map<'n>(
        &mut self,
        old: &'n [VNode],
        range: std::ops::Range<usize>,
        consumed: &[bool],
    ) -> Result<HashMap<&'n str, usize>, ReconcilerError> {
        let mut map = HashMap::with_capacity(range.len());
        for index in range {
            if consumed[index] {
                continue;
            }
            let node = &old[index];
            let Some(key) = node.key() else {
                continue;
            };
            match map.entry(key) {
                Entry::Vacant(slot) => {
                    slot.insert(index);
                }
                Entry::Occupied(mut slot) => {
                    if node.has_default_key() {
                        continue;
                    }
                    if old[*slot.get()].has_default_key() {
                        slot.insert(index);
                    } else {
                        self.report_duplicate(key, ListSide::Old)?;
                    }
                }
            }
        }
        trace!("DiffEngine: key map built over {} old nodes", map.len());
        Ok(map)
    }

    fn report_duplicate(&mut self, key: &str, list: ListSide) -> Result<(), ReconcilerError> {
        if self.options.duplicate_keys == DuplicateKeyPolicy::Reject {
            return Err(ReconcilerError::DuplicateKey {
                key: key.to_string(),
                list,
            });
        }
        warn!("DiffEngine: duplicate key '{key}' in the {list} sibling list; treating it as a new node");
        self.result.anomalies.push(Anomaly::DuplicateKey {
            key: key.to_string(),
            list,
        });
        Ok(())
    }

    fn render(&mut self, node: &VNode) -> Result<HostId, ReconcilerError> {
        let id = self.host.render(node)?;
        self.result.stats.renders += 1;
        Ok(id)
    }

    fn insert_fresh(
        &mut self,
        node: &VNode,
        parent: HostId,
        before: Option<HostId>,
    ) -> Result<(), ReconcilerError> {
        let id = self.render(node)?;
        self.host.insert_before(parent, id, before)
    }

    fn remove(&mut self, node: &VNode, parent: HostId) -> Result<(), ReconcilerError> {
        self.host.remove_child(parent, node.host()?)?;
        self.result.stats.removals += 1;
        Ok(())
    }
}
