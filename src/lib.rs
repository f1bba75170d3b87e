//! Keyed reconciliation of virtual trees onto a live host tree.
//!
//! An old [`VNode`] tree, bound to the host by an earlier pass, is compared
//! with a freshly built new tree. Nodes with the same tag and key are patched
//! in place, reordered siblings are moved rather than rebuilt, and only what
//! changed is written to the [`Host`].
//!
//! ```
//! use vdom_reconciler::{HostDocument, ReconcileOptions, VNode, reconcile};
//!
//! let mut doc = HostDocument::new();
//! let root = doc.root();
//! let options = ReconcileOptions::default();
//!
//! let v1 = VNode::element("ul").with_children(["a", "b"].map(|k| VNode::element("li").with_key(k).with_text(k)));
//! reconcile(&mut doc, None, Some(&v1), root, &options).unwrap();
//!
//! let v2 = VNode::element("ul").with_children(["b", "a"].map(|k| VNode::element("li").with_key(k).with_text(k)));
//! let result = reconcile(&mut doc, Some(&v1), Some(&v2), root, &options).unwrap();
//!
//! assert_eq!(result.stats.moves, 1);
//! assert_eq!(doc.to_html().unwrap(), "<ul><li>b</li><li>a</li></ul>");
//! ```
pub mod converters;
pub mod diff_engine;
pub mod errors;
pub mod host;
pub mod html_generator;
pub mod types;
pub mod vnode;

#[cfg(feature = "python")]
mod python;

pub use converters::{vnode_from_json, vnode_from_json_str};
pub use diff_engine::DiffEngine;
pub use errors::ReconcilerError;
pub use host::{Host, HostDocument};
pub use types::{
    Anomaly, DuplicateKeyPolicy, HostId, ListSide, Patch, PatchAction, ReconcileOptions,
    ReconcileStats, ReconciliationResult,
};
pub use vnode::{Children, NodeKind, Props, VNode, h, same_identity};

/// Runs one reconciliation pass over the slot of `parent` held by `old`.
///
/// `old` must be the tree bound by the previous pass (or `None` for the first
/// render); `new` must be a fresh, unbound tree. On success `new` is bound and
/// becomes the next `old`. On error, mutations applied so far stay applied.
pub fn reconcile<H: Host + ?Sized>(
    host: &mut H,
    old: Option<&VNode>,
    new: Option<&VNode>,
    parent: HostId,
    options: &ReconcileOptions,
) -> Result<ReconciliationResult, ReconcilerError> {
    let mut engine = DiffEngine::new(host, options);
    engine.patch(old, new, parent)?;
    Ok(engine.finish())
}
