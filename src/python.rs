//! Python module entry point: a stateful reconciler over an in-memory host
//! document that hands back the patches each update produced.
use crate::converters::{json_to_pyobject, python_to_json, vnode_from_json};
use crate::errors::ReconcilerError;
use crate::host::HostDocument;
use crate::types::{Anomaly, Patch, PatchAction, ReconcileOptions, ReconcileStats};
use crate::vnode::VNode;
use log::{info, warn};
use pyo3::prelude::*;
use serde::Serialize;

#[derive(Serialize)]
struct ReconcileOutput<'a> {
    patches: &'a [Patch],
    stats: ReconcileStats,
    anomalies: &'a [Anomaly],
}

/// Keeps the last reconciled tree so every call only ships the differences.
#[pyclass(unsendable)]
pub struct Reconciler {
    document: HostDocument,
    current: Option<VNode>,
    options: ReconcileOptions,
}

#[pymethods]
impl Reconciler {
    #[new]
    #[pyo3(signature = (options=None))]
    fn new(py: Python<'_>, options: Option<Bound<'_, PyAny>>) -> PyResult<Self> {
        let options = match options {
            Some(obj) => serde_json::from_value(python_to_json(py, &obj)?).map_err(ReconcilerError::from)?,
            None => ReconcileOptions::default(),
        };
        info!("Reconciler initialized with {options:?}");
        Ok(Reconciler {
            document: HostDocument::new(),
            current: None,
            options,
        })
    }

    fn clear(&mut self) {
        self.document.clear();
        self.current = None;
    }

    /// Reconciles the root container against `tree` (or empties it for `None`).
    ///
    /// If the pass fails, the document is reset: the partial work is dropped
    /// and the next successful call first removes the root children returned
    /// by the last successful call, then renders from scratch.
    #[pyo3(signature = (tree))]
    fn reconcile<'py>(
        &mut self,
        py: Python<'py>,
        tree: Option<Bound<'py, PyAny>>,
    ) -> PyResult<Bound<'py, PyAny>> {
        let new_tree = match tree {
            Some(obj) => Some(vnode_from_json(&python_to_json(py, &obj)?)?),
            None => None,
        };
        let root = self.document.root();
        let outcome = crate::reconcile(
            &mut self.document,
            self.current.as_ref(),
            new_tree.as_ref(),
            root,
            &self.options,
        );
        let result = match outcome {
            Ok(result) => result,
            Err(err) => {
                warn!("Reconciler: pass failed, resetting document: {err}");
                self.document.reset();
                self.current = None;
                return Err(err.into());
            }
        };

        let patches = self.document.take_patches();
        self.current = new_tree;
        let output = serde_json::to_value(ReconcileOutput {
            patches: &patches,
            stats: result.stats,
            anomalies: &result.anomalies,
        })
        .map_err(ReconcilerError::from)?;
        json_to_pyobject(py, &output)
    }

    fn html(&self) -> PyResult<String> {
        Ok(self.document.to_html()?)
    }
}

#[pymodule]
fn vdom_reconciler(_py: Python, m: &Bound<'_, PyModule>) -> PyResult<()> {
    m.add_class::<Reconciler>()?;

    // Export patch actions as constants
    for action in PatchAction::ALL {
        m.add(action.as_str(), action.as_str())?;
    }

    Ok(())
}
