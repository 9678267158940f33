// (c) Copyright 2025 Mikołaj Kuranowski
// SPDX-License-Identifier: MIT

use std::io;

/// Error conditions which abort building a model from OSM data.
///
/// Per-entity anomalies (unclosed building polygons, buildings outside of any ring,
/// buildings far from streets) are not errors; such entities are logged and skipped.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error(transparent)]
    Io(#[from] io::Error),

    #[error("xml: {0}")]
    Xml(#[from] quick_xml::Error),

    /// The document has an element which can't be interpreted.
    #[error("invalid <{element}>: {reason}")]
    Parse {
        element: &'static str,
        reason: String,
    },

    /// A way references a node which is not present in the document.
    #[error("way {way} references unknown node {node}")]
    UnknownNode { way: i64, node: i64 },

    /// A line of the adjustments file can't be understood.
    #[error("adjustments, line {line}: {reason}")]
    Adjustment { line: usize, reason: String },

    /// A `remap` directive references a ring which does not exist.
    #[error("adjustments, line {line}: can't remap ring {src} onto ring {dest} (there are {rings} rings)")]
    InvalidRemap {
        line: usize,
        src: i64,
        dest: i64,
        rings: usize,
    },

    #[error(transparent)]
    Model(#[from] crate::model::Error),
}

impl From<quick_xml::events::attributes::AttrError> for Error {
    fn from(e: quick_xml::events::attributes::AttrError) -> Self {
        Self::Xml(e.into())
    }
}
