// (c) Copyright 2025 Mikołaj Kuranowski
// SPDX-License-Identifier: MIT

/// Error conditions which may occur during [PathFinder::find_best_path](super::PathFinder::find_best_path).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PathError {
    /// The start or end node index doesn't exist in the model.
    InvalidNode(usize),

    /// The start or end building doesn't exist in the model.
    InvalidBuilding(i64),

    /// A building is snapped to a way which doesn't exist or has no usable geometry.
    InvalidWay(i64),
}

impl std::fmt::Display for PathError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::InvalidNode(idx) => write!(f, "invalid node: #{}", idx),
            Self::InvalidBuilding(id) => write!(f, "invalid building: {}", id),
            Self::InvalidWay(id) => write!(f, "invalid way: {}", id),
        }
    }
}

impl std::error::Error for PathError {}
