//! Placement operations and the ordered plan that carries them.

use serde::{Deserialize, Serialize};

use crate::geometry::BlockPos;

/// One material placement at plan-relative coordinates.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Operation {
    pub x: i64,
    pub y: i64,
    pub z: i64,
    pub material: String,
}

impl Operation {
    pub fn new(x: i64, y: i64, z: i64, material: impl Into<String>) -> Self {
        Self {
            x,
            y,
            z,
            material: material.into(),
        }
    }

    pub fn position(&self) -> BlockPos {
        BlockPos::new(self.x, self.y, self.z)
    }
}

/// An ordered sequence of operations; order is execution order.
///
/// Serializes as `{"operations": [...]}`, the shape the planning
/// service is asked to return.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Plan {
    pub operations: Vec<Operation>,
}

impl Plan {
    pub fn new(operations: Vec<Operation>) -> Self {
        Self { operations }
    }

    pub fn len(&self) -> usize {
        self.operations.len()
    }

    pub fn is_empty(&self) -> bool {
        self.operations.is_empty()
    }

    pub fn iter(&self) -> std::slice::Iter<'_, Operation> {
        self.operations.iter()
    }
}

impl From<Vec<Operation>> for Plan {
    fn from(operations: Vec<Operation>) -> Self {
        Self { operations }
    }
}

impl<'a> IntoIterator for &'a Plan {
    type Item = &'a Operation;
    type IntoIter = std::slice::Iter<'a, Operation>;

    fn into_iter(self) -> Self::IntoIter {
        self.operations.iter()
    }
}
