//! Block positions, build volumes and their relative size.

use serde::{Deserialize, Serialize};

use crate::error::BoundsError;

/// An integer block position in world (absolute) or plan (relative) space.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct BlockPos {
    pub x: i64,
    pub y: i64,
    pub z: i64,
}

impl BlockPos {
    pub const fn new(x: i64, y: i64, z: i64) -> Self {
        Self { x, y, z }
    }

    /// Component-wise sum.
    pub fn offset(self, other: BlockPos) -> BlockPos {
        BlockPos::new(self.x + other.x, self.y + other.y, self.z + other.z)
    }

    /// The block containing a floating point position (floors each axis).
    pub fn containing(pos: [f64; 3]) -> BlockPos {
        BlockPos::new(
            pos[0].floor() as i64,
            pos[1].floor() as i64,
            pos[2].floor() as i64,
        )
    }
}

impl From<[i64; 3]> for BlockPos {
    fn from(v: [i64; 3]) -> Self {
        BlockPos::new(v[0], v[1], v[2])
    }
}

impl std::fmt::Display for BlockPos {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "({},{},{})", self.x, self.y, self.z)
    }
}

impl std::str::FromStr for BlockPos {
    type Err = String;

    /// Parses `x,y,z`.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let parts: Vec<&str> = s.split(',').map(str::trim).collect();
        let [x, y, z] = parts.as_slice() else {
            return Err(format!("expected x,y,z, got {s:?}"));
        };
        let parse = |v: &str| {
            v.parse::<i64>()
                .map_err(|e| format!("invalid coordinate {v:?}: {e}"))
        };
        Ok(BlockPos::new(parse(x)?, parse(y)?, parse(z)?))
    }
}

/// Inclusive extent of a build volume, per axis.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Size {
    pub width: i64,
    pub height: i64,
    pub length: i64,
}

impl Size {
    /// Whether a relative position lies in `[0, size)` on every axis.
    pub fn contains(&self, pos: BlockPos) -> bool {
        (0..self.width).contains(&pos.x)
            && (0..self.height).contains(&pos.y)
            && (0..self.length).contains(&pos.z)
    }

    /// Number of cells, saturating at `i64::MAX`.
    pub fn volume(&self) -> i64 {
        self.width
            .saturating_mul(self.height)
            .saturating_mul(self.length)
    }
}

/// An axis-aligned build volume. Always normalized: `min <= max` per axis,
/// and `max - min + 1` fits in an `i64` on every axis.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Bounds {
    min: BlockPos,
    max: BlockPos,
}

impl Bounds {
    /// Build from two opposite corners given in any order.
    ///
    /// Fails when the inclusive span of an axis overflows `i64`.
    pub fn from_corners(a: BlockPos, b: BlockPos) -> Result<Self, BoundsError> {
        let bounds = Self {
            min: BlockPos::new(a.x.min(b.x), a.y.min(b.y), a.z.min(b.z)),
            max: BlockPos::new(a.x.max(b.x), a.y.max(b.y), a.z.max(b.z)),
        };
        for (axis, min, max) in [
            ('x', bounds.min.x, bounds.max.x),
            ('y', bounds.min.y, bounds.max.y),
            ('z', bounds.min.z, bounds.max.z),
        ] {
            span(min, max).ok_or(BoundsError::SpanOverflow { axis, min, max })?;
        }
        Ok(bounds)
    }

    pub fn min(&self) -> BlockPos {
        self.min
    }

    pub fn max(&self) -> BlockPos {
        self.max
    }

    /// `max - min + 1` on every axis.
    pub fn size(&self) -> Size {
        let axis = |min, max| span(min, max).unwrap_or(i64::MAX);
        Size {
            width: axis(self.min.x, self.max.x),
            height: axis(self.min.y, self.max.y),
            length: axis(self.min.z, self.max.z),
        }
    }

    /// Translate a plan-relative position into world space.
    pub fn to_absolute(&self, relative: BlockPos) -> BlockPos {
        self.min.offset(relative)
    }
}

/// Inclusive cell count between `min` and `max`, if it fits.
fn span(min: i64, max: i64) -> Option<i64> {
    max.checked_sub(min)?.checked_add(1)
}
