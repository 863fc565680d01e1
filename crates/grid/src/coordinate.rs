//! Grid-space coordinates.
//!
//! A `GridCoordinate` is the registry's primary key. Its canonical text form
//! is `"<x>,<z>"`, which is also the key persisted records are stored under.

use std::fmt;

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct GridCoordinate {
    pub x: i32,
    pub z: i32,
}

impl GridCoordinate {
    pub const ORIGIN: GridCoordinate = GridCoordinate { x: 0, z: 0 };

    pub const fn new(x: i32, z: i32) -> Self {
        Self { x, z }
    }

    /// Parse `"<int>,<int>"`, allowing whitespace around either integer.
    ///
    /// Returns `None` for anything else: empty input, a missing or extra
    /// component, non-integer components, or a separator other than a single
    /// comma. Callers treat "not a coordinate" as an ordinary branch.
    pub fn parse(text: &str) -> Option<Self> {
        let mut parts = text.split(',');
        let x = parts.next()?.trim().parse::<i32>().ok()?;
        let z = parts.next()?.trim().parse::<i32>().ok()?;
        if parts.next().is_some() {
            return None;
        }
        Some(Self { x, z })
    }

    /// A new coordinate shifted by `(dx, dz)`. Saturates at the `i32` limits.
    pub fn offset(self, dx: i32, dz: i32) -> Self {
        Self {
            x: self.x.saturating_add(dx),
            z: self.z.saturating_add(dz),
        }
    }

    /// Euclidean distance in cells.
    pub fn distance_to(self, other: GridCoordinate) -> f64 {
        let dx = f64::from(self.x) - f64::from(other.x);
        let dz = f64::from(self.z) - f64::from(other.z);
        (dx * dx + dz * dz).sqrt()
    }

    /// `|dx| + |dz|`, widened so opposite corners of the `i32` range don't overflow.
    pub fn manhattan_distance_to(self, other: GridCoordinate) -> u64 {
        let dx = (i64::from(self.x) - i64::from(other.x)).unsigned_abs();
        let dz = (i64::from(self.z) - i64::from(other.z)).unsigned_abs();
        dx + dz
    }

    /// Canonical key used by the persistence layer.
    pub fn key(self) -> String {
        self.to_string()
    }
}

impl fmt::Display for GridCoordinate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{},{}", self.x, self.z)
    }
}

impl From<(i32, i32)> for GridCoordinate {
    fn from((x, z): (i32, i32)) -> Self {
        Self { x, z }
    }
}
