//! Grid configuration: bounds, island spacing and reconciliation limits.
//!
//! Loaded from a JSON file by the binary. A missing or malformed file yields
//! the defaults so a fresh server starts with a usable 21x21 grid.

use std::fs;
use std::path::Path;
use std::time::Duration;

use bevy::prelude::*;
use serde::{Deserialize, Serialize};

use crate::coordinate::GridCoordinate;

pub const DEFAULT_ISLAND_DISTANCE: i32 = 400;
pub const DEFAULT_SPACING_MULTIPLIER: i32 = 2;
pub const DEFAULT_RECONCILE_TIMEOUT_SECS: u64 = 30;
pub const DEFAULT_UNKNOWN_OWNER_NAME: &str = "Unknown";

#[derive(Debug, thiserror::Error)]
pub enum SettingsError {
    #[error("failed to read settings file {path}: {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },
    #[error("failed to parse settings: {0}")]
    Parse(#[from] serde_json::Error),
}

#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum BoundsError {
    #[error("amount must be positive, got {0}")]
    NonPositiveAmount(i32),
    #[error("grid would have no columns or rows left after shrinking {direction} by {amount}")]
    TooSmall { direction: Direction, amount: i32 },
    #[error("cell {0} is occupied inside the area being removed")]
    OccupiedInRemovedArea(GridCoordinate),
    #[error("bounds are inverted: x {min_x}..={max_x}, z {min_z}..={max_z}")]
    Inverted {
        min_x: i32,
        max_x: i32,
        min_z: i32,
        max_z: i32,
    },
}

/// Compass direction for bounds administration. North is -z, east is +x.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Direction {
    North,
    South,
    East,
    West,
}

impl Direction {
    pub fn parse(text: &str) -> Option<Self> {
        match text.trim().to_ascii_lowercase().as_str() {
            "north" | "n" => Some(Direction::North),
            "south" | "s" => Some(Direction::South),
            "east" | "e" => Some(Direction::East),
            "west" | "w" => Some(Direction::West),
            _ => None,
        }
    }
}

impl std::fmt::Display for Direction {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            Direction::North => "north",
            Direction::South => "south",
            Direction::East => "east",
            Direction::West => "west",
        };
        f.write_str(name)
    }
}

/// Inclusive grid bounds on both axes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct GridBounds {
    pub min_x: i32,
    pub max_x: i32,
    pub min_z: i32,
    pub max_z: i32,
}

impl Default for GridBounds {
    fn default() -> Self {
        Self {
            min_x: -10,
            max_x: 10,
            min_z: -10,
            max_z: 10,
        }
    }
}

impl GridBounds {
    pub fn new(min_x: i32, max_x: i32, min_z: i32, max_z: i32) -> Self {
        Self {
            min_x,
            max_x,
            min_z,
            max_z,
        }
    }

    pub fn contains(&self, coord: GridCoordinate) -> bool {
        (self.min_x..=self.max_x).contains(&coord.x) && (self.min_z..=self.max_z).contains(&coord.z)
    }

    pub fn width(&self) -> i64 {
        i64::from(self.max_x) - i64::from(self.min_x) + 1
    }

    pub fn height(&self) -> i64 {
        i64::from(self.max_z) - i64::from(self.min_z) + 1
    }

    pub fn is_empty(&self) -> bool {
        self.width() <= 0 || self.height() <= 0
    }

    pub fn validate(&self) -> Result<(), BoundsError> {
        if self.is_empty() {
            return Err(BoundsError::Inverted {
                min_x: self.min_x,
                max_x: self.max_x,
                min_z: self.min_z,
                max_z: self.max_z,
            });
        }
        Ok(())
    }

    /// Bounds pushed outward on one side.
    pub fn expanded(&self, direction: Direction, amount: i32) -> Self {
        let mut out = *self;
        match direction {
            Direction::North => out.min_z = out.min_z.saturating_sub(amount),
            Direction::South => out.max_z = out.max_z.saturating_add(amount),
            Direction::East => out.max_x = out.max_x.saturating_add(amount),
            Direction::West => out.min_x = out.min_x.saturating_sub(amount),
        }
        out
    }

    /// Bounds pulled inward on one side. May be empty; callers validate.
    pub fn shrunk(&self, direction: Direction, amount: i32) -> Self {
        let mut out = *self;
        match direction {
            Direction::North => out.min_z = out.min_z.saturating_add(amount),
            Direction::South => out.max_z = out.max_z.saturating_sub(amount),
            Direction::East => out.max_x = out.max_x.saturating_sub(amount),
            Direction::West => out.min_x = out.min_x.saturating_add(amount),
        }
        out
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct GridSettings {
    pub bounds: GridBounds,
    /// The world generator's configured island distance.
    pub island_distance: i32,
    /// Factor applied to `island_distance` to get the distance between
    /// adjacent island centers. The generator treats its distance as an
    /// offset from center, hence the default of 2.
    pub spacing_multiplier: i32,
    pub reconcile_timeout_secs: u64,
    pub unknown_owner_name: String,
}

impl Default for GridSettings {
    fn default() -> Self {
        Self {
            bounds: GridBounds::default(),
            island_distance: DEFAULT_ISLAND_DISTANCE,
            spacing_multiplier: DEFAULT_SPACING_MULTIPLIER,
            reconcile_timeout_secs: DEFAULT_RECONCILE_TIMEOUT_SECS,
            unknown_owner_name: DEFAULT_UNKNOWN_OWNER_NAME.to_string(),
        }
    }
}

impl GridSettings {
    pub fn effective_spacing(&self) -> i32 {
        self.island_distance.saturating_mul(self.spacing_multiplier)
    }

    pub fn has_valid_spacing(&self) -> bool {
        self.effective_spacing() > 0
    }

    pub(crate) fn warn_if_invalid_spacing(&self) {
        if !self.has_valid_spacing() {
            warn!(
                "Island spacing {} (distance {} x {}) is not positive; every island maps to the grid origin",
                self.effective_spacing(),
                self.island_distance,
                self.spacing_multiplier
            );
        }
    }

    pub fn grid_width(&self) -> i64 {
        self.bounds.width()
    }

    pub fn grid_height(&self) -> i64 {
        self.bounds.height()
    }

    pub fn reconcile_timeout(&self) -> Duration {
        Duration::from_secs(self.reconcile_timeout_secs)
    }

    pub fn load(path: &Path) -> Result<Self, SettingsError> {
        let text = fs::read_to_string(path).map_err(|source| SettingsError::Io {
            path: path.display().to_string(),
            source,
        })?;
        Ok(serde_json::from_str(&text)?)
    }

    /// Missing file -> defaults. Malformed file -> defaults plus a warning.
    pub fn load_or_default(path: &Path) -> Self {
        if !path.exists() {
            info!(
                "No grid settings at {}, using defaults",
                path.display()
            );
            return Self::default();
        }
        match Self::load(path) {
            Ok(settings) => {
                if let Err(e) = settings.bounds.validate() {
                    warn!("Grid settings at {} rejected: {e}; using defaults", path.display());
                    return Self::default();
                }
                info!(
                    "Loaded grid settings from {} ({}x{} cells, spacing {})",
                    path.display(),
                    settings.grid_width(),
                    settings.grid_height(),
                    settings.effective_spacing()
                );
                settings
            }
            Err(e) => {
                warn!("{e}; using default grid settings");
                Self::default()
            }
        }
    }

    pub fn save(&self, path: &Path) -> Result<(), SettingsError> {
        let text = serde_json::to_string_pretty(self)?;
        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                fs::create_dir_all(parent).map_err(|source| SettingsError::Io {
                    path: parent.display().to_string(),
                    source,
                })?;
            }
        }
        fs::write(path, text).map_err(|source| SettingsError::Io {
            path: path.display().to_string(),
            source,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn test_dir(name: &str) -> std::path::PathBuf {
        let dir = std::env::temp_dir().join(format!("island_grid_settings_test_{name}"));
        let _ = fs::remove_dir_all(&dir);
        fs::create_dir_all(&dir).unwrap();
        dir
    }

    #[test]
    fn test_defaults() {
        let s = GridSettings::default();
        assert_eq!(s.effective_spacing(), 800);
        assert_eq!(s.grid_width(), 21);
        assert_eq!(s.grid_height(), 21);
        assert_eq!(s.reconcile_timeout(), Duration::from_secs(30));
        assert_eq!(s.unknown_owner_name, "Unknown");
    }

    #[test]
    fn test_bounds_contains_is_inclusive() {
        let b = GridBounds::new(-2, 3, 0, 1);
        assert!(b.contains(GridCoordinate::new(-2, 0)));
        assert!(b.contains(GridCoordinate::new(3, 1)));
        assert!(!b.contains(GridCoordinate::new(4, 0)));
        assert!(!b.contains(GridCoordinate::new(0, -1)));
        assert_eq!(b.width(), 6);
        assert_eq!(b.height(), 2);
    }

    #[test]
    fn test_expand_and_shrink_directions() {
        let b = GridBounds::default();
        assert_eq!(b.expanded(Direction::North, 2).min_z, -12);
        assert_eq!(b.expanded(Direction::South, 2).max_z, 12);
        assert_eq!(b.expanded(Direction::East, 2).max_x, 12);
        assert_eq!(b.expanded(Direction::West, 2).min_x, -12);
        assert_eq!(b.shrunk(Direction::North, 2).min_z, -8);
        assert_eq!(b.shrunk(Direction::West, 21).min_x, 11);
        assert!(b.shrunk(Direction::West, 21).is_empty());
    }

    #[test]
    fn test_direction_parse() {
        assert_eq!(Direction::parse("North"), Some(Direction::North));
        assert_eq!(Direction::parse(" e "), Some(Direction::East));
        assert_eq!(Direction::parse("up"), None);
    }

    #[test]
    fn test_missing_file_gives_defaults() {
        let dir = test_dir("missing");
        let s = GridSettings::load_or_default(&dir.join("nope.json"));
        assert_eq!(s, GridSettings::default());
    }

    #[test]
    fn test_malformed_file_gives_defaults() {
        let dir = test_dir("malformed");
        let path = dir.join("grid.json");
        fs::write(&path, "{ not json").unwrap();
        assert_eq!(GridSettings::load_or_default(&path), GridSettings::default());
        assert!(matches!(
            GridSettings::load(&path),
            Err(SettingsError::Parse(_))
        ));
    }

    #[test]
    fn test_save_then_load() {
        let dir = test_dir("save_load");
        let path = dir.join("nested/grid.json");
        let settings = GridSettings {
            bounds: GridBounds::new(0, 4, -1, 1),
            island_distance: 250,
            reconcile_timeout_secs: 5,
            ..GridSettings::default()
        };
        settings.save(&path).unwrap();
        assert_eq!(GridSettings::load_or_default(&path), settings);
        let _ = fs::remove_dir_all(&dir);
    }

    #[test]
    fn test_non_positive_spacing_is_kept_but_flagged() {
        assert!(GridSettings::default().has_valid_spacing());
        for (distance, multiplier) in [(0, 2), (400, 0), (-400, 2)] {
            let s = GridSettings {
                island_distance: distance,
                spacing_multiplier: multiplier,
                ..GridSettings::default()
            };
            assert!(!s.has_valid_spacing(), "{distance} x {multiplier}");
        }

        let dir = test_dir("zero_spacing");
        let path = dir.join("grid.json");
        fs::write(&path, r#"{ "island_distance": 0 }"#).unwrap();
        let s = GridSettings::load_or_default(&path);
        assert_eq!(s.island_distance, 0);
        assert!(!s.has_valid_spacing());
    }

    #[test]
    fn test_partial_file_fills_defaults() {
        let dir = test_dir("partial");
        let path = dir.join("grid.json");
        fs::write(&path, r#"{ "island_distance": 100 }"#).unwrap();
        let s = GridSettings::load_or_default(&path);
        assert_eq!(s.island_distance, 100);
        assert_eq!(s.spacing_multiplier, 2);
        assert_eq!(s.bounds, GridBounds::default());
    }
}
