//! JSON island snapshot exported by the world subsystem.
//!
//! ```json
//! {
//!   "world": "skyblock_world",
//!   "islands": [{ "id": "isl-1", "owner": "<uuid>", "center_x": 800, "center_z": 0 }],
//!   "names": { "<uuid>": "alice" }
//! }
//! ```
//!
//! A `null` world means the world has not been generated yet.

use std::collections::HashMap;
use std::path::{Path, PathBuf};

use bevy::prelude::*;
use grid::{IslandInfo, StaticIslandSource, WorldHandle};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

#[derive(Debug, thiserror::Error)]
pub enum SnapshotError {
    #[error("failed to read island snapshot {path}: {source}")]
    Io {
        path: PathBuf,
        source: std::io::Error,
    },
    #[error("malformed island snapshot: {0}")]
    Parse(#[from] serde_json::Error),
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct IslandSnapshot {
    #[serde(default)]
    pub world: Option<String>,
    #[serde(default)]
    pub islands: Vec<IslandInfo>,
    #[serde(default)]
    pub names: HashMap<Uuid, String>,
}

impl IslandSnapshot {
    pub fn parse(text: &str) -> Result<Self, SnapshotError> {
        Ok(serde_json::from_str(text)?)
    }

    /// A missing file is a world that is not loaded yet.
    pub fn load(path: &Path) -> Result<Self, SnapshotError> {
        match std::fs::read_to_string(path) {
            Ok(text) => Self::parse(&text),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                warn!("No island snapshot at {}, world unavailable", path.display());
                Ok(Self::default())
            }
            Err(source) => Err(SnapshotError::Io {
                path: path.to_path_buf(),
                source,
            }),
        }
    }

    pub fn into_source(self) -> StaticIslandSource {
        StaticIslandSource {
            world: self.world.map(WorldHandle::new),
            islands: self.islands,
            names: self.names,
        }
    }
}
