//! Read-only view of the external world subsystem that actually generates
//! islands. The registry never mutates it.

use uuid::Uuid;

use crate::coordinate::GridCoordinate;
use crate::transform::CoordinateTransform;

#[derive(Debug, thiserror::Error)]
pub enum SourceError {
    #[error("world {0} is not loaded")]
    WorldNotLoaded(String),
    #[error("island source unavailable: {0}")]
    Unavailable(String),
}

/// Opaque handle naming the world islands live in.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct WorldHandle(pub String);

impl WorldHandle {
    pub fn new(name: impl Into<String>) -> Self {
        Self(name.into())
    }

    pub fn name(&self) -> &str {
        &self.0
    }
}

#[derive(Debug, Clone, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub struct IslandInfo {
    pub id: String,
    #[serde(default)]
    pub owner: Option<Uuid>,
    pub center_x: i32,
    pub center_z: i32,
}

pub trait IslandSource: Send + Sync {
    /// `None` when the world subsystem is not (yet) available.
    fn primary_world(&self) -> Option<WorldHandle>;

    fn list_islands(&self, world: &WorldHandle) -> Result<Vec<IslandInfo>, SourceError>;

    fn island_for_owner(&self, world: &WorldHandle, owner: Uuid) -> Option<IslandInfo>;

    /// The island whose center maps exactly to `coord`, if any.
    fn island_centered_in(
        &self,
        world: &WorldHandle,
        coord: GridCoordinate,
        transform: &CoordinateTransform,
    ) -> Option<IslandInfo> {
        self.list_islands(world)
            .ok()?
            .into_iter()
            .find(|island| transform.world_to_grid(island.center_x, island.center_z) == coord)
    }

    fn owner_display_name(&self, owner: Uuid) -> Option<String>;
}

/// Fixed island list, used by tests and by the binary's snapshot loader.
#[derive(Debug, Clone, Default)]
pub struct StaticIslandSource {
    pub world: Option<WorldHandle>,
    pub islands: Vec<IslandInfo>,
    pub names: std::collections::HashMap<Uuid, String>,
}

impl StaticIslandSource {
    pub fn new(world: impl Into<String>) -> Self {
        Self {
            world: Some(WorldHandle::new(world)),
            ..Self::default()
        }
    }

    /// A source whose world never loads.
    pub fn unavailable() -> Self {
        Self::default()
    }

    pub fn with_island(mut self, island: IslandInfo) -> Self {
        self.islands.push(island);
        self
    }

    pub fn with_owner_name(mut self, owner: Uuid, name: impl Into<String>) -> Self {
        self.names.insert(owner, name.into());
        self
    }
}

impl IslandSource for StaticIslandSource {
    fn primary_world(&self) -> Option<WorldHandle> {
        self.world.clone()
    }

    fn list_islands(&self, world: &WorldHandle) -> Result<Vec<IslandInfo>, SourceError> {
        match &self.world {
            Some(w) if w == world => Ok(self.islands.clone()),
            _ => Err(SourceError::WorldNotLoaded(world.name().to_string())),
        }
    }

    fn island_for_owner(&self, world: &WorldHandle, owner: Uuid) -> Option<IslandInfo> {
        self.list_islands(world)
            .ok()?
            .into_iter()
            .find(|island| island.owner == Some(owner))
    }

    fn owner_display_name(&self, owner: Uuid) -> Option<String> {
        self.names.get(&owner).cloned()
    }
}
