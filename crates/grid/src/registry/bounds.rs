//! Admin bounds changes. Cells are never dropped when bounds move; cells
//! outside the new bounds simply report `Locked` until the bounds cover
//! them again.

use bevy::prelude::*;

use crate::coordinate::GridCoordinate;
use crate::settings::{BoundsError, Direction, GridBounds};

use super::GridRegistry;

impl GridRegistry {
    pub fn bounds(&self) -> GridBounds {
        self.settings.bounds
    }

    pub fn set_bounds(&mut self, bounds: GridBounds) -> Result<(), BoundsError> {
        bounds.validate()?;
        info!(
            "Grid bounds set to x {}..={}, z {}..={}",
            bounds.min_x, bounds.max_x, bounds.min_z, bounds.max_z
        );
        self.settings.bounds = bounds;
        Ok(())
    }

    pub fn expand(&mut self, direction: Direction, amount: i32) -> Result<GridBounds, BoundsError> {
        if amount <= 0 {
            return Err(BoundsError::NonPositiveAmount(amount));
        }
        let bounds = self.settings.bounds.expanded(direction, amount);
        self.set_bounds(bounds)?;
        Ok(bounds)
    }

    /// Refuses when the grid would vanish or an occupied cell sits in the
    /// strip being removed.
    pub fn shrink(&mut self, direction: Direction, amount: i32) -> Result<GridBounds, BoundsError> {
        if amount <= 0 {
            return Err(BoundsError::NonPositiveAmount(amount));
        }
        let current = self.settings.bounds;
        let bounds = current.shrunk(direction, amount);
        if bounds.is_empty() {
            return Err(BoundsError::TooSmall { direction, amount });
        }

        let mut removed: Vec<GridCoordinate> = self
            .cells
            .values()
            .filter(|cell| cell.is_occupied())
            .map(|cell| cell.coordinate())
            .filter(|coord| current.contains(*coord) && !bounds.contains(*coord))
            .collect();
        removed.sort();
        if let Some(coord) = removed.first() {
            warn!("Refusing to shrink grid {direction} by {amount}: {coord} is occupied");
            return Err(BoundsError::OccupiedInRemovedArea(*coord));
        }

        self.set_bounds(bounds)?;
        Ok(bounds)
    }
}
