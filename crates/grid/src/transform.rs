//! Mapping between world positions and grid coordinates.
//!
//! Grid (0,0) is centered on world (0,0). World positions use floored
//! division so that every cell covers exactly `spacing` blocks on each axis,
//! including cells on the negative side of the origin.

use crate::coordinate::GridCoordinate;
use crate::settings::GridSettings;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CoordinateTransform {
    spacing: i32,
}

impl CoordinateTransform {
    pub fn new(spacing: i32) -> Self {
        Self { spacing }
    }

    pub fn from_settings(settings: &GridSettings) -> Self {
        Self::new(settings.effective_spacing())
    }

    pub fn spacing(&self) -> i32 {
        self.spacing
    }

    pub fn is_valid(&self) -> bool {
        self.spacing > 0
    }

    /// Many-to-one: every position inside a cell maps to that cell.
    /// A non-positive spacing maps everything to the origin;
    /// `GridRegistry::new` warns about it once.
    pub fn world_to_grid(&self, world_x: i32, world_z: i32) -> GridCoordinate {
        if !self.is_valid() {
            return GridCoordinate::ORIGIN;
        }
        // div_euclid floors for a positive divisor
        GridCoordinate::new(
            world_x.div_euclid(self.spacing),
            world_z.div_euclid(self.spacing),
        )
    }

    pub fn grid_to_world(&self, coord: GridCoordinate) -> (i32, i32) {
        (
            coord.x.saturating_mul(self.spacing),
            coord.z.saturating_mul(self.spacing),
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::{Rng, SeedableRng};
    use rand_chacha::ChaCha8Rng;

    #[test]
    fn test_floor_division_on_negative_side() {
        let t = CoordinateTransform::new(500);
        assert_eq!(t.world_to_grid(0, 0), GridCoordinate::new(0, 0));
        assert_eq!(t.world_to_grid(499, 499), GridCoordinate::new(0, 0));
        assert_eq!(t.world_to_grid(500, 999), GridCoordinate::new(1, 1));
        assert_eq!(t.world_to_grid(-1, -1), GridCoordinate::new(-1, -1));
        assert_eq!(t.world_to_grid(-500, -501), GridCoordinate::new(-1, -2));
    }

    #[test]
    fn test_negative_roundtrip_at_cell_boundary() {
        let t = CoordinateTransform::new(500);
        let coord = GridCoordinate::new(-2, -3);
        let world = t.grid_to_world(coord);
        assert_eq!(world, (-1000, -1500));
        assert_eq!(t.world_to_grid(world.0, world.1), coord);
    }

    #[test]
    fn test_roundtrip_random_in_range() {
        let mut rng = ChaCha8Rng::seed_from_u64(7);
        for _ in 0..200 {
            let spacing = rng.gen_range(1..=2_000);
            let t = CoordinateTransform::new(spacing);
            let coord = GridCoordinate::new(rng.gen_range(-500..=500), rng.gen_range(-500..=500));
            let (wx, wz) = t.grid_to_world(coord);
            assert_eq!(t.world_to_grid(wx, wz), coord, "spacing {spacing}");
            // anywhere inside the cell maps back to the same cell
            let inside = rng.gen_range(0..spacing);
            assert_eq!(t.world_to_grid(wx + inside, wz + inside), coord);
        }
    }

    #[test]
    fn test_pure_functions_repeatable() {
        let t = CoordinateTransform::new(800);
        let coord = GridCoordinate::new(3, -1);
        assert_eq!(t.grid_to_world(coord), t.grid_to_world(coord));
        assert_eq!(t.world_to_grid(1234, -99), t.world_to_grid(1234, -99));
        assert_eq!(coord, GridCoordinate::new(3, -1));
    }

    #[test]
    fn test_invalid_spacing_maps_to_origin() {
        for spacing in [0, -400] {
            let t = CoordinateTransform::new(spacing);
            assert!(!t.is_valid());
            assert_eq!(t.world_to_grid(12_345, -6_789), GridCoordinate::ORIGIN);
        }
    }

    #[test]
    fn test_from_settings_uses_multiplier() {
        let settings = GridSettings {
            island_distance: 250,
            ..GridSettings::default()
        };
        let t = CoordinateTransform::from_settings(&settings);
        assert_eq!(t.spacing(), 500);
        assert_eq!(t.world_to_grid(750, 1250), GridCoordinate::new(1, 2));
    }
}
