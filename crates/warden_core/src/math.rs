//! Fixed-point math utilities for deterministic simulation.
//!
//! World positions use fixed-point arithmetic so that two servers (or a
//! server and a replay) fed the same commands land on bit-identical state.

use fixed::types::I32F32;
use serde::{Deserialize, Serialize};

/// Fixed-point number type for all simulation math.
///
/// 32 integer bits and 32 fractional bits.
pub type Fixed = I32F32;

/// Fixed-point 2D vector in world units (one unit = one tile).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub struct Vec2Fixed {
    /// X coordinate.
    #[serde(with = "fixed_serde")]
    pub x: Fixed,
    /// Y coordinate.
    #[serde(with = "fixed_serde")]
    pub y: Fixed,
}

/// Serde support for fixed-point numbers.
///
/// Serializes fixed-point numbers as their raw bit representation (i64)
/// to preserve exact precision across serialization boundaries.
pub mod fixed_serde {
    use super::Fixed;
    use serde::{Deserialize, Deserializer, Serialize, Serializer};

    /// Serialize a fixed-point number as its raw bit representation.
    pub fn serialize<S>(value: &Fixed, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        value.to_bits().serialize(serializer)
    }

    /// Deserialize a fixed-point number from its raw bit representation.
    pub fn deserialize<'de, D>(deserializer: D) -> Result<Fixed, D::Error>
    where
        D: Deserializer<'de>,
    {
        let bits = i64::deserialize(deserializer)?;
        Ok(Fixed::from_bits(bits))
    }
}

impl Vec2Fixed {
    /// Create a new fixed-point vector.
    #[must_use]
    pub const fn new(x: Fixed, y: Fixed) -> Self {
        Self { x, y }
    }

    /// Create a vector from whole-tile integer coordinates.
    #[must_use]
    pub fn from_ints(x: i32, y: i32) -> Self {
        Self::new(Fixed::from_num(x), Fixed::from_num(y))
    }

    /// Zero vector.
    pub const ZERO: Self = Self {
        x: Fixed::ZERO,
        y: Fixed::ZERO,
    };

    /// Squared distance (avoids sqrt for comparisons).
    ///
    /// Saturates instead of overflowing for far-apart points.
    #[must_use]
    pub fn distance_squared(self, other: Self) -> Fixed {
        let dx = self.x.saturating_sub(other.x);
        let dy = self.y.saturating_sub(other.y);
        dx.saturating_mul(dx).saturating_add(dy.saturating_mul(dy))
    }

    /// True when `other` is within `range` of `self` (inclusive).
    #[must_use]
    pub fn within(self, other: Self, range: Fixed) -> bool {
        self.distance_squared(other) <= range.saturating_mul(range)
    }

    /// Dot product of two vectors.
    #[must_use]
    pub fn dot(self, other: Self) -> Fixed {
        self.x
            .saturating_mul(other.x)
            .saturating_add(self.y.saturating_mul(other.y))
    }

    /// Multiply both components by a scalar.
    #[must_use]
    pub fn scale(self, factor: Fixed) -> Self {
        Self::new(
            self.x.saturating_mul(factor),
            self.y.saturating_mul(factor),
        )
    }

    /// Normalize vector using fixed-point math.
    #[must_use]
    pub fn normalize(self) -> Self {
        let len = fixed_sqrt(self.dot(self));
        if len == Fixed::ZERO {
            return Self::ZERO;
        }
        Self::new(self.x / len, self.y / len)
    }

    /// Move from `self` toward `target` by at most `max_step`.
    ///
    /// Lands exactly on `target` when it is closer than one step, so
    /// repeated calls converge without oscillating.
    #[must_use]
    pub fn step_toward(self, target: Self, max_step: Fixed) -> Self {
        if max_step <= Fixed::ZERO {
            return self;
        }
        if self.within(target, max_step) {
            return target;
        }
        self + (target - self).normalize().scale(max_step)
    }

    /// Move from `self` directly away from `threat` by `max_step`.
    #[must_use]
    pub fn step_away(self, threat: Self, max_step: Fixed) -> Self {
        let away = self - threat;
        if away == Self::ZERO {
            // Standing on the threat: pick a fixed axis so the result stays deterministic.
            return self + Self::new(max_step, Fixed::ZERO);
        }
        self + away.normalize().scale(max_step)
    }

    /// Tile containing this position.
    #[must_use]
    pub fn to_tile(self) -> TilePos {
        TilePos::new(self.x.floor().to_num(), self.y.floor().to_num())
    }
}

/// Computes the square root of a fixed-point number using binary search.
fn fixed_sqrt(value: Fixed) -> Fixed {
    if value <= Fixed::ZERO {
        return Fixed::ZERO;
    }

    let mut low = Fixed::ZERO;
    let mut high = if value > Fixed::ONE { value } else { Fixed::ONE };

    for _ in 0..48 {
        let mid = low + (high - low) / Fixed::from_num(2);
        if mid.saturating_mul(mid) <= value {
            low = mid;
        } else {
            high = mid;
        }
    }

    low
}

impl std::ops::Add for Vec2Fixed {
    type Output = Self;

    fn add(self, rhs: Self) -> Self::Output {
        Self {
            x: self.x.saturating_add(rhs.x),
            y: self.y.saturating_add(rhs.y),
        }
    }
}

impl std::ops::Sub for Vec2Fixed {
    type Output = Self;

    fn sub(self, rhs: Self) -> Self::Output {
        Self {
            x: self.x.saturating_sub(rhs.x),
            y: self.y.saturating_sub(rhs.y),
        }
    }
}

/// Integer tile coordinate, used by content files and farm plots.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Default, Serialize, Deserialize,
)]
pub struct TilePos {
    /// Column.
    pub x: i32,
    /// Row.
    pub y: i32,
}

impl TilePos {
    /// Create a tile coordinate.
    #[must_use]
    pub const fn new(x: i32, y: i32) -> Self {
        Self { x, y }
    }

    /// World position of the tile's origin corner.
    #[must_use]
    pub fn to_world(self) -> Vec2Fixed {
        Vec2Fixed::from_ints(self.x, self.y)
    }
}

/// Cardinal facing of an entity.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum Facing {
    /// Negative Y.
    North,
    /// Positive X.
    East,
    /// Positive Y.
    #[default]
    South,
    /// Negative X.
    West,
}

impl Facing {
    /// Facing for a movement direction; keeps `current` for a zero vector.
    ///
    /// The dominant axis wins; ties favour the horizontal axis.
    #[must_use]
    pub fn from_direction(direction: Vec2Fixed, current: Self) -> Self {
        if direction == Vec2Fixed::ZERO {
            return current;
        }
        if direction.x.abs() >= direction.y.abs() {
            if direction.x >= Fixed::ZERO {
                Self::East
            } else {
                Self::West
            }
        } else if direction.y >= Fixed::ZERO {
            Self::South
        } else {
            Self::North
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_vec2_distance_squared() {
        let a = Vec2Fixed::from_ints(3, 0);
        let b = Vec2Fixed::from_ints(0, 4);
        assert_eq!(a.distance_squared(b), Fixed::from_num(25));
        assert!(a.within(b, Fixed::from_num(5)));
        assert!(!a.within(b, Fixed::from_num(4)));
    }

    #[test]
    fn test_step_toward_lands_exactly() {
        let start = Vec2Fixed::ZERO;
        let target = Vec2Fixed::from_ints(1, 0);
        assert_eq!(start.step_toward(target, Fixed::from_num(2)), target);

        let far = Vec2Fixed::from_ints(10, 0);
        let stepped = start.step_toward(far, Fixed::from_num(2));
        assert!(stepped.x > Fixed::from_num(1));
        assert!(stepped.x <= Fixed::from_num(2.001));
        assert_eq!(stepped.y, Fixed::ZERO);
    }

    #[test]
    fn test_step_away_increases_distance() {
        let mob = Vec2Fixed::from_ints(2, 2);
        let threat = Vec2Fixed::from_ints(1, 2);
        let fled = mob.step_away(threat, Fixed::ONE);
        assert!(fled.distance_squared(threat) > mob.distance_squared(threat));

        let stacked = threat.step_away(threat, Fixed::ONE);
        assert_eq!(stacked, Vec2Fixed::from_ints(2, 2));
    }

    #[test]
    fn test_tile_conversion_floors() {
        let pos = Vec2Fixed::new(Fixed::from_num(3.75), Fixed::from_num(-0.5));
        assert_eq!(pos.to_tile(), TilePos::new(3, -1));
        assert_eq!(TilePos::new(4, 5).to_world(), Vec2Fixed::from_ints(4, 5));
    }

    #[test]
    fn test_facing_from_direction() {
        assert_eq!(
            Facing::from_direction(Vec2Fixed::from_ints(-3, 1), Facing::South),
            Facing::West
        );
        assert_eq!(
            Facing::from_direction(Vec2Fixed::from_ints(0, -2), Facing::South),
            Facing::North
        );
        assert_eq!(
            Facing::from_direction(Vec2Fixed::ZERO, Facing::East),
            Facing::East
        );
    }

    #[test]
    fn test_fixed_determinism() {
        let a = Fixed::from_num(1) / Fixed::from_num(3);
        let b = Fixed::from_num(1) / Fixed::from_num(3);
        assert_eq!(a * Fixed::from_num(7), b * Fixed::from_num(7));
    }
}
