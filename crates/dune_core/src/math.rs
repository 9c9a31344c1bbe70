//! Fixed-point math utilities for deterministic simulation.
//!
//! All game simulation uses fixed-point arithmetic to ensure
//! deterministic behavior across platforms. Floating-point
//! operations can produce different results on different CPUs,
//! so square roots and trigonometry are computed on the raw bits.

use fixed::types::I32F32;
use serde::{Deserialize, Serialize};

use crate::data::TILESIZE;
use crate::error::{GameError, Result};

/// Fixed-point number type for all simulation math.
///
/// Uses 32 bits for integer part and 32 bits for fractional part.
/// Range: approximately -2,147,483,648 to 2,147,483,647
/// Precision: approximately 0.00000000023
pub type Fixed = I32F32;

/// π rounded to the nearest representable value.
pub const FIXED_PI: Fixed = Fixed::from_bits(13_493_037_705);

/// 2π rounded to the nearest representable value.
pub const FIXED_TWO_PI: Fixed = Fixed::from_bits(26_986_075_409);

/// π/2 rounded to the nearest representable value.
pub const FIXED_HALF_PI: Fixed = Fixed::from_bits(6_746_518_852);

/// √2, the cost of a diagonal step.
pub const DIAGONAL_COST: Fixed = Fixed::from_bits(6_074_001_000);

const HALF: Fixed = Fixed::from_bits(1 << 31);
const ONE: Fixed = Fixed::from_bits(1 << 32);

/// Builds a fixed-point value from an integer at compile time.
#[must_use]
pub const fn fixed_int(n: i32) -> Fixed {
    Fixed::from_bits((n as i64) << 32)
}

/// Builds `num / den` at compile time, truncating toward zero.
#[must_use]
pub const fn fixed_ratio(num: i64, den: i64) -> Fixed {
    Fixed::from_bits((num << 32) / den)
}

/// Integer coordinate, used both for tiles and for world positions.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Default, Serialize, Deserialize,
)]
pub struct Coord {
    /// X component.
    pub x: i32,
    /// Y component.
    pub y: i32,
}

impl Coord {
    /// Create a new coordinate.
    #[must_use]
    pub const fn new(x: i32, y: i32) -> Self {
        Self { x, y }
    }

    /// World position of the centre of the tile at this tile coordinate.
    #[must_use]
    pub const fn tile_center(self) -> Self {
        Self::new(
            self.x * TILESIZE + TILESIZE / 2,
            self.y * TILESIZE + TILESIZE / 2,
        )
    }

    /// Tile containing this world position.
    #[must_use]
    pub const fn world_to_tile(self) -> Self {
        Self::new(self.x.div_euclid(TILESIZE), self.y.div_euclid(TILESIZE))
    }
}

impl std::ops::Add for Coord {
    type Output = Self;

    fn add(self, rhs: Self) -> Self::Output {
        Self::new(self.x + rhs.x, self.y + rhs.y)
    }
}

/// Fixed-point 2D vector.
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

    /// Zero vector.
    pub const ZERO: Self = Self {
        x: Fixed::ZERO,
        y: Fixed::ZERO,
    };

    /// Exact conversion from an integer world coordinate.
    #[must_use]
    pub fn from_coord(coord: Coord) -> Self {
        Self::new(Fixed::from_num(coord.x), Fixed::from_num(coord.y))
    }

    /// Round both components to the nearest integer.
    #[must_use]
    pub fn round(self) -> Coord {
        Coord::new(lround(self.x), lround(self.y))
    }

    /// Tile containing this world position.
    #[must_use]
    pub fn to_tile(self) -> Coord {
        let tile = Fixed::from_num(TILESIZE);
        Coord::new(
            (self.x / tile).floor().to_num(),
            (self.y / tile).floor().to_num(),
        )
    }

    /// Calculate squared distance (avoids sqrt for comparisons).
    #[must_use]
    pub fn distance_squared(self, other: Self) -> Fixed {
        let dx = self.x - other.x;
        let dy = self.y - other.y;
        dx * dx + dy * dy
    }

    /// Euclidean distance to `other`.
    #[must_use]
    pub fn distance(self, other: Self) -> Fixed {
        fixed_sqrt(self.distance_squared(other))
    }
}

impl std::ops::Add for Vec2Fixed {
    type Output = Self;

    fn add(self, rhs: Self) -> Self::Output {
        Self {
            x: self.x + rhs.x,
            y: self.y + rhs.y,
        }
    }
}

impl std::ops::Sub for Vec2Fixed {
    type Output = Self;

    fn sub(self, rhs: Self) -> Self::Output {
        Self {
            x: self.x - rhs.x,
            y: self.y - rhs.y,
        }
    }
}

/// Computes the square root of a fixed-point number.
///
/// Works on the raw bits with an exact integer square root, so the result
/// is the largest representable value whose square does not exceed the
/// input. Non-positive input saturates to zero.
#[must_use]
pub fn fixed_sqrt(value: Fixed) -> Fixed {
    if value <= Fixed::ZERO {
        return Fixed::ZERO;
    }

    let scaled = (value.to_bits() as u128) << 32;
    Fixed::from_bits(isqrt(scaled) as i64)
}

fn isqrt(n: u128) -> u128 {
    let mut remainder = n;
    let mut root = 0u128;
    let mut bit = 1u128 << 126;

    while bit > n {
        bit >>= 2;
    }

    while bit != 0 {
        if remainder >= root + bit {
            remainder -= root + bit;
            root = (root >> 1) + bit;
        } else {
            root >>= 1;
        }
        bit >>= 2;
    }

    root
}

/// Sine of an angle in radians.
#[must_use]
pub fn fixed_sin(angle: Fixed) -> Fixed {
    let mut x = angle % FIXED_TWO_PI;
    if x > FIXED_PI {
        x -= FIXED_TWO_PI;
    } else if x < -FIXED_PI {
        x += FIXED_TWO_PI;
    }

    // Fold into [-π/2, π/2] where the series converges quickly.
    if x > FIXED_HALF_PI {
        x = FIXED_PI - x;
    } else if x < -FIXED_HALF_PI {
        x = -FIXED_PI - x;
    }

    let x2 = x * x;
    let mut term = x;
    let mut sum = x;
    for k in 1..=7 {
        let divisor = Fixed::from_num((2 * k) * (2 * k + 1));
        term = -(term * x2) / divisor;
        sum += term;
    }
    sum
}

/// Cosine of an angle in radians.
#[must_use]
pub fn fixed_cos(angle: Fixed) -> Fixed {
    fixed_sin(angle + FIXED_HALF_PI)
}

/// Arc tangent of `y / x` in `(-π, π]`. Both zero yields zero.
#[must_use]
pub fn fixed_atan2(y: Fixed, x: Fixed) -> Fixed {
    if x == Fixed::ZERO && y == Fixed::ZERO {
        return Fixed::ZERO;
    }

    let ax = x.abs();
    let ay = y.abs();
    let base = if ay <= ax {
        atan_unit(ay / ax)
    } else {
        FIXED_HALF_PI - atan_unit(ax / ay)
    };

    let angle = if x >= Fixed::ZERO {
        base
    } else {
        FIXED_PI - base
    };

    if y < Fixed::ZERO {
        -angle
    } else {
        angle
    }
}

/// atan for arguments in `[0, 1]`.
fn atan_unit(z: Fixed) -> Fixed {
    // atan(z) = 2 * atan(z / (1 + sqrt(1 + z^2))) keeps the series argument below 0.42
    let reduced = z / (ONE + fixed_sqrt(ONE + z * z));
    let z2 = reduced * reduced;
    let mut power = reduced;
    let mut sum = reduced;
    for k in 1..=12 {
        power = -(power * z2);
        sum += power / Fixed::from_num(2 * k + 1);
    }
    sum * 2
}

/// Round to the nearest integer, halves away from zero.
#[must_use]
pub fn lround(value: Fixed) -> i32 {
    if value >= Fixed::ZERO {
        (value + HALF).floor().to_num()
    } else {
        -((HALF - value).floor().to_num::<i32>())
    }
}

/// Division that reports a zero divisor instead of panicking.
pub fn checked_div(numerator: Fixed, denominator: Fixed) -> Result<Fixed> {
    numerator
        .checked_div(denominator)
        .ok_or(GameError::DivisionByZero)
}

/// Convert radians to the 256-step angle used for facings.
#[must_use]
pub fn rad_to_deg256(angle: Fixed) -> Fixed {
    angle * 128 / FIXED_PI
}

/// Convert a 256-step angle to radians.
#[must_use]
pub fn deg256_to_rad(angle: Fixed) -> Fixed {
    angle * FIXED_PI / 128
}

/// Angle from `from` to `to` in `[0, 2π)`, with screen y pointing down.
///
/// Identical points yield π/2 ("straight up").
#[must_use]
pub fn destination_angle_rad(from: Vec2Fixed, to: Vec2Fixed) -> Fixed {
    let dx = to.x - from.x;
    let dy = -(to.y - from.y);

    if dx == Fixed::ZERO && dy == Fixed::ZERO {
        return FIXED_HALF_PI;
    }

    let angle = fixed_atan2(dy, dx);
    if angle < Fixed::ZERO {
        angle + FIXED_TWO_PI
    } else {
        angle
    }
}

/// Euclidean distance between two world positions.
#[must_use]
pub fn distance_from(a: Vec2Fixed, b: Vec2Fixed) -> Fixed {
    a.distance(b)
}

/// Distance in tile steps where a diagonal step costs √2.
#[must_use]
pub fn block_distance(a: Coord, b: Coord) -> Fixed {
    let dx = (a.x - b.x).abs();
    let dy = (a.y - b.y).abs();
    let min = dx.min(dy);
    Fixed::from_num(dx.max(dy) - min) + Fixed::from_num(min) * DIAGONAL_COST
}

#[cfg(test)]
mod tests {
    use super::*;

    fn fixed(n: i32) -> Fixed {
        Fixed::from_num(n)
    }

    fn assert_close(actual: Fixed, expected: f64) {
        let diff = (actual.to_num::<f64>() - expected).abs();
        assert!(diff < 1e-6, "expected {expected}, got {actual}");
    }

    #[test]
    fn test_sqrt_exact_squares() {
        assert_eq!(fixed_sqrt(fixed(4)), fixed(2));
        assert_eq!(fixed_sqrt(fixed(10_000)), fixed(100));
        assert_eq!(fixed_sqrt(Fixed::ZERO), Fixed::ZERO);
    }

    #[test]
    fn test_sqrt_negative_saturates() {
        assert_eq!(fixed_sqrt(fixed(-9)), Fixed::ZERO);
    }

    #[test]
    fn test_sqrt_irrational() {
        assert_close(fixed_sqrt(fixed(2)), std::f64::consts::SQRT_2);
    }

    #[test]
    fn test_sin_cos_quadrants() {
        assert_close(fixed_sin(Fixed::ZERO), 0.0);
        assert_close(fixed_sin(FIXED_HALF_PI), 1.0);
        assert_close(fixed_cos(FIXED_PI), -1.0);
        assert_close(fixed_sin(-FIXED_HALF_PI), -1.0);
        assert_close(fixed_cos(FIXED_TWO_PI), 1.0);
        assert_close(fixed_sin(fixed(7)), 7.0f64.sin());
    }

    #[test]
    fn test_atan2_octants() {
        assert_close(fixed_atan2(fixed(1), fixed(1)), std::f64::consts::FRAC_PI_4);
        assert_close(fixed_atan2(fixed(1), fixed(-1)), 3.0 * std::f64::consts::FRAC_PI_4);
        assert_close(fixed_atan2(fixed(-3), fixed(4)), (-3.0f64).atan2(4.0));
        assert_close(fixed_atan2(fixed(5), Fixed::ZERO), std::f64::consts::FRAC_PI_2);
        assert_eq!(fixed_atan2(Fixed::ZERO, Fixed::ZERO), Fixed::ZERO);
    }

    #[test]
    fn test_lround_halves_away_from_zero() {
        assert_eq!(lround(Fixed::from_num(2.5)), 3);
        assert_eq!(lround(Fixed::from_num(-2.5)), -3);
        assert_eq!(lround(Fixed::from_num(2.49)), 2);
        assert_eq!(lround(Fixed::from_num(-0.2)), 0);
    }

    #[test]
    fn test_checked_div_by_zero() {
        assert_eq!(checked_div(fixed(1), Fixed::ZERO), Err(GameError::DivisionByZero));
        assert_eq!(checked_div(fixed(9), fixed(3)), Ok(fixed(3)));
    }

    #[test]
    fn test_destination_angle() {
        let origin = Vec2Fixed::new(fixed(100), fixed(100));
        assert_eq!(destination_angle_rad(origin, origin), FIXED_HALF_PI);
        assert_close(
            destination_angle_rad(origin, Vec2Fixed::new(fixed(200), fixed(100))),
            0.0,
        );
        // y grows downwards, so a smaller y is "up"
        assert_close(
            destination_angle_rad(origin, Vec2Fixed::new(fixed(100), fixed(0))),
            std::f64::consts::FRAC_PI_2,
        );
        assert_close(
            destination_angle_rad(origin, Vec2Fixed::new(fixed(100), fixed(200))),
            3.0 * std::f64::consts::FRAC_PI_2,
        );
    }

    #[test]
    fn test_deg256_roundtrip() {
        assert_close(rad_to_deg256(FIXED_PI), 128.0);
        assert_close(deg256_to_rad(fixed(64)), std::f64::consts::FRAC_PI_2);
    }

    #[test]
    fn test_block_distance() {
        assert_eq!(block_distance(Coord::new(0, 0), Coord::new(3, 0)), fixed(3));
        assert_eq!(
            block_distance(Coord::new(0, 0), Coord::new(1, 1)),
            DIAGONAL_COST
        );
    }

    #[test]
    fn test_tile_conversions() {
        assert_eq!(Coord::new(2, 3).tile_center(), Coord::new(160, 224));
        assert_eq!(Coord::new(-1, 130).world_to_tile(), Coord::new(-1, 2));
        let real = Vec2Fixed::new(Fixed::from_num(127.9), Fixed::from_num(64));
        assert_eq!(real.to_tile(), Coord::new(1, 1));
    }
}
