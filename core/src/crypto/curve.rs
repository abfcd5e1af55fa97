//! # STARK Curve Engine
//!
//! Point arithmetic on the STARK-friendly curve
//!
//! ```text
//! y² = x³ + α·x + β   over F_P,   α = 1,
//! β = 0x6f21413efbe40de150e596d72f7a8c5609ad26c15c915c1f4cdfcb99cee9e89
//! ```
//!
//! The group generated by `G` has prime order `N`, and the cofactor is 1.
//!
//! Public API works on affine [`CurvePoint`]s with an explicit point at
//! infinity. Scalar multiplication runs internally in Jacobian coordinates
//! (one field inversion at the very end instead of one per step) and is
//! converted back to affine on the way out.
//!
//! Two multiplication schedules are provided:
//!
//! - [`CurvePoint::mul`]: textbook double-and-add, only touching set bits.
//!   Used for public scalars (hash inputs, verification).
//! - [`CurvePoint::mul_ladder`]: Montgomery ladder over a fixed 252-bit
//!   window: one addition and one doubling for every bit, whatever its value.
//!   Used wherever the scalar is a secret (key derivation, signing nonces).

use std::sync::Arc;

use super::constants::{ConstantsError, CurveConstants};
use super::field::{ArithmeticError, Felt, Scalar};

/// `α` in the curve equation.
pub const ALPHA: u64 = 1;

/// `β` in the curve equation, hex-encoded.
pub const BETA_HEX: &str = "0x6f21413efbe40de150e596d72f7a8c5609ad26c15c915c1f4cdfcb99cee9e89";

/// Bit length of the curve order; every scalar fits in this many bits.
pub const SCALAR_BITS: usize = 252;

fn beta() -> Felt {
    // Constant input; cannot fail.
    Felt::from_hex(BETA_HEX).unwrap_or_default()
}

// ---------------------------------------------------------------------------
// CurvePoint
// ---------------------------------------------------------------------------

/// A point on the curve, or the additive identity.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum CurvePoint {
    /// The point at infinity.
    Infinity,
    /// A finite point. Obtained through [`CurvePoint::new`] or
    /// [`CurvePoint::from_x`], or as the result of curve arithmetic.
    Affine(AffinePoint),
}

/// Coordinates of a finite point. Fields are private to this module, so
/// every value in circulation satisfies the curve equation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct AffinePoint {
    x: Felt,
    y: Felt,
}

impl AffinePoint {
    pub fn x(&self) -> Felt {
        self.x
    }

    pub fn y(&self) -> Felt {
        self.y
    }
}

/// Builds a finite point without checking it. Only for coordinates that
/// come out of curve arithmetic on valid points.
fn affine(x: Felt, y: Felt) -> CurvePoint {
    CurvePoint::Affine(AffinePoint { x, y })
}

impl CurvePoint {
    /// Validates `(x, y)` against the curve equation.
    pub fn new(x: Felt, y: Felt) -> Result<Self, ArithmeticError> {
        let point = affine(x, y);
        if point.is_on_curve() {
            Ok(point)
        } else {
            Err(ArithmeticError::PointNotOnCurve)
        }
    }

    /// Recovers a point from its x-coordinate. Of the two candidates
    /// `(x, ±y)` the one returned is unspecified.
    pub fn from_x(x: Felt) -> Result<Self, ArithmeticError> {
        let rhs = x * x * x + Felt::from(ALPHA) * x + beta();
        let y = rhs.sqrt().ok_or(ArithmeticError::PointNotOnCurve)?;
        Ok(affine(x, y))
    }

    pub fn is_infinity(&self) -> bool {
        matches!(self, CurvePoint::Infinity)
    }

    pub fn x(&self) -> Option<Felt> {
        match self {
            CurvePoint::Affine(p) => Some(p.x),
            CurvePoint::Infinity => None,
        }
    }

    pub fn y(&self) -> Option<Felt> {
        match self {
            CurvePoint::Affine(p) => Some(p.y),
            CurvePoint::Infinity => None,
        }
    }

    /// Infinity is considered on the curve.
    pub fn is_on_curve(&self) -> bool {
        match self {
            CurvePoint::Infinity => true,
            CurvePoint::Affine(AffinePoint { x, y }) => {
                let (x, y) = (*x, *y);
                y.square() == x * x * x + Felt::from(ALPHA) * x + beta()
            }
        }
    }

    pub fn neg(&self) -> Self {
        match self {
            CurvePoint::Infinity => CurvePoint::Infinity,
            CurvePoint::Affine(p) => affine(p.x, -p.y),
        }
    }

    /// Affine point addition, handling every special case.
    pub fn add(&self, other: &CurvePoint) -> CurvePoint {
        let (x1, y1, x2, y2) = match (self, other) {
            (CurvePoint::Infinity, p) | (p, CurvePoint::Infinity) => return *p,
            (CurvePoint::Affine(p), CurvePoint::Affine(q)) => (p.x, p.y, q.x, q.y),
        };

        if x1 == x2 {
            return if y1 == y2 {
                self.double()
            } else {
                // P + (-P)
                CurvePoint::Infinity
            };
        }

        // x1 != x2, so the denominator is nonzero.
        let slope = match (y2 - y1).div(&(x2 - x1)) {
            Ok(s) => s,
            Err(_) => return CurvePoint::Infinity,
        };
        let x3 = slope.square() - x1 - x2;
        let y3 = slope * (x1 - x3) - y1;
        affine(x3, y3)
    }

    pub fn sub(&self, other: &CurvePoint) -> CurvePoint {
        self.add(&other.neg())
    }

    /// Affine point doubling.
    pub fn double(&self) -> CurvePoint {
        let (x, y) = match self {
            CurvePoint::Infinity => return CurvePoint::Infinity,
            CurvePoint::Affine(p) => (p.x, p.y),
        };
        if y.is_zero() {
            return CurvePoint::Infinity;
        }
        let numerator = Felt::from(3u64) * x.square() + Felt::from(ALPHA);
        let slope = match numerator.div(&y.double()) {
            Ok(s) => s,
            Err(_) => return CurvePoint::Infinity,
        };
        let x3 = slope.square() - x.double();
        let y3 = slope * (x - x3) - y;
        affine(x3, y3)
    }

    /// `k · self` by double-and-add over the bits of `k`. Any felt is
    /// accepted; reduction modulo `N` is implicit in the group order.
    pub fn mul(&self, k: &Felt) -> CurvePoint {
        let bits = k.num_bits() as usize;
        let base = Jacobian::from_affine(self);
        let mut acc = Jacobian::identity();
        for i in (0..bits).rev() {
            acc = acc.double();
            if k.bit(i) {
                acc = acc.add(&base);
            }
        }
        acc.to_affine()
    }

    /// `k · self` via a Montgomery ladder that always walks all
    /// [`SCALAR_BITS`] bits.
    pub fn mul_ladder(&self, k: &Scalar) -> CurvePoint {
        let mut r0 = Jacobian::identity();
        let mut r1 = Jacobian::from_affine(self);
        for i in (0..SCALAR_BITS).rev() {
            if k.bit(i) {
                r0 = r0.add(&r1);
                r1 = r1.double();
            } else {
                r1 = r0.add(&r1);
                r0 = r0.double();
            }
        }
        r0.to_affine()
    }
}

// ---------------------------------------------------------------------------
// Jacobian coordinates
// ---------------------------------------------------------------------------

/// `(X, Y, Z)` representing the affine point `(X/Z², Y/Z³)`; `Z = 0` is
/// infinity.
#[derive(Debug, Clone, Copy)]
struct Jacobian {
    x: Felt,
    y: Felt,
    z: Felt,
}

impl Jacobian {
    fn identity() -> Self {
        Self {
            x: Felt::one(),
            y: Felt::one(),
            z: Felt::zero(),
        }
    }

    fn from_affine(point: &CurvePoint) -> Self {
        match point {
            CurvePoint::Infinity => Self::identity(),
            CurvePoint::Affine(p) => Self {
                x: p.x,
                y: p.y,
                z: Felt::one(),
            },
        }
    }

    fn is_identity(&self) -> bool {
        self.z.is_zero()
    }

    fn to_affine(self) -> CurvePoint {
        let z_inv = match self.z.inverse() {
            Ok(inv) => inv,
            Err(_) => return CurvePoint::Infinity,
        };
        let z_inv2 = z_inv.square();
        affine(self.x * z_inv2, self.y * z_inv2 * z_inv)
    }

    fn double(&self) -> Self {
        if self.is_identity() || self.y.is_zero() {
            return Self::identity();
        }
        let xx = self.x.square();
        let yy = self.y.square();
        let zz = self.z.square();
        let s = Felt::from(4u64) * self.x * yy;
        let m = Felt::from(3u64) * xx + Felt::from(ALPHA) * zz.square();
        let x3 = m.square() - s.double();
        let y3 = m * (s - x3) - Felt::from(8u64) * yy.square();
        let z3 = (self.y * self.z).double();
        Self {
            x: x3,
            y: y3,
            z: z3,
        }
    }

    fn add(&self, other: &Jacobian) -> Self {
        if self.is_identity() {
            return *other;
        }
        if other.is_identity() {
            return *self;
        }

        let z1z1 = self.z.square();
        let z2z2 = other.z.square();
        let u1 = self.x * z2z2;
        let u2 = other.x * z1z1;
        let s1 = self.y * other.z * z2z2;
        let s2 = other.y * self.z * z1z1;
        let h = u2 - u1;
        let r = s2 - s1;

        if h.is_zero() {
            return if r.is_zero() {
                self.double()
            } else {
                Self::identity()
            };
        }

        let hh = h.square();
        let hhh = h * hh;
        let v = u1 * hh;
        let x3 = r.square() - hhh - v.double();
        let y3 = r * (v - x3) - s1 * hhh;
        let z3 = self.z * other.z * h;
        Self {
            x: x3,
            y: y3,
            z: z3,
        }
    }
}

// ---------------------------------------------------------------------------
// StarkCurve
// ---------------------------------------------------------------------------

/// The curve engine: point operations plus access to the constants table
/// it was built with.
///
/// Cheap to clone (the table sits behind an `Arc`) and safe to share across
/// threads; every operation is pure.
#[derive(Debug, Clone)]
pub struct StarkCurve {
    constants: Arc<CurveConstants>,
}

impl StarkCurve {
    /// An engine over an explicitly supplied table.
    pub fn new(constants: Arc<CurveConstants>) -> Self {
        Self { constants }
    }

    /// An engine over the process-wide table.
    pub fn shared() -> Result<Self, ConstantsError> {
        Ok(Self::new(CurveConstants::shared()?))
    }

    pub fn constants(&self) -> &CurveConstants {
        &self.constants
    }

    pub fn generator(&self) -> CurvePoint {
        *self.constants.generator()
    }

    /// Validates an externally supplied point.
    pub fn point(&self, x: Felt, y: Felt) -> Result<CurvePoint, ArithmeticError> {
        CurvePoint::new(x, y)
    }

    pub fn add(&self, a: &CurvePoint, b: &CurvePoint) -> CurvePoint {
        a.add(b)
    }

    pub fn double(&self, p: &CurvePoint) -> CurvePoint {
        p.double()
    }

    /// `k · p` for any felt `k`.
    pub fn scalar_mul(&self, k: &Felt, p: &CurvePoint) -> CurvePoint {
        p.mul(k)
    }

    /// `k · p` where `k` must be a valid scalar in `[0, N)`.
    pub fn scalar_mul_checked(&self, k: &Felt, p: &CurvePoint) -> Result<CurvePoint, ArithmeticError> {
        let scalar = Scalar::from_felt(k)?;
        Ok(p.mul_ladder(&scalar))
    }

    /// `k · G` on the fixed-schedule ladder.
    pub fn mul_generator(&self, k: &Scalar) -> CurvePoint {
        self.constants.generator().mul_ladder(k)
    }
}
