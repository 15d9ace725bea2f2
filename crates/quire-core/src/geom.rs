// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Geometry value types: page dimensions and per-edge fractions.

use serde::{Deserialize, Serialize};

use crate::error::{QuireError, Result};

/// Page dimensions in PDF points (1/72 inch). Both axes are positive.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Dims {
    pub width: f64,
    pub height: f64,
}

impl Dims {
    pub fn new(width: f64, height: f64) -> Self {
        Self { width, height }
    }

    /// The same dimensions with the axes exchanged, as seen after a
    /// quarter-turn of the page.
    pub fn swapped(self) -> Self {
        Self {
            width: self.height,
            height: self.width,
        }
    }

    /// Both axes multiplied by `factor`.
    pub fn scaled(self, factor: f64) -> Self {
        Self {
            width: self.width * factor,
            height: self.height * factor,
        }
    }

    /// Approximate equality, for comparing derived sizes.
    pub fn approx_eq(self, other: Dims) -> bool {
        (self.width - other.width).abs() < 1e-9 && (self.height - other.height).abs() < 1e-9
    }
}

/// Per-edge fractions of a page.
///
/// Used in two roles: as a crop (each component is the fraction of the page's
/// width or height hidden at that edge) and as a layer placement offset
/// (fractions of the slack between host and layer sizes). Crop values are
/// validated at the user-input boundary via [`Sides::checked`]; the algebra
/// itself places no constraints on the components.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct Sides {
    pub left: f64,
    pub right: f64,
    pub top: f64,
    pub bottom: f64,
}

impl Sides {
    pub fn new(left: f64, right: f64, top: f64, bottom: f64) -> Self {
        Self {
            left,
            right,
            top,
            bottom,
        }
    }

    /// Validated crop constructor. Each component must lie in `[0, 1)` and
    /// the two components of an axis must leave part of the page visible.
    pub fn checked(left: f64, right: f64, top: f64, bottom: f64) -> Result<Self> {
        for (name, value) in [
            ("left", left),
            ("right", right),
            ("top", top),
            ("bottom", bottom),
        ] {
            if !(0.0..1.0).contains(&value) || !value.is_finite() {
                return Err(QuireError::InvalidCrop(format!(
                    "{name} fraction {value} outside [0, 1)"
                )));
            }
        }
        if left + right >= 1.0 {
            return Err(QuireError::InvalidCrop(format!(
                "left + right = {} consumes the whole width",
                left + right
            )));
        }
        if top + bottom >= 1.0 {
            return Err(QuireError::InvalidCrop(format!(
                "top + bottom = {} consumes the whole height",
                top + bottom
            )));
        }
        Ok(Self::new(left, right, top, bottom))
    }

    /// Whether all four components are exactly zero.
    pub fn is_zero(self) -> bool {
        self.left == 0.0 && self.right == 0.0 && self.top == 0.0 && self.bottom == 0.0
    }

    /// The quarter-turn permutation `(left, right, top, bottom) →
    /// (bottom, top, left, right)`, applied `k mod 4` times.
    ///
    /// One application corresponds to one 90° turn of the page; four
    /// applications are the identity. This is what keeps a crop anchored to
    /// the same physical paper edge when the page orientation changes.
    pub fn rotated(self, k: u32) -> Self {
        let mut s = self;
        for _ in 0..(k % 4) {
            s = Self {
                left: s.bottom,
                right: s.top,
                top: s.left,
                bottom: s.right,
            };
        }
        s
    }
}

impl std::ops::Add for Sides {
    type Output = Sides;

    fn add(self, rhs: Sides) -> Sides {
        Sides {
            left: self.left + rhs.left,
            right: self.right + rhs.right,
            top: self.top + rhs.top,
            bottom: self.bottom + rhs.bottom,
        }
    }
}

impl std::ops::Div<f64> for Sides {
    type Output = Sides;

    fn div(self, rhs: f64) -> Sides {
        Sides {
            left: self.left / rhs,
            right: self.right / rhs,
            top: self.top / rhs,
            bottom: self.bottom / rhs,
        }
    }
}

impl std::ops::Div for Sides {
    type Output = Sides;

    fn div(self, rhs: Sides) -> Sides {
        Sides {
            left: self.left / rhs.left,
            right: self.right / rhs.right,
            top: self.top / rhs.top,
            bottom: self.bottom / rhs.bottom,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn checked_accepts_valid_crop() {
        let s = Sides::checked(0.1, 0.2, 0.3, 0.4).expect("valid crop");
        assert_eq!(s.left, 0.1);
        assert_eq!(s.bottom, 0.4);
    }

    #[test]
    fn checked_rejects_full_axis_crop() {
        assert!(Sides::checked(0.6, 0.4, 0.0, 0.0).is_err());
        assert!(Sides::checked(0.0, 0.0, 0.5, 0.5).is_err());
    }

    #[test]
    fn checked_rejects_out_of_range_component() {
        assert!(Sides::checked(-0.1, 0.0, 0.0, 0.0).is_err());
        assert!(Sides::checked(0.0, 1.0, 0.0, 0.0).is_err());
        assert!(Sides::checked(0.0, 0.0, f64::NAN, 0.0).is_err());
    }

    #[test]
    fn rotated_once_permutes_edges() {
        let s = Sides::new(0.1, 0.2, 0.3, 0.4);
        let r = s.rotated(1);
        assert_eq!(r, Sides::new(0.4, 0.3, 0.1, 0.2));
    }

    #[test]
    fn rotated_twice_swaps_opposite_edges() {
        let s = Sides::new(0.1, 0.2, 0.3, 0.4);
        let r = s.rotated(2);
        assert_eq!(r, Sides::new(0.2, 0.1, 0.4, 0.3));
    }

    #[test]
    fn rotated_four_times_is_identity() {
        let s = Sides::new(0.1, 0.2, 0.3, 0.4);
        assert_eq!(s.rotated(4), s);
        assert_eq!(s.rotated(8), s);
    }

    #[test]
    fn rotated_reduces_modulo_four() {
        let s = Sides::new(0.1, 0.2, 0.3, 0.4);
        assert_eq!(s.rotated(5), s.rotated(1));
        assert_eq!(s.rotated(7), s.rotated(3));
    }

    #[test]
    fn add_and_div_are_component_wise() {
        let a = Sides::new(0.1, 0.2, 0.3, 0.4);
        let b = Sides::new(0.1, 0.1, 0.1, 0.1);
        assert_eq!(a + b, Sides::new(0.2, 0.3, 0.4, 0.5));
        assert_eq!(b / 2.0, Sides::new(0.05, 0.05, 0.05, 0.05));
        let q = a / Sides::new(0.1, 0.2, 0.3, 0.4);
        assert!((q.left - 1.0).abs() < 1e-12);
        assert!((q.bottom - 1.0).abs() < 1e-12);
    }

    #[test]
    fn dims_swap_and_scale() {
        let d = Dims::new(100.0, 200.0);
        assert_eq!(d.swapped(), Dims::new(200.0, 100.0));
        assert!(d.scaled(1.5).approx_eq(Dims::new(150.0, 300.0)));
    }
}
