// Symphonia
// Copyright (c) 2019-2022 The Project Symphonia Developers.
//
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Exact rational arithmetic for IMF timing.
//!
//! Track-level time comparisons (current timestamp vs. duration, track
//! selection by least timestamp, resource-boundary lookup) must never be
//! decided using floating point; `Rational` keeps numerator/denominator
//! pairs exact under addition, multiplication, and ordering for as long as
//! the values fit in `i64`.

use std::cmp::Ordering;
use std::fmt;

/// An exact `num/den` pair, always kept with `den > 0`.
#[derive(Copy, Clone, Debug)]
pub struct Rational {
    num: i64,
    den: i64,
}

fn gcd(mut a: i64, mut b: i64) -> i64 {
    while b != 0 {
        let t = b;
        b = a % b;
        a = t;
    }
    a.abs().max(1)
}

impl Rational {
    /// Creates a new rational, reducing to lowest terms and normalizing the
    /// sign so `den > 0`. Panics if `den == 0`; callers at the XML/model
    /// boundary must reject a zero denominator as `InvalidData` before
    /// constructing a `Rational`.
    pub fn new(num: i64, den: i64) -> Self {
        assert!(den != 0, "rational denominator must be non-zero");
        let (mut num, mut den) = if den < 0 { (-num, -den) } else { (num, den) };
        let g = gcd(num, den);
        num /= g;
        den /= g;
        Rational { num, den }
    }

    pub const fn num(&self) -> i64 {
        self.num
    }

    pub const fn den(&self) -> i64 {
        self.den
    }

    pub fn zero() -> Self {
        Rational::new(0, 1)
    }

    /// The reciprocal `den/num`. Used to turn an edit rate into an edit-unit
    /// duration (`1 / edit_rate`).
    pub fn recip(&self) -> Self {
        Rational::new(self.den, self.num)
    }

    /// `self * (scalar / 1)`, exact for any `i64` scalar that doesn't
    /// overflow.
    pub fn checked_mul_int(&self, scalar: i64) -> Option<Self> {
        let num = self.num.checked_mul(scalar)?;
        Some(Rational::new(num, self.den))
    }

    pub fn checked_add(&self, other: &Rational) -> Option<Self> {
        // a/b + c/d = (a*d + c*b) / (b*d)
        let num = self.num.checked_mul(other.den)?.checked_add(other.num.checked_mul(self.den)?)?;
        let den = self.den.checked_mul(other.den)?;
        Some(Rational::new(num, den))
    }

    /// `self - other`, exact. Used to compute the remaining distance to a
    /// track's declared duration when deciding `EndOfStream` vs.
    /// `StreamNotFound` at a resource boundary.
    pub fn checked_sub(&self, other: &Rational) -> Option<Self> {
        // a/b - c/d = (a*d - c*b) / (b*d)
        let num = self.num.checked_mul(other.den)?.checked_sub(other.num.checked_mul(self.den)?)?;
        let den = self.den.checked_mul(other.den)?;
        Some(Rational::new(num, den))
    }

    pub fn to_f64(&self) -> f64 {
        self.num as f64 / self.den as f64
    }
}

impl PartialEq for Rational {
    fn eq(&self, other: &Self) -> bool {
        self.num == other.num && self.den == other.den
    }
}

impl Eq for Rational {}

impl PartialOrd for Rational {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for Rational {
    fn cmp(&self, other: &Self) -> Ordering {
        // Both denominators are positive by construction, so cross
        // multiplication preserves ordering without needing floats. Use
        // i128 to avoid overflow for the cross products.
        let lhs = self.num as i128 * other.den as i128;
        let rhs = other.num as i128 * self.den as i128;
        lhs.cmp(&rhs)
    }
}

impl fmt::Display for Rational {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.num, self.den)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn reduces_to_lowest_terms() {
        let r = Rational::new(48, 24);
        assert_eq!(r.num(), 2);
        assert_eq!(r.den(), 1);
    }

    #[test]
    fn normalizes_negative_denominator() {
        let r = Rational::new(1, -2);
        assert_eq!(r.num(), -1);
        assert_eq!(r.den(), 2);
    }

    #[test]
    fn recip_of_edit_rate_is_edit_unit() {
        let edit_rate = Rational::new(24, 1);
        let eu = edit_rate.recip();
        assert_eq!(eu.num(), 1);
        assert_eq!(eu.den(), 24);
    }

    #[test]
    fn ordering_is_exact_across_denominators() {
        let a = Rational::new(1, 3);
        let b = Rational::new(1, 4);
        assert!(a > b);
        assert!(Rational::new(2, 6) == Rational::new(1, 3));
    }

    #[test]
    fn checked_add_accumulates_durations() {
        let mut total = Rational::zero();
        for _ in 0..48 {
            total = total.checked_add(&Rational::new(1, 24)).unwrap();
        }
        assert_eq!(total, Rational::new(2, 1));
    }

    #[test]
    fn checked_mul_int_scales_duration() {
        let per_unit = Rational::new(1, 24);
        let total = per_unit.checked_mul_int(48).unwrap();
        assert_eq!(total, Rational::new(2, 1));
    }

    #[test]
    fn checked_sub_computes_remaining_distance() {
        let duration = Rational::new(2, 1);
        let current = Rational::new(23, 12);
        let remaining = duration.checked_sub(&current).unwrap();
        assert_eq!(remaining, Rational::new(1, 12));
    }
}
