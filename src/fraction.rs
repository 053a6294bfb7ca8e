//! # fraction
//!
//! Exact rationals for writing prices into a book.
//!
//! GnuCash stores price values as `numerator/denominator`. A quote arrives as an
//! `f64`, so `45.235` is really `45.2349999999999994315658113919198513031005859375`.
//! Writing that out exactly would be silly, so the value is replaced by the closest
//! fraction whose denominator stays under a bound, which gives `9047/200`.

use std::fmt;

/// Denominator bound used for prices.
pub const MAX_DENOMINATOR: u128 = 1_000_000;

/// A reduced fraction. The sign is kept apart from the magnitude.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Fraction {
    negative: bool,
    numer: u128,
    denom: u128,
}

impl Fraction {
    /// The exact value of `value`.
    /// Returns None for NaN, infinities and values too large or too small to fit.
    pub fn from_f64(value: f64) -> Option<Self> {
        if !value.is_finite() {
            return None;
        }
        if value == 0.0 {
            return Some(Self { negative: false, numer: 0, denom: 1 });
        }

        let bits = value.to_bits();
        let negative = bits >> 63 == 1;
        let biased = ((bits >> 52) & 0x7ff) as i32;
        let fraction = bits & ((1u64 << 52) - 1);

        // value = mantissa * 2^exp
        let (mut mantissa, mut exp) = if biased == 0 {
            (fraction, -1074)
        } else {
            (fraction | (1u64 << 52), biased - 1075)
        };
        let zeros = mantissa.trailing_zeros();
        mantissa >>= zeros;
        exp += zeros as i32;

        let mantissa = mantissa as u128;
        if exp >= 0 {
            if exp as u32 > mantissa.leading_zeros() {
                return None;
            }
            Some(Self { negative, numer: mantissa << exp, denom: 1 })
        } else {
            // mantissa is odd here, so this is already in lowest terms
            let denom = 1u128.checked_shl(exp.unsigned_abs())?;
            Some(Self { negative, numer: mantissa, denom })
        }
    }

    /// Closest fraction to `value` with a denominator of at most `max`.
    ///
    /// Values too small for [`Fraction::from_f64`] (under 2^-74) come out as zero,
    /// which is where any bound up to 2^64 puts them.
    pub fn approximate(value: f64, max: u128) -> Option<Self> {
        match Self::from_f64(value) {
            Some(exact) => Some(exact.limit_denominator(max)),
            None if value.is_finite() && value.abs() < 1.0 => {
                Some(Self { negative: false, numer: 0, denom: 1 })
            }
            None => None,
        }
    }

    /// Closest fraction to `self` with a denominator of at most `max`.
    ///
    /// Walks the continued fraction expansion until the next convergent would break
    /// the bound, then picks between the last convergent and the best semiconvergent.
    pub fn limit_denominator(self, max: u128) -> Self {
        let max = max.max(1);
        if self.denom <= max {
            return self;
        }

        let (mut p0, mut q0, mut p1, mut q1) = (0u128, 1u128, 1u128, 0u128);
        let (mut n, mut d) = (self.numer, self.denom);
        while d != 0 {
            let a = n / d;
            let q2 = match a.checked_mul(q1).and_then(|aq| aq.checked_add(q0)) {
                Some(q2) if q2 <= max => q2,
                _ => break,
            };
            (p0, q0, p1, q1) = (p1, q1, p0 + a * p1, q2);
            (n, d) = (d, n - a * d);
        }

        let k = (max - q0) / q1;
        let semi = (p0 + k * p1, q0 + k * q1);

        // The two candidates sit on either side of the exact value and are
        // 1 / (q1 * semi.1) apart. The convergent p1/q1 misses by d / (q1 * denom),
        // so it is at least as close when 2 * d * semi.1 <= denom.
        let convergent_wins = d
            .checked_mul(semi.1)
            .and_then(|x| x.checked_mul(2))
            .is_some_and(|x| x <= self.denom);

        let (numer, denom) = if convergent_wins { (p1, q1) } else { semi };
        Self { negative: self.negative && numer != 0, numer, denom }
    }
}

impl fmt::Display for Fraction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.negative {
            write!(f, "-")?;
        }
        if self.denom == 1 {
            write!(f, "{}", self.numer)
        } else {
            write!(f, "{}/{}", self.numer, self.denom)
        }
    }
}
