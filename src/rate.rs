//! Exact rational time.
//!
//! Every beat duration is a [`Rate`]: a fraction of one reference beat. Keeping
//! durations as integer fractions means a sheet can be converted between formats
//! with different rhythmic resolutions without drift.

use std::fmt;

use crate::error::SheetError;

/// A fraction `a / b` with `b != 0`.
///
/// `Rate` is a small mutable value. [`Rate::simplify`] reduces it in place and
/// returns the reduced copy; callers that need the original fraction should keep
/// their own copy first (it is `Copy`).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Rate {
    a: i64,
    b: i64,
}

impl Default for Rate {
    fn default() -> Self {
        Self { a: 1, b: 1 }
    }
}

impl Rate {
    /// Create `a / b`.
    ///
    /// ```
    /// # use sheets::Rate;
    /// assert!(Rate::new(3, 4).is_ok());
    /// assert!(Rate::new(3, 0).is_err());
    /// ```
    pub fn new(a: i64, b: i64) -> Result<Self, SheetError> {
        if b == 0 {
            return Err(zero_denominator());
        }
        Ok(Self { a, b })
    }

    /// `n / 1`
    pub fn whole(n: i64) -> Self {
        Self { a: n, b: 1 }
    }

    pub fn numerator(&self) -> i64 {
        self.a
    }

    pub fn denominator(&self) -> i64 {
        self.b
    }

    pub fn set_numerator(&mut self, a: i64) {
        self.a = a;
    }

    pub fn set_denominator(&mut self, b: i64) -> Result<(), SheetError> {
        if b == 0 {
            return Err(zero_denominator());
        }
        self.b = b;
        Ok(())
    }

    /// Reduce the fraction in place by the greatest common divisor and return the result.
    ///
    /// The sign ends up on the numerator, so the reduced denominator is always positive.
    ///
    /// ```
    /// # use sheets::Rate;
    /// let mut rate = Rate::new(480, 500).unwrap();
    /// let reduced = rate.simplify();
    /// assert_eq!((reduced.numerator(), reduced.denominator()), (24, 25));
    /// assert_eq!(rate, reduced);
    /// ```
    pub fn simplify(&mut self) -> Rate {
        let mut divisor = gcd(self.a, self.b);
        if self.b < 0 {
            divisor = -divisor;
        }
        self.a /= divisor;
        self.b /= divisor;
        *self
    }

    /// The reduced form, leaving `self` untouched.
    pub fn simplified(&self) -> Rate {
        let mut copy = *self;
        copy.simplify()
    }
}

impl fmt::Display for Rate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.a, self.b)
    }
}

/// Euclid on absolute values; `gcd(x, 0) == x`.
fn gcd(a: i64, b: i64) -> i64 {
    let (a, b) = (a.abs(), b.abs());
    let mut big = a.max(b);
    let mut small = a.min(b);
    while small != 0 {
        let temp = small;
        small = big % small;
        big = temp;
    }
    big
}

fn zero_denominator() -> SheetError {
    SheetError::Range("The denominator cannot be zero".to_string())
}
