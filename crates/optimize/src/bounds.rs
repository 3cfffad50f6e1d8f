use thiserror::Error;

/// Box bounds on the free design variables.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Bounds<const N: usize> {
    lower: [f64; N],
    upper: [f64; N],
}

/// Errors that can occur when constructing bounds.
#[derive(Debug, Error, Clone, Copy, PartialEq)]
pub enum BoundsError {
    #[error("bound {index} is not finite")]
    NotFinite { index: usize },

    #[error("lower bound {index} ({lower}) exceeds upper bound ({upper})")]
    Inverted { index: usize, lower: f64, upper: f64 },

    #[error("expected {expected} bounds, got {found}")]
    Length { expected: usize, found: usize },
}

impl<const N: usize> Bounds<N> {
    /// Creates bounds from lower and upper limits.
    ///
    /// # Errors
    ///
    /// Returns an error if any limit is non-finite or any lower limit exceeds
    /// its upper limit.
    pub fn new(lower: [f64; N], upper: [f64; N]) -> Result<Self, BoundsError> {
        for (index, (lo, hi)) in lower.iter().zip(&upper).enumerate() {
            if !lo.is_finite() || !hi.is_finite() {
                return Err(BoundsError::NotFinite { index });
            }
            if lo > hi {
                return Err(BoundsError::Inverted {
                    index,
                    lower: *lo,
                    upper: *hi,
                });
            }
        }

        Ok(Self { lower, upper })
    }

    /// Creates bounds from slices, checking their length.
    ///
    /// # Errors
    ///
    /// Returns an error if either slice does not have `N` elements, or for any
    /// reason [`Bounds::new`] would.
    pub fn from_slices(lower: &[f64], upper: &[f64]) -> Result<Self, BoundsError> {
        let length = |values: &[f64]| {
            <[f64; N]>::try_from(values).map_err(|_| BoundsError::Length {
                expected: N,
                found: values.len(),
            })
        };

        Self::new(length(lower)?, length(upper)?)
    }

    #[must_use]
    pub fn lower(&self) -> &[f64; N] {
        &self.lower
    }

    #[must_use]
    pub fn upper(&self) -> &[f64; N] {
        &self.upper
    }

    /// Returns `true` if every element of `x` lies within its bounds.
    #[must_use]
    pub fn contains(&self, x: &[f64; N]) -> bool {
        x.iter()
            .zip(self.lower.iter().zip(&self.upper))
            .all(|(xi, (lo, hi))| (lo..=hi).contains(&xi))
    }

    /// Returns `x` with every element clamped into its bounds.
    #[must_use]
    pub fn clamp(&self, x: &[f64; N]) -> [f64; N] {
        std::array::from_fn(|i| x[i].clamp(self.lower[i], self.upper[i]))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rejects_inverted_and_non_finite() {
        assert_eq!(
            Bounds::new([0.0, 5.0], [1.0, 4.0]).unwrap_err(),
            BoundsError::Inverted {
                index: 1,
                lower: 5.0,
                upper: 4.0
            }
        );
        assert_eq!(
            Bounds::new([f64::NAN], [1.0]).unwrap_err(),
            BoundsError::NotFinite { index: 0 }
        );
    }

    #[test]
    fn contains_and_clamp() {
        let bounds = Bounds::new([0.0, -1.0], [1.0, 1.0]).unwrap();

        assert!(bounds.contains(&[0.5, -1.0]));
        assert!(!bounds.contains(&[1.5, 0.0]));
        assert_eq!(bounds.clamp(&[1.5, -3.0]), [1.0, -1.0]);
    }

    #[test]
    fn slices_must_match_dimension() {
        let error = Bounds::<2>::from_slices(&[0.0], &[1.0, 2.0]).unwrap_err();
        assert_eq!(
            error,
            BoundsError::Length {
                expected: 2,
                found: 1
            }
        );
    }
}
