use thiserror::Error;

pub const MIN_COUNT: usize = 1;
pub const MAX_COUNT: usize = 1000;
/// Used whenever the caller asks for zero or a negative number of samples.
pub const DEFAULT_COUNT: usize = 5;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum BoundsError {
    #[error("minimum count must be at least 1")]
    ZeroMinimum,
    #[error("maximum count {max} is below minimum count {min}")]
    Inverted { min: usize, max: usize },
    #[error("default count {default} lies outside [{min}, {max}]")]
    DefaultOutOfRange {
        min: usize,
        max: usize,
        default: usize,
    },
}

/// Limits applied to the caller-requested sample count.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CountBounds {
    min: usize,
    max: usize,
    default: usize,
}

impl Default for CountBounds {
    fn default() -> Self {
        Self {
            min: MIN_COUNT,
            max: MAX_COUNT,
            default: DEFAULT_COUNT,
        }
    }
}

impl CountBounds {
    pub fn new(min: usize, max: usize, default: usize) -> Result<Self, BoundsError> {
        if min == 0 {
            return Err(BoundsError::ZeroMinimum);
        }
        if max < min {
            return Err(BoundsError::Inverted { min, max });
        }
        if !(min..=max).contains(&default) {
            return Err(BoundsError::DefaultOutOfRange { min, max, default });
        }
        Ok(Self { min, max, default })
    }

    pub fn min(&self) -> usize {
        self.min
    }

    pub fn max(&self) -> usize {
        self.max
    }

    pub fn default_count(&self) -> usize {
        self.default
    }

    /// Clamps `requested` into `[min, max]`; zero and negative requests fall
    /// back to the default count rather than to the minimum.
    pub fn sanitize(&self, requested: i64) -> usize {
        if requested <= 0 {
            return self.default;
        }
        usize::try_from(requested)
            .map(|count| count.clamp(self.min, self.max))
            .unwrap_or(self.max)
    }
}
