//! Execution limits for a VM run.

use std::fmt;

use crate::exception::{ExcType, RunError};

/// Default maximum call depth, matching CPython's default recursion limit.
pub const DEFAULT_MAX_RECURSION_DEPTH: usize = 1000;

/// Largest buffer, in bytes, that sequence repetition or materializing an iterable may
/// request. Larger requests raise `MemoryError` instead of allocating.
pub const MAX_SEQUENCE_BYTES: usize = 1 << 30;

/// Limits applied while running code.
///
/// Built with a consuming builder:
///
/// ```
/// use pyframe::ResourceLimits;
///
/// let limits = ResourceLimits::new().max_recursion_depth(Some(50));
/// assert_eq!(limits.recursion_limit(), Some(50));
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ResourceLimits {
    max_recursion_depth: Option<usize>,
}

impl Default for ResourceLimits {
    fn default() -> Self {
        Self {
            max_recursion_depth: Some(DEFAULT_MAX_RECURSION_DEPTH),
        }
    }
}

impl ResourceLimits {
    /// Limits with the defaults applied.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the maximum number of frames on the call stack. `None` removes the limit, leaving
    /// only the host stack as a bound.
    #[must_use]
    pub fn max_recursion_depth(mut self, depth: Option<usize>) -> Self {
        self.max_recursion_depth = depth;
        self
    }

    #[must_use]
    pub fn recursion_limit(&self) -> Option<usize> {
        self.max_recursion_depth
    }

    /// Checks whether pushing one more frame onto a stack of `current_depth` frames is allowed.
    pub fn check_recursion_depth(&self, current_depth: usize) -> Result<(), ResourceError> {
        match self.max_recursion_depth {
            Some(limit) if current_depth >= limit => Err(ResourceError::Recursion { limit }),
            _ => Ok(()),
        }
    }
}

/// Checks that a sequence of `items` elements of `item_size` bytes each fits under
/// [`MAX_SEQUENCE_BYTES`].
pub(crate) fn check_sequence_size(items: usize, item_size: usize) -> Result<(), ResourceError> {
    match items.checked_mul(item_size) {
        Some(bytes) if bytes <= MAX_SEQUENCE_BYTES => Ok(()),
        _ => Err(ResourceError::Memory { items }),
    }
}

/// A limit was exceeded.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ResourceError {
    Recursion { limit: usize },
    /// A sequence of `items` elements would exceed [`MAX_SEQUENCE_BYTES`].
    Memory { items: usize },
}

impl fmt::Display for ResourceError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Recursion { limit } => write!(f, "maximum recursion depth ({limit}) exceeded"),
            Self::Memory { items } => write!(f, "sequence of {items} items exceeds {MAX_SEQUENCE_BYTES} bytes"),
        }
    }
}

impl std::error::Error for ResourceError {}

impl From<ResourceError> for RunError {
    fn from(err: ResourceError) -> Self {
        match err {
            ResourceError::Recursion { .. } => ExcType::recursion_error(),
            ResourceError::Memory { items } => ExcType::memory_error(items),
        }
    }
}
