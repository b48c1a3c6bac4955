//! Parallel iteration abstraction for WASM compatibility.
//!
//! This module provides conditional parallel/sequential iteration based on
//! the `parallel` feature flag. On native targets with the `parallel` feature,
//! uses rayon for multi-threaded execution. On WASM or without the feature,
//! falls back to sequential iteration.
//!
//! # Usage
//!
//! Use the `iter_maybe_parallel!` macro to conditionally parallelize iteration:
//!
//! ```ignore
//! use crate::parallel::iter_maybe_parallel;
//!
//! let maps: Vec<_> = iter_maybe_parallel!((0..workers))
//!     .map(|w| aggregate_segment(w))
//!     .collect();
//! ```

/// Macro for conditionally parallel iteration over ranges.
///
/// When the `parallel` feature is enabled, uses `into_par_iter()`.
/// Otherwise, uses `into_iter()` for sequential execution.
///
/// # Examples
///
/// ```ignore
/// use crate::iter_maybe_parallel;
///
/// let results: Vec<_> = iter_maybe_parallel!((0..100))
///     .map(|i| i * 2)
///     .collect();
/// ```
#[macro_export]
macro_rules! iter_maybe_parallel {
    ($expr:expr) => {{
        #[cfg(feature = "parallel")]
        {
            use rayon::iter::IntoParallelIterator;

            IntoParallelIterator::into_par_iter($expr)
        }
        #[cfg(not(feature = "parallel"))]
        {
            IntoIterator::into_iter($expr)
        }
    }};
}

/// Macro for conditionally parallel reference iteration over slices.
///
/// When the `parallel` feature is enabled, uses `par_iter()`.
/// Otherwise, uses `iter()` for sequential execution.
#[macro_export]
macro_rules! slice_maybe_parallel {
    ($expr:expr) => {{
        #[cfg(feature = "parallel")]
        {
            use rayon::prelude::*;
            $expr.par_iter()
        }
        #[cfg(not(feature = "parallel"))]
        {
            $expr.iter()
        }
    }};
}

// Re-export macros at module level
pub use iter_maybe_parallel;
pub use slice_maybe_parallel;
