//! Variation selection seam

use crate::domain::DomainError;

#[cfg(test)]
use mockall::automock;

/// Picks one variation index out of `count` candidates
///
/// Implementations must return an index in `0..count` and fail when
/// `count` is zero.
#[cfg_attr(test, automock)]
pub trait VariationSelector: Send + Sync {
    fn select(&self, count: usize) -> Result<usize, DomainError>;
}
