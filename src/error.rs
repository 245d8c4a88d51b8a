//! Crate-level error taxonomy.
//!
//! Only the error kinds spec.md §7 marks "surface immediately" or "surfaces
//! as a type error" become [`PolyError`] variants. `ExponentOverflow` and
//! `Unable` are internal control-flow signals caught inside their owning
//! component ([`crate::heap`]/[`crate::array`]/[`crate::arith`]/
//! [`crate::divides`] for the former, [`crate::gcd`] for the latter) and
//! never escape as errors. `NotExact` from `divides`/`divrem` is a normal
//! value (a `bool` or a quotient/remainder pair), not an error.

use thiserror::Error;

/// Errors surfaced by public polynomial operations.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum PolyError {
    /// The divisor polynomial is empty (spec.md §4.8 DD step 1).
    #[error("division by zero: divisor polynomial is empty")]
    DivideByZero,

    /// Two operands declare a different number of variables.
    #[error("polynomial arity mismatch: {0} vs {1}")]
    ArityMismatch(usize, usize),

    /// Two operands were built under different monomial orderings.
    #[error("polynomial ordering mismatch")]
    OrderMismatch,

    /// A length or capacity computation overflowed `usize`.
    #[error("allocation capacity exceeded")]
    CapacityExceeded,

    /// `divexact` was asked to divide non-exactly; spec.md §7 requires this
    /// to "surface as a type error" rather than return a boolean.
    #[error("inexact division: divisor does not divide the dividend")]
    NotExact,
}

/// Convenience alias used throughout the crate's public API.
pub type PolyResult<T> = Result<T, PolyError>;
