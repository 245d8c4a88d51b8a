//! Named constants for the engine, analogous to [`crate::consts`] in the
//! teacher crate this workspace is grounded on: every tunable spec.md
//! hardcodes lives here as a `pub const` rather than scattered through the
//! modules that consume it.

/// Machine word width in bits, used by the exponent-vector packer.
pub const WORD_BITS: u32 = 64;

/// Initial per-variable exponent field width, in bits (including the
/// reserved sentinel bit). Doubled by the repack-retry loop in [`crate::ev`]
/// and [`crate::heap`] whenever a field would overflow.
pub const INITIAL_FIELD_BITS: u32 = 8;

/// Alignment boundary (in bits) that a repacked field width is rounded up
/// to, per spec.md §3.2 ("round_up(2b, FIELD_ALIGN)").
pub const FIELD_ALIGN: u32 = 8;

/// Ceiling on a single packed exponent field; fields wider than this would
/// require a field to span more than one machine word, which this
/// implementation does not support (see DESIGN.md, "Field width cap").
pub const MAX_FIELD_BITS: u32 = 64;

/// Threshold on the product of per-variable exponent bounds below which the
/// dense array engine ([`crate::array`]) is used instead of the heap engine.
pub const MAX_ARRAY: u64 = 300_000;

/// Blocking factor for the dense array engine's nested multiply loop.
pub const BLOCK: usize = 128;

/// Base term for the GCD estimator's direct-lookup-table memory cap
/// (`total_limit = max(BASE, length / DIVISOR)`), taken verbatim from
/// `fmpz_mpoly_evals` in `original_source/fmpz_mpoly/gcd.c`.
pub const GCD_ESTIMATOR_LUT_LIMIT_BASE: u64 = 9_999;

/// Divisor applied to a polynomial's term count when deriving the LUT
/// memory cap (see [`GCD_ESTIMATOR_LUT_LIMIT_BASE`]).
pub const GCD_ESTIMATOR_LUT_LIMIT_DIVISOR: u64 = 256;
