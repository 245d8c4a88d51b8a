//! Exponent vector packing (spec.md §3.2, §4.2).
//!
//! A monomial in `n` variables is packed into a run of `u64` words, one
//! field per variable (`bits` wide, top bit reserved as the overflow
//! sentinel per invariant EV-1) plus, for graded orderings, a hidden
//! leading field holding the total degree. Fields are stored most
//! significant first so that [`crate::mono::lex_compare_words`] on the
//! (optionally masked) word array implements the ordering directly.
//!
//! Addition is the hot path (the heap engine forms `alpha_i + beta_j` once
//! per scheduled cell) and is implemented as plain multi-limb
//! carry-propagating addition over the packed words — "blind" in the
//! sense that no per-field masking is needed, because a real field
//! overflow manifests as that field's sentinel bit flipping to one, which
//! [`FieldWidth::overflows`] then detects. Subtraction and the
//! divisibility test are comparatively rare (once per emitted quotient
//! term, not once per scheduled heap cell) and are implemented by
//! unpacking both operands and working per field, which keeps their
//! overflow/underflow handling obviously correct.

use crate::error::{PolyError, PolyResult};
use crate::mono::MonomialOrder;
use num_bigint::BigUint;
use num_traits::Zero;

/// A packed monomial: one or more `u64` words laid out per [`FieldWidth`].
/// Callers treat this as an opaque handle produced by [`FieldWidth::pack`]
/// and consumed by [`FieldWidth::unpack`]/[`FieldWidth::add_checked`]/etc.
pub type ExponentVector = Vec<u64>;

/// Shared packing parameters for every monomial of one polynomial.
/// Immutable; a width change (repack) produces a new `FieldWidth`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FieldWidth {
    order: MonomialOrder,
    nvars: usize,
    /// Bits per variable field, including its sentinel bit.
    bits: u32,
    /// Bits in the hidden degree field (0 if the order is ungraded).
    deg_bits: u32,
    sentinel_mask: Vec<u64>,
}

/// Returns the minimal order, `e`, the field with a guard bit needs so that
/// `max_value < 2^(e-1)`.
fn bits_for_magnitude(max_value: u64) -> u32 {
    if max_value == 0 {
        1
    } else {
        64 - max_value.leading_zeros() + 1
    }
}

impl FieldWidth {
    /// Build a field width for `nvars` variables with `bits`-wide
    /// per-variable fields (sentinel bit included) under `order`.
    ///
    /// Panics if `bits` is out of range. Only call this with a bit width
    /// that is known in advance to be valid (a fixed literal, or one
    /// already accepted by a prior call) — the width-doubling retry path
    /// that can organically grow past [`crate::config::MAX_FIELD_BITS`] on
    /// valid polynomial input uses [`FieldWidth::try_new`] instead.
    pub fn new(order: MonomialOrder, nvars: usize, bits: u32) -> Self {
        Self::try_new(order, nvars, bits).expect("bits out of range for a fixed-width caller")
    }

    /// Fallible form of [`FieldWidth::new`]: a single packed field spans at
    /// most one machine word (spec.md §3.2's narrower, single-word-field
    /// variant — see DESIGN.md, "Field width cap"), so a `bits` value
    /// outside `2..=MAX_FIELD_BITS` reports
    /// [`crate::error::PolyError::CapacityExceeded`] rather than panicking.
    pub fn try_new(order: MonomialOrder, nvars: usize, bits: u32) -> PolyResult<Self> {
        if !(2..=crate::config::MAX_FIELD_BITS).contains(&bits) {
            return Err(PolyError::CapacityExceeded);
        }
        Ok(Self::build(order, nvars, bits))
    }

    fn build(order: MonomialOrder, nvars: usize, bits: u32) -> Self {
        let deg_bits = if order.is_graded() {
            let max_per_field = (1u64 << (bits - 1)) - 1;
            let max_degree = max_per_field.saturating_mul(nvars as u64);
            bits_for_magnitude(max_degree).max(bits)
        } else {
            0
        };
        let mut fw = FieldWidth {
            order,
            nvars,
            bits,
            deg_bits,
            sentinel_mask: Vec::new(),
        };
        fw.sentinel_mask = fw.compute_sentinel_mask();
        fw
    }

    pub fn order(&self) -> MonomialOrder {
        self.order
    }

    pub fn nvars(&self) -> usize {
        self.nvars
    }

    pub fn bits(&self) -> u32 {
        self.bits
    }

    fn total_bits(&self) -> u32 {
        self.deg_bits + self.bits * self.nvars as u32
    }

    /// Number of `u64` words a packed monomial occupies under this width.
    pub fn nwords(&self) -> usize {
        ((self.total_bits() + 63) / 64) as usize
    }

    /// The field order monomials are physically stored in: degree first
    /// (if graded), then variables. `DegRevLex` stores variables in
    /// reverse index order and XORs them at comparison time so a plain
    /// lexicographic compare on the stored words implements "reverse
    /// lex among equal-degree monomials, smallest trailing exponent
    /// wins".
    fn storage_var_index(&self, j: usize) -> usize {
        match self.order {
            MonomialOrder::DegRevLex => self.nvars - 1 - j,
            _ => j,
        }
    }

    fn compute_sentinel_mask(&self) -> Vec<u64> {
        let nwords = self.nwords();
        let mut mask = vec![0u64; nwords];
        let total = self.total_bits();
        let mut set_bit = |global_bit: u32, mask: &mut Vec<u64>| {
            let word = (global_bit / 64) as usize;
            let bit_in_word = 63 - (global_bit % 64);
            mask[word] |= 1u64 << bit_in_word;
        };
        // Global bit offsets count from the MSB of word 0.
        let pad = nwords as u32 * 64 - total;
        let mut cursor = pad; // skip leading padding bits (always zero, harmless)
        if self.deg_bits > 0 {
            set_bit(cursor, &mut mask);
            cursor += self.deg_bits;
        }
        for _ in 0..self.nvars {
            set_bit(cursor, &mut mask);
            cursor += self.bits;
        }
        mask
    }

    /// The xor mask applied before a lexicographic word comparison
    /// (contract MO-1). Only `DegRevLex` needs a non-zero mask, flipping
    /// every variable field so ascending packed order matches "reverse
    /// lex, smaller wins".
    pub fn cmp_mask(&self) -> Vec<u64> {
        if self.order != MonomialOrder::DegRevLex {
            return vec![0u64; self.nwords()];
        }
        let nwords = self.nwords();
        let mut mask = vec![0u64; nwords];
        let total = self.total_bits();
        let pad = nwords as u32 * 64 - total;
        let mut cursor = pad + self.deg_bits;
        let mut set_range = |start: u32, width: u32, mask: &mut Vec<u64>| {
            for b in start..start + width {
                let word = (b / 64) as usize;
                let bit_in_word = 63 - (b % 64);
                mask[word] |= 1u64 << bit_in_word;
            }
        };
        for _ in 0..self.nvars {
            set_range(cursor, self.bits - 1, &mut mask); // flip everything but the sentinel bit
            cursor += self.bits;
        }
        mask
    }

    /// Pack a variable-exponent vector (length `nvars`) into words.
    pub fn pack(&self, vars: &[u64]) -> Vec<u64> {
        assert_eq!(vars.len(), self.nvars);
        let mut ordered = vec![0u64; self.nvars];
        for j in 0..self.nvars {
            ordered[self.storage_var_index(j)] = vars[j];
        }
        let degree: u64 = vars.iter().sum();
        let mut acc = BigUint::zero();
        if self.deg_bits > 0 {
            acc = (acc << self.deg_bits) | BigUint::from(degree);
        }
        for &v in &ordered {
            acc = (acc << self.bits) | BigUint::from(v);
        }
        biguint_to_words(&acc, self.nwords())
    }

    /// Unpack the variable-exponent vector (length `nvars`) from words.
    pub fn unpack(&self, words: &[u64]) -> Vec<u64> {
        let acc = words_to_biguint(words);
        let mask: BigUint = (BigUint::from(1u64) << self.bits) - BigUint::from(1u64);
        let mut ordered = vec![0u64; self.nvars];
        let mut shift = 0u32;
        for slot in (0..self.nvars).rev() {
            let field = (&acc >> shift) & &mask;
            ordered[slot] = biguint_to_u64(&field);
            shift += self.bits;
        }
        let mut vars = vec![0u64; self.nvars];
        for j in 0..self.nvars {
            vars[j] = ordered[self.storage_var_index(j)];
        }
        vars
    }

    /// Extract the total degree of a packed monomial.
    pub fn degree(&self, words: &[u64]) -> u64 {
        if self.deg_bits > 0 {
            let acc = words_to_biguint(words);
            let var_bits = self.bits as u32 * self.nvars as u32;
            let mask: BigUint = (BigUint::from(1u64) << self.deg_bits) - BigUint::from(1u64);
            let field = (&acc >> var_bits) & &mask;
            biguint_to_u64(&field)
        } else {
            self.unpack(words).iter().sum()
        }
    }

    /// True iff any field's sentinel bit is set (EV-1: a canonical
    /// monomial never has this).
    pub fn overflows(&self, words: &[u64]) -> bool {
        words
            .iter()
            .zip(self.sentinel_mask.iter())
            .any(|(w, m)| w & m != 0)
    }

    /// Blind multi-limb addition (see module docs). Returns `None` if the
    /// result overflows a field (EV-1), signalling the caller must widen
    /// `bits` and retry.
    pub fn add_checked(&self, a: &[u64], b: &[u64]) -> Option<Vec<u64>> {
        let n = a.len();
        debug_assert_eq!(n, b.len());
        let mut out = vec![0u64; n];
        let mut carry: u128 = 0;
        for k in (0..n).rev() {
            let sum = a[k] as u128 + b[k] as u128 + carry;
            out[k] = sum as u64;
            carry = sum >> 64;
        }
        if self.overflows(&out) {
            None
        } else {
            Some(out)
        }
    }

    /// Componentwise subtraction `v - u` via unpack (see module docs).
    /// Returns `None` if any field (or the degree) of `v` is smaller than
    /// the corresponding field of `u` — the monomial does not divide.
    pub fn sub_checked(&self, v: &[u64], u: &[u64]) -> Option<Vec<u64>> {
        let vv = self.unpack(v);
        let uu = self.unpack(u);
        let mut diff = vec![0u64; self.nvars];
        for j in 0..self.nvars {
            if vv[j] < uu[j] {
                return None;
            }
            diff[j] = vv[j] - uu[j];
        }
        Some(self.pack(&diff))
    }

    /// `divides(u, v)`: true and the quotient monomial `v - u` iff every
    /// field of `v - u` is non-negative (contract MO-1).
    pub fn divides(&self, u: &[u64], v: &[u64]) -> Option<Vec<u64>> {
        self.sub_checked(v, u)
    }

    /// Per-variable maxima across `len` packed monomials stored
    /// contiguously in `exps`.
    pub fn degrees(&self, exps: &[u64], len: usize) -> Vec<u64> {
        let nw = self.nwords();
        let mut maxima = vec![0u64; self.nvars];
        for i in 0..len {
            let word = &exps[i * nw..(i + 1) * nw];
            let vars = self.unpack(word);
            for j in 0..self.nvars {
                maxima[j] = maxima[j].max(vars[j]);
            }
        }
        maxima
    }

    /// Re-pack `len` monomials from this width to `new_bits`, preserving
    /// values (spec.md §4.2 `repack`).
    pub fn repack_all(&self, exps: &[u64], len: usize, new_bits: u32) -> (FieldWidth, Vec<u64>) {
        let new_width = FieldWidth::new(self.order, self.nvars, new_bits);
        let nw_old = self.nwords();
        let nw_new = new_width.nwords();
        let mut out = vec![0u64; len * nw_new];
        for i in 0..len {
            let old_word = &exps[i * nw_old..(i + 1) * nw_old];
            let vars = self.unpack(old_word);
            let packed = new_width.pack(&vars);
            out[i * nw_new..(i + 1) * nw_new].copy_from_slice(&packed);
        }
        (new_width, out)
    }

    /// The next width to retry at after an overflow, per spec.md §3.2's
    /// width policy: `round_up(2*bits, FIELD_ALIGN)`.
    pub fn widened(&self) -> u32 {
        let doubled = self.bits.saturating_mul(2);
        let align = crate::config::FIELD_ALIGN;
        doubled.div_ceil(align) * align
    }
}

fn biguint_to_words(v: &BigUint, nwords: usize) -> Vec<u64> {
    let digits = v.to_u64_digits(); // little-endian u64 limbs
    let mut out = vec![0u64; nwords];
    for (i, d) in digits.iter().enumerate() {
        if i >= nwords {
            break;
        }
        out[nwords - 1 - i] = *d;
    }
    out
}

fn words_to_biguint(words: &[u64]) -> BigUint {
    let digits: Vec<u64> = words.iter().rev().copied().collect();
    BigUint::from_slice(&digits_to_u32(&digits))
}

fn digits_to_u32(limbs_le_u64: &[u64]) -> Vec<u32> {
    let mut out = Vec::with_capacity(limbs_le_u64.len() * 2);
    for &l in limbs_le_u64 {
        out.push(l as u32);
        out.push((l >> 32) as u32);
    }
    out
}

fn biguint_to_u64(v: &BigUint) -> u64 {
    let digits = v.to_u64_digits();
    digits.first().copied().unwrap_or(0)
}
