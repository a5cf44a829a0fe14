//! 32-bit wrapping sequence numbers.
//!
//! TCP sequence numbers are 32 bits and wrap around, while the stream they
//! describe is indexed by an unbounded 64-bit offset.  [`WrappingInt32`] is
//! the on-the-wire form; [`wrap`] and [`unwrap`] convert between the two.
//! `unwrap` is ambiguous on its own (every wire value names infinitely many
//! absolute offsets, one per 2^32 cycle), so it takes a `checkpoint`: a
//! recent absolute offset, and returns the candidate closest to it.

use std::fmt;

const CYCLE: u64 = 1 << 32;
const HALF_CYCLE: u64 = 1 << 31;

/// A 32-bit sequence number that wraps around modulo 2^32.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq, Hash)]
pub struct WrappingInt32(u32);

impl WrappingInt32 {
    pub fn new(raw: u32) -> Self {
        Self(raw)
    }

    /// The underlying wire value.
    pub fn raw_value(self) -> u32 {
        self.0
    }

    /// Advance by `n` sequence numbers, wrapping modulo 2^32.
    pub fn wrapping_add(self, n: u32) -> Self {
        Self(self.0.wrapping_add(n))
    }

    /// Step back by `n` sequence numbers, wrapping modulo 2^32.
    pub fn wrapping_sub(self, n: u32) -> Self {
        Self(self.0.wrapping_sub(n))
    }
}

impl fmt::Display for WrappingInt32 {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Map an absolute 64-bit stream offset to a wire sequence number.
///
/// The absolute offset 0 corresponds to the ISN itself (the SYN).
pub fn wrap(n: u64, isn: WrappingInt32) -> WrappingInt32 {
    WrappingInt32(isn.0.wrapping_add(n as u32))
}

/// Map a wire sequence number back to an absolute 64-bit stream offset.
///
/// Among all absolute offsets `a >= 0` with `wrap(a, isn) == n`, returns the
/// one minimising `|a - checkpoint|`.  A tie (the two candidates are exactly
/// 2^31 apart from the checkpoint) resolves to the larger candidate.  The
/// result never underflows below zero: when the checkpoint sits in the first
/// cycle, the candidate one cycle down does not exist and the in-cycle value
/// wins regardless of distance.
pub fn unwrap(n: WrappingInt32, isn: WrappingInt32, checkpoint: u64) -> u64 {
    let offset = u64::from(n.0.wrapping_sub(isn.0));
    let base = (checkpoint & !(CYCLE - 1)) | offset;

    // Signed distance from the candidate to the checkpoint.  `base` shares
    // the checkpoint's upper 32 bits, so the true difference fits in i64.
    let d = checkpoint.wrapping_sub(base) as i64;

    if d >= HALF_CYCLE as i64 {
        base + CYCLE
    } else if d < -(HALF_CYCLE as i64) && base >= CYCLE {
        base - CYCLE
    } else {
        base
    }
}

// ---------------------------------------------------------------------------
// Unit tests
// ---------------------------------------------------------------------------
