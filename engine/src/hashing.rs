//! Deterministic string hashing for bucket assignment
//!
//! Every bucketing decision in the engine (experiment allocation, variant
//! selection) flows through [`hash32`]. The function must return the same
//! value for the same seed forever, across processes and platforms —
//! persisted assignments depend on it.

/// FNV-1a 32-bit offset basis.
const FNV_OFFSET_BASIS: u32 = 0x811c_9dc5;
/// FNV-1a 32-bit prime.
const FNV_PRIME: u32 = 0x0100_0193;

/// Hash a seed string to a non-negative 32-bit integer.
///
/// FNV-1a over the UTF-8 bytes. Total over all inputs, no failure modes.
/// Not cryptographic — bucketing only needs stability and low recompute
/// cost, and the modulo-bias of small-modulus reductions is accepted.
pub fn hash32(seed: &str) -> u32 {
    let mut hash = FNV_OFFSET_BASIS;
    for byte in seed.as_bytes() {
        hash ^= u32::from(*byte);
        hash = hash.wrapping_mul(FNV_PRIME);
    }
    hash
}

/// Reduce a seed into a bucket in `0..modulus`.
///
/// `modulus` must be positive; callers derive it from validated catalog
/// data (allocation is always mod 100, variant selection mod total weight
/// which catalog validation guarantees is > 0).
pub fn bucket(seed: &str, modulus: u32) -> u32 {
    debug_assert!(modulus > 0, "bucket modulus must be positive");
    hash32(seed) % modulus.max(1)
}
