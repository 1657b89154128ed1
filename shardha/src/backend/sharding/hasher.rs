//! 64-bit MurmurHash2 (MurmurHash64A).

/// Seed used for every key and ring point.
pub const SEED: u32 = 0x1234ABCD;

const M: u64 = 0xc6a4a793_5bd1e995;
const R: u32 = 47;

/// Hash bytes with MurmurHash64A, reading blocks little-endian.
///
/// The result is compared as a signed integer on the ring, so it's
/// returned as one.
pub fn murmur64a(key: &[u8], seed: u32) -> i64 {
    let mut h = (seed as u64) ^ (key.len() as u64).wrapping_mul(M);

    let mut chunks = key.chunks_exact(8);
    for chunk in &mut chunks {
        let mut block = [0u8; 8];
        block.copy_from_slice(chunk);

        let mut k = u64::from_le_bytes(block);
        k = k.wrapping_mul(M);
        k ^= k >> R;
        k = k.wrapping_mul(M);

        h ^= k;
        h = h.wrapping_mul(M);
    }

    let tail = chunks.remainder();
    if !tail.is_empty() {
        let mut block = [0u8; 8];
        block[..tail.len()].copy_from_slice(tail);
        h ^= u64::from_le_bytes(block);
        h = h.wrapping_mul(M);
    }

    h ^= h >> R;
    h = h.wrapping_mul(M);
    h ^= h >> R;

    h as i64
}

/// Hash a key with the ring seed.
pub fn hash(key: &[u8]) -> i64 {
    murmur64a(key, SEED)
}
