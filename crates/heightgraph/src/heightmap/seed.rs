//! Deterministic seed mixing for tile and cell level randomness.
use super::grid::TileId;

/// Creates a deterministic seed for a tile from a base seed.
pub fn seed_for_tile(base_seed: u64, tile: TileId) -> u64 {
    let tx = tile.0 as u64;
    let ty = tile.1 as u64;
    let mixed =
        base_seed ^ tx.wrapping_mul(0x9E3779B97F4A7C15) ^ ty.wrapping_mul(0xBF58476D1CE4E5B9);
    mix_u64(mixed)
}

/// Hashes an integer lattice point; independent of tiling.
pub fn hash_cell(seed: u64, i: i64, j: i64) -> u64 {
    let mixed = seed
        ^ (i as u64).wrapping_mul(0x9E3779B97F4A7C15)
        ^ (j as u64).wrapping_mul(0xC2B2AE3D27D4EB4F);
    mix_u64(mix_u64(mixed))
}

/// Maps a hash onto `[0, 1)`.
#[inline]
pub fn unit_from_hash(h: u64) -> f32 {
    (h >> 40) as f32 / (1u64 << 24) as f32
}

/// splitmix64 finaliser.
#[inline]
pub fn mix_u64(mut x: u64) -> u64 {
    x ^= x >> 30;
    x = x.wrapping_mul(0xBF58476D1CE4E5B9);
    x ^= x >> 27;
    x = x.wrapping_mul(0x94D049BB133111EB);
    x ^ (x >> 31)
}
