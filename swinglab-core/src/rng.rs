//! Deterministic per-symbol RNG streams.
//!
//! A master seed expands into one sub-seed per `(symbol, stream)` via BLAKE3,
//! so generated series do not depend on the order symbols are requested in or
//! on how many threads ask concurrently.

use rand::rngs::StdRng;
use rand::SeedableRng;

#[derive(Debug, Clone, Copy)]
pub struct SeedTree {
    master_seed: u64,
}

impl SeedTree {
    pub fn new(master_seed: u64) -> Self {
        Self { master_seed }
    }

    pub fn master_seed(&self) -> u64 {
        self.master_seed
    }

    pub fn sub_seed(&self, symbol: &str, stream: &str) -> u64 {
        let mut hasher = blake3::Hasher::new();
        hasher.update(&self.master_seed.to_le_bytes());
        hasher.update(symbol.as_bytes());
        hasher.update(b"/");
        hasher.update(stream.as_bytes());
        let hash = hasher.finalize();
        let mut head = [0u8; 8];
        head.copy_from_slice(&hash.as_bytes()[..8]);
        u64::from_le_bytes(head)
    }

    pub fn rng_for(&self, symbol: &str, stream: &str) -> StdRng {
        StdRng::seed_from_u64(self.sub_seed(symbol, stream))
    }
}
