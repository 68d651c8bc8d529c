use bytes::Bytes;
use ibed_core::{ContentKey, Fingerprint};

/// Generate deterministic test data using a seeded pseudo-random generator.
/// Same seed produces same output.
pub fn seeded_bytes(seed: u64, len: usize) -> Bytes {
    let mut data = vec![0u8; len];
    let mut state = seed;

    // Simple LCG (Linear Congruential Generator)
    for chunk in data.chunks_mut(8) {
        state = state.wrapping_mul(6364136223846793005).wrapping_add(1);
        let bytes = state.to_le_bytes();
        for (i, byte) in chunk.iter_mut().enumerate() {
            *byte = bytes[i % 8];
        }
    }

    Bytes::from(data)
}

/// Content key for `data` with the given extension.
#[allow(dead_code)]
pub fn key_for(data: &[u8], ext: &str) -> ContentKey {
    ContentKey::new(Fingerprint::compute(data), Some(ext)).expect("valid extension")
}
