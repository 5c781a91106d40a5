//! ID generation utilities for Replicator
//!
//! Provides timestamps and unique identifiers for replication jobs.

use rand::Rng;

/// Get current timestamp in milliseconds since Unix epoch
pub fn now_ms() -> u64 {
    std::time::SystemTime::now()
        .duration_since(std::time::UNIX_EPOCH)
        .map(|d| d.as_millis() as u64)
        .unwrap_or_default()
}

/// Generate a unique job ID for one replication
///
/// Format: `job-{task}-{option}-{timestamp_ms}-{random_hex}`
/// Example: `job-sort-bench-2-1738300800123-a1b2`
pub fn generate_job_id(task: &str, option_index: usize) -> String {
    let timestamp = now_ms();
    let random: u16 = rand::rng().random();
    format!("job-{}-{}-{}-{:04x}", task, option_index, timestamp, random)
}

/// Derive a per-instance seed from a base seed and a sequence number
///
/// SplitMix64 finalizer, so consecutive sequence numbers give unrelated seeds.
pub fn derive_seed(base: u64, sequence: u64) -> u64 {
    let mut z = base.wrapping_add(sequence.wrapping_add(1).wrapping_mul(0x9E37_79B9_7F4A_7C15));
    z = (z ^ (z >> 30)).wrapping_mul(0xBF58_476D_1CE4_E5B9);
    z = (z ^ (z >> 27)).wrapping_mul(0x94D0_49BB_1331_11EB);
    z ^ (z >> 31)
}
