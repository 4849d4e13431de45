use rand::Rng;
use std::time::Duration;

/// Exclusive upper bound of the per-byte pause, in nanoseconds.
pub const JITTER_BOUND_NANOS: u64 = 2047;

/// Draws the pause inserted after each header byte.
///
/// Uses the thread-local generator, so concurrent sessions never contend on
/// shared RNG state. The runtime timer rounds sub-millisecond sleeps up to its
/// own resolution; the drawn value only bounds the request.
pub fn next_delay() -> Duration {
    let nanos = rand::thread_rng().gen_range(0..JITTER_BOUND_NANOS);
    Duration::from_nanos(nanos)
}
