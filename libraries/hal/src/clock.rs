/// Monotonic time source
///
/// Backed by a free-running hardware timer on target and by
/// `std::time::Instant` or a simulated counter on the host.
pub trait Clock {
    /// Microseconds since an arbitrary fixed epoch
    fn now_us(&self) -> u64;

    /// Milliseconds since the same epoch
    fn now_ms(&self) -> u64 {
        self.now_us() / 1000
    }
}
