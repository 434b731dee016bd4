//! Incremental quadrature encoder interface

/// Signed count register of one quadrature decoder channel
///
/// Decoding happens in hardware (or in the edge interrupt); this trait only
/// exposes the accumulated count. Counts must stay monotonic within the
/// axis' overflow bounds.
pub trait EncoderSource {
    /// Read the current accumulated count
    fn read(&mut self) -> i32;

    /// Overwrite the count register
    ///
    /// Only used to zero-reference the axis during calibration.
    fn write(&mut self, count: i32);
}
