//! Host telemetry link interface
use crate::error::HalResult;

/// Byte-appending sink for telemetry frames (USB CDC, UART, file, ...)
pub trait TelemetrySink {
    /// Append the whole buffer to the link, blocking if needed
    fn write_all(&mut self, bytes: &[u8]) -> HalResult<()>;

    /// Push buffered bytes out to the host
    fn flush(&mut self) -> HalResult<()> {
        Ok(())
    }
}
