//! Link to the serial bus.
//!
//! Reading is the transport's own business: it delivers each de-framed
//! message to [`CoordinatorHandle::on_frame`]. Writing goes the other way and
//! only ever happens from the coordinator's drain loop, which owns the
//! transport once started.
//!
//! [`CoordinatorHandle::on_frame`]: crate::CoordinatorHandle::on_frame

use std::future::Future;

use lockmon_core::Result;

/// Write side of the bus.
///
/// Methods return `Send` futures so the drain loop can run on any runtime
/// worker.
pub trait Transport: Send + 'static {
    /// Acquire the device.
    ///
    /// # Errors
    /// Returns `Error::TransportUnavailable` if the device cannot be opened.
    fn open(&mut self) -> impl Future<Output = Result<()>> + Send;

    /// Write one encoded command.
    fn send(&mut self, frame: &[u8]) -> impl Future<Output = Result<()>> + Send;

    /// Release the device. Called once, on shutdown.
    fn stop(&mut self) -> impl Future<Output = ()> + Send;
}
