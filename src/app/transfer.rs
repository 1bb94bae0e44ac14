//! Transfer engine: drains the UART receive buffer back out the transmit
//! buffer.
//!
//! One pass reads up to [`TRANSFER_CHUNK_SIZE`] bytes at a time and writes
//! exactly those bytes before reading again, until a read comes back empty.
//! No framing, no transformation, no reordering.  The engine borrows the
//! port for the duration of a pass only.
//!
//! Passes must not overlap on one port.  The service guarantees this by
//! running every pass on its single worker context.

use log::{debug, warn};

use crate::config::TRANSFER_CHUNK_SIZE;
use crate::error::PeripheralError;

use super::ports::SerialPort;

/// Result of a pass that drained the buffer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct TransferReport {
    /// Bytes read and written back.
    pub bytes: usize,
    /// Non-empty reads in this pass.
    pub chunks: usize,
}

/// A pass that stopped on an I/O error.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TransferAborted {
    /// Bytes fully echoed before the failure.
    pub echoed: usize,
    pub cause: PeripheralError,
}

/// Echo loop with a reusable chunk buffer.
pub struct TransferEngine {
    chunk: [u8; TRANSFER_CHUNK_SIZE],
}

impl Default for TransferEngine {
    fn default() -> Self {
        Self::new()
    }
}

impl TransferEngine {
    pub fn new() -> Self {
        Self {
            chunk: [0; TRANSFER_CHUNK_SIZE],
        }
    }

    /// Drain `port` until a read returns 0 bytes.
    ///
    /// A call with nothing pending performs one read, zero writes, and
    /// returns an empty report.
    pub fn transfer_all(
        &mut self,
        port: &mut dyn SerialPort,
    ) -> Result<TransferReport, TransferAborted> {
        let mut report = TransferReport::default();

        loop {
            let read = match port.read(&mut self.chunk) {
                Ok(0) => break,
                Ok(n) => n.min(TRANSFER_CHUNK_SIZE),
                Err(cause) => {
                    warn!("transfer: read failed after {} bytes: {}", report.bytes, cause);
                    return Err(TransferAborted {
                        echoed: report.bytes,
                        cause,
                    });
                }
            };

            if let Err(cause) = write_all(port, &self.chunk[..read]) {
                warn!("transfer: write failed after {} bytes: {}", report.bytes, cause);
                return Err(TransferAborted {
                    echoed: report.bytes,
                    cause,
                });
            }

            report.bytes += read;
            report.chunks += 1;
        }

        if report.bytes > 0 {
            debug!("transfer: echoed {} bytes in {} chunks", report.bytes, report.chunks);
        }
        Ok(report)
    }
}

/// Keep writing until the transport has accepted every byte of `data`.
fn write_all(port: &mut dyn SerialPort, mut data: &[u8]) -> Result<(), PeripheralError> {
    while !data.is_empty() {
        match port.write(data)? {
            0 => return Err(PeripheralError::IoFailure),
            n => data = &data[n.min(data.len())..],
        }
    }
    Ok(())
}
