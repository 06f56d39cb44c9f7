//! Transaction engine: one serialized request/response exchange at a time
//! per device.
//!
//! The guard around [`EngineIo`] is what provides the ordering guarantee:
//! while one thread's exchange is in flight, every other operation on the
//! same device blocks before its first frame is written, so frames of two
//! transactions are never interleaved on the wire. Operations on different
//! devices go through different engines and proceed independently.

use log::{debug, warn};
use std::sync::Mutex;

use crate::consts::{DEFAULT_READ_TIMEOUT_MS, FRAME_HEADER_SIZE, FRAME_SIZE};
use crate::error::{Error, Result};
use crate::frame::{self, FrameStep, Reassembly, RequestFrames};
use crate::transport::Transport;

pub(crate) struct Engine {
    io: Mutex<EngineIo>,
}

struct EngineIo {
    transport: Box<dyn Transport>,
    trans_id: u8,
    read_timeout_ms: i32,
}

impl Engine {
    pub(crate) fn new(transport: Box<dyn Transport>) -> Self {
        Self {
            io: Mutex::new(EngineIo {
                transport,
                trans_id: 0,
                read_timeout_ms: DEFAULT_READ_TIMEOUT_MS,
            }),
        }
    }

    pub(crate) fn set_read_timeout(&self, timeout_ms: i32) -> Result<()> {
        let mut io = self.io.lock().map_err(|_| Error::Synchronization)?;
        io.read_timeout_ms = timeout_ms;
        Ok(())
    }

    /// Performs one exchange: writes the request frames, then reads frames
    /// until the response is complete, a non-OK status arrives, or the read
    /// timeout elapses. The guard is held for the whole exchange and
    /// released on every exit path.
    ///
    /// No retries happen here. After a timeout the channel framing is
    /// undefined and the caller must issue a bus reset before reusing the
    /// port; a half-completed multi-frame exchange cannot be resumed.
    pub(crate) fn execute(&self, port: u8, req: u8, payload: &[u8]) -> Result<Vec<u8>> {
        let total = payload.len() + frame::frame_count(payload.len()) * FRAME_HEADER_SIZE;
        if total > u16::MAX as usize {
            return Err(Error::InvalidParameter(format!(
                "request payload of {} bytes exceeds the protocol limit",
                payload.len()
            )));
        }

        let mut io = self.io.lock().map_err(|_| Error::Synchronization)?;
        let trans_id = io.trans_id;
        io.trans_id = io.trans_id.wrapping_add(1);

        debug!(
            "Exchange: trans_id={}, port={}, req=0x{:02X}, {} bytes out",
            trans_id,
            port,
            req,
            payload.len()
        );

        for report in RequestFrames::new(trans_id, port, req, payload) {
            let written = io.transport.write_report(&report)?;
            if written != report.len() {
                warn!(
                    "Incomplete report write: {} of {} bytes",
                    written,
                    report.len()
                );
                return Err(Error::Io(std::io::Error::other(
                    "incomplete HID report write",
                )));
            }
        }

        let mut acc = Reassembly::new(trans_id);
        let mut buf = [0u8; FRAME_SIZE];
        loop {
            let timeout_ms = io.read_timeout_ms;
            let read = io.transport.read_report(&mut buf, timeout_ms)?;
            if read == 0 {
                warn!("Exchange trans_id={} timed out after {} ms", trans_id, timeout_ms);
                return Err(Error::Timeout);
            }
            match acc.push(&buf[..read])? {
                // Stale frames are bounded only by the read timeout.
                FrameStep::Stale | FrameStep::More => continue,
                FrameStep::Complete => break,
            }
        }
        let response = acc.into_payload();
        debug!(
            "Exchange trans_id={} complete, {} bytes in",
            trans_id,
            response.len()
        );
        Ok(response)
    }
}
