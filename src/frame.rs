//! Frame codec: request fragmentation and response reassembly.
//!
//! A transaction's payload is split across fixed 64-byte frames, each
//! carrying an 8-byte header. The declared transfer length counts payload
//! plus every frame header, so completion is self-describing: a frame is
//! the last one exactly when `packet_num * FRAME_SIZE + packet_len`
//! reaches the transfer length. This identity only holds when frames are
//! consumed strictly in order, which the single-threaded read loop of the
//! engine guarantees.

use log::debug;

use crate::consts::{
    FRAME_DATA_SIZE, FRAME_HEADER_SIZE, FRAME_SIZE, OUT_REPORT_SIZE, REPORT_ID, STATUS_OK,
};
use crate::error::{Error, Result};

/// Header shared by request and response frames. The third byte is the
/// request code outbound and the status code inbound.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) struct FrameHeader {
    pub trans_id: u8,
    pub port: u8,
    pub code: u8,
    pub packet_num: u8,
    pub packet_len: u16,
    pub transfer_len: u16,
}

impl FrameHeader {
    fn write_to(&self, buf: &mut [u8]) {
        buf[0] = self.trans_id;
        buf[1] = self.port;
        buf[2] = self.code;
        buf[3] = self.packet_num;
        buf[4..6].copy_from_slice(&self.packet_len.to_le_bytes());
        buf[6..8].copy_from_slice(&self.transfer_len.to_le_bytes());
    }

    pub(crate) fn parse(frame: &[u8]) -> Result<Self> {
        if frame.len() < FRAME_HEADER_SIZE {
            return Err(Error::InvalidReport(frame.len()));
        }
        Ok(Self {
            trans_id: frame[0],
            port: frame[1],
            code: frame[2],
            packet_num: frame[3],
            packet_len: u16::from_le_bytes([frame[4], frame[5]]),
            transfer_len: u16::from_le_bytes([frame[6], frame[7]]),
        })
    }
}

/// Number of frames needed for a payload; a zero-length request still
/// occupies one status-only frame.
pub(crate) fn frame_count(payload_len: usize) -> usize {
    if payload_len == 0 {
        1
    } else {
        payload_len.div_ceil(FRAME_DATA_SIZE)
    }
}

/// Declared total transfer length: payload plus one header per frame.
pub(crate) fn transfer_len(payload_len: usize) -> u16 {
    (payload_len + frame_count(payload_len) * FRAME_HEADER_SIZE) as u16
}

/// Iterator over the outbound reports of one request. All frames share the
/// transaction id and transfer length; sequence numbers start at 0.
pub(crate) struct RequestFrames<'a> {
    trans_id: u8,
    port: u8,
    req: u8,
    transfer_len: u16,
    payload: &'a [u8],
    packet_num: u8,
    done: bool,
}

impl<'a> RequestFrames<'a> {
    pub(crate) fn new(trans_id: u8, port: u8, req: u8, payload: &'a [u8]) -> Self {
        Self {
            trans_id,
            port,
            req,
            transfer_len: transfer_len(payload.len()),
            payload,
            packet_num: 0,
            done: false,
        }
    }
}

impl Iterator for RequestFrames<'_> {
    type Item = [u8; OUT_REPORT_SIZE];

    fn next(&mut self) -> Option<Self::Item> {
        if self.done {
            return None;
        }
        let chunk_len = self.payload.len().min(FRAME_DATA_SIZE);
        let (chunk, rest) = self.payload.split_at(chunk_len);
        self.payload = rest;
        self.done = rest.is_empty();

        let header = FrameHeader {
            trans_id: self.trans_id,
            port: self.port,
            code: self.req,
            packet_num: self.packet_num,
            packet_len: (chunk_len + FRAME_HEADER_SIZE) as u16,
            transfer_len: self.transfer_len,
        };
        self.packet_num = self.packet_num.wrapping_add(1);

        let mut report = [0u8; OUT_REPORT_SIZE];
        report[0] = REPORT_ID;
        header.write_to(&mut report[1..1 + FRAME_HEADER_SIZE]);
        report[1 + FRAME_HEADER_SIZE..1 + FRAME_HEADER_SIZE + chunk_len].copy_from_slice(chunk);
        Some(report)
    }
}

/// Outcome of feeding one inbound frame to the accumulator.
#[derive(Debug, PartialEq, Eq)]
pub(crate) enum FrameStep {
    /// Transaction id mismatch; frame discarded, keep reading.
    Stale,
    /// Frame consumed, transaction not yet complete.
    More,
    /// Transfer length reached; the accumulated payload is complete.
    Complete,
}

/// Accumulates response payload bytes across frames of one transaction.
pub(crate) struct Reassembly {
    trans_id: u8,
    payload: Vec<u8>,
}

impl Reassembly {
    pub(crate) fn new(trans_id: u8) -> Self {
        Self {
            trans_id,
            payload: Vec::new(),
        }
    }

    /// Consumes one inbound frame. A frame for a different transaction is
    /// assumed to be a leftover reply from an earlier timed-out exchange
    /// and is dropped. A non-OK status ends the transaction immediately
    /// with the mapped error.
    pub(crate) fn push(&mut self, frame: &[u8]) -> Result<FrameStep> {
        let header = FrameHeader::parse(frame)?;
        if header.trans_id != self.trans_id {
            debug!(
                "Discarding stale frame: trans_id {} (expected {})",
                header.trans_id, self.trans_id
            );
            return Ok(FrameStep::Stale);
        }
        if header.code != STATUS_OK {
            return Err(Error::from_status(header.code));
        }
        let packet_len = header.packet_len as usize;
        if packet_len < FRAME_HEADER_SIZE || packet_len > FRAME_SIZE || packet_len > frame.len() {
            return Err(Error::InvalidReport(frame.len()));
        }
        self.payload
            .extend_from_slice(&frame[FRAME_HEADER_SIZE..packet_len]);

        let consumed = header.packet_num as usize * FRAME_SIZE + packet_len;
        if consumed == header.transfer_len as usize {
            Ok(FrameStep::Complete)
        } else {
            Ok(FrameStep::More)
        }
    }

    pub(crate) fn into_payload(self) -> Vec<u8> {
        self.payload
    }
}
