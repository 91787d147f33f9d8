//! # Packet Reassembly
//!
//! This module provides the stateful decoder that turns a stream of framed
//! notification packets into complete measurement batches.
//!
//! ## Message Lifecycle
//!
//! ```text
//! START packet ──► buffer reseeded, expected size recorded
//! CONTINUATION ──► payload appended
//!      ...
//! len == expected ──► payload decoded, batch emitted, state cleared
//! ```
//!
//! The transport controls packet sizes and arrival timing; the reassembler
//! only validates and accumulates. A start packet always begins a fresh
//! message, discarding any partial accumulation from a previous one. Every
//! error clears the in-flight state, so a failed message can never leave
//! the reassembler stuck waiting for bytes that will not come.
//!
//! ## Thread Safety
//!
//! The reassembler has no internal locking. Construct one per logical
//! connection and serialize access to it; packets delivered on a transport
//! callback thread must be handed over under a single-owner or mutex
//! discipline.

use heapless::Vec;

use crate::protocol::{
    decode_values, DecodeError, DecodeOutcome, MalformedReason, CONTINUATION_TAG, HEADER_SIZE,
    START_TAG,
};
use crate::MAX_MESSAGE_SIZE;

/// Stateful multi-packet message decoder
///
/// Consumes raw packets one at a time via [`PacketReassembler::ingest`] and
/// produces either [`DecodeOutcome::Pending`] or a fully decoded batch.
///
/// # Example
///
/// ```rust
/// use shared::{DecodeOutcome, PacketReassembler};
///
/// let mut reassembler = PacketReassembler::new();
///
/// // Start packet: declares 8 payload bytes, delivers the first 4
/// let outcome = reassembler
///     .ingest(&[0xAA, 0xAA, 0x08, 0x00, 0x00, 0x00, 0x80, 0x3F])
///     .unwrap();
/// assert_eq!(outcome, DecodeOutcome::Pending);
///
/// // Continuation packet delivers the remaining 4
/// let outcome = reassembler
///     .ingest(&[0xBB, 0xBB, 0x00, 0x00, 0x00, 0x00, 0x00, 0x40])
///     .unwrap();
/// match outcome {
///     DecodeOutcome::Complete(values) => assert_eq!(values.as_slice(), &[1.0, 2.0]),
///     DecodeOutcome::Pending => unreachable!(),
/// }
/// ```
#[derive(Debug, Default)]
pub struct PacketReassembler {
    /// Total payload bytes the current message declared; 0 when idle
    expected: usize,
    /// Payload bytes collected so far for the current message
    buffer: Vec<u8, MAX_MESSAGE_SIZE>,
}

impl PacketReassembler {
    /// Create an idle reassembler.
    pub const fn new() -> Self {
        Self {
            expected: 0,
            buffer: Vec::new(),
        }
    }

    /// Feed one delivered packet.
    ///
    /// Returns [`DecodeOutcome::Pending`] until the accumulated payload
    /// reaches the declared size, then decodes and returns
    /// [`DecodeOutcome::Complete`].
    ///
    /// # Errors
    ///
    /// - [`DecodeError::MalformedPacket`] for a packet under [`HEADER_SIZE`]
    ///   bytes, an unrecognized tag, a declared size over
    ///   [`MAX_MESSAGE_SIZE`], or payload overrunning the declared size.
    /// - [`DecodeError::OutOfSequence`] for a continuation with no message
    ///   in progress.
    /// - [`DecodeError::TruncatedPayload`] when the completed payload is not
    ///   a multiple of four bytes.
    ///
    /// Any error discards the in-flight message; the next start packet
    /// begins cleanly.
    pub fn ingest(&mut self, packet: &[u8]) -> Result<DecodeOutcome, DecodeError> {
        match self.ingest_packet(packet) {
            Ok(outcome) => Ok(outcome),
            Err(err) => {
                self.reset();
                Err(err)
            }
        }
    }

    /// Discard any partial accumulation and return to idle.
    pub fn reset(&mut self) {
        self.expected = 0;
        self.buffer.clear();
    }

    /// Whether no message is currently in progress.
    pub fn is_idle(&self) -> bool {
        self.expected == 0 && self.buffer.is_empty()
    }

    /// Payload bytes accumulated for the in-flight message.
    pub fn pending_bytes(&self) -> usize {
        self.buffer.len()
    }

    fn ingest_packet(&mut self, packet: &[u8]) -> Result<DecodeOutcome, DecodeError> {
        if packet.len() < HEADER_SIZE {
            return Err(DecodeError::MalformedPacket(MalformedReason::TooShort {
                len: packet.len(),
            }));
        }

        let tag = [packet[0], packet[1]];
        if tag == START_TAG {
            let declared = u16::from_le_bytes([packet[2], packet[3]]) as usize;
            if declared > MAX_MESSAGE_SIZE {
                return Err(DecodeError::MalformedPacket(MalformedReason::Oversized {
                    declared,
                }));
            }

            // A start packet always reseeds the buffer, even when a
            // previous message was left incomplete.
            self.buffer.clear();
            self.expected = declared;
            self.append(&packet[HEADER_SIZE..])?;
        } else if tag == CONTINUATION_TAG {
            if self.expected == 0 {
                return Err(DecodeError::OutOfSequence);
            }
            self.append(&packet[HEADER_SIZE..])?;
        } else {
            return Err(DecodeError::MalformedPacket(
                MalformedReason::UnknownHeader { tag },
            ));
        }

        self.try_complete()
    }

    fn append(&mut self, chunk: &[u8]) -> Result<(), DecodeError> {
        if self.buffer.extend_from_slice(chunk).is_err() {
            // extend_from_slice is all-or-nothing; overflowing the buffer
            // capacity always means overrunning the declared size too.
            return Err(DecodeError::MalformedPacket(MalformedReason::Overrun {
                declared: self.expected,
                accumulated: self.buffer.len() + chunk.len(),
            }));
        }
        Ok(())
    }

    fn try_complete(&mut self) -> Result<DecodeOutcome, DecodeError> {
        use core::cmp::Ordering;

        match self.buffer.len().cmp(&self.expected) {
            Ordering::Less => Ok(DecodeOutcome::Pending),
            Ordering::Equal => {
                let values = decode_values(&self.buffer)?;
                self.reset();
                Ok(DecodeOutcome::Complete(values))
            }
            // Strict completion boundary: the sender must deliver exactly
            // the declared number of payload bytes.
            Ordering::Greater => Err(DecodeError::MalformedPacket(MalformedReason::Overrun {
                declared: self.expected,
                accumulated: self.buffer.len(),
            })),
        }
    }
}
