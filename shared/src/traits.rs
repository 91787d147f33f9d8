//! # Sink Trait & Stream Glue
//!
//! This module defines the seam between the decoder core and its
//! collaborators. Following SOLID principles:
//!
//! - **Single Responsibility**: the reassembler decodes, the sink consumes
//! - **Interface Segregation**: consumers implement one small trait
//! - **Dependency Inversion**: the stream glue depends on the abstraction
//!
//! ## Design Rationale
//!
//! The `MeasurementSink` trait enables:
//! 1. **Testability**: recording sinks for unit tests
//! 2. **Flexibility**: swap the display layer without touching decode logic
//! 3. **Error surfacing**: the core classifies errors, the consumer decides
//!    how to report them
//!
//! ```text
//! transport on_packet ──► StreamDecoder ──► MeasurementSink
//!                              │
//!                       PacketReassembler
//! ```

use serde::{Deserialize, Serialize};

use crate::protocol::{DecodeError, DecodeOutcome};
use crate::reassembly::PacketReassembler;

/// Consumer of decoded measurement batches
///
/// Implemented by the display layer (or a recording stub in tests). The
/// decoder core never drops data silently: every completed batch reaches
/// [`MeasurementSink::on_measurements`] and every classified error reaches
/// [`MeasurementSink::on_decode_error`].
pub trait MeasurementSink {
    /// Receive one fully decoded measurement batch, in wire order.
    fn on_measurements(&mut self, values: &[f32]);

    /// Receive a decode error.
    ///
    /// The error aborted only the in-flight message; the stream continues
    /// with the next start packet.
    fn on_decode_error(&mut self, error: DecodeError);
}

/// Counters over the life of one decoded stream
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct DecodeStats {
    /// Packets fed to the reassembler
    pub packets_ingested: u64,
    /// Messages fully reassembled and decoded
    pub messages_decoded: u64,
    /// Float values decoded across all messages
    pub values_decoded: u64,
    /// Packets rejected as malformed
    pub malformed_packets: u32,
    /// Continuations rejected with no message in progress
    pub out_of_sequence_packets: u32,
    /// Messages rejected with a misaligned payload
    pub truncated_payloads: u32,
    /// Payload bytes currently accumulated for an in-flight message
    pub bytes_pending: usize,
}

/// Glue between the transport's per-packet callback and a sink
///
/// Owns one [`PacketReassembler`] per logical connection, forwards every
/// complete batch to the sink, reports every error to the sink, and keeps
/// [`DecodeStats`] current. Synchronous: each call runs to completion on
/// the calling thread. Transports that deliver packets from a callback
/// thread must serialize access, as for the reassembler itself.
#[derive(Debug, Default)]
pub struct StreamDecoder<S: MeasurementSink> {
    reassembler: PacketReassembler,
    sink: S,
    stats: DecodeStats,
}

impl<S: MeasurementSink> StreamDecoder<S> {
    /// Create a decoder feeding `sink`.
    pub fn new(sink: S) -> Self {
        Self {
            reassembler: PacketReassembler::new(),
            sink,
            stats: DecodeStats::default(),
        }
    }

    /// Handle one delivered packet.
    ///
    /// This is the transport's `on_packet` contract: call once per
    /// delivered packet, in delivery order.
    pub fn on_packet(&mut self, packet: &[u8]) {
        self.stats.packets_ingested += 1;

        match self.reassembler.ingest(packet) {
            Ok(DecodeOutcome::Pending) => {}
            Ok(DecodeOutcome::Complete(values)) => {
                self.stats.messages_decoded += 1;
                self.stats.values_decoded += values.len() as u64;
                self.sink.on_measurements(&values);
            }
            Err(err) => {
                match err {
                    DecodeError::MalformedPacket(_) => self.stats.malformed_packets += 1,
                    DecodeError::OutOfSequence => self.stats.out_of_sequence_packets += 1,
                    DecodeError::TruncatedPayload { .. } => self.stats.truncated_payloads += 1,
                }
                self.sink.on_decode_error(err);
            }
        }

        self.stats.bytes_pending = self.reassembler.pending_bytes();
    }

    /// Discard any in-flight message (connection teardown, resubscribe).
    pub fn reset(&mut self) {
        self.reassembler.reset();
        self.stats.bytes_pending = 0;
    }

    /// Snapshot of the stream counters.
    pub fn stats(&self) -> DecodeStats {
        self.stats
    }

    /// Access the sink.
    pub fn sink(&self) -> &S {
        &self.sink
    }

    /// Mutable access to the sink.
    pub fn sink_mut(&mut self) -> &mut S {
        &mut self.sink
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::protocol::MalformedReason;

    /// Records everything the decoder emits.
    #[derive(Debug, Default)]
    struct RecordingSink {
        batches: std::vec::Vec<std::vec::Vec<f32>>,
        errors: std::vec::Vec<DecodeError>,
    }

    impl MeasurementSink for RecordingSink {
        fn on_measurements(&mut self, values: &[f32]) {
            self.batches.push(values.to_vec());
        }

        fn on_decode_error(&mut self, error: DecodeError) {
            self.errors.push(error);
        }
    }

    fn le_floats(values: &[f32]) -> std::vec::Vec<u8> {
        values.iter().flat_map(|v| v.to_le_bytes()).collect()
    }

    #[test]
    fn test_stream_decoder_forwards_batches() {
        let mut decoder = StreamDecoder::new(RecordingSink::default());

        let payload = le_floats(&[1.0, 2.0]);
        let mut start = vec![0xAA, 0xAA, 0x08, 0x00];
        start.extend_from_slice(&payload[..4]);
        let mut cont = vec![0xBB, 0xBB, 0x00, 0x00];
        cont.extend_from_slice(&payload[4..]);

        decoder.on_packet(&start);
        assert!(decoder.sink().batches.is_empty());
        assert_eq!(decoder.stats().bytes_pending, 4);

        decoder.on_packet(&cont);
        assert_eq!(decoder.sink().batches, vec![vec![1.0, 2.0]]);

        let stats = decoder.stats();
        assert_eq!(stats.packets_ingested, 2);
        assert_eq!(stats.messages_decoded, 1);
        assert_eq!(stats.values_decoded, 2);
        assert_eq!(stats.bytes_pending, 0);
    }

    #[test]
    fn test_stream_decoder_reports_errors() {
        let mut decoder = StreamDecoder::new(RecordingSink::default());

        decoder.on_packet(&[0xBB, 0xBB, 0x00, 0x00, 1, 2, 3, 4]);
        decoder.on_packet(&[0xCC, 0xCC, 0x00, 0x00]);

        assert_eq!(
            decoder.sink().errors,
            vec![
                DecodeError::OutOfSequence,
                DecodeError::MalformedPacket(MalformedReason::UnknownHeader {
                    tag: [0xCC, 0xCC]
                }),
            ]
        );

        let stats = decoder.stats();
        assert_eq!(stats.out_of_sequence_packets, 1);
        assert_eq!(stats.malformed_packets, 1);
        assert_eq!(stats.messages_decoded, 0);
    }

    #[test]
    fn test_stream_decoder_continues_after_error() {
        let mut decoder = StreamDecoder::new(RecordingSink::default());

        // Truncated message: declared size not a multiple of four
        decoder.on_packet(&[0xAA, 0xAA, 0x02, 0x00, 0x11, 0x22]);
        assert_eq!(decoder.stats().truncated_payloads, 1);

        let payload = le_floats(&[5.0]);
        let mut start = vec![0xAA, 0xAA, 0x04, 0x00];
        start.extend_from_slice(&payload);
        decoder.on_packet(&start);

        assert_eq!(decoder.sink().batches, vec![vec![5.0]]);
    }

    #[test]
    fn test_stream_decoder_reset_clears_pending() {
        let mut decoder = StreamDecoder::new(RecordingSink::default());

        decoder.on_packet(&[0xAA, 0xAA, 0x08, 0x00, 0x00, 0x00]);
        assert_eq!(decoder.stats().bytes_pending, 2);

        decoder.reset();
        assert_eq!(decoder.stats().bytes_pending, 0);

        // The discarded message is gone; a continuation is out of sequence
        decoder.on_packet(&[0xBB, 0xBB, 0x00, 0x00, 0x00, 0x00]);
        assert_eq!(decoder.sink().errors, vec![DecodeError::OutOfSequence]);
    }
}
