//! # Shared Protocol Library
//!
//! This crate provides the core abstractions for the BLE telemetry bridge:
//!
//! - **Wire Format**: Framed packet layout and the float32 payload encoding
//! - **Packet Reassembly**: Stateful multi-packet message accumulation
//! - **Sink Traits**: Abstraction for the transport and the display layer
//!
//! ## Architecture
//!
//! ```text
//! GATT Notification ─────► PacketReassembler ─────► MeasurementSink
//!                                │
//!                        (accumulation buffer)
//! ```
//!
//! A sensor streams float32 measurements as framed notification packets.
//! Each message opens with a start packet carrying the total payload size
//! and continues across as many continuation packets as the ATT MTU forces.
//! The reassembler collects payload bytes until the declared size is reached,
//! then decodes the payload as consecutive little-endian float32 values.
//!
//! Transport concerns (scanning, connection, notification subscription) live
//! in the host app; this crate only validates and reassembles delivered
//! bytes. One reassembler per logical connection, no internal locking.

#![cfg_attr(not(feature = "std"), no_std)]

pub mod protocol;
pub mod reassembly;
pub mod traits;

// Re-export main types for convenience
pub use protocol::{
    decode_single, DecodeError, DecodeOutcome, EncodeError, FrameBuilder, MalformedReason,
    MeasurementVec,
};
pub use reassembly::PacketReassembler;
pub use traits::{DecodeStats, MeasurementSink, StreamDecoder};

/// Library version for protocol compatibility checks
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Maximum size of a single delivered packet, header included.
/// Sized to the largest ATT payload a 517-byte MTU negotiation allows.
pub const MAX_PACKET_SIZE: usize = 512;

/// Maximum total payload size of one reassembled message.
/// Start packets declaring more than this are rejected up front.
pub const MAX_MESSAGE_SIZE: usize = 8192;

/// Maximum number of float32 values one message can carry.
pub const MAX_MESSAGE_VALUES: usize = MAX_MESSAGE_SIZE / protocol::FLOAT_SIZE;
