//! # Android JNI Rust Core Library
//!
//! This library provides the native Rust backend for the BLE telemetry app.
//! It handles:
//!
//! - Packet reassembly and float decoding (shared)
//! - The legacy single-shot decode path
//! - Decode statistics for the diagnostics screen
//!
//! ## JNI Bridge Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────────┐
//! │                      Android App (Kotlin)                       │
//! │                                                                 │
//! │  ┌─────────────────┐     ┌──────────────────────────────────┐   │
//! │  │  MainActivity   │────►│   BleViewModel (GATT callbacks)  │   │
//! │  └─────────────────┘     └──────────────────────────────────┘   │
//! │                                       │                         │
//! │                                       │ JNI Calls               │
//! │                                       ▼                         │
//! │  ┌──────────────────────────────────────────────────────────┐   │
//! │  │                    rust_core (this lib)                  │   │
//! │  │                                                          │   │
//! │  │  ┌──────────────┐  ┌──────────────┐  ┌───────────────┐   │   │
//! │  │  │ Reassembler  │  │ Single-shot  │  │  DecodeStats  │   │   │
//! │  │  │  (shared)    │  │   decoder    │  │  (shared)     │   │   │
//! │  │  └──────────────┘  └──────────────┘  └───────────────┘   │   │
//! │  └──────────────────────────────────────────────────────────┘   │
//! └─────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## JNI Functions Exported
//!
//! - `Java_com_example_bletelemetry_RustBridge_init`: Initialize logging
//! - `Java_com_example_bletelemetry_RustBridge_ingestPacket`: Feed one notification payload
//! - `Java_com_example_bletelemetry_RustBridge_lastMeasurements`: Most recent batch as JSON
//! - `Java_com_example_bletelemetry_RustBridge_lastError`: Most recent decode error as JSON
//! - `Java_com_example_bletelemetry_RustBridge_decodeSingleShot`: Legacy one-packet decode
//! - `Java_com_example_bletelemetry_RustBridge_reset`: Discard partial accumulation
//! - `Java_com_example_bletelemetry_RustBridge_getStats`: Stream counters as JSON

use jni::objects::{JByteArray, JClass};
use jni::sys::{jboolean, jint, jstring, JNI_TRUE};
use jni::JNIEnv;
use lazy_static::lazy_static;
use log::{debug, error, info, warn, LevelFilter};
use std::sync::{Mutex, Once};
use thiserror::Error;

use shared::protocol::{decode_single, DecodeError};
use shared::traits::{MeasurementSink, StreamDecoder};

// Initialize logging once
static INIT_LOGGER: Once = Once::new();

/// Errors that can occur in the JNI bridge
#[derive(Error, Debug)]
pub enum BridgeError {
    #[error("decode failed: {0:?}")]
    Decode(DecodeError),
    #[error("JNI error: {0}")]
    Jni(#[from] jni::errors::Error),
    #[error("serialization error: {0}")]
    Json(#[from] serde_json::Error),
}

impl From<DecodeError> for BridgeError {
    fn from(err: DecodeError) -> Self {
        BridgeError::Decode(err)
    }
}

/// What the last ingested packet produced
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum PacketOutcome {
    /// Message still incomplete
    Pending,
    /// A batch of this many values completed
    Decoded(usize),
    /// The packet was rejected
    Failed,
}

/// Sink retaining the most recent batch and error for the Kotlin side
///
/// The app polls `lastMeasurements`/`lastError` from its render loop, so
/// the bridge keeps only the latest state rather than a queue.
#[derive(Debug)]
struct LatestBatch {
    /// Most recent complete batch
    values: Vec<f32>,
    /// Most recent decode error, cleared by the next successful message
    last_error: Option<DecodeError>,
    /// Outcome of the packet currently being ingested
    outcome: PacketOutcome,
}

impl Default for LatestBatch {
    fn default() -> Self {
        Self {
            values: Vec::new(),
            last_error: None,
            outcome: PacketOutcome::Pending,
        }
    }
}

impl LatestBatch {
    /// Clear the per-packet outcome before feeding the next packet.
    fn begin_packet(&mut self) {
        self.outcome = PacketOutcome::Pending;
    }
}

impl MeasurementSink for LatestBatch {
    fn on_measurements(&mut self, values: &[f32]) {
        self.values.clear();
        self.values.extend_from_slice(values);
        self.last_error = None;
        self.outcome = PacketOutcome::Decoded(values.len());
    }

    fn on_decode_error(&mut self, error: DecodeError) {
        self.last_error = Some(error);
        self.outcome = PacketOutcome::Failed;
    }
}

/// Decoder state shared between JNI calls
#[derive(Debug, Default)]
struct DecoderState {
    /// One stream per GATT connection; the app tears it down via `reset`
    stream: StreamDecoder<LatestBatch>,
}

// Global state (wrapped in Mutex: GATT callbacks arrive on a binder thread)
lazy_static! {
    static ref STATE: Mutex<DecoderState> = Mutex::new(DecoderState::default());
}

fn into_jstring(env: &mut JNIEnv, json: &str) -> jstring {
    match env.new_string(json) {
        Ok(s) => s.into_raw(),
        Err(e) => {
            error!("Failed to create Java string: {:?}", e);
            std::ptr::null_mut()
        }
    }
}

fn decode_single_json(env: &mut JNIEnv, data: &JByteArray) -> Result<String, BridgeError> {
    let bytes = env.convert_byte_array(data)?;
    let values = decode_single(&bytes)?;
    Ok(serde_json::to_string(values.as_slice())?)
}

/// Initialize the Rust native library
///
/// Called from Kotlin:
/// ```kotlin
/// external fun init(): Boolean
/// ```
#[no_mangle]
pub extern "system" fn Java_com_example_bletelemetry_RustBridge_init(
    _env: JNIEnv,
    _class: JClass,
) -> jboolean {
    // Initialize Android logger (only once)
    INIT_LOGGER.call_once(|| {
        android_logger::init_once(
            android_logger::Config::default()
                .with_max_level(LevelFilter::Debug)
                .with_tag("RustCore"),
        );
    });

    info!("Rust core library initialized");
    info!("Protocol version: {}", shared::VERSION);

    JNI_TRUE
}

/// Feed one notification payload to the process decoder
///
/// Called from Kotlin:
/// ```kotlin
/// external fun ingestPacket(data: ByteArray): Int
/// ```
///
/// Returns: Number of floats decoded by this packet, 0 while the message
/// is still incomplete, or -1 if the packet was rejected (kind retrievable
/// via `lastError`)
#[no_mangle]
pub extern "system" fn Java_com_example_bletelemetry_RustBridge_ingestPacket(
    mut env: JNIEnv,
    _class: JClass,
    data: JByteArray,
) -> jint {
    let bytes = match env.convert_byte_array(&data) {
        Ok(bytes) => bytes,
        Err(e) => {
            error!("Failed to read packet array: {:?}", e);
            return -1;
        }
    };

    debug!("Ingesting {} byte packet", bytes.len());

    let mut state = STATE.lock().unwrap();
    state.stream.sink_mut().begin_packet();
    state.stream.on_packet(&bytes);

    match state.stream.sink().outcome {
        PacketOutcome::Decoded(count) => {
            debug!("Message complete: {} values", count);
            count as jint
        }
        PacketOutcome::Pending => 0,
        PacketOutcome::Failed => {
            warn!("Packet rejected: {:?}", state.stream.sink().last_error);
            -1
        }
    }
}

/// Get the most recent complete measurement batch as a JSON array
///
/// Called from Kotlin:
/// ```kotlin
/// external fun lastMeasurements(): String
/// ```
#[no_mangle]
pub extern "system" fn Java_com_example_bletelemetry_RustBridge_lastMeasurements(
    mut env: JNIEnv,
    _class: JClass,
) -> jstring {
    let json = {
        let state = STATE.lock().unwrap();
        serde_json::to_string(&state.stream.sink().values)
    };

    match json {
        Ok(json) => into_jstring(&mut env, &json),
        Err(e) => {
            error!("Failed to serialize measurements: {}", e);
            std::ptr::null_mut()
        }
    }
}

/// Get the most recent decode error as JSON, or null if none occurred
/// since the last successful message
///
/// Called from Kotlin:
/// ```kotlin
/// external fun lastError(): String?
/// ```
#[no_mangle]
pub extern "system" fn Java_com_example_bletelemetry_RustBridge_lastError(
    mut env: JNIEnv,
    _class: JClass,
) -> jstring {
    let last_error = {
        let state = STATE.lock().unwrap();
        state.stream.sink().last_error
    };

    match last_error {
        Some(err) => match serde_json::to_string(&err) {
            Ok(json) => into_jstring(&mut env, &json),
            Err(e) => {
                error!("Failed to serialize error: {}", e);
                std::ptr::null_mut()
            }
        },
        None => std::ptr::null_mut(),
    }
}

/// Decode a legacy single-shot message
///
/// Called from Kotlin:
/// ```kotlin
/// external fun decodeSingleShot(data: ByteArray): String?
/// ```
///
/// Returns: JSON array of floats, or null if the buffer was rejected.
/// Stateless; does not touch the reassembling stream.
#[no_mangle]
pub extern "system" fn Java_com_example_bletelemetry_RustBridge_decodeSingleShot(
    mut env: JNIEnv,
    _class: JClass,
    data: JByteArray,
) -> jstring {
    match decode_single_json(&mut env, &data) {
        Ok(json) => into_jstring(&mut env, &json),
        Err(e) => {
            warn!("Single-shot decode failed: {}", e);
            std::ptr::null_mut()
        }
    }
}

/// Discard any partial accumulation (connection teardown)
///
/// Called from Kotlin:
/// ```kotlin
/// external fun reset()
/// ```
#[no_mangle]
pub extern "system" fn Java_com_example_bletelemetry_RustBridge_reset(
    _env: JNIEnv,
    _class: JClass,
) {
    let mut state = STATE.lock().unwrap();
    state.stream.reset();
    *state.stream.sink_mut() = LatestBatch::default();

    info!("Decoder state reset");
}

/// Get stream statistics as JSON
///
/// Called from Kotlin:
/// ```kotlin
/// external fun getStats(): String
/// ```
#[no_mangle]
pub extern "system" fn Java_com_example_bletelemetry_RustBridge_getStats(
    mut env: JNIEnv,
    _class: JClass,
) -> jstring {
    let json = {
        let state = STATE.lock().unwrap();
        serde_json::to_string(&state.stream.stats())
    };

    match json {
        Ok(json) => into_jstring(&mut env, &json),
        Err(e) => {
            error!("Failed to serialize stats: {}", e);
            std::ptr::null_mut()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_latest_batch_default() {
        let sink = LatestBatch::default();
        assert!(sink.values.is_empty());
        assert!(sink.last_error.is_none());
        assert_eq!(sink.outcome, PacketOutcome::Pending);
    }

    #[test]
    fn test_latest_batch_records_measurements() {
        let mut sink = LatestBatch::default();
        sink.last_error = Some(DecodeError::OutOfSequence);

        sink.on_measurements(&[1.5, 2.5]);

        assert_eq!(sink.values, vec![1.5, 2.5]);
        assert_eq!(sink.outcome, PacketOutcome::Decoded(2));
        // A successful message clears the retained error
        assert!(sink.last_error.is_none());
    }

    #[test]
    fn test_latest_batch_records_error() {
        let mut sink = LatestBatch::default();
        sink.on_decode_error(DecodeError::OutOfSequence);

        assert_eq!(sink.last_error, Some(DecodeError::OutOfSequence));
        assert_eq!(sink.outcome, PacketOutcome::Failed);
    }

    #[test]
    fn test_decoder_state_reassembles_stream() {
        let mut state = DecoderState::default();

        state.stream.sink_mut().begin_packet();
        state
            .stream
            .on_packet(&[0xAA, 0xAA, 0x08, 0x00, 0x00, 0x00, 0x80, 0x3F]);
        assert_eq!(state.stream.sink().outcome, PacketOutcome::Pending);

        state.stream.sink_mut().begin_packet();
        state
            .stream
            .on_packet(&[0xBB, 0xBB, 0x00, 0x00, 0x00, 0x00, 0x00, 0x40]);
        assert_eq!(state.stream.sink().outcome, PacketOutcome::Decoded(2));
        assert_eq!(state.stream.sink().values, vec![1.0, 2.0]);
    }
}
