//! Core constants for the roomwatch monitoring node.
//!
//! This module centralizes the defaults used by the configuration layer, the
//! card reader driver and the sensor orchestrator. Every value here can be
//! overridden at startup through [`MonitorConfig`](crate::MonitorConfig),
//! except the card identifier layout which is fixed by ISO 14443-3.
//!
//! # Usage
//!
//! ```
//! use roomwatch_core::constants::*;
//! use std::time::Duration;
//!
//! let cooldown = Duration::from_secs(DEFAULT_EVENT_COOLDOWN_SECS);
//! assert_eq!(cooldown.as_secs(), 300);
//! assert_eq!(CARD_UID_LENGTH, 5);
//! ```

// ============================================================================
// Card Identifiers
// ============================================================================

/// Length of a cascade-level-1 card identifier as returned by anti-collision.
///
/// Four UID bytes followed by the BCC check byte (XOR of the four UID bytes).
pub const CARD_UID_LENGTH: usize = 5;

/// Number of UID bytes covered by the BCC check byte.
pub const CARD_UID_SERIAL_LENGTH: usize = 4;

/// Factory default MIFARE Classic sector key (key A).
pub const DEFAULT_SECTOR_KEY: [u8; 6] = [0xFF; 6];

// ============================================================================
// Polling Cadence
// ============================================================================

/// Default polling interval for the motion channel in milliseconds.
pub const DEFAULT_MOTION_POLL_MS: u64 = 1_000;

/// Default polling interval for door and window contact channels in milliseconds.
pub const DEFAULT_CONTACT_POLL_MS: u64 = 1_000;

/// Default polling interval for the card reader in milliseconds.
///
/// Slower than the contact channels: every poll costs a full
/// request/anti-collision exchange on the SPI bus.
pub const DEFAULT_RFID_POLL_MS: u64 = 2_000;

/// Delay before a channel retries after a failed hardware read.
pub const DEFAULT_ERROR_BACKOFF_MS: u64 = 5_000;

// ============================================================================
// Event Dispatch
// ============================================================================

/// Minimum time between two capture/notify dispatches (5 minutes).
pub const DEFAULT_EVENT_COOLDOWN_SECS: u64 = 300;

/// Video length recorded for intrusion events (motion, door, window).
pub const DEFAULT_INTRUSION_VIDEO_SECS: u64 = 10;

/// Video length recorded for unauthorized card reads.
pub const DEFAULT_UNAUTHORIZED_VIDEO_SECS: u64 = 30;

// ============================================================================
// Lifecycle
// ============================================================================

/// Maximum time `stop()` waits for each channel worker to finish.
pub const DEFAULT_JOIN_TIMEOUT_MS: u64 = 5_000;

/// Interval between process-level health checks.
pub const DEFAULT_HEALTH_CHECK_INTERVAL_SECS: u64 = 300;

// ============================================================================
// Default Wiring (BCM numbering)
// ============================================================================

/// PIR motion sensor input pin.
pub const DEFAULT_MOTION_PIN: u32 = 17;

/// Motion indicator LED pin.
pub const DEFAULT_MOTION_LED_PIN: u32 = 23;

/// Door reed switch input pin.
pub const DEFAULT_DOOR_PIN: u32 = 27;

/// Door indicator LED pin.
pub const DEFAULT_DOOR_LED_PIN: u32 = 24;

/// Window reed switch input pin.
pub const DEFAULT_WINDOW_PIN: u32 = 22;

/// Window indicator LED pin.
pub const DEFAULT_WINDOW_LED_PIN: u32 = 25;

/// SPI bus number of the card reader.
pub const DEFAULT_SPI_BUS: u8 = 0;

/// SPI chip-select of the card reader.
pub const DEFAULT_SPI_DEVICE: u8 = 0;

/// SPI clock for the card reader in Hz.
pub const DEFAULT_SPI_SPEED_HZ: u32 = 1_000_000;
