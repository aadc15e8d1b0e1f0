//! Startup configuration loaded from TOML.
//!
//! Configuration is read once when the node starts and is never re-read
//! live. Every field has a default taken from [`constants`](crate::constants),
//! so an empty file yields a working node wired the standard way.
//!
//! ```toml
//! event_cooldown_secs = 120
//!
//! [door]
//! pin = 5
//! led_pin = 6
//! active_low = true
//!
//! [rfid]
//! poll_interval_ms = 1500
//!
//! [[authorized_cards]]
//! uid = [5, 74, 28, 185, 234]
//! name = "Card A"
//! role = "admin"
//! ```

use crate::constants::*;
use crate::{AccessRecord, AccessTable, ChannelKind, Error, Result};
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::path::Path;
use std::time::Duration;

/// One GPIO-backed sensor channel (motion, door or window).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct InputConfig {
    /// Input pin (BCM numbering).
    pub pin: u32,

    /// Optional indicator LED that follows the sensor state.
    #[serde(default)]
    pub led_pin: Option<u32>,

    /// The sensor reports its active state as a low level (pull-up wiring).
    #[serde(default)]
    pub active_low: bool,

    #[serde(default = "default_contact_poll_ms")]
    pub poll_interval_ms: u64,

    /// Free-form location tag reported in the status table.
    #[serde(default)]
    pub location: Option<String>,
}

impl InputConfig {
    fn with_pins(pin: u32, led_pin: u32, poll_interval_ms: u64) -> Self {
        Self {
            pin,
            led_pin: Some(led_pin),
            active_low: false,
            poll_interval_ms,
            location: None,
        }
    }

    pub fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.poll_interval_ms)
    }

    /// Location tag, falling back to `pin_<n>`.
    pub fn location(&self) -> String {
        self.location
            .clone()
            .unwrap_or_else(|| format!("pin_{}", self.pin))
    }
}

fn default_contact_poll_ms() -> u64 {
    DEFAULT_CONTACT_POLL_MS
}

/// The MFRC522 card reader.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct RfidConfig {
    pub spi_bus: u8,
    pub spi_device: u8,
    pub speed_hz: u32,
    pub poll_interval_ms: u64,
    pub location: String,

    /// Key A used when a sector has to be authenticated.
    pub sector_key: [u8; 6],

    /// BCM line wired to the chip's NRSTPD pin, held high while running.
    pub reset_pin: Option<u32>,
}

impl Default for RfidConfig {
    fn default() -> Self {
        Self {
            spi_bus: DEFAULT_SPI_BUS,
            spi_device: DEFAULT_SPI_DEVICE,
            speed_hz: DEFAULT_SPI_SPEED_HZ,
            poll_interval_ms: DEFAULT_RFID_POLL_MS,
            location: "main_reader".to_string(),
            sector_key: DEFAULT_SECTOR_KEY,
            reset_pin: None,
        }
    }
}

impl RfidConfig {
    pub fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.poll_interval_ms)
    }

    /// spidev node for the configured bus and chip-select.
    pub fn spidev_path(&self) -> String {
        format!("/dev/spidev{}.{}", self.spi_bus, self.spi_device)
    }
}

/// Video lengths requested from the capture device per event class.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct VideoConfig {
    pub intrusion_secs: u64,
    pub unauthorized_secs: u64,
}

impl Default for VideoConfig {
    fn default() -> Self {
        Self {
            intrusion_secs: DEFAULT_INTRUSION_VIDEO_SECS,
            unauthorized_secs: DEFAULT_UNAUTHORIZED_VIDEO_SECS,
        }
    }
}

/// Complete node configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct MonitorConfig {
    pub event_cooldown_secs: u64,
    pub error_backoff_ms: u64,
    pub join_timeout_ms: u64,
    pub health_check_interval_secs: u64,
    pub motion: InputConfig,
    pub door: InputConfig,
    pub window: InputConfig,
    pub rfid: RfidConfig,
    pub video: VideoConfig,

    /// Authorized cards. `None` keeps the built-in table.
    pub authorized_cards: Option<Vec<AccessRecord>>,
}

impl Default for MonitorConfig {
    fn default() -> Self {
        Self {
            event_cooldown_secs: DEFAULT_EVENT_COOLDOWN_SECS,
            error_backoff_ms: DEFAULT_ERROR_BACKOFF_MS,
            join_timeout_ms: DEFAULT_JOIN_TIMEOUT_MS,
            health_check_interval_secs: DEFAULT_HEALTH_CHECK_INTERVAL_SECS,
            motion: InputConfig::with_pins(
                DEFAULT_MOTION_PIN,
                DEFAULT_MOTION_LED_PIN,
                DEFAULT_MOTION_POLL_MS,
            ),
            door: InputConfig::with_pins(
                DEFAULT_DOOR_PIN,
                DEFAULT_DOOR_LED_PIN,
                DEFAULT_CONTACT_POLL_MS,
            ),
            window: InputConfig::with_pins(
                DEFAULT_WINDOW_PIN,
                DEFAULT_WINDOW_LED_PIN,
                DEFAULT_CONTACT_POLL_MS,
            ),
            rfid: RfidConfig::default(),
            video: VideoConfig::default(),
            authorized_cards: None,
        }
    }
}

impl MonitorConfig {
    /// Parse and validate a TOML document.
    ///
    /// # Errors
    /// Returns `Error::ConfigParse` on malformed TOML (including card UIDs
    /// that are not exactly 5 bytes) and `Error::Config` when validation fails.
    pub fn from_toml_str(content: &str) -> Result<Self> {
        let config: MonitorConfig = toml::from_str(content)?;
        config.validate()?;
        Ok(config)
    }

    /// Read, parse and validate a TOML file.
    ///
    /// # Errors
    /// Returns `Error::Io` if the file cannot be read, otherwise the same
    /// errors as [`from_toml_str`](Self::from_toml_str).
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self> {
        let content = std::fs::read_to_string(path.as_ref())?;
        Self::from_toml_str(&content)
    }

    /// Check cross-field constraints.
    ///
    /// # Errors
    /// Returns `Error::Config` describing the first violated constraint.
    pub fn validate(&self) -> Result<()> {
        for (kind, input) in self.inputs() {
            if input.poll_interval_ms == 0 {
                return Err(Error::Config(format!(
                    "{kind} poll_interval_ms must be greater than zero"
                )));
            }
        }
        if self.rfid.poll_interval_ms == 0 {
            return Err(Error::Config(
                "rfid poll_interval_ms must be greater than zero".to_string(),
            ));
        }
        if self.error_backoff_ms == 0 {
            return Err(Error::Config(
                "error_backoff_ms must be greater than zero".to_string(),
            ));
        }

        let mut pins = HashSet::new();
        for (kind, input) in self.inputs() {
            if !pins.insert(input.pin) {
                return Err(Error::Config(format!(
                    "{kind} input pin {} is already in use",
                    input.pin
                )));
            }
        }

        if let Some(cards) = &self.authorized_cards {
            let mut seen = HashSet::new();
            for card in cards {
                if !card.uid.has_valid_bcc() {
                    return Err(Error::Config(format!(
                        "Authorized card {} ({}) has an invalid BCC byte",
                        card.uid, card.name
                    )));
                }
                if !seen.insert(card.uid) {
                    return Err(Error::Config(format!(
                        "Duplicate authorized card UID {}",
                        card.uid
                    )));
                }
            }
        }
        Ok(())
    }

    /// GPIO channels paired with their kind.
    pub fn inputs(&self) -> [(ChannelKind, &InputConfig); 3] {
        [
            (ChannelKind::Motion, &self.motion),
            (ChannelKind::Door, &self.door),
            (ChannelKind::Window, &self.window),
        ]
    }

    pub fn event_cooldown(&self) -> Duration {
        Duration::from_secs(self.event_cooldown_secs)
    }

    pub fn error_backoff(&self) -> Duration {
        Duration::from_millis(self.error_backoff_ms)
    }

    pub fn join_timeout(&self) -> Duration {
        Duration::from_millis(self.join_timeout_ms)
    }

    pub fn health_check_interval(&self) -> Duration {
        Duration::from_secs(self.health_check_interval_secs)
    }

    /// Build the immutable access table from configuration.
    ///
    /// # Errors
    /// Returns `Error::Config` on duplicate UIDs.
    pub fn access_table(&self) -> Result<AccessTable> {
        match &self.authorized_cards {
            Some(cards) => AccessTable::from_records(cards.iter().cloned()),
            None => Ok(AccessTable::default()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{AccessRole, CardUid};

    #[test]
    fn test_empty_document_yields_defaults() {
        let config = MonitorConfig::from_toml_str("").unwrap();
        assert_eq!(config, MonitorConfig::default());
        assert_eq!(config.motion.pin, 17);
        assert_eq!(config.door.pin, 27);
        assert_eq!(config.window.pin, 22);
        assert_eq!(config.event_cooldown(), Duration::from_secs(300));
    }

    #[test]
    fn test_partial_override() {
        let config = MonitorConfig::from_toml_str(
            r#"
            event_cooldown_secs = 60

            [door]
            pin = 5
            active_low = true

            [rfid]
            poll_interval_ms = 1500
            spi_device = 1
            reset_pin = 12
            "#,
        )
        .unwrap();

        assert_eq!(config.event_cooldown_secs, 60);
        assert_eq!(config.door.pin, 5);
        assert!(config.door.active_low);
        assert_eq!(config.door.led_pin, None);
        assert_eq!(config.door.poll_interval_ms, DEFAULT_CONTACT_POLL_MS);
        assert_eq!(config.door.location(), "pin_5");
        assert_eq!(config.rfid.poll_interval(), Duration::from_millis(1500));
        assert_eq!(config.rfid.speed_hz, DEFAULT_SPI_SPEED_HZ);
        assert_eq!(config.rfid.spidev_path(), "/dev/spidev0.1");
        assert_eq!(config.rfid.reset_pin, Some(12));
        assert_eq!(MonitorConfig::default().rfid.reset_pin, None);
        assert_eq!(config.motion.pin, DEFAULT_MOTION_PIN);
    }

    #[test]
    fn test_authorized_cards_section() {
        let config = MonitorConfig::from_toml_str(
            r#"
            [[authorized_cards]]
            uid = [1, 2, 3, 4, 4]
            name = "Night guard"
            role = "maintenance"
            "#,
        )
        .unwrap();

        let table = config.access_table().unwrap();
        assert_eq!(table.len(), 1);
        let decision = table.authenticate_card(&CardUid::new([1, 2, 3, 4, 4]));
        assert!(decision.granted);
        assert_eq!(decision.role, Some(AccessRole::Maintenance));
    }

    #[test]
    fn test_missing_cards_keeps_default_table() {
        let table = MonitorConfig::default().access_table().unwrap();
        assert_eq!(table.len(), 3);
    }

    #[test]
    fn test_short_uid_rejected() {
        let result = MonitorConfig::from_toml_str(
            r#"
            [[authorized_cards]]
            uid = [1, 2, 3, 4]
            name = "Broken"
            role = "admin"
            "#,
        );
        assert!(matches!(result, Err(Error::ConfigParse(_))));
    }

    #[test]
    fn test_invalid_bcc_rejected() {
        let result = MonitorConfig::from_toml_str(
            r#"
            [[authorized_cards]]
            uid = [1, 2, 3, 4, 5]
            name = "Typo"
            role = "admin"
            "#,
        );
        assert!(matches!(result, Err(Error::Config(_))));
    }

    #[test]
    fn test_zero_interval_rejected() {
        let result = MonitorConfig::from_toml_str(
            r#"
            [motion]
            pin = 4
            poll_interval_ms = 0
            "#,
        );
        assert!(matches!(result, Err(Error::Config(_))));
    }

    #[test]
    fn test_shared_pin_rejected() {
        let result = MonitorConfig::from_toml_str(
            r#"
            [window]
            pin = 27
            "#,
        );
        assert!(matches!(result, Err(Error::Config(_))));
    }

    #[test]
    fn test_unknown_role_rejected() {
        let result = MonitorConfig::from_toml_str(
            r#"
            [[authorized_cards]]
            uid = [1, 2, 3, 4, 4]
            name = "Visitor"
            role = "visitor"
            "#,
        );
        assert!(matches!(result, Err(Error::ConfigParse(_))));
    }
}
