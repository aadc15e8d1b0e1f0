use crate::{
    Result,
    constants::{CARD_UID_LENGTH, CARD_UID_SERIAL_LENGTH},
    error::Error,
};
use serde::{Deserialize, Serialize};
use std::fmt;
use subtle::ConstantTimeEq;

/// Card identifier as returned by cascade-level-1 anti-collision.
///
/// Always exactly 5 bytes: the 4-byte serial number followed by its BCC
/// check byte. Used only as a lookup key into the access table.
///
/// # Security
/// Equality is byte-wise and constant-time so that table lookups do not leak
/// how many leading bytes of a presented card matched an authorized one.
///
/// # Examples
///
/// ```
/// use roomwatch_core::CardUid;
///
/// let uid = CardUid::try_from(&[5u8, 74, 28, 185, 234][..]).unwrap();
/// assert!(uid.has_valid_bcc());
/// assert_eq!(uid.to_string(), "5-74-28-185-234");
///
/// assert!(CardUid::try_from(&[1u8, 2, 3, 4][..]).is_err());
/// ```
#[derive(Debug, Clone, Copy, Eq, Serialize, Deserialize)]
#[serde(try_from = "Vec<u8>", into = "Vec<u8>")]
pub struct CardUid([u8; CARD_UID_LENGTH]);

impl CardUid {
    /// Create a card identifier from its five raw bytes.
    #[must_use]
    pub const fn new(bytes: [u8; CARD_UID_LENGTH]) -> Self {
        CardUid(bytes)
    }

    /// Create a card identifier from a 4-byte serial, computing the BCC.
    #[must_use]
    pub fn from_serial(serial: [u8; CARD_UID_SERIAL_LENGTH]) -> Self {
        let bcc = serial.iter().fold(0u8, |acc, b| acc ^ b);
        CardUid([serial[0], serial[1], serial[2], serial[3], bcc])
    }

    /// Get the raw bytes.
    #[must_use]
    pub fn as_bytes(&self) -> &[u8; CARD_UID_LENGTH] {
        &self.0
    }

    /// The 4 serial-number bytes, without the BCC.
    #[must_use]
    pub fn serial(&self) -> &[u8] {
        &self.0[..CARD_UID_SERIAL_LENGTH]
    }

    /// The BCC check byte.
    #[must_use]
    pub fn bcc(&self) -> u8 {
        self.0[CARD_UID_SERIAL_LENGTH]
    }

    /// Returns `true` if XOR of the serial bytes equals the BCC byte.
    #[must_use]
    pub fn has_valid_bcc(&self) -> bool {
        self.serial().iter().fold(0u8, |acc, b| acc ^ b) == self.bcc()
    }

    /// Uppercase hex representation without separators.
    #[must_use]
    pub fn to_hex(&self) -> String {
        self.0.iter().map(|b| format!("{b:02X}")).collect()
    }
}

impl TryFrom<&[u8]> for CardUid {
    type Error = Error;

    fn try_from(bytes: &[u8]) -> Result<Self> {
        let array: [u8; CARD_UID_LENGTH] =
            bytes.try_into().map_err(|_| Error::InvalidUid {
                expected: CARD_UID_LENGTH,
                actual: bytes.len(),
            })?;
        Ok(CardUid(array))
    }
}

impl TryFrom<Vec<u8>> for CardUid {
    type Error = Error;

    fn try_from(bytes: Vec<u8>) -> Result<Self> {
        CardUid::try_from(bytes.as_slice())
    }
}

impl From<CardUid> for Vec<u8> {
    fn from(uid: CardUid) -> Self {
        uid.0.to_vec()
    }
}

impl PartialEq for CardUid {
    fn eq(&self, other: &Self) -> bool {
        self.0.ct_eq(&other.0).into()
    }
}

impl std::hash::Hash for CardUid {
    fn hash<H: std::hash::Hasher>(&self, state: &mut H) {
        self.0.hash(state);
    }
}

/// Dash-joined decimal bytes, e.g. `5-74-28-185-234`.
impl fmt::Display for CardUid {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        let [a, b, c, d, e] = self.0;
        write!(f, "{a}-{b}-{c}-{d}-{e}")
    }
}

/// Role granted to an authorized card.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AccessRole {
    Admin,
    ItStaff,
    Maintenance,
}

impl AccessRole {
    /// Stable name used in logs, status output and configuration.
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            AccessRole::Admin => "admin",
            AccessRole::ItStaff => "it_staff",
            AccessRole::Maintenance => "maintenance",
        }
    }
}

impl fmt::Display for AccessRole {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for AccessRole {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "admin" => Ok(AccessRole::Admin),
            "it_staff" => Ok(AccessRole::ItStaff),
            "maintenance" => Ok(AccessRole::Maintenance),
            _ => Err(Error::UnknownRole(s.to_string())),
        }
    }
}

/// One entry of the authorized-card table.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AccessRecord {
    pub uid: CardUid,
    pub name: String,
    pub role: AccessRole,
}

impl AccessRecord {
    pub fn new(uid: CardUid, name: impl Into<String>, role: AccessRole) -> Self {
        Self {
            uid,
            name: name.into(),
            role,
        }
    }
}

/// Kind of physical input behind a sensor channel.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ChannelKind {
    Motion,
    Door,
    Window,
    Rfid,
    /// The capture device. Has no polling worker; its entry tracks the
    /// outcome of the last capture.
    Camera,
}

impl ChannelKind {
    /// Default channel id used in the status table.
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            ChannelKind::Motion => "motion",
            ChannelKind::Door => "door",
            ChannelKind::Window => "window",
            ChannelKind::Rfid => "rfid",
            ChannelKind::Camera => "camera",
        }
    }

    /// Returns `true` for door and window reed switches.
    #[inline]
    #[must_use]
    pub fn is_contact(self) -> bool {
        matches!(self, ChannelKind::Door | ChannelKind::Window)
    }
}

impl fmt::Display for ChannelKind {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for ChannelKind {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "motion" => Ok(ChannelKind::Motion),
            "door" => Ok(ChannelKind::Door),
            "window" => Ok(ChannelKind::Window),
            "rfid" => Ok(ChannelKind::Rfid),
            "camera" => Ok(ChannelKind::Camera),
            _ => Err(Error::UnknownChannelKind(s.to_string())),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    #[rstest]
    #[case(&[5, 74, 28, 185, 234], true)]
    #[case(&[83, 164, 247, 164, 164], true)]
    #[case(&[20, 38, 121, 207, 132], true)]
    #[case(&[1, 2, 3, 4, 5], false)]
    #[case(&[0, 0, 0, 0, 0], true)]
    fn test_card_uid_bcc(#[case] bytes: &[u8], #[case] valid: bool) {
        let uid = CardUid::try_from(bytes).unwrap();
        assert_eq!(uid.has_valid_bcc(), valid);
    }

    #[rstest]
    #[case(&[])]
    #[case(&[1, 2, 3, 4])]
    #[case(&[1, 2, 3, 4, 4, 6])]
    fn test_card_uid_wrong_length(#[case] bytes: &[u8]) {
        let err = CardUid::try_from(bytes).unwrap_err();
        assert!(matches!(err, Error::InvalidUid { expected: 5, .. }));
    }

    #[test]
    fn test_card_uid_from_serial_computes_bcc() {
        let uid = CardUid::from_serial([5, 74, 28, 185]);
        assert_eq!(uid.as_bytes(), &[5, 74, 28, 185, 234]);
        assert!(uid.has_valid_bcc());
    }

    #[test]
    fn test_card_uid_display_and_hex() {
        let uid = CardUid::new([5, 74, 28, 185, 234]);
        assert_eq!(uid.to_string(), "5-74-28-185-234");
        assert_eq!(uid.to_hex(), "054A1CB9EA");
    }

    #[test]
    fn test_card_uid_equality_is_bytewise() {
        let a = CardUid::new([1, 2, 3, 4, 4]);
        let b = CardUid::try_from(vec![1, 2, 3, 4, 4]).unwrap();
        let c = CardUid::new([1, 2, 3, 4, 5]);
        assert_eq!(a, b);
        assert_ne!(a, c);
    }

    #[test]
    fn test_card_uid_serde_rejects_bad_length() {
        #[derive(Deserialize)]
        struct Wrapper {
            uid: CardUid,
        }

        let ok: Wrapper = toml::from_str("uid = [5, 74, 28, 185, 234]").unwrap();
        assert_eq!(ok.uid, CardUid::new([5, 74, 28, 185, 234]));

        let bad: std::result::Result<Wrapper, _> = toml::from_str("uid = [5, 74, 28]");
        assert!(bad.is_err());
    }

    #[rstest]
    #[case("admin", AccessRole::Admin)]
    #[case("it_staff", AccessRole::ItStaff)]
    #[case("maintenance", AccessRole::Maintenance)]
    fn test_access_role_roundtrip(#[case] name: &str, #[case] role: AccessRole) {
        assert_eq!(name.parse::<AccessRole>().unwrap(), role);
        assert_eq!(role.to_string(), name);
    }

    #[test]
    fn test_access_role_unknown() {
        assert!("janitor".parse::<AccessRole>().is_err());
    }

    #[test]
    fn test_channel_kind() {
        assert!(ChannelKind::Door.is_contact());
        assert!(ChannelKind::Window.is_contact());
        assert!(!ChannelKind::Motion.is_contact());
        assert!(!ChannelKind::Rfid.is_contact());
        assert_eq!("rfid".parse::<ChannelKind>().unwrap(), ChannelKind::Rfid);
        assert_eq!("camera".parse::<ChannelKind>().unwrap(), ChannelKind::Camera);
        assert!("speaker".parse::<ChannelKind>().is_err());
    }
}
