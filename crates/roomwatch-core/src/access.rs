//! Static authorized-card table.
//!
//! The table is built once at startup, either from the built-in defaults or
//! from configuration, and is read-only afterwards. It is passed explicitly
//! (usually behind an `Arc`) to whoever needs to authenticate a card; there is
//! no global instance and no mutating API.

use crate::{AccessRecord, AccessRole, CardUid, Error, Result};
use std::collections::HashMap;
use tracing::{info, warn};

/// Result of looking up a card in the access table.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AccessDecision {
    pub granted: bool,
    pub role: Option<AccessRole>,
}

impl AccessDecision {
    /// Decision for a card that is not in the table.
    pub const DENIED: AccessDecision = AccessDecision {
        granted: false,
        role: None,
    };

    fn granted(role: AccessRole) -> Self {
        Self {
            granted: true,
            role: Some(role),
        }
    }
}

/// Immutable UID → record lookup.
///
/// # Examples
///
/// ```
/// use roomwatch_core::{AccessRole, AccessTable, CardUid};
///
/// let table = AccessTable::default();
///
/// let admin = table.authenticate_card(&CardUid::new([5, 74, 28, 185, 234]));
/// assert!(admin.granted);
/// assert_eq!(admin.role, Some(AccessRole::Admin));
///
/// let stranger = table.authenticate_card(&CardUid::new([1, 2, 3, 4, 5]));
/// assert!(!stranger.granted);
/// assert_eq!(stranger.role, None);
/// ```
#[derive(Debug, Clone)]
pub struct AccessTable {
    records: HashMap<CardUid, AccessRecord>,
}

impl AccessTable {
    /// Build the table from a list of records.
    ///
    /// # Errors
    /// Returns `Error::Config` if two records share the same UID.
    pub fn from_records(records: impl IntoIterator<Item = AccessRecord>) -> Result<Self> {
        let mut map = HashMap::new();
        for record in records {
            if !record.uid.has_valid_bcc() {
                warn!(uid = %record.uid, name = %record.name, "Authorized card has an invalid BCC byte and can never be read");
            }
            if let Some(previous) = map.insert(record.uid, record) {
                return Err(Error::Config(format!(
                    "Duplicate authorized card UID {}",
                    previous.uid
                )));
            }
        }
        info!(cards = map.len(), "Access table loaded");
        Ok(Self { records: map })
    }

    /// Look up a card. Pure: never touches the bus, identical input always
    /// yields the identical decision, unknown cards are denied.
    #[must_use]
    pub fn authenticate_card(&self, uid: &CardUid) -> AccessDecision {
        match self.records.get(uid) {
            Some(record) => AccessDecision::granted(record.role),
            None => AccessDecision::DENIED,
        }
    }

    /// Full record for a card, if authorized.
    #[must_use]
    pub fn record(&self, uid: &CardUid) -> Option<&AccessRecord> {
        self.records.get(uid)
    }

    /// Number of authorized cards.
    #[must_use]
    pub fn len(&self) -> usize {
        self.records.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    /// The built-in card list deployed with the node.
    #[must_use]
    pub fn default_records() -> Vec<AccessRecord> {
        vec![
            AccessRecord::new(CardUid::new([5, 74, 28, 185, 234]), "Card A", AccessRole::Admin),
            AccessRecord::new(
                CardUid::new([83, 164, 247, 164, 164]),
                "Card B",
                AccessRole::ItStaff,
            ),
            AccessRecord::new(
                CardUid::new([20, 38, 121, 207, 132]),
                "Card C",
                AccessRole::Maintenance,
            ),
        ]
    }
}

impl Default for AccessTable {
    fn default() -> Self {
        let records = Self::default_records()
            .into_iter()
            .map(|record| (record.uid, record))
            .collect();
        Self { records }
    }
}
