//! Property-based tests for card identifiers and access lookup.

use proptest::prelude::*;
use roomwatch_core::{AccessRecord, AccessRole, AccessTable, CardUid};

/// Strategy for generating card serial numbers (4 bytes, BCC computed later).
fn card_serial() -> impl Strategy<Value = [u8; 4]> {
    any::<[u8; 4]>()
}

fn access_role() -> impl Strategy<Value = AccessRole> {
    prop_oneof![
        Just(AccessRole::Admin),
        Just(AccessRole::ItStaff),
        Just(AccessRole::Maintenance),
    ]
}

proptest! {
    /// Property: a UID built from its serial always carries a valid BCC.
    #[test]
    fn prop_from_serial_has_valid_bcc(serial in card_serial()) {
        let uid = CardUid::from_serial(serial);
        prop_assert!(uid.has_valid_bcc());
        prop_assert_eq!(uid.serial(), &serial[..]);
    }

    /// Property: flipping any bit of the BCC byte invalidates it.
    #[test]
    fn prop_corrupted_bcc_rejected(serial in card_serial(), bit in 0u8..8) {
        let mut bytes = *CardUid::from_serial(serial).as_bytes();
        bytes[4] ^= 1 << bit;
        prop_assert!(!CardUid::new(bytes).has_valid_bcc());
    }

    /// Property: only 5-byte slices become card identifiers.
    #[test]
    fn prop_slice_length_enforced(bytes in prop::collection::vec(any::<u8>(), 0..12)) {
        let result = CardUid::try_from(bytes.as_slice());
        prop_assert_eq!(result.is_ok(), bytes.len() == 5);
    }

    /// Property: lookup grants exactly the cards in the table with their role.
    #[test]
    fn prop_lookup_matches_table(
        serials in prop::collection::hash_set(card_serial(), 1..8),
        probe in card_serial(),
        role in access_role(),
    ) {
        let records: Vec<AccessRecord> = serials
            .iter()
            .map(|serial| AccessRecord::new(CardUid::from_serial(*serial), "card", role))
            .collect();
        let table = AccessTable::from_records(records).unwrap();

        let decision = table.authenticate_card(&CardUid::from_serial(probe));
        prop_assert_eq!(decision.granted, serials.contains(&probe));
        if decision.granted {
            prop_assert_eq!(decision.role, Some(role));
        } else {
            prop_assert_eq!(decision.role, None);
        }
    }
}
