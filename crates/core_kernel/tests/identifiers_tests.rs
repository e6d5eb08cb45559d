//! Unit tests for the Identifiers module
//!
//! Covers creation, parsing, conversion, and display formatting of the
//! session, line item, adjustment and product identifiers.

use core_kernel::{OpnameId, LineItemId, AdjustmentId, ProductId};
use proptest::prelude::*;
use uuid::Uuid;

mod opname_id_tests {
    use super::*;

    #[test]
    fn test_new_generates_unique_ids() {
        let id1 = OpnameId::new();
        let id2 = OpnameId::new();
        assert_ne!(id1, id2);
    }

    #[test]
    fn test_new_v7_generates_time_ordered_ids() {
        let id1 = OpnameId::new_v7();
        std::thread::sleep(std::time::Duration::from_millis(1));
        let id2 = OpnameId::new_v7();
        let uuid1: Uuid = id1.into();
        let uuid2: Uuid = id2.into();
        assert!(uuid1 < uuid2);
    }

    #[test]
    fn test_prefix() {
        assert_eq!(OpnameId::prefix(), "OPN");
    }

    #[test]
    fn test_from_str_with_and_without_prefix() {
        let original = OpnameId::new();
        let with_prefix: OpnameId = original.to_string().parse().unwrap();
        let bare: OpnameId = original.as_uuid().to_string().parse().unwrap();
        assert_eq!(original, with_prefix);
        assert_eq!(original, bare);
    }

    #[test]
    fn test_from_str_rejects_garbage() {
        let parsed = "OPN-not-a-uuid".parse::<OpnameId>();
        assert!(parsed.is_err());
    }

    #[test]
    fn test_json_serialization_is_transparent() {
        let id = OpnameId::new();
        let json = serde_json::to_string(&id).unwrap();
        assert_eq!(json, format!("\"{}\"", id.as_uuid()));
        let deserialized: OpnameId = serde_json::from_str(&json).unwrap();
        assert_eq!(id, deserialized);
    }
}

mod line_item_and_adjustment_id_tests {
    use super::*;

    #[test]
    fn test_prefixes() {
        assert_eq!(LineItemId::prefix(), "OPNL");
        assert_eq!(AdjustmentId::prefix(), "ADJ");
        assert!(AdjustmentId::new().to_string().starts_with("ADJ-"));
    }

    #[test]
    fn test_uuid_round_trip() {
        let uuid = Uuid::new_v4();
        let id = LineItemId::from_uuid(uuid);
        let back: Uuid = id.into();
        assert_eq!(uuid, back);
    }
}

mod product_id_tests {
    use super::*;

    #[test]
    fn test_display_matches_input() {
        let id = ProductId::new("P-001");
        assert_eq!(id.to_string(), "P-001");
        assert_eq!(id.as_ref(), "P-001");
    }

    #[test]
    fn test_conversions() {
        let from_str: ProductId = "42".into();
        let from_string: ProductId = String::from("42").into();
        assert_eq!(from_str, from_string);
    }

    #[test]
    fn test_deserialization_trims() {
        let id: ProductId = serde_json::from_str("\"  SKU-7 \"").unwrap();
        assert_eq!(id.as_str(), "SKU-7");
        assert_eq!(serde_json::to_string(&id).unwrap(), "\"SKU-7\"");
    }

    proptest! {
        #[test]
        fn product_id_never_keeps_outer_whitespace(raw in "[ ]{0,3}[A-Za-z0-9-]{1,12}[ ]{0,3}") {
            let id = ProductId::new(raw.clone());
            prop_assert_eq!(id.as_str(), raw.trim());
        }
    }
}
