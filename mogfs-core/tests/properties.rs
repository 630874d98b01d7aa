//! Property-based tests for mogfs core

use proptest::prelude::*;
use mogfs_core::*;

fn flatten(count_field: &str, prefix: &str, suffix: &str, values: &[String]) -> FieldSet {
    let mut fields = FieldSet::new();
    fields.insert(count_field, values.len().to_string());
    for (i, value) in values.iter().enumerate() {
        fields.insert(format!("{}{}{}", prefix, i + 1, suffix), value.clone());
    }
    fields
}

proptest! {
    #[test]
    fn props_indexed_preserves_order(
        values in prop::collection::vec("[a-z0-9/._-]{1,24}", 0..40)
    ) {
        // More than nine entries makes lexical and numeric order disagree
        let fields = flatten("paths", "path", "", &values);

        let decoded = paths_from_fields(&fields).unwrap();

        prop_assert_eq!(decoded, values);
    }

    #[test]
    fn props_indexed_ignores_entries_past_count(
        values in prop::collection::vec("[a-z]{1,8}", 1..20),
        extra in "[a-z]{1,8}"
    ) {
        let mut fields = flatten("key_count", "key_", "", &values);
        fields.insert(format!("key_{}", values.len() + 1), extra);

        let list = KeyList::from_fields(&fields).unwrap();

        prop_assert_eq!(list.keys.len(), values.len());
    }

    #[test]
    fn props_keys_without_control_chars_are_valid(key in "[^\\p{Cc}]{1,64}") {
        prop_assert!(Key::new(&key).is_ok());
    }
}

#[cfg(test)]
mod suffix_tests {
    use super::*;

    #[test]
    fn test_suffixed_sequence() {
        let fields = flatten(
            "fid_count",
            "fid_",
            "_fid",
            &["5".to_string(), "6".to_string()],
        );

        let fids = fields
            .indexed("fid_count", "fid_", |e| e.require_parsed::<u64>("_fid"))
            .unwrap();

        assert_eq!(fids, vec![5, 6]);
    }
}
