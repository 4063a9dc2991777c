//! Property-based tests for name handling and options.

mod common;

use common::FakeLocalDb;
use proptest::prelude::*;
use sqllocaldb::{
    SqlLocalDbApi, SqlLocalDbError, SqlLocalDbOptions, StopInstanceOptions, ValidationError,
    is_default_instance_name,
};

fn flip_case(name: &str, mask: &[bool]) -> String {
    name.chars()
        .zip(mask.iter().chain(std::iter::repeat(&false)))
        .map(|(c, upper)| if *upper { c.to_ascii_uppercase() } else { c.to_ascii_lowercase() })
        .collect()
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(200))]

    #[test]
    fn prop_default_names_ignore_case(mask in prop::collection::vec(any::<bool>(), 12)) {
        prop_assert!(is_default_instance_name(&flip_case("MSSQLLocalDB", &mask)));
        prop_assert!(is_default_instance_name(&flip_case("v11.0", &mask)));
    }

    #[test]
    fn prop_other_names_are_not_default(name in "[A-Za-z][A-Za-z0-9_]{0,20}") {
        prop_assume!(!name.eq_ignore_ascii_case("MSSQLLocalDB"));
        prop_assert!(!is_default_instance_name(&name));
    }

    #[test]
    fn prop_stop_options_survive_json(bits in 0u32..4, timeout in 0i64..3600) {
        let options = SqlLocalDbOptions {
            stop_options: StopInstanceOptions::from_bits_truncate(bits),
            stop_timeout_seconds: timeout,
            ..SqlLocalDbOptions::default()
        };
        let json = serde_json::to_string(&options)
            .map_err(|e| TestCaseError::fail(e.to_string()))?;
        let parsed = SqlLocalDbOptions::from_json(&json)
            .map_err(|e| TestCaseError::fail(e.to_string()))?;
        prop_assert_eq!(parsed, options);
    }

    #[test]
    fn prop_negative_timeouts_are_rejected(timeout in i64::MIN..0) {
        let fake = FakeLocalDb::installed(&["15.0"]).with_instance("Scratch", "15.0", false);
        let api = SqlLocalDbApi::with_api(fake.clone(), SqlLocalDbOptions::default());

        let result = api.stop_instance("Scratch", StopInstanceOptions::NONE, timeout);

        prop_assert_eq!(
            result,
            Err(SqlLocalDbError::Validation(ValidationError::NegativeTimeout(timeout)))
        );
        prop_assert_eq!(fake.call_count("stop_instance"), 0);
    }
}
