//! Property-based tests for code lookup and validation.

use proptest::prelude::*;
use sqllocaldb_errors::{
    ErrorCode, ErrorKind, NativeError, SqlLocalDbError, ValidationError,
    validation::MAX_INSTANCE_NAME_LENGTH,
};

proptest! {
    #[test]
    fn test_from_code_agrees_with_code(raw in any::<i32>()) {
        if let Some(code) = ErrorCode::from_code(raw) {
            prop_assert_eq!(code.code(), raw);
        }
    }

    #[test]
    fn test_native_error_preserves_code(raw in any::<i32>(), name in "[A-Za-z0-9_]{1,16}") {
        let err: SqlLocalDbError = NativeError::new(raw, "failure").with_instance(name.clone()).into();
        prop_assert_eq!(err.code(), raw);
        prop_assert_eq!(err.instance_name(), Some(name.as_str()));
        if ErrorCode::from_code(raw).is_none() {
            prop_assert_eq!(err.kind(), ErrorKind::NativeFailure);
        }
    }

    #[test]
    fn test_timeout_accepts_non_negative(seconds in 0i64..=i64::from(u32::MAX)) {
        prop_assert_eq!(ValidationError::check_timeout(seconds), Ok(seconds as u32));
    }

    #[test]
    fn test_timeout_rejects_negative(seconds in i64::MIN..0) {
        prop_assert_eq!(
            ValidationError::check_timeout(seconds),
            Err(ValidationError::NegativeTimeout(seconds))
        );
    }

    #[test]
    fn test_name_length_limit(len in 1usize..=(MAX_INSTANCE_NAME_LENGTH * 2)) {
        let name = "n".repeat(len);
        let result = ValidationError::check_instance_name(&name);
        prop_assert_eq!(result.is_ok(), len <= MAX_INSTANCE_NAME_LENGTH);
    }
}
