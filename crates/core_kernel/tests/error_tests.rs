//! Tests for core_kernel error types

use core_kernel::error::CoreError;
use core_kernel::OpnameId;

#[test]
fn test_core_error_from_uuid_error() {
    let parse_error = "OPN-xyz".parse::<OpnameId>().unwrap_err();
    let core_error: CoreError = parse_error.into();

    assert!(matches!(core_error, CoreError::InvalidIdentifier(_)));
    assert!(core_error.to_string().starts_with("Invalid identifier"));
}

#[test]
fn test_core_error_configuration() {
    let error = CoreError::configuration("Missing database url");

    match &error {
        CoreError::Configuration(msg) => assert_eq!(msg, "Missing database url"),
        _ => panic!("Expected Configuration error"),
    }
    assert!(error.to_string().contains("Configuration error"));
}
