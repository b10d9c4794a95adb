use relaysock::core::errors::classify_io_kind;
use relaysock::core::{CustomProtocolNumber, FaultClass, RelayError};
use std::io::{Error, ErrorKind};

#[test]
fn test_transport_fatal_kinds() {
    for kind in [
        ErrorKind::ConnectionReset,
        ErrorKind::ConnectionAborted,
        ErrorKind::BrokenPipe,
        ErrorKind::UnexpectedEof,
        ErrorKind::NotConnected,
        ErrorKind::InvalidData,
    ] {
        assert_eq!(
            RelayError::from(Error::from(kind)).fault_class(),
            FaultClass::TransportFatal,
            "{kind:?} should be fatal"
        );
    }
}

#[test]
fn test_transport_transient_kinds() {
    for kind in [
        ErrorKind::WouldBlock,
        ErrorKind::Interrupted,
        ErrorKind::TimedOut,
    ] {
        assert_eq!(classify_io_kind(kind), FaultClass::TransportTransient);
    }
    assert!(RelayError::from(Error::from(ErrorKind::Interrupted)).is_silent());
    assert!(!RelayError::from(Error::from(ErrorKind::WouldBlock)).is_silent());
}

#[test]
fn test_wrapped_rustls_error_is_tls_and_fatal() {
    let io_err = Error::new(
        ErrorKind::InvalidData,
        rustls::Error::DecryptError,
    );
    let err = RelayError::from(io_err);
    assert!(matches!(err, RelayError::Tls(_)));
    assert_eq!(err.fault_class(), FaultClass::TransportFatal);
}

#[test]
fn test_payload_faults() {
    for err in [
        RelayError::MalformedPayload("bad".into()),
        RelayError::FrameTooLarge(1 << 20),
        RelayError::UnknownProtocol(77),
    ] {
        assert_eq!(err.fault_class(), FaultClass::PayloadMalformed);
    }
    let json_err = serde_json::from_str::<serde_json::Value>("{").unwrap_err();
    assert_eq!(
        RelayError::from(json_err).fault_class(),
        FaultClass::PayloadMalformed
    );
}

#[test]
fn test_everything_else_is_unclassified() {
    assert_eq!(
        RelayError::from(Error::from(ErrorKind::PermissionDenied)).fault_class(),
        FaultClass::Unclassified
    );
    assert_eq!(
        RelayError::Internal("boom".into()).fault_class(),
        FaultClass::Unclassified
    );
    assert_eq!(
        RelayError::ProtocolNotFound(CustomProtocolNumber::DiceListJustForTest).fault_class(),
        FaultClass::Unclassified
    );
}

#[test]
fn test_error_messages() {
    assert_eq!(
        RelayError::DuplicateProtocol(CustomProtocolNumber::DiceRollJustForTest).to_string(),
        "Protocol DICE_ROLL_JUST_FOR_TEST is already registered"
    );
    assert_eq!(
        RelayError::UnknownProtocol(9).to_string(),
        "Unknown protocol number 9"
    );
}
