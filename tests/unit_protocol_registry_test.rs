use relaysock::core::RelayError;
use relaysock::core::protocol::{CustomProtocolNumber, ProtocolHandler, ProtocolRegistry};
use serde_json::{Map, Value, json};
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};

fn constant_handler(value: Value) -> Arc<dyn ProtocolHandler> {
    Arc::new(move |_: &Map<String, Value>| -> Result<Value, RelayError> {
        Ok(value.clone())
    })
}

#[test]
fn test_resolve_returns_the_registered_handler() {
    let mut registry = ProtocolRegistry::new();
    let roll = constant_handler(json!("roll"));
    let list = constant_handler(json!("list"));
    registry
        .register(CustomProtocolNumber::DiceRollJustForTest, roll.clone())
        .unwrap();
    registry
        .register(CustomProtocolNumber::DiceListJustForTest, list.clone())
        .unwrap();

    let resolved = registry
        .resolve(CustomProtocolNumber::DiceRollJustForTest)
        .unwrap();
    assert!(Arc::ptr_eq(&resolved, &roll));
    let resolved = registry
        .resolve(CustomProtocolNumber::DiceListJustForTest)
        .unwrap();
    assert!(Arc::ptr_eq(&resolved, &list));
    assert_eq!(registry.len(), 2);
}

#[test]
fn test_resolve_unregistered_protocol_fails() {
    let mut registry = ProtocolRegistry::new();
    registry
        .register(
            CustomProtocolNumber::DiceRollJustForTest,
            constant_handler(json!(1)),
        )
        .unwrap();

    let err = registry
        .resolve(CustomProtocolNumber::DiceListJustForTest)
        .err()
        .unwrap();
    assert_eq!(
        err,
        RelayError::ProtocolNotFound(CustomProtocolNumber::DiceListJustForTest)
    );
}

#[test]
fn test_duplicate_registration_is_rejected_and_keeps_original() {
    let mut registry = ProtocolRegistry::new();
    let original = constant_handler(json!("first"));
    registry
        .register(CustomProtocolNumber::DiceRollJustForTest, original.clone())
        .unwrap();

    let err = registry
        .register(
            CustomProtocolNumber::DiceRollJustForTest,
            constant_handler(json!("second")),
        )
        .unwrap_err();
    assert_eq!(
        err,
        RelayError::DuplicateProtocol(CustomProtocolNumber::DiceRollJustForTest)
    );

    let resolved = registry
        .resolve(CustomProtocolNumber::DiceRollJustForTest)
        .unwrap();
    assert!(Arc::ptr_eq(&resolved, &original));
    assert_eq!(resolved.handle(&Map::new()).unwrap(), json!("first"));
}

#[test]
fn test_resolve_raw_distinguishes_unknown_from_unregistered() {
    let registry = ProtocolRegistry::new();
    assert_eq!(
        registry.resolve_raw(999).err().unwrap(),
        RelayError::UnknownProtocol(999)
    );
    assert_eq!(
        registry.resolve_raw(1).err().unwrap(),
        RelayError::ProtocolNotFound(CustomProtocolNumber::DiceRollJustForTest)
    );
}

#[test]
fn test_resolve_has_no_side_effects() {
    let calls = Arc::new(AtomicUsize::new(0));
    let counter = calls.clone();
    let mut registry = ProtocolRegistry::new();
    registry
        .register(
            CustomProtocolNumber::DiceRollJustForTest,
            Arc::new(move |_: &Map<String, Value>| -> Result<Value, RelayError> {
                counter.fetch_add(1, Ordering::SeqCst);
                Ok(Value::Null)
            }),
        )
        .unwrap();

    for _ in 0..3 {
        registry
            .resolve(CustomProtocolNumber::DiceRollJustForTest)
            .unwrap();
    }
    assert_eq!(calls.load(Ordering::SeqCst), 0);
}

#[test]
fn test_protocols_are_listed_in_order() {
    let mut registry = ProtocolRegistry::new();
    assert!(registry.is_empty());
    registry
        .register(
            CustomProtocolNumber::DiceListJustForTest,
            constant_handler(json!(2)),
        )
        .unwrap();
    registry
        .register(
            CustomProtocolNumber::DiceRollJustForTest,
            constant_handler(json!(1)),
        )
        .unwrap();
    assert_eq!(
        registry.protocols(),
        vec![
            CustomProtocolNumber::DiceRollJustForTest,
            CustomProtocolNumber::DiceListJustForTest
        ]
    );
    assert!(registry.contains(CustomProtocolNumber::DiceListJustForTest));
}

#[test]
fn test_protocol_number_conversions() {
    assert_eq!(
        CustomProtocolNumber::try_from(2).unwrap(),
        CustomProtocolNumber::DiceListJustForTest
    );
    assert_eq!(CustomProtocolNumber::DiceRollJustForTest.value(), 1);
    assert_eq!(
        CustomProtocolNumber::DiceRollJustForTest.to_string(),
        "DICE_ROLL_JUST_FOR_TEST"
    );
    assert!(CustomProtocolNumber::try_from(0).is_err());
    assert!(CustomProtocolNumber::try_from(-1).is_err());
}
