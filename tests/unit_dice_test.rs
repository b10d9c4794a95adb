use relaysock::core::RelayError;
use relaysock::core::dice::DiceService;
use relaysock::core::protocol::CustomProtocolNumber;
use relaysock::server::init_protocols;
use serde_json::{Map, Value, json};
use std::sync::Arc;

fn payload(value: Value) -> Map<String, Value> {
    value.as_object().cloned().unwrap()
}

#[test]
fn test_roll_defaults_to_one_die() {
    let dice = DiceService::with_seed(7);
    let roll = dice.roll_dice(&Map::new()).unwrap();
    let faces = roll["faces"].as_array().unwrap();
    assert_eq!(faces.len(), 1);
    let face = faces[0].as_u64().unwrap();
    assert!((1..=6).contains(&face));
    assert_eq!(roll["total"].as_u64().unwrap(), face);
}

#[test]
fn test_roll_respects_dice_count() {
    let dice = DiceService::with_seed(42);
    let roll = dice.roll_dice(&payload(json!({"diceCount": 5}))).unwrap();
    let faces: Vec<u64> = roll["faces"]
        .as_array()
        .unwrap()
        .iter()
        .map(|f| f.as_u64().unwrap())
        .collect();
    assert_eq!(faces.len(), 5);
    assert!(faces.iter().all(|f| (1..=6).contains(f)));
    assert_eq!(roll["total"].as_u64().unwrap(), faces.iter().sum::<u64>());
}

#[test]
fn test_same_seed_rolls_the_same() {
    let a = DiceService::with_seed(99);
    let b = DiceService::with_seed(99);
    let data = payload(json!({"diceCount": 10}));
    assert_eq!(a.roll_dice(&data).unwrap(), b.roll_dice(&data).unwrap());
}

#[test]
fn test_roll_rejects_bad_counts() {
    let dice = DiceService::with_seed(1);
    for data in [
        json!({"diceCount": 0}),
        json!({"diceCount": 101}),
        json!({"diceCount": -3}),
        json!({"diceCount": "two"}),
    ] {
        let err = dice.roll_dice(&payload(data)).unwrap_err();
        assert!(matches!(err, RelayError::InvalidArgument(_)));
    }
    assert_eq!(dice.dice_list(&Map::new()).unwrap()["count"], json!(0));
}

#[test]
fn test_list_returns_rolls_in_order() {
    let dice = DiceService::with_seed(3);
    let first = dice.roll_dice(&payload(json!({"diceCount": 2}))).unwrap();
    let second = dice.roll_dice(&Map::new()).unwrap();

    let list = dice.dice_list(&Map::new()).unwrap();
    assert_eq!(list["count"], json!(2));
    assert_eq!(list["rolls"][0], first);
    assert_eq!(list["rolls"][1], second);
    assert_eq!(list["rolls"][0]["id"], json!(1));
    assert_eq!(list["rolls"][1]["id"], json!(2));
}

#[test]
fn test_history_keeps_only_the_latest_rolls() {
    let dice = DiceService::with_seed(9);
    for _ in 0..105 {
        dice.roll_dice(&Map::new()).unwrap();
    }

    let list = dice.dice_list(&Map::new()).unwrap();
    let rolls = list["rolls"].as_array().unwrap();
    assert_eq!(list["count"], json!(100));
    assert_eq!(rolls.len(), 100);
    assert_eq!(rolls[0]["id"], json!(6));
    assert_eq!(rolls[99]["id"], json!(105));
}

#[test]
fn test_default_protocols_are_wired_to_the_dice_service() {
    let dice = Arc::new(DiceService::with_seed(5));
    let registry = init_protocols(&dice).unwrap();
    assert_eq!(registry.len(), 2);

    let roll = registry
        .resolve(CustomProtocolNumber::DiceRollJustForTest)
        .ok()
        .unwrap();
    roll.handle(&payload(json!({"diceCount": 3}))).unwrap();

    let list = registry
        .resolve(CustomProtocolNumber::DiceListJustForTest)
        .ok()
        .unwrap();
    let listed = list.handle(&Map::new()).unwrap();
    assert_eq!(listed["count"], json!(1));
    assert_eq!(listed["rolls"][0]["faces"].as_array().unwrap().len(), 3);
}
