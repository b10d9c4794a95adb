// src/core/protocol/number.rs

//! The closed set of protocol numbers the relay understands.

use crate::core::RelayError;
use strum_macros::{Display, EnumIter, FromRepr};

/// A recognized protocol number. Values outside this enum are rejected before
/// any handler lookup takes place.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Display, EnumIter, FromRepr)]
#[repr(i64)]
pub enum CustomProtocolNumber {
    #[strum(serialize = "DICE_ROLL_JUST_FOR_TEST")]
    DiceRollJustForTest = 1,
    #[strum(serialize = "DICE_LIST_JUST_FOR_TEST")]
    DiceListJustForTest = 2,
}

impl CustomProtocolNumber {
    /// The numeric value carried in the `command` field on the wire.
    pub fn value(self) -> i64 {
        self as i64
    }
}

impl TryFrom<i64> for CustomProtocolNumber {
    type Error = RelayError;

    fn try_from(raw: i64) -> Result<Self, Self::Error> {
        Self::from_repr(raw).ok_or(RelayError::UnknownProtocol(raw))
    }
}
