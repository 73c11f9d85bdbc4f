use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Deserializer, Serialize, Serializer};

use crate::error::TypeError;

/// Space for objects visible in public operation results.
pub const PROTOCOL_SPACE: u8 = 1;
/// Space for internal bookkeeping objects (global properties, statistics).
pub const IMPLEMENTATION_SPACE: u8 = 2;

// Protocol-space type tags. Declaration order is append-only.
pub const ACCOUNT_TYPE: u8 = 1;
pub const VALIDATOR_TYPE: u8 = 2;

// Implementation-space type tags. Declaration order is append-only.
pub const GLOBAL_PROPERTY_TYPE: u8 = 0;
pub const DYNAMIC_GLOBAL_PROPERTY_TYPE: u8 = 1;
pub const ACCOUNT_STATISTICS_TYPE: u8 = 2;
pub const PRODUCER_SCHEDULE_TYPE: u8 = 3;

/// Identity triple uniquely and permanently naming a stored object.
///
/// Within a `(space, type)` pair, instance numbers are assigned monotonically
/// starting at 0 and are never reused, even after deletion. The canonical
/// textual form is `"<space>.<type>.<instance>"`, e.g. `"1.1.42"`, which is
/// also the serde representation.
#[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct ObjectId {
    pub space: u8,
    pub type_id: u8,
    pub instance: u64,
}

impl ObjectId {
    pub const fn new(space: u8, type_id: u8, instance: u64) -> Self {
        Self {
            space,
            type_id,
            instance,
        }
    }

    /// The null id (`0.0.0`). Represents "no object", e.g. an absent
    /// annotation.
    pub const fn null() -> Self {
        Self::new(0, 0, 0)
    }

    pub fn is_null(&self) -> bool {
        *self == Self::null()
    }

    /// The `(space, type)` pair that selects the owning index.
    pub fn index_key(&self) -> (u8, u8) {
        (self.space, self.type_id)
    }
}

impl fmt::Display for ObjectId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}.{}.{}", self.space, self.type_id, self.instance)
    }
}

// Debug delegates to Display: "1.2.7" reads better than a struct dump.
impl fmt::Debug for ObjectId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Display::fmt(self, f)
    }
}

impl FromStr for ObjectId {
    type Err = TypeError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let mut parts = s.split('.');
        let (space, type_id, instance) = match (parts.next(), parts.next(), parts.next(), parts.next())
        {
            (Some(a), Some(b), Some(c), None) => (a, b, c),
            _ => return Err(TypeError::InvalidObjectId(s.to_string())),
        };
        let parse = |p: &str| -> Result<u64, TypeError> {
            p.parse::<u64>()
                .map_err(|_| TypeError::InvalidObjectId(s.to_string()))
        };
        let space = parse(space)?;
        let type_id = parse(type_id)?;
        if space > u8::MAX as u64 || type_id > u8::MAX as u64 {
            return Err(TypeError::InvalidObjectId(s.to_string()));
        }
        Ok(Self::new(space as u8, type_id as u8, parse(instance)?))
    }
}

impl Serialize for ObjectId {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

impl<'de> Deserialize<'de> for ObjectId {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let s = String::deserialize(deserializer)?;
        s.parse().map_err(serde::de::Error::custom)
    }
}

/// Declares a typed instance-number wrapper tied to one `(space, type)` pair.
macro_rules! typed_id {
    ($(#[$doc:meta])* $name:ident, $space:expr, $type_id:expr, $expected:literal) => {
        $(#[$doc])*
        #[derive(
            Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
        )]
        pub struct $name(pub u64);

        impl $name {
            pub const SPACE: u8 = $space;
            pub const TYPE_ID: u8 = $type_id;

            pub fn object_id(self) -> ObjectId {
                ObjectId::new(Self::SPACE, Self::TYPE_ID, self.0)
            }
        }

        impl From<$name> for ObjectId {
            fn from(id: $name) -> ObjectId {
                id.object_id()
            }
        }

        impl TryFrom<ObjectId> for $name {
            type Error = TypeError;

            fn try_from(id: ObjectId) -> Result<Self, TypeError> {
                if id.space == Self::SPACE && id.type_id == Self::TYPE_ID {
                    Ok(Self(id.instance))
                } else {
                    Err(TypeError::WrongObjectType {
                        id: id.to_string(),
                        expected: $expected,
                    })
                }
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                fmt::Display::fmt(&self.object_id(), f)
            }
        }

        impl fmt::Debug for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                fmt::Display::fmt(self, f)
            }
        }
    };
}

typed_id!(
    /// Protocol-space account object reference.
    AccountId,
    PROTOCOL_SPACE,
    ACCOUNT_TYPE,
    "account id"
);
typed_id!(
    /// Protocol-space validator object reference.
    ValidatorId,
    PROTOCOL_SPACE,
    VALIDATOR_TYPE,
    "validator id"
);
typed_id!(
    /// Implementation-space account statistics reference.
    AccountStatisticsId,
    IMPLEMENTATION_SPACE,
    ACCOUNT_STATISTICS_TYPE,
    "account statistics id"
);
