use serde::{Deserialize, Serialize};

/// Declares a transparent numeric identifier.
///
/// Each identifier gets `Display`, `FromStr` and lossless conversions to and
/// from its raw representation so it can cross the storage and wire
/// boundaries without ad hoc casts.
macro_rules! numeric_id {
    ($(#[$meta:meta])* $name:ident($raw:ty)) => {
        $(#[$meta])*
        #[derive(
            Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
        )]
        #[serde(transparent)]
        pub struct $name($raw);

        impl $name {
            /// Creates the identifier from its raw value.
            pub const fn new(value: $raw) -> Self {
                Self(value)
            }

            /// Returns the raw value.
            pub const fn get(&self) -> $raw {
                self.0
            }
        }

        impl std::fmt::Display for $name {
            fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
                write!(f, "{}", self.0)
            }
        }

        impl std::str::FromStr for $name {
            type Err = std::num::ParseIntError;

            fn from_str(s: &str) -> Result<Self, Self::Err> {
                s.parse::<$raw>().map(Self)
            }
        }

        impl From<$raw> for $name {
            fn from(value: $raw) -> Self {
                Self(value)
            }
        }

        impl From<$name> for $raw {
            fn from(id: $name) -> Self {
                id.0
            }
        }
    };
}

numeric_id!(
    /// Identifier of an order, assigned by the order store on creation.
    OrderId(i64)
);

numeric_id!(
    /// Identifier of the user who owns an order.
    UserId(i64)
);

numeric_id!(
    /// Stock keeping unit: the product identifier used by the stock ledger.
    Sku(u32)
);

numeric_id!(
    /// Identifier of an outbox row. Monotonic in append order.
    EventId(i64)
);

impl Sku {
    /// Widens the SKU to the signed column type used by PostgreSQL.
    pub fn as_i64(&self) -> i64 {
        i64::from(self.0)
    }
}
