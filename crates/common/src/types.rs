use serde::{Deserialize, Serialize};

macro_rules! integer_id {
    ($(#[$meta:meta])* $name:ident) => {
        $(#[$meta])*
        #[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
        #[serde(transparent)]
        pub struct $name(i32);

        impl $name {
            /// Wraps a raw database identifier.
            pub const fn new(id: i32) -> Self {
                Self(id)
            }

            /// Returns the raw database identifier.
            pub const fn get(&self) -> i32 {
                self.0
            }
        }

        impl std::fmt::Display for $name {
            fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
                write!(f, "{}", self.0)
            }
        }

        impl From<i32> for $name {
            fn from(id: i32) -> Self {
                Self(id)
            }
        }

        impl From<$name> for i32 {
            fn from(id: $name) -> Self {
                id.0
            }
        }
    };
}

integer_id! {
    /// Identifier of a catalog product (`product.product_id`).
    ProductId
}

integer_id! {
    /// Identifier of a server-side purchase transaction, allocated by
    /// `begin_transaction`.
    TransactionId
}

integer_id! {
    /// Identifier of a stored payment method.
    PaymentMethodId
}

impl PaymentMethodId {
    /// The single payment method used until checkout offers a choice.
    pub const DEFAULT: PaymentMethodId = PaymentMethodId(1);
}

impl Default for PaymentMethodId {
    fn default() -> Self {
        Self::DEFAULT
    }
}
