use std::fmt;

use serde::{Deserialize, Serialize};

use crate::runtime::error::EvalError;

/// Index of a node in the machine heap.
///
/// Identifiers are plain copyable indices; holding one does not keep the node
/// alive. Liveness is tracked by the heap's reference counts.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Identifier(pub(crate) u32);

impl Identifier {
    /// The permanent Global frame.
    pub const GLOBAL: Identifier = Identifier(0);
    /// The permanent Program frame, parented at Global.
    pub const PROGRAM: Identifier = Identifier(1);

    /// Returns the raw heap slot index backing this identifier.
    pub fn index(self) -> usize {
        self.0 as usize
    }

    /// Fails once the heap outgrows the 32-bit identifier space.
    pub(crate) fn from_index(index: usize) -> Result<Self, EvalError> {
        u32::try_from(index).map(Self).map_err(|_| {
            EvalError::internal(format!("heap slot {} is past the identifier range", index))
        })
    }

    /// Global and Program are never reclaimed.
    pub fn is_permanent(self) -> bool {
        self.0 < 2
    }

    #[cfg(test)]
    pub fn new_for_test(index: u32) -> Self {
        Self(index)
    }
}

impl fmt::Display for Identifier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

macro_rules! branded_identifier {
    ($(#[$meta:meta])* $name:ident) => {
        $(#[$meta])*
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
        #[serde(transparent)]
        pub struct $name(pub Identifier);

        impl $name {
            pub fn id(self) -> Identifier {
                self.0
            }
        }

        impl From<$name> for Identifier {
            fn from(value: $name) -> Self {
                value.0
            }
        }
    };
}

branded_identifier!(
    /// Identifier known to point at a pair.
    PairId
);
branded_identifier!(
    /// Identifier known to point at an array.
    ArrayId
);
branded_identifier!(
    /// Identifier known to point at a closure (interpreted or native).
    ClosureId
);
branded_identifier!(
    /// Identifier known to point at an opaque box.
    OpaqueId
);
