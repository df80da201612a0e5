//! Binding identities

use serde::{Deserialize, Serialize};

use std::fmt;

/// Opaque identity of a value-holding slot.
///
/// Two names are equal only if they are the same identity; they are never
/// compared structurally against the source-level name they were bound
/// under. Renders as `x3` for anonymous names and `Base.Add` for external
/// ones, which is the form the instruction listing uses.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum BindName {
    /// allocated by the code generator, never reused
    Anonymous(u32),
    /// refers to a value supplied from outside the generated program
    External { module: String, name: String },
}

impl fmt::Display for BindName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            BindName::Anonymous(index) => write!(f, "x{}", index),
            BindName::External { module, name } => write!(f, "{}.{}", module, name),
        }
    }
}

/// Hands out fresh anonymous names.
///
/// One allocator per compilation unit: listings stay deterministic and
/// identities cannot leak between independent compilations.
#[derive(Debug, Clone, Default)]
pub struct NameAlloc {
    next: u32,
}

impl NameAlloc {
    pub fn fresh(&mut self) -> BindName {
        let index = self.next;
        self.next += 1;
        BindName::Anonymous(index)
    }
}
