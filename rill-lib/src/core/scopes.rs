//! Scopes is a stack of mappings, used for name resolution during lowering.
//!
//! Child scopes are opened and collapsed constantly while walking the tree,
//! and branch lowering needs cheap independent copies of the whole chain, so
//! this uses immutable data structures with structural sharing.

use im::HashMap as ImHashMap;
use im::Vector as ImVec;

use std::borrow::Borrow;
use std::fmt::Debug;
use std::hash::Hash;

use crate::core::BindName;

pub type Scope<K, V> = ImHashMap<K, V>;

/// The table every compilation resolves source names against.
pub type SymbolTable = Scopes<String, BindName>;

/// Represents the scope hierarchy.
#[derive(Debug, Clone)]
pub struct Scopes<K, V>
where
    K: Debug + Hash + Clone + Eq,
    V: Clone + Debug,
{
    /// Each entry is one open scope, the last is the innermost one. The
    /// first scope is the global scope and is never collapsed.
    scopes: ImVec<Scope<K, V>>,
}

impl<K, V> Default for Scopes<K, V>
where
    K: Debug + Hash + Clone + Eq,
    V: Clone + Debug,
{
    fn default() -> Self {
        Self::from_global(ImHashMap::new())
    }
}

impl<K, V> Scopes<K, V>
where
    K: Debug + Hash + Clone + Eq,
    V: Clone + Debug,
{
    /// A chain consisting of just the given global scope.
    pub fn from_global(scope: Scope<K, V>) -> Self {
        Scopes {
            scopes: ImVec::unit(scope),
        }
    }

    /// A copy of the outermost scope.
    pub fn global(&self) -> Scope<K, V> {
        self.scopes
            .front()
            .expect("a scope chain is never empty")
            .clone()
    }

    /// open a new scope
    pub fn open_new(&mut self) {
        self.scopes.push_back(ImHashMap::new());
    }

    /// Collapse the innermost scope and hand its entries to the caller,
    /// which is responsible for emitting whatever cleanup they require.
    pub fn collapse_innermost(&mut self) -> Scope<K, V> {
        assert!(
            self.scopes.len() > 1,
            "Tried to collapse a global scope. This is a bug"
        );
        self.scopes.pop_back().unwrap()
    }

    /// Add an entry to the innermost scope. An existing entry for the same
    /// key in this scope is replaced; entries in outer scopes are shadowed
    /// but untouched.
    pub fn add_entry(&mut self, key: K, val: V) {
        self.scopes.back_mut().unwrap().insert(key, val);
    }

    /// Looks a key up, starting in the innermost scope and going outwards.
    /// Returns None if the key is in no scope.
    pub fn find_entry<BK>(&self, key: &BK) -> Option<&V>
    where
        BK: Hash + Eq + ?Sized,
        K: Borrow<BK>,
    {
        for scope in self.scopes.iter().rev() {
            if let Some(entry) = scope.get(key) {
                return Some(entry);
            }
        }
        None
    }
}
