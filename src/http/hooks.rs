//! Hook registry
//!
//! Hooks let other protocol layers (authentication, redirects, locking)
//! watch and extend every exchange without the engine knowing about them.
//! Each lifecycle phase has its own ordered list; entries run in
//! registration order. Private data uses the same list type, keyed by id.

use super::{Request, Result, Status};
use std::any::Any;

/// What a post-send hook wants done with the exchange
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Outcome {
    /// The exchange is complete
    Done,
    /// Send the request again
    Retry,
}

pub type CreateRequestHook = Box<dyn FnMut(&mut Request, &str, &str)>;
pub type PreSendHook = Box<dyn FnMut(&Request, &mut String)>;
pub type PostSendHook = Box<dyn FnMut(&Request, &Status) -> Result<Outcome>>;
pub type DestroyRequestHook = Box<dyn FnMut(&Request)>;
pub type DestroySessionHook = Box<dyn FnMut()>;

#[derive(Debug)]
struct Entry<T> {
    id: Option<String>,
    value: T,
}

/// Ordered list of hooks or private values
#[derive(Debug)]
pub struct HookList<T> {
    entries: Vec<Entry<T>>,
}

impl<T> Default for HookList<T> {
    fn default() -> Self {
        HookList {
            entries: Vec::new(),
        }
    }
}

impl<T> HookList<T> {
    pub fn new() -> Self {
        HookList::default()
    }

    /// Append an anonymous entry
    pub fn add(&mut self, value: T) {
        self.entries.push(Entry { id: None, value });
    }

    /// Append an entry, or replace the value of an entry with the same id
    pub fn add_named(&mut self, id: &str, value: T) {
        match self.find_mut(id) {
            Some(slot) => *slot = value,
            None => self.entries.push(Entry {
                id: Some(id.to_string()),
                value,
            }),
        }
    }

    /// Look up an entry by id
    pub fn find(&self, id: &str) -> Option<&T> {
        self.entries
            .iter()
            .find(|e| e.id.as_deref() == Some(id))
            .map(|e| &e.value)
    }

    pub fn find_mut(&mut self, id: &str) -> Option<&mut T> {
        self.entries
            .iter_mut()
            .find(|e| e.id.as_deref() == Some(id))
            .map(|e| &mut e.value)
    }

    pub fn iter_mut(&mut self) -> impl Iterator<Item = &mut T> {
        self.entries.iter_mut().map(|e| &mut e.value)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

/// Private data attached to a session or request
pub type PrivateData = HookList<Box<dyn Any>>;

impl PrivateData {
    /// Store `value` under `id`, replacing any previous value
    pub fn set<V: Any>(&mut self, id: &str, value: V) {
        self.add_named(id, Box::new(value));
    }

    /// Get the value stored under `id`, if it has type `V`
    pub fn get<V: Any>(&self, id: &str) -> Option<&V> {
        self.find(id).and_then(|value| value.downcast_ref::<V>())
    }

    pub fn get_mut<V: Any>(&mut self, id: &str) -> Option<&mut V> {
        self.find_mut(id).and_then(|value| value.downcast_mut::<V>())
    }
}
