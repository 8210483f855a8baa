//! Typed index arenas
//!
//! The score tree stores each node kind in its own [`Arena`]. An [`Idx<T>`] is
//! a plain index into the arena of `T`: copying it never copies or owns the
//! node, so it is the building block for uplinks, shortcuts and sidelinks.
//! Ownership is expressed by the parent holding the index in its children
//! list; a node no parent lists is unreachable and is never visited.

use std::fmt;
use std::hash::{Hash, Hasher};
use std::marker::PhantomData;

/// Index of a `T` inside an [`Arena<T>`]
pub struct Idx<T> {
    raw: u32,
    _marker: PhantomData<fn() -> T>,
}

impl<T> Idx<T> {
    pub(crate) fn from_raw(raw: u32) -> Self {
        Self {
            raw,
            _marker: PhantomData,
        }
    }

    pub fn raw(&self) -> u32 {
        self.raw
    }

    fn index(&self) -> usize {
        self.raw as usize
    }
}

impl<T> Clone for Idx<T> {
    fn clone(&self) -> Self {
        *self
    }
}

impl<T> Copy for Idx<T> {}

impl<T> PartialEq for Idx<T> {
    fn eq(&self, other: &Self) -> bool {
        self.raw == other.raw
    }
}

impl<T> Eq for Idx<T> {}

impl<T> PartialOrd for Idx<T> {
    fn partial_cmp(&self, other: &Self) -> Option<std::cmp::Ordering> {
        Some(self.cmp(other))
    }
}

impl<T> Ord for Idx<T> {
    fn cmp(&self, other: &Self) -> std::cmp::Ordering {
        self.raw.cmp(&other.raw)
    }
}

impl<T> Hash for Idx<T> {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.raw.hash(state);
    }
}

impl<T> fmt::Debug for Idx<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let type_name = std::any::type_name::<T>();
        let short = type_name.rsplit("::").next().unwrap_or(type_name);
        write!(f, "{}#{}", short, self.raw)
    }
}

/// Growable storage for one node kind
#[derive(Clone, PartialEq)]
pub struct Arena<T> {
    data: Vec<T>,
}

impl<T> Arena<T> {
    pub fn new() -> Self {
        Self { data: Vec::new() }
    }

    pub fn alloc(&mut self, value: T) -> Idx<T> {
        let idx = Idx::from_raw(self.data.len() as u32);
        self.data.push(value);
        idx
    }

    /// Index that the next [`Arena::alloc`] call will return
    pub fn next_idx(&self) -> Idx<T> {
        Idx::from_raw(self.data.len() as u32)
    }

    pub fn get(&self, idx: Idx<T>) -> Option<&T> {
        self.data.get(idx.index())
    }

    pub fn get_mut(&mut self, idx: Idx<T>) -> Option<&mut T> {
        self.data.get_mut(idx.index())
    }

    pub fn len(&self) -> usize {
        self.data.len()
    }

    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (Idx<T>, &T)> {
        self.data
            .iter()
            .enumerate()
            .map(|(i, value)| (Idx::from_raw(i as u32), value))
    }
}

impl<T> Default for Arena<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T> std::ops::Index<Idx<T>> for Arena<T> {
    type Output = T;

    fn index(&self, idx: Idx<T>) -> &T {
        &self.data[idx.index()]
    }
}

impl<T> std::ops::IndexMut<Idx<T>> for Arena<T> {
    fn index_mut(&mut self, idx: Idx<T>) -> &mut T {
        &mut self.data[idx.index()]
    }
}

impl<T: fmt::Debug> fmt::Debug for Arena<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_map().entries(self.iter()).finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_alloc_and_lookup() {
        let mut arena: Arena<&str> = Arena::new();
        assert_eq!(arena.next_idx().raw(), 0);
        let a = arena.alloc("a");
        let b = arena.alloc("b");
        assert_ne!(a, b);
        assert_eq!(arena[a], "a");
        assert_eq!(arena.get(b), Some(&"b"));
        assert_eq!(arena.len(), 2);
        arena[b] = "c";
        assert_eq!(arena[b], "c");
    }

    #[test]
    fn test_idx_debug_names_the_node_kind() {
        struct Note;
        let idx: Idx<Note> = Idx::from_raw(7);
        assert_eq!(format!("{:?}", idx), "Note#7");
    }
}
