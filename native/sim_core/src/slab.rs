//! Slab arena with stable identifiers
//!
//! Provides O(1) insert/lookup/remove. Identifiers increase monotonically and
//! are never reused, even when a freed slot is recycled. The arena is owned by
//! a single simulation and carries no locks.

use std::collections::HashMap;

/// Arena of `T` addressed by stable `u64` identifiers
#[derive(Debug, Clone)]
pub struct Slab<T> {
    slots: Vec<Option<T>>,
    /// Indices of vacated slots
    free: Vec<usize>,
    /// Next ID to assign
    next_id: u64,
    /// Map from external ID to slot index
    id_to_slot: HashMap<u64, usize>,
    capacity: Option<usize>,
}

impl<T> Default for Slab<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T> Slab<T> {
    /// Unbounded arena
    pub fn new() -> Self {
        Self {
            slots: Vec::new(),
            free: Vec::new(),
            next_id: 0,
            id_to_slot: HashMap::new(),
            capacity: None,
        }
    }

    /// Arena refusing inserts beyond `capacity` live items
    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            slots: Vec::with_capacity(capacity),
            capacity: Some(capacity),
            ..Self::new()
        }
    }

    /// Insert an item, returns its ID or None if full
    pub fn insert(&mut self, item: T) -> Option<u64> {
        if let Some(capacity) = self.capacity {
            if self.id_to_slot.len() >= capacity {
                return None;
            }
        }

        let slot_idx = match self.free.pop() {
            Some(idx) => {
                self.slots[idx] = Some(item);
                idx
            }
            None => {
                self.slots.push(Some(item));
                self.slots.len() - 1
            }
        };

        let id = self.next_id;
        self.next_id += 1;
        self.id_to_slot.insert(id, slot_idx);
        Some(id)
    }

    pub fn get(&self, id: u64) -> Option<&T> {
        let slot_idx = *self.id_to_slot.get(&id)?;
        self.slots[slot_idx].as_ref()
    }

    pub fn get_mut(&mut self, id: u64) -> Option<&mut T> {
        let slot_idx = *self.id_to_slot.get(&id)?;
        self.slots[slot_idx].as_mut()
    }

    pub fn contains(&self, id: u64) -> bool {
        self.id_to_slot.contains_key(&id)
    }

    /// Remove an item by ID
    pub fn remove(&mut self, id: u64) -> Option<T> {
        let slot_idx = self.id_to_slot.remove(&id)?;
        let item = self.slots[slot_idx].take()?;
        self.free.push(slot_idx);
        Some(item)
    }

    /// Number of live items
    pub fn len(&self) -> usize {
        self.id_to_slot.len()
    }

    pub fn is_empty(&self) -> bool {
        self.id_to_slot.is_empty()
    }

    /// Live IDs in insertion order
    pub fn ids(&self) -> Vec<u64> {
        let mut ids: Vec<u64> = self.id_to_slot.keys().copied().collect();
        ids.sort_unstable();
        ids
    }

    /// Iterate over live items in insertion order
    pub fn iter(&self) -> impl Iterator<Item = (u64, &T)> + '_ {
        self.ids().into_iter().filter_map(move |id| self.get(id).map(|item| (id, item)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_slab_insert_get() {
        let mut slab: Slab<i32> = Slab::new();

        let id = slab.insert(42).unwrap();
        assert_eq!(slab.len(), 1);
        assert_eq!(slab.get(id), Some(&42));
    }

    #[test]
    fn test_slab_remove() {
        let mut slab: Slab<i32> = Slab::new();

        let id = slab.insert(42).unwrap();
        assert_eq!(slab.remove(id), Some(42));
        assert!(slab.is_empty());
        assert!(slab.get(id).is_none());
        assert!(slab.remove(id).is_none(), "Double remove must be a no-op");
    }

    #[test]
    fn test_slab_reuse() {
        let mut slab: Slab<i32> = Slab::with_capacity(2);

        let id1 = slab.insert(1).unwrap();
        let _id2 = slab.insert(2).unwrap();

        // Slab is full
        assert!(slab.insert(3).is_none());

        slab.remove(id1);

        let id3 = slab.insert(3).unwrap();
        assert!(id3 != id1, "IDs must not be reused when a slot is recycled");
        assert_eq!(slab.len(), 2);
    }

    #[test]
    fn test_slab_mutation_and_iteration_order() {
        let mut slab: Slab<String> = Slab::new();
        let a = slab.insert("a".to_string()).unwrap();
        let b = slab.insert("b".to_string()).unwrap();
        let c = slab.insert("c".to_string()).unwrap();
        slab.remove(b);

        if let Some(item) = slab.get_mut(c) {
            item.push('!');
        }

        let items: Vec<(u64, &String)> = slab.iter().collect();
        assert_eq!(items.len(), 2);
        assert_eq!(items[0], (a, &"a".to_string()));
        assert_eq!(items[1], (c, &"c!".to_string()));
    }
}
