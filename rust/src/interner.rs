//! Dense integer indices for task ids.
//!
//! The CPM passes run over flat `Vec`s indexed by `TaskIdx` instead of
//! re-hashing string ids on every edge visit.

use rustc_hash::FxHashMap;

/// Position of a task in the calculation arena.
pub type TaskIdx = u32;

/// Bidirectional mapping between task id strings and arena positions.
#[derive(Debug, Clone, Default)]
pub struct TaskIdInterner {
    positions: FxHashMap<String, TaskIdx>,
    ids: Vec<String>,
}

impl TaskIdInterner {
    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            positions: FxHashMap::with_capacity_and_hasher(capacity, Default::default()),
            ids: Vec::with_capacity(capacity),
        }
    }

    /// Intern `id`, returning `(index, newly_added)`.
    ///
    /// Interning an id twice hands back the original slot so that a later
    /// task with the same id overwrites the earlier one in the arena.
    pub fn intern(&mut self, id: &str) -> (TaskIdx, bool) {
        if let Some(&idx) = self.positions.get(id) {
            return (idx, false);
        }
        let idx = self.ids.len() as TaskIdx;
        self.ids.push(id.to_string());
        self.positions.insert(id.to_string(), idx);
        (idx, true)
    }

    #[inline]
    pub fn get(&self, id: &str) -> Option<TaskIdx> {
        self.positions.get(id).copied()
    }

    #[inline]
    pub fn resolve(&self, idx: TaskIdx) -> Option<&str> {
        self.ids.get(idx as usize).map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.ids.len()
    }

    /// Ids in arena order.
    pub fn iter(&self) -> impl Iterator<Item = (TaskIdx, &str)> {
        self.ids
            .iter()
            .enumerate()
            .map(|(idx, id)| (idx as TaskIdx, id.as_str()))
    }
}
