//! Undo/redo on top of the list bridge.

use std::ops::Deref;
use std::sync::{Arc, Mutex};

use super::{ListChange, ListDelta, ObservableList};
use crate::Result;
use crate::realtime::CollaborativeModel;
use crate::signal::SlotId;

/// A list bridge that records its local changes for undo and redo.
///
/// Only changes made through this client are recorded. Each recorded entry is
/// a group of changes undone together: a single mutation, or everything done
/// between [`begin_compound_operation`](Self::begin_compound_operation) and
/// [`end_compound_operation`](Self::end_compound_operation). Recording a new
/// entry discards everything that could have been redone.
///
/// Derefs to [`ObservableList`] for the list operations.
#[derive(Clone)]
pub struct ObservableUndoableList {
    list: ObservableList,
    history: Arc<Mutex<History>>,
    slot: SlotId,
}

#[derive(Debug, Default)]
struct History {
    stack: Vec<Vec<ListDelta>>,
    /// Index of the entry the next undo reverts, -1 when there is none.
    index: isize,
    in_compound: bool,
    is_undoable: bool,
    made_compound_change: bool,
}

impl History {
    fn new() -> Self {
        Self {
            index: -1,
            is_undoable: true,
            ..Default::default()
        }
    }

    fn record(&mut self, delta: &ListDelta) {
        if !self.is_undoable {
            return;
        }
        if !self.in_compound || !self.made_compound_change {
            self.stack.truncate((self.index + 1) as usize);
        }
        let slot = (self.index + 1) as usize;
        match self.stack.get_mut(slot) {
            Some(entry) => entry.push(delta.clone()),
            None => self.stack.push(vec![delta.clone()]),
        }
        if self.in_compound {
            self.made_compound_change = true;
        } else {
            self.index += 1;
        }
    }

    fn clear(&mut self) {
        self.stack.clear();
        self.index = -1;
        self.made_compound_change = false;
    }

    /// Shift the recorded positions past a collaborator's change.
    ///
    /// If the change touches anything the history would revert or re-apply,
    /// the history is dropped instead.
    fn rebase(&mut self, remote: &ListDelta) {
        if self.stack.is_empty() {
            return;
        }
        let rebased = self
            .stack
            .iter()
            .map(|entry| {
                entry
                    .iter()
                    .map(|delta| rebase_delta(delta, remote))
                    .collect::<Option<Vec<_>>>()
            })
            .collect::<Option<Vec<_>>>();
        match rebased {
            Some(stack) => self.stack = stack,
            None => {
                tracing::debug!(
                    change = remote.kind(),
                    "Collaborator change overlaps the undo history, clearing it"
                );
                self.clear();
            }
        }
    }
}

/// `delta` with its positions moved past `remote`, or `None` if they overlap.
fn rebase_delta(delta: &ListDelta, remote: &ListDelta) -> Option<ListDelta> {
    match remote {
        ListDelta::Add { index: at, values } => {
            let (start, end) = span(delta);
            // An insert strictly inside an added or set range splits it.
            if start < *at && *at < end {
                return None;
            }
            let count = values.len();
            Some(map_positions(delta, |position| {
                if position >= *at { position + count } else { position }
            }))
        }
        ListDelta::Remove { index: at, values } => {
            let removed_end = at + values.len();
            if overlaps(delta, *at, removed_end) {
                return None;
            }
            if let ListDelta::Move { from, .. } = delta {
                if *at <= *from && *from < removed_end {
                    return None;
                }
            }
            let count = values.len();
            Some(map_positions(delta, |position| {
                if position >= removed_end { position - count } else { position }
            }))
        }
        ListDelta::Set {
            index: at,
            old_values,
            new_values,
        } => {
            let set_end = at + old_values.len().max(new_values.len());
            if overlaps(delta, *at, set_end) {
                None
            } else {
                Some(delta.clone())
            }
        }
        ListDelta::Move { .. } => None,
    }
}

/// Positions `delta` occupies in the list right after it was applied.
fn span(delta: &ListDelta) -> (usize, usize) {
    match delta {
        ListDelta::Add { index, values } => (*index, index + values.len()),
        ListDelta::Remove { index, .. } => (*index, *index),
        ListDelta::Set {
            index, new_values, ..
        } => (*index, index + new_values.len()),
        ListDelta::Move { to, .. } => (*to, to + 1),
    }
}

fn overlaps(delta: &ListDelta, start: usize, end: usize) -> bool {
    let (first, last) = span(delta);
    if first == last {
        // A removal is re-inserted between two elements.
        start < first && first < end
    } else {
        first < end && start < last
    }
}

fn map_positions(delta: &ListDelta, shift: impl Fn(usize) -> usize) -> ListDelta {
    match delta {
        ListDelta::Add { index, values } => ListDelta::Add {
            index: shift(*index),
            values: values.clone(),
        },
        ListDelta::Remove { index, values } => ListDelta::Remove {
            index: shift(*index),
            values: values.clone(),
        },
        ListDelta::Set {
            index,
            old_values,
            new_values,
        } => ListDelta::Set {
            index: shift(*index),
            old_values: old_values.clone(),
            new_values: new_values.clone(),
        },
        ListDelta::Move { from, to, values } => ListDelta::Move {
            from: shift(*from),
            to: shift(*to),
            values: values.clone(),
        },
    }
}

impl ObservableUndoableList {
    /// Create a new collaborative list in `model` with an empty history.
    pub fn create(model: &Arc<dyn CollaborativeModel>) -> Self {
        Self::new(ObservableList::create(model))
    }

    /// Start recording the local changes of `list`.
    ///
    /// Changes from other collaborators are not recorded. Recorded positions
    /// are shifted past them; a change that touches recorded content drops the
    /// history.
    pub fn new(list: ObservableList) -> Self {
        let history = Arc::new(Mutex::new(History::new()));
        let weak = Arc::downgrade(&history);
        let slot = list.changed().connect(move |change: &ListChange| {
            let Some(history) = weak.upgrade() else {
                return;
            };
            let mut history = history.lock().unwrap();
            if change.origin.is_local() {
                history.record(&change.delta);
            } else {
                history.rebase(&change.delta);
            }
        });
        Self {
            list,
            history,
            slot,
        }
    }

    /// The wrapped list bridge.
    pub fn list(&self) -> &ObservableList {
        &self.list
    }

    pub fn can_undo(&self) -> bool {
        self.history.lock().unwrap().index >= 0
    }

    pub fn can_redo(&self) -> bool {
        let history = self.history.lock().unwrap();
        history.index < history.stack.len() as isize - 1
    }

    /// Group the following changes into one undo entry.
    ///
    /// With `is_undoable == false` the changes are not recorded at all.
    pub fn begin_compound_operation(&self, is_undoable: bool) {
        let mut history = self.history.lock().unwrap();
        history.in_compound = true;
        history.is_undoable = is_undoable;
        history.made_compound_change = false;
    }

    /// Close the group opened by [`begin_compound_operation`](Self::begin_compound_operation).
    pub fn end_compound_operation(&self) {
        let mut history = self.history.lock().unwrap();
        history.in_compound = false;
        history.is_undoable = true;
        if history.made_compound_change {
            history.index += 1;
        }
        history.made_compound_change = false;
    }

    /// Revert the most recent entry. Returns false if there was nothing to undo.
    pub fn undo(&self) -> Result<bool> {
        let entry = {
            let mut history = self.history.lock().unwrap();
            if history.index < 0 {
                return Ok(false);
            }
            let Some(entry) = history.stack.get(history.index as usize).cloned() else {
                return Ok(false);
            };
            history.is_undoable = false;
            entry
        };

        let result = entry
            .iter()
            .rev()
            .try_for_each(|delta| self.revert(delta));

        let mut history = self.history.lock().unwrap();
        history.is_undoable = true;
        result?;
        history.index -= 1;
        Ok(true)
    }

    /// Re-apply the most recently undone entry. Returns false if there was
    /// nothing to redo.
    pub fn redo(&self) -> Result<bool> {
        let entry = {
            let mut history = self.history.lock().unwrap();
            let next = history.index + 1;
            let Some(entry) = history.stack.get(next as usize).cloned() else {
                return Ok(false);
            };
            history.is_undoable = false;
            entry
        };

        let result = entry.iter().try_for_each(|delta| self.reapply(delta));

        let mut history = self.history.lock().unwrap();
        history.is_undoable = true;
        result?;
        history.index += 1;
        Ok(true)
    }

    /// Forget every recorded entry.
    pub fn clear_undo(&self) {
        self.history.lock().unwrap().clear();
        tracing::debug!("Cleared list undo history");
    }

    /// Stop recording and dispose the list bridge.
    pub fn dispose(&self) {
        self.list.changed().disconnect(self.slot);
        self.clear_undo();
        self.list.dispose();
    }

    fn revert(&self, delta: &ListDelta) -> Result<()> {
        match delta {
            ListDelta::Add { index, values } => {
                self.list.remove_range(*index, index + values.len())?;
            }
            ListDelta::Remove { index, values } => {
                self.list.insert_all(*index, values.clone())?;
            }
            ListDelta::Set {
                index, old_values, ..
            } => {
                for (offset, value) in old_values.iter().enumerate() {
                    self.list.set(index + offset, value.clone())?;
                }
            }
            ListDelta::Move { from, to, .. } => {
                self.list.move_item(*to, *from)?;
            }
        }
        Ok(())
    }

    fn reapply(&self, delta: &ListDelta) -> Result<()> {
        match delta {
            ListDelta::Add { index, values } => {
                self.list.insert_all(*index, values.clone())?;
            }
            ListDelta::Remove { index, values } => {
                self.list.remove_range(*index, index + values.len())?;
            }
            ListDelta::Set {
                index, new_values, ..
            } => {
                for (offset, value) in new_values.iter().enumerate() {
                    self.list.set(index + offset, value.clone())?;
                }
            }
            ListDelta::Move { from, to, .. } => {
                self.list.move_item(*from, *to)?;
            }
        }
        Ok(())
    }
}

impl Deref for ObservableUndoableList {
    type Target = ObservableList;

    fn deref(&self) -> &ObservableList {
        &self.list
    }
}

impl std::fmt::Debug for ObservableUndoableList {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let history = self.history.lock().unwrap();
        f.debug_struct("ObservableUndoableList")
            .field("list", &self.list)
            .field("entries", &history.stack.len())
            .field("index", &history.index)
            .finish()
    }
}
