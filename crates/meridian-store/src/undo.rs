use std::collections::{BTreeMap, BTreeSet, VecDeque};

use meridian_types::ObjectId;

use crate::error::{StoreError, StoreResult};
use crate::object::StoredObject;

/// One reversible change-set: everything needed to reverse the mutations
/// performed while it was the innermost open session.
///
/// Pre-images are captured on first touch only, so a state holds the object
/// exactly as it was when the session opened regardless of how many times it
/// was modified afterwards.
#[derive(Default)]
pub struct UndoState {
    /// Pre-images of objects modified during the session.
    pub(crate) old_values: BTreeMap<ObjectId, Box<dyn StoredObject>>,
    /// Ids created during the session; undo deletes them.
    pub(crate) new_ids: BTreeSet<ObjectId>,
    /// Images of objects removed during the session; undo re-inserts them.
    pub(crate) removed: BTreeMap<ObjectId, Box<dyn StoredObject>>,
    /// First-touch instance allocator positions per `(space, type)`.
    pub(crate) old_next_instances: BTreeMap<(u8, u8), u64>,
}

impl UndoState {
    fn is_empty(&self) -> bool {
        self.old_values.is_empty()
            && self.new_ids.is_empty()
            && self.removed.is_empty()
            && self.old_next_instances.is_empty()
    }
}

/// A bounded stack of [`UndoState`]s layered over the object database.
///
/// The stack records mutations; applying a reversal to the indexes is the
/// database's job (`ObjectDatabase::undo_active_session`), which keeps this
/// type purely a deterministic data structure.
///
/// `active_sessions` counts sessions that are still open (not yet committed
/// or merged); it is what lets `last_non_undoable_block_num` subtract
/// in-flight speculative sessions from raw stack depth.
pub struct UndoStack {
    states: VecDeque<UndoState>,
    active_sessions: u32,
    max_size: usize,
    enabled: bool,
}

pub const DEFAULT_MAX_UNDO_SESSIONS: usize = 1024;

impl Default for UndoStack {
    fn default() -> Self {
        Self::new(DEFAULT_MAX_UNDO_SESSIONS)
    }
}

impl UndoStack {
    pub fn new(max_size: usize) -> Self {
        Self {
            states: VecDeque::new(),
            active_sessions: 0,
            max_size,
            enabled: true,
        }
    }

    /// Retained session count, committed history included.
    pub fn size(&self) -> usize {
        self.states.len()
    }

    /// Sessions opened but not yet committed or merged.
    pub fn active_sessions(&self) -> u32 {
        self.active_sessions
    }

    pub fn enabled(&self) -> bool {
        self.enabled
    }

    /// Disable mutation capture. Used during genesis and replay, where
    /// rollback is meaningless and capture would only burn memory.
    pub fn set_enabled(&mut self, enabled: bool) {
        self.enabled = enabled;
    }

    pub fn max_size(&self) -> usize {
        self.max_size
    }

    pub fn set_max_size(&mut self, max_size: usize) {
        self.max_size = max_size;
        self.trim();
    }

    /// Open a new innermost session.
    pub fn start_session(&mut self) -> StoreResult<()> {
        if !self.enabled {
            return Err(StoreError::UndoViolation(
                "cannot open a session while undo tracking is disabled".into(),
            ));
        }
        self.states.push_back(UndoState::default());
        self.active_sessions += 1;
        tracing::debug!(
            depth = self.states.len(),
            active = self.active_sessions,
            "undo session opened"
        );
        Ok(())
    }

    /// Retain the innermost session as committed history. History beyond
    /// `max_size` falls off the bottom and becomes irreversible.
    pub fn commit_session(&mut self) -> StoreResult<()> {
        if self.active_sessions == 0 {
            return Err(StoreError::NoActiveSession);
        }
        self.active_sessions -= 1;
        self.trim();
        Ok(())
    }

    /// Concatenate the innermost session's records onto its parent, so a
    /// later undo of the parent reverses both as one logical unit.
    pub fn merge_session(&mut self) -> StoreResult<()> {
        if self.active_sessions == 0 {
            return Err(StoreError::NoActiveSession);
        }
        if self.states.len() < 2 {
            return Err(StoreError::UndoViolation(
                "merge requires an enclosing session".into(),
            ));
        }
        let child = self.states.pop_back().ok_or(StoreError::NoActiveSession)?;
        let parent = self
            .states
            .back_mut()
            .ok_or(StoreError::NoActiveSession)?;

        for (id, old) in child.old_values {
            if parent.new_ids.contains(&id) || parent.old_values.contains_key(&id) {
                continue;
            }
            parent.old_values.insert(id, old);
        }
        for (key, next) in child.old_next_instances {
            parent.old_next_instances.entry(key).or_insert(next);
        }
        for (id, image) in child.removed {
            if parent.new_ids.remove(&id) {
                // created and removed within the merged span: net nothing
                continue;
            }
            if let Some(old) = parent.old_values.remove(&id) {
                parent.removed.insert(id, old);
            } else {
                parent.removed.entry(id).or_insert(image);
            }
        }
        for id in child.new_ids {
            parent.new_ids.insert(id);
        }

        self.active_sessions -= 1;
        Ok(())
    }

    /// Detach the innermost session's records for reversal. The caller (the
    /// database) applies them against the indexes.
    pub(crate) fn pop_active(&mut self) -> StoreResult<UndoState> {
        if self.active_sessions == 0 {
            return Err(StoreError::NoActiveSession);
        }
        let state = self.states.pop_back().ok_or(StoreError::NoActiveSession)?;
        self.active_sessions -= 1;
        Ok(state)
    }

    fn trim(&mut self) {
        // open sessions are never trimmed away, whatever the bound
        let keep = self.max_size.max(self.active_sessions as usize);
        while self.states.len() > keep {
            let discarded = self.states.pop_front();
            if let Some(state) = discarded {
                if !state.is_empty() {
                    tracing::debug!(
                        remaining = self.states.len(),
                        "oldest undo history discarded; boundary is now irreversible"
                    );
                }
            }
        }
    }

    fn capturing(&mut self) -> Option<&mut UndoState> {
        if !self.enabled {
            return None;
        }
        self.states.back_mut()
    }

    /// Record a creation: undo will delete `id` and roll the allocator back
    /// to `old_next_instance` (first touch per `(space, type)` wins).
    pub(crate) fn on_create(&mut self, id: ObjectId, old_next_instance: u64) {
        if let Some(state) = self.capturing() {
            state.new_ids.insert(id);
            state
                .old_next_instances
                .entry(id.index_key())
                .or_insert(old_next_instance);
        }
    }

    /// Record a modification pre-image. Objects created in this session or
    /// already captured keep their original image.
    pub(crate) fn on_modify(&mut self, pre_image: Box<dyn StoredObject>) {
        if let Some(state) = self.capturing() {
            let id = pre_image.stored_id();
            if state.new_ids.contains(&id) || state.old_values.contains_key(&id) {
                return;
            }
            state.old_values.insert(id, pre_image);
        }
    }

    /// Record a removal. A same-session creation simply cancels; a captured
    /// pre-image supersedes the current image.
    pub(crate) fn on_remove(&mut self, image: Box<dyn StoredObject>) {
        if let Some(state) = self.capturing() {
            let id = image.stored_id();
            if state.new_ids.remove(&id) {
                return;
            }
            if let Some(old) = state.old_values.remove(&id) {
                state.removed.insert(id, old);
                return;
            }
            state.removed.entry(id).or_insert(image);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testutil::Widget;
    use meridian_types::ObjectClass;

    fn boxed(instance: u64, name: &str, value: i64) -> Box<dyn StoredObject> {
        Box::new(Widget::sample(instance, name, value))
    }

    #[test]
    fn capture_is_first_touch_only() {
        let mut stack = UndoStack::default();
        stack.start_session().unwrap();

        stack.on_modify(boxed(0, "original", 5));
        stack.on_modify(boxed(0, "already-changed", 7));

        let state = stack.pop_active().unwrap();
        let pre = state
            .old_values
            .get(&Widget::sample(0, "", 0).object_id())
            .unwrap();
        let pre = pre.as_any().downcast_ref::<Widget>().unwrap();
        assert_eq!(pre.name, "original");
        assert_eq!(pre.value, 5);
    }

    #[test]
    fn create_then_remove_cancels() {
        let mut stack = UndoStack::default();
        stack.start_session().unwrap();

        let id = Widget::sample(3, "", 0).object_id();
        stack.on_create(id, 3);
        stack.on_remove(boxed(3, "ephemeral", 1));

        let state = stack.pop_active().unwrap();
        assert!(state.new_ids.is_empty());
        assert!(state.removed.is_empty());
        // allocator position still rolls back
        assert_eq!(state.old_next_instances.get(&id.index_key()), Some(&3));
    }

    #[test]
    fn modify_then_remove_keeps_pre_image() {
        let mut stack = UndoStack::default();
        stack.start_session().unwrap();

        stack.on_modify(boxed(0, "original", 5));
        stack.on_remove(boxed(0, "mutated", 9));

        let state = stack.pop_active().unwrap();
        assert!(state.old_values.is_empty());
        let image = state
            .removed
            .get(&Widget::sample(0, "", 0).object_id())
            .unwrap();
        let image = image.as_any().downcast_ref::<Widget>().unwrap();
        assert_eq!(image.name, "original");
    }

    #[test]
    fn session_accounting() {
        let mut stack = UndoStack::default();
        assert_eq!(stack.active_sessions(), 0);

        stack.start_session().unwrap();
        stack.start_session().unwrap();
        assert_eq!(stack.active_sessions(), 2);
        assert_eq!(stack.size(), 2);

        stack.merge_session().unwrap();
        assert_eq!(stack.active_sessions(), 1);
        assert_eq!(stack.size(), 1);

        stack.commit_session().unwrap();
        assert_eq!(stack.active_sessions(), 0);
        assert_eq!(stack.size(), 1);
    }

    #[test]
    fn commit_trims_beyond_max() {
        let mut stack = UndoStack::new(2);
        for _ in 0..4 {
            stack.start_session().unwrap();
            stack.commit_session().unwrap();
        }
        assert_eq!(stack.size(), 2);
    }

    #[test]
    fn shrinking_max_size_spares_open_sessions() {
        let mut stack = UndoStack::new(8);
        for _ in 0..3 {
            stack.start_session().unwrap();
            stack.commit_session().unwrap();
        }
        stack.start_session().unwrap();
        stack.start_session().unwrap();

        stack.set_max_size(1);
        // committed history was discarded, both open sessions survive
        assert_eq!(stack.active_sessions(), 2);
        assert_eq!(stack.size(), 2);
        stack.pop_active().unwrap();
        stack.pop_active().unwrap();
        assert_eq!(stack.active_sessions(), 0);
    }

    #[test]
    fn operations_without_session_fail() {
        let mut stack = UndoStack::default();
        assert!(matches!(
            stack.commit_session(),
            Err(StoreError::NoActiveSession)
        ));
        assert!(matches!(
            stack.pop_active(),
            Err(StoreError::NoActiveSession)
        ));
    }

    #[test]
    fn merge_requires_parent() {
        let mut stack = UndoStack::default();
        stack.start_session().unwrap();
        assert!(matches!(
            stack.merge_session(),
            Err(StoreError::UndoViolation(_))
        ));
    }

    #[test]
    fn disabled_stack_captures_nothing() {
        let mut stack = UndoStack::default();
        stack.start_session().unwrap();
        stack.set_enabled(false);
        stack.on_create(Widget::sample(0, "", 0).object_id(), 0);
        stack.set_enabled(true);

        let state = stack.pop_active().unwrap();
        assert!(state.is_empty());
    }

    #[test]
    fn merge_folds_child_records_into_parent() {
        let mut stack = UndoStack::default();
        stack.start_session().unwrap();
        stack.on_modify(boxed(0, "parent-image", 1));

        stack.start_session().unwrap();
        stack.on_modify(boxed(0, "child-image", 2));
        stack.on_create(Widget::sample(5, "", 0).object_id(), 5);
        stack.merge_session().unwrap();

        let state = stack.pop_active().unwrap();
        let pre = state
            .old_values
            .get(&Widget::sample(0, "", 0).object_id())
            .unwrap();
        let pre = pre.as_any().downcast_ref::<Widget>().unwrap();
        // the parent's earlier pre-image wins
        assert_eq!(pre.name, "parent-image");
        assert!(state.new_ids.contains(&Widget::sample(5, "", 0).object_id()));
    }
}
