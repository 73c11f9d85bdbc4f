use std::collections::BTreeMap;

use meridian_types::{ObjectClass, ObjectId};

use crate::error::{StoreError, StoreResult};
use crate::index::{Index, PrimaryIndex};
use crate::secondary::SecondaryIndex;
use crate::undo::{UndoStack, UndoState};

/// In-memory object database: one [`PrimaryIndex`] per registered object
/// type, keyed by `(space, type)`, with an [`UndoStack`] layered over every
/// mutation.
///
/// All typed mutations (`create`, `modify`, `remove`) report to the undo
/// stack; session reversal bypasses capture and writes to the indexes
/// through their type-erased interface, which still fires secondary-index
/// hooks so derived lookups stay correct across rollback.
#[derive(Default)]
pub struct ObjectDatabase {
    indexes: BTreeMap<(u8, u8), Box<dyn Index>>,
    undo: UndoStack,
}

impl ObjectDatabase {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register the primary index for `T`. Each `(space, type)` pair may be
    /// registered exactly once, before any objects of that type exist.
    pub fn register_index<T: ObjectClass>(&mut self) -> StoreResult<()> {
        let key = (T::SPACE, T::TYPE_ID);
        if self.indexes.contains_key(&key) {
            return Err(StoreError::DuplicateIndex {
                space: T::SPACE,
                type_id: T::TYPE_ID,
            });
        }
        self.indexes.insert(key, Box::new(PrimaryIndex::<T>::new()));
        Ok(())
    }

    /// Attach a secondary index to `T`'s primary index. Existing objects are
    /// backfilled through the observer before live notifications begin.
    pub fn attach_secondary<T: ObjectClass>(
        &mut self,
        observer: Box<dyn SecondaryIndex<T>>,
    ) -> StoreResult<()> {
        self.index_mut::<T>()?.register_observer(observer);
        Ok(())
    }

    /// Read access to `T`'s primary index.
    pub fn index<T: ObjectClass>(&self) -> StoreResult<&PrimaryIndex<T>> {
        let key = (T::SPACE, T::TYPE_ID);
        let index = self
            .indexes
            .get(&key)
            .ok_or(StoreError::UnknownIndex {
                space: T::SPACE,
                type_id: T::TYPE_ID,
            })?;
        index
            .as_any()
            .downcast_ref::<PrimaryIndex<T>>()
            .ok_or(StoreError::TypeMismatch(ObjectId::new(
                T::SPACE,
                T::TYPE_ID,
                0,
            )))
    }

    fn index_mut<T: ObjectClass>(&mut self) -> StoreResult<&mut PrimaryIndex<T>> {
        let key = (T::SPACE, T::TYPE_ID);
        let index = self
            .indexes
            .get_mut(&key)
            .ok_or(StoreError::UnknownIndex {
                space: T::SPACE,
                type_id: T::TYPE_ID,
            })?;
        index
            .as_any_mut()
            .downcast_mut::<PrimaryIndex<T>>()
            .ok_or(StoreError::TypeMismatch(ObjectId::new(
                T::SPACE,
                T::TYPE_ID,
                0,
            )))
    }

    fn erased_index_mut(&mut self, space: u8, type_id: u8) -> StoreResult<&mut (dyn Index + '_)> {
        match self.indexes.get_mut(&(space, type_id)) {
            Some(index) => Ok(index.as_mut()),
            None => Err(StoreError::UnknownIndex { space, type_id }),
        }
    }

    /// Create a new object of type `T` at the next instance number,
    /// populated through `build`. Returns a copy of the stored object.
    pub fn create<T: ObjectClass + Default>(
        &mut self,
        build: impl FnOnce(&mut T),
    ) -> StoreResult<T> {
        let index = self.index_mut::<T>()?;
        let old_next = index.next_instance();
        let obj = index.create(build)?.clone();
        self.undo.on_create(obj.object_id(), old_next);
        Ok(obj)
    }

    /// Apply `mutate` to the object of type `T` at `instance`. The pre-image
    /// is captured for undo before the mutation runs, so session reversal
    /// restores the object even when the mutator itself is rejected.
    pub fn modify<T: ObjectClass>(
        &mut self,
        instance: u64,
        mutate: impl FnOnce(&mut T),
    ) -> StoreResult<()> {
        let pre = self.index::<T>()?.get(instance)?.clone();
        self.undo.on_modify(Box::new(pre));
        self.index_mut::<T>()?.modify(instance, mutate)
    }

    /// Remove the object of type `T` at `instance` and return it. The
    /// instance number is permanently retired.
    pub fn remove<T: ObjectClass>(&mut self, instance: u64) -> StoreResult<T> {
        let obj = self.index_mut::<T>()?.remove(instance)?;
        self.undo.on_remove(Box::new(obj.clone()));
        Ok(obj)
    }

    pub fn find<T: ObjectClass>(&self, instance: u64) -> Option<&T> {
        self.index::<T>().ok()?.find(instance)
    }

    pub fn get<T: ObjectClass>(&self, instance: u64) -> StoreResult<&T> {
        self.index::<T>()?.get(instance)
    }

    // --- session management -------------------------------------------------

    pub fn undo_enabled(&self) -> bool {
        self.undo.enabled()
    }

    /// Disable or re-enable undo capture (genesis and replay run with it
    /// off). No session may be open while disabled.
    pub fn set_undo_enabled(&mut self, enabled: bool) {
        self.undo.set_enabled(enabled);
    }

    pub fn undo_size(&self) -> usize {
        self.undo.size()
    }

    pub fn active_sessions(&self) -> u32 {
        self.undo.active_sessions()
    }

    pub fn max_undo_size(&self) -> usize {
        self.undo.max_size()
    }

    pub fn set_max_undo_size(&mut self, max: usize) {
        self.undo.set_max_size(max);
    }

    /// Open a session and return a guard that reverses it on drop unless
    /// explicitly committed or merged.
    pub fn session(&mut self) -> StoreResult<Session<'_>> {
        self.undo.start_session()?;
        Ok(Session {
            db: self,
            finished: false,
        })
    }

    /// Open a session without a guard. The caller owns its lifecycle through
    /// [`commit_session`](Self::commit_session),
    /// [`merge_session`](Self::merge_session) or
    /// [`undo_active_session`](Self::undo_active_session).
    pub fn start_session(&mut self) -> StoreResult<()> {
        self.undo.start_session()
    }

    /// Make the innermost session part of committed history.
    pub fn commit_session(&mut self) -> StoreResult<()> {
        self.undo.commit_session()
    }

    /// Fold the innermost session into its parent.
    pub fn merge_session(&mut self) -> StoreResult<()> {
        self.undo.merge_session()
    }

    /// Run `f` inside a fresh session: committed on `Ok`, fully reversed on
    /// `Err`.
    pub fn with_session<R, E>(
        &mut self,
        f: impl FnOnce(&mut Self) -> Result<R, E>,
    ) -> Result<R, E>
    where
        E: From<StoreError>,
    {
        self.undo.start_session()?;
        match f(self) {
            Ok(value) => {
                self.undo.commit_session()?;
                Ok(value)
            }
            Err(err) => {
                self.undo_active_session()?;
                Err(err)
            }
        }
    }

    /// Reverse every mutation recorded by the innermost session, in the
    /// inverse order of capture classes: modified objects are restored to
    /// their pre-images, created objects are deleted, removed objects are
    /// re-inserted, and instance allocators roll back to their first-touch
    /// positions.
    pub fn undo_active_session(&mut self) -> StoreResult<()> {
        let state = self.undo.pop_active()?;
        self.apply_reversal(state)
    }

    fn apply_reversal(&mut self, state: UndoState) -> StoreResult<()> {
        let UndoState {
            old_values,
            new_ids,
            removed,
            old_next_instances,
        } = state;

        for (id, old) in old_values {
            self.erased_index_mut(id.space, id.type_id)?
                .restore_boxed(old)?;
        }
        for id in new_ids {
            self.erased_index_mut(id.space, id.type_id)?
                .remove_instance(id.instance)?;
        }
        for (id, image) in removed {
            self.erased_index_mut(id.space, id.type_id)?
                .insert_boxed(image)?;
        }
        for ((space, type_id), next) in old_next_instances {
            self.erased_index_mut(space, type_id)?
                .set_next_instance(next);
        }
        Ok(())
    }
}

/// RAII wrapper over one undo session. Dropping the guard without calling
/// [`commit`](Session::commit) or [`merge`](Session::merge) reverses the
/// session, so an early `?` return inside a speculative block of work cannot
/// leave partial state behind.
pub struct Session<'a> {
    db: &'a mut ObjectDatabase,
    finished: bool,
}

impl Session<'_> {
    pub fn db(&mut self) -> &mut ObjectDatabase {
        self.db
    }

    /// Keep the session's changes as committed history.
    pub fn commit(mut self) -> StoreResult<()> {
        self.finished = true;
        self.db.commit_session()
    }

    /// Fold the session's changes into the enclosing session.
    pub fn merge(mut self) -> StoreResult<()> {
        self.finished = true;
        self.db.merge_session()
    }

    /// Reverse the session's changes immediately.
    pub fn undo(mut self) -> StoreResult<()> {
        self.finished = true;
        self.db.undo_active_session()
    }
}

impl Drop for Session<'_> {
    fn drop(&mut self) {
        if self.finished {
            return;
        }
        if let Err(err) = self.db.undo_active_session() {
            tracing::error!(%err, "failed to reverse abandoned session");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testutil::{Widget, WidgetNameIndex};

    fn make_db() -> ObjectDatabase {
        let mut db = ObjectDatabase::new();
        db.register_index::<Widget>().unwrap();
        db
    }

    #[test]
    fn duplicate_registration_fails() {
        let mut db = make_db();
        assert!(matches!(
            db.register_index::<Widget>(),
            Err(StoreError::DuplicateIndex { .. })
        ));
    }

    #[test]
    fn unknown_index_fails() {
        let mut db = ObjectDatabase::new();
        let err = db.create::<Widget>(|_| {}).unwrap_err();
        assert!(matches!(err, StoreError::UnknownIndex { .. }));
    }

    #[test]
    fn undo_reverses_create() {
        let mut db = make_db();
        db.start_session().unwrap();
        let obj = db.create::<Widget>(|w| w.name = "ghost".into()).unwrap();
        assert!(db.find::<Widget>(obj.instance).is_some());

        db.undo_active_session().unwrap();
        assert!(db.find::<Widget>(obj.instance).is_none());
        // the allocator rolled back too
        assert_eq!(db.index::<Widget>().unwrap().next_instance(), 0);
    }

    #[test]
    fn undo_reverses_modify() {
        let mut db = make_db();
        let obj = db.create::<Widget>(|w| w.value = 5).unwrap();

        db.start_session().unwrap();
        db.modify::<Widget>(obj.instance, |w| w.value = 7).unwrap();
        db.modify::<Widget>(obj.instance, |w| w.value = 9).unwrap();
        assert_eq!(db.get::<Widget>(obj.instance).unwrap().value, 9);

        db.undo_active_session().unwrap();
        assert_eq!(db.get::<Widget>(obj.instance).unwrap().value, 5);
    }

    #[test]
    fn undo_heals_rejected_mutation() {
        let mut db = make_db();
        let obj = db.create::<Widget>(|w| w.value = 5).unwrap();

        db.start_session().unwrap();
        // the id change is rejected, but the mutator already ran
        let err = db
            .modify::<Widget>(obj.instance, |w| {
                w.value = 999;
                w.instance = 42;
            })
            .unwrap_err();
        assert!(matches!(err, StoreError::IdChanged { .. }));

        db.undo_active_session().unwrap();
        let healed = db.get::<Widget>(obj.instance).unwrap();
        assert_eq!(healed.instance, obj.instance);
        assert_eq!(healed.value, 5);
    }

    #[test]
    fn undo_reverses_remove() {
        let mut db = make_db();
        let obj = db
            .create::<Widget>(|w| {
                w.name = "keeper".into();
                w.value = 3;
            })
            .unwrap();

        db.start_session().unwrap();
        db.remove::<Widget>(obj.instance).unwrap();
        assert!(db.find::<Widget>(obj.instance).is_none());

        db.undo_active_session().unwrap();
        let restored = db.get::<Widget>(obj.instance).unwrap();
        assert_eq!(restored.name, "keeper");
        assert_eq!(restored.value, 3);
    }

    #[test]
    fn create_and_remove_in_one_session_undoes_to_nothing() {
        let mut db = make_db();
        db.start_session().unwrap();
        let obj = db.create::<Widget>(|w| w.name = "blip".into()).unwrap();
        db.remove::<Widget>(obj.instance).unwrap();

        db.undo_active_session().unwrap();
        assert!(db.find::<Widget>(obj.instance).is_none());
        assert_eq!(db.index::<Widget>().unwrap().next_instance(), 0);
    }

    #[test]
    fn merged_sessions_reverse_as_one_unit() {
        let mut db = make_db();
        let obj = db.create::<Widget>(|w| w.value = 1).unwrap();

        db.start_session().unwrap();
        db.modify::<Widget>(obj.instance, |w| w.value = 2).unwrap();

        db.start_session().unwrap();
        db.modify::<Widget>(obj.instance, |w| w.value = 3).unwrap();
        let inner = db.create::<Widget>(|w| w.name = "tx".into()).unwrap();
        db.merge_session().unwrap();

        db.undo_active_session().unwrap();
        assert_eq!(db.get::<Widget>(obj.instance).unwrap().value, 1);
        assert!(db.find::<Widget>(inner.instance).is_none());
    }

    #[test]
    fn session_guard_reverts_on_drop() {
        let mut db = make_db();
        let instance = {
            let mut session = db.session().unwrap();
            let obj = session
                .db()
                .create::<Widget>(|w| w.name = "dropped".into())
                .unwrap();
            obj.instance
            // guard dropped here without commit
        };
        assert!(db.find::<Widget>(instance).is_none());
    }

    #[test]
    fn session_guard_commit_keeps_changes() {
        let mut db = make_db();
        let instance = {
            let mut session = db.session().unwrap();
            let obj = session
                .db()
                .create::<Widget>(|w| w.name = "kept".into())
                .unwrap();
            let instance = obj.instance;
            session.commit().unwrap();
            instance
        };
        assert!(db.find::<Widget>(instance).is_some());
        assert_eq!(db.active_sessions(), 0);
        assert_eq!(db.undo_size(), 1);
    }

    #[test]
    fn with_session_commits_on_ok_and_reverses_on_err() {
        let mut db = make_db();

        let kept = db
            .with_session(|db| db.create::<Widget>(|w| w.name = "ok".into()))
            .unwrap();
        assert!(db.find::<Widget>(kept.instance).is_some());

        let result: Result<(), StoreError> = db.with_session(|db| {
            db.create::<Widget>(|w| w.name = "doomed".into())?;
            Err(StoreError::NoActiveSession)
        });
        assert!(result.is_err());
        assert_eq!(db.index::<Widget>().unwrap().len(), 1);
    }

    #[test]
    fn secondary_indexes_stay_consistent_across_undo() {
        let mut db = make_db();
        db.attach_secondary::<Widget>(Box::new(WidgetNameIndex::default()))
            .unwrap();
        let obj = db.create::<Widget>(|w| w.name = "stable".into()).unwrap();

        db.start_session().unwrap();
        db.modify::<Widget>(obj.instance, |w| w.name = "renamed".into())
            .unwrap();
        let ghost = db.create::<Widget>(|w| w.name = "ghost".into()).unwrap();
        db.undo_active_session().unwrap();

        let idx = db.index::<Widget>().unwrap();
        let names = idx.observer::<WidgetNameIndex>().unwrap();
        assert_eq!(names.find("stable"), Some(obj.instance));
        assert!(names.find("renamed").is_none());
        assert!(names.find("ghost").is_none());
        assert!(db.find::<Widget>(ghost.instance).is_none());
    }

    #[test]
    fn disabled_undo_records_nothing() {
        let mut db = make_db();
        db.set_undo_enabled(false);
        let obj = db.create::<Widget>(|w| w.name = "genesis".into()).unwrap();
        db.set_undo_enabled(true);

        assert!(db.find::<Widget>(obj.instance).is_some());
        assert!(matches!(
            db.undo_active_session(),
            Err(StoreError::NoActiveSession)
        ));
    }
}
