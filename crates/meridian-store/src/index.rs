use std::any::Any;
use std::collections::BTreeMap;

use meridian_types::{ObjectClass, ObjectId};

use crate::error::{StoreError, StoreResult};
use crate::object::StoredObject;
use crate::secondary::SecondaryIndex;

/// Type-erased view of a primary index.
///
/// The database registry and the undo stack operate on indexes through this
/// interface without knowing the concrete object type. The restore methods
/// route through the same secondary-index hooks as the typed operations, so
/// derived lookups stay correct while a session is being reversed.
pub trait Index: Send {
    fn space(&self) -> u8;

    fn type_id(&self) -> u8;

    /// Clone of the object at `instance`, if present.
    fn find_boxed(&self, instance: u64) -> Option<Box<dyn StoredObject>>;

    /// Insert a previously removed object back under its old id.
    fn insert_boxed(&mut self, obj: Box<dyn StoredObject>) -> StoreResult<()>;

    /// Overwrite the live object at `obj`'s id with `obj`'s contents.
    fn restore_boxed(&mut self, obj: Box<dyn StoredObject>) -> StoreResult<()>;

    /// Remove the object at `instance`.
    fn remove_instance(&mut self, instance: u64) -> StoreResult<()>;

    fn next_instance(&self) -> u64;

    /// Roll the instance allocator back. Only the undo stack may call this.
    fn set_next_instance(&mut self, next: u64);

    fn len(&self) -> usize;

    fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn as_any(&self) -> &dyn Any;

    fn as_any_mut(&mut self) -> &mut dyn Any;
}

/// Owns every live instance of one object type, keyed by instance number in
/// ascending order, and fans mutation notifications out to its secondary
/// indexes.
pub struct PrimaryIndex<T: ObjectClass> {
    objects: BTreeMap<u64, T>,
    next_instance: u64,
    observers: Vec<Box<dyn SecondaryIndex<T>>>,
}

impl<T: ObjectClass> Default for PrimaryIndex<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T: ObjectClass> PrimaryIndex<T> {
    pub fn new() -> Self {
        Self {
            objects: BTreeMap::new(),
            next_instance: 0,
            observers: Vec::new(),
        }
    }

    fn id_of(instance: u64) -> ObjectId {
        ObjectId::new(T::SPACE, T::TYPE_ID, instance)
    }

    /// Attach a secondary index. Objects already present are backfilled
    /// through its `object_inserted` hook before it starts receiving live
    /// notifications.
    pub fn register_observer(&mut self, mut observer: Box<dyn SecondaryIndex<T>>) {
        for obj in self.objects.values() {
            observer.object_inserted(obj);
        }
        self.observers.push(observer);
    }

    /// Typed access to a registered observer, for derived-lookup queries.
    pub fn observer<S: SecondaryIndex<T> + 'static>(&self) -> Option<&S> {
        self.observers
            .iter()
            .find_map(|o| o.as_any().downcast_ref::<S>())
    }

    /// Allocate the next instance number, populate a fresh object through
    /// `build`, insert it, and notify observers.
    ///
    /// Exhaustion of the 64-bit instance space is fatal, not recoverable.
    pub fn create(&mut self, build: impl FnOnce(&mut T)) -> StoreResult<&T>
    where
        T: Default,
    {
        if self.next_instance == u64::MAX {
            return Err(StoreError::InstanceExhausted {
                space: T::SPACE,
                type_id: T::TYPE_ID,
            });
        }
        let instance = self.next_instance;
        let mut obj = T::default();
        obj.set_instance(instance);
        build(&mut obj);
        if obj.instance() != instance {
            return Err(StoreError::IdChanged {
                from: Self::id_of(instance),
                to: obj.object_id(),
            });
        }
        self.next_instance += 1;
        let obj = self.objects.entry(instance).or_insert(obj);
        for observer in &mut self.observers {
            observer.object_inserted(obj);
        }
        Ok(obj)
    }

    /// Apply `mutate` to the object at `instance`, bracketed by the
    /// pre-modify and post-modify observer hooks. The mutator must not
    /// change the object's id.
    pub fn modify(&mut self, instance: u64, mutate: impl FnOnce(&mut T)) -> StoreResult<()> {
        let obj = self
            .objects
            .get_mut(&instance)
            .ok_or_else(|| StoreError::NotFound(Self::id_of(instance)))?;
        for observer in &mut self.observers {
            observer.about_to_modify(obj);
        }
        mutate(obj);
        if obj.instance() != instance {
            return Err(StoreError::IdChanged {
                from: Self::id_of(instance),
                to: obj.object_id(),
            });
        }
        for observer in &mut self.observers {
            observer.object_modified(obj);
        }
        Ok(())
    }

    /// Remove and return the object at `instance`. The instance number is
    /// retired: the allocator never hands it out again.
    pub fn remove(&mut self, instance: u64) -> StoreResult<T> {
        let obj = self
            .objects
            .remove(&instance)
            .ok_or_else(|| StoreError::NotFound(Self::id_of(instance)))?;
        for observer in &mut self.observers {
            observer.object_removed(&obj);
        }
        Ok(obj)
    }

    pub fn find(&self, instance: u64) -> Option<&T> {
        self.objects.get(&instance)
    }

    pub fn get(&self, instance: u64) -> StoreResult<&T> {
        self.find(instance)
            .ok_or_else(|| StoreError::NotFound(Self::id_of(instance)))
    }

    /// All live objects in ascending instance order.
    pub fn iter(&self) -> impl Iterator<Item = &T> {
        self.objects.values()
    }

    /// The instance number the next `create` will assign.
    pub fn next_instance(&self) -> u64 {
        self.next_instance
    }
}

impl<T: ObjectClass> Index for PrimaryIndex<T> {
    fn space(&self) -> u8 {
        T::SPACE
    }

    fn type_id(&self) -> u8 {
        T::TYPE_ID
    }

    fn find_boxed(&self, instance: u64) -> Option<Box<dyn StoredObject>> {
        self.objects
            .get(&instance)
            .map(|obj| Box::new(obj.clone()) as Box<dyn StoredObject>)
    }

    fn insert_boxed(&mut self, obj: Box<dyn StoredObject>) -> StoreResult<()> {
        let id = obj.stored_id();
        let obj = obj
            .into_any()
            .downcast::<T>()
            .map_err(|_| StoreError::TypeMismatch(id))?;
        let instance = obj.instance();
        if self.objects.contains_key(&instance) {
            return Err(StoreError::AlreadyExists(id));
        }
        let obj = self.objects.entry(instance).or_insert(*obj);
        for observer in &mut self.observers {
            observer.object_inserted(obj);
        }
        Ok(())
    }

    fn restore_boxed(&mut self, image: Box<dyn StoredObject>) -> StoreResult<()> {
        let id = image.stored_id();
        let instance = id.instance;
        let obj = self
            .objects
            .get_mut(&instance)
            .ok_or(StoreError::NotFound(id))?;
        for observer in &mut self.observers {
            observer.about_to_modify(obj);
        }
        obj.replace_with(image)?;
        for observer in &mut self.observers {
            observer.object_modified(obj);
        }
        Ok(())
    }

    fn remove_instance(&mut self, instance: u64) -> StoreResult<()> {
        self.remove(instance).map(|_| ())
    }

    fn next_instance(&self) -> u64 {
        self.next_instance
    }

    fn set_next_instance(&mut self, next: u64) {
        self.next_instance = next;
    }

    fn len(&self) -> usize {
        self.objects.len()
    }

    fn as_any(&self) -> &dyn Any {
        self
    }

    fn as_any_mut(&mut self) -> &mut dyn Any {
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testutil::{CountingObserver, Widget, WidgetNameIndex};

    fn make_index() -> PrimaryIndex<Widget> {
        PrimaryIndex::new()
    }

    #[test]
    fn create_assigns_monotonic_instances() {
        let mut idx = make_index();
        let a = idx.create(|w| w.name = "a".into()).unwrap().object_id();
        let b = idx.create(|w| w.name = "b".into()).unwrap().object_id();
        assert_eq!(a.instance, 0);
        assert_eq!(b.instance, 1);
        assert_eq!(idx.next_instance(), 2);
    }

    #[test]
    fn instances_never_reused_after_remove() {
        let mut idx = make_index();
        let first = idx.create(|w| w.name = "x".into()).unwrap().instance();
        idx.remove(first).unwrap();
        let second = idx.create(|w| w.name = "y".into()).unwrap().instance();
        assert_eq!(second, first + 1);
        assert!(idx.find(first).is_none());
    }

    #[test]
    fn modify_rejects_id_change() {
        let mut idx = make_index();
        let instance = idx.create(|w| w.name = "x".into()).unwrap().instance();
        let err = idx.modify(instance, |w| w.instance = 99).unwrap_err();
        assert!(matches!(err, StoreError::IdChanged { .. }));
    }

    #[test]
    fn get_fails_find_is_optional() {
        let idx = make_index();
        assert!(idx.find(0).is_none());
        assert!(matches!(idx.get(0), Err(StoreError::NotFound(_))));
    }

    #[test]
    fn observers_see_all_hooks_in_order() {
        let mut idx = make_index();
        idx.register_observer(Box::new(CountingObserver::default()));

        let instance = idx.create(|w| w.name = "a".into()).unwrap().instance();
        idx.modify(instance, |w| w.value = 5).unwrap();
        idx.remove(instance).unwrap();

        let counts = idx.observer::<CountingObserver>().unwrap();
        assert_eq!(counts.inserted, 1);
        assert_eq!(counts.pre_modified, 1);
        assert_eq!(counts.modified, 1);
        assert_eq!(counts.removed, 1);
    }

    #[test]
    fn late_attachment_backfills_existing_objects() {
        let mut idx = make_index();
        idx.create(|w| w.name = "early".into()).unwrap();
        idx.create(|w| w.name = "earlier".into()).unwrap();

        idx.register_observer(Box::new(WidgetNameIndex::default()));
        let names = idx.observer::<WidgetNameIndex>().unwrap();
        assert!(names.find("early").is_some());
        assert!(names.find("earlier").is_some());
    }

    #[test]
    fn name_index_tracks_renames_and_removal() {
        let mut idx = make_index();
        idx.register_observer(Box::new(WidgetNameIndex::default()));

        let instance = idx.create(|w| w.name = "old".into()).unwrap().instance();
        idx.modify(instance, |w| w.name = "new".into()).unwrap();

        let names = idx.observer::<WidgetNameIndex>().unwrap();
        assert!(names.find("old").is_none());
        assert_eq!(names.find("new"), Some(instance));

        idx.remove(instance).unwrap();
        let names = idx.observer::<WidgetNameIndex>().unwrap();
        assert!(names.find("new").is_none());
    }

    #[test]
    fn erased_restore_routes_through_hooks() {
        let mut idx = make_index();
        idx.register_observer(Box::new(WidgetNameIndex::default()));
        let instance = idx.create(|w| w.name = "before".into()).unwrap().instance();

        let image = Widget::sample(instance, "after", 9);
        Index::restore_boxed(&mut idx, Box::new(image)).unwrap();

        assert_eq!(idx.get(instance).unwrap().name, "after");
        let names = idx.observer::<WidgetNameIndex>().unwrap();
        assert_eq!(names.find("after"), Some(instance));
        assert!(names.find("before").is_none());
    }

    #[test]
    fn erased_insert_rejects_duplicates() {
        let mut idx = make_index();
        let instance = idx.create(|w| w.name = "x".into()).unwrap().instance();
        let dup = Widget::sample(instance, "x", 0);
        let err = Index::insert_boxed(&mut idx, Box::new(dup)).unwrap_err();
        assert!(matches!(err, StoreError::AlreadyExists(_)));
    }

    proptest::proptest! {
        // interleaved removals never make the allocator reuse a number
        #[test]
        fn allocator_is_monotonic(removals in proptest::collection::vec(0u64..64, 0..32)) {
            let mut idx = make_index();
            let mut created = 0u64;
            for target in removals {
                let obj = idx.create(|w| w.value = target as i64).unwrap().instance();
                proptest::prop_assert_eq!(obj, created);
                created += 1;
                let _ = idx.remove(target);
            }
            proptest::prop_assert_eq!(idx.next_instance(), created);
        }
    }
}
