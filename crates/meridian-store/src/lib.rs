//! Indexed in-memory object store with undo-based rollback.
//!
//! - [`StoredObject`]: type-erased lifecycle over any [`ObjectClass`] type,
//!   implemented once by a blanket impl
//! - [`PrimaryIndex`]: per-type owner of all live objects, with secondary
//!   index observers for derived lookups
//! - [`ObjectDatabase`]: the registry of indexes plus session management
//! - [`UndoStack`]: bounded change-set stack making whole sessions reversible
//!
//! Every mutation flows through [`ObjectDatabase`] so the innermost open
//! session can always be reversed exactly; secondary indexes are notified on
//! both forward mutation and rollback.
//!
//! [`ObjectClass`]: meridian_types::ObjectClass

pub mod database;
pub mod error;
pub mod index;
pub mod object;
pub mod secondary;
pub mod undo;

pub use database::{ObjectDatabase, Session};
pub use error::{StoreError, StoreResult};
pub use index::{Index, PrimaryIndex};
pub use object::StoredObject;
pub use secondary::SecondaryIndex;
pub use undo::{UndoStack, DEFAULT_MAX_UNDO_SESSIONS};

#[cfg(test)]
pub(crate) mod testutil {
    use std::any::Any;
    use std::collections::BTreeMap;

    use meridian_types::ObjectClass;
    use serde::{Deserialize, Serialize};

    use crate::secondary::SecondaryIndex;

    /// Throwaway object type living in a test-only space.
    #[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
    pub struct Widget {
        pub instance: u64,
        pub name: String,
        pub value: i64,
    }

    impl Widget {
        pub fn sample(instance: u64, name: &str, value: i64) -> Self {
            Self {
                instance,
                name: name.to_owned(),
                value,
            }
        }
    }

    impl ObjectClass for Widget {
        const SPACE: u8 = 9;
        const TYPE_ID: u8 = 1;

        fn instance(&self) -> u64 {
            self.instance
        }

        fn set_instance(&mut self, instance: u64) {
            self.instance = instance;
        }
    }

    /// Second object type, for type-mismatch tests.
    #[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
    pub struct Gadget {
        pub instance: u64,
        pub weight: u32,
    }

    impl Gadget {
        pub fn sample(instance: u64, weight: u32) -> Self {
            Self { instance, weight }
        }
    }

    impl ObjectClass for Gadget {
        const SPACE: u8 = 9;
        const TYPE_ID: u8 = 2;

        fn instance(&self) -> u64 {
            self.instance
        }

        fn set_instance(&mut self, instance: u64) {
            self.instance = instance;
        }
    }

    /// Counts every hook invocation.
    #[derive(Default)]
    pub struct CountingObserver {
        pub inserted: usize,
        pub pre_modified: usize,
        pub modified: usize,
        pub removed: usize,
    }

    impl SecondaryIndex<Widget> for CountingObserver {
        fn object_inserted(&mut self, _obj: &Widget) {
            self.inserted += 1;
        }

        fn about_to_modify(&mut self, _obj: &Widget) {
            self.pre_modified += 1;
        }

        fn object_modified(&mut self, _obj: &Widget) {
            self.modified += 1;
        }

        fn object_removed(&mut self, _obj: &Widget) {
            self.removed += 1;
        }

        fn as_any(&self) -> &dyn Any {
            self
        }
    }

    /// Name-to-instance lookup maintained purely from the hooks.
    #[derive(Default)]
    pub struct WidgetNameIndex {
        by_name: BTreeMap<String, u64>,
    }

    impl WidgetNameIndex {
        pub fn find(&self, name: &str) -> Option<u64> {
            self.by_name.get(name).copied()
        }
    }

    impl SecondaryIndex<Widget> for WidgetNameIndex {
        fn object_inserted(&mut self, obj: &Widget) {
            self.by_name.insert(obj.name.clone(), obj.instance);
        }

        fn about_to_modify(&mut self, obj: &Widget) {
            self.by_name.remove(&obj.name);
        }

        fn object_modified(&mut self, obj: &Widget) {
            self.by_name.insert(obj.name.clone(), obj.instance);
        }

        fn object_removed(&mut self, obj: &Widget) {
            self.by_name.remove(&obj.name);
        }

        fn as_any(&self) -> &dyn Any {
            self
        }
    }
}
