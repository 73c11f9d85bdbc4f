use std::any::Any;

use meridian_types::ObjectClass;

/// Observer maintaining a derived lookup or aggregate over one primary index.
///
/// Hooks fire for every mutation of the primary collection, in listener
/// registration order, including mutations performed while the undo stack
/// reverses a session — so an observer that handles all four hooks stays
/// consistent across rollback without participating in the undo protocol
/// itself. Observer state must be rebuildable from the primary store (the
/// backfill pass on late attachment relies on this).
pub trait SecondaryIndex<T: ObjectClass>: Send {
    /// A new object was inserted.
    fn object_inserted(&mut self, _obj: &T) {}

    /// `obj` is about to be modified; it still holds the pre-image.
    fn about_to_modify(&mut self, _obj: &T) {}

    /// `obj` was modified; it holds the post-image.
    fn object_modified(&mut self, _obj: &T) {}

    /// `obj` is about to be removed from the primary collection.
    fn object_removed(&mut self, _obj: &T) {}

    /// Downcasting access for typed queries against a registered observer.
    fn as_any(&self) -> &dyn Any;
}
