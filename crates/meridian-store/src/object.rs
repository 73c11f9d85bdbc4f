use std::any::Any;

use meridian_types::{ObjectClass, ObjectId};

use crate::error::{StoreError, StoreResult};

/// Type-erased lifecycle interface over any storable object.
///
/// This is the whole contract the undo stack and the index registry need:
/// identity, deep copy, in-place replacement, and the two lossless
/// serialized forms. It is implemented once, by the blanket impl below, for
/// every [`ObjectClass`] type; nothing else may implement it, which keeps a
/// concrete type from ever carrying two lifecycle hierarchies.
pub trait StoredObject: Any + Send {
    /// The `(space, type, instance)` identity triple.
    fn stored_id(&self) -> ObjectId;

    /// Independent deep copy.
    fn clone_boxed(&self) -> Box<dyn StoredObject>;

    /// Atomically overwrite this instance's contents with `other`'s.
    ///
    /// Fails with [`StoreError::TypeMismatch`] if `other` is a different
    /// concrete type.
    fn replace_with(&mut self, other: Box<dyn StoredObject>) -> StoreResult<()>;

    /// Lossless self-describing structured form.
    fn to_structured(&self) -> StoreResult<serde_json::Value>;

    /// Lossless compact binary form.
    fn to_bytes(&self) -> StoreResult<Vec<u8>>;

    fn as_any(&self) -> &dyn Any;

    fn into_any(self: Box<Self>) -> Box<dyn Any>;
}

impl<T: ObjectClass> StoredObject for T {
    fn stored_id(&self) -> ObjectId {
        self.object_id()
    }

    fn clone_boxed(&self) -> Box<dyn StoredObject> {
        Box::new(self.clone())
    }

    fn replace_with(&mut self, other: Box<dyn StoredObject>) -> StoreResult<()> {
        let id = other.stored_id();
        let other = other
            .into_any()
            .downcast::<T>()
            .map_err(|_| StoreError::TypeMismatch(id))?;
        *self = *other;
        Ok(())
    }

    fn to_structured(&self) -> StoreResult<serde_json::Value> {
        serde_json::to_value(self).map_err(|e| StoreError::Serialization(e.to_string()))
    }

    fn to_bytes(&self) -> StoreResult<Vec<u8>> {
        bincode::serialize(self).map_err(|e| StoreError::Serialization(e.to_string()))
    }

    fn as_any(&self) -> &dyn Any {
        self
    }

    fn into_any(self: Box<Self>) -> Box<dyn Any> {
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testutil::Widget;

    #[test]
    fn clone_boxed_is_deep() {
        let w = Widget::sample(3, "gear", 5);
        let boxed = w.clone_boxed();
        assert_eq!(boxed.stored_id(), w.object_id());

        let back = boxed.into_any().downcast::<Widget>().unwrap();
        assert_eq!(*back, w);
    }

    #[test]
    fn replace_with_swaps_contents() {
        let mut a = Widget::sample(0, "a", 1);
        let b = Widget::sample(0, "b", 2);
        a.replace_with(b.clone_boxed()).unwrap();
        assert_eq!(a, b);
    }

    #[test]
    fn replace_with_rejects_foreign_type() {
        use crate::testutil::Gadget;
        let mut w = Widget::sample(0, "w", 1);
        let g = Gadget::sample(0, 9);
        let err = w.replace_with(g.clone_boxed()).unwrap_err();
        assert!(matches!(err, StoreError::TypeMismatch(_)));
    }

    #[test]
    fn serialized_forms_roundtrip() {
        let w = Widget::sample(7, "rotor", 42);

        let value = w.to_structured().unwrap();
        let from_value: Widget = serde_json::from_value(value).unwrap();
        assert_eq!(from_value, w);

        let bytes = w.to_bytes().unwrap();
        let from_bytes: Widget = bincode::deserialize(&bytes).unwrap();
        assert_eq!(from_bytes, w);
    }
}
