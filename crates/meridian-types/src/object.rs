use serde::de::DeserializeOwned;
use serde::Serialize;

use crate::id::ObjectId;

/// Capability contract every storable ledger object implements.
///
/// A concrete type binds to exactly one `(SPACE, TYPE_ID)` pair, owns its
/// instance number, and is cloneable and serde-serializable. That is the
/// entire surface the store and undo machinery need: the type-erased
/// lifecycle interface (clone, replace, structured and binary forms) is
/// derived from these bounds by a blanket implementation in the store crate,
/// so a storable type can never participate in a second lifecycle hierarchy.
///
/// The store assigns instance numbers; `set_instance` exists for the store
/// and must not be called from object builders or mutators.
pub trait ObjectClass: Clone + Serialize + DeserializeOwned + Send + 'static {
    const SPACE: u8;
    const TYPE_ID: u8;

    fn instance(&self) -> u64;

    fn set_instance(&mut self, instance: u64);

    fn object_id(&self) -> ObjectId {
        ObjectId::new(Self::SPACE, Self::TYPE_ID, self.instance())
    }
}
