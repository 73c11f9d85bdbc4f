use meridian_types::ObjectId;

/// Errors from object store and undo stack operations.
///
/// `NotFound` is the only variant an evaluator may treat as a recoverable
/// validation condition; everything else indicates a programming error or
/// state corruption and must halt block processing.
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    /// The requested object does not exist.
    #[error("object not found: {0}")]
    NotFound(ObjectId),

    /// No index is registered for the `(space, type)` pair.
    #[error("no index registered for space {space} type {type_id}")]
    UnknownIndex { space: u8, type_id: u8 },

    /// An index for the `(space, type)` pair was registered twice.
    #[error("index already registered for space {space} type {type_id}")]
    DuplicateIndex { space: u8, type_id: u8 },

    /// A boxed object reached an index of a different concrete type.
    #[error("object {0} does not match the index's object type")]
    TypeMismatch(ObjectId),

    /// A mutator changed an object's id in place.
    #[error("mutation changed object id from {from} to {to}")]
    IdChanged { from: ObjectId, to: ObjectId },

    /// The 64-bit instance space for a type is exhausted. Fatal.
    #[error("instance numbers exhausted for space {space} type {type_id}")]
    InstanceExhausted { space: u8, type_id: u8 },

    /// An object to insert already exists at its id.
    #[error("object {0} already exists")]
    AlreadyExists(ObjectId),

    /// A session operation was requested with no session open.
    #[error("no active undo session")]
    NoActiveSession,

    /// The undo stack reached an inconsistent state. Fatal.
    #[error("undo stack invariant violated: {0}")]
    UndoViolation(String),

    /// Serialization of an object to its structured or binary form failed.
    #[error("serialization error: {0}")]
    Serialization(String),
}

/// Result alias for store operations.
pub type StoreResult<T> = Result<T, StoreError>;
