use meridian_store::StoreError;
use meridian_types::TypeError;

/// Errors from chain-level processing.
///
/// `Validation` is the recoverable class: a transaction that fails validation
/// is rejected and its session reversed, and block processing continues.
/// Every other variant means the node itself is in trouble.
#[derive(Debug, thiserror::Error)]
pub enum ChainError {
    /// An operation or transaction failed a validation rule.
    #[error("validation failed: {0}")]
    Validation(String),

    /// An object store operation failed.
    #[error(transparent)]
    Store(#[from] StoreError),

    /// A value-type conversion or checked arithmetic step failed.
    #[error(transparent)]
    Types(#[from] TypeError),

    /// A block violated a structural rule (bad producer, bad timestamp).
    #[error("invalid block: {0}")]
    Block(String),

    /// No evaluator is registered for the operation's tag.
    #[error("no evaluator registered for operation tag {0}")]
    MissingEvaluator(u8),

    /// Two evaluators were registered for the same operation tag.
    #[error("evaluator already registered for operation tag {0}")]
    DuplicateEvaluator(u8),

    /// An operation tag is outside the registry's fixed capacity.
    #[error("operation tag {0} exceeds registry capacity {1}")]
    TagOutOfRange(u8, usize),

    /// Genesis configuration is unusable.
    #[error("invalid genesis: {0}")]
    Genesis(String),

    /// State reached a shape that consensus code must never produce. Fatal.
    #[error("state corruption: {0}")]
    Corruption(String),
}

impl ChainError {
    /// True for errors that reject a single transaction without poisoning
    /// the node.
    pub fn is_validation(&self) -> bool {
        matches!(
            self,
            ChainError::Validation(_)
                | ChainError::Types(_)
                | ChainError::Store(StoreError::NotFound(_))
        )
    }
}

/// Result alias for chain operations.
pub type ChainResult<T> = Result<T, ChainError>;

/// Fail with [`ChainError::Validation`] unless `cond` holds.
macro_rules! ensure {
    ($cond:expr, $($arg:tt)*) => {
        if !$cond {
            return Err($crate::error::ChainError::Validation(format!($($arg)*)));
        }
    };
}

pub(crate) use ensure;
