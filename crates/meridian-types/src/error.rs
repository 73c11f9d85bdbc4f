/// Errors from parsing or arithmetic on foundation types.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum TypeError {
    /// A textual object id did not match `"<space>.<type>.<instance>"`.
    #[error("malformed object id: {0}")]
    InvalidObjectId(String),

    /// An object id had the wrong space or type for the requested conversion.
    #[error("object id {id} is not a {expected}")]
    WrongObjectType { id: String, expected: &'static str },

    /// Share arithmetic overflowed or left the valid supply range.
    #[error("amount out of range: {0}")]
    AmountOutOfRange(String),

    /// A price quoted incompatible assets for the requested conversion.
    #[error("price does not quote asset {0}")]
    IncompatibleAsset(u64),

    /// A price with a zero base or quote amount cannot convert anything.
    #[error("price has a zero component")]
    ZeroPrice,
}
