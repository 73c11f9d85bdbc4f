//! Foundation types for the Meridian ledger core.
//!
//! This crate provides the identity, value, and temporal types used by every
//! other Meridian crate, plus the capability contract storable objects must
//! satisfy.
//!
//! # Key Types
//!
//! - [`ObjectId`] — Space-scoped `(space, type, instance)` identity triple
//! - [`AccountId`], [`ValidatorId`] — Typed instance-number wrappers
//! - [`ObjectClass`] — Capability trait every storable type implements
//! - [`AnnotationMap`] — Per-space cross-references for plugin metadata
//! - [`Share`], [`AssetAmount`], [`Price`] — Checked ledger arithmetic
//! - [`BlockTimestamp`] — Second-resolution chain time with slot arithmetic

pub mod amount;
pub mod annotations;
pub mod error;
pub mod id;
pub mod object;
pub mod timestamp;

pub use amount::{AssetAmount, AssetId, Price, Share, MAX_SHARE_SUPPLY};
pub use annotations::AnnotationMap;
pub use error::TypeError;
pub use id::{
    AccountId, AccountStatisticsId, ObjectId, ValidatorId, ACCOUNT_STATISTICS_TYPE, ACCOUNT_TYPE,
    DYNAMIC_GLOBAL_PROPERTY_TYPE, GLOBAL_PROPERTY_TYPE, IMPLEMENTATION_SPACE, PRODUCER_SCHEDULE_TYPE,
    PROTOCOL_SPACE, VALIDATOR_TYPE,
};
pub use object::ObjectClass;
pub use timestamp::BlockTimestamp;
