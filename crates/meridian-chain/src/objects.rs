use meridian_types::{
    AccountId, AccountStatisticsId, AnnotationMap, BlockTimestamp, ObjectClass, Share,
    ValidatorId, ACCOUNT_STATISTICS_TYPE, ACCOUNT_TYPE, DYNAMIC_GLOBAL_PROPERTY_TYPE,
    GLOBAL_PROPERTY_TYPE, IMPLEMENTATION_SPACE, PRODUCER_SCHEDULE_TYPE, PROTOCOL_SPACE,
    VALIDATOR_TYPE,
};
use serde::{Deserialize, Serialize};

use crate::fees::FeeSchedule;

/// Fraction denominator used for percentages and fee scaling: 10_000 basis
/// points is 100%.
pub const CHAIN_100_PERCENT: u32 = 10_000;

/// Consensus parameters, updatable only through governance (here: fixed at
/// genesis, refreshed by the maintenance pass).
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ChainParameters {
    pub current_fees: FeeSchedule,
    /// Seconds between consecutive block production slots.
    pub block_interval: u8,
    /// Seconds between maintenance passes.
    pub maintenance_interval: u32,
    /// Production slots skipped after a maintenance pass.
    pub maintenance_skip_slots: u8,
    /// Retained undo history depth, in sessions.
    pub maximum_undo_depth: u32,
    /// Ceiling on the active validator set size.
    pub maximum_validator_count: u16,
}

impl Default for ChainParameters {
    fn default() -> Self {
        Self {
            current_fees: FeeSchedule::default(),
            block_interval: 5,
            maintenance_interval: 86_400,
            maintenance_skip_slots: 3,
            maximum_undo_depth: 1024,
            maximum_validator_count: 1001,
        }
    }
}

/// A named account in the protocol space. Balance and fee accumulators live
/// on the companion statistics object so the frequently-written fields don't
/// churn undo pre-images of the whole account.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct AccountObject {
    pub instance: u64,
    pub name: String,
    /// Companion implementation-space statistics object.
    pub statistics: AccountStatisticsId,
    pub annotations: AnnotationMap,
}

impl ObjectClass for AccountObject {
    const SPACE: u8 = PROTOCOL_SPACE;
    const TYPE_ID: u8 = ACCOUNT_TYPE;

    fn instance(&self) -> u64 {
        self.instance
    }

    fn set_instance(&mut self, instance: u64) {
        self.instance = instance;
    }
}

impl AccountObject {
    pub fn id(&self) -> AccountId {
        AccountId(self.instance)
    }
}

/// Per-account mutable counters: core balance and fees accrued since the
/// last maintenance sweep.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct AccountStatisticsObject {
    pub instance: u64,
    pub owner: AccountId,
    pub core_balance: Share,
    /// Fees paid by this account, awaiting the maintenance sweep.
    pub pending_fees: Share,
    pub lifetime_fees_paid: Share,
}

impl ObjectClass for AccountStatisticsObject {
    const SPACE: u8 = IMPLEMENTATION_SPACE;
    const TYPE_ID: u8 = ACCOUNT_STATISTICS_TYPE;

    fn instance(&self) -> u64 {
        self.instance
    }

    fn set_instance(&mut self, instance: u64) {
        self.instance = instance;
    }
}

impl AccountStatisticsObject {
    pub fn id(&self) -> AccountStatisticsId {
        AccountStatisticsId(self.instance)
    }
}

/// A block-producer candidate tied to an owning account.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct ValidatorObject {
    pub instance: u64,
    pub validator_account: AccountId,
    /// Hex-encoded block signing public key.
    pub signing_key: String,
    pub url: String,
    /// Governance vote slot, assigned from global properties at creation.
    pub vote_id: u32,
    pub total_missed: u64,
    pub annotations: AnnotationMap,
}

impl ObjectClass for ValidatorObject {
    const SPACE: u8 = PROTOCOL_SPACE;
    const TYPE_ID: u8 = VALIDATOR_TYPE;

    fn instance(&self) -> u64 {
        self.instance
    }

    fn set_instance(&mut self, instance: u64) {
        self.instance = instance;
    }
}

impl ValidatorObject {
    pub fn id(&self) -> ValidatorId {
        ValidatorId(self.instance)
    }
}

/// Singleton: current consensus parameters and the active validator set.
/// Created once at genesis (instance 0), only ever modified.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct GlobalPropertyObject {
    pub instance: u64,
    pub parameters: ChainParameters,
    /// Validators eligible for the current schedule epoch, ascending by id.
    pub active_validators: Vec<ValidatorId>,
    pub next_available_vote_id: u32,
}

impl ObjectClass for GlobalPropertyObject {
    const SPACE: u8 = IMPLEMENTATION_SPACE;
    const TYPE_ID: u8 = GLOBAL_PROPERTY_TYPE;

    fn instance(&self) -> u64 {
        self.instance
    }

    fn set_instance(&mut self, instance: u64) {
        self.instance = instance;
    }
}

/// Singleton: per-block mutable chain state. Created once at genesis
/// (instance 0), modified on every applied block.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct DynamicGlobalPropertyObject {
    pub instance: u64,
    pub head_block_number: u32,
    pub head_block_time: BlockTimestamp,
    pub current_producer: ValidatorId,
    /// Absolute slot number of the head block since genesis.
    pub current_aslot: u64,
    /// Rolling bitmap of the last 128 slots; bit set = block produced.
    /// LSB is the most recent slot.
    #[serde(with = "hex_u128")]
    pub recent_slots_filled: u128,
    /// Core fees swept from account statistics at maintenance.
    pub accumulated_fees: Share,
    pub next_maintenance_time: BlockTimestamp,
    /// Set while the upcoming slots are maintenance skip-slots.
    pub maintenance_flag: bool,
}

impl ObjectClass for DynamicGlobalPropertyObject {
    const SPACE: u8 = IMPLEMENTATION_SPACE;
    const TYPE_ID: u8 = DYNAMIC_GLOBAL_PROPERTY_TYPE;

    fn instance(&self) -> u64 {
        self.instance
    }

    fn set_instance(&mut self, instance: u64) {
        self.instance = instance;
    }
}

/// Singleton: the deterministically shuffled producer order for the current
/// epoch. Created once at genesis (instance 0).
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct ProducerScheduleObject {
    pub instance: u64,
    pub current_shuffled_producers: Vec<ValidatorId>,
}

impl ObjectClass for ProducerScheduleObject {
    const SPACE: u8 = IMPLEMENTATION_SPACE;
    const TYPE_ID: u8 = PRODUCER_SCHEDULE_TYPE;

    fn instance(&self) -> u64 {
        self.instance
    }

    fn set_instance(&mut self, instance: u64) {
        self.instance = instance;
    }
}

/// Hex-string serde for `u128`: `serde_json` cannot represent the full
/// 128-bit range as a number, and the participation bitmap regularly sits at
/// values beyond `u64`.
mod hex_u128 {
    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(value: &u128, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&format!("{value:032x}"))
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<u128, D::Error> {
        let s = String::deserialize(deserializer)?;
        u128::from_str_radix(&s, 16).map_err(serde::de::Error::custom)
    }
}
