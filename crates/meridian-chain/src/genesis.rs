use meridian_store::ObjectDatabase;
use meridian_types::{AccountId, BlockTimestamp, Share, ValidatorId};
use serde::{Deserialize, Serialize};

use crate::error::{ChainError, ChainResult};
use crate::evaluators::{is_valid_account_name, is_valid_signing_key};
use crate::objects::{
    AccountObject, AccountStatisticsObject, ChainParameters, DynamicGlobalPropertyObject,
    GlobalPropertyObject, ProducerScheduleObject, ValidatorObject,
};
use crate::schedule::shuffle_producers;

/// An account present from block zero.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct GenesisAccount {
    pub name: String,
    pub initial_balance: Share,
}

/// A validator present from block zero, owned by one of the genesis
/// accounts.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct GenesisValidator {
    pub owner_name: String,
    /// Hex-encoded block signing public key.
    pub signing_key: String,
}

/// Everything needed to bring a chain to its initial state.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct GenesisState {
    pub initial_timestamp: BlockTimestamp,
    pub initial_parameters: ChainParameters,
    pub initial_accounts: Vec<GenesisAccount>,
    pub initial_validators: Vec<GenesisValidator>,
}

fn validate(genesis: &GenesisState) -> ChainResult<()> {
    let interval = u32::from(genesis.initial_parameters.block_interval);
    if interval == 0 {
        return Err(ChainError::Genesis("block interval must be positive".into()));
    }
    if genesis.initial_timestamp.seconds() == 0 {
        return Err(ChainError::Genesis("initial timestamp must be set".into()));
    }
    if genesis.initial_timestamp.seconds() % interval != 0 {
        return Err(ChainError::Genesis(format!(
            "initial timestamp {} not aligned to the {interval}s block interval",
            genesis.initial_timestamp
        )));
    }
    if genesis.initial_validators.is_empty() {
        return Err(ChainError::Genesis("at least one validator required".into()));
    }
    let mut seen = std::collections::BTreeSet::new();
    for account in &genesis.initial_accounts {
        if !is_valid_account_name(&account.name) {
            return Err(ChainError::Genesis(format!(
                "invalid account name {:?}",
                account.name
            )));
        }
        if account.initial_balance.is_negative() {
            return Err(ChainError::Genesis(format!(
                "negative balance for account {:?}",
                account.name
            )));
        }
        if !seen.insert(account.name.as_str()) {
            return Err(ChainError::Genesis(format!(
                "duplicate account name {:?}",
                account.name
            )));
        }
    }
    for validator in &genesis.initial_validators {
        if !genesis
            .initial_accounts
            .iter()
            .any(|a| a.name == validator.owner_name)
        {
            return Err(ChainError::Genesis(format!(
                "validator owner {:?} is not a genesis account",
                validator.owner_name
            )));
        }
        if !is_valid_signing_key(&validator.signing_key) {
            return Err(ChainError::Genesis(format!(
                "validator {:?} has an invalid signing key",
                validator.owner_name
            )));
        }
    }
    Ok(())
}

/// Populate the three singletons and the initial accounts and validators.
/// Runs exactly once per database, with undo capture disabled; rollback past
/// genesis is meaningless.
pub(crate) fn initialize(store: &mut ObjectDatabase, genesis: &GenesisState) -> ChainResult<()> {
    validate(genesis)?;

    store.set_undo_enabled(false);

    for account in &genesis.initial_accounts {
        let account_instance = store.index::<AccountObject>()?.next_instance();
        let stats = store.create::<AccountStatisticsObject>(|s| {
            s.owner = AccountId(account_instance);
            s.core_balance = account.initial_balance;
        })?;
        store.create::<AccountObject>(|a| {
            a.name = account.name.clone();
            a.statistics = stats.id();
        })?;
    }

    let mut next_vote_id = 0u32;
    for validator in &genesis.initial_validators {
        let owner = genesis
            .initial_accounts
            .iter()
            .position(|a| a.name == validator.owner_name)
            .map(|i| AccountId(i as u64))
            .ok_or_else(|| ChainError::Genesis("validator owner vanished".into()))?;
        let vote_id = next_vote_id;
        next_vote_id += 1;
        store.create::<ValidatorObject>(|v| {
            v.validator_account = owner;
            v.signing_key = validator.signing_key.clone();
            v.vote_id = vote_id;
        })?;
    }

    let active: Vec<ValidatorId> = store
        .index::<ValidatorObject>()?
        .iter()
        .map(|v| v.id())
        .collect();

    store.create::<GlobalPropertyObject>(|gp| {
        gp.parameters = genesis.initial_parameters.clone();
        gp.active_validators = active.clone();
        gp.next_available_vote_id = next_vote_id;
    })?;

    let maintenance_interval = genesis.initial_parameters.maintenance_interval;
    store.create::<DynamicGlobalPropertyObject>(|dgp| {
        dgp.head_block_number = 0;
        dgp.head_block_time = genesis.initial_timestamp;
        dgp.current_aslot = 0;
        // a fresh chain starts with a perfect participation record
        dgp.recent_slots_filled = u128::MAX;
        dgp.next_maintenance_time = genesis
            .initial_timestamp
            .saturating_add_seconds(maintenance_interval);
    })?;

    let mut shuffled = active;
    shuffle_producers(&mut shuffled, genesis.initial_timestamp);
    store.create::<ProducerScheduleObject>(|s| {
        s.current_shuffled_producers = shuffled.clone();
    })?;

    store.set_undo_enabled(true);
    tracing::debug!(
        accounts = genesis.initial_accounts.len(),
        validators = genesis.initial_validators.len(),
        "genesis state initialized"
    );
    Ok(())
}
