//! The deterministic ledger state machine.
//!
//! - [`operations`]: the protocol operation set, transactions and blocks
//! - [`evaluator`] / [`evaluators`]: per-operation validation and apply logic
//!   behind a fixed dispatch table
//! - [`fees`]: size-aware fee schedule with the capped stabilization loop
//! - [`database`]: block application over the undo-session contract, global
//!   singletons, applied-block observers
//! - [`schedule`]: deterministic producer shuffle, slot arithmetic, missed
//!   block and participation accounting
//! - [`genesis`] / [`maintenance`]: initial state and the periodic pass
//!
//! Everything here is single-threaded and deterministic: the same genesis
//! plus the same block sequence always reproduces identical state.

pub mod database;
pub mod error;
pub mod evaluator;
pub mod evaluators;
pub mod fees;
pub mod genesis;
pub mod indexes;
pub mod maintenance;
pub mod objects;
pub mod operations;
pub mod schedule;

pub use database::Database;
pub use error::{ChainError, ChainResult};
pub use evaluator::{EvalContext, Evaluator, EvaluatorRegistry, EVALUATOR_TABLE_CAPACITY};
pub use fees::{FeeParameters, FeeSchedule, MAX_FEE_STABILIZATION_ITERATION};
pub use genesis::{GenesisAccount, GenesisState, GenesisValidator};
pub use indexes::AccountNameIndex;
pub use objects::{
    AccountObject, AccountStatisticsObject, ChainParameters, DynamicGlobalPropertyObject,
    GlobalPropertyObject, ProducerScheduleObject, ValidatorObject, CHAIN_100_PERCENT,
};
pub use operations::{
    Block, Operation, OperationResult, Transaction, OPERATION_COUNT,
};
pub use schedule::{shuffle_producers, PARTICIPATION_SLOTS, SHUFFLE_MULTIPLIER};

#[cfg(test)]
pub(crate) mod testutil {
    use meridian_types::{BlockTimestamp, Share};

    use crate::database::Database;
    use crate::genesis::{GenesisAccount, GenesisState, GenesisValidator};
    use crate::objects::ChainParameters;
    use crate::operations::{Block, Transaction};

    /// Route tracing output through the test harness capture.
    pub fn init_tracing() {
        let _ = tracing_subscriber::fmt()
            .with_test_writer()
            .with_max_level(tracing::Level::DEBUG)
            .try_init();
    }

    /// Three funded accounts, each owning one validator, genesis at t=1000.
    pub fn sample_genesis() -> GenesisState {
        genesis_with(3, 3)
    }

    /// `accounts` funded accounts; the first `validators` of them each own
    /// one validator.
    pub fn genesis_with(validators: usize, accounts: usize) -> GenesisState {
        assert!(validators <= accounts);
        let names = ["alice", "bob", "carol", "dora", "emil", "fay"];
        let initial_accounts = (0..accounts)
            .map(|i| GenesisAccount {
                name: names
                    .get(i)
                    .map(|n| n.to_string())
                    .unwrap_or_else(|| format!("user{i}")),
                initial_balance: Share(1_000_000),
            })
            .collect::<Vec<_>>();
        let initial_validators = initial_accounts
            .iter()
            .take(validators)
            .map(|a| GenesisValidator {
                owner_name: a.name.clone(),
                signing_key: "02".repeat(33),
            })
            .collect();
        GenesisState {
            initial_timestamp: BlockTimestamp::from_seconds(1000),
            initial_parameters: ChainParameters::default(),
            initial_accounts,
            initial_validators,
        }
    }

    /// A block for the immediately next slot, from its scheduled producer.
    pub fn next_block(db: &Database, transactions: Vec<Transaction>) -> Block {
        Block {
            timestamp: db.get_slot_time(1).unwrap(),
            producer: db.get_scheduled_producer(1).unwrap(),
            transactions,
        }
    }
}
