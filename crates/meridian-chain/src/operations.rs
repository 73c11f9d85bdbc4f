use meridian_types::{AccountId, AssetAmount, BlockTimestamp, ObjectId, ValidatorId};
use serde::{Deserialize, Serialize};

/// Move core asset between two accounts.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct TransferOperation {
    pub fee: AssetAmount,
    pub from: AccountId,
    pub to: AccountId,
    pub amount: AssetAmount,
}

/// Register a new named account, paid for by an existing registrar.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct AccountCreateOperation {
    pub fee: AssetAmount,
    pub registrar: AccountId,
    pub name: String,
}

/// Promote an account to block-producer candidate.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct ValidatorCreateOperation {
    pub fee: AssetAmount,
    pub validator_account: AccountId,
    pub url: String,
    /// Hex-encoded block signing public key.
    pub signing_key: String,
}

/// Change a validator's url or signing key. Only the owning account may.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct ValidatorUpdateOperation {
    pub fee: AssetAmount,
    pub validator: ValidatorId,
    pub validator_account: AccountId,
    pub new_url: Option<String>,
    pub new_signing_key: Option<String>,
}

/// Virtual operation recording a producer's reward. Emitted by the chain as
/// a side effect; never accepted from users.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct ProducerRewardOperation {
    pub producer: ValidatorId,
    pub producer_account: AccountId,
    pub amount: AssetAmount,
}

/// The protocol operation set.
///
/// Declaration order fixes each variant's wire tag; the enumeration is
/// append-only and existing variants are never reordered or removed.
/// Virtual variants occupy a tag slot like any other.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub enum Operation {
    Transfer(TransferOperation),
    AccountCreate(AccountCreateOperation),
    ValidatorCreate(ValidatorCreateOperation),
    ValidatorUpdate(ValidatorUpdateOperation),
    ProducerReward(ProducerRewardOperation),
}

/// Number of operation tags currently defined.
pub const OPERATION_COUNT: usize = 5;

impl Operation {
    /// The dense wire tag fixed by declaration order.
    pub fn tag(&self) -> u8 {
        match self {
            Operation::Transfer(_) => 0,
            Operation::AccountCreate(_) => 1,
            Operation::ValidatorCreate(_) => 2,
            Operation::ValidatorUpdate(_) => 3,
            Operation::ProducerReward(_) => 4,
        }
    }

    /// True for result-only operations produced by the chain itself.
    pub fn is_virtual(&self) -> bool {
        matches!(self, Operation::ProducerReward(_))
    }

    /// The account charged this operation's fee.
    pub fn fee_payer(&self) -> AccountId {
        match self {
            Operation::Transfer(op) => op.from,
            Operation::AccountCreate(op) => op.registrar,
            Operation::ValidatorCreate(op) => op.validator_account,
            Operation::ValidatorUpdate(op) => op.validator_account,
            Operation::ProducerReward(op) => op.producer_account,
        }
    }

    pub fn fee(&self) -> AssetAmount {
        match self {
            Operation::Transfer(op) => op.fee,
            Operation::AccountCreate(op) => op.fee,
            Operation::ValidatorCreate(op) => op.fee,
            Operation::ValidatorUpdate(op) => op.fee,
            Operation::ProducerReward(_) => AssetAmount::core(0),
        }
    }

    /// Write `fee` into the operation's fee field. No effect on virtual
    /// operations, which carry no fee.
    pub fn set_fee(&mut self, fee: AssetAmount) {
        match self {
            Operation::Transfer(op) => op.fee = fee,
            Operation::AccountCreate(op) => op.fee = fee,
            Operation::ValidatorCreate(op) => op.fee = fee,
            Operation::ValidatorUpdate(op) => op.fee = fee,
            Operation::ProducerReward(_) => {}
        }
    }
}

/// Result of applying one operation.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub enum OperationResult {
    Void,
    /// Id of an object the operation created.
    Object(ObjectId),
}

/// An atomic group of operations: either every operation applies or none do.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct Transaction {
    pub operations: Vec<Operation>,
}

impl Transaction {
    pub fn single(op: Operation) -> Self {
        Self {
            operations: vec![op],
        }
    }
}

/// A produced block as the state machine consumes it. Signature checking and
/// wire framing happen upstream.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct Block {
    pub timestamp: BlockTimestamp,
    pub producer: ValidatorId,
    pub transactions: Vec<Transaction>,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn one_of_each() -> Vec<Operation> {
        vec![
            Operation::Transfer(TransferOperation::default()),
            Operation::AccountCreate(AccountCreateOperation::default()),
            Operation::ValidatorCreate(ValidatorCreateOperation::default()),
            Operation::ValidatorUpdate(ValidatorUpdateOperation::default()),
            Operation::ProducerReward(ProducerRewardOperation::default()),
        ]
    }

    #[test]
    fn tags_are_dense_and_ordered() {
        let ops = one_of_each();
        assert_eq!(ops.len(), OPERATION_COUNT);
        for (expected, op) in ops.iter().enumerate() {
            assert_eq!(op.tag() as usize, expected);
        }
    }

    #[test]
    fn only_producer_reward_is_virtual() {
        for op in one_of_each() {
            assert_eq!(op.is_virtual(), op.tag() == 4);
        }
    }

    #[test]
    fn set_fee_roundtrips_through_fee() {
        let mut op = Operation::Transfer(TransferOperation {
            from: AccountId(1),
            to: AccountId(2),
            amount: AssetAmount::core(10),
            ..Default::default()
        });
        op.set_fee(AssetAmount::core(7));
        assert_eq!(op.fee(), AssetAmount::core(7));
        assert_eq!(op.fee_payer(), AccountId(1));
    }
}
