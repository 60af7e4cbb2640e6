// Value transfers between addresses, plus the request shape peers and wallets
// use to submit them. A transaction never changes after construction: the
// ledger only ever appends whole transactions to the pool and to blocks.

use crate::core::monetary::{
    is_native, to_ledger_value, MINING_PRODUCT, MINING_SENDER, NATIVE_CURRENCY, SYSTEM_ADDRESS,
};
use crate::core::signature::TransactionPayload;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Transaction {
    sender: String,
    recipient: String,
    product: String,
    currency: String,
    value: f32,
}

impl Transaction {
    pub fn new(
        sender: impl Into<String>,
        recipient: impl Into<String>,
        product: impl Into<String>,
        currency: impl Into<String>,
        value: f32,
    ) -> Transaction {
        Transaction {
            sender: sender.into(),
            recipient: recipient.into(),
            product: product.into(),
            currency: currency.into(),
            value,
        }
    }

    /// The synthetic transaction that pays `miner` for the block it is mining.
    pub fn mining_reward(miner: &str, reward: f32) -> Transaction {
        Transaction::new(MINING_SENDER, miner, MINING_PRODUCT, NATIVE_CURRENCY, reward)
    }

    /// Builds the user transaction a submission describes: the submitter pays
    /// the system address.
    pub fn from_request(request: &TransactionRequest) -> Transaction {
        Transaction::new(
            request.sender_blockchain_address.as_str(),
            SYSTEM_ADDRESS,
            request.product.as_str(),
            request.currency.as_str(),
            request.value,
        )
    }

    /// Applies the non-native conversion: a transaction declared in a foreign
    /// currency becomes a payment of one tenth of its value from the system
    /// address to the original sender. Native transactions are returned as-is.
    pub fn into_ledger_form(self) -> Transaction {
        if is_native(&self.currency) {
            return self;
        }
        let value = to_ledger_value(&self.currency, self.value);
        Transaction {
            sender: SYSTEM_ADDRESS.to_string(),
            recipient: self.sender,
            product: self.product,
            currency: self.currency,
            value,
        }
    }

    pub fn get_sender(&self) -> &str {
        self.sender.as_str()
    }

    pub fn get_recipient(&self) -> &str {
        self.recipient.as_str()
    }

    pub fn get_product(&self) -> &str {
        self.product.as_str()
    }

    pub fn get_currency(&self) -> &str {
        self.currency.as_str()
    }

    pub fn get_value(&self) -> f32 {
        self.value
    }

    pub fn is_mining_reward(&self) -> bool {
        self.sender == MINING_SENDER
    }

    /// The economic fields a signature covers, carrying `value` as given.
    pub fn payload_with_value(&self, value: f32) -> TransactionPayload {
        TransactionPayload::new(self.product.as_str(), self.currency.as_str(), value)
    }
}

/// A signed submission as it travels over HTTP between wallets and nodes.
///
/// `value` is the value the submitter signed, before any currency conversion.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TransactionRequest {
    pub sender_blockchain_address: String,
    pub sender_public_key: String,
    pub signature: String,
    pub product: String,
    pub currency: String,
    pub value: f32,
}

impl TransactionRequest {
    /// The fields the submitter signed, with the value exactly as submitted.
    pub fn payload(&self) -> TransactionPayload {
        TransactionPayload::new(self.product.as_str(), self.currency.as_str(), self.value)
    }
}
