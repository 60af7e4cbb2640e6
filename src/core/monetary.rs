/// Ledger monetary rules
///
/// The ledger has one native currency (`FC`). Every other currency code is an
/// external reward rail: a transaction declared in such a currency is minted
/// into the ledger at one tenth of its declared value, paid by the system
/// address to the submitter.
///
/// ## Reserved Addresses
/// - **MINING_SENDER**: sender of the synthetic reward that pays each miner
/// - **SYSTEM_ADDRESS**: counterparty of every user submission and payer of
///   converted non-native value
///
/// Code of the ledger's own unit of value
pub const NATIVE_CURRENCY: &str = "FC";

/// Non-native value is converted at this many external units per native unit
pub const CONVERSION_RATIO: f32 = 10.0;

/// Sender of the mining-reward transaction; admitted without a signature
pub const MINING_SENDER: &str = "THE BLOCKCHAIN";

/// Recipient of user submissions and sender of converted non-native value
pub const SYSTEM_ADDRESS: &str = "THE FIDELITY BLOCKCHAIN ADDRESS";

/// Product label carried by mining-reward transactions
pub const MINING_PRODUCT: &str = "MINING_PRODUCT";

/// Native units paid to the miner of each block
pub const MINING_REWARD: f32 = 1.0;

pub fn is_native(currency: &str) -> bool {
    currency == NATIVE_CURRENCY
}

/// Value credited to the ledger for `declared` units of `currency`.
pub fn to_ledger_value(currency: &str, declared: f32) -> f32 {
    if is_native(currency) {
        declared
    } else {
        declared / CONVERSION_RATIO
    }
}

/// Inverse of [`to_ledger_value`]: the value the submitter originally signed.
pub fn to_signed_value(currency: &str, ledger_value: f32) -> f32 {
    if is_native(currency) {
        ledger_value
    } else {
        ledger_value * CONVERSION_RATIO
    }
}

/// Addresses exempt from the one-pending-transaction-per-sender rule.
pub fn is_privileged_sender(address: &str) -> bool {
    address == MINING_SENDER || address == SYSTEM_ADDRESS
}
