//! Account shapes returned by the wallet.

use serde::{Deserialize, Serialize};

use crate::protocol::Address;

// ============================================================================
// Account
// ============================================================================

/// An account the user allowed during `connect`.
///
/// The wallet UI sends either a bare address string or an object with an
/// `address` field; both deserialize to the same value.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(from = "AccountRepr")]
pub struct Account {
    /// Account address.
    pub address: Address,
}

#[derive(Deserialize)]
#[serde(untagged)]
enum AccountRepr {
    Bare(Address),
    Object { address: Address },
}

impl From<AccountRepr> for Account {
    fn from(repr: AccountRepr) -> Self {
        match repr {
            AccountRepr::Bare(address) | AccountRepr::Object { address } => Self { address },
        }
    }
}

// ============================================================================
// StoredAccount
// ============================================================================

/// An account stored in the wallet, as listed by the frame.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StoredAccount {
    /// Account address.
    pub address: Address,
    /// Wallet-internal account ID.
    pub id: String,
    /// Display name.
    #[serde(default)]
    pub name: String,
    /// Account type (e.g. `"default"`, `"ledger"`).
    #[serde(default, rename = "type")]
    pub kind: String,
}

#[cfg(test)]
mod tests {
    use super::*;

    use serde_json::json;

    #[test]
    fn test_account_from_string_or_object() {
        let accounts: Vec<Account> =
            serde_json::from_value(json!(["ADDR1", { "address": "ADDR2", "name": "x" }]))
                .expect("accounts");

        assert_eq!(accounts[0].address, "ADDR1");
        assert_eq!(accounts[1].address, "ADDR2");
    }

    #[test]
    fn test_stored_account() {
        let account: StoredAccount = serde_json::from_value(json!({
            "address": "ADDR",
            "id": "acc-1",
            "name": "Main",
            "type": "default"
        }))
        .expect("account");

        assert_eq!(account.kind, "default");
        assert_eq!(account.name, "Main");
    }
}
