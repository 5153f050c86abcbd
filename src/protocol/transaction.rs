//! Transaction model and signed results.
//!
//! Transactions are a tagged sum type keyed by the wire `type` field. Every
//! variant shares a [`TxnHeader`]; raw byte fields are base64 on the wire.

// ============================================================================
// Imports
// ============================================================================

use serde::{Deserialize, Serialize};

use super::encoding::{base64_bytes, base64_opt, base64_vec};

/// Account address (base32 string).
pub type Address = String;

// ============================================================================
// TxnHeader
// ============================================================================

/// Fields shared by every transaction kind.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TxnHeader {
    /// Sender address.
    pub from: Address,

    /// Fee in microalgos.
    pub fee: u64,

    /// First valid round.
    pub first_round: u64,

    /// Last valid round.
    pub last_round: u64,

    /// Genesis ID of the network.
    #[serde(rename = "genesisID")]
    pub genesis_id: String,

    /// Genesis hash (already base64).
    pub genesis_hash: String,

    /// Free-form note.
    #[serde(default, skip_serializing_if = "Option::is_none", with = "base64_opt")]
    pub note: Option<Vec<u8>>,

    /// Group ID for atomic transfers.
    #[serde(default, skip_serializing_if = "Option::is_none", with = "base64_opt")]
    pub group: Option<Vec<u8>>,

    /// Lease preventing replay inside the validity window.
    #[serde(default, skip_serializing_if = "Option::is_none", with = "base64_opt")]
    pub lease: Option<Vec<u8>>,

    /// Address the sender rekeys to.
    #[serde(rename = "reKeyTo", default, skip_serializing_if = "Option::is_none")]
    pub rekey_to: Option<Address>,
}

// ============================================================================
// Transaction
// ============================================================================

/// A transaction to be signed by the wallet.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum Transaction {
    /// Algo payment.
    #[serde(rename = "pay")]
    Payment(PaymentTxn),

    /// Asset transfer, opt-in or revocation.
    #[serde(rename = "axfer")]
    AssetTransfer(AssetTransferTxn),

    /// Asset creation, reconfiguration or destruction.
    #[serde(rename = "acfg")]
    AssetConfig(AssetConfigTxn),

    /// Asset freeze.
    #[serde(rename = "afrz")]
    AssetFreeze(AssetFreezeTxn),

    /// Participation key registration.
    #[serde(rename = "keyreg")]
    KeyRegistration(KeyRegTxn),

    /// Application call.
    #[serde(rename = "appl")]
    ApplicationCall(ApplicationCallTxn),
}

impl Transaction {
    /// Returns the wire type tag.
    #[must_use]
    pub fn type_tag(&self) -> &'static str {
        match self {
            Self::Payment(_) => "pay",
            Self::AssetTransfer(_) => "axfer",
            Self::AssetConfig(_) => "acfg",
            Self::AssetFreeze(_) => "afrz",
            Self::KeyRegistration(_) => "keyreg",
            Self::ApplicationCall(_) => "appl",
        }
    }

    /// Returns the shared header.
    #[must_use]
    pub fn header(&self) -> &TxnHeader {
        match self {
            Self::Payment(txn) => &txn.header,
            Self::AssetTransfer(txn) => &txn.header,
            Self::AssetConfig(txn) => &txn.header,
            Self::AssetFreeze(txn) => &txn.header,
            Self::KeyRegistration(txn) => &txn.header,
            Self::ApplicationCall(txn) => &txn.header,
        }
    }

    /// Returns the sender address.
    #[inline]
    #[must_use]
    pub fn sender(&self) -> &str {
        &self.header().from
    }
}

// ============================================================================
// Transaction Kinds
// ============================================================================

/// Payment transaction (`pay`).
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PaymentTxn {
    /// Shared fields.
    #[serde(flatten)]
    pub header: TxnHeader,
    /// Receiver.
    pub to: Address,
    /// Amount in microalgos.
    pub amount: u64,
    /// Account receiving the remaining balance when closing.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub close_remainder_to: Option<Address>,
}

/// Asset transfer transaction (`axfer`).
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AssetTransferTxn {
    /// Shared fields.
    #[serde(flatten)]
    pub header: TxnHeader,
    /// Receiver.
    pub to: Address,
    /// Amount in base units.
    pub amount: u64,
    /// Asset ID.
    pub asset_index: u64,
    /// Account receiving the remaining holding when closing.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub close_remainder_to: Option<Address>,
    /// Account clawed back from.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub asset_revocation_target: Option<Address>,
}

/// Asset configuration transaction (`acfg`).
///
/// Without `asset_index` it creates an asset; with only `asset_index` it
/// destroys one.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AssetConfigTxn {
    #[serde(flatten)]
    pub header: TxnHeader,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub asset_index: Option<u64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub asset_total: Option<u64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub asset_decimals: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub asset_default_frozen: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub asset_name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub asset_unit_name: Option<String>,
    #[serde(rename = "assetURL", default, skip_serializing_if = "Option::is_none")]
    pub asset_url: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub asset_metadata_hash: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub asset_manager: Option<Address>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub asset_reserve: Option<Address>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub asset_freeze: Option<Address>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub asset_clawback: Option<Address>,
}

/// Asset freeze transaction (`afrz`).
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AssetFreezeTxn {
    #[serde(flatten)]
    pub header: TxnHeader,
    pub asset_index: u64,
    pub freeze_account: Address,
    pub freeze_state: bool,
}

/// Key registration transaction (`keyreg`).
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct KeyRegTxn {
    #[serde(flatten)]
    pub header: TxnHeader,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub vote_key: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub selection_key: Option<String>,
    pub vote_first: u64,
    pub vote_last: u64,
    pub vote_key_dilution: u64,
}

/// Application call transaction (`appl`).
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ApplicationCallTxn {
    #[serde(flatten)]
    pub header: TxnHeader,
    /// Application ID (zero creates one).
    pub app_index: u64,
    /// On-completion action code.
    #[serde(default)]
    pub app_on_complete: u32,
    #[serde(default, skip_serializing_if = "Vec::is_empty", with = "base64_vec")]
    pub app_args: Vec<Vec<u8>>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub app_accounts: Vec<Address>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub app_foreign_apps: Vec<u64>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub app_foreign_assets: Vec<u64>,
    #[serde(default, skip_serializing_if = "Option::is_none", with = "base64_opt")]
    pub app_approval_program: Option<Vec<u8>>,
    #[serde(default, skip_serializing_if = "Option::is_none", with = "base64_opt")]
    pub app_clear_program: Option<Vec<u8>>,
}

// ============================================================================
// SignedTx
// ============================================================================

/// A signed transaction returned by the wallet.
///
/// # Format
///
/// ```json
/// { "txID": "hash", "blob": "base64" }
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SignedTx {
    /// Transaction hash.
    #[serde(rename = "txID")]
    pub tx_id: String,

    /// Signed transaction bytes.
    #[serde(with = "base64_bytes")]
    pub blob: Vec<u8>,
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    use serde_json::json;

    fn header() -> TxnHeader {
        TxnHeader {
            from: "SENDER".into(),
            fee: 1000,
            first_round: 1000,
            last_round: 2000,
            genesis_id: "mainnet-v1.0".into(),
            genesis_hash: "wGHE2Pwdvd7S12BL5FaOP20EGYesN73ktiC1qzkkit8=".into(),
            note: Some(b"Thanks you!".to_vec()),
            ..Default::default()
        }
    }

    #[test]
    fn test_payment_wire_shape() {
        let txn = Transaction::Payment(PaymentTxn {
            header: header(),
            to: "RECEIVER".into(),
            amount: 0,
            close_remainder_to: None,
        });

        let value = serde_json::to_value(&txn).expect("serialize");
        assert_eq!(value["type"], "pay");
        assert_eq!(value["from"], "SENDER");
        assert_eq!(value["genesisID"], "mainnet-v1.0");
        assert_eq!(value["firstRound"], 1000);
        assert_eq!(value["note"], "VGhhbmtzIHlvdSE=");
        assert!(value.get("group").is_none());
        assert!(value.get("closeRemainderTo").is_none());
    }

    #[test]
    fn test_tagged_round_trip() {
        let txn = Transaction::AssetFreeze(AssetFreezeTxn {
            header: header(),
            asset_index: 31566704,
            freeze_account: "TARGET".into(),
            freeze_state: true,
        });

        let json = serde_json::to_string(&txn).expect("serialize");
        let parsed: Transaction = serde_json::from_str(&json).expect("parse");
        assert_eq!(parsed, txn);
        assert_eq!(parsed.type_tag(), "afrz");
        assert_eq!(parsed.sender(), "SENDER");
    }

    #[test]
    fn test_app_args_are_base64() {
        let txn = Transaction::ApplicationCall(ApplicationCallTxn {
            header: header(),
            app_index: 42,
            app_args: vec![vec![1, 2, 3], b"signed-1".to_vec()],
            ..Default::default()
        });

        let value = serde_json::to_value(&txn).expect("serialize");
        assert_eq!(value["appArgs"], json!(["AQID", "c2lnbmVkLTE="]));
        assert!(value.get("appApprovalProgram").is_none());
    }

    #[test]
    fn test_unknown_type_rejected() {
        let result = serde_json::from_value::<Transaction>(json!({ "type": "stpf" }));
        assert!(result.is_err());
    }

    #[test]
    fn test_signed_tx_decodes_blob() {
        let signed: SignedTx =
            serde_json::from_value(json!({ "txID": "TXHASH", "blob": "AQID" })).expect("parse");
        assert_eq!(signed.tx_id, "TXHASH");
        assert_eq!(signed.blob, vec![1, 2, 3]);
    }

    #[test]
    fn test_signed_tx_rejects_bad_blob() {
        let result = serde_json::from_value::<SignedTx>(json!({ "txID": "T", "blob": "!!" }));
        assert!(result.is_err());
    }
}
