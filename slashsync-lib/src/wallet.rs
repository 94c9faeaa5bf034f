//! Wallet subsystem contract.
//!
//! The wallet owns keys, balances and address derivation. This crate only
//! asks it for the current receive address of the selected wallet.

use std::fmt;
use std::str::FromStr;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::{Result, SlashError};

/// On-chain address type; doubles as the payment config entry type.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AddressType {
    /// Legacy pay-to-pubkey-hash.
    P2pkh,
    /// Pay-to-script-hash (nested segwit).
    P2sh,
    /// Native segwit v0.
    #[default]
    P2wpkh,
    /// Taproot.
    P2tr,
}

impl AddressType {
    /// The type string used in `/slashpay.json`.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::P2pkh => "p2pkh",
            Self::P2sh => "p2sh",
            Self::P2wpkh => "p2wpkh",
            Self::P2tr => "p2tr",
        }
    }
}

impl fmt::Display for AddressType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for AddressType {
    type Err = SlashError;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "p2pkh" => Ok(Self::P2pkh),
            "p2sh" => Ok(Self::P2sh),
            "p2wpkh" => Ok(Self::P2wpkh),
            "p2tr" => Ok(Self::P2tr),
            other => Err(SlashError::Wallet(format!("unknown address type '{other}'"))),
        }
    }
}

/// Bitcoin network the selected wallet runs on.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Network {
    /// Bitcoin mainnet.
    #[default]
    Bitcoin,
    /// Bitcoin testnet.
    Testnet,
    /// Local regtest.
    Regtest,
}

/// Source of fresh receive addresses.
#[async_trait]
pub trait WalletSource: Send + Sync {
    /// The next unused receive address of `wallet`.
    async fn receive_address(&self, wallet: &str) -> Result<String>;
}
