pub mod cache;
pub mod client;
pub mod coerce;
pub mod error;
pub mod params;
pub mod records;
pub mod session;

use std::{fmt, str::FromStr};

use serde::{Deserialize, Serialize};

pub use cache::{
    CacheBackend, CacheStore, CachedResponse, FileStore, MemoryStore, SqliteStore,
};
pub use client::{Client, ClientBuilder};
pub use error::{Error, Result};
pub use params::Params;
pub use records::{EthPrice, InternalTransaction, TokenTransaction, Transaction};

/// Networks served by etherscan.io.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Network {
    #[default]
    Mainnet,
    Ropsten,
    Kovan,
    Rinkeby,
}

impl Network {
    pub const ALL: [Network; 4] = [
        Network::Mainnet,
        Network::Ropsten,
        Network::Kovan,
        Network::Rinkeby,
    ];

    pub fn name(self) -> &'static str {
        match self {
            Network::Mainnet => "mainnet",
            Network::Ropsten => "ropsten",
            Network::Kovan => "kovan",
            Network::Rinkeby => "rinkeby",
        }
    }

    /// API endpoint of the network.
    pub fn api_url(self) -> String {
        match self {
            Network::Mainnet => "https://api.etherscan.io/api".to_string(),
            testnet => format!("https://api-{}.etherscan.io/api", testnet.name()),
        }
    }
}

impl fmt::Display for Network {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for Network {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        Network::ALL
            .into_iter()
            .find(|network| network.name().eq_ignore_ascii_case(s))
            .ok_or_else(|| {
                Error::Configuration(format!(
                    "unknown network '{s}', expected one of: mainnet, ropsten, kovan, rinkeby"
                ))
            })
    }
}

/// Which transaction list of an address to fetch.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum TransactionKind {
    #[default]
    Normal,
    Internal,
}

impl TransactionKind {
    pub(crate) fn action(self) -> &'static str {
        match self {
            TransactionKind::Normal => "txlist",
            TransactionKind::Internal => "txlistinternal",
        }
    }
}

impl FromStr for TransactionKind {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "normal" => Ok(TransactionKind::Normal),
            "internal" => Ok(TransactionKind::Internal),
            other => Err(Error::Validation(format!(
                "transaction type must be \"normal\" or \"internal\", got \"{other}\""
            ))),
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SortOrder {
    #[default]
    Asc,
    Desc,
}

impl fmt::Display for SortOrder {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            SortOrder::Asc => "asc",
            SortOrder::Desc => "desc",
        })
    }
}

impl FromStr for SortOrder {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "asc" => Ok(SortOrder::Asc),
            "desc" => Ok(SortOrder::Desc),
            other => Err(Error::Validation(format!(
                "sort must be \"asc\" or \"desc\", got \"{other}\""
            ))),
        }
    }
}

/// Block range and paging of list queries. Passed through to the API as is.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PageQuery {
    pub start_block: u64,
    pub end_block: u64,
    pub page: u32,
    /// Sent as `offset`, the number of records per page
    pub limit: u32,
    pub sort: SortOrder,
}

impl Default for PageQuery {
    fn default() -> Self {
        Self {
            start_block: 0,
            end_block: 999_999_999,
            page: 1,
            limit: 1000,
            sort: SortOrder::Asc,
        }
    }
}

impl PageQuery {
    pub(crate) fn apply(&self, params: Params) -> Params {
        params
            .with("startblock", self.start_block)
            .with("endblock", self.end_block)
            .with("page", self.page)
            .with("offset", self.limit)
            .with("sort", self.sort)
    }
}
