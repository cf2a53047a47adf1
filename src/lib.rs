//! Asynchronous client for the etherscan.io API.
//!
//! ```no_run
//! # async fn run() -> etherscan_client::etherscan::Result<()> {
//! use etherscan_client::etherscan::{CacheBackend, Client, PageQuery, TransactionKind};
//!
//! let client = Client::builder("YOUR_API_KEY")
//!     .cache_backend(CacheBackend::Memory)
//!     .build()?;
//!
//! let balance = client
//!     .get_eth_balance("0xde0b295669a9fd93d5f28d9ec85e40f4cb697bae")
//!     .await?;
//! let transactions = client
//!     .get_transactions_by_address(
//!         "0xde0b295669a9fd93d5f28d9ec85e40f4cb697bae",
//!         TransactionKind::Normal,
//!         &PageQuery::default(),
//!     )
//!     .await?;
//! # Ok(())
//! # }
//! ```

pub mod config;
pub mod etherscan;
