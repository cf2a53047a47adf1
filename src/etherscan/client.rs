use std::{collections::HashMap, sync::Arc, time::Duration};

use alloy::primitives::U256;
use serde_json::Value;
use tracing::debug;

use super::{
    cache::{CacheBackend, CacheStore, ResponseCache},
    coerce::{parse_hex_quantity, to_int},
    error::{Error, Result},
    params::Params,
    records::{field, map_list, EthPrice, InternalTransaction, TokenTransaction, Transaction},
    session::Session,
    Network, PageQuery, TransactionKind,
};

/// Default lifetime of cached responses.
pub const DEFAULT_EXPIRE_AFTER: Duration = Duration::from_secs(5);

/// Builder for [`Client`].
#[derive(Debug, Clone)]
pub struct ClientBuilder {
    api_key: String,
    network: Network,
    base_url: Option<String>,
    cache_backend: CacheBackend,
    cache_store: Option<Arc<dyn CacheStore>>,
    expire_after: Duration,
}

impl ClientBuilder {
    pub fn new(api_key: impl Into<String>) -> Self {
        Self {
            api_key: api_key.into(),
            network: Network::default(),
            base_url: None,
            cache_backend: CacheBackend::default(),
            cache_store: None,
            expire_after: DEFAULT_EXPIRE_AFTER,
        }
    }

    pub fn network(mut self, network: Network) -> Self {
        self.network = network;
        self
    }

    /// Sends requests to `url` instead of the network's etherscan.io endpoint.
    pub fn base_url(mut self, url: impl Into<String>) -> Self {
        self.base_url = Some(url.into());
        self
    }

    pub fn cache_backend(mut self, backend: CacheBackend) -> Self {
        self.cache_backend = backend;
        self
    }

    /// Uses a custom store for cached responses, overriding the backend.
    pub fn cache_store(mut self, store: Arc<dyn CacheStore>) -> Self {
        self.cache_store = Some(store);
        self
    }

    pub fn expire_after(mut self, expire_after: Duration) -> Self {
        self.expire_after = expire_after;
        self
    }

    pub fn build(self) -> Result<Client> {
        if self.api_key.trim().is_empty() {
            return Err(Error::Configuration("API key cannot be empty".to_string()));
        }

        let url = self.base_url.unwrap_or_else(|| self.network.api_url());
        if !url.starts_with("http://") && !url.starts_with("https://") {
            return Err(Error::Configuration(format!("invalid API URL '{url}'")));
        }

        let cache = self
            .cache_store
            .or_else(|| self.cache_backend.open())
            .map(|store| ResponseCache::new(store, self.expire_after));

        debug!(
            "Created Etherscan client for {} (cache: {:?})",
            url, self.cache_backend
        );

        Ok(Client {
            network: self.network,
            session: Session::new(url, self.api_key, cache)?,
        })
    }
}

/// Asynchronous client for the etherscan.io API.
///
/// Every operation builds its own parameters, so a client can be shared
/// between tasks and called concurrently.
#[derive(Debug, Clone)]
pub struct Client {
    network: Network,
    session: Session,
}

impl Client {
    /// Creates a mainnet client with the default SQLite cache.
    pub fn new(api_key: impl Into<String>) -> Result<Self> {
        ClientBuilder::new(api_key).build()
    }

    pub fn builder(api_key: impl Into<String>) -> ClientBuilder {
        ClientBuilder::new(api_key)
    }

    pub fn network(&self) -> Network {
        self.network
    }

    pub fn url(&self) -> &str {
        self.session.url()
    }

    /// Drops every cached response.
    pub async fn clear_cache(&self) -> Result<()> {
        match self.session.cache() {
            Some(cache) => cache
                .clear()
                .await
                .map_err(|e| Error::Cache(e.to_string())),
            None => Ok(()),
        }
    }

    /// Get the last ETH price in BTC and USD.
    pub async fn get_eth_price(&self) -> Result<EthPrice> {
        let result = self
            .session
            .request(&Params::new("stats", "ethprice"))
            .await?;

        EthPrice::from_raw(&result)
    }

    /// Get the total supply of ether in wei.
    pub async fn get_eth_supply(&self) -> Result<U256> {
        let result = self
            .session
            .request(&Params::new("stats", "ethsupply"))
            .await?;

        to_int(as_str(&result)?)
    }

    /// Get the wei balance of an address.
    pub async fn get_eth_balance(&self, address: &str) -> Result<U256> {
        let params = Params::new("account", "balance")
            .with("address", address)
            .with("tag", "latest");

        let result = self.session.request(&params).await?;
        to_int(as_str(&result)?)
    }

    /// Get the wei balances of several addresses, keyed by address.
    pub async fn get_eth_balances<S: AsRef<str>>(
        &self,
        addresses: &[S],
    ) -> Result<HashMap<String, U256>> {
        if addresses.is_empty() {
            return Err(Error::Validation(
                "at least one address is required".to_string(),
            ));
        }

        let joined = addresses
            .iter()
            .map(|address| address.as_ref())
            .collect::<Vec<_>>()
            .join(",");
        let params = Params::new("account", "balancemulti")
            .with("address", joined)
            .with("tag", "latest");

        let result = self.session.request(&params).await?;
        map_list(&result, |row| {
            Ok((
                field(row, "account")?.to_string(),
                to_int::<U256>(field(row, "balance")?)?,
            ))
        })
        .map(|rows| rows.into_iter().collect())
    }

    /// Get the normal or internal transactions of an address.
    ///
    /// Internal transactions lack `nonce`, `gasPrice` and the receipt fields,
    /// so any non-empty [`TransactionKind::Internal`] result fails with
    /// [`Error::MissingField`]. Use
    /// [`get_internal_transactions`](Self::get_internal_transactions) for
    /// those.
    pub async fn get_transactions_by_address(
        &self,
        address: &str,
        kind: TransactionKind,
        query: &PageQuery,
    ) -> Result<Vec<Transaction>> {
        let params = query.apply(Params::new("account", kind.action()).with("address", address));

        let result = self.list(&params).await?;
        map_list(&result, Transaction::from_raw)
    }

    /// Get the internal transactions of an address in their own record shape.
    pub async fn get_internal_transactions(
        &self,
        address: &str,
        query: &PageQuery,
    ) -> Result<Vec<InternalTransaction>> {
        let params = query.apply(
            Params::new("account", TransactionKind::Internal.action()).with("address", address),
        );

        let result = self.list(&params).await?;
        map_list(&result, InternalTransaction::from_raw)
    }

    /// Get ERC-20 transfers of a token contract, an address, or both.
    pub async fn get_token_transactions(
        &self,
        contract_address: Option<&str>,
        address: Option<&str>,
        query: &PageQuery,
    ) -> Result<Vec<TokenTransaction>> {
        if contract_address.is_none() && address.is_none() {
            return Err(Error::Validation(
                "`contract_address` and `address` cannot both be empty".to_string(),
            ));
        }

        let params = query.apply(
            Params::new("account", "tokentx")
                .with_opt("contractaddress", contract_address)
                .with_opt("address", address),
        );

        let result = self.list(&params).await?;
        map_list(&result, TokenTransaction::from_raw)
    }

    /// Get the current gas price in wei.
    pub async fn get_gas_price(&self) -> Result<u128> {
        let result = self
            .session
            .proxy_request(&Params::proxy("eth_gasPrice"))
            .await?;

        parse_hex_quantity(as_str(&result)?)
    }

    /// Get the number of the most recent block.
    pub async fn get_block_number(&self) -> Result<u64> {
        let result = self
            .session
            .proxy_request(&Params::proxy("eth_blockNumber"))
            .await?;

        parse_hex_quantity(as_str(&result)?)
    }

    /// Get a block with full transaction objects. Returns `null` for unknown
    /// blocks.
    pub async fn get_block_by_number(&self, block_number: u64) -> Result<Value> {
        let params = Params::proxy("eth_getBlockByNumber")
            .with("tag", format!("{block_number:#x}"))
            .with("boolean", true);

        self.session.proxy_request(&params).await
    }

    /// Sends a list request. "No transactions found" is an empty list, not an
    /// error.
    async fn list(&self, params: &Params) -> Result<Value> {
        match self.session.request(params).await {
            Err(e) if e.is_empty_result() => Ok(Value::Array(Vec::new())),
            other => other,
        }
    }
}

fn as_str(result: &Value) -> Result<&str> {
    result
        .as_str()
        .ok_or_else(|| Error::MissingField("result".to_string()))
}
