use alloy::primitives::U256;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use super::coerce::{to_bool, to_float, to_int, to_optional_int, to_optional_string};
use super::error::{Error, Result};

/// Looks up a required string field of a raw API object.
pub(crate) fn field<'a>(raw: &'a Value, key: &str) -> Result<&'a str> {
    raw.get(key)
        .and_then(Value::as_str)
        .ok_or_else(|| Error::MissingField(key.to_string()))
}

/// A normal transaction as returned by `account/txlist`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Transaction {
    pub timestamp: Option<u64>,
    pub block_number: Option<u64>,
    pub from: Option<String>,
    pub to: Option<String>,
    pub input: Option<String>,
    pub hash: Option<String>,
    pub value: Option<U256>,
    pub gas: Option<u64>,
    pub gas_price: Option<u128>,
    pub gas_used: Option<u64>,
    pub nonce: Option<u64>,
    pub confirmations: Option<u64>,
    pub is_error: bool,
    pub tx_receipt_status: bool,
    pub transaction_index: Option<u64>,
    pub cumulative_gas_used: Option<u64>,
    pub block_hash: Option<String>,
}

impl Transaction {
    pub fn from_raw(raw: &Value) -> Result<Self> {
        Ok(Self {
            timestamp: to_optional_int(field(raw, "timeStamp")?)?,
            block_number: to_optional_int(field(raw, "blockNumber")?)?,
            from: to_optional_string(field(raw, "from")?),
            to: to_optional_string(field(raw, "to")?),
            input: to_optional_string(field(raw, "input")?),
            hash: to_optional_string(field(raw, "hash")?),
            value: to_optional_int(field(raw, "value")?)?,
            gas: to_optional_int(field(raw, "gas")?)?,
            gas_price: to_optional_int(field(raw, "gasPrice")?)?,
            gas_used: to_optional_int(field(raw, "gasUsed")?)?,
            nonce: to_optional_int(field(raw, "nonce")?)?,
            confirmations: to_optional_int(field(raw, "confirmations")?)?,
            is_error: to_bool(field(raw, "isError")?),
            tx_receipt_status: to_bool(field(raw, "txreceipt_status")?),
            transaction_index: to_optional_int(field(raw, "transactionIndex")?)?,
            cumulative_gas_used: to_optional_int(field(raw, "cumulativeGasUsed")?)?,
            block_hash: to_optional_string(field(raw, "blockHash")?),
        })
    }
}

/// An ERC-20 transfer as returned by `account/tokentx`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TokenTransaction {
    pub timestamp: Option<u64>,
    pub block_number: Option<u64>,
    pub from: Option<String>,
    pub to: Option<String>,
    pub input: Option<String>,
    pub hash: Option<String>,
    pub value: Option<U256>,
    pub gas: Option<u64>,
    pub gas_price: Option<u128>,
    pub gas_used: Option<u64>,
    pub nonce: Option<u64>,
    pub confirmations: Option<u64>,
    pub contract_address: Option<String>,
    pub token_decimal: Option<u64>,
    pub token_name: Option<String>,
    pub token_symbol: Option<String>,
    pub transaction_index: Option<u64>,
    pub cumulative_gas_used: Option<u64>,
    pub block_hash: Option<String>,
}

impl TokenTransaction {
    pub fn from_raw(raw: &Value) -> Result<Self> {
        Ok(Self {
            timestamp: to_optional_int(field(raw, "timeStamp")?)?,
            block_number: to_optional_int(field(raw, "blockNumber")?)?,
            from: to_optional_string(field(raw, "from")?),
            to: to_optional_string(field(raw, "to")?),
            input: to_optional_string(field(raw, "input")?),
            hash: to_optional_string(field(raw, "hash")?),
            value: to_optional_int(field(raw, "value")?)?,
            gas: to_optional_int(field(raw, "gas")?)?,
            gas_price: to_optional_int(field(raw, "gasPrice")?)?,
            gas_used: to_optional_int(field(raw, "gasUsed")?)?,
            nonce: to_optional_int(field(raw, "nonce")?)?,
            confirmations: to_optional_int(field(raw, "confirmations")?)?,
            contract_address: to_optional_string(field(raw, "contractAddress")?),
            token_decimal: to_optional_int(field(raw, "tokenDecimal")?)?,
            token_name: to_optional_string(field(raw, "tokenName")?),
            token_symbol: to_optional_string(field(raw, "tokenSymbol")?),
            transaction_index: to_optional_int(field(raw, "transactionIndex")?)?,
            cumulative_gas_used: to_optional_int(field(raw, "cumulativeGasUsed")?)?,
            block_hash: to_optional_string(field(raw, "blockHash")?),
        })
    }
}

/// A message call between contracts as returned by `account/txlistinternal`.
///
/// Internal calls carry no nonce, gas price or receipt data, so they have a
/// shape of their own.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct InternalTransaction {
    pub timestamp: Option<u64>,
    pub block_number: Option<u64>,
    pub hash: Option<String>,
    pub from: Option<String>,
    pub to: Option<String>,
    pub value: Option<U256>,
    pub contract_address: Option<String>,
    pub input: Option<String>,
    pub kind: Option<String>,
    pub gas: Option<u64>,
    pub gas_used: Option<u64>,
    pub trace_id: Option<String>,
    pub is_error: bool,
    pub err_code: Option<String>,
}

impl InternalTransaction {
    pub fn from_raw(raw: &Value) -> Result<Self> {
        Ok(Self {
            timestamp: to_optional_int(field(raw, "timeStamp")?)?,
            block_number: to_optional_int(field(raw, "blockNumber")?)?,
            hash: to_optional_string(field(raw, "hash")?),
            from: to_optional_string(field(raw, "from")?),
            to: to_optional_string(field(raw, "to")?),
            value: to_optional_int(field(raw, "value")?)?,
            contract_address: to_optional_string(field(raw, "contractAddress")?),
            input: to_optional_string(field(raw, "input")?),
            kind: to_optional_string(field(raw, "type")?),
            gas: to_optional_int(field(raw, "gas")?)?,
            gas_used: to_optional_int(field(raw, "gasUsed")?)?,
            trace_id: to_optional_string(field(raw, "traceId")?),
            is_error: to_bool(field(raw, "isError")?),
            err_code: to_optional_string(field(raw, "errCode")?),
        })
    }
}

/// Last ETH price as returned by `stats/ethprice`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EthPrice {
    pub ethbtc: f64,
    pub ethbtc_timestamp: u64,
    pub ethusd: f64,
    pub ethusd_timestamp: u64,
}

impl EthPrice {
    pub fn from_raw(raw: &Value) -> Result<Self> {
        Ok(Self {
            ethbtc: to_float(field(raw, "ethbtc")?)?,
            ethbtc_timestamp: to_int(field(raw, "ethbtc_timestamp")?)?,
            ethusd: to_float(field(raw, "ethusd")?)?,
            ethusd_timestamp: to_int(field(raw, "ethusd_timestamp")?)?,
        })
    }
}

/// Maps every element of an array result with `map`.
pub(crate) fn map_list<T>(result: &Value, map: impl Fn(&Value) -> Result<T>) -> Result<Vec<T>> {
    result
        .as_array()
        .ok_or_else(|| Error::MissingField("result".to_string()))?
        .iter()
        .map(map)
        .collect()
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;

    fn raw_transaction() -> Value {
        json!({
            "blockNumber": "14923678",
            "timeStamp": "1654646411",
            "hash": "0xc52783ad354aecc04c670047754f062e3d6d04e8f5b24774472651f9c3882c60",
            "nonce": "1",
            "blockHash": "0x7e1638fd2c6bdd05ffd83c1cf06c63e2f67d0f802084bef076d06bdcf86d1bb0",
            "transactionIndex": "61",
            "from": "0x9aa99c23f67c81701c772b106b4f83f6e858dd2e",
            "to": "",
            "value": "1000000000000000000000",
            "gas": "6000000",
            "gasPrice": "83924748773",
            "isError": "0",
            "txreceipt_status": "1",
            "input": "0x60806040",
            "contractAddress": "0xc5102fe9359fd9a28f877a67e36b0f050d81a3cc",
            "cumulativeGasUsed": "4457904",
            "gasUsed": "4457904",
            "confirmations": "122485"
        })
    }

    #[test]
    fn test_transaction_from_raw() {
        let tx = Transaction::from_raw(&raw_transaction()).unwrap();

        assert_eq!(tx.block_number, Some(14923678));
        assert_eq!(tx.timestamp, Some(1654646411));
        assert_eq!(tx.nonce, Some(1));
        assert_eq!(tx.to, None);
        assert_eq!(tx.value, Some(U256::from(10u128.pow(21))));
        assert_eq!(tx.gas_price, Some(83924748773));
        assert!(!tx.is_error);
        assert!(tx.tx_receipt_status);
        assert_eq!(tx.input.as_deref(), Some("0x60806040"));
    }

    #[test]
    fn test_transaction_from_empty_fields() {
        let mut raw = raw_transaction();
        for value in raw.as_object_mut().unwrap().values_mut() {
            *value = json!("");
        }

        let tx = Transaction::from_raw(&raw).unwrap();
        assert_eq!(
            tx,
            Transaction {
                timestamp: None,
                block_number: None,
                from: None,
                to: None,
                input: None,
                hash: None,
                value: None,
                gas: None,
                gas_price: None,
                gas_used: None,
                nonce: None,
                confirmations: None,
                is_error: false,
                tx_receipt_status: false,
                transaction_index: None,
                cumulative_gas_used: None,
                block_hash: None,
            }
        );
    }

    #[test]
    fn test_transaction_missing_field() {
        let mut raw = raw_transaction();
        raw.as_object_mut().unwrap().remove("gasUsed");

        match Transaction::from_raw(&raw) {
            Err(Error::MissingField(name)) => assert_eq!(name, "gasUsed"),
            other => panic!("expected missing field error, got {other:?}"),
        }
    }

    #[test]
    fn test_token_transaction_from_raw() {
        let mut raw = raw_transaction();
        let object = raw.as_object_mut().unwrap();
        object.insert("tokenName".into(), json!("Tether USD"));
        object.insert("tokenSymbol".into(), json!("USDT"));
        object.insert("tokenDecimal".into(), json!("6"));

        let tx = TokenTransaction::from_raw(&raw).unwrap();
        assert_eq!(tx.token_symbol.as_deref(), Some("USDT"));
        assert_eq!(tx.token_decimal, Some(6));
        assert_eq!(
            tx.contract_address.as_deref(),
            Some("0xc5102fe9359fd9a28f877a67e36b0f050d81a3cc")
        );
    }

    #[test]
    fn test_token_transaction_requires_token_fields() {
        assert!(matches!(
            TokenTransaction::from_raw(&raw_transaction()),
            Err(Error::MissingField(_))
        ));
    }

    #[test]
    fn test_internal_transaction_from_raw() {
        let raw = json!({
            "blockNumber": "2535479",
            "timeStamp": "1477837690",
            "hash": "0x8a1a9989bda84f80143181a68bc137ecefa64d0d4ebde45dd94fc0cf49e70cb6",
            "from": "0x20d42f2e99a421147acf198d775395cac2e8b03d",
            "to": "",
            "value": "0",
            "contractAddress": "0x2c1ba59d6f58433fb1eaee7d20b26ed83bda51a3",
            "input": "",
            "type": "create",
            "gas": "254791",
            "gasUsed": "46750",
            "traceId": "0",
            "isError": "0",
            "errCode": ""
        });

        let tx = InternalTransaction::from_raw(&raw).unwrap();
        assert_eq!(tx.kind.as_deref(), Some("create"));
        assert_eq!(tx.value, Some(U256::ZERO));
        assert_eq!(tx.err_code, None);
        assert!(!tx.is_error);
    }

    #[test]
    fn test_eth_price_from_raw() {
        let raw = json!({
            "ethbtc": "0.06116",
            "ethbtc_timestamp": "1624961308",
            "ethusd": "2149.18",
            "ethusd_timestamp": "1624961309"
        });

        let price = EthPrice::from_raw(&raw).unwrap();
        assert_eq!(price.ethbtc_timestamp, 1624961308);
        assert_eq!(price.ethusd_timestamp, 1624961309);
        assert_eq!(price.ethusd, 2149.18);
    }

    #[test]
    fn test_map_list_requires_array() {
        assert!(map_list(&json!("Max rate limit reached"), Transaction::from_raw).is_err());
        assert!(map_list(&json!([]), Transaction::from_raw).unwrap().is_empty());
    }
}
