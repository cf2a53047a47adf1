use reqwest::{Client as HttpClient, Method};
use serde::Deserialize;
use serde_json::Value;
use tracing::{debug, warn};

use super::cache::ResponseCache;
use super::error::{Error, Result};
use super::params::Params;

pub const USER_AGENT: &str = concat!(
    "etherscan-client/",
    env!("CARGO_PKG_VERSION"),
    " - Rust client for the etherscan.io API"
);

/// The `{status, message, result}` wrapper of standard API responses.
#[derive(Debug, Deserialize)]
struct Envelope {
    status: String,
    #[serde(default)]
    message: String,
    #[serde(default)]
    result: Value,
}

/// Response of a `module=proxy` call.
///
/// Normally a JSON-RPC response, but the gateway answers with an envelope
/// when the key is invalid or the rate limit is hit.
#[derive(Debug, Deserialize)]
struct ProxyResponse {
    #[serde(default)]
    status: Option<String>,
    #[serde(default)]
    message: Option<String>,
    #[serde(default)]
    result: Value,
    #[serde(default)]
    error: Option<RpcError>,
}

#[derive(Debug, Deserialize)]
struct RpcError {
    code: i64,
    message: String,
}

/// HTTP session shared by all operations of a client.
#[derive(Debug, Clone)]
pub struct Session {
    http: HttpClient,
    url: String,
    api_key: String,
    cache: Option<ResponseCache>,
}

impl Session {
    pub fn new(url: String, api_key: String, cache: Option<ResponseCache>) -> Result<Self> {
        let http = HttpClient::builder().user_agent(USER_AGENT).build()?;

        Ok(Self {
            http,
            url,
            api_key,
            cache,
        })
    }

    pub fn url(&self) -> &str {
        &self.url
    }

    pub fn cache(&self) -> Option<&ResponseCache> {
        self.cache.as_ref()
    }

    /// Sends a standard call as a form POST and unwraps the result envelope.
    pub async fn request(&self, params: &Params) -> Result<Value> {
        self.call(Method::POST, params, Self::unwrap_envelope).await
    }

    /// Sends a `module=proxy` call as a GET and unwraps the JSON-RPC result.
    pub async fn proxy_request(&self, params: &Params) -> Result<Value> {
        let params = params.clone().with("module", "proxy");
        self.call(Method::GET, &params, Self::unwrap_proxy).await
    }

    async fn call(
        &self,
        method: Method,
        params: &Params,
        unwrap: fn(&str) -> Result<Value>,
    ) -> Result<Value> {
        let cached = self.cache.as_ref().map(|cache| {
            let key = ResponseCache::key(method.as_str(), &self.url, &params.canonical());
            (cache, key)
        });

        if let Some((cache, key)) = &cached {
            if let Some(body) = cache.get(key).await {
                return unwrap(&body);
            }
        }

        let body = self.send(method, params).await?;
        let result = unwrap(&body)?;

        // Only successful results are cached.
        if let Some((cache, key)) = &cached {
            cache.put(key, body).await;
        }

        Ok(result)
    }

    async fn send(&self, method: Method, params: &Params) -> Result<String> {
        let mut pairs: Vec<(&str, &str)> = params.iter().collect();
        pairs.push(("apikey", self.api_key.as_str()));

        debug!(
            "{} {} action={}",
            method,
            self.url,
            params.get("action").unwrap_or_default()
        );

        let request = self.http.request(method.clone(), self.url.as_str());
        let request = if method == Method::GET {
            request.query(&pairs)
        } else {
            request.form(&pairs)
        };

        let body = request.send().await?.error_for_status()?.text().await?;
        Ok(body)
    }

    fn unwrap_envelope(body: &str) -> Result<Value> {
        let envelope: Envelope = serde_json::from_str(body)?;

        if envelope.status == "0" {
            warn!("Etherscan.io message: {}", envelope.message);
            return Err(Error::Api {
                message: envelope.message,
                result: envelope.result,
            });
        }

        Ok(envelope.result)
    }

    fn unwrap_proxy(body: &str) -> Result<Value> {
        let response: ProxyResponse = serde_json::from_str(body)?;

        if let Some(error) = response.error {
            warn!("Etherscan.io proxy error {}: {}", error.code, error.message);
            return Err(Error::Rpc {
                code: error.code,
                message: error.message,
            });
        }

        if response.status.as_deref() == Some("0") {
            let message = response.message.unwrap_or_default();
            warn!("Etherscan.io message: {}", message);
            return Err(Error::Api {
                message,
                result: response.result,
            });
        }

        Ok(response.result)
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;

    #[test]
    fn test_unwrap_envelope() {
        let result =
            Session::unwrap_envelope(r#"{"status":"1","message":"OK","result":"123"}"#).unwrap();
        assert_eq!(result, json!("123"));

        match Session::unwrap_envelope(
            r#"{"status":"0","message":"NOTOK","result":"Invalid API Key"}"#,
        ) {
            Err(Error::Api { message, result }) => {
                assert_eq!(message, "NOTOK");
                assert_eq!(result, json!("Invalid API Key"));
            }
            other => panic!("expected API error, got {other:?}"),
        }

        assert!(matches!(
            Session::unwrap_envelope("<html>"),
            Err(Error::Json(_))
        ));
    }

    #[test]
    fn test_unwrap_proxy() {
        let result =
            Session::unwrap_proxy(r#"{"jsonrpc":"2.0","id":73,"result":"0x3b9aca00"}"#).unwrap();
        assert_eq!(result, json!("0x3b9aca00"));

        assert_eq!(
            Session::unwrap_proxy(r#"{"jsonrpc":"2.0","id":1,"result":null}"#).unwrap(),
            Value::Null
        );

        assert!(matches!(
            Session::unwrap_proxy(
                r#"{"jsonrpc":"2.0","id":1,"error":{"code":-32602,"message":"invalid argument 0"}}"#
            ),
            Err(Error::Rpc { code: -32602, .. })
        ));

        assert!(matches!(
            Session::unwrap_proxy(r#"{"status":"0","message":"NOTOK","result":"Max rate limit reached"}"#),
            Err(Error::Api { .. })
        ));
    }

    #[test]
    fn test_user_agent() {
        assert!(USER_AGENT.starts_with("etherscan-client/"));
    }
}
