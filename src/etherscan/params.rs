use std::fmt::Display;

/// Query parameters of a single API call.
///
/// Every operation builds its own instance, so nothing leaks from one call
/// into the next. The API key is appended by the session when the request is
/// sent.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Params {
    pairs: Vec<(&'static str, String)>,
}

impl Params {
    /// Starts a standard call for `module`/`action`.
    pub fn new(module: &str, action: &str) -> Self {
        Self::default().with("module", module).with("action", action)
    }

    /// Starts a `module=proxy` call for the JSON-RPC method `action`.
    pub fn proxy(action: &str) -> Self {
        Self::new("proxy", action)
    }

    pub fn with(mut self, key: &'static str, value: impl Display) -> Self {
        self.set(key, value.to_string());
        self
    }

    pub fn with_opt(self, key: &'static str, value: Option<impl Display>) -> Self {
        match value {
            Some(value) => self.with(key, value),
            None => self,
        }
    }

    fn set(&mut self, key: &'static str, value: String) {
        match self.pairs.iter_mut().find(|(k, _)| *k == key) {
            Some(pair) => pair.1 = value,
            None => self.pairs.push((key, value)),
        }
    }

    pub fn get(&self, key: &str) -> Option<&str> {
        self.pairs
            .iter()
            .find(|(k, _)| *k == key)
            .map(|(_, v)| v.as_str())
    }

    pub fn iter(&self) -> impl Iterator<Item = (&'static str, &str)> {
        self.pairs.iter().map(|(k, v)| (*k, v.as_str()))
    }

    /// Canonical `key=value&...` form with keys sorted, used for cache keys.
    pub(crate) fn canonical(&self) -> String {
        let mut pairs: Vec<_> = self.iter().collect();
        pairs.sort_unstable();
        pairs
            .iter()
            .map(|(k, v)| format!("{k}={v}"))
            .collect::<Vec<_>>()
            .join("&")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_params_builder() {
        let params = Params::new("account", "balance")
            .with("address", "0xabc")
            .with_opt("contractaddress", None::<&str>)
            .with("page", 2);

        assert_eq!(params.get("module"), Some("account"));
        assert_eq!(params.get("action"), Some("balance"));
        assert_eq!(params.get("page"), Some("2"));
        assert_eq!(params.get("contractaddress"), None);
    }

    #[test]
    fn test_params_overwrite() {
        let params = Params::new("account", "txlist").with("action", "txlistinternal");

        assert_eq!(params.get("action"), Some("txlistinternal"));
        assert_eq!(params.iter().count(), 2);
    }

    #[test]
    fn test_canonical_is_order_independent() {
        let a = Params::default().with("b", 1).with("a", 2);
        let b = Params::default().with("a", 2).with("b", 1);

        assert_eq!(a.canonical(), "a=2&b=1");
        assert_eq!(a.canonical(), b.canonical());
    }
}
