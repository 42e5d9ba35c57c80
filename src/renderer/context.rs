//! Rendering context: catalog tables merged with caller parameters

use std::collections::BTreeMap;

use crate::catalog::Catalog;
use crate::renderer::value::Value;

/// Key under which positional command-line arguments are exposed
pub const ARGS_KEY: &str = "args";

/// Caller-supplied values overlaid on the catalog keys
///
/// # Example
///
/// ```rust
/// use dispatchgen::Params;
///
/// let params = Params::new()
///     .with_args(["a", "b", "c"])
///     .with("target", "avx2");
/// assert_eq!(params.len(), 2);
/// ```
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Params {
    values: BTreeMap<String, Value<'static>>,
}

impl Params {
    pub fn new() -> Self {
        Self::default()
    }

    /// Expose `args` as an ordered list of strings under [`ARGS_KEY`]
    pub fn with_args<S: Into<String>>(self, args: impl IntoIterator<Item = S>) -> Self {
        let args = args
            .into_iter()
            .map(Into::<String>::into)
            .map(Value::from)
            .collect();
        self.with(ARGS_KEY, Value::list(args))
    }

    pub fn with(mut self, key: impl Into<String>, value: impl Into<Value<'static>>) -> Self {
        self.insert(key, value);
        self
    }

    /// Set `key`, replacing any earlier value
    pub fn insert(&mut self, key: impl Into<String>, value: impl Into<Value<'static>>) {
        self.values.insert(key.into(), value.into());
    }

    pub fn get(&self, key: &str) -> Option<&Value<'static>> {
        self.values.get(key)
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &Value<'static>)> {
        self.values.iter().map(|(k, v)| (k.as_str(), v))
    }
}

/// The merged environment one render call evaluates against
#[derive(Debug, Clone)]
pub struct Context<'a> {
    catalog: &'a Catalog,
    values: BTreeMap<String, Value<'a>>,
    overridden: Vec<String>,
}

impl<'a> Context<'a> {
    /// Base keys: `architectures`, `architecture_lookup`, `machines`,
    /// `machine_lookup`, `kernels`
    pub fn new(catalog: &'a Catalog) -> Self {
        let mut values = BTreeMap::new();
        values.insert(
            "architectures".to_string(),
            Value::list(catalog.archs.iter().map(Value::Arch).collect()),
        );
        values.insert(
            "architecture_lookup".to_string(),
            Value::map(
                catalog
                    .archs
                    .iter()
                    .map(|a| (a.name.clone(), Value::Arch(a)))
                    .collect(),
            ),
        );
        values.insert(
            "machines".to_string(),
            Value::list(catalog.machines.iter().map(Value::Machine).collect()),
        );
        values.insert(
            "machine_lookup".to_string(),
            Value::map(
                catalog
                    .machines
                    .iter()
                    .map(|m| (m.name.clone(), Value::Machine(m)))
                    .collect(),
            ),
        );
        values.insert(
            "kernels".to_string(),
            Value::list(catalog.kernels.iter().map(Value::Kernel).collect()),
        );

        Self {
            catalog,
            values,
            overridden: Vec::new(),
        }
    }

    /// Overlay caller parameters; on collision the parameter wins
    pub fn with_params(mut self, params: &Params) -> Self {
        for (key, value) in params.iter() {
            if self.values.insert(key.to_string(), value.clone()).is_some() {
                self.overridden.push(key.to_string());
            }
        }
        self
    }

    pub fn get(&self, name: &str) -> Option<&Value<'a>> {
        self.values.get(name)
    }

    pub fn catalog(&self) -> &'a Catalog {
        self.catalog
    }

    /// All top-level names, sorted
    pub fn keys(&self) -> impl Iterator<Item = &str> {
        self.values.keys().map(String::as_str)
    }

    /// Catalog keys replaced by caller parameters
    pub fn overridden(&self) -> &[String] {
        &self.overridden
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::catalog::{Arch, Machine};
    use pretty_assertions::assert_eq;

    fn catalog() -> Catalog {
        Catalog::new(
            vec![Arch::new("generic"), Arch::new("avx2")],
            vec![Machine::new("generic", ["generic"])],
            vec![],
        )
    }

    #[test]
    fn test_base_keys() {
        let catalog = catalog();
        let context = Context::new(&catalog);
        let keys: Vec<_> = context.keys().collect();
        assert_eq!(
            keys,
            vec![
                "architecture_lookup",
                "architectures",
                "kernels",
                "machine_lookup",
                "machines",
            ]
        );
        let lookup = context.get("architecture_lookup").unwrap();
        assert_eq!(
            lookup.index(&Value::from("avx2")).unwrap(),
            Value::Arch(&catalog.archs[1])
        );
    }

    #[test]
    fn test_params_override_catalog_keys() {
        let catalog = catalog();
        let params = Params::new().with("machines", "mine").with_args(["x"]);
        let context = Context::new(&catalog).with_params(&params);
        assert_eq!(context.get("machines"), Some(&Value::from("mine")));
        assert_eq!(context.get(ARGS_KEY), Some(&Value::from(vec!["x"])));
        assert_eq!(context.overridden(), ["machines".to_string()]);
    }

    #[test]
    fn test_params_last_insert_wins() {
        let mut params = Params::new().with("target", "sse2");
        params.insert("target", "avx2");
        assert_eq!(params.len(), 1);
        assert_eq!(params.get("target"), Some(&Value::from("avx2")));
    }
}
