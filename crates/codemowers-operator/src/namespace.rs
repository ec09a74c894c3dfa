//! This module provides helpers to deal with the watched namespaces
use kube::{
    Api,
    core::{ApiResource, DynamicObject},
};

use crate::client::Client;

#[derive(Clone, Debug, Eq, Ord, PartialEq, PartialOrd)]
pub enum WatchNamespace {
    All,
    One(String),
}

impl From<&str> for WatchNamespace {
    fn from(s: &str) -> Self {
        if s.is_empty() {
            Self::All
        } else {
            Self::One(s.to_owned())
        }
    }
}

impl WatchNamespace {
    /// Gets an API object for the namespace in question or for all
    /// namespaces, depending on which variant we are.
    pub fn get_api(&self, client: &Client, resource: &ApiResource) -> Api<DynamicObject> {
        match self {
            Self::All => Api::all_with(client.as_kube_client(), resource),
            Self::One(namespace) => Api::namespaced_with(client.as_kube_client(), namespace, resource),
        }
    }
}

#[cfg(test)]
mod tests {
    use rstest::rstest;

    use super::*;

    #[rstest]
    #[case("", WatchNamespace::All)]
    #[case("app", WatchNamespace::One("app".to_owned()))]
    fn from_str(#[case] input: &str, #[case] expected: WatchNamespace) {
        assert_eq!(WatchNamespace::from(input), expected);
    }
}
