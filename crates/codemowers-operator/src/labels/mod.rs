//! Label sets and selectors for generated children.
//!
//! A single [`Labels`] value is used for object metadata, pod template labels,
//! Service selectors and pod anti-affinity selectors, so these can never drift
//! apart.
use std::collections::BTreeMap;

use const_format::concatcp;
use k8s_openapi::apimachinery::pkg::apis::meta::v1::{LabelSelector, LabelSelectorRequirement};
use snafu::{ResultExt, Snafu};

mod selector;
mod value;

pub use selector::*;
pub use value::*;

const K8S_APP_KEY_PREFIX: &str = "app.kubernetes.io/";

/// The well-known Kubernetes app name key, e.g. `redis`.
pub const K8S_APP_NAME_KEY: &str = concatcp!(K8S_APP_KEY_PREFIX, "name");

/// The well-known Kubernetes app instance key. Holds the target name.
pub const K8S_APP_INSTANCE_KEY: &str = concatcp!(K8S_APP_KEY_PREFIX, "instance");

/// Associates generated children with the class they were rendered from.
pub const CLASS_KEY: &str = "codemowers.io/class";

#[derive(Debug, PartialEq, Eq, Snafu)]
#[snafu(display("invalid value {value:?} for label {key:?}"))]
pub struct LabelError {
    source: LabelValueError,
    key: String,
    value: String,
}

#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct Labels(BTreeMap<String, LabelValue>);

impl Labels {
    pub fn new() -> Self {
        Self::default()
    }

    /// The labels shared by every child of one application instance.
    pub fn common(app_name: &str, app_instance: &str) -> Result<Self, LabelError> {
        let mut labels = Self::new();
        labels.insert(K8S_APP_NAME_KEY, app_name)?;
        labels.insert(K8S_APP_INSTANCE_KEY, app_instance)?;
        Ok(labels)
    }

    pub fn with_class(mut self, class_name: &str) -> Result<Self, LabelError> {
        self.insert(CLASS_KEY, class_name)?;
        Ok(self)
    }

    pub fn insert(&mut self, key: &str, value: &str) -> Result<&mut Self, LabelError> {
        let parsed = value.parse().context(LabelSnafu { key, value })?;
        self.0.insert(key.to_owned(), parsed);
        Ok(self)
    }

    pub fn get(&self, key: &str) -> Option<&str> {
        self.0.get(key).map(|value| &**value)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.0.iter().map(|(key, value)| (key.as_str(), &**value))
    }

    /// A selector with one `In` expression per label.
    pub fn selector(&self) -> LabelSelector {
        let expressions = self
            .iter()
            .map(|(key, value)| LabelSelectorRequirement {
                key: key.to_owned(),
                operator: "In".to_owned(),
                values: Some(vec![value.to_owned()]),
            })
            .collect();

        LabelSelector {
            match_expressions: Some(expressions),
            match_labels: None,
        }
    }

    /// A selector using `matchLabels`, as required by StatefulSet specs.
    pub fn match_labels(&self) -> LabelSelector {
        LabelSelector {
            match_expressions: None,
            match_labels: Some(self.into()),
        }
    }
}

impl From<&Labels> for BTreeMap<String, String> {
    fn from(labels: &Labels) -> Self {
        labels
            .iter()
            .map(|(key, value)| (key.to_owned(), value.to_owned()))
            .collect()
    }
}

impl From<Labels> for BTreeMap<String, String> {
    fn from(labels: Labels) -> Self {
        Self::from(&labels)
    }
}
