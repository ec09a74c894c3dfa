use k8s_openapi::apimachinery::pkg::apis::meta::v1::{LabelSelector, LabelSelectorRequirement};
use snafu::Snafu;

#[derive(Debug, PartialEq, Eq, Snafu)]
pub enum SelectorError {
    #[snafu(display("label selector with binary operator {operator:?} must have values"))]
    BinaryOperatorWithoutValues { operator: String },

    #[snafu(display("label selector with unary operator {operator:?} must not have values"))]
    UnaryOperatorWithValues { operator: String },

    #[snafu(display("label selector has an invalid operator {operator:?}"))]
    InvalidOperator { operator: String },
}

/// Extends [`LabelSelector`] with a rendering suitable for list and
/// delete-collection calls.
pub trait LabelSelectorExt {
    /// Renders the selector as a query string, e.g.
    /// `app.kubernetes.io/name in (redis),app.kubernetes.io/instance in (cache)`.
    fn to_query_string(&self) -> Result<String, SelectorError>;
}

impl LabelSelectorExt for LabelSelector {
    fn to_query_string(&self) -> Result<String, SelectorError> {
        let mut parts: Vec<String> = self
            .match_labels
            .iter()
            .flatten()
            .map(|(key, value)| format!("{key}={value}"))
            .collect();

        for requirement in self.match_expressions.iter().flatten() {
            parts.push(requirement_to_query(requirement)?);
        }

        Ok(parts.join(","))
    }
}

fn requirement_to_query(requirement: &LabelSelectorRequirement) -> Result<String, SelectorError> {
    let has_values = requirement
        .values
        .as_ref()
        .is_some_and(|values| !values.is_empty());
    let key = &requirement.key;

    match requirement.operator.as_str() {
        operator @ ("In" | "NotIn") => {
            snafu::ensure!(has_values, BinaryOperatorWithoutValuesSnafu { operator });
            let values = requirement.values.as_deref().unwrap_or_default().join(", ");
            Ok(format!("{key} {} ({values})", operator.to_ascii_lowercase()))
        }
        operator @ "Exists" => {
            snafu::ensure!(!has_values, UnaryOperatorWithValuesSnafu { operator });
            Ok(key.clone())
        }
        operator @ "DoesNotExist" => {
            snafu::ensure!(!has_values, UnaryOperatorWithValuesSnafu { operator });
            Ok(format!("!{key}"))
        }
        operator => InvalidOperatorSnafu { operator }.fail(),
    }
}
