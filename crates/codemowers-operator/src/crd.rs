//! CustomResourceDefinitions of the instance, class and claim kinds.
//!
//! Schemas are assembled from the properties contributed by the capabilities
//! of a [`Kind`] rather than derived from Rust types, since the set of fields
//! depends on the capability list.
use std::collections::BTreeMap;

use convert_case::{Case, Casing};
use k8s_openapi::{
    apiextensions_apiserver::pkg::apis::apiextensions::v1::{
        CustomResourceColumnDefinition, CustomResourceConversion, CustomResourceDefinition,
        CustomResourceDefinitionNames, CustomResourceDefinitionSpec,
        CustomResourceDefinitionVersion, CustomResourceSubresourceStatus,
        CustomResourceSubresources, CustomResourceValidation, JSONSchemaProps,
    },
    apimachinery::pkg::apis::meta::v1::ObjectMeta,
};

use crate::{
    kind::{GROUP, Kind, VERSION},
    schema,
};

const CONDITION_REASON_PATTERN: &str = "^[A-Za-z]([A-Za-z0-9_,:]*[A-Za-z0-9_])?$";
const CONDITION_TYPE_PATTERN: &str = "^([a-z0-9]([-a-z0-9]*[a-z0-9])?(\\.[a-z0-9]([-a-z0-9]*[a-z0-9])?)*/)?(([A-Za-z0-9][-A-Za-z0-9_.]*)?[A-Za-z0-9])$";

/// Class fields shown by `kubectl get` when the kind declares them.
const CLASS_COLUMNS: &[(&str, &str)] = &[
    ("description", "string"),
    ("targetNamespace", "string"),
    ("targetCluster", "string"),
    ("storageClass", "string"),
    ("ingressClass", "string"),
    ("replicas", "integer"),
    ("routers", "integer"),
];

#[derive(Clone, Copy)]
enum Scope {
    Namespaced,
    Cluster,
}

impl Scope {
    fn as_str(self) -> &'static str {
        match self {
            Self::Namespaced => "Namespaced",
            Self::Cluster => "Cluster",
        }
    }
}

/// All CRDs of `kind`: the instance, then the class and claim where the kind
/// has them.
pub fn crds(kind: &Kind) -> Vec<CustomResourceDefinition> {
    [Some(instance_crd(kind)), class_crd(kind), claim_crd(kind)]
        .into_iter()
        .flatten()
        .collect()
}

pub fn instance_crd(kind: &Kind) -> CustomResourceDefinition {
    namespaced_crd(kind, kind.singular, &kind.plural_name())
}

/// The namespaced claim CRD, which mirrors the instance schema.
pub fn claim_crd(kind: &Kind) -> Option<CustomResourceDefinition> {
    kind.has_claim()
        .then(|| namespaced_crd(kind, &kind.claim_kind(), &kind.claim_plural()))
}

pub fn class_crd(kind: &Kind) -> Option<CustomResourceDefinition> {
    if !kind.requires_class() {
        return None;
    }

    let properties = kind.class_properties();
    let mut spec_properties = BTreeMap::from([(
        "description".to_owned(),
        schema::string("Human readable description of the class"),
    )]);
    spec_properties.extend(
        properties
            .iter()
            .map(|(name, property)| ((*name).to_owned(), property.clone())),
    );

    let mut columns: Vec<_> = CLASS_COLUMNS
        .iter()
        .filter(|(field, _)| *field == "description" || properties.contains_key(*field))
        .map(|&(field, type_)| {
            schema::column(&field.to_case(Case::Sentence), &format!(".spec.{field}"), type_)
        })
        .collect();
    if properties.contains_key("podSpec") {
        columns.push(schema::column(
            "Image",
            ".spec.podSpec.containers[0].image",
            "string",
        ));
    }
    columns.push(age_column());

    let root = schema::object(
        BTreeMap::from([(
            "spec".to_owned(),
            schema::object(spec_properties, &["description"]),
        )]),
        &["spec"],
    );

    let mut crd = crd(
        kind.class_kind(),
        kind.class_plural(),
        Scope::Cluster,
        root,
        columns,
        false,
    );
    crd.spec.conversion = Some(CustomResourceConversion {
        strategy: "None".to_owned(),
        webhook: None,
    });
    Some(crd)
}

fn namespaced_crd(kind: &Kind, crd_kind: &str, plural: &str) -> CustomResourceDefinition {
    let properties = kind.instance_properties();
    let required: Vec<&str> = properties.keys().copied().collect();
    let spec = schema::object(
        properties
            .into_iter()
            .map(|(name, property)| (name.to_owned(), property))
            .collect(),
        &required,
    );

    let root = schema::object(
        BTreeMap::from([
            ("spec".to_owned(), spec),
            ("status".to_owned(), status_schema()),
        ]),
        &["spec"],
    );

    let mut columns = vec![
        age_column(),
        schema::column("Ready", ".status.creation.state", "string"),
    ];
    columns.extend(kind.printer_columns());

    crd(
        crd_kind.to_owned(),
        plural.to_owned(),
        Scope::Namespaced,
        root,
        columns,
        true,
    )
}

fn crd(
    crd_kind: String,
    plural: String,
    scope: Scope,
    schema: JSONSchemaProps,
    columns: Vec<CustomResourceColumnDefinition>,
    status: bool,
) -> CustomResourceDefinition {
    CustomResourceDefinition {
        metadata: ObjectMeta {
            name: Some(format!("{plural}.{GROUP}")),
            ..ObjectMeta::default()
        },
        spec: CustomResourceDefinitionSpec {
            group: GROUP.to_owned(),
            names: CustomResourceDefinitionNames {
                singular: Some(crd_kind.to_lowercase()),
                kind: crd_kind,
                plural,
                ..CustomResourceDefinitionNames::default()
            },
            scope: scope.as_str().to_owned(),
            versions: vec![CustomResourceDefinitionVersion {
                name: VERSION.to_owned(),
                served: true,
                storage: true,
                schema: Some(CustomResourceValidation {
                    open_api_v3_schema: Some(schema),
                }),
                subresources: status.then(|| CustomResourceSubresources {
                    status: Some(CustomResourceSubresourceStatus(serde_json::json!({}))),
                    ..CustomResourceSubresources::default()
                }),
                additional_printer_columns: Some(columns),
                ..CustomResourceDefinitionVersion::default()
            }],
            ..CustomResourceDefinitionSpec::default()
        },
        status: None,
    }
}

fn age_column() -> CustomResourceColumnDefinition {
    schema::column("Age", ".metadata.creationTimestamp", "date")
}

/// `status.conditions` in the shape of the upstream `metav1.Condition`, plus
/// the observed generation and the phase backing the Ready column.
fn status_schema() -> JSONSchemaProps {
    let condition = schema::object(
        BTreeMap::from([
            (
                "lastTransitionTime".to_owned(),
                JSONSchemaProps {
                    format: Some("date-time".to_owned()),
                    ..schema::string("Last time the condition transitioned")
                },
            ),
            (
                "message".to_owned(),
                JSONSchemaProps {
                    max_length: Some(32768),
                    ..schema::string("Human readable details about the transition")
                },
            ),
            (
                "observedGeneration".to_owned(),
                schema::integer("Generation the condition was set for"),
            ),
            (
                "reason".to_owned(),
                JSONSchemaProps {
                    max_length: Some(1024),
                    min_length: Some(1),
                    ..schema::with_pattern(
                        schema::string("Programmatic identifier of the last transition"),
                        CONDITION_REASON_PATTERN,
                    )
                },
            ),
            (
                "status".to_owned(),
                schema::with_enum(
                    schema::string("Status of the condition"),
                    &["True", "False", "Unknown"],
                ),
            ),
            (
                "type".to_owned(),
                JSONSchemaProps {
                    max_length: Some(316),
                    ..schema::with_pattern(
                        schema::string("Type of the condition"),
                        CONDITION_TYPE_PATTERN,
                    )
                },
            ),
        ]),
        &["lastTransitionTime", "message", "reason", "status", "type"],
    );

    schema::object(
        BTreeMap::from([
            ("conditions".to_owned(), schema::array(condition)),
            (
                "observedGeneration".to_owned(),
                schema::integer("Generation observed by the operator"),
            ),
            (
                "creation".to_owned(),
                schema::object(
                    BTreeMap::from([("state".to_owned(), schema::string("Phase of the instance"))]),
                    &[],
                ),
            ),
        ]),
        &[],
    )
}
