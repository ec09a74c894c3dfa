use codemowers_operator::{
    crd, kind,
    k8s_openapi::apiextensions_apiserver::pkg::apis::apiextensions::v1::CustomResourceDefinition,
    yaml,
};
use rstest::rstest;

fn names(crds: &[CustomResourceDefinition]) -> Vec<&str> {
    crds.iter()
        .filter_map(|crd| crd.metadata.name.as_deref())
        .collect()
}

#[rstest]
#[case(&kind::REDIS, &["redises.codemowers.io", "clusterredisclasses.codemowers.io"])]
#[case(
    &kind::BUCKET,
    &["buckets.codemowers.io", "clusterbucketclasses.codemowers.io", "bucketclaims.codemowers.io"]
)]
#[case(
    &kind::MYSQL_DATABASE,
    &["mysqldatabases.codemowers.io", "clustermysqldatabaseclasses.codemowers.io"]
)]
#[case(&kind::SECRET, &["secrets.codemowers.io"])]
fn crds_per_kind(#[case] kind: &kind::Kind, #[case] expected: &[&str]) {
    assert_eq!(names(&crd::crds(kind)), expected);
}

#[test]
fn yaml_output_parses_back() {
    let crds: Vec<_> = kind::all().into_iter().flat_map(crd::crds).collect();
    let output = yaml::to_string(&crds).unwrap();

    let documents: Vec<CustomResourceDefinition> = output
        .split("---\n")
        .filter(|document| !document.trim().is_empty())
        .map(|document| serde_yaml::from_str(document).unwrap())
        .collect();
    assert_eq!(names(&documents), names(&crds));
    assert!(output.contains("x-kubernetes-validations"));
}

#[test]
fn instance_printer_columns() {
    let crd = crd::instance_crd(&kind::REDIS);
    let columns: Vec<_> = crd.spec.versions[0]
        .additional_printer_columns
        .iter()
        .flatten()
        .map(|column| column.name.as_str())
        .collect();
    assert_eq!(columns, ["Age", "Ready", "Class", "Capacity"]);
}
