use codemowers_operator::{
    binding::Binding,
    identity::Owner,
    kind,
    kube::core::DynamicObject,
    manifest::Manifest,
    resources::{Class, Instance},
};
use indoc::{formatdoc, indoc};

const SHARED_CLASS: &str = indoc! {"
    apiVersion: codemowers.io/v1alpha1
    kind: ClusterRedisClass
    metadata:
      name: shared
      uid: 6f0c2a5e-class
    spec:
      description: KeyDB instances collected in one namespace
      targetNamespace: redis-shared
      replicas: 1
      podSpec:
        containers:
          - name: keydb
            image: eqalpha/keydb:x86_64_v6.3.4
"};

fn parse(yaml: &str) -> DynamicObject {
    serde_yaml::from_str(yaml).unwrap()
}

fn instance(namespace: &str) -> Instance {
    let object = parse(&formatdoc! {"
        apiVersion: codemowers.io/v1alpha1
        kind: Redis
        metadata:
          name: x
          namespace: {namespace}
          uid: {namespace}-x-uid
        spec:
          class: shared
          capacity: 512Mi
    "});
    Instance::try_from(&object).unwrap()
}

fn names(manifests: &[Manifest]) -> Vec<String> {
    manifests.iter().map(ToString::to_string).collect()
}

#[test]
fn same_name_in_two_namespaces_does_not_collide() {
    let class = Class::try_from(&parse(SHARED_CLASS)).unwrap();
    let a = instance("a");
    let b = instance("b");

    let binding_a = Binding::new(&kind::REDIS, &a, Some(&class)).unwrap();
    let binding_b = Binding::new(&kind::REDIS, &b, Some(&class)).unwrap();
    assert_eq!(binding_a.target_name(), "a-x");
    assert_eq!(binding_b.target_name(), "b-x");
    assert_eq!(binding_a.identity.owner, Owner::Class);
    assert!(binding_a.identity.requires_explicit_cleanup());

    let manifests_a = kind::REDIS.generate(&binding_a).unwrap();
    let manifests_b = kind::REDIS.generate(&binding_b).unwrap();
    assert_eq!(
        names(&manifests_a),
        [
            "Service redis-shared/redis-cluster-a-x-headless",
            "Secret redis-shared/redis-cluster-a-x-secrets",
            "StatefulSet redis-shared/redis-cluster-a-x",
            "Service redis-shared/redis-cluster-a-x",
            "Secret a/redis-x-owner-secrets",
        ]
    );
    assert_eq!(
        names(&manifests_b),
        [
            "Service redis-shared/redis-cluster-b-x-headless",
            "Secret redis-shared/redis-cluster-b-x-secrets",
            "StatefulSet redis-shared/redis-cluster-b-x",
            "Service redis-shared/redis-cluster-b-x",
            "Secret b/redis-x-owner-secrets",
        ]
    );
}

#[test]
fn hoarded_children_are_owned_by_the_class() {
    let class = Class::try_from(&parse(SHARED_CLASS)).unwrap();
    let a = instance("a");
    let binding = Binding::new(&kind::REDIS, &a, Some(&class)).unwrap();

    for manifest in kind::REDIS.generate(&binding).unwrap() {
        let (metadata, expected_kind, expected_uid) = match &manifest {
            Manifest::Secret(secret) if secret.metadata.namespace.as_deref() == Some("a") => {
                (&secret.metadata, "Redis", "a-x-uid")
            }
            Manifest::Secret(secret) => (&secret.metadata, "ClusterRedisClass", "6f0c2a5e-class"),
            Manifest::Service(service) => (&service.metadata, "ClusterRedisClass", "6f0c2a5e-class"),
            Manifest::StatefulSet(stateful_set) => {
                (&stateful_set.metadata, "ClusterRedisClass", "6f0c2a5e-class")
            }
            Manifest::Custom(object) => panic!("unexpected custom resource {object:?}"),
        };

        let owner = &metadata.owner_references.as_ref().unwrap()[0];
        assert_eq!(owner.kind, expected_kind, "owner of {manifest}");
        assert_eq!(owner.uid, expected_uid, "owner of {manifest}");
        assert_eq!(owner.block_owner_deletion, Some(false));
        assert_eq!(owner.controller, Some(true));
    }
}

#[test]
fn owner_secret_points_at_the_hoarded_cluster() {
    let class = Class::try_from(&parse(SHARED_CLASS)).unwrap();
    let b = instance("b");
    let binding = Binding::new(&kind::REDIS, &b, Some(&class)).unwrap();

    let manifests = kind::REDIS.generate(&binding).unwrap();
    let Some(Manifest::Secret(owner_secret)) = manifests.last() else {
        panic!("owner secret is generated last");
    };
    let secret = owner_secret
        .materialize("s3cr3t", &codemowers_operator::secret::PasswordHasher::new(4))
        .unwrap();
    let data = secret.data.unwrap();
    assert_eq!(
        data["REDIS_HOST"].0,
        b"redis-cluster-b-x.redis-shared.svc.cluster.local"
    );
    assert_eq!(
        data["REDIS_URI"].0,
        b"redis://:s3cr3t@redis-cluster-b-x.redis-shared.svc.cluster.local"
    );
}

#[test]
fn cleanup_selector_only_matches_one_instance() {
    let class = Class::try_from(&parse(SHARED_CLASS)).unwrap();
    let a = instance("a");
    let binding = Binding::new(&kind::REDIS, &a, Some(&class)).unwrap();

    let selector = binding.labels.match_labels();
    let labels = selector.match_labels.unwrap();
    assert_eq!(labels["app.kubernetes.io/instance"], "a-x");
    assert_eq!(labels["app.kubernetes.io/name"], "redis");
    assert_eq!(labels["codemowers.io/class"], "shared");
}
