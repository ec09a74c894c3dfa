use std::collections::BTreeMap;

use serde_json::{Value, json};
use snafu::ResultExt;

use crate::{
    backends::{Backend, with_affinity},
    binding::Binding,
    manifest::{self, Manifest, UnknownFlavorSnafu},
    registry::{CNPG_CLUSTER, CNPG_POOLER, CRUNCHY_POSTGRES_CLUSTER, CustomResourceType},
    schema,
    secret::{DEFAULT_SECRET_SIZE, SecretManifest, SecretSource},
    traits::Properties,
};

const PORT: u16 = 5432;
const POSTGRES_VERSION: u8 = 14;

/// The vendor operator running the clusters of a class.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, strum::Display, strum::EnumString)]
#[strum(serialize_all = "kebab-case")]
pub enum Flavor {
    /// Crunchy Data PGO, `PostgresCluster`
    #[default]
    Crunchy,

    /// CloudNativePG, `Cluster` plus an optional `Pooler`
    CloudnativePg,
}

impl Flavor {
    fn of(binding: &Binding<'_>) -> Result<Self, manifest::Error> {
        match binding.class_spec().flavor.as_deref() {
            None => Ok(Self::default()),
            Some(flavor) => flavor.parse().context(UnknownFlavorSnafu { flavor }),
        }
    }
}

pub struct PostgresBackend;

impl PostgresBackend {
    fn cluster_name(target: &str) -> String {
        format!("postgres-{target}")
    }

    fn pooler_name(target: &str) -> String {
        format!("postgres-{target}-pooler")
    }

    /// The Service clients connect to, which goes through the connection
    /// pooler where there is one.
    fn host(binding: &Binding<'_>, flavor: Flavor) -> String {
        let cluster = Self::cluster_name(binding.target_name());
        let service = match flavor {
            Flavor::Crunchy => format!("{cluster}-pgbouncer"),
            Flavor::CloudnativePg if binding.routers() > 0 => Self::pooler_name(binding.target_name()),
            Flavor::CloudnativePg => format!("{cluster}-rw"),
        };
        binding.service_fqdn(&service)
    }

    fn crunchy(binding: &Binding<'_>, storage_class: &str) -> Result<Vec<Manifest>, manifest::Error> {
        let capacity = binding.capacity()?;
        let labels: BTreeMap<String, String> = (&binding.labels).into();

        let mut instance = with_affinity(binding.class_spec().pod_spec.clone(), binding, &binding.labels)?;
        if let Value::Object(instance) = &mut instance {
            instance.insert("name".to_owned(), json!("cluster"));
            instance.insert("replicas".to_owned(), json!(binding.replicas()));
            instance.insert(
                "metadata".to_owned(),
                json!({ "labels": labels }),
            );
            instance.insert(
                "dataVolumeClaimSpec".to_owned(),
                json!({
                    "storageClassName": storage_class,
                    "accessModes": ["ReadWriteOnce"],
                    "resources": {"requests": {"storage": capacity.as_str()}},
                }),
            );
        }

        let spec = binding.custom_resource_spec(json!({
            "proxy": {"pgBouncer": {"replicas": binding.routers()}},
            "users": [{"name": "postgres"}],
            "postgresVersion": POSTGRES_VERSION,
            "instances": [instance],
            "backups": {
                "pgbackrest": {
                    "repos": [{
                        "name": "repo1",
                        "volume": {
                            "volumeClaimSpec": {
                                "accessModes": ["ReadWriteOnce"],
                                "resources": {
                                    "requests": {
                                        // Room for a full backup next to the WAL archive
                                        "storage": (2 * u128::from(capacity.bytes())).to_string(),
                                    },
                                },
                            },
                        },
                    }],
                },
            },
        }));

        Ok(vec![Manifest::Custom(CRUNCHY_POSTGRES_CLUSTER.object(
            binding.target_meta(Self::cluster_name(binding.target_name())),
            spec,
        ))])
    }

    fn cloudnative_pg(binding: &Binding<'_>, storage_class: &str) -> Result<Vec<Manifest>, manifest::Error> {
        let cluster_name = Self::cluster_name(binding.target_name());
        let spec = binding.custom_resource_spec(json!({
            "instances": binding.replicas(),
            "storage": {
                "size": binding.capacity()?.as_str(),
                "storageClass": storage_class,
            },
            "affinity": {
                "enablePodAntiAffinity": true,
                "podAntiAffinityType": "required",
                "topologyKey": binding.topology_key(),
            },
        }));

        let mut manifests = vec![Manifest::Custom(
            CNPG_CLUSTER.object(binding.target_meta(&cluster_name), spec),
        )];

        if binding.routers() > 0 {
            let pooler = json!({
                "cluster": {"name": cluster_name},
                "instances": binding.routers(),
                "type": "rw",
                "pgbouncer": {"poolMode": "session"},
            });
            manifests.push(Manifest::Custom(CNPG_POOLER.object(
                binding.target_meta(Self::pooler_name(binding.target_name())),
                pooler,
            )));
        }

        Ok(manifests)
    }
}

impl Backend for PostgresBackend {
    fn class_properties(&self) -> Properties {
        vec![(
            "flavor",
            schema::with_default(
                schema::with_enum(
                    schema::string("Operator running the clusters"),
                    &["crunchy", "cloudnative-pg"],
                ),
                "crunchy",
            ),
        )]
    }

    fn custom_resources(&self, binding: &Binding<'_>) -> Result<Vec<Manifest>, manifest::Error> {
        let Some(storage_class) = binding.storage_class() else {
            return Ok(Vec::new());
        };

        match Flavor::of(binding)? {
            Flavor::Crunchy => Self::crunchy(binding, storage_class),
            Flavor::CloudnativePg => Self::cloudnative_pg(binding, storage_class),
        }
    }

    fn extra_manifests(&self, binding: &Binding<'_>) -> Result<Vec<Manifest>, manifest::Error> {
        let instance = binding.instance;
        let host = Self::host(binding, Flavor::of(binding)?);
        let database = format!("{}_{}", instance.namespace, instance.name).replace('-', "_");
        let size = instance.spec.size.unwrap_or(DEFAULT_SECRET_SIZE);

        let secret = SecretManifest::new(
            binding.origin_meta(format!("postgres-database-{}-owner-secrets", instance.name)),
            SecretSource::Generate { size },
        )
        .with_literal("PGHOST", &host)
        .with_literal("PGUSER", &database)
        .with_literal("PGPORT", &PORT.to_string())
        .with_template("PGPASSWORD", "{plaintext}")
        .with_literal("PGDATABASE", &database)
        .with_template(
            "DATABASE_URL",
            format!("postgres://{database}:{{plaintext}}@{host}:{PORT}/{database}"),
        );

        Ok(vec![Manifest::Secret(secret)])
    }

    fn custom_resource_types(&self) -> &'static [&'static CustomResourceType] {
        &[&CRUNCHY_POSTGRES_CLUSTER, &CNPG_CLUSTER, &CNPG_POOLER]
    }
}
