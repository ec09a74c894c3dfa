use serde_json::{Value, json};
use snafu::ResultExt;

use crate::{
    backends::{Backend, with_affinity},
    binding::Binding,
    labels::Labels,
    manifest::{self, InvalidLabelSnafu, Manifest},
    registry::{CustomResourceType, INNODB_CLUSTER},
    secret::{DEFAULT_SECRET_SIZE, SecretManifest, SecretSource},
};

const PORT: u16 = 3306;

/// MySQL InnoDB clusters run by the MySQL operator.
///
/// Databases and users inside the cluster are managed by the data plane, the
/// operator only emits the cluster and the credentials.
pub struct MysqlBackend;

impl MysqlBackend {
    fn root_secret_name(target: &str) -> String {
        format!("{target}-secrets")
    }

    /// The pod spec of the server instances with anti-affinity against the
    /// labels the MySQL operator puts on them.
    fn server_pod_spec(binding: &Binding<'_>) -> Result<Value, manifest::Error> {
        let labels = Labels::common(
            "mysql-innodbcluster-mysql-server",
            &format!("mysql-innodbcluster-{}-mysql-server", binding.target_name()),
        )
        .context(InvalidLabelSnafu)?;

        with_affinity(
            binding.class_spec().pod_spec.clone(),
            binding,
            &labels,
        )
    }

    fn router_pod_spec(binding: &Binding<'_>) -> Result<Value, manifest::Error> {
        let labels = Labels::common(
            "mysql-router",
            &format!("mysql-innodbcluster-{}-router", binding.target_name()),
        )
        .context(InvalidLabelSnafu)?;

        with_affinity(
            binding.class_spec().router_pod_spec.clone(),
            binding,
            &labels,
        )
    }
}

impl Backend for MysqlBackend {
    fn custom_resources(&self, binding: &Binding<'_>) -> Result<Vec<Manifest>, manifest::Error> {
        let Some(storage_class) = binding.storage_class() else {
            return Ok(Vec::new());
        };
        let target = binding.target_name();
        let secret_name = Self::root_secret_name(target);

        let root_secret = SecretManifest::new(
            binding.target_meta(&secret_name),
            SecretSource::Generate {
                size: DEFAULT_SECRET_SIZE,
            },
        )
        .with_literal("rootHost", "%")
        .with_template("rootPassword", "{plaintext}")
        .with_literal("rootUser", "root");

        let spec = binding.custom_resource_spec(json!({
            "tlsUseSelfSigned": true,
            "secretName": secret_name,
            "instances": binding.replicas(),
            "router": {
                "instances": binding.routers(),
                "podSpec": Self::router_pod_spec(binding)?,
            },
            "datadirVolumeClaimTemplate": {
                "storageClassName": storage_class,
                "accessModes": ["ReadWriteOnce"],
                "resources": {
                    "requests": {
                        "storage": binding.capacity()?.as_str(),
                    },
                },
            },
            "podSpec": Self::server_pod_spec(binding)?,
        }));

        Ok(vec![
            Manifest::Secret(root_secret),
            Manifest::Custom(INNODB_CLUSTER.object(binding.target_meta(target), spec)),
        ])
    }

    fn extra_manifests(&self, binding: &Binding<'_>) -> Result<Vec<Manifest>, manifest::Error> {
        let instance = binding.instance;
        let host = binding.service_fqdn(binding.target_name());
        let primary = binding.service_fqdn(&format!("{}-primary", binding.target_name()));
        let database = format!("{}_{}", instance.namespace, instance.name).replace('-', "_");
        let size = instance.spec.size.unwrap_or(DEFAULT_SECRET_SIZE);

        let secret = SecretManifest::new(
            binding.origin_meta(format!("mysql-database-{}-owner-secrets", instance.name)),
            SecretSource::Generate { size },
        )
        .with_literal("MYSQL_HOST", &host)
        .with_literal("MYSQL_PRIMARY", &primary)
        .with_literal("MYSQL_TCP_PORT", &PORT.to_string())
        .with_literal("MYSQL_USER", &database)
        .with_template("MYSQL_PASSWORD", "{plaintext}")
        .with_literal("MYSQL_DATABASE", &database)
        .with_template(
            "DATABASE_URL",
            format!("mysql://{database}:{{plaintext}}@{host}:{PORT}/{database}"),
        );

        Ok(vec![Manifest::Secret(secret)])
    }

    fn custom_resource_types(&self) -> &'static [&'static CustomResourceType] {
        &[&INNODB_CLUSTER]
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        kind,
        resources::{Class, ClassSpec, Instance, InstanceSpec},
        secret::PasswordHasher,
    };

    fn instance() -> Instance {
        Instance {
            namespace: "my-app".to_owned(),
            name: "orders-db".to_owned(),
            uid: Some("instance-uid".to_owned()),
            generation: Some(1),
            spec: InstanceSpec {
                capacity: Some("5Gi".to_owned()),
                class: Some("dedicated".to_owned()),
                ..InstanceSpec::default()
            },
        }
    }

    fn class(storage_class: Option<&str>) -> Class {
        Class {
            name: "dedicated".to_owned(),
            uid: Some("class-uid".to_owned()),
            spec: ClassSpec {
                replicas: Some(3),
                routers: Some(2),
                storage_class: storage_class.map(ToOwned::to_owned),
                pod_spec: Some(json!({"priorityClassName": "databases"})),
                ..ClassSpec::default()
            },
        }
    }

    #[test]
    fn innodb_cluster() {
        let instance = instance();
        let class = class(Some("local-path"));
        let binding = Binding::new(&kind::MYSQL_DATABASE, &instance, Some(&class)).unwrap();

        let manifests = kind::MYSQL_DATABASE.generate(&binding).unwrap();
        let names: Vec<_> = manifests.iter().map(ToString::to_string).collect();
        assert_eq!(
            names,
            [
                "Secret my-app/orders-db-secrets",
                "InnoDBCluster my-app/orders-db",
                "Secret my-app/mysql-database-orders-db-owner-secrets",
            ]
        );

        let Manifest::Custom(cluster) = &manifests[1] else {
            panic!("expected an InnoDBCluster");
        };
        let spec = &cluster.data["spec"];
        assert_eq!(spec["instances"], 3);
        assert_eq!(spec["router"]["instances"], 2);
        assert_eq!(spec["secretName"], "orders-db-secrets");
        assert_eq!(spec["datadirVolumeClaimTemplate"]["resources"]["requests"]["storage"], "5Gi");
        assert_eq!(spec["podSpec"]["priorityClassName"], "databases");

        let term = &spec["podSpec"]["affinity"]["podAntiAffinity"]
            ["requiredDuringSchedulingIgnoredDuringExecution"][0];
        assert_eq!(term["topologyKey"], "topology.kubernetes.io/zone");
        assert_eq!(
            term["labelSelector"]["matchExpressions"][1]["values"][0],
            "mysql-innodbcluster-mysql-server"
        );
    }

    #[test]
    fn nothing_delegated_without_storage_class() {
        let instance = instance();
        let class = class(None);
        let binding = Binding::new(&kind::MYSQL_DATABASE, &instance, Some(&class)).unwrap();

        let manifests = kind::MYSQL_DATABASE.generate(&binding).unwrap();
        assert_eq!(manifests.len(), 1);
        assert_eq!(manifests[0].kind(), "Secret");
    }

    #[test]
    fn owner_secret_uses_underscored_names() {
        let instance = instance();
        let class = class(Some("local-path"));
        let binding = Binding::new(&kind::MYSQL_DATABASE, &instance, Some(&class)).unwrap();

        let manifests = kind::MYSQL_DATABASE.generate(&binding).unwrap();
        let Some(Manifest::Secret(secret)) = manifests.last() else {
            panic!("expected the owner secret");
        };
        let data = secret
            .materialize("pw", &PasswordHasher::new(4))
            .unwrap()
            .data
            .unwrap();
        assert_eq!(data["MYSQL_USER"].0, b"my_app_orders_db");
        assert_eq!(
            data["DATABASE_URL"].0,
            b"mysql://my_app_orders_db:pw@orders-db.my-app.svc.cluster.local:3306/my_app_orders_db"
        );
    }
}
