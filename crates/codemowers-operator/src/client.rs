//! Access to the Kubernetes API.
//!
//! Children are created once and never updated. An object that already exists
//! counts as created, which makes every reconcile safely retryable.
use std::{fmt::Debug, future::Future, time::Duration};

use k8s_openapi::{
    api::{
        apps::v1::StatefulSet,
        core::v1::{Secret, Service},
    },
    apimachinery::pkg::apis::meta::v1::LabelSelector,
};
use kube::{
    Api, Resource, ResourceExt,
    api::{DeleteParams, ListParams, Patch, PatchParams, PostParams},
    config::{InClusterError, KubeConfigOptions, KubeconfigError},
    core::{ApiResource, DynamicObject},
};
use serde::{Serialize, de::DeserializeOwned};
use snafu::{OptionExt, ResultExt, Snafu};
use tracing::{debug, info};

use crate::{
    kind::Kind,
    labels::{LabelSelectorExt, SelectorError},
    manifest::Manifest,
    registry::{self, CustomResourceType},
    resources::{self, Class},
    secret::{self, PasswordHasher, SecretManifest, SecretSource, generate_plaintext, read_key},
};

pub const FIELD_MANAGER: &str = "codemowers-operator";

type Result<T, E = Error> = std::result::Result<T, E>;

#[derive(Debug, Snafu)]
pub enum Error {
    #[snafu(display("failed to load kubeconfig"))]
    LoadKubeconfig { source: KubeconfigError },

    #[snafu(display("failed to load in-cluster configuration"))]
    LoadInClusterConfig { source: InClusterError },

    #[snafu(display("failed to create Kubernetes client"))]
    CreateClient { source: kube::Error },

    #[snafu(display("{kind} {name:?} not found"))]
    ClassNotFound { kind: String, name: String },

    #[snafu(display("failed to get {kind} {name:?}"))]
    GetClass {
        source: kube::Error,
        kind: String,
        name: String,
    },

    #[snafu(display("failed to parse {kind} {name:?}"))]
    ParseClass {
        source: resources::Error,
        kind: String,
        name: String,
    },

    #[snafu(display("failed to create {manifest}"))]
    CreateObject {
        source: kube::Error,
        manifest: String,
    },

    #[snafu(display("generated object {manifest} has no namespace"))]
    MissingNamespace { manifest: String },

    #[snafu(display("{api_version} {kind} is not a registered custom resource"))]
    UnregisteredKind { api_version: String, kind: String },

    #[snafu(display("failed to read secret {namespace}/{name}"))]
    ReadSecret {
        source: kube::Error,
        namespace: String,
        name: String,
    },

    #[snafu(display("source secret {namespace}/{name} does not exist yet"))]
    MissingSourceSecret { namespace: String, name: String },

    #[snafu(display("failed to materialize {manifest}"))]
    MaterializeSecret {
        source: secret::Error,
        manifest: String,
    },

    #[snafu(display("failed to patch status of {name:?}"))]
    PatchStatus { source: kube::Error, name: String },

    #[snafu(display("failed to build cleanup selector"))]
    CleanupSelector { source: SelectorError },

    #[snafu(display("failed to list {kind} in namespace {namespace:?}"))]
    ListObjects {
        source: kube::Error,
        kind: String,
        namespace: String,
    },

    #[snafu(display("failed to delete {kind} {namespace}/{name}"))]
    DeleteObject {
        source: kube::Error,
        kind: String,
        namespace: String,
        name: String,
    },

    #[snafu(display("{what} timed out after {timeout:?}"))]
    Timeout {
        source: tokio::time::error::Elapsed,
        what: String,
        timeout: Duration,
    },
}

impl Error {
    /// The taxonomy name used as condition reason.
    pub fn category(&self) -> &'static str {
        match self {
            Self::ClassNotFound { .. } => "ClassNotFound",
            Self::ParseClass { .. } => "InvalidClassSpec",
            Self::UnregisteredKind { .. } => "UnregisteredKind",
            Self::Timeout { .. } => "Timeout",
            Self::MaterializeSecret {
                source: secret::Error::RenderKey { source, .. },
                ..
            } => source.into(),
            error if error.is_upstream() => "UpstreamApi",
            Self::LoadKubeconfig { .. } | Self::LoadInClusterConfig { .. } | Self::CreateClient { .. } => {
                "Configuration"
            }
            Self::MissingSourceSecret { .. } => "MissingSourceSecret",
            _ => "InvalidManifest",
        }
    }

    /// Whether the error was returned by the API server, as opposed to raised
    /// while preparing a request.
    pub fn is_upstream(&self) -> bool {
        matches!(
            self,
            Self::GetClass { .. }
                | Self::CreateObject { .. }
                | Self::ReadSecret { .. }
                | Self::PatchStatus { .. }
                | Self::ListObjects { .. }
                | Self::DeleteObject { .. }
        )
    }
}

/// The outcome of applying one manifest.
#[derive(Clone, Copy, Debug, PartialEq, Eq, strum::Display)]
pub enum Applied {
    Created,
    AlreadyExists,

    /// Nothing was done, only possible in dry-run mode.
    Skipped,
}

/// Creates a [`kube::Client`] from `KUBECONFIG` when it is set, otherwise from
/// the in-cluster service account.
pub async fn initialize_client() -> Result<kube::Client> {
    let config = if std::env::var_os("KUBECONFIG").is_some() {
        kube::Config::from_kubeconfig(&KubeConfigOptions::default())
            .await
            .context(LoadKubeconfigSnafu)?
    } else {
        kube::Config::incluster().context(LoadInClusterConfigSnafu)?
    };

    kube::Client::try_from(config).context(CreateClientSnafu)
}

/// Wraps a [`kube::Client`] with the request parameters and the password
/// hasher shared by all reconciles.
#[derive(Clone)]
pub struct Client {
    client: kube::Client,
    post_params: PostParams,
    patch_params: PatchParams,
    delete_params: DeleteParams,
    timeout: Duration,
    hasher: PasswordHasher,
    dry_run: bool,
}

impl Client {
    pub fn new(client: kube::Client, timeout: Duration, hasher: PasswordHasher, dry_run: bool) -> Self {
        Self {
            client,
            post_params: PostParams {
                dry_run,
                field_manager: Some(FIELD_MANAGER.to_owned()),
            },
            patch_params: PatchParams {
                dry_run,
                field_manager: Some(FIELD_MANAGER.to_owned()),
                ..PatchParams::default()
            },
            delete_params: DeleteParams {
                dry_run,
                ..DeleteParams::default()
            },
            timeout,
            hasher,
            dry_run,
        }
    }

    /// Returns a [`kube::Client`] that can be freely used.
    pub fn as_kube_client(&self) -> kube::Client {
        self.client.clone()
    }

    pub fn is_dry_run(&self) -> bool {
        self.dry_run
    }

    /// Bounds `future` by the configured API timeout.
    async fn timed<T>(&self, what: impl FnOnce() -> String, future: impl Future<Output = T>) -> Result<T> {
        tokio::time::timeout(self.timeout, future)
            .await
            .with_context(|_| TimeoutSnafu {
                what: what(),
                timeout: self.timeout,
            })
    }

    /// Fetches the class of an instance. Classes are not cached, so changes
    /// apply to the next reconcile.
    pub async fn get_class(&self, kind: &Kind, name: &str) -> Result<Class> {
        let class_kind = kind.class_kind();
        let api: Api<DynamicObject> = Api::all_with(self.as_kube_client(), &kind.class_api_resource());

        let object = self
            .timed(|| format!("getting {class_kind} {name:?}"), api.get_opt(name))
            .await?
            .with_context(|_| GetClassSnafu {
                kind: class_kind.clone(),
                name,
            })?
            .with_context(|| ClassNotFoundSnafu {
                kind: class_kind.clone(),
                name,
            })?;

        Class::try_from(&object).context(ParseClassSnafu {
            kind: class_kind,
            name,
        })
    }

    /// Creates `manifest` unless it already exists.
    pub async fn apply(&self, manifest: &Manifest) -> Result<Applied> {
        let namespace = manifest.namespace().with_context(|| MissingNamespaceSnafu {
            manifest: manifest.to_string(),
        })?;

        let applied = match manifest {
            Manifest::Service(service) => {
                self.create(Api::<Service>::namespaced(self.as_kube_client(), namespace), service, manifest)
                    .await?
            }
            Manifest::StatefulSet(stateful_set) => {
                self.create(
                    Api::<StatefulSet>::namespaced(self.as_kube_client(), namespace),
                    stateful_set,
                    manifest,
                )
                .await?
            }
            Manifest::Custom(object) => {
                let resource_type = registry::lookup_object(object).with_context(|| {
                    let types = object.types.clone().unwrap_or_default();
                    UnregisteredKindSnafu {
                        api_version: types.api_version,
                        kind: types.kind,
                    }
                })?;
                let api = Api::<DynamicObject>::namespaced_with(
                    self.as_kube_client(),
                    namespace,
                    &resource_type.api_resource(),
                );
                self.create(api, object, manifest).await?
            }
            Manifest::Secret(secret) => self.apply_secret(namespace, secret, manifest).await?,
        };

        match applied {
            Applied::Created => info!(%manifest, "created"),
            Applied::AlreadyExists => info!(%manifest, "already exists"),
            Applied::Skipped => info!(%manifest, "skipped"),
        }
        Ok(applied)
    }

    async fn create<K>(&self, api: Api<K>, object: &K, manifest: &Manifest) -> Result<Applied>
    where
        K: Clone + Debug + DeserializeOwned + Serialize,
    {
        let created = self
            .timed(|| format!("creating {manifest}"), api.create(&self.post_params, object))
            .await?;

        match created {
            Ok(_) => Ok(Applied::Created),
            Err(kube::Error::Api(response)) if response.code == 409 => Ok(Applied::AlreadyExists),
            Err(source) => Err(source).context(CreateObjectSnafu {
                manifest: manifest.to_string(),
            }),
        }
    }

    /// Secrets are looked up before anything is generated, an existing secret
    /// is never regenerated.
    async fn apply_secret(
        &self,
        namespace: &str,
        secret: &SecretManifest,
        manifest: &Manifest,
    ) -> Result<Applied> {
        let name = secret.name().unwrap_or_default();
        if self.get_secret(namespace, name).await?.is_some() {
            return Ok(Applied::AlreadyExists);
        }

        let plaintext = match &secret.source {
            SecretSource::Generate { size } => generate_plaintext(*size),
            SecretSource::FromSecret {
                namespace: source_namespace,
                name: source_name,
                key,
            } => match self.get_secret(source_namespace, source_name).await? {
                Some(source) => read_key(&source, key).context(MaterializeSecretSnafu {
                    manifest: manifest.to_string(),
                })?,
                // Not created because of the dry run
                None if self.dry_run => return Ok(Applied::Skipped),
                None => {
                    return MissingSourceSecretSnafu {
                        namespace: source_namespace,
                        name: source_name,
                    }
                    .fail();
                }
            },
        };

        let materialized = secret
            .materialize(&plaintext, &self.hasher)
            .context(MaterializeSecretSnafu {
                manifest: manifest.to_string(),
            })?;
        self.create(
            Api::<Secret>::namespaced(self.as_kube_client(), namespace),
            &materialized,
            manifest,
        )
        .await
    }

    async fn get_secret(&self, namespace: &str, name: &str) -> Result<Option<Secret>> {
        let api: Api<Secret> = Api::namespaced(self.as_kube_client(), namespace);
        self.timed(|| format!("reading secret {namespace}/{name}"), api.get_opt(name))
            .await?
            .context(ReadSecretSnafu { namespace, name })
    }

    /// Merge patches the status subresource of an instance.
    pub async fn patch_status(
        &self,
        resource: &ApiResource,
        namespace: &str,
        name: &str,
        patch: &serde_json::Value,
    ) -> Result<()> {
        let api: Api<DynamicObject> = Api::namespaced_with(self.as_kube_client(), namespace, resource);
        self.timed(
            || format!("patching status of {namespace}/{name}"),
            api.patch_status(name, &self.patch_params, &Patch::Merge(patch)),
        )
        .await?
        .context(PatchStatusSnafu { name })?;
        Ok(())
    }

    /// Deletes a secret, a missing secret is not an error.
    pub async fn delete_secret(&self, namespace: &str, name: &str) -> Result<()> {
        let api: Api<Secret> = Api::namespaced(self.as_kube_client(), namespace);
        self.delete(&api, "Secret", namespace, name).await
    }

    /// Deletes the children matching `selector` in `namespace`: Services,
    /// StatefulSets, Secrets and the given custom resources. Volume claims are
    /// kept.
    pub async fn delete_children(
        &self,
        namespace: &str,
        selector: &LabelSelector,
        custom_resources: &[&CustomResourceType],
    ) -> Result<()> {
        let query = selector.to_query_string().context(CleanupSelectorSnafu)?;
        if self.dry_run {
            info!(namespace, selector = %query, "dry run, not deleting children");
            return Ok(());
        }
        let list_params = ListParams::default().labels(&query);

        self.delete_matching(
            &Api::<Service>::namespaced(self.as_kube_client(), namespace),
            "Service",
            namespace,
            &list_params,
        )
        .await?;
        self.delete_matching(
            &Api::<StatefulSet>::namespaced(self.as_kube_client(), namespace),
            "StatefulSet",
            namespace,
            &list_params,
        )
        .await?;
        self.delete_matching(
            &Api::<Secret>::namespaced(self.as_kube_client(), namespace),
            "Secret",
            namespace,
            &list_params,
        )
        .await?;

        for resource_type in custom_resources {
            let api = Api::<DynamicObject>::namespaced_with(
                self.as_kube_client(),
                namespace,
                &resource_type.api_resource(),
            );
            self.delete_matching(&api, resource_type.kind, namespace, &list_params)
                .await?;
        }

        Ok(())
    }

    async fn delete_matching<K>(
        &self,
        api: &Api<K>,
        kind: &str,
        namespace: &str,
        list_params: &ListParams,
    ) -> Result<()>
    where
        K: Resource + Clone + Debug + DeserializeOwned,
    {
        let objects = self
            .timed(|| format!("listing {kind} in {namespace}"), api.list(list_params))
            .await?
            .context(ListObjectsSnafu { kind, namespace })?;

        for object in objects {
            self.delete(api, kind, namespace, &object.name_any()).await?;
        }
        Ok(())
    }

    async fn delete<K>(&self, api: &Api<K>, kind: &str, namespace: &str, name: &str) -> Result<()>
    where
        K: Clone + Debug + DeserializeOwned,
    {
        let deleted = self
            .timed(
                || format!("deleting {kind} {namespace}/{name}"),
                api.delete(name, &self.delete_params),
            )
            .await?;

        match deleted {
            Ok(_) => {
                info!(kind, namespace, name, "deleted");
                Ok(())
            }
            Err(kube::Error::Api(response)) if response.code == 404 => Ok(()),
            Err(source) => Err(source).context(DeleteObjectSnafu {
                kind,
                namespace,
                name,
            }),
        }
    }
}
