//! The reconcile loop shared by all kinds.
//!
//! Every kind runs the same [`Controller`] over its instance objects. A
//! reconcile re-fetches the class, regenerates the children and creates those
//! that are missing, then records the outcome in the `Ready` condition.
use std::{
    collections::HashMap,
    sync::{Arc, Mutex},
    time::Duration,
};

use futures::{StreamExt, future};
use k8s_openapi::chrono::Utc;
use kube::{
    Api, ResourceExt,
    core::DynamicObject,
    runtime::{
        Controller,
        controller::{self, Action},
        finalizer::{self, Event as FinalizerEvent, finalizer},
        watcher,
    },
};
use snafu::{ResultExt, Snafu};
use strum::{EnumDiscriminants, IntoStaticStr};
use tracing::{debug, info, warn};

use crate::{
    binding::{self, Binding},
    client::{self, Client},
    kind::Kind,
    logging::controller::{ReconcilerError, report_controller_reconciled},
    manifest::{self, Manifest},
    namespace::WatchNamespace,
    resources::{self, Class, Instance},
    status::{InstanceStatus, Phase},
};

/// Resync interval of healthy instances.
pub const RESYNC_INTERVAL: Duration = Duration::from_secs(300);

pub const BACKOFF_BASE: Duration = Duration::from_secs(5);
pub const BACKOFF_CAP: Duration = Duration::from_secs(300);

#[derive(Debug, Snafu, EnumDiscriminants)]
#[strum_discriminants(derive(IntoStaticStr))]
pub enum Error {
    #[snafu(display("failed to parse {kind} object"))]
    ParseInstance {
        source: resources::Error,
        kind: &'static str,
    },

    #[snafu(display("failed to resolve class"))]
    ResolveClass { source: client::Error },

    #[snafu(display("failed to bind instance to its class"))]
    Bind { source: binding::Error },

    #[snafu(display("failed to generate children"))]
    GenerateChildren { source: manifest::Error },

    #[snafu(display("failed to apply {manifest}"))]
    ApplyChild {
        source: client::Error,
        manifest: String,
    },

    #[snafu(display("failed to update status to {phase}"))]
    UpdateStatus { source: client::Error, phase: Phase },

    #[snafu(display("failed to clean up children"))]
    Cleanup { source: client::Error },

    #[snafu(display("failed to run finalizer"))]
    Finalizer {
        #[snafu(source(from(finalizer::Error<Error>, Box::new)))]
        source: Box<finalizer::Error<Error>>,
    },
}

impl ReconcilerError for Error {
    fn category(&self) -> &'static str {
        match self {
            Self::ParseInstance { .. } => "InvalidInstanceSpec",
            Self::ResolveClass { source }
            | Self::ApplyChild { source, .. }
            | Self::UpdateStatus { source, .. }
            | Self::Cleanup { source } => source.category(),
            Self::Bind { source } => source.category(),
            Self::GenerateChildren { source } => source.into(),
            Self::Finalizer { source } => match source.as_ref() {
                finalizer::Error::ApplyFailed(error) | finalizer::Error::CleanupFailed(error) => {
                    error.category()
                }
                _ => ErrorDiscriminants::Finalizer.into(),
            },
        }
    }
}

impl Error {
    /// The phase an instance is left in after this error. A missing class is
    /// expected to show up eventually.
    fn phase(&self) -> Phase {
        match self.category() {
            "ClassNotFound" => Phase::Pending,
            _ => Phase::Failed,
        }
    }
}

/// Consecutive reconcile failures per object.
#[derive(Debug, Default)]
pub struct Backoff {
    failures: Mutex<HashMap<String, u32>>,
}

impl Backoff {
    /// Records one more failure of `key` and returns the delay before the
    /// next attempt.
    pub fn record_failure(&self, key: &str) -> Duration {
        let failures = match self.failures.lock() {
            Ok(mut failures) => {
                let count = failures.entry(key.to_owned()).or_default();
                *count = count.saturating_add(1);
                *count
            }
            // Poisoned by a panicking reconcile, retry at the base delay
            Err(_) => 1,
        };
        backoff_delay(failures)
    }

    pub fn reset(&self, key: &str) {
        if let Ok(mut failures) = self.failures.lock() {
            failures.remove(key);
        }
    }
}

/// State shared by all reconciles of one kind.
pub struct Context {
    client: Client,
    kind: &'static Kind,
    backoff: Backoff,
}

impl Context {
    pub fn new(client: Client, kind: &'static Kind) -> Self {
        Self {
            client,
            kind,
            backoff: Backoff::default(),
        }
    }
}

/// `5s * 2^(failures - 1)`, capped at five minutes.
pub fn backoff_delay(failures: u32) -> Duration {
    let exponent = failures.saturating_sub(1).min(16);
    BACKOFF_BASE
        .saturating_mul(1_u32 << exponent)
        .min(BACKOFF_CAP)
}

fn object_key(object: &DynamicObject) -> String {
    format!(
        "{}/{}",
        object.namespace().unwrap_or_default(),
        object.name_any()
    )
}

/// Runs the controller of `kind` until the process receives a shutdown
/// signal.
pub async fn run(client: Client, kind: &'static Kind, watch_namespace: &WatchNamespace, concurrency: u16) {
    let resource = kind.api_resource();
    let api = watch_namespace.get_api(&client, &resource);
    let controller_name = format!("{}.{}", kind.plural_name(), crate::kind::GROUP);

    info!(
        controller.name = %controller_name,
        ?watch_namespace,
        concurrency,
        dry_run = client.is_dry_run(),
        "starting controller"
    );

    Controller::new_with(api, watcher::Config::default(), resource)
        .with_config(controller::Config::default().concurrency(concurrency))
        .shutdown_on_signal()
        .run(reconcile, error_policy, Arc::new(Context::new(client, kind)))
        .for_each(|result| {
            report_controller_reconciled(&controller_name, &result);
            future::ready(())
        })
        .await;
}

async fn reconcile(object: Arc<DynamicObject>, ctx: Arc<Context>) -> Result<Action, Error> {
    let key = object_key(&object);

    let action = if ctx.client.is_dry_run() {
        // Adding the finalizer would modify the object
        if object.metadata.deletion_timestamp.is_some() {
            cleanup(&object, &ctx).await?
        } else {
            apply(&object, &ctx).await?
        }
    } else {
        let api: Api<DynamicObject> = Api::namespaced_with(
            ctx.client.as_kube_client(),
            &object.namespace().unwrap_or_default(),
            &ctx.kind.api_resource(),
        );
        let ctx = &ctx;
        finalizer(&api, &ctx.kind.finalizer(), object, |event| async move {
            match event {
                FinalizerEvent::Apply(object) => apply(&object, ctx).await,
                FinalizerEvent::Cleanup(object) => cleanup(&object, ctx).await,
            }
        })
        .await
        .context(FinalizerSnafu)?
    };

    ctx.backoff.reset(&key);
    Ok(action)
}

fn error_policy(object: Arc<DynamicObject>, error: &Error, ctx: Arc<Context>) -> Action {
    let delay = ctx.backoff.record_failure(&object_key(&object));
    debug!(
        object = %object_key(&object),
        category = error.category(),
        ?delay,
        "requeueing after error"
    );
    Action::requeue(delay)
}

fn parse(object: &DynamicObject, kind: &Kind) -> Result<Instance, Error> {
    Instance::try_from(object).context(ParseInstanceSnafu {
        kind: kind.singular,
    })
}

async fn apply(object: &DynamicObject, ctx: &Context) -> Result<Action, Error> {
    let instance = parse(object, ctx.kind)?;
    let mut status = InstanceStatus::of(object);

    if Phase::announces_reconcile(status.phase()) {
        status = update_phase(ctx, &instance, &status, Phase::Reconciling, "Reconciling", "").await?;
    }

    match apply_children(&instance, ctx).await {
        Ok(count) => {
            update_phase(
                ctx,
                &instance,
                &status,
                Phase::Ready,
                "Reconciled",
                format!("{count} children applied"),
            )
            .await?;
            Ok(Action::requeue(RESYNC_INTERVAL))
        }
        Err(error) => {
            let reported = update_phase(
                ctx,
                &instance,
                &status,
                error.phase(),
                error.category(),
                error.to_string(),
            )
            .await;
            if let Err(status_error) = reported {
                warn!(
                    error = &status_error as &dyn std::error::Error,
                    "failed to report reconcile error in status"
                );
            }
            Err(error)
        }
    }
}

/// Creates the missing children of `instance` and returns how many children
/// it has.
async fn apply_children(instance: &Instance, ctx: &Context) -> Result<usize, Error> {
    let class = resolve_class(instance, ctx).await?;
    let binding = Binding::new(ctx.kind, instance, class.as_ref()).context(BindSnafu)?;
    let manifests = ctx.kind.generate(&binding).context(GenerateChildrenSnafu)?;

    for manifest in &manifests {
        ctx.client
            .apply(manifest)
            .await
            .with_context(|_| ApplyChildSnafu {
                manifest: manifest.to_string(),
            })?;
    }
    Ok(manifests.len())
}

async fn resolve_class(instance: &Instance, ctx: &Context) -> Result<Option<Class>, Error> {
    match &instance.spec.class {
        Some(name) if ctx.kind.requires_class() => ctx
            .client
            .get_class(ctx.kind, name)
            .await
            .map(Some)
            .context(ResolveClassSnafu),
        _ => Ok(None),
    }
}

async fn cleanup(object: &DynamicObject, ctx: &Context) -> Result<Action, Error> {
    let instance = parse(object, ctx.kind)?;
    let status = InstanceStatus::of(object);
    update_phase(ctx, &instance, &status, Phase::Terminating, "Deleting", "").await?;

    let class = match resolve_class(&instance, ctx).await {
        Ok(class) => class,
        Err(Error::ResolveClass {
            source: client::Error::ClassNotFound { .. },
        }) => {
            info!(
                instance = %instance.name,
                namespace = %instance.namespace,
                "class is gone, leaving children to garbage collection"
            );
            return Ok(Action::await_change());
        }
        Err(error) => return Err(error),
    };
    let binding = Binding::new(ctx.kind, &instance, class.as_ref()).context(BindSnafu)?;

    let manifests = ctx.kind.generate(&binding).unwrap_or_else(|error| {
        warn!(
            error = &error as &dyn std::error::Error,
            "failed to generate children, only cleaning up by label"
        );
        Vec::new()
    });
    for secret in consumer_secrets(&manifests, &instance.namespace) {
        if ctx.client.is_dry_run() {
            info!(namespace = %instance.namespace, name = secret, "dry run, not deleting secret");
            continue;
        }
        ctx.client
            .delete_secret(&instance.namespace, secret)
            .await
            .context(CleanupSnafu)?;
    }

    if binding.identity.requires_explicit_cleanup() {
        ctx.client
            .delete_children(
                binding.target_namespace(),
                &binding.labels.match_labels(),
                ctx.kind.backend.custom_resource_types(),
            )
            .await
            .context(CleanupSnafu)?;
    }

    Ok(Action::await_change())
}

/// Names of the secrets handed to the consumer in `namespace`. Children of
/// the target carry the instance labels, the consumer secrets do not.
fn consumer_secrets<'a>(manifests: &'a [Manifest], namespace: &'a str) -> impl Iterator<Item = &'a str> {
    manifests.iter().filter_map(move |manifest| match manifest {
        Manifest::Secret(secret)
            if secret.metadata.namespace.as_deref() == Some(namespace)
                && secret.metadata.labels.is_none() =>
        {
            secret.name()
        }
        _ => None,
    })
}

/// Patches the status if `phase` or the observed generation differ from the
/// current status and returns the resulting status.
async fn update_phase(
    ctx: &Context,
    instance: &Instance,
    status: &InstanceStatus,
    phase: Phase,
    reason: &str,
    message: impl Into<String>,
) -> Result<InstanceStatus, Error> {
    let Some(next) = status.transition(phase, reason, message, instance.generation, Utc::now()) else {
        return Ok(status.clone());
    };

    ctx.client
        .patch_status(
            &ctx.kind.api_resource(),
            &instance.namespace,
            &instance.name,
            &next.patch(),
        )
        .await
        .context(UpdateStatusSnafu { phase })?;
    info!(
        instance = %instance.name,
        namespace = %instance.namespace,
        %phase,
        reason,
        "status updated"
    );
    Ok(next)
}
