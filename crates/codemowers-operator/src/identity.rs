//! Derivation of where the children of an instance live and who owns them.
use crate::resources::ClassSpec;

/// The object whose deletion cascades to the generated children.
#[derive(Clone, Copy, Debug, PartialEq, Eq, strum::Display)]
pub enum Owner {
    Instance,
    Class,
}

/// The namespace, name and owner of the backend an instance maps onto.
///
/// This is a pure function of the origin namespace and name plus the class
/// spec. It is recomputed on every reconcile and never persisted, because
/// lookups of existing children rely on it being stable.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct TargetIdentity {
    pub namespace: String,
    pub name: String,
    pub owner: Owner,

    /// Set when the name comes from `targetCluster`, so several instances
    /// fold onto one backend.
    pub shared: bool,
}

impl TargetIdentity {
    /// Resolves the identity of an instance.
    ///
    /// `shareable` is true for kinds which honor the `targetCluster` class
    /// field. Kinds without a class pass `None`.
    pub fn resolve(
        origin_namespace: &str,
        origin_name: &str,
        class: Option<&ClassSpec>,
        shareable: bool,
    ) -> Self {
        let target_namespace = class.and_then(|class| class.target_namespace.as_deref());
        let target_cluster = class
            .and_then(|class| class.target_cluster.as_deref())
            .filter(|_| shareable);

        let namespace = target_namespace.unwrap_or(origin_namespace).to_owned();
        let name = match (target_cluster, target_namespace) {
            (Some(cluster), _) => cluster.to_owned(),
            // Hoarding instances of several namespaces into one target
            // namespace, prefix to avoid collisions
            (None, Some(_)) => format!("{origin_namespace}-{origin_name}"),
            (None, None) => origin_name.to_owned(),
        };

        let owner = if namespace == origin_namespace {
            Owner::Instance
        } else {
            Owner::Class
        };

        Self {
            namespace,
            name,
            owner,
            shared: target_cluster.is_some(),
        }
    }

    /// Children of hoarded instances are owned by the class, so they have to
    /// be removed explicitly when the instance goes away. Shared clusters are
    /// never removed on behalf of one instance.
    pub fn requires_explicit_cleanup(&self) -> bool {
        self.owner == Owner::Class && !self.shared
    }
}
