use k8s_openapi::apimachinery::pkg::apis::meta::v1::{ObjectMeta, OwnerReference};
use snafu::{OptionExt, Snafu};

use crate::labels::Labels;

#[derive(Debug, PartialEq, Eq, Snafu)]
pub enum Error {
    #[snafu(display("missing required owner reference field {key:?}"))]
    MissingObjectKey { key: &'static str },
}

/// A builder to build [`ObjectMeta`] objects.
///
/// Only a single `OwnerReference` is supported, every generated child has
/// exactly one owner.
#[derive(Clone, Debug, Default)]
pub struct ObjectMetaBuilder {
    name: Option<String>,
    namespace: Option<String>,
    ownerreference: Option<OwnerReference>,
    labels: Option<Labels>,
}

impl ObjectMetaBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn name(&mut self, name: impl Into<String>) -> &mut Self {
        self.name = Some(name.into());
        self
    }

    pub fn namespace(&mut self, namespace: impl Into<String>) -> &mut Self {
        self.namespace = Some(namespace.into());
        self
    }

    pub fn ownerreference(&mut self, ownerreference: OwnerReference) -> &mut Self {
        self.ownerreference = Some(ownerreference);
        self
    }

    /// This will replace all existing labels
    pub fn labels(&mut self, labels: Labels) -> &mut Self {
        self.labels = Some(labels);
        self
    }

    pub fn build(&self) -> ObjectMeta {
        ObjectMeta {
            name: self.name.clone(),
            namespace: self.namespace.clone(),
            owner_references: self
                .ownerreference
                .as_ref()
                .map(|ownerreference| vec![ownerreference.clone()]),
            labels: self.labels.as_ref().map(Into::into),
            ..ObjectMeta::default()
        }
    }
}

/// A builder to build [`OwnerReference`] objects.
#[derive(Clone, Debug, Default)]
pub struct OwnerReferenceBuilder {
    api_version: Option<String>,
    block_owner_deletion: Option<bool>,
    controller: Option<bool>,
    kind: Option<String>,
    name: Option<String>,
    uid: Option<String>,
}

impl OwnerReferenceBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn api_version(&mut self, api_version: impl Into<String>) -> &mut Self {
        self.api_version = Some(api_version.into());
        self
    }

    pub fn block_owner_deletion(&mut self, block_owner_deletion: bool) -> &mut Self {
        self.block_owner_deletion = Some(block_owner_deletion);
        self
    }

    pub fn controller(&mut self, controller: bool) -> &mut Self {
        self.controller = Some(controller);
        self
    }

    pub fn kind(&mut self, kind: impl Into<String>) -> &mut Self {
        self.kind = Some(kind.into());
        self
    }

    pub fn name(&mut self, name: impl Into<String>) -> &mut Self {
        self.name = Some(name.into());
        self
    }

    pub fn uid_opt(&mut self, uid: impl Into<Option<String>>) -> &mut Self {
        self.uid = uid.into();
        self
    }

    pub fn build(&self) -> Result<OwnerReference, Error> {
        Ok(OwnerReference {
            api_version: self
                .api_version
                .clone()
                .context(MissingObjectKeySnafu { key: "api_version" })?,
            block_owner_deletion: self.block_owner_deletion,
            controller: self.controller,
            kind: self
                .kind
                .clone()
                .context(MissingObjectKeySnafu { key: "kind" })?,
            name: self
                .name
                .clone()
                .context(MissingObjectKeySnafu { key: "name" })?,
            uid: self
                .uid
                .clone()
                .context(MissingObjectKeySnafu { key: "uid" })?,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn objectmeta_builder() {
        let ownerreference = OwnerReferenceBuilder::new()
            .api_version("codemowers.io/v1alpha1")
            .kind("Redis")
            .name("cache1")
            .uid_opt("uid".to_owned())
            .block_owner_deletion(false)
            .controller(true)
            .build()
            .unwrap();

        let meta = ObjectMetaBuilder::new()
            .name("redis-cluster-cache1")
            .namespace("app")
            .ownerreference(ownerreference)
            .labels(Labels::common("redis", "cache1").unwrap())
            .build();

        assert_eq!(meta.name.as_deref(), Some("redis-cluster-cache1"));
        assert_eq!(meta.namespace.as_deref(), Some("app"));
        assert_eq!(meta.labels.as_ref().unwrap().len(), 2);

        let owner = &meta.owner_references.unwrap()[0];
        assert_eq!(owner.uid, "uid");
        assert_eq!(owner.block_owner_deletion, Some(false));
        assert_eq!(owner.controller, Some(true));
    }

    #[test]
    fn ownerreference_requires_uid() {
        let err = OwnerReferenceBuilder::new()
            .api_version("codemowers.io/v1alpha1")
            .kind("Redis")
            .name("cache1")
            .build()
            .unwrap_err();

        assert_eq!(err, Error::MissingObjectKey { key: "uid" });
    }
}
