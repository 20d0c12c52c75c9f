//! Annotation mutation policy for deployments and services.

use crate::{
    annotations_patch, Decision, Error, MUTATE_ANNOTATION, STATUS_ANNOTATION, STATUS_MUTATED,
};
use k8s_openapi::{
    api::{apps::v1::Deployment, core::v1::Service},
    apimachinery::pkg::apis::meta::v1::ObjectMeta,
    Resource,
};
use serde_json::Value;
use std::collections::BTreeMap;
use tracing::{debug, info};

/// The kinds of object the mutator knows how to patch.
#[derive(Clone, Debug, PartialEq)]
pub enum Patchable {
    Deployment(Box<Deployment>),
    Service(Box<Service>),
}

/// Marks an object as mutated unless it opted out or already carries the
/// mark.
pub fn mutate(group: &str, kind: &str, object: Option<Value>) -> Decision {
    let target = match Patchable::parse(group, kind, object) {
        Ok(target) => target,
        Err(error) => {
            info!(%error, %kind, "Can't mutate object");
            return error.into();
        }
    };

    let meta = target.metadata();
    let annotations = meta.annotations.as_ref();
    let required = mutation_required(annotations);
    info!(
        ns = meta.namespace.as_deref().unwrap_or_default(),
        name = meta.name.as_deref().unwrap_or_default(),
        %required,
        "Mutation policy"
    );
    if !required {
        return Decision::allow();
    }

    let added = [(STATUS_ANNOTATION.to_string(), STATUS_MUTATED.to_string())]
        .into_iter()
        .collect();
    let patch = annotations_patch(annotations, &added);
    debug!(?patch);
    Decision::patch(patch)
}

/// Mutation is opt-out: it is required unless the object has already been
/// mutated or its mutate annotation is one of `n`, `no`, `false` or `off`.
pub fn mutation_required(annotations: Option<&BTreeMap<String, String>>) -> bool {
    let get = |key: &str| {
        annotations
            .and_then(|a| a.get(key))
            .map(|v| v.to_ascii_lowercase())
            .unwrap_or_default()
    };

    if get(STATUS_ANNOTATION) == STATUS_MUTATED {
        return false;
    }

    !matches!(get(MUTATE_ANNOTATION).as_str(), "n" | "no" | "false" | "off")
}

// === impl Patchable ===

impl Patchable {
    /// Decodes `object` according to the request's group and kind.
    pub fn parse(group: &str, kind: &str, object: Option<Value>) -> Result<Self, Error> {
        if is_kind::<Deployment>(group, kind) {
            let deployment = serde_json::from_value(object.ok_or(Error::MissingObject)?)?;
            return Ok(Self::Deployment(Box::new(deployment)));
        }

        if is_kind::<Service>(group, kind) {
            let service = serde_json::from_value(object.ok_or(Error::MissingObject)?)?;
            return Ok(Self::Service(Box::new(service)));
        }

        Err(Error::UnsupportedKind(kind.to_string()))
    }

    pub fn metadata(&self) -> &ObjectMeta {
        match self {
            Self::Deployment(d) => &d.metadata,
            Self::Service(s) => &s.metadata,
        }
    }
}

fn is_kind<T: Resource>(group: &str, kind: &str) -> bool {
    group.eq_ignore_ascii_case(T::GROUP) && kind.eq_ignore_ascii_case(T::KIND)
}
