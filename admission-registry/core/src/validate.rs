//! Container image whitelist policy for pods.

use crate::{Decision, Error, Whitelist};
use k8s_openapi::api::core::v1::Pod;
use serde_json::Value;
use tracing::info;

/// Admits a pod only if every container image comes from a whitelisted
/// registry.
///
/// Containers are checked in declaration order and evaluation stops at the
/// first image that matches no prefix.
pub fn validate(whitelist: &Whitelist, object: Option<Value>) -> Decision {
    let pod = match parse_pod(object) {
        Ok(pod) => pod,
        Err(error) => {
            info!(%error, "Can't decode pod");
            return error.into();
        }
    };

    let containers = pod.spec.map(|spec| spec.containers).unwrap_or_default();
    let images = containers
        .iter()
        .map(|c| c.image.as_deref().unwrap_or_default());
    if let Some(image) = first_untrusted(whitelist, images) {
        return Decision::deny(
            Decision::FORBIDDEN,
            format!(
                "{image} image comes from an untrusted registry! Only images from {whitelist} are allowed."
            ),
        );
    }

    Decision::allow().with_status(Decision::OK, "")
}

/// Returns the first image that is not covered by the whitelist.
pub fn first_untrusted<'i>(
    whitelist: &Whitelist,
    images: impl IntoIterator<Item = &'i str>,
) -> Option<&'i str> {
    images.into_iter().find(|image| !whitelist.allows(image))
}

fn parse_pod(object: Option<Value>) -> Result<Pod, Error> {
    let object = object.ok_or(Error::MissingObject)?;
    Ok(serde_json::from_value(object)?)
}
