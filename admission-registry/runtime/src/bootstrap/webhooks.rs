use anyhow::{Context, Result};
use k8s_openapi::{
    api::admissionregistration::v1::{
        MutatingWebhook, MutatingWebhookConfiguration, RuleWithOperations, ServiceReference,
        ValidatingWebhook, ValidatingWebhookConfiguration, WebhookClientConfig,
    },
    apimachinery::pkg::apis::meta::v1::ObjectMeta,
    ByteString,
};
use kube::{
    api::{Patch, PatchParams},
    Api, Client, Resource, ResourceExt,
};
use serde::{de::DeserializeOwned, Serialize};
use std::fmt;
use tracing::info;

pub const VALIDATING_WEBHOOK: &str = "io.ydzs.admission-registry";
pub const MUTATING_WEBHOOK: &str = "io.ydzs.admission-registry-mutate";

const FIELD_MANAGER: &str = "admission-registry";

/// Where the API server reaches a webhook and how it authenticates it.
#[derive(Clone, Debug)]
pub struct Endpoint<'a> {
    pub service: &'a str,
    pub namespace: &'a str,
    pub path: &'a str,
    pub ca_pem: &'a str,
}

/// Sends pod creations to the image whitelist.
pub fn validating(name: &str, endpoint: &Endpoint<'_>) -> ValidatingWebhookConfiguration {
    ValidatingWebhookConfiguration {
        metadata: ObjectMeta {
            name: Some(name.to_string()),
            ..Default::default()
        },
        webhooks: Some(vec![ValidatingWebhook {
            name: VALIDATING_WEBHOOK.to_string(),
            client_config: endpoint.client_config(),
            rules: Some(vec![create_rule(&[""], &["pods"])]),
            admission_review_versions: vec!["v1".to_string()],
            side_effects: "None".to_string(),
            ..Default::default()
        }]),
    }
}

/// Sends deployment and service creations to the annotation mutator.
pub fn mutating(name: &str, endpoint: &Endpoint<'_>) -> MutatingWebhookConfiguration {
    MutatingWebhookConfiguration {
        metadata: ObjectMeta {
            name: Some(name.to_string()),
            ..Default::default()
        },
        webhooks: Some(vec![MutatingWebhook {
            name: MUTATING_WEBHOOK.to_string(),
            client_config: endpoint.client_config(),
            rules: Some(vec![create_rule(
                &["apps", ""],
                &["deployments", "services"],
            )]),
            admission_review_versions: vec!["v1".to_string()],
            side_effects: "None".to_string(),
            ..Default::default()
        }]),
    }
}

/// Creates or updates a cluster-scoped webhook configuration with a forced
/// server-side apply.
pub async fn apply<K>(client: Client, config: K) -> Result<K>
where
    K: Resource<DynamicType = ()> + Clone + fmt::Debug + DeserializeOwned + Serialize,
{
    let name = config.name_any();
    let kind = K::kind(&());
    let api = Api::<K>::all(client);
    let applied = api
        .patch(
            &name,
            &PatchParams::apply(FIELD_MANAGER).force(),
            &Patch::Apply(config),
        )
        .await
        .with_context(|| format!("failed to apply {kind} {name}"))?;
    info!(%kind, %name, "Applied webhook configuration");
    Ok(applied)
}

fn create_rule(groups: &[&str], resources: &[&str]) -> RuleWithOperations {
    let strings = |s: &[&str]| -> Vec<String> { s.iter().map(|s| s.to_string()).collect() };
    RuleWithOperations {
        api_groups: Some(strings(groups)),
        api_versions: Some(vec!["v1".to_string()]),
        operations: Some(vec!["CREATE".to_string()]),
        resources: Some(strings(resources)),
        ..Default::default()
    }
}

// === impl Endpoint ===

impl Endpoint<'_> {
    fn client_config(&self) -> WebhookClientConfig {
        WebhookClientConfig {
            ca_bundle: Some(ByteString(self.ca_pem.as_bytes().to_vec())),
            service: Some(ServiceReference {
                name: self.service.to_string(),
                namespace: self.namespace.to_string(),
                path: Some(self.path.to_string()),
                ..Default::default()
            }),
            url: None,
        }
    }
}
