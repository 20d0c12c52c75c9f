//! One-shot setup for the admission webhooks: issues a serving certificate
//! and registers the webhook configurations that point at it.

mod tls;
mod webhooks;

pub use self::{
    tls::{dns_names, issue, Bundle},
    webhooks::{mutating, validating, Endpoint, MUTATING_WEBHOOK, VALIDATING_WEBHOOK},
};
use crate::admission::{MUTATE_PATH, VALIDATE_PATH};
use anyhow::Result;
use clap::Parser;
use std::path::PathBuf;
use tracing::info;

#[derive(Debug, Parser)]
#[clap(
    name = "admission-registry-bootstrap",
    about = "Issues webhook certificates and registers admission webhooks"
)]
pub struct Args {
    #[clap(
        long,
        default_value = "admission_registry=info,warn",
        env = "ADMISSION_REGISTRY_LOG"
    )]
    log_level: kubert::LogFilter,

    #[clap(long, default_value = "plain")]
    log_format: kubert::LogFormat,

    #[clap(flatten)]
    client: kubert::ClientArgs,

    /// Namespace of the webhook service.
    #[clap(long, env = "WEBHOOK_NAMESPACE", default_value = "default")]
    webhook_namespace: String,

    /// Name of the webhook service.
    #[clap(long, env = "WEBHOOK_SERVICE", default_value = "admission-registry")]
    webhook_service: String,

    /// Name of the ValidatingWebhookConfiguration. Skipped when empty.
    #[clap(long, env = "VALIDATE_CONFIG", default_value = "")]
    validate_config: String,

    /// Name of the MutatingWebhookConfiguration. Skipped when empty.
    #[clap(long, env = "MUTATE_CONFIG", default_value = "")]
    mutate_config: String,

    #[clap(long, env = "VALIDATE_PATH", default_value = VALIDATE_PATH)]
    validate_path: String,

    #[clap(long, env = "MUTATE_PATH", default_value = MUTATE_PATH)]
    mutate_path: String,

    /// Directory that receives `tls.crt` and `tls.key`.
    #[clap(long, default_value = "/etc/webhook/certs")]
    cert_dir: PathBuf,
}

impl Args {
    #[inline]
    pub async fn parse_and_run() -> Result<()> {
        Self::parse().run().await
    }

    pub async fn run(self) -> Result<()> {
        let Self {
            log_level,
            log_format,
            client,
            webhook_namespace,
            webhook_service,
            validate_config,
            mutate_config,
            validate_path,
            mutate_path,
            cert_dir,
        } = self;

        let runtime = kubert::Runtime::builder()
            .with_log(log_level, log_format)
            .with_client(client)
            .build()
            .await?;
        let client = runtime.client();

        let bundle = tls::issue(&webhook_service, &webhook_namespace)?;
        bundle.write(&cert_dir).await?;
        info!(
            service = %webhook_service,
            namespace = %webhook_namespace,
            "Issued webhook serving certificate"
        );

        if validate_config.is_empty() {
            info!("No validating webhook configuration name; skipping");
        } else {
            let endpoint = Endpoint {
                service: &webhook_service,
                namespace: &webhook_namespace,
                path: &validate_path,
                ca_pem: &bundle.ca_pem,
            };
            webhooks::apply(client.clone(), validating(&validate_config, &endpoint)).await?;
        }

        if mutate_config.is_empty() {
            info!("No mutating webhook configuration name; skipping");
        } else {
            let endpoint = Endpoint {
                service: &webhook_service,
                namespace: &webhook_namespace,
                path: &mutate_path,
                ca_pem: &bundle.ca_pem,
            };
            webhooks::apply(client, mutating(&mutate_config, &endpoint)).await?;
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_flags() {
        let args = Args::try_parse_from([
            "admission-registry-bootstrap",
            "--webhook-namespace",
            "kube-system",
            "--webhook-service",
            "registry",
            "--validate-config",
            "registry-validate",
            "--cert-dir",
            "/tmp/certs",
        ])
        .expect("args must parse");
        assert_eq!(args.webhook_namespace, "kube-system");
        assert_eq!(args.webhook_service, "registry");
        assert_eq!(args.validate_config, "registry-validate");
        assert_eq!(args.cert_dir, PathBuf::from("/tmp/certs"));
    }
}
