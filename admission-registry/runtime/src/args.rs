use crate::{admission::Admission, core::Whitelist, metrics::AdmissionMetrics};
use anyhow::{bail, Result};
use clap::Parser;
use prometheus_client::registry::Registry;
use tracing::{info, warn};

#[derive(Debug, Parser)]
#[clap(
    name = "admission-registry",
    about = "Validates pod images and annotates workloads at admission"
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

    #[clap(flatten)]
    server: kubert::ServerArgs,

    #[clap(flatten)]
    admin: kubert::AdminArgs,

    /// Comma-separated registry prefixes from which pod images may be pulled.
    ///
    /// When empty, every pod with at least one container is denied.
    #[clap(long, env = "WHITELIST_REGISTRIES", default_value = "")]
    whitelist_registries: Whitelist,
}

impl Args {
    #[inline]
    pub async fn parse_and_run() -> Result<()> {
        Self::parse().run().await
    }

    pub async fn run(self) -> Result<()> {
        let Self {
            admin,
            client,
            log_level,
            log_format,
            server,
            whitelist_registries: whitelist,
        } = self;

        let mut prom = <Registry>::default();
        let metrics = AdmissionMetrics::register(prom.sub_registry_with_prefix("admission"));
        let rt_metrics = kubert::RuntimeMetrics::register(prom.sub_registry_with_prefix("kube"));

        let runtime = kubert::Runtime::builder()
            .with_log(log_level, log_format)
            .with_metrics(rt_metrics)
            .with_admin(admin.into_builder().with_prometheus(prom))
            .with_client(client)
            .with_optional_server(Some(server))
            .build()
            .await?;

        if whitelist.is_empty() {
            warn!("No registries are whitelisted; pods with containers will be denied");
        }
        info!(%whitelist, "Serving admission reviews");

        let runtime =
            runtime.spawn_server(move || Admission::with_metrics(whitelist.clone(), metrics.clone()));

        // Block the main thread on the shutdown signal.
        if runtime.run().await.is_err() {
            bail!("Aborted");
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_whitelist() {
        let args = Args::try_parse_from([
            "admission-registry",
            "--whitelist-registries",
            "docker.io/library/, gcr.io/",
        ])
        .expect("args must parse");
        assert_eq!(
            args.whitelist_registries,
            Whitelist::new(["docker.io/library/", "gcr.io/"])
        );
    }

    #[test]
    fn defaults_to_empty_whitelist() {
        let args = Args::try_parse_from(["admission-registry"]).expect("args must parse");
        assert!(args.whitelist_registries.is_empty());
    }
}
