#![deny(warnings, rust_2018_idioms)]
#![forbid(unsafe_code)]

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    admission_registry_runtime::bootstrap::Args::parse_and_run().await
}
