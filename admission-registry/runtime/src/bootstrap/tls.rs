use anyhow::{Context, Result};
use rcgen::{
    BasicConstraints, CertificateParams, DistinguishedName, DnType, DnValue,
    ExtendedKeyUsagePurpose, IsCa, Issuer, KeyPair, KeyUsagePurpose,
};
use std::path::Path;
use time::{Duration, OffsetDateTime};
use tracing::info;

const CA_VALIDITY: Duration = Duration::days(10 * 365);
const LEAF_VALIDITY: Duration = Duration::days(365);

pub const CERT_FILE: &str = "tls.crt";
pub const KEY_FILE: &str = "tls.key";

/// A freshly issued CA and the serving certificate it signed, PEM-encoded.
#[derive(Clone, Debug)]
pub struct Bundle {
    pub ca_pem: String,
    pub cert_pem: String,
    pub key_pem: String,
}

/// Issues a new CA and a serving certificate for `service` in `namespace`.
pub fn issue(service: &str, namespace: &str) -> Result<Bundle> {
    let now = OffsetDateTime::now_utc();

    let mut ca = CertificateParams::default();
    ca.distinguished_name = subject(None);
    ca.is_ca = IsCa::Ca(BasicConstraints::Unconstrained);
    ca.key_usages = vec![
        KeyUsagePurpose::DigitalSignature,
        KeyUsagePurpose::KeyCertSign,
    ];
    ca.extended_key_usages = vec![
        ExtendedKeyUsagePurpose::ClientAuth,
        ExtendedKeyUsagePurpose::ServerAuth,
    ];
    ca.not_before = now;
    ca.not_after = now + CA_VALIDITY;

    let ca_key = KeyPair::generate().context("failed to generate CA key")?;
    let ca_pem = ca
        .self_signed(&ca_key)
        .context("failed to self-sign CA certificate")?
        .pem();
    let issuer = Issuer::new(ca, ca_key);

    let mut leaf = CertificateParams::new(dns_names(service, namespace))
        .context("invalid serving certificate DNS names")?;
    leaf.distinguished_name = subject(Some(format!("{service}.{namespace}.svc")));
    leaf.is_ca = IsCa::NoCa;
    leaf.key_usages = vec![KeyUsagePurpose::DigitalSignature];
    leaf.extended_key_usages = vec![
        ExtendedKeyUsagePurpose::ClientAuth,
        ExtendedKeyUsagePurpose::ServerAuth,
    ];
    leaf.not_before = now;
    leaf.not_after = now + LEAF_VALIDITY;

    let leaf_key = KeyPair::generate().context("failed to generate serving key")?;
    let cert_pem = leaf
        .signed_by(&leaf_key, &issuer)
        .context("failed to sign serving certificate")?
        .pem();

    Ok(Bundle {
        ca_pem,
        cert_pem,
        key_pem: leaf_key.serialize_pem(),
    })
}

/// The names under which the webhook service is reachable in-cluster.
pub fn dns_names(service: &str, namespace: &str) -> Vec<String> {
    vec![
        service.to_string(),
        format!("{service}.{namespace}"),
        format!("{service}.{namespace}.svc"),
        format!("{service}.{namespace}.svc.cluster.local"),
    ]
}

fn subject(common_name: Option<String>) -> DistinguishedName {
    let mut dn = DistinguishedName::new();
    dn.push(DnType::CountryName, DnValue::Utf8String("CN".to_string()));
    dn.push(
        DnType::StateOrProvinceName,
        DnValue::Utf8String("Beijing".to_string()),
    );
    dn.push(DnType::LocalityName, DnValue::Utf8String("Beijing".to_string()));
    dn.push(
        DnType::OrganizationName,
        DnValue::Utf8String("ydzs.io".to_string()),
    );
    dn.push(
        DnType::OrganizationalUnitName,
        DnValue::Utf8String("ydzs.io".to_string()),
    );
    if let Some(cn) = common_name {
        dn.push(DnType::CommonName, DnValue::Utf8String(cn));
    }
    dn
}

// === impl Bundle ===

impl Bundle {
    /// Writes the serving certificate and key into `dir`, creating it if
    /// needed.
    pub async fn write(&self, dir: &Path) -> Result<()> {
        tokio::fs::create_dir_all(dir)
            .await
            .with_context(|| format!("failed to create {}", dir.display()))?;

        let cert = dir.join(CERT_FILE);
        tokio::fs::write(&cert, &self.cert_pem)
            .await
            .with_context(|| format!("failed to write {}", cert.display()))?;

        let key = dir.join(KEY_FILE);
        tokio::fs::write(&key, &self.key_pem)
            .await
            .with_context(|| format!("failed to write {}", key.display()))?;

        info!(dir = %dir.display(), "Wrote serving certificate");
        Ok(())
    }
}
