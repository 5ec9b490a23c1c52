//! TLS configuration and certificate loading.

use std::path::{Path, PathBuf};

use axum_server::tls_rustls::RustlsConfig;

use crate::config::schema::TlsConfig;

#[derive(Debug)]
pub enum TlsError {
    MissingFile { what: &'static str, path: PathBuf },
    Load(std::io::Error),
}

impl std::fmt::Display for TlsError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            TlsError::MissingFile { what, path } => write!(f, "{} file not found: {:?}", what, path),
            TlsError::Load(e) => write!(f, "Failed to load TLS material: {}", e),
        }
    }
}

impl std::error::Error for TlsError {}

/// Load the listener's certificate chain and private key (PEM).
pub async fn load_tls_config(config: &TlsConfig) -> Result<RustlsConfig, TlsError> {
    let cert_path = Path::new(&config.cert_path);
    let key_path = Path::new(&config.key_path);

    if !cert_path.exists() {
        return Err(TlsError::MissingFile { what: "Certificate", path: cert_path.to_path_buf() });
    }
    if !key_path.exists() {
        return Err(TlsError::MissingFile { what: "Private key", path: key_path.to_path_buf() });
    }

    RustlsConfig::from_pem_file(cert_path, key_path).await.map_err(TlsError::Load)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_missing_files_are_named() {
        let config = TlsConfig { cert_path: "/nope/cert.pem".into(), key_path: "/nope/key.pem".into() };
        let Err(err) = load_tls_config(&config).await else {
            panic!("expected missing certificate");
        };
        assert!(matches!(err, TlsError::MissingFile { what: "Certificate", .. }));
        assert!(err.to_string().contains("/nope/cert.pem"));
    }
}
