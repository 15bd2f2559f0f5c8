//! TLS connector setup for the hyper client.
//!
//! # Feature Flags
//!
//! TLS needs both a crypto provider and root certificates:
//!
//! - **Crypto providers**: `tls-ring` (default) or `tls-aws-lc`
//! - **Root certificates**: `tls-native-roots` (default) or `tls-webpki-roots`
//!
//! Without a provider feature, a process-wide default installed through
//! `rustls::crypto::CryptoProvider::install_default` is used instead.

use std::sync::Arc;

use hyper_rustls::{HttpsConnector, HttpsConnectorBuilder};
use hyper_util::client::legacy::connect::HttpConnector;
use rustls::ClientConfig;

use crate::ClientBuildError;

/// Returns true if both a crypto provider and root certificates are compiled in.
#[inline]
pub const fn has_tls_support() -> bool {
    cfg!(any(feature = "tls-ring", feature = "tls-aws-lc"))
        && cfg!(any(feature = "tls-native-roots", feature = "tls-webpki-roots"))
}

fn crypto_provider() -> Option<Arc<rustls::crypto::CryptoProvider>> {
    #[cfg(feature = "tls-ring")]
    return Some(Arc::new(rustls::crypto::ring::default_provider()));

    #[cfg(all(feature = "tls-aws-lc", not(feature = "tls-ring")))]
    return Some(Arc::new(rustls::crypto::aws_lc_rs::default_provider()));

    #[cfg(not(any(feature = "tls-ring", feature = "tls-aws-lc")))]
    rustls::crypto::CryptoProvider::get_default().cloned()
}

fn root_store() -> rustls::RootCertStore {
    #[allow(unused_mut)]
    let mut roots = rustls::RootCertStore::empty();

    #[cfg(feature = "tls-native-roots")]
    {
        let native = rustls_native_certs::load_native_certs();
        if !native.errors.is_empty() {
            #[cfg(feature = "tracing")]
            tracing::debug!(errors = ?native.errors, "some native root certificates failed to load");
        }
        roots.add_parsable_certificates(native.certs);
    }

    #[cfg(all(feature = "tls-webpki-roots", not(feature = "tls-native-roots")))]
    roots.extend(webpki_roots::TLS_SERVER_ROOTS.iter().cloned());

    roots
}

/// Build the default TLS configuration from the enabled features.
pub fn default_tls_config() -> Result<ClientConfig, ClientBuildError> {
    if !cfg!(any(feature = "tls-native-roots", feature = "tls-webpki-roots")) {
        return Err(ClientBuildError::Tls(
            "no root certificates: enable `tls-native-roots` or `tls-webpki-roots`".into(),
        ));
    }
    let provider = crypto_provider().ok_or_else(|| {
        ClientBuildError::Tls(
            "no crypto provider: enable `tls-ring` or `tls-aws-lc`, or install a default provider"
                .into(),
        )
    })?;
    let config = ClientConfig::builder_with_provider(provider)
        .with_safe_default_protocol_versions()
        .map_err(|e| ClientBuildError::Tls(e.to_string()))?
        .with_root_certificates(root_store())
        .with_no_client_auth();
    Ok(config)
}

/// Wrap `http` so it speaks both `https://` and plain `http://`.
///
/// Plain http stays enabled for local fakes of the Graph API and for
/// lookaside URLs behind a proxy.
pub fn build_https_connector(
    mut http: HttpConnector,
    tls_config: Option<ClientConfig>,
) -> Result<HttpsConnector<HttpConnector>, ClientBuildError> {
    let config = match tls_config {
        Some(config) => config,
        None => default_tls_config()?,
    };
    http.enforce_http(false);
    Ok(HttpsConnectorBuilder::new()
        .with_tls_config(config)
        .https_or_http()
        .enable_all_versions()
        .wrap_connector(http))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_features_have_tls() {
        assert!(has_tls_support());
        assert!(default_tls_config().is_ok());
        assert!(build_https_connector(HttpConnector::new(), None).is_ok());
    }
}
