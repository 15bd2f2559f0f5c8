//! Private key sources.

use std::future::Future;
use std::path::PathBuf;
use std::sync::Arc;

use futures::future::BoxFuture;
use rsa::RsaPrivateKey;
use rsa::pkcs1::DecodeRsaPrivateKey;
use rsa::pkcs8::DecodePrivateKey;

use crate::FlowError;

/// Supplies the private key for each exchange.
///
/// Called once per exchange, so implementations can follow key rotation
/// or fetch from an external key store.
pub trait PrivateKeyLoader: Send + Sync + 'static {
    fn load(&self) -> BoxFuture<'_, Result<Arc<RsaPrivateKey>, FlowError>>;
}

/// A key held in memory.
#[derive(Clone, Debug)]
pub struct StaticKey(Arc<RsaPrivateKey>);

impl StaticKey {
    pub fn new(key: RsaPrivateKey) -> Self {
        Self(Arc::new(key))
    }

    /// Parse a PKCS#8 or PKCS#1 PEM document.
    pub fn from_pem(pem: &str) -> Result<Self, FlowError> {
        parse_pem(pem).map(Self::new)
    }
}

impl PrivateKeyLoader for StaticKey {
    fn load(&self) -> BoxFuture<'_, Result<Arc<RsaPrivateKey>, FlowError>> {
        let key = Arc::clone(&self.0);
        Box::pin(async move { Ok(key) })
    }
}

/// A PEM file, re-read on every exchange.
#[derive(Clone, Debug)]
pub struct PemFile {
    path: PathBuf,
}

impl PemFile {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }
}

impl PrivateKeyLoader for PemFile {
    fn load(&self) -> BoxFuture<'_, Result<Arc<RsaPrivateKey>, FlowError>> {
        Box::pin(async move {
            let pem = tokio::fs::read_to_string(&self.path)
                .await
                .map_err(|e| FlowError::KeyLoad(e.into()))?;
            parse_pem(&pem).map(Arc::new)
        })
    }
}

impl<F, Fut> PrivateKeyLoader for F
where
    F: Fn() -> Fut + Send + Sync + 'static,
    Fut: Future<Output = Result<Arc<RsaPrivateKey>, FlowError>> + Send + 'static,
{
    fn load(&self) -> BoxFuture<'_, Result<Arc<RsaPrivateKey>, FlowError>> {
        Box::pin(self())
    }
}

fn parse_pem(pem: &str) -> Result<RsaPrivateKey, FlowError> {
    RsaPrivateKey::from_pkcs8_pem(pem)
        .or_else(|_| RsaPrivateKey::from_pkcs1_pem(pem))
        .map_err(|e| FlowError::KeyLoad(e.into()))
}
