//! Provider-wide configuration and the entry point that creates contexts.

use crate::{
    sigalg::{SigalgContext, SigalgInfo, SIGALGS},
    DigestAlgorithm, Error, Result, SignatureContext,
};
use std::{collections::BTreeSet, sync::Arc};
use tracing::debug;

/// Capabilities fixed when the provider is created.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProviderConfig {
    digests: BTreeSet<DigestAlgorithm>,
    fips_checks: bool,
}

impl Default for ProviderConfig {
    fn default() -> Self {
        Self {
            digests: DigestAlgorithm::ALL
                .into_iter()
                .filter(|alg| alg.is_available())
                .collect(),
            fips_checks: false,
        }
    }
}

impl ProviderConfig {
    /// Configuration of a FIPS build: policy checks on, SM3 and RIPEMD-160
    /// unavailable.
    pub fn fips() -> Self {
        Self::default()
            .with_fips_checks(true)
            .without_digest(DigestAlgorithm::Sm3)
            .without_digest(DigestAlgorithm::Ripemd160)
    }

    /// Turns the FIPS policy checks on or off.
    pub fn with_fips_checks(mut self, enabled: bool) -> Self {
        self.fips_checks = enabled;
        self
    }

    /// Makes `alg` unknown to every context of the provider.
    pub fn without_digest(mut self, alg: DigestAlgorithm) -> Self {
        self.digests.remove(&alg);
        self
    }

    /// Re-enables `alg` if its engine is compiled in.
    pub fn with_digest(mut self, alg: DigestAlgorithm) -> Self {
        if alg.is_available() {
            self.digests.insert(alg);
        }
        self
    }

    /// Whether `alg` can be fetched.
    pub fn is_enabled(&self, alg: DigestAlgorithm) -> bool {
        self.digests.contains(&alg)
    }

    /// Whether FIPS policy checks run.
    pub fn fips_checks(&self) -> bool {
        self.fips_checks
    }

    /// Enabled digests in table order.
    pub fn digests(&self) -> impl Iterator<Item = DigestAlgorithm> + '_ {
        self.digests.iter().copied()
    }

    pub(crate) fn resolve_digest(&self, name: &str) -> Result<DigestAlgorithm> {
        DigestAlgorithm::from_name(name)
            .filter(|alg| self.is_enabled(*alg))
            .ok_or_else(|| Error::InvalidDigest(format!("{name} could not be fetched")))
    }
}

/// Creates signature contexts sharing one [`ProviderConfig`].
#[derive(Debug, Clone, Default)]
pub struct Provider {
    config: Arc<ProviderConfig>,
}

impl Provider {
    /// Provider with the given configuration.
    pub fn new(config: ProviderConfig) -> Self {
        debug!(fips_checks = config.fips_checks, "RSA signature provider created");
        Self {
            config: Arc::new(config),
        }
    }

    /// Shared configuration.
    pub fn config(&self) -> &ProviderConfig {
        &self.config
    }

    /// New general-purpose context. `propq` is the default property query
    /// for digests fetched by the context.
    pub fn new_context(&self, propq: Option<&str>) -> SignatureContext {
        SignatureContext::new(Arc::clone(&self.config), propq)
    }

    /// New context for the fixed sigalg `name`, e.g. `"RSA-SHA2-256"`.
    pub fn new_sigalg_context(&self, name: &str, propq: Option<&str>) -> Result<SigalgContext> {
        let info = self
            .sigalgs()
            .find(|info| info.matches(name))
            .ok_or_else(|| Error::UnsupportedOperation(format!("unknown signature algorithm {name}")))?;
        Ok(SigalgContext::new(info, self.new_context(propq)))
    }

    /// Sigalgs whose digest is enabled.
    pub fn sigalgs(&self) -> impl Iterator<Item = &'static SigalgInfo> + '_ {
        SIGALGS
            .iter()
            .filter(|info| self.config.is_enabled(info.digest))
    }
}
