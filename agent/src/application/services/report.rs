//! Application service: build and deliver the telemetry document.
//!
//! The instance identity is resolved once and cached in the key-value
//! store; later runs reuse the cached value without probing.

use anyhow::{Context, Result};
use tracing::{debug, warn};

use crate::application::ports::{
    IdentityProvider, KeyValueStore, NetworkProbe, StatsCollector, TelemetrySink,
};
use crate::application::services::identity::resolve_identity;
use crate::domain::config::INSTANCE_ID_KEY;
use crate::domain::{InstanceId, InstanceInfo};

/// Collects the telemetry document for this host.
pub struct Reporter<'a, S, C, P> {
    store: &'a S,
    collector: &'a C,
    probe: &'a P,
    providers: &'a [Box<dyn IdentityProvider>],
}

impl<'a, S, C, P> Reporter<'a, S, C, P>
where
    S: KeyValueStore,
    C: StatsCollector,
    P: NetworkProbe,
{
    #[must_use]
    pub fn new(
        store: &'a S,
        collector: &'a C,
        probe: &'a P,
        providers: &'a [Box<dyn IdentityProvider>],
    ) -> Self {
        Self {
            store,
            collector,
            probe,
            providers,
        }
    }

    /// The cached identity, resolving and caching it on first use.
    ///
    /// A failure to cache is logged and otherwise ignored.
    ///
    /// # Errors
    ///
    /// Returns an error if a cached identity exists but cannot be read or
    /// parsed.
    pub fn instance_identity(&self) -> Result<InstanceId> {
        if self.store.has(INSTANCE_ID_KEY) {
            let raw = self
                .store
                .read(INSTANCE_ID_KEY)
                .context("reading cached instance identity")?;
            return serde_json::from_slice(&raw).context("parsing cached instance identity");
        }

        let Some(identity) = resolve_identity(self.providers, self.probe) else {
            debug!("no identity provider resolved, reporting without identity");
            return Ok(InstanceId::default());
        };
        match serde_json::to_vec_pretty(&identity) {
            Ok(data) => {
                if let Err(e) = self.store.write(INSTANCE_ID_KEY, &data) {
                    warn!(error = %e, "could not cache instance identity");
                }
            }
            Err(e) => warn!(error = %e, "could not serialize instance identity"),
        }
        Ok(identity)
    }

    /// Build the full document for `version`.
    ///
    /// # Errors
    ///
    /// Returns an error if the identity or the statistics are unavailable.
    pub fn collect(&self, version: &str) -> Result<InstanceInfo> {
        let instance = self.instance_identity()?;
        let stat = self.collector.collect().context("collecting host statistics")?;
        Ok(InstanceInfo {
            version: version.to_string(),
            instance,
            stat,
        })
    }

    /// Collect and deliver the document.
    ///
    /// # Errors
    ///
    /// Returns an error if collection or delivery fails.
    pub fn report(&self, version: &str, sink: &impl TelemetrySink) -> Result<InstanceInfo> {
        let info = self.collect(version)?;
        sink.send(&info).context("sending telemetry")?;
        Ok(info)
    }
}
