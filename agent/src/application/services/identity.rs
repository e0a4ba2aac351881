//! Application service: resolve the host identity from an ordered list of
//! providers.

use tracing::debug;

use crate::application::ports::{IdentityProvider, NetworkProbe};
use crate::domain::InstanceId;

/// Try `providers` in order; the first that resolves wins and is stamped
/// with the host's outbound address.
///
/// Returns `None` only when every provider is unavailable, which a chain
/// ending in a fallback provider never is.
pub fn resolve_identity(
    providers: &[Box<dyn IdentityProvider>],
    probe: &impl NetworkProbe,
) -> Option<InstanceId> {
    for provider in providers {
        let Some(mut identity) = provider.try_resolve() else {
            debug!(provider = provider.name(), "identity provider unavailable");
            continue;
        };
        debug!(provider = provider.name(), id = %identity.id, "instance identity resolved");
        identity.addr = probe
            .outbound_ip()
            .map(|ip| ip.to_string())
            .unwrap_or_default();
        return Some(identity);
    }
    None
}
