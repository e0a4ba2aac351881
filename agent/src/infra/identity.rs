//! Host identity discovery: cloud metadata endpoints, a fallback, and the
//! outbound address probe.

use std::net::{IpAddr, UdpSocket};
use std::time::Duration;

use tracing::debug;

use crate::application::ports::{IdentityProvider, NetworkProbe};
use crate::domain::InstanceId;

/// Metadata endpoints are link-local; anything slower is not a cloud VM.
const METADATA_TIMEOUT: Duration = Duration::from_secs(2);

const DIGITALOCEAN_ID_URL: &str = "http://169.254.169.254/metadata/v1/id";
const AWS_ID_URL: &str = "http://169.254.169.254/latest/meta-data/instance-id";

/// Reads an instance ID from a cloud metadata endpoint.
pub struct MetadataProvider {
    cloud: &'static str,
    url: String,
    agent: ureq::Agent,
}

impl MetadataProvider {
    #[must_use]
    pub fn new(cloud: &'static str, url: impl Into<String>) -> Self {
        let agent = ureq::AgentBuilder::new().timeout(METADATA_TIMEOUT).build();
        Self {
            cloud,
            url: url.into(),
            agent,
        }
    }

    #[must_use]
    pub fn digitalocean() -> Self {
        Self::new("DigitalOcean", DIGITALOCEAN_ID_URL)
    }

    #[must_use]
    pub fn aws() -> Self {
        Self::new("AWS", AWS_ID_URL)
    }
}

impl IdentityProvider for MetadataProvider {
    fn name(&self) -> &str {
        self.cloud
    }

    fn try_resolve(&self) -> Option<InstanceId> {
        // ureq reports non-2xx as Err(Status).
        let resp = match self.agent.get(&self.url).call() {
            Ok(resp) if resp.status() == 200 => resp,
            Ok(resp) => {
                debug!(cloud = self.cloud, status = resp.status(), "metadata endpoint declined");
                return None;
            }
            Err(e) => {
                debug!(cloud = self.cloud, error = %e, "metadata endpoint unreachable");
                return None;
            }
        };
        let id = resp.into_string().ok()?.trim().to_string();
        if id.is_empty() {
            return None;
        }
        Some(InstanceId {
            id,
            cloud: self.cloud.to_string(),
            addr: String::new(),
        })
    }
}

/// Used when no cloud provider answers. Always resolves, with an empty
/// identity.
pub struct FallbackProvider;

impl IdentityProvider for FallbackProvider {
    fn name(&self) -> &str {
        "fallback"
    }

    fn try_resolve(&self) -> Option<InstanceId> {
        Some(InstanceId::default())
    }
}

/// Providers in the order they are tried.
#[must_use]
pub fn default_providers() -> Vec<Box<dyn IdentityProvider>> {
    vec![
        Box::new(MetadataProvider::digitalocean()),
        Box::new(MetadataProvider::aws()),
        Box::new(FallbackProvider),
    ]
}

/// Finds the local address of the default route by connecting a UDP socket.
/// No packet is sent.
#[derive(Debug, Default, Clone, Copy)]
pub struct UdpNetworkProbe;

impl NetworkProbe for UdpNetworkProbe {
    fn outbound_ip(&self) -> Option<IpAddr> {
        let socket = UdpSocket::bind("0.0.0.0:0").ok()?;
        socket.connect("8.8.8.8:80").ok()?;
        socket.local_addr().ok().map(|addr| addr.ip())
    }
}
