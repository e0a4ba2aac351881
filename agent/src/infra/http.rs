//! HTTP infrastructure: implements `Downloader` and `TelemetrySink` with
//! blocking `ureq` agents.
//!
//! Every agent carries a seconds-scale timeout so one unreachable endpoint
//! cannot stall a run.

use std::fs::File;
use std::io::{self, Read};
use std::path::Path;
use std::time::Duration;

use anyhow::{Context, Result};

use crate::application::ports::{Downloader, TelemetrySink};
use crate::domain::{ConnectionParams, InstanceInfo};

/// Packages larger than this are refused.
pub const MAX_PACKAGE_BYTES: u64 = 100 * 1024 * 1024;

const CONNECT_TIMEOUT: Duration = Duration::from_secs(5);
const READ_TIMEOUT: Duration = Duration::from_secs(30);
const REPORT_TIMEOUT: Duration = Duration::from_secs(30);

/// `User-Agent` sent with every request.
#[must_use]
pub fn user_agent() -> String {
    format!("fleetwatch/{}", env!("CARGO_PKG_VERSION"))
}

/// Agent for release metadata and package downloads.
#[must_use]
pub fn download_agent() -> ureq::Agent {
    ureq::AgentBuilder::new()
        .timeout_connect(CONNECT_TIMEOUT)
        .timeout_read(READ_TIMEOUT)
        .user_agent(&user_agent())
        .build()
}

// ── Downloader ────────────────────────────────────────────────────────────────

/// Streams a URL into a file.
pub struct HttpDownloader {
    agent: ureq::Agent,
}

impl HttpDownloader {
    #[must_use]
    pub fn new(agent: ureq::Agent) -> Self {
        Self { agent }
    }
}

impl Default for HttpDownloader {
    fn default() -> Self {
        Self::new(download_agent())
    }
}

impl Downloader for HttpDownloader {
    fn download(&self, url: &str, dest: &Path) -> Result<()> {
        let response = self
            .agent
            .get(url)
            .call()
            .with_context(|| format!("requesting {url}"))?;

        let mut reader = response.into_reader().take(MAX_PACKAGE_BYTES + 1);
        let mut file =
            File::create(dest).with_context(|| format!("creating {}", dest.display()))?;
        let written = io::copy(&mut reader, &mut file)
            .with_context(|| format!("downloading {url}"))?;
        anyhow::ensure!(
            written <= MAX_PACKAGE_BYTES,
            "package at {url} exceeds {MAX_PACKAGE_BYTES} bytes"
        );
        file.sync_all()
            .with_context(|| format!("flushing {}", dest.display()))?;
        Ok(())
    }
}

// ── Telemetry sink ────────────────────────────────────────────────────────────

/// Posts telemetry documents to the reporting endpoint.
pub struct HttpTelemetrySink {
    agent: ureq::Agent,
    conn: ConnectionParams,
}

impl HttpTelemetrySink {
    #[must_use]
    pub fn new(conn: ConnectionParams) -> Self {
        let agent = ureq::AgentBuilder::new()
            .timeout_connect(CONNECT_TIMEOUT)
            .timeout(REPORT_TIMEOUT)
            .user_agent(&user_agent())
            .build();
        Self { agent, conn }
    }
}

impl TelemetrySink for HttpTelemetrySink {
    fn send(&self, info: &InstanceInfo) -> Result<()> {
        let body = serde_json::to_string_pretty(info).context("serializing telemetry")?;
        self.agent
            .post(&self.conn.url)
            .set("Authorization", &authorization_header(&self.conn.token))
            .set("Content-Type", "application/json")
            .send_string(&body)
            .with_context(|| format!("posting telemetry to {}", self.conn.url))?;
        Ok(())
    }
}

/// Value of the `Authorization` header for `token`.
#[must_use]
pub fn authorization_header(token: &str) -> String {
    format!("MonitoringToken {token}")
}
