//! External reputation sources

use crate::{ReputationProvider, ReputationSignals};
use async_trait::async_trait;
use std::net::IpAddr;
use verdict_common::{VerdictError, VerdictResult};

/// VirusTotal-backed reputation source
///
/// Derives the four signal ratios from the v2 IP address report: for
/// each association kind, the fraction of entries flagged malicious by
/// more than one engine.
pub struct VirusTotalSource {
    api_key: String,
    base_url: String,
    client: reqwest::Client,
}

impl VirusTotalSource {
    pub fn new(api_key: &str) -> Self {
        Self {
            api_key: api_key.to_string(),
            base_url: "https://www.virustotal.com/vtapi/v2".to_string(),
            client: reqwest::Client::new(),
        }
    }

    /// Override the endpoint base URL (test servers)
    pub fn with_base_url(mut self, base_url: &str) -> Self {
        self.base_url = base_url.trim_end_matches('/').to_string();
        self
    }

    async fn fetch_report(&self, addr: IpAddr) -> VerdictResult<VtIpReport> {
        let url = format!("{}/ip-address/report", self.base_url);

        let resp = self
            .client
            .get(&url)
            .query(&[("apikey", self.api_key.as_str()), ("ip", &addr.to_string())])
            .send()
            .await
            .map_err(|e| VerdictError::Reputation(e.to_string()))?;

        if !resp.status().is_success() {
            return Err(VerdictError::Reputation(format!(
                "VirusTotal returned {}",
                resp.status()
            )));
        }

        resp.json()
            .await
            .map_err(|e| VerdictError::Reputation(e.to_string()))
    }
}

#[async_trait]
impl ReputationProvider for VirusTotalSource {
    async fn lookup(&self, addr: IpAddr) -> VerdictResult<ReputationSignals> {
        let report = self.fetch_report(addr).await?;

        let signals = ReputationSignals::new(
            flagged_ratio_urls(&report.detected_urls),
            flagged_ratio(&report.detected_downloaded_samples),
            flagged_ratio(&report.detected_referrer_samples),
            flagged_ratio(&report.detected_communicating_samples),
        );

        tracing::debug!(addr = %addr, ?signals, "VirusTotal reputation resolved");
        Ok(signals)
    }
}

/// Fraction of samples with more than one positive engine verdict
fn flagged_ratio(samples: &[VtSample]) -> f64 {
    if samples.is_empty() {
        return 0.0;
    }
    let flagged = samples.iter().filter(|s| s.positives > 1).count();
    flagged as f64 / samples.len() as f64
}

fn flagged_ratio_urls(urls: &[VtUrl]) -> f64 {
    if urls.is_empty() {
        return 0.0;
    }
    let flagged = urls.iter().filter(|u| u.positives > 1).count();
    flagged as f64 / urls.len() as f64
}

#[derive(Debug, Clone, Default, serde::Deserialize)]
pub struct VtIpReport {
    #[serde(default)]
    pub detected_urls: Vec<VtUrl>,
    #[serde(default)]
    pub detected_downloaded_samples: Vec<VtSample>,
    #[serde(default)]
    pub detected_referrer_samples: Vec<VtSample>,
    #[serde(default)]
    pub detected_communicating_samples: Vec<VtSample>,
}

#[derive(Debug, Clone, serde::Deserialize)]
pub struct VtUrl {
    pub url: String,
    pub positives: u32,
    pub total: u32,
}

#[derive(Debug, Clone, serde::Deserialize)]
pub struct VtSample {
    #[serde(default)]
    pub sha256: Option<String>,
    pub positives: u32,
    pub total: u32,
}
