//! VirusTotal reputation lookups.
//!
//! Uses the v3 REST API, one GET per indicator against the collection
//! matching its kind. The verdict strings are what the rest of the pipeline
//! stores verbatim in `ioc_reputation`.

use async_trait::async_trait;
use reqwest::StatusCode;
use serde::Deserialize;
use tracing::debug;

use crate::domain::IocKind;

use super::{AdapterError, ReputationProvider};

const DEFAULT_API_URL: &str = "https://www.virustotal.com";

/// VirusTotal v3 API client.
pub struct VirusTotalClient {
    api_url: String,
    api_key: Option<String>,
    client: reqwest::Client,
}

impl VirusTotalClient {
    /// Create a client. A missing key surfaces per lookup, not at
    /// construction.
    pub fn new(api_key: Option<String>) -> Self {
        Self {
            api_url: DEFAULT_API_URL.to_string(),
            api_key,
            client: reqwest::Client::new(),
        }
    }

    pub fn with_api_url(mut self, api_url: impl Into<String>) -> Self {
        self.api_url = api_url.into();
        self
    }
}

#[async_trait]
impl ReputationProvider for VirusTotalClient {
    async fn lookup(&self, value: &str, kind: IocKind) -> Result<String, AdapterError> {
        let api_key = self
            .api_key
            .as_deref()
            .ok_or(AdapterError::MissingCredentials("VT_API_KEY"))?;

        let collection = match kind {
            IocKind::Ip => "ip_addresses",
            IocKind::Domain => "domains",
            IocKind::Url => "urls",
        };

        debug!(ioc = %value, %kind, "querying VirusTotal");
        let response = self
            .client
            .get(format!("{}/api/v3/{collection}/{value}", self.api_url))
            .header("x-apikey", api_key)
            .send()
            .await?;

        // An unknown indicator is an answer, not an error.
        if response.status() == StatusCode::NOT_FOUND {
            return Ok("Not found in VirusTotal database".to_string());
        }

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(AdapterError::UnexpectedStatus {
                status: status.as_u16(),
                body,
            });
        }

        let report: AnalysisReport = response.json().await?;
        Ok(verdict_string(report.malicious_count()))
    }
}

fn verdict_string(malicious: u32) -> String {
    if malicious > 0 {
        format!("MALICIOUS ({malicious} vendors flagged this IOC)")
    } else {
        "Benign (0 vendors flagged this IOC)".to_string()
    }
}

/// The slice of a v3 object report this client cares about. Every level
/// defaults, so a report without analysis stats reads as zero flags.
#[derive(Debug, Default, Deserialize)]
struct AnalysisReport {
    #[serde(default)]
    data: ReportData,
}

impl AnalysisReport {
    fn malicious_count(&self) -> u32 {
        self.data.attributes.last_analysis_stats.malicious
    }
}

#[derive(Debug, Default, Deserialize)]
struct ReportData {
    #[serde(default)]
    attributes: ReportAttributes,
}

#[derive(Debug, Default, Deserialize)]
struct ReportAttributes {
    #[serde(default)]
    last_analysis_stats: AnalysisStats,
}

#[derive(Debug, Default, Deserialize)]
struct AnalysisStats {
    #[serde(default)]
    malicious: u32,
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_report_with_flags_is_malicious() {
        let report: AnalysisReport = serde_json::from_value(json!({
            "data": {
                "attributes": {
                    "last_analysis_stats": {"malicious": 12, "harmless": 60}
                }
            }
        }))
        .unwrap();

        assert_eq!(
            verdict_string(report.malicious_count()),
            "MALICIOUS (12 vendors flagged this IOC)"
        );
    }

    #[test]
    fn test_report_without_stats_reads_benign() {
        let report: AnalysisReport = serde_json::from_value(json!({
            "data": {"attributes": {}}
        }))
        .unwrap();

        assert_eq!(
            verdict_string(report.malicious_count()),
            "Benign (0 vendors flagged this IOC)"
        );
    }

    #[tokio::test]
    async fn test_missing_key_is_reported_at_call_time() {
        let client = VirusTotalClient::new(None);

        let err = client.lookup("203.0.113.9", IocKind::Ip).await.unwrap_err();
        assert!(matches!(err, AdapterError::MissingCredentials("VT_API_KEY")));
    }
}
