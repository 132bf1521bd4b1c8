//! Alert source backed by a JSON fixture file.
//!
//! The orchestrator never cares where an alert came from; this source is
//! what the CLI feeds it with. The file holds a JSON array of alerts and the
//! caller either names an index or takes a random pick.

use std::path::PathBuf;

use rand::Rng;
use tokio::fs;

use crate::domain::Alert;

use super::AdapterError;

/// Reads alerts from a JSON array file.
pub struct JsonFileAlertSource {
    path: PathBuf,
}

impl JsonFileAlertSource {
    pub fn new(path: PathBuf) -> Self {
        Self { path }
    }

    /// All alerts in file order.
    pub async fn load_all(&self) -> Result<Vec<Alert>, AdapterError> {
        let content = fs::read_to_string(&self.path).await?;
        let alerts: Vec<Alert> = serde_json::from_str(&content)
            .map_err(|e| AdapterError::InvalidResponse(format!("alert file: {e}")))?;
        Ok(alerts)
    }

    /// One alert for an analysis request: by index, or uniformly at random
    /// when no index is given.
    pub async fn pick(&self, index: Option<usize>) -> Result<Alert, AdapterError> {
        let mut alerts = self.load_all().await?;
        if alerts.is_empty() {
            return Err(AdapterError::InvalidResponse(
                "alert file contains no alerts".to_string(),
            ));
        }

        let index = match index {
            Some(index) if index < alerts.len() => index,
            Some(index) => {
                return Err(AdapterError::InvalidResponse(format!(
                    "alert index {index} out of range (file holds {})",
                    alerts.len()
                )));
            }
            None => rand::thread_rng().gen_range(0..alerts.len()),
        };

        Ok(alerts.swap_remove(index))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use tempfile::TempDir;

    async fn source_with(content: &str) -> (JsonFileAlertSource, TempDir) {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("alerts.json");
        tokio::fs::write(&path, content).await.unwrap();
        (JsonFileAlertSource::new(path), dir)
    }

    #[tokio::test]
    async fn test_pick_by_index() {
        let (source, _dir) = source_with(
            &json!([
                {"timestamp": "2024-03-11T10:15:00"},
                {"timestamp": "2024-03-16T02:00:00"}
            ])
            .to_string(),
        )
        .await;

        let alert = source.pick(Some(1)).await.unwrap();
        assert_eq!(alert.timestamp(), Some("2024-03-16T02:00:00"));
    }

    #[tokio::test]
    async fn test_index_out_of_range() {
        let (source, _dir) =
            source_with(&json!([{"timestamp": "2024-03-11T10:15:00"}]).to_string()).await;

        assert!(source.pick(Some(5)).await.is_err());
    }

    #[tokio::test]
    async fn test_random_pick_returns_a_listed_alert() {
        let (source, _dir) = source_with(
            &json!([
                {"timestamp": "2024-03-11T10:15:00"},
                {"timestamp": "2024-03-16T02:00:00"}
            ])
            .to_string(),
        )
        .await;

        let alert = source.pick(None).await.unwrap();
        let all = source.load_all().await.unwrap();
        assert!(all.contains(&alert));
    }

    #[tokio::test]
    async fn test_empty_file_rejected() {
        let (source, _dir) = source_with("[]").await;

        assert!(source.pick(None).await.is_err());
    }
}
