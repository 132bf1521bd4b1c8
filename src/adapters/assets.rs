//! CSV-backed asset inventory.
//!
//! The inventory is a header-mapped CSV file with at least `hostname` and
//! `ip_address` columns; any further columns travel along on the matched
//! record. The file is re-read on every lookup so edits take effect without
//! a restart. Fields are comma-split; values containing commas are not
//! supported.

use std::path::PathBuf;

use async_trait::async_trait;
use tokio::fs;

use crate::domain::AssetRecord;

use super::{AdapterError, AssetInventory};

/// Asset inventory reading from a CSV file on disk.
pub struct CsvAssetInventory {
    path: PathBuf,
}

impl CsvAssetInventory {
    pub fn new(path: PathBuf) -> Self {
        Self { path }
    }

    async fn load(&self) -> Result<Vec<AssetRecord>, AdapterError> {
        let content = fs::read_to_string(&self.path).await?;
        Ok(parse_inventory(&content))
    }
}

#[async_trait]
impl AssetInventory for CsvAssetInventory {
    async fn lookup(
        &self,
        hostname: Option<&str>,
        ip: Option<&str>,
    ) -> Result<Option<AssetRecord>, AdapterError> {
        let records = self.load().await?;

        // Hostname match wins over IP match, first row wins within a pass.
        if let Some(hostname) = hostname {
            if let Some(found) = records.iter().find(|r| r.hostname == hostname) {
                return Ok(Some(found.clone()));
            }
        }
        if let Some(ip) = ip {
            if let Some(found) = records.iter().find(|r| r.ip_address == ip) {
                return Ok(Some(found.clone()));
            }
        }
        Ok(None)
    }
}

fn parse_inventory(content: &str) -> Vec<AssetRecord> {
    let mut lines = content.lines().filter(|l| !l.trim().is_empty());

    let Some(header_line) = lines.next() else {
        return Vec::new();
    };
    let headers: Vec<&str> = header_line.split(',').map(str::trim).collect();

    lines
        .map(|line| {
            let mut record = AssetRecord::default();
            for (column, value) in headers.iter().zip(line.split(',').map(str::trim)) {
                match *column {
                    "hostname" => record.hostname = value.to_string(),
                    "ip_address" => record.ip_address = value.to_string(),
                    extra => {
                        record.extra.insert(extra.to_string(), value.to_string());
                    }
                }
            }
            record
        })
        .collect()
}
