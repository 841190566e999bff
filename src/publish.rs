//! Delivery of each cycle's [`Aggregate`] to downstream consumers
//!
//! Sinks are only called for successful cycles. A failed cycle publishes
//! nothing, so consumers keep the previous snapshot.

use crate::aggregate::Aggregate;
use crate::error::{PowershopError, Result};
use crate::logging::get_logger;
use crate::statistics::latest_daily_total_kwh;
use chrono::{DateTime, Utc};
use chrono_tz::Tz;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// Downstream consumer of refresh results
#[async_trait::async_trait]
pub trait AggregateSink: Send + Sync {
    async fn publish(&self, aggregate: &Aggregate) -> Result<()>;
}

/// On-disk snapshot format
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Snapshot {
    pub generated_at: DateTime<Utc>,
    pub aggregate: Aggregate,
}

/// Writes the latest aggregate as pretty JSON
pub struct JsonSnapshotSink {
    path: PathBuf,
    logger: crate::logging::StructuredLogger,
}

impl JsonSnapshotSink {
    pub fn new<P: Into<PathBuf>>(path: P) -> Self {
        Self {
            path: path.into(),
            logger: get_logger("publish"),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Read back the last snapshot, if one has been written
    pub async fn load(&self) -> Result<Option<Snapshot>> {
        match tokio::fs::read_to_string(&self.path).await {
            Ok(contents) => Ok(Some(serde_json::from_str(&contents)?)),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(None),
            Err(e) => Err(e.into()),
        }
    }

    fn temp_path(&self) -> PathBuf {
        let mut name = self
            .path
            .file_name()
            .map(|n| n.to_os_string())
            .unwrap_or_else(|| "snapshot.json".into());
        name.push(".tmp");
        self.path.with_file_name(name)
    }
}

#[async_trait::async_trait]
impl AggregateSink for JsonSnapshotSink {
    async fn publish(&self, aggregate: &Aggregate) -> Result<()> {
        let snapshot = Snapshot {
            generated_at: Utc::now(),
            aggregate: aggregate.clone(),
        };
        let contents = serde_json::to_string_pretty(&snapshot)?;

        if let Some(parent) = self.path.parent().filter(|p| !p.as_os_str().is_empty()) {
            tokio::fs::create_dir_all(parent).await?;
        }
        // Readers only ever see a complete file
        let tmp = self.temp_path();
        tokio::fs::write(&tmp, contents).await?;
        tokio::fs::rename(&tmp, &self.path).await.map_err(|e| {
            PowershopError::io(format!(
                "Failed to move snapshot into place at {}: {}",
                self.path.display(),
                e
            ))
        })?;

        self.logger.debug(&format!(
            "Wrote snapshot for {} properties to {}",
            aggregate.properties.len(),
            self.path.display()
        ));
        Ok(())
    }
}

/// Logs one summary line per property
pub struct LogSummarySink {
    tz: Tz,
    logger: crate::logging::StructuredLogger,
}

impl LogSummarySink {
    pub fn new(tz: Tz) -> Self {
        Self {
            tz,
            logger: get_logger("publish"),
        }
    }
}

#[async_trait::async_trait]
impl AggregateSink for LogSummarySink {
    async fn publish(&self, aggregate: &Aggregate) -> Result<()> {
        let today = Utc::now().with_timezone(&self.tz).date_naive();
        for property in &aggregate.properties {
            let id = &property.consumer_id;
            let logger = self.logger.for_property(id);

            let usage = match aggregate.usages.get(id) {
                Some(Ok(record)) => latest_daily_total_kwh(record, today)
                    .map_or_else(|| "no data".to_string(), |kwh| format!("{:.3} kWh", kwh)),
                Some(Err(failure)) => format!("unavailable ({})", failure),
                None => "unavailable".to_string(),
            };
            let rate = aggregate
                .rates
                .get(id)
                .and_then(|r| r.special_incl_dollars_current_month)
                .map_or_else(|| "none".to_string(), |d| format!("${:.4}/kWh", d));
            let elements = aggregate.elements.get(id).map_or(0, |e| e.len());

            logger.info(&format!(
                "{}: latest day {}, special rate {}, {} report elements",
                property.display_name(),
                usage,
                rate,
                elements
            ));
        }
        Ok(())
    }
}
