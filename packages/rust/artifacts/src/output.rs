//! Output aggregation: one CSV artifact per extraction invocation.
//!
//! The key is `data/{category}/{YYYY_MM_DD}/{HH}/{city}/{post_id}.csv`, where
//! the identity comes from the first record and the day and hour from the
//! publish-time clock. The header is the first record's field names.
//! Nothing is written when no records were collected.

use chrono::{DateTime, Utc};
use tracing::{info, instrument, warn};

use listharvest_shared::{ExtractedRecord, HarvestError, Result};
use listharvest_storage::Storage;

use crate::{DAY_FORMAT, HOUR_FORMAT};

/// Output key for an artifact whose first record is `first`.
pub fn output_key(first: &ExtractedRecord, now: DateTime<Utc>) -> String {
    format!(
        "data/{}/{}/{}/{}/{}.csv",
        first.category,
        now.format(DAY_FORMAT),
        now.format(HOUR_FORMAT),
        first.city,
        first.post_id
    )
}

/// Render `records` as CSV. The header comes from the first record.
pub fn render_csv(records: &[ExtractedRecord]) -> Result<Vec<u8>> {
    let Some(first) = records.first() else {
        return Ok(Vec::new());
    };

    let csv_err = |e: csv::Error| HarvestError::Serialization(format!("csv: {e}"));
    let mut writer = csv::Writer::from_writer(Vec::new());
    writer.write_record(first.field_names()).map_err(csv_err)?;
    for record in records {
        writer.write_record(record.to_row()?).map_err(csv_err)?;
    }

    writer
        .into_inner()
        .map_err(|e| HarvestError::Serialization(format!("csv: {e}")))
}

/// Result of [`Aggregator::publish`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PublishOutcome {
    Published { key: String, rows: usize },
    /// No records were collected; nothing was written.
    Empty,
}

/// Collects records for one invocation and publishes them as one artifact.
#[derive(Debug, Default)]
pub struct Aggregator {
    records: Vec<ExtractedRecord>,
}

impl Aggregator {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, record: ExtractedRecord) {
        self.records.push(record);
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    /// Write the aggregated records to `bucket`.
    #[instrument(skip(self, storage), fields(records = self.records.len()))]
    pub async fn publish(
        &self,
        storage: &Storage,
        bucket: &str,
        now: DateTime<Utc>,
    ) -> Result<PublishOutcome> {
        let Some(first) = self.records.first() else {
            warn!("no records collected, nothing published");
            return Ok(PublishOutcome::Empty);
        };

        let key = output_key(first, now);
        let body = render_csv(&self.records)?;
        storage.put(bucket, &key, body).await?;

        info!(%key, rows = self.records.len(), "published output artifact");
        Ok(PublishOutcome::Published {
            key,
            rows: self.records.len(),
        })
    }
}

#[cfg(test)]
mod tests {
    use chrono::TimeZone;

    use super::*;

    fn record(city: &str, post_id: &str) -> ExtractedRecord {
        ExtractedRecord {
            city: city.into(),
            category: "fuo".into(),
            post_id: post_id.into(),
            time_posted: "2024-01-20T09:15:00-0500".into(),
            last_updated: "2024-01-22T18:40:00-0500".into(),
            time_downloaded: "2024-01-25T02:13:55+0000".into(),
            title: "Vintage Chair".into(),
            body_text: "Solid oak, \"like new\", pickup only".into(),
            latitude: "42.35".into(),
            longitude: "-71.06".into(),
            image_s3_keys: vec!["images/a.jpg".into(), "images/b.jpg".into()],
        }
    }

    fn now() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 1, 25, 2, 13, 55).unwrap()
    }

    #[test]
    fn key_uses_first_record_identity() {
        assert_eq!(
            output_key(&record("boston", "123456"), now()),
            "data/fuo/2024_01_25/02/boston/123456.csv"
        );
    }

    #[test]
    fn csv_has_header_and_one_row_per_record() {
        let records = vec![record("boston", "1"), record("boston", "2")];
        let bytes = render_csv(&records).unwrap();

        let mut reader = csv::Reader::from_reader(bytes.as_slice());
        let header: Vec<String> = reader
            .headers()
            .unwrap()
            .iter()
            .map(str::to_string)
            .collect();
        assert_eq!(header, ExtractedRecord::FIELD_NAMES);

        let rows: Vec<csv::StringRecord> = reader.records().map(|r| r.unwrap()).collect();
        assert_eq!(rows.len(), 2);
        assert_eq!(&rows[1][2], "2");
        assert_eq!(&rows[0][7], "Solid oak, \"like new\", pickup only");
        assert_eq!(&rows[0][10], r#"["images/a.jpg","images/b.jpg"]"#);
    }

    #[tokio::test]
    async fn publish_writes_one_artifact() {
        let storage = Storage::in_memory(&["data"]);
        let mut aggregator = Aggregator::new();
        aggregator.push(record("boston", "10"));
        aggregator.push(record("chicago", "11"));

        let outcome = aggregator.publish(&storage, "data", now()).await.unwrap();
        assert_eq!(
            outcome,
            PublishOutcome::Published {
                key: "data/fuo/2024_01_25/02/boston/10.csv".into(),
                rows: 2,
            }
        );
        assert_eq!(storage.list("data", Some("data/")).await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn republish_in_same_hour_overwrites() {
        let storage = Storage::in_memory(&["data"]);
        let first_run = Utc.with_ymd_and_hms(2024, 1, 25, 2, 5, 0).unwrap();
        let second_run = Utc.with_ymd_and_hms(2024, 1, 25, 2, 50, 0).unwrap();

        let mut aggregator = Aggregator::new();
        aggregator.push(record("boston", "10"));
        aggregator.push(record("boston", "11"));
        let first = aggregator.publish(&storage, "data", first_run).await.unwrap();

        let mut aggregator = Aggregator::new();
        aggregator.push(record("boston", "10"));
        let second = aggregator.publish(&storage, "data", second_run).await.unwrap();

        let key = "data/fuo/2024_01_25/02/boston/10.csv".to_string();
        assert_eq!(first, PublishOutcome::Published { key: key.clone(), rows: 2 });
        assert_eq!(second, PublishOutcome::Published { key: key.clone(), rows: 1 });

        assert_eq!(storage.list("data", None).await.unwrap(), vec![key.clone()]);
        let body = storage.get("data", &key).await.unwrap();
        let mut reader = csv::Reader::from_reader(body.as_slice());
        assert_eq!(reader.records().count(), 1);
    }

    #[tokio::test]
    async fn empty_aggregator_writes_nothing() {
        let storage = Storage::in_memory(&["data"]);
        let aggregator = Aggregator::new();

        let outcome = aggregator.publish(&storage, "data", now()).await.unwrap();
        assert_eq!(outcome, PublishOutcome::Empty);
        assert!(storage.list("data", None).await.unwrap().is_empty());
    }
}
