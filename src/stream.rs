// stream.rs
//
// Descriptor for one contiguous device-resident block of logged samples.
// Metadata comes from the manifest; the decoded rows are populated lazily,
// either from the stream's own URL or from a combined bulk response.

use crate::constants::LOGGER_ENDPOINT;
use crate::error::Result;
use crate::manifest::StreamEntry;
use serde::Deserialize;
use serde_json::Value;
use tracing::debug;

#[derive(Debug, Clone)]
pub struct DataStream {
    base_url: String,
    url_suffix: String,
    start_time: f64,
    duration: f64,
    sample_interval: f64,
    first_interval: f64,
    min_value: f64,
    avg_value: f64,
    max_value: f64,
    rows: Vec<Vec<f64>>,
    loaded: bool,
}

impl DataStream {
    pub fn new(function_id: &str, entry: &StreamEntry) -> Self {
        let start_ms = (entry.utc * 1000.0).round() as i64;
        Self {
            base_url: format!("{}?id={}", LOGGER_ENDPOINT, function_id),
            url_suffix: start_ms.to_string(),
            start_time: entry.utc,
            duration: entry.dur,
            sample_interval: entry.itv,
            first_interval: entry.fitv,
            min_value: entry.min,
            avg_value: entry.avg,
            max_value: entry.max,
            rows: Vec::new(),
            loaded: false,
        }
    }

    /// Stream start, UTC seconds.
    pub fn real_start_time_utc(&self) -> f64 {
        self.start_time
    }

    /// Stream duration, seconds.
    pub fn real_duration(&self) -> f64 {
        self.duration
    }

    /// Steady-state interval between samples, seconds.
    pub fn sample_interval(&self) -> f64 {
        self.sample_interval
    }

    /// Interval covered by the first sample; falls back to the steady-state
    /// interval when the manifest reports none.
    pub fn first_sample_interval(&self) -> f64 {
        if self.first_interval > 0.0 {
            self.first_interval
        } else {
            self.sample_interval
        }
    }

    /// Stream start, rounded to integer milliseconds.
    pub fn start_time_ms(&self) -> i64 {
        (self.start_time * 1000.0).round() as i64
    }

    /// Stream duration, rounded to integer milliseconds.
    pub fn duration_ms(&self) -> i64 {
        (self.duration * 1000.0).round() as i64
    }

    /// Reported stream-level summary; only meaningful before a row decode,
    /// straight from the manifest metadata.
    pub fn min_value(&self) -> f64 {
        self.min_value
    }

    pub fn avg_value(&self) -> f64 {
        self.avg_value
    }

    pub fn max_value(&self) -> f64 {
        self.max_value
    }

    pub fn was_loaded(&self) -> bool {
        self.loaded
    }

    /// Decoded raw rows, each 1 or 3 columns. Empty until loaded.
    pub fn data_rows(&self) -> &[Vec<f64>] {
        &self.rows
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    pub fn url_suffix(&self) -> &str {
        &self.url_suffix
    }

    pub fn url(&self) -> String {
        format!("{}&utc={}", self.base_url, self.url_suffix)
    }

    /// Decodes a raw stream payload (JSON array of numeric rows, nulls
    /// standing for NaN) and marks the stream loaded.
    pub fn parse_stream(&mut self, data: &[u8]) -> Result<()> {
        let rows: Vec<Vec<Option<f64>>> = serde_json::from_slice(data)?;
        self.store_rows(rows);
        Ok(())
    }

    /// Same as [`parse_stream`](Self::parse_stream) but from one block of an
    /// already-parsed bulk response.
    pub fn parse_block(&mut self, block: &Value) -> Result<()> {
        let rows: Vec<Vec<Option<f64>>> = Deserialize::deserialize(block)?;
        self.store_rows(rows);
        Ok(())
    }

    fn store_rows(&mut self, rows: Vec<Vec<Option<f64>>>) {
        self.rows = rows
            .into_iter()
            .map(|row| row.into_iter().map(|v| v.unwrap_or(f64::NAN)).collect())
            .collect();
        self.loaded = true;
        debug!(
            suffix = %self.url_suffix,
            rows = self.rows.len(),
            "stream decoded"
        );
    }
}

/// Splits a raw row into (min, avg, max). Single-column rows report one
/// value for all three; anything else malformed yields NaN.
pub(crate) fn split_row(row: &[f64]) -> (f64, f64, f64) {
    match row.len() {
        0 => (f64::NAN, f64::NAN, f64::NAN),
        1 => (row[0], row[0], row[0]),
        _ => (row[0], row[1], row[row.len().min(3) - 1]),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::manifest::StreamEntry;
    use pretty_assertions::assert_eq;

    fn entry(utc: f64, dur: f64, itv: f64, fitv: f64) -> StreamEntry {
        serde_json::from_value(serde_json::json!({
            "utc": utc, "dur": dur, "itv": itv, "fitv": fitv,
            "min": 1.0, "avg": 2.0, "max": 3.0
        }))
        .unwrap()
    }

    #[test]
    fn test_url_identity() {
        let stream = DataStream::new("temperature1", &entry(1710287585.5, 60.0, 1.0, 0.0));
        assert_eq!(stream.base_url(), "logger.json?id=temperature1");
        assert_eq!(stream.url_suffix(), "1710287585500");
        assert_eq!(
            stream.url(),
            "logger.json?id=temperature1&utc=1710287585500"
        );
    }

    #[test]
    fn test_first_interval_fallback() {
        let stream = DataStream::new("f", &entry(0.0, 10.0, 1.0, 0.0));
        assert_eq!(stream.first_sample_interval(), 1.0);

        let stream = DataStream::new("f", &entry(0.0, 10.0, 1.0, 0.5));
        assert_eq!(stream.first_sample_interval(), 0.5);
    }

    #[test]
    fn test_parse_stream_nulls_become_nan() {
        let mut stream = DataStream::new("f", &entry(0.0, 3.0, 1.0, 0.0));
        assert!(!stream.was_loaded());

        stream
            .parse_stream(br#"[[1.0,2.0,3.0],[null,null,null]]"#)
            .unwrap();
        assert!(stream.was_loaded());
        assert_eq!(stream.data_rows().len(), 2);
        assert_eq!(stream.data_rows()[0], vec![1.0, 2.0, 3.0]);
        assert!(stream.data_rows()[1][1].is_nan());
    }

    #[test]
    fn test_parse_stream_rejects_garbage() {
        let mut stream = DataStream::new("f", &entry(0.0, 3.0, 1.0, 0.0));
        assert!(stream.parse_stream(b"not json").is_err());
        assert!(!stream.was_loaded());
    }

    #[test]
    fn test_split_row_shapes() {
        assert_eq!(split_row(&[5.0]), (5.0, 5.0, 5.0));
        assert_eq!(split_row(&[1.0, 2.0, 3.0]), (1.0, 2.0, 3.0));
        let (min, avg, max) = split_row(&[]);
        assert!(min.is_nan() && avg.is_nan() && max.is_nan());
    }
}
