// manifest.rs
//
// Serde model of the logger manifest returned for
// `logger.json?id=<function>[&from=..][&to=..]`, plus the calibration
// decoding helpers shared by old and new firmware generations.

use serde::{Deserialize, Deserializer};

/// Manifest describing the set of recorded streams for one function.
#[derive(Debug, Clone, Deserialize)]
pub struct LogManifest {
    pub id: String,
    #[serde(default)]
    pub unit: String,
    /// Maximum number of streams the device accepts in one combined request.
    #[serde(default)]
    pub bulk: u32,
    /// Calibration parameters, newer firmware ("calib" float list).
    #[serde(default)]
    pub calib: Option<String>,
    /// Calibration parameters, legacy firmware ("cal" word list).
    #[serde(default)]
    pub cal: Option<String>,
    #[serde(default)]
    pub streams: Vec<StreamEntry>,
}

/// One per-stream manifest entry, consumable by the stream descriptor
/// factory. Times and intervals are in seconds.
#[derive(Debug, Clone, Deserialize)]
pub struct StreamEntry {
    /// Stream start, UTC seconds.
    pub utc: f64,
    /// Stream duration, seconds.
    pub dur: f64,
    /// Steady-state sample interval, seconds.
    pub itv: f64,
    /// First-sample interval; 0 or absent means same as `itv`.
    #[serde(default)]
    pub fitv: f64,
    #[serde(default = "nan", deserialize_with = "null_as_nan")]
    pub min: f64,
    #[serde(default = "nan", deserialize_with = "null_as_nan")]
    pub avg: f64,
    #[serde(default = "nan", deserialize_with = "null_as_nan")]
    pub max: f64,
}

fn nan() -> f64 {
    f64::NAN
}

fn null_as_nan<'de, D>(deserializer: D) -> Result<f64, D::Error>
where
    D: Deserializer<'de>,
{
    let value: Option<f64> = Deserialize::deserialize(deserializer)?;
    Ok(value.unwrap_or(f64::NAN))
}

impl LogManifest {
    /// Decodes the calibration parameter list, preferring the newer
    /// "calib" encoding over the legacy "cal" word list. The first "calib"
    /// element is a millisecond divisor and is brought back to seconds by
    /// integer division.
    pub fn calibration(&self) -> Vec<f64> {
        if let Some(calib) = &self.calib {
            let mut values = decode_floats(calib);
            if let Some(first) = values.first_mut() {
                *first = ((*first as i64) / 1000) as f64;
            }
            values
        } else if let Some(cal) = &self.cal {
            decode_words(cal)
        } else {
            Vec::new()
        }
    }
}

/// Decodes a comma-separated float list ("calib" encoding).
pub fn decode_floats(encoded: &str) -> Vec<f64> {
    encoded
        .split(',')
        .filter_map(|s| s.trim().parse::<f64>().ok())
        .collect()
}

/// Decodes a whitespace-separated integer word list (legacy "cal" encoding).
pub fn decode_words(encoded: &str) -> Vec<f64> {
    encoded
        .split_whitespace()
        .filter_map(|s| s.parse::<i64>().ok())
        .map(|w| w as f64)
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_calib_preferred_over_cal() {
        let manifest: LogManifest = serde_json::from_str(
            r#"{"id":"temperature1","unit":"degC","calib":"2000,0.5,1.5","cal":"17 42","streams":[]}"#,
        )
        .unwrap();

        // 2000 ms divisor becomes 2 via integer division
        assert_eq!(manifest.calibration(), vec![2.0, 0.5, 1.5]);
    }

    #[test]
    fn test_calib_divisor_truncates() {
        let manifest: LogManifest =
            serde_json::from_str(r#"{"id":"f","calib":"1999,3.25","streams":[]}"#).unwrap();
        assert_eq!(manifest.calibration(), vec![1.0, 3.25]);
    }

    #[test]
    fn test_legacy_cal_fallback() {
        let manifest: LogManifest =
            serde_json::from_str(r#"{"id":"f","cal":"17 42 3","streams":[]}"#).unwrap();
        assert_eq!(manifest.calibration(), vec![17.0, 42.0, 3.0]);
    }

    #[test]
    fn test_no_calibration() {
        let manifest: LogManifest = serde_json::from_str(r#"{"id":"f","streams":[]}"#).unwrap();
        assert!(manifest.calibration().is_empty());
    }

    #[test]
    fn test_stream_entry_defaults() {
        let entry: StreamEntry =
            serde_json::from_str(r#"{"utc":1710287585.0,"dur":60.0,"itv":1.0}"#).unwrap();
        assert_eq!(entry.fitv, 0.0);
        assert!(entry.min.is_nan());
        assert!(entry.avg.is_nan());
        assert!(entry.max.is_nan());
    }

    #[test]
    fn test_stream_entry_null_summary() {
        let entry: StreamEntry = serde_json::from_str(
            r#"{"utc":0.0,"dur":1.0,"itv":1.0,"min":null,"avg":2.0,"max":null}"#,
        )
        .unwrap();
        assert!(entry.min.is_nan());
        assert_eq!(entry.avg, 2.0);
        assert!(entry.max.is_nan());
    }
}
