//! Wire types for the feed service API.
//!
//! Both API generations answer with the same envelope idea under
//! different field names (`code`/`msg` now, `status`/`message` before);
//! one envelope type absorbs both and the decode boundary turns it into
//! the tagged [`ApiResult`]. Manifest payloads are either nested
//! `dataType x dataTime` buckets (current generation) or a flat list
//! (legacy), captured by [`ManifestData`].

use chrono::{Local, TimeDelta};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::collections::BTreeMap;

/// Manifest bucket axes, in download order.
pub const DATA_TYPES: [&str; 2] = ["newly", "actively"];
pub const DATA_TIMES: [&str; 4] = ["30day", "15day", "7day", "1day"];

/// Cursor value that opens a pagination sequence.
pub const CURSOR_START: i64 = 0;
/// Cursor value marking the base-observation page of a GBT sequence.
pub const CURSOR_BASE: i64 = 1;
/// Cursor value signalling end-of-sequence.
pub const CURSOR_DONE: i64 = -1;

/// Response envelope, normalized across both API generations.
#[derive(Debug, Deserialize)]
pub struct Envelope {
    #[serde(alias = "status")]
    pub code: i64,
    #[serde(default, alias = "message")]
    pub msg: Option<String>,
    #[serde(default)]
    pub data: Value,
}

/// Decoded service answer.
///
/// `Empty` stands in for the swallowed non-200 case: the transport got
/// an answer but no payload, and carries the status so callers can
/// still tell "service said no" from "service said nothing".
#[derive(Debug, Clone, PartialEq)]
pub enum ApiResult<T> {
    Success(T),
    ServiceError { code: i64, message: String },
    Empty { status: Option<u16> },
}

impl<T> ApiResult<T> {
    pub fn is_success(&self) -> bool {
        matches!(self, ApiResult::Success(_))
    }

    pub fn into_data(self) -> Option<T> {
        match self {
            ApiResult::Success(data) => Some(data),
            _ => None,
        }
    }
}

/// Decode an envelope, treating `ok_code` as success.
///
/// The current generation reports success as 0, the legacy one as 1.
pub fn decode_envelope<T: DeserializeOwned>(
    bytes: &[u8],
    ok_code: i64,
) -> Result<ApiResult<T>, serde_json::Error> {
    let envelope: Envelope = serde_json::from_slice(bytes)?;

    if envelope.code != ok_code {
        return Ok(ApiResult::ServiceError {
            code: envelope.code,
            message: envelope.msg.unwrap_or_default(),
        });
    }

    Ok(ApiResult::Success(serde_json::from_value(envelope.data)?))
}

/// One downloadable dataset in the daily manifest.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
pub struct ManifestEntry {
    #[serde(rename = "dataName")]
    pub data_name: String,
    pub cursor: i64,
    pub md5: String,
}

/// Manifest payload across both generations.
#[derive(Debug, Clone, Deserialize)]
#[serde(untagged)]
pub enum ManifestData {
    /// Current generation: `data[dataType][dataTime]` buckets
    Buckets(BTreeMap<String, BTreeMap<String, Vec<ManifestEntry>>>),
    /// Legacy generation: flat list for `type: all`
    Flat(Vec<ManifestEntry>),
}

/// A manifest entry paired with its derived output filename.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FeedFile {
    pub file_name: String,
    pub entry: ManifestEntry,
}

impl ManifestData {
    /// Flatten into download order.
    ///
    /// Buckets iterate in the fixed `DATA_TYPES` x `DATA_TIMES` order;
    /// bucket labels the service does not document are not downloaded.
    pub fn files(&self) -> Vec<FeedFile> {
        match self {
            ManifestData::Buckets(buckets) => {
                let mut files = Vec::new();
                for data_type in DATA_TYPES {
                    let Some(times) = buckets.get(data_type) else {
                        continue;
                    };
                    for data_time in DATA_TIMES {
                        let Some(entries) = times.get(data_time) else {
                            continue;
                        };
                        for entry in entries {
                            files.push(FeedFile {
                                file_name: bucketed_file_name(
                                    data_type,
                                    data_time,
                                    &entry.data_name,
                                ),
                                entry: entry.clone(),
                            });
                        }
                    }
                }
                files
            }
            ManifestData::Flat(entries) => entries
                .iter()
                .map(|entry| FeedFile {
                    file_name: flat_file_name(&entry.data_name),
                    entry: entry.clone(),
                })
                .collect(),
        }
    }
}

/// Output filename for a bucketed (current generation) dataset
pub fn bucketed_file_name(data_type: &str, data_time: &str, data_name: &str) -> String {
    format!("{}-{}-{}.json.zip", data_type, data_time, data_name)
}

/// Output filename for a flat (legacy generation) dataset
pub fn flat_file_name(data_name: &str) -> String {
    format!("{}.json.zip", data_name)
}

/// One page of a GBT pagination sequence.
#[derive(Debug, Deserialize)]
pub struct GbtPage {
    pub cursor: i64,
    #[serde(default)]
    pub observation: Option<Observation>,
    #[serde(default)]
    pub value: Vec<Value>,
}

/// Observable bundle accumulated across GBT pages.
///
/// The schema beyond `object[].value` is service-defined and passes
/// through untouched.
#[derive(Debug, Clone, Default, PartialEq, Deserialize, Serialize)]
pub struct Observation {
    #[serde(default)]
    pub object: Vec<ObservationObject>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

#[derive(Debug, Clone, Default, PartialEq, Deserialize, Serialize)]
pub struct ObservationObject {
    #[serde(default)]
    pub value: Vec<Value>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl Observation {
    pub fn is_empty(&self) -> bool {
        self.object.is_empty() && self.extra.is_empty()
    }

    /// Fold a follow-up page's values into the base observation.
    pub fn absorb(&mut self, mut values: Vec<Value>) {
        if let Some(first) = self.object.first_mut() {
            first.value.append(&mut values);
        }
    }
}

/// The manifest date for `today - days_back`, formatted `YYYYMMDD`.
///
/// Computed once per bulk invocation so the listing call and every
/// per-entry fetch agree even across a midnight boundary.
pub fn feed_date(days_back: u32) -> String {
    (Local::now() - TimeDelta::days(i64::from(days_back)))
        .format("%Y%m%d")
        .to_string()
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_envelope_accepts_both_generations() {
        let current: Envelope = serde_json::from_value(json!({
            "code": 0,
            "msg": "ok",
            "data": {"cursor": -1}
        }))
        .unwrap();
        assert_eq!(current.code, 0);
        assert_eq!(current.msg.as_deref(), Some("ok"));

        let legacy: Envelope = serde_json::from_value(json!({
            "status": 1,
            "message": "done",
            "data": []
        }))
        .unwrap();
        assert_eq!(legacy.code, 1);
        assert_eq!(legacy.msg.as_deref(), Some("done"));
    }

    #[test]
    fn test_decode_envelope_service_error() {
        let body = json!({"code": 42, "msg": "quota exceeded", "data": null}).to_string();
        let result: ApiResult<Value> = decode_envelope(body.as_bytes(), 0).unwrap();

        assert_eq!(
            result,
            ApiResult::ServiceError {
                code: 42,
                message: "quota exceeded".to_string()
            }
        );
    }

    #[test]
    fn test_manifest_flat_and_bucketed_decode() {
        let flat: ManifestData = serde_json::from_value(json!([
            {"dataName": "malware-ip", "cursor": 7, "md5": "aa"}
        ]))
        .unwrap();
        assert!(matches!(flat, ManifestData::Flat(_)));

        let bucketed: ManifestData = serde_json::from_value(json!({
            "actively": {"7day": [{"dataName": "malware-ip", "cursor": 7, "md5": "aa"}]},
            "newly": {"1day": []}
        }))
        .unwrap();
        assert!(matches!(bucketed, ManifestData::Buckets(_)));
    }

    #[test]
    fn test_files_order_and_names() {
        let manifest: ManifestData = serde_json::from_value(json!({
            "actively": {
                "7day": [{"dataName": "malware-ip", "cursor": 2, "md5": "bb"}]
            },
            "newly": {
                "1day": [{"dataName": "botnet-domain", "cursor": 1, "md5": "aa"}]
            }
        }))
        .unwrap();

        let files = manifest.files();
        // "newly" buckets come before "actively" regardless of map order
        assert_eq!(files[0].file_name, "newly-1day-botnet-domain.json.zip");
        assert_eq!(files[1].file_name, "actively-7day-malware-ip.json.zip");
    }

    #[test]
    fn test_file_name_schemes() {
        assert_eq!(
            bucketed_file_name("actively", "7day", "malware-ip"),
            "actively-7day-malware-ip.json.zip"
        );
        assert_eq!(flat_file_name("malware-ip"), "malware-ip.json.zip");
    }

    #[test]
    fn test_unknown_buckets_are_not_downloaded() {
        let manifest: ManifestData = serde_json::from_value(json!({
            "experimental": {"7day": [{"dataName": "x", "cursor": 1, "md5": "cc"}]}
        }))
        .unwrap();

        assert!(manifest.files().is_empty());
    }

    #[test]
    fn test_observation_absorb() {
        let mut observation: Observation = serde_json::from_value(json!({
            "id": "bundle-1",
            "object": [{"type": "indicator", "value": [1, 2]}]
        }))
        .unwrap();

        observation.absorb(vec![json!(3), json!(4)]);

        assert_eq!(observation.object[0].value.len(), 4);
        assert_eq!(observation.extra["id"], json!("bundle-1"));
    }

    #[test]
    fn test_absorb_without_base_is_a_no_op() {
        let mut observation = Observation::default();
        observation.absorb(vec![json!(1)]);
        assert!(observation.is_empty());
    }

    #[test]
    fn test_feed_date_shape() {
        let date = feed_date(1);
        assert_eq!(date.len(), 8);
        assert!(date.chars().all(|c| c.is_ascii_digit()));
    }
}
