//! Measurement records as written by the measurement client into result files.
//!
//! A result file is a JSON array with one object per measured URL. Field names
//! contain spaces and flags arrive either as JSON booleans or as the strings
//! `"True"`/`"False"`, so most fields are modelled loosely and interpreted at
//! render time.

use std::fmt;

use serde::Deserialize;

use super::error::DomainError;

/// Name of a file inside the results directory.
///
/// Only bare file names are accepted; anything that could address a path
/// outside the directory is rejected.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ResultName(String);

impl ResultName {
    pub fn parse(value: &str) -> Result<Self, DomainError> {
        let rejected = matches!(value, "" | "." | "..") || value.contains(['/', '\\', '\0']);
        if rejected {
            return Err(DomainError::not_found("result file"));
        }
        Ok(Self(value.to_string()))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for ResultName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// A loosely typed scalar cell.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(untagged)]
pub enum FieldValue {
    Bool(bool),
    Number(serde_json::Number),
    Text(String),
}

impl FieldValue {
    /// Colour for a flag where `True` means interference was detected.
    pub fn anomaly_style(&self) -> CellStyle {
        match self.to_string().as_str() {
            "True" => CellStyle::Danger,
            "False" => CellStyle::Success,
            _ => CellStyle::Default,
        }
    }

    /// Colour for an HTTP status code by its class.
    pub fn status_style(&self) -> CellStyle {
        match self.to_string().chars().next() {
            Some('2') => CellStyle::Success,
            Some('3') => CellStyle::Warning,
            Some('4') => CellStyle::Danger,
            _ => CellStyle::Default,
        }
    }
}

impl fmt::Display for FieldValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FieldValue::Bool(true) => f.write_str("True"),
            FieldValue::Bool(false) => f.write_str("False"),
            FieldValue::Number(number) => write!(f, "{number}"),
            FieldValue::Text(text) => f.write_str(text),
        }
    }
}

/// Bootstrap contextual class applied to a table cell.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CellStyle {
    Success,
    Warning,
    Danger,
    Default,
}

impl CellStyle {
    pub fn as_class(self) -> &'static str {
        match self {
            CellStyle::Success => "success",
            CellStyle::Warning => "warning",
            CellStyle::Danger => "danger",
            CellStyle::Default => "default",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct MeasurementRecord {
    pub url: String,
    #[serde(rename = "url comment", default)]
    pub url_comment: Option<String>,
    #[serde(default)]
    pub status: Option<FieldValue>,
    #[serde(rename = "status comment", default)]
    pub status_comment: Option<String>,
    #[serde(rename = "block page", default)]
    pub block_page: Option<FieldValue>,
    #[serde(rename = "dns tampering", default)]
    pub dns_tampering: Option<FieldValue>,
    #[serde(rename = "sequence number anomaly", default)]
    pub sequence_number_anomaly: Option<FieldValue>,
    #[serde(rename = "ttl anomaly", default)]
    pub ttl_anomaly: Option<FieldValue>,
    #[serde(default)]
    pub extra: Option<RecordExtra>,
}

#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(default)]
pub struct RecordExtra {
    #[serde(rename = "block page comment")]
    pub block_page_comment: Option<String>,
    #[serde(rename = "dns tampering comment")]
    pub dns_tampering_comment: Option<String>,
    #[serde(rename = "sequence number anomaly comment")]
    pub sequence_number_anomaly_comment: Option<String>,
    #[serde(rename = "SYN-ACK IPID")]
    pub syn_ack_ipid: Option<i64>,
    #[serde(rename = "SYN-ACK TTL")]
    pub syn_ack_ttl: Option<i64>,
    #[serde(rename = "TTL anomalies")]
    pub ttl_anomalies: Option<Vec<TtlAnomaly>>,
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct TtlAnomaly {
    #[serde(rename = "IPID")]
    pub ipid: i64,
    #[serde(rename = "TTL")]
    pub ttl: i64,
    #[serde(rename = "RST injection")]
    pub rst_injection: FieldValue,
}

/// Decode the contents of a result file.
pub fn parse_records(bytes: &[u8]) -> Result<Vec<MeasurementRecord>, DomainError> {
    serde_json::from_slice(bytes).map_err(DomainError::MalformedResults)
}
