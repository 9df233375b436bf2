use aurora_types::{LedgerCloseMeta, LedgerRange};
use base64::Engine;
use serde::{Deserialize, Deserializer, Serialize, Serializer};

/// Status of a pending or finished range preparation.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PrepareRangeResponse {
    pub ledger_range: LedgerRange,
    /// Seconds since the Unix epoch when preparation started.
    pub start_time: u64,
    pub ready: bool,
    /// Milliseconds preparation took, zero until ready.
    pub ready_duration: u64,
}

/// Response of `GET /latest-sequence`.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct LatestLedgerSequenceResponse {
    pub sequence: u32,
}

/// Response of `GET /ledger/{sequence}`.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct LedgerResponse {
    pub present: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ledger: Option<Base64Ledger>,
}

/// `LedgerCloseMeta` carried as a base64 string on the wire.
#[derive(Clone, Debug, PartialEq)]
pub struct Base64Ledger(pub LedgerCloseMeta);

impl Serialize for Base64Ledger {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let bytes = bincode::serialize(&self.0).map_err(serde::ser::Error::custom)?;
        let encoded = base64::engine::general_purpose::STANDARD.encode(bytes);
        serializer.serialize_str(&encoded)
    }
}

impl<'de> Deserialize<'de> for Base64Ledger {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let text = String::deserialize(deserializer)?;
        let bytes = base64::engine::general_purpose::STANDARD
            .decode(text)
            .map_err(serde::de::Error::custom)?;
        let meta = bincode::deserialize(&bytes).map_err(serde::de::Error::custom)?;
        Ok(Base64Ledger(meta))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn base64_ledger_roundtrip() {
        let ledger = Base64Ledger(LedgerCloseMeta::empty(64));
        let json = serde_json::to_string(&ledger).unwrap();
        assert!(json.starts_with('"'));
        let back: Base64Ledger = serde_json::from_str(&json).unwrap();
        assert_eq!(back, ledger);
    }

    #[test]
    fn prepare_range_response_uses_camel_case() {
        let response = PrepareRangeResponse {
            ledger_range: LedgerRange::bounded(100, 200),
            start_time: 1_600_000_000,
            ready: true,
            ready_duration: 2_500,
        };
        let json = serde_json::to_value(&response).unwrap();
        assert!(json.get("ledgerRange").is_some());
        assert!(json.get("startTime").is_some());
        assert!(json.get("readyDuration").is_some());

        let back: PrepareRangeResponse = serde_json::from_value(json).unwrap();
        assert_eq!(back, response);
    }

    #[test]
    fn absent_ledger_serializes_without_payload() {
        let response = LedgerResponse {
            present: false,
            ledger: None,
        };
        let json = serde_json::to_string(&response).unwrap();
        assert!(!json.contains("ledger\""));
        let back: LedgerResponse = serde_json::from_str(&json).unwrap();
        assert!(!back.present);
        assert!(back.ledger.is_none());
    }

    #[test]
    fn corrupt_base64_is_rejected() {
        let err = serde_json::from_str::<Base64Ledger>("\"not!base64!\"");
        assert!(err.is_err());
    }
}
