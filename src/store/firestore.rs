//! Firestore REST backend.
//!
//! Snapshots live as documents in a single collection. Reads go through
//! `documents:runQuery` ordered on `timestamp`; writes are a plain document
//! create, which Firestore applies atomically.

use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, SecondsFormat, Utc};
use reqwest::{Client, RequestBuilder, Response};
use serde::Deserialize;
use serde_json::{Map, Value, json};
use tracing::{debug, warn};

use super::{SnapshotStore, StoreError};
use crate::config::FirestoreConfig;
use crate::models::energy::EnergySnapshot;

const TIMESTAMP_FIELD: &str = "timestamp";

pub struct FirestoreStore {
    client: Client,
    documents_url: String,
    collection: String,
    access_token: Option<String>,
}

#[derive(Debug, Deserialize)]
struct RunQueryRow {
    document: Option<Document>,
}

#[derive(Debug, Deserialize)]
struct Document {
    #[serde(default)]
    name: String,
    #[serde(default)]
    fields: Map<String, Value>,
}

impl FirestoreStore {
    pub fn new(cfg: &FirestoreConfig) -> Result<Self, StoreError> {
        let client = Client::builder()
            .timeout(Duration::from_secs(cfg.timeout_seconds))
            .build()?;

        Ok(Self {
            client,
            documents_url: format!(
                "{}/projects/{}/databases/{}/documents",
                cfg.base_url.trim_end_matches('/'),
                cfg.project_id,
                cfg.database
            ),
            collection: cfg.collection.clone(),
            access_token: cfg.access_token.clone().filter(|t| !t.is_empty()),
        })
    }

    fn authorized(&self, req: RequestBuilder) -> RequestBuilder {
        match &self.access_token {
            Some(token) => req.bearer_auth(token),
            None => req,
        }
    }

    async fn run_query(&self, structured_query: Value) -> Result<Vec<Document>, StoreError> {
        let url = format!("{}:runQuery", self.documents_url);
        let resp = self
            .authorized(self.client.post(&url))
            .json(&json!({ "structuredQuery": structured_query }))
            .send()
            .await?;
        let rows: Vec<RunQueryRow> = ensure_success(resp).await?.json().await?;
        Ok(rows.into_iter().filter_map(|row| row.document).collect())
    }

    fn base_query(&self, direction: &str) -> Map<String, Value> {
        let mut query = Map::new();
        query.insert("from".into(), json!([{ "collectionId": self.collection }]));
        query.insert(
            "orderBy".into(),
            json!([{ "field": { "fieldPath": TIMESTAMP_FIELD }, "direction": direction }]),
        );
        query
    }
}

#[async_trait]
impl SnapshotStore for FirestoreStore {
    async fn latest(&self) -> Result<Option<EnergySnapshot>, StoreError> {
        let mut query = self.base_query("DESCENDING");
        query.insert("limit".into(), json!(1));

        let docs = self.run_query(Value::Object(query)).await?;
        docs.into_iter().next().map(|doc| decode_document(&doc)).transpose()
    }

    async fn since(&self, from: DateTime<Utc>) -> Result<Vec<EnergySnapshot>, StoreError> {
        let mut query = self.base_query("ASCENDING");
        query.insert(
            "where".into(),
            json!({
                "fieldFilter": {
                    "field": { "fieldPath": TIMESTAMP_FIELD },
                    "op": "GREATER_THAN_OR_EQUAL",
                    "value": { "timestampValue": from.to_rfc3339_opts(SecondsFormat::Micros, true) }
                }
            }),
        );

        let docs = self.run_query(Value::Object(query)).await?;
        let mut snapshots = Vec::with_capacity(docs.len());
        for doc in &docs {
            match decode_document(doc) {
                Ok(s) => snapshots.push(s),
                // Documents written by older schemas cannot be totalled.
                Err(e) => warn!(document = %doc.name, error = %e, "skipping undecodable snapshot"),
            }
        }
        Ok(snapshots)
    }

    async fn append(&self, snapshot: &EnergySnapshot) -> Result<(), StoreError> {
        let url = format!("{}/{}", self.documents_url, self.collection);
        let body = json!({ "fields": encode_fields(snapshot)? });
        let resp = self.authorized(self.client.post(&url)).json(&body).send().await?;
        let resp = ensure_success(resp).await?;
        // The status already confirms the create; the body only names the document.
        let name = resp
            .json::<Document>()
            .await
            .map(|created| created.name)
            .unwrap_or_else(|_| "<unnamed>".to_string());
        debug!(document = %name, "snapshot document created");
        Ok(())
    }
}

async fn ensure_success(resp: Response) -> Result<Response, StoreError> {
    let status = resp.status();
    if status.is_success() {
        Ok(resp)
    } else {
        let body = resp.text().await.unwrap_or_default();
        Err(StoreError::Status { status, body })
    }
}

/// Maps a snapshot onto Firestore's typed value representation.
fn encode_fields(snapshot: &EnergySnapshot) -> Result<Map<String, Value>, StoreError> {
    let Value::Object(plain) = serde_json::to_value(snapshot)? else {
        return Err(StoreError::Decode("snapshot did not serialize to an object".into()));
    };

    Ok(plain
        .into_iter()
        .map(|(key, value)| {
            let typed = match value {
                Value::String(s) if key == TIMESTAMP_FIELD => json!({ "timestampValue": s }),
                Value::String(s) => json!({ "stringValue": s }),
                Value::Bool(b) => json!({ "booleanValue": b }),
                Value::Number(n) if n.is_f64() => json!({ "doubleValue": n }),
                // Firestore carries 64-bit integers as decimal strings.
                Value::Number(n) => json!({ "integerValue": n.to_string() }),
                Value::Null => json!({ "nullValue": null }),
                other => json!({ "stringValue": other.to_string() }),
            };
            (key, typed)
        })
        .collect())
}

fn decode_document(doc: &Document) -> Result<EnergySnapshot, StoreError> {
    let plain: Map<String, Value> = doc
        .fields
        .iter()
        .filter_map(|(key, typed)| decode_value(typed).map(|v| (key.clone(), v)))
        .collect();

    serde_json::from_value(Value::Object(plain))
        .map_err(|e| StoreError::Decode(format!("document {}: {}", doc.name, e)))
}

fn decode_value(typed: &Value) -> Option<Value> {
    let (kind, inner) = typed.as_object()?.iter().next()?;
    match kind.as_str() {
        "doubleValue" | "booleanValue" | "stringValue" | "timestampValue" => Some(inner.clone()),
        "integerValue" => inner
            .as_str()
            .and_then(|s| s.parse::<i64>().ok())
            .map(Value::from)
            .or_else(|| inner.as_i64().map(Value::from)),
        "nullValue" => Some(Value::Null),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::energy::WeatherSource;
    use chrono::TimeZone;

    fn snapshot() -> EnergySnapshot {
        EnergySnapshot {
            city: "Plovdiv".into(),
            solar_power_w: 812.5,
            load_power_w: 300.0,
            net_power_w: 512.5,
            energy_period_wh: 203.125,
            total_energy_today_wh: 1_450.0,
            battery_energy_wh: 12_728.125,
            battery_charge_percent: 75.76,
            battery_capacity_wh: 16_800.0,
            cloud_cover_percent: 20.0,
            is_daytime: true,
            hour_of_day: 11,
            weather_source: WeatherSource::Observed,
            timestamp: Utc.with_ymd_and_hms(2025, 6, 21, 8, 30, 0).unwrap(),
        }
    }

    #[test]
    fn test_encode_uses_typed_values() {
        let fields = encode_fields(&snapshot()).unwrap();
        assert_eq!(fields["city"], json!({ "stringValue": "Plovdiv" }));
        assert_eq!(fields["solarPowerW"], json!({ "doubleValue": 812.5 }));
        assert_eq!(fields["hourOfDay"], json!({ "integerValue": "11" }));
        assert_eq!(fields["isDaytime"], json!({ "booleanValue": true }));
        assert_eq!(fields["weatherSource"], json!({ "stringValue": "observed" }));
        assert_eq!(fields["timestamp"], json!({ "timestampValue": "2025-06-21T08:30:00Z" }));
    }

    #[test]
    fn test_decode_reverses_encode() {
        let original = snapshot();
        let doc = Document {
            name: "projects/p/databases/(default)/documents/solarData/abc".into(),
            fields: encode_fields(&original).unwrap(),
        };
        assert_eq!(decode_document(&doc).unwrap(), original);
    }

    #[test]
    fn test_decode_accepts_integer_encoded_doubles() {
        let mut fields = encode_fields(&snapshot()).unwrap();
        fields.insert("batteryCapacityWh".into(), json!({ "integerValue": "16800" }));
        fields.insert("timestamp".into(), json!({ "timestampValue": "2025-06-21T08:30:00.123456Z" }));
        let doc = Document { name: "d".into(), fields };
        let decoded = decode_document(&doc).unwrap();
        assert_eq!(decoded.battery_capacity_wh, 16_800.0);
    }

    #[test]
    fn test_decode_rejects_legacy_document() {
        let mut fields = Map::new();
        fields.insert("city".into(), json!({ "stringValue": "Plovdiv" }));
        fields.insert("powerW".into(), json!({ "integerValue": "512" }));
        fields.insert("batteryCharge".into(), json!({ "integerValue": "40" }));
        let doc = Document { name: "legacy".into(), fields };
        assert!(matches!(decode_document(&doc), Err(StoreError::Decode(_))));
    }
}
