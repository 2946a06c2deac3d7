//! Qdrant backend implementation.

use std::collections::{HashMap, HashSet};

use async_trait::async_trait;
use qdrant_client::qdrant::vectors_config::Config as VectorsConfig;
use qdrant_client::qdrant::with_payload_selector::SelectorOptions;
use qdrant_client::qdrant::{
    CollectionInfo, Condition, CountPointsBuilder, CreateCollectionBuilder, DeletePointsBuilder,
    Distance, Filter, GetPointsBuilder, PointId, PointStruct, SearchPointsBuilder,
    UpsertPointsBuilder, VectorParamsBuilder,
};
use qdrant_client::{Qdrant, QdrantError};
use tonic::Code;

use super::QdrantConfig;
use crate::TRACING_TARGET;
use crate::error::{VectorError, VectorResult};
use crate::store::{ScoredRecord, VectorRecord, VectorStoreBackend};

/// Qdrant backend implementation.
///
/// Collections use cosine distance. Qdrant does not guarantee insertion-order
/// tie breaking for equal scores.
pub struct QdrantBackend {
    client: Qdrant,
}

impl QdrantBackend {
    /// Creates a new Qdrant backend.
    pub fn new(config: &QdrantConfig) -> VectorResult<Self> {
        let client = Qdrant::from_url(&config.url)
            .api_key(config.api_key.clone())
            .build()
            .map_err(|e| VectorError::unavailable(e.to_string()))?;

        tracing::debug!(
            target: TRACING_TARGET,
            url = %config.url,
            "Connected to Qdrant"
        );

        Ok(Self { client })
    }

    /// Extracts point ID as a string.
    fn extract_point_id(id: Option<PointId>) -> Option<String> {
        use qdrant_client::qdrant::point_id::PointIdOptions;

        match id {
            Some(PointId {
                point_id_options: Some(id),
            }) => match id {
                PointIdOptions::Num(n) => Some(n.to_string()),
                PointIdOptions::Uuid(s) => Some(s),
            },
            _ => None,
        }
    }
}

/// Maps a client error, keeping `StorageUnavailable` for transport failures.
fn map_error(err: QdrantError) -> VectorError {
    let transient = match &err {
        QdrantError::ResponseError { status } => matches!(
            status.code(),
            Code::Unavailable | Code::Unknown | Code::DeadlineExceeded | Code::Cancelled
        ),
        QdrantError::ResourceExhaustedError { .. } | QdrantError::Io(_) => true,
        _ => false,
    };

    if transient {
        VectorError::unavailable(err.to_string())
    } else {
        VectorError::backend(err.to_string())
    }
}

/// Returns the size of the unnamed vector of a collection.
fn collection_dimensions(info: &CollectionInfo) -> Option<u64> {
    let vectors = info.config.as_ref()?.params.as_ref()?.vectors_config.as_ref()?;
    match vectors.config.as_ref()? {
        VectorsConfig::Params(params) => Some(params.size),
        VectorsConfig::ParamsMap(_) => None,
    }
}

#[async_trait]
impl VectorStoreBackend for QdrantBackend {
    fn backend_name(&self) -> &'static str {
        "qdrant"
    }

    async fn create_or_get_index(&self, name: &str, dimensions: usize) -> VectorResult<()> {
        let exists = self
            .client
            .collection_exists(name)
            .await
            .map_err(map_error)?;

        if exists {
            let response = self.client.collection_info(name).await.map_err(map_error)?;
            let actual = response
                .result
                .as_ref()
                .and_then(collection_dimensions)
                .ok_or_else(|| {
                    VectorError::backend(format!(
                        "collection {name} does not use a single unnamed vector"
                    ))
                })?;

            if actual != dimensions as u64 {
                return Err(VectorError::dimension_mismatch(actual as usize, dimensions));
            }
            return Ok(());
        }

        let vectors_config = VectorsConfig::Params(
            VectorParamsBuilder::new(dimensions as u64, Distance::Cosine).build(),
        );

        self.client
            .create_collection(CreateCollectionBuilder::new(name).vectors_config(vectors_config))
            .await
            .map_err(map_error)?;

        tracing::info!(
            target: TRACING_TARGET,
            collection = %name,
            dimensions = %dimensions,
            "Created Qdrant collection"
        );

        Ok(())
    }

    async fn upsert(&self, index: &str, records: Vec<VectorRecord>) -> VectorResult<()> {
        let points: Vec<PointStruct> = records
            .into_iter()
            .map(|r| {
                let payload: HashMap<String, qdrant_client::qdrant::Value> = r
                    .metadata
                    .into_iter()
                    .map(|(k, v)| (k, json_to_qdrant_value(v)))
                    .collect();

                PointStruct::new(r.id, r.vector, payload)
            })
            .collect();

        self.client
            .upsert_points(UpsertPointsBuilder::new(index, points).wait(true))
            .await
            .map_err(map_error)?;

        Ok(())
    }

    async fn query(
        &self,
        index: &str,
        vector: Vec<f32>,
        top_k: usize,
    ) -> VectorResult<Vec<ScoredRecord>> {
        let search = SearchPointsBuilder::new(index, vector, top_k as u64)
            .with_payload(SelectorOptions::Enable(true));

        let response = self.client.search_points(search).await.map_err(map_error)?;

        let results = response
            .result
            .into_iter()
            .map(|point| ScoredRecord {
                id: Self::extract_point_id(point.id).unwrap_or_default(),
                score: point.score,
                metadata: point
                    .payload
                    .into_iter()
                    .map(|(k, v)| (k, qdrant_value_to_json(v)))
                    .collect(),
            })
            .collect();

        Ok(results)
    }

    async fn delete_by_field(&self, index: &str, key: &str, value: &str) -> VectorResult<()> {
        let filter = Filter::must([Condition::matches(key, value.to_owned())]);

        self.client
            .delete_points(DeletePointsBuilder::new(index).points(filter).wait(true))
            .await
            .map_err(map_error)?;

        Ok(())
    }

    async fn existing_ids(&self, index: &str, ids: &[String]) -> VectorResult<HashSet<String>> {
        let point_ids: Vec<PointId> = ids.iter().cloned().map(PointId::from).collect();

        let response = self
            .client
            .get_points(
                GetPointsBuilder::new(index, point_ids)
                    .with_payload(false)
                    .with_vectors(false),
            )
            .await
            .map_err(map_error)?;

        Ok(response
            .result
            .into_iter()
            .filter_map(|point| Self::extract_point_id(point.id))
            .collect())
    }

    async fn count(&self, index: &str) -> VectorResult<usize> {
        let response = self
            .client
            .count(CountPointsBuilder::new(index).exact(true))
            .await
            .map_err(map_error)?;

        Ok(response.result.map(|r| r.count as usize).unwrap_or(0))
    }
}

/// Converts JSON value to Qdrant value.
fn json_to_qdrant_value(value: serde_json::Value) -> qdrant_client::qdrant::Value {
    use qdrant_client::qdrant::value::Kind;

    let kind = match value {
        serde_json::Value::Null => Kind::NullValue(0),
        serde_json::Value::Bool(b) => Kind::BoolValue(b),
        serde_json::Value::Number(n) => {
            if let Some(i) = n.as_i64() {
                Kind::IntegerValue(i)
            } else if let Some(f) = n.as_f64() {
                Kind::DoubleValue(f)
            } else {
                Kind::StringValue(n.to_string())
            }
        }
        serde_json::Value::String(s) => Kind::StringValue(s),
        serde_json::Value::Array(arr) => {
            let values: Vec<qdrant_client::qdrant::Value> =
                arr.into_iter().map(json_to_qdrant_value).collect();
            Kind::ListValue(qdrant_client::qdrant::ListValue { values })
        }
        serde_json::Value::Object(obj) => {
            let fields: HashMap<String, qdrant_client::qdrant::Value> = obj
                .into_iter()
                .map(|(k, v)| (k, json_to_qdrant_value(v)))
                .collect();
            Kind::StructValue(qdrant_client::qdrant::Struct { fields })
        }
    };

    qdrant_client::qdrant::Value { kind: Some(kind) }
}

/// Converts Qdrant value to JSON value.
fn qdrant_value_to_json(value: qdrant_client::qdrant::Value) -> serde_json::Value {
    use qdrant_client::qdrant::value::Kind;

    match value.kind {
        Some(Kind::NullValue(_)) | None => serde_json::Value::Null,
        Some(Kind::BoolValue(b)) => serde_json::Value::Bool(b),
        Some(Kind::IntegerValue(i)) => serde_json::json!(i),
        Some(Kind::DoubleValue(f)) => serde_json::json!(f),
        Some(Kind::StringValue(s)) => serde_json::Value::String(s),
        Some(Kind::ListValue(list)) => serde_json::Value::Array(
            list.values.into_iter().map(qdrant_value_to_json).collect(),
        ),
        Some(Kind::StructValue(obj)) => serde_json::Value::Object(
            obj.fields
                .into_iter()
                .map(|(k, v)| (k, qdrant_value_to_json(v)))
                .collect(),
        ),
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;

    #[test]
    fn payload_values_survive_conversion() {
        let original = json!({
            "title": "Aspirin",
            "chunk_index": 3,
            "score": 0.5,
            "tags": ["fever", true, null],
        });

        let converted = qdrant_value_to_json(json_to_qdrant_value(original.clone()));
        assert_eq!(converted, original);
    }

    #[test]
    fn extracts_uuid_and_numeric_ids() {
        let uuid = "5f0c2a52-6d0c-4c38-9c4e-8a7f1b6f3f1a".to_owned();
        assert_eq!(
            QdrantBackend::extract_point_id(Some(PointId::from(uuid.clone()))),
            Some(uuid)
        );
        assert_eq!(
            QdrantBackend::extract_point_id(Some(PointId::from(7u64))),
            Some("7".to_owned())
        );
        assert_eq!(QdrantBackend::extract_point_id(None), None);
    }

    #[test]
    fn only_transport_failures_are_unavailable() {
        let status = |status| QdrantError::ResponseError { status };

        let refused = status(tonic::Status::unavailable("connection refused"));
        assert!(map_error(refused).is_unavailable());
        let slow = status(tonic::Status::deadline_exceeded("slow"));
        assert!(map_error(slow).is_unavailable());
        let reset = QdrantError::Io(std::io::ErrorKind::ConnectionReset.into());
        assert!(map_error(reset).is_unavailable());

        let err = map_error(status(tonic::Status::invalid_argument("bad payload")));
        assert!(matches!(err, VectorError::Backend(_)));
        let err = map_error(status(tonic::Status::not_found("no collection")));
        assert!(matches!(err, VectorError::Backend(_)));
    }

    fn collection_info(vectors: VectorsConfig) -> CollectionInfo {
        use qdrant_client::qdrant::{CollectionConfig, CollectionParams, VectorsConfig as Vectors};

        CollectionInfo {
            config: Some(CollectionConfig {
                params: Some(CollectionParams {
                    vectors_config: Some(Vectors {
                        config: Some(vectors),
                    }),
                    ..Default::default()
                }),
                ..Default::default()
            }),
            ..Default::default()
        }
    }

    #[test]
    fn reads_collection_dimensions() {
        let params = VectorParamsBuilder::new(768, Distance::Cosine).build();
        let info = collection_info(VectorsConfig::Params(params));
        assert_eq!(collection_dimensions(&info), Some(768));

        let named = collection_info(VectorsConfig::ParamsMap(Default::default()));
        assert_eq!(collection_dimensions(&named), None);
        assert_eq!(collection_dimensions(&CollectionInfo::default()), None);
    }
}
