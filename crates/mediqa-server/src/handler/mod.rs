//! HTTP handlers and routing.

mod error;
mod generate;
pub mod response;

use axum::Router;
use axum::http::Uri;
use axum::routing::get;

use crate::TRACING_TARGET;
pub use crate::handler::error::{Error, ErrorKind, Result};
pub use crate::handler::generate::GenerateQuery;
use crate::service::ServiceState;

/// Returns a [`Router`] with all routes and the not-found fallback.
pub fn routes(state: ServiceState) -> Router {
    Router::new()
        .route("/generate", get(generate::generate))
        .fallback(fallback)
        .with_state(state)
}

async fn fallback(uri: Uri) -> Error {
    tracing::debug!(target: TRACING_TARGET, uri = %uri, "Route not found");
    ErrorKind::NotFound.with_context(uri.to_string())
}

#[cfg(test)]
mod test {
    use std::collections::HashSet;
    use std::sync::Arc;
    use std::time::Duration;

    use async_trait::async_trait;
    use axum::http::StatusCode;
    use axum_test::TestServer;
    use mediqa_rig::mock::{ContextEchoGenerator, HashEmbedder, NO_CONTEXT_ANSWER};
    use mediqa_rig::provider::{Embedder, TextGenerator};
    use mediqa_rig::rag::{RagSettings, Reader, ReaderSettings, SplittingStrategy, VectorDbManager};
    use mediqa_vector::{
        LocalBackend, ScoredRecord, VectorError, VectorRecord, VectorResult, VectorStore,
        VectorStoreBackend,
    };
    use serde_json::{Value, json};

    use super::*;
    use crate::handler::response::GENERIC_MESSAGE;
    use crate::service::QaService;

    const DIMENSIONS: usize = 64;

    fn rag_settings() -> RagSettings {
        RagSettings {
            embedding_dimension: DIMENSIONS,
            index_name: "medical_kb".into(),
            encoder_name: "hash".into(),
            splitter_encoder_name: None,
            chunk_size: 200,
            batch_size: 4,
            encoding_strategy: SplittingStrategy::Sentence,
            semantic_threshold: 0.75,
            db_location: "db".into(),
            n_results: 2,
            knowledge_path: "knowledge".into(),
        }
    }

    fn reader_settings() -> ReaderSettings {
        ReaderSettings {
            model_name: "context-echo".into(),
            quantize: false,
            temperature: 0.0,
            do_sample: false,
            repetition_penalty: 1.0,
            max_new_tokens: 64,
            timeout_secs: 5,
        }
    }

    /// Backend whose every call fails as if the store were down.
    struct UnreachableBackend;

    #[async_trait]
    impl VectorStoreBackend for UnreachableBackend {
        fn backend_name(&self) -> &'static str {
            "unreachable"
        }

        async fn create_or_get_index(&self, _name: &str, _dimensions: usize) -> VectorResult<()> {
            Ok(())
        }

        async fn upsert(&self, _index: &str, _records: Vec<VectorRecord>) -> VectorResult<()> {
            Err(VectorError::unavailable("connection refused"))
        }

        async fn query(
            &self,
            _index: &str,
            _vector: Vec<f32>,
            _top_k: usize,
        ) -> VectorResult<Vec<ScoredRecord>> {
            Err(VectorError::unavailable("connection refused"))
        }

        async fn delete_by_field(&self, _index: &str, _key: &str, _value: &str) -> VectorResult<()> {
            Err(VectorError::unavailable("connection refused"))
        }

        async fn existing_ids(
            &self,
            _index: &str,
            _ids: &[String],
        ) -> VectorResult<HashSet<String>> {
            Err(VectorError::unavailable("connection refused"))
        }

        async fn count(&self, _index: &str) -> VectorResult<usize> {
            Err(VectorError::unavailable("connection refused"))
        }
    }

    async fn qa_service(
        store: VectorStore,
        corpus: &[(&str, &str)],
        generator: ContextEchoGenerator,
    ) -> anyhow::Result<QaService> {
        let embedder: Arc<dyn Embedder> = Arc::new(HashEmbedder::new(DIMENSIONS));
        let manager =
            VectorDbManager::new(rag_settings(), embedder.clone(), embedder, &store).await?;

        if !corpus.is_empty() {
            let dir = tempfile::tempdir()?;
            for (name, text) in corpus {
                std::fs::write(dir.path().join(name), text)?;
            }
            manager.populate(dir.path()).await?;
        }

        let generator: Arc<dyn TextGenerator> = Arc::new(generator);
        let reader = Reader::new(reader_settings(), generator)?;
        Ok(QaService::new(Arc::new(manager), Arc::new(reader)))
    }

    /// Returns a new [`TestServer`] serving `qa_service`.
    fn create_test_server(qa_service: QaService) -> anyhow::Result<TestServer> {
        let app = routes(ServiceState::new(qa_service));
        Ok(TestServer::new(app)?)
    }

    fn knowledge() -> Vec<(&'static str, &'static str)> {
        vec![
            ("Aspirin.txt", "Aspirin reduces fever."),
            ("Calcium.txt", "Calcium keeps bones strong."),
            ("Insulin.txt", "Insulin regulates blood sugar."),
        ]
    }

    fn local_store() -> VectorStore {
        VectorStore::from_backend(LocalBackend::in_memory())
    }

    #[tokio::test]
    async fn answers_from_retrieved_context() -> anyhow::Result<()> {
        let service = qa_service(local_store(), &knowledge(), ContextEchoGenerator::new()).await?;
        let server = create_test_server(service)?;

        let response = server
            .get("/generate")
            .add_query_param("question", "What reduces fever?")
            .await;

        assert_eq!(response.status_code(), StatusCode::OK);
        assert_eq!(
            response.json::<Value>(),
            json!([[{"generated_text": "According to Document 0: Aspirin reduces fever."}]])
        );
        Ok(())
    }

    #[tokio::test]
    async fn empty_index_still_answers() -> anyhow::Result<()> {
        let service = qa_service(local_store(), &[], ContextEchoGenerator::new()).await?;
        let server = create_test_server(service)?;

        let response = server
            .get("/generate")
            .add_query_param("question", "What reduces fever?")
            .await;

        assert_eq!(response.status_code(), StatusCode::OK);
        assert_eq!(
            response.json::<Value>(),
            json!([[{"generated_text": NO_CONTEXT_ANSWER}]])
        );
        Ok(())
    }

    #[tokio::test]
    async fn missing_question_is_bad_request() -> anyhow::Result<()> {
        let service = qa_service(local_store(), &knowledge(), ContextEchoGenerator::new()).await?;
        let server = create_test_server(service)?;

        let response = server.get("/generate").await;

        assert_eq!(response.status_code(), StatusCode::BAD_REQUEST);
        assert_eq!(
            response.json::<Value>(),
            json!({"name": "bad_request", "message": GENERIC_MESSAGE})
        );
        Ok(())
    }

    #[tokio::test]
    async fn unknown_path_is_not_found() -> anyhow::Result<()> {
        let service = qa_service(local_store(), &[], ContextEchoGenerator::new()).await?;
        let server = create_test_server(service)?;

        let response = server.get("/answers").await;

        assert_eq!(response.status_code(), StatusCode::NOT_FOUND);
        Ok(())
    }

    #[tokio::test]
    async fn unreachable_store_is_service_unavailable() -> anyhow::Result<()> {
        let store = VectorStore::from_backend(UnreachableBackend);
        let service = qa_service(store, &[], ContextEchoGenerator::new()).await?;
        let server = create_test_server(service)?;

        let response = server
            .get("/generate")
            .add_query_param("question", "What reduces fever?")
            .await;

        assert_eq!(response.status_code(), StatusCode::SERVICE_UNAVAILABLE);
        let body = response.json::<Value>();
        assert_eq!(body["message"], GENERIC_MESSAGE);
        assert!(!body.to_string().contains("connection refused"));
        Ok(())
    }

    #[tokio::test]
    async fn slow_generation_is_gateway_timeout() -> anyhow::Result<()> {
        let generator = ContextEchoGenerator::new().with_delay(Duration::from_millis(500));
        let service = qa_service(local_store(), &knowledge(), generator)
            .await?
            .with_timeout(Duration::from_millis(20));
        let server = create_test_server(service)?;

        let response = server
            .get("/generate")
            .add_query_param("question", "What reduces fever?")
            .await;

        assert_eq!(response.status_code(), StatusCode::GATEWAY_TIMEOUT);
        Ok(())
    }
}
