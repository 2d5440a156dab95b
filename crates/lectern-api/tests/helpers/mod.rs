//! Test helpers: build the router over an in-memory repository and local storage.
//!
//! Run from workspace root: `cargo test -p lectern-api`.

pub mod converter;
pub mod store;

use axum_test::TestServer;
use bytes::Bytes;
use jsonwebtoken::{encode, EncodingKey, Header};
use lectern_api::auth::SessionClaims;
use lectern_api::setup::{routes, services};
use lectern_core::models::{DocumentRecord, DocumentType};
use lectern_core::Config;
use lectern_db::MemoryDocumentRepository;
use lectern_storage::{BlobStore, LocalStorage};
use std::collections::HashMap;
use std::sync::atomic::AtomicBool;
use std::sync::Arc;
use std::time::Duration;
use tempfile::TempDir;

pub use converter::CountingConverter;
pub use store::LaggingStore;

pub const TEST_JWT_SECRET: &str = "test-session-secret";
pub const SOURCE_BYTES: &[u8] = b"%PDF-1.7 test";

/// Test application: server plus everything it owns.
pub struct TestApp {
    pub server: TestServer,
    pub store: Arc<dyn BlobStore>,
    pub converter: CountingConverter,
    pub storage_dir: TempDir,
    pub legacy_dir: TempDir,
}

impl TestApp {
    pub fn client(&self) -> &TestServer {
        &self.server
    }
}

/// Knobs for [`setup_test_app_with`].
#[derive(Clone, Default)]
pub struct TestOptions {
    pub auth_enabled: bool,
    pub namespace_header: bool,
    /// Public base URL of the local store; enables direct URLs.
    pub public_base_url: Option<String>,
    /// Build without a blob store.
    pub no_storage: bool,
    /// Conversions wait for [`CountingConverter::release`].
    pub gated_converter: bool,
    /// Wrap the store in a [`LaggingStore`] driven by this flag.
    pub lagging_reads: Option<Arc<AtomicBool>>,
}

pub fn record(id: &str, user_id: &str, document_type: DocumentType) -> DocumentRecord {
    DocumentRecord {
        id: id.to_string(),
        user_id: user_id.to_string(),
        namespace: None,
        document_type,
        last_modified: 1000,
        source_key: format!("uploads/{}.{}", id, document_type.as_str()),
    }
}

pub fn test_config(options: &TestOptions, storage_dir: &TempDir, legacy_dir: &TempDir) -> Config {
    let mut vars: HashMap<&str, String> = HashMap::new();
    vars.insert("ENVIRONMENT", "test".to_string());
    if !options.no_storage {
        vars.insert("STORAGE_BACKEND", "local".to_string());
        vars.insert(
            "LOCAL_STORAGE_PATH",
            storage_dir.path().to_string_lossy().to_string(),
        );
    }
    if let Some(url) = &options.public_base_url {
        vars.insert("LOCAL_STORAGE_BASE_URL", url.clone());
    }
    vars.insert("AUTH_ENABLED", options.auth_enabled.to_string());
    vars.insert("JWT_SECRET", TEST_JWT_SECRET.to_string());
    vars.insert(
        "NAMESPACE_HEADER_ENABLED",
        options.namespace_header.to_string(),
    );
    vars.insert(
        "LEGACY_STORE_PATH",
        legacy_dir.path().to_string_lossy().to_string(),
    );

    Config::from_lookup(|name| vars.get(name).cloned()).expect("test config")
}

pub async fn setup_test_app(records: Vec<DocumentRecord>) -> TestApp {
    setup_test_app_with(records, TestOptions::default()).await
}

/// Build the app; each record's source blob is uploaded before the server starts.
pub async fn setup_test_app_with(records: Vec<DocumentRecord>, options: TestOptions) -> TestApp {
    let storage_dir = tempfile::tempdir().expect("storage dir");
    let legacy_dir = tempfile::tempdir().expect("legacy dir");
    let config = test_config(&options, &storage_dir, &legacy_dir);
    config.validate().expect("valid test config");

    let local: Arc<dyn BlobStore> = Arc::new(
        LocalStorage::new(storage_dir.path(), options.public_base_url.clone())
            .await
            .expect("local storage"),
    );
    let store: Arc<dyn BlobStore> = match &options.lagging_reads {
        Some(hidden) => Arc::new(LaggingStore {
            inner: local,
            hidden: hidden.clone(),
        }),
        None => local,
    };
    for record in &records {
        store
            .put(
                &record.source_key,
                Bytes::from_static(SOURCE_BYTES),
                "application/octet-stream",
            )
            .await
            .expect("upload source");
    }

    let converter = if options.gated_converter {
        CountingConverter::gated()
    } else {
        CountingConverter::default()
    };
    let repository = Arc::new(MemoryDocumentRepository::with_records(records));
    let state = services::initialize_services(
        &config,
        repository,
        (!options.no_storage).then(|| store.clone()),
        Arc::new(converter.clone()),
    )
    .expect("services");
    let app = routes::setup_routes(&config, state).expect("routes");

    let server = TestServer::new(app.into_make_service()).expect("Failed to create test server");

    TestApp {
        server,
        store,
        converter,
        storage_dir,
        legacy_dir,
    }
}

pub fn session_token(user_id: &str) -> String {
    encode(
        &Header::default(),
        &SessionClaims {
            sub: user_id.to_string(),
            exp: 4_102_444_800,
        },
        &EncodingKey::from_secret(TEST_JWT_SECRET.as_bytes()),
    )
    .expect("encode session token")
}

/// Poll ensure until the preview is ready.
pub async fn wait_until_ready(client: &TestServer, id: &str) {
    for _ in 0..200 {
        let response = client
            .get("/api/v0/preview/ensure")
            .add_query_param("id", id)
            .await;
        if response.status_code() == 200 {
            return;
        }
        assert_eq!(response.status_code(), 202);
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
    panic!("preview for {} never became ready", id);
}
