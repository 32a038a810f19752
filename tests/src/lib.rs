//! Setup shared by the suites that run against a live PostgreSQL.
//!
//! Every suite is skipped unless `DOCSQL_TEST_POSTGRES_URL` points at a
//! database the tests may create and drop tables in.

mod isolation;
pub use isolation::TestIsolation;

use docsql_core::{Document, Result};
use docsql_driver_postgresql::{Builder, PostgresAdapter};
use serde_json::Value as Json;
use tokio::sync::Mutex;
use tracing_subscriber::EnvFilter;

pub const URL_VAR: &str = "DOCSQL_TEST_POSTGRES_URL";

/// Concurrent `CREATE OR REPLACE FUNCTION`s can fail on the system
/// catalogs, so tests in one process initialize one at a time.
static INIT: Mutex<()> = Mutex::const_new(());

/// Returns early from a test when no database is configured.
#[macro_export]
macro_rules! require_db {
    () => {
        $crate::require_db!(|_builder| {})
    };
    ($configure:expr) => {
        match $crate::setup($configure).await {
            Some(db) => db,
            None => {
                eprintln!("{} not set; skipping", $crate::URL_VAR);
                return;
            }
        }
    };
}

pub struct TestDb {
    pub adapter: PostgresAdapter,
    isolation: TestIsolation,
}

/// Connects and initializes an adapter, or returns `None` when
/// `DOCSQL_TEST_POSTGRES_URL` is unset.
pub async fn setup(configure: impl FnOnce(&mut Builder)) -> Option<TestDb> {
    let url = std::env::var(URL_VAR).ok()?;
    init_tracing();

    let mut builder = PostgresAdapter::builder();
    builder.max_connections(4);
    configure(&mut builder);
    let adapter = builder.connect(&url).await.unwrap();

    {
        let _guard = INIT.lock().await;
        adapter.perform_initialization(&[]).await.unwrap();
    }

    Some(TestDb {
        adapter,
        isolation: TestIsolation::new(),
    })
}

pub fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .with_test_writer()
        .try_init();
}

impl TestDb {
    /// A class name private to this test.
    pub fn class(&self, name: &str) -> String {
        format!("{}{name}", self.isolation.prefix())
    }

    /// Deletes every class this test created.
    pub async fn cleanup(self) -> Result<()> {
        for schema in self.adapter.get_all_classes().await? {
            if self.isolation.owns_class(&schema.class_name) {
                self.adapter.delete_class(&schema.class_name).await?;
            }
        }
        self.adapter.handle_shutdown().await;
        Ok(())
    }
}

/// Unwraps a `json!` object into a document.
pub fn doc(value: Json) -> Document {
    match value {
        Json::Object(map) => map,
        other => panic!("expected an object, got {other}"),
    }
}
