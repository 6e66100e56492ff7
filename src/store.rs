//! Data-store seam.
//!
//! The gateway does not read or write application data itself; it hands a
//! store handle to the query engine through the request context. The
//! [`DataStore`] trait is the seam: the service binary plugs in Postgres,
//! tests plug in the in-memory store.

use async_trait::async_trait;

/// Shared data-access handle threaded into every request context.
///
/// Implementations are created once at startup and shared by `Arc`; the
/// trait deliberately has no constructor and no global accessor.
#[async_trait]
pub trait DataStore: Send + Sync {
    /// Error type surfaced by store operations.
    type Error: std::error::Error + Send + Sync + 'static;

    /// Check that the backing store is reachable.
    async fn ping(&self) -> Result<(), Self::Error>;
}

/// Error type for the in-memory store.
#[derive(Debug, thiserror::Error)]
pub enum InMemoryStoreError {
    /// The store was put into a failing state by a test.
    #[error("in-memory store marked unavailable")]
    Unavailable,
}

/// In-memory store for tests and local development.
///
/// Holds no data; it exists so the context-building and admission paths can
/// be exercised without a database. Tests can flip it into a failing state
/// to drive readiness-probe behavior.
#[derive(Debug, Default)]
pub struct InMemoryDataStore {
    available: std::sync::atomic::AtomicBool,
}

impl InMemoryDataStore {
    /// Create an available in-memory store.
    pub fn new() -> Self {
        Self {
            available: std::sync::atomic::AtomicBool::new(true),
        }
    }

    /// Mark the store available or unavailable.
    pub fn set_available(&self, available: bool) {
        self.available
            .store(available, std::sync::atomic::Ordering::Relaxed);
    }
}

#[async_trait]
impl DataStore for InMemoryDataStore {
    type Error = InMemoryStoreError;

    async fn ping(&self) -> Result<(), Self::Error> {
        if self.available.load(std::sync::atomic::Ordering::Relaxed) {
            Ok(())
        } else {
            Err(InMemoryStoreError::Unavailable)
        }
    }
}

#[cfg(feature = "postgres")]
pub use postgres::PgDataStore;

#[cfg(feature = "postgres")]
mod postgres {
    use super::DataStore;
    use async_trait::async_trait;
    use sqlx::postgres::PgPoolOptions;
    use sqlx::PgPool;

    /// Postgres-backed store used by the service binary.
    #[derive(Debug, Clone)]
    pub struct PgDataStore {
        pool: PgPool,
    }

    impl PgDataStore {
        /// Connect a pool to the given database URL.
        pub async fn connect(url: &str) -> Result<Self, sqlx::Error> {
            let pool = PgPoolOptions::new().max_connections(10).connect(url).await?;
            tracing::info!("database pool connected");
            Ok(Self { pool })
        }

        /// The underlying connection pool, for engine implementations that
        /// issue queries directly.
        pub fn pool(&self) -> &PgPool {
            &self.pool
        }
    }

    #[async_trait]
    impl DataStore for PgDataStore {
        type Error = sqlx::Error;

        async fn ping(&self) -> Result<(), Self::Error> {
            sqlx::query("SELECT 1").execute(&self.pool).await?;
            Ok(())
        }
    }
}
