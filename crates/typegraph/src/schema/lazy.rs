//! Lazy schema loading.
//!
//! `LazySchema` defers building and assembling the schema until first
//! access, so a host can start serving before declarations are resolved.

use std::sync::Arc;

use tokio::sync::{Mutex, RwLock};
use tracing::{info, warn};

use super::{AssembledSchema, BuildOptions};
use crate::error::SchemaError;
use crate::registry::Registry;

/// State of the lazy schema.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SchemaState {
    /// Schema has not been built yet.
    Uninitialized,
    /// Schema is currently being built.
    Building,
    /// Schema is ready for use.
    Ready,
    /// Schema build failed.
    Failed,
}

/// Thread-safe lazy schema holder.
///
/// # Example
///
/// ```ignore
/// let lazy = LazySchema::new(Arc::new(registry), BuildOptions::default());
///
/// // First access triggers the build
/// let schema = lazy.get_or_build().await?;
///
/// // Subsequent accesses use the cached schema
/// let schema = lazy.get_or_build().await?;
/// ```
pub struct LazySchema {
    /// The cached schema (None until built).
    schema: RwLock<Option<Arc<AssembledSchema>>>,

    /// Ensures only one build at a time.
    build_lock: Mutex<()>,

    state: RwLock<SchemaState>,

    registry: Arc<Registry>,
    options: BuildOptions,

    /// Last build error message (for diagnostics).
    last_error: RwLock<Option<String>>,
}

impl LazySchema {
    /// Creates a lazy schema over `registry`.
    #[must_use]
    pub fn new(registry: Arc<Registry>, options: BuildOptions) -> Self {
        Self {
            schema: RwLock::new(None),
            build_lock: Mutex::new(()),
            state: RwLock::new(SchemaState::Uninitialized),
            registry,
            options,
            last_error: RwLock::new(None),
        }
    }

    /// Returns the current state of the schema.
    pub async fn state(&self) -> SchemaState {
        *self.state.read().await
    }

    /// Gets the schema, building it if necessary.
    ///
    /// Concurrent callers receive [`SchemaError::Initializing`] while a build
    /// is in progress; use [`get_or_build_wait`](Self::get_or_build_wait)
    /// where waiting is acceptable. A cached failure is returned without
    /// rebuilding.
    ///
    /// # Errors
    ///
    /// Returns `SchemaError::Initializing` if another build is in progress.
    /// Returns `SchemaError::BuildFailed` if the build fails.
    pub async fn get_or_build(&self) -> Result<Arc<AssembledSchema>, SchemaError> {
        if let Some(schema) = self.get().await {
            return Ok(schema);
        }

        if *self.state.read().await == SchemaState::Building {
            return Err(SchemaError::Initializing);
        }

        let Ok(_guard) = self.build_lock.try_lock() else {
            return Err(SchemaError::Initializing);
        };

        // Double-check after acquiring lock
        if let Some(schema) = self.get().await {
            return Ok(schema);
        }

        if *self.state.read().await == SchemaState::Failed {
            if let Some(err) = self.last_error.read().await.as_ref() {
                return Err(SchemaError::BuildFailed(err.clone()));
            }
        }

        self.build().await
    }

    /// Gets the schema, waiting for an in-progress build instead of
    /// returning [`SchemaError::Initializing`]. A cached failure is returned
    /// without rebuilding.
    ///
    /// # Errors
    ///
    /// Returns `SchemaError::BuildFailed` if the build fails.
    pub async fn get_or_build_wait(&self) -> Result<Arc<AssembledSchema>, SchemaError> {
        if let Some(schema) = self.get().await {
            return Ok(schema);
        }

        let _guard = self.build_lock.lock().await;

        if let Some(schema) = self.get().await {
            return Ok(schema);
        }

        if *self.state.read().await == SchemaState::Failed {
            if let Some(err) = self.last_error.read().await.as_ref() {
                return Err(SchemaError::BuildFailed(err.clone()));
            }
        }

        self.build().await
    }

    /// Gets the schema if it's already built, without triggering a build.
    pub async fn get(&self) -> Option<Arc<AssembledSchema>> {
        self.schema.read().await.clone()
    }

    /// Returns the last build error, if any.
    pub async fn last_error(&self) -> Option<String> {
        self.last_error.read().await.clone()
    }

    /// Returns whether the schema is ready for use.
    pub async fn is_ready(&self) -> bool {
        *self.state.read().await == SchemaState::Ready
    }

    /// Must be called with `build_lock` held.
    async fn build(&self) -> Result<Arc<AssembledSchema>, SchemaError> {
        *self.state.write().await = SchemaState::Building;
        info!("Building schema...");

        match self.registry.build_schema(&self.options) {
            Ok(schema) => {
                let schema = Arc::new(schema);
                *self.schema.write().await = Some(Arc::clone(&schema));
                *self.state.write().await = SchemaState::Ready;
                *self.last_error.write().await = None;
                info!("Schema built successfully");
                Ok(schema)
            }
            Err(e) => {
                let error_msg = e.to_string();
                warn!(error = %error_msg, "Failed to build schema");
                *self.state.write().await = SchemaState::Failed;
                *self.last_error.write().await = Some(error_msg.clone());
                Err(SchemaError::BuildFailed(error_msg))
            }
        }
    }
}
