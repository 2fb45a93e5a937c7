//! Per-request execution context.
//!
//! The context is constructed once per operation by the host and handed to
//! [`AssembledSchema::execute`](crate::schema::AssembledSchema::execute). Every
//! bound resolver in that operation sees the same context; resolvers that
//! declare a `Context` parameter receive a cheap clone of it.
//!
//! # Example
//!
//! ```ignore
//! use typegraph::{GraphContextBuilder, Principal};
//!
//! let context = GraphContextBuilder::new()
//!     .with_request_id("req-123")
//!     .with_user(Principal::new("u-1").with_role("ADMIN"))
//!     .with_data(recipe_store.clone())
//!     .build();
//! ```

use std::any::{Any, TypeId};
use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

use serde_json::Value;

/// The authenticated caller, if any.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Principal {
    /// Stable user identifier.
    pub id: String,
    /// Roles granted to the user.
    pub roles: Vec<String>,
}

impl Principal {
    /// Creates a principal without roles.
    pub fn new(id: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            roles: Vec::new(),
        }
    }

    /// Adds a role.
    #[must_use]
    pub fn with_role(mut self, role: impl Into<String>) -> Self {
        self.roles.push(role.into());
        self
    }

    /// Returns whether the principal holds `role`.
    #[must_use]
    pub fn has_role(&self, role: &str) -> bool {
        self.roles.iter().any(|r| r == role)
    }
}

/// Shared state for every resolver invocation within one operation.
///
/// The context is `Clone` and `Send + Sync`; typed host data is stored
/// behind `Arc` so cloning never copies it.
#[derive(Clone, Default)]
pub struct GraphContext {
    /// Request ID for tracing and correlation.
    pub request_id: String,

    /// Authenticated caller (None for anonymous requests).
    pub user: Option<Principal>,

    /// Value passed as the root parameter to root operation resolvers.
    pub root_value: Option<Value>,

    data: Arc<HashMap<TypeId, Arc<dyn Any + Send + Sync>>>,
}

impl GraphContext {
    /// Returns whether the request is authenticated.
    #[must_use]
    pub fn is_authenticated(&self) -> bool {
        self.user.is_some()
    }

    /// Returns the user ID if authenticated.
    #[must_use]
    pub fn user_id(&self) -> Option<&str> {
        self.user.as_ref().map(|u| u.id.as_str())
    }

    /// Returns typed host data registered with [`GraphContextBuilder::with_data`].
    #[must_use]
    pub fn data<T: Any + Send + Sync>(&self) -> Option<&T> {
        self.data
            .get(&TypeId::of::<T>())
            .and_then(|value| value.downcast_ref::<T>())
    }
}

impl fmt::Debug for GraphContext {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("GraphContext")
            .field("request_id", &self.request_id)
            .field("user", &self.user)
            .field("root_value", &self.root_value)
            .field("data_entries", &self.data.len())
            .finish()
    }
}

/// Builder for [`GraphContext`].
#[derive(Default)]
pub struct GraphContextBuilder {
    request_id: Option<String>,
    user: Option<Principal>,
    root_value: Option<Value>,
    data: HashMap<TypeId, Arc<dyn Any + Send + Sync>>,
}

impl GraphContextBuilder {
    /// Creates a new builder.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the request ID. A random one is generated otherwise.
    #[must_use]
    pub fn with_request_id(mut self, request_id: impl Into<String>) -> Self {
        self.request_id = Some(request_id.into());
        self
    }

    /// Sets the authenticated caller.
    #[must_use]
    pub fn with_user(mut self, user: Principal) -> Self {
        self.user = Some(user);
        self
    }

    /// Sets the root value handed to root operation resolvers.
    #[must_use]
    pub fn with_root_value(mut self, root_value: Value) -> Self {
        self.root_value = Some(root_value);
        self
    }

    /// Attaches typed host data, replacing any previous value of the same type.
    #[must_use]
    pub fn with_data<T: Any + Send + Sync>(mut self, data: T) -> Self {
        self.data.insert(TypeId::of::<T>(), Arc::new(data));
        self
    }

    /// Builds the context.
    #[must_use]
    pub fn build(self) -> GraphContext {
        GraphContext {
            request_id: self
                .request_id
                .unwrap_or_else(|| uuid::Uuid::new_v4().to_string()),
            user: self.user,
            root_value: self.root_value,
            data: Arc::new(self.data),
        }
    }
}
