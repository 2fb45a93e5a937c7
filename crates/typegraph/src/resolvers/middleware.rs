//! Guards, middleware and authorization stages.
//!
//! Stages wrap a resolver in onion fashion. The chain for one field is
//! global stages, then the owning type's stages, then the field's own
//! stages, each in declaration order; the outermost stage runs first and
//! sees the result last. A guard that refuses short-circuits the chain so
//! neither later stages nor the handler run.

use std::fmt;
use std::sync::Arc;

use async_trait::async_trait;
use futures_util::future::BoxFuture;
use serde_json::Value;

use super::{Call, DenyReason};
use crate::error::ResolverError;

/// A composed stage chain, ending in the handler.
pub type StageChain =
    Arc<dyn Fn(Call) -> BoxFuture<'static, Result<Value, ResolverError>> + Send + Sync>;

/// The remainder of the chain after the current stage.
pub struct Next {
    chain: StageChain,
}

impl Next {
    pub(crate) fn new(chain: StageChain) -> Self {
        Self { chain }
    }

    /// Runs the remaining stages and the handler.
    ///
    /// # Errors
    ///
    /// Propagates any error raised further down the chain.
    pub async fn run(self, call: Call) -> Result<Value, ResolverError> {
        (self.chain)(call).await
    }
}

/// Code wrapped around a resolver.
///
/// Middleware may rewrite the call before invoking [`Next::run`], transform
/// the result afterwards, or return early without calling it.
#[async_trait]
pub trait Middleware: Send + Sync + 'static {
    /// Runs the stage.
    async fn call(&self, call: Call, next: Next) -> Result<Value, ResolverError>;
}

/// A yes/no check evaluated before the handler.
#[async_trait]
pub trait Guard: Send + Sync + 'static {
    /// Allows the call or refuses it with a reason.
    async fn check(&self, call: &Call) -> Result<(), DenyReason>;
}

/// Decides whether the caller satisfies an `authorized` stage.
#[async_trait]
pub trait AuthChecker: Send + Sync + 'static {
    /// Returns `true` if the call may proceed. `roles` is empty when the
    /// stage only requires an authenticated caller.
    async fn check(&self, call: &Call, roles: &[String]) -> bool;
}

/// Checks the context's [`Principal`](crate::context::Principal) roles.
///
/// Passes when the caller is authenticated and either no roles are
/// required or the caller holds at least one of them.
#[derive(Debug, Clone, Copy, Default)]
pub struct RoleChecker;

#[async_trait]
impl AuthChecker for RoleChecker {
    async fn check(&self, call: &Call, roles: &[String]) -> bool {
        match &call.context.user {
            Some(user) => roles.is_empty() || roles.iter().any(|r| user.has_role(r)),
            None => false,
        }
    }
}

/// One entry of a stage chain.
#[derive(Clone)]
pub enum Stage {
    /// Refuses the call unless the guard passes.
    Guard(Arc<dyn Guard>),
    /// Wraps the rest of the chain.
    Middleware(Arc<dyn Middleware>),
    /// Requires the configured [`AuthChecker`] to accept the listed roles.
    Authorized(Vec<String>),
}

impl Stage {
    /// Wraps a guard.
    pub fn guard(guard: impl Guard) -> Self {
        Self::Guard(Arc::new(guard))
    }

    /// Wraps a synchronous guard function.
    pub fn guard_fn<F>(check: F) -> Self
    where
        F: Fn(&Call) -> Result<(), DenyReason> + Send + Sync + 'static,
    {
        Self::Guard(Arc::new(FnGuard(check)))
    }

    /// Wraps a middleware.
    pub fn middleware(middleware: impl Middleware) -> Self {
        Self::Middleware(Arc::new(middleware))
    }

    /// Requires an authenticated caller holding any of `roles`.
    pub fn authorized<I, S>(roles: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self::Authorized(roles.into_iter().map(Into::into).collect())
    }

    pub(crate) fn is_authorized(&self) -> bool {
        matches!(self, Self::Authorized(_))
    }

    /// Converts the stage into middleware. `Authorized` stages need a
    /// checker; the binder reports a build error when none is configured.
    pub(crate) fn to_middleware(
        &self,
        checker: Option<&Arc<dyn AuthChecker>>,
        null_on_refusal: bool,
    ) -> Option<Arc<dyn Middleware>> {
        match self {
            Self::Guard(guard) => Some(Arc::new(GuardStage {
                guard: Arc::clone(guard),
                null_on_refusal: false,
            })),
            Self::Middleware(middleware) => Some(Arc::clone(middleware)),
            Self::Authorized(roles) => checker.map(|checker| {
                Arc::new(GuardStage {
                    guard: Arc::new(AuthorizedGuard {
                        roles: roles.clone(),
                        checker: Arc::clone(checker),
                    }),
                    null_on_refusal,
                }) as Arc<dyn Middleware>
            }),
        }
    }
}

impl fmt::Debug for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Guard(_) => f.write_str("Guard"),
            Self::Middleware(_) => f.write_str("Middleware"),
            Self::Authorized(roles) => f.debug_tuple("Authorized").field(roles).finish(),
        }
    }
}

/// Folds stages around `endpoint`; the first stage ends up outermost.
pub(crate) fn compose(stages: Vec<Arc<dyn Middleware>>, endpoint: StageChain) -> StageChain {
    stages.into_iter().rev().fold(endpoint, |next, stage| {
        let chained: StageChain = Arc::new(
            move |call: Call| -> BoxFuture<'static, Result<Value, ResolverError>> {
                let stage = Arc::clone(&stage);
                let next = Next::new(Arc::clone(&next));
                Box::pin(async move { stage.call(call, next).await })
            },
        );
        chained
    })
}

struct FnGuard<F>(F);

#[async_trait]
impl<F> Guard for FnGuard<F>
where
    F: Fn(&Call) -> Result<(), DenyReason> + Send + Sync + 'static,
{
    async fn check(&self, call: &Call) -> Result<(), DenyReason> {
        (self.0)(call)
    }
}

struct GuardStage {
    guard: Arc<dyn Guard>,
    null_on_refusal: bool,
}

#[async_trait]
impl Middleware for GuardStage {
    async fn call(&self, call: Call, next: Next) -> Result<Value, ResolverError> {
        match self.guard.check(&call).await {
            Ok(()) => next.run(call).await,
            Err(reason) => {
                tracing::warn!(
                    parent = %call.info.parent_type,
                    field = %call.info.field_name,
                    reason = %reason.code,
                    "guard refused resolver"
                );
                if self.null_on_refusal {
                    Ok(Value::Null)
                } else {
                    Err(ResolverError::unauthorized(reason))
                }
            }
        }
    }
}

struct AuthorizedGuard {
    roles: Vec<String>,
    checker: Arc<dyn AuthChecker>,
}

#[async_trait]
impl Guard for AuthorizedGuard {
    async fn check(&self, call: &Call) -> Result<(), DenyReason> {
        if self.checker.check(call, &self.roles).await {
            return Ok(());
        }
        if !call.context.is_authenticated() {
            return Err(DenyReason::new("authentication required").with_code("unauthenticated"));
        }
        Err(DenyReason::new(format!(
            "requires one of roles: {}",
            self.roles.join(", ")
        )))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::context::{GraphContextBuilder, Principal};
    use crate::resolvers::FieldInfo;
    use serde_json::{Map, json};
    use std::sync::Mutex;

    fn call_as(user: Option<Principal>) -> Call {
        let mut builder = GraphContextBuilder::new();
        if let Some(user) = user {
            builder = builder.with_user(user);
        }
        Call {
            root: Value::Null,
            args: Map::new(),
            context: builder.build(),
            info: FieldInfo {
                parent_type: "Query".into(),
                field_name: "secret".into(),
                return_type: "String".into(),
                path: None,
            },
            dependencies: Vec::new(),
        }
    }

    struct Record {
        name: &'static str,
        log: Arc<Mutex<Vec<String>>>,
    }

    #[async_trait]
    impl Middleware for Record {
        async fn call(&self, call: Call, next: Next) -> Result<Value, ResolverError> {
            self.log.lock().unwrap().push(format!("{}:before", self.name));
            let result = next.run(call).await;
            self.log.lock().unwrap().push(format!("{}:after", self.name));
            result
        }
    }

    fn endpoint(log: Arc<Mutex<Vec<String>>>) -> StageChain {
        Arc::new(move |_call: Call| -> BoxFuture<'static, Result<Value, ResolverError>> {
            let log = Arc::clone(&log);
            Box::pin(async move {
                log.lock().unwrap().push("handler".into());
                Ok(json!("done"))
            })
        })
    }

    #[tokio::test]
    async fn test_compose_wraps_in_order() {
        let log = Arc::new(Mutex::new(Vec::new()));
        let stages: Vec<Arc<dyn Middleware>> = vec![
            Arc::new(Record { name: "outer", log: Arc::clone(&log) }),
            Arc::new(Record { name: "inner", log: Arc::clone(&log) }),
        ];

        let chain = compose(stages, endpoint(Arc::clone(&log)));
        let result = chain(call_as(None)).await.unwrap();

        assert_eq!(result, json!("done"));
        assert_eq!(
            *log.lock().unwrap(),
            vec!["outer:before", "inner:before", "handler", "inner:after", "outer:after"]
        );
    }

    #[tokio::test]
    async fn test_refusing_guard_short_circuits() {
        let log = Arc::new(Mutex::new(Vec::new()));
        let deny = Stage::guard_fn(|_| Err(DenyReason::new("closed")));
        let stages = vec![deny.to_middleware(None, false).unwrap()];

        let chain = compose(stages, endpoint(Arc::clone(&log)));
        let err = chain(call_as(None)).await.unwrap_err();

        assert!(err.is_authorization());
        assert!(log.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_role_checker() {
        let checker = RoleChecker;
        let admin = call_as(Some(Principal::new("u").with_role("ADMIN")));
        let guest = call_as(Some(Principal::new("g")));
        let anonymous = call_as(None);
        let admins = vec!["ADMIN".to_string()];

        assert!(checker.check(&admin, &admins).await);
        assert!(!checker.check(&guest, &admins).await);
        assert!(checker.check(&guest, &[]).await);
        assert!(!checker.check(&anonymous, &[]).await);
    }

    #[tokio::test]
    async fn test_authorized_null_mode() {
        let checker: Arc<dyn AuthChecker> = Arc::new(RoleChecker);
        let stage = Stage::authorized(["ADMIN"]);
        let log = Arc::new(Mutex::new(Vec::new()));

        let strict = compose(
            vec![stage.to_middleware(Some(&checker), false).unwrap()],
            endpoint(Arc::clone(&log)),
        );
        let err = strict(call_as(None)).await.unwrap_err();
        match err {
            ResolverError::Unauthorized(reason) => assert_eq!(reason.code, "unauthenticated"),
            other => panic!("unexpected error: {other:?}"),
        }

        let lenient = compose(
            vec![stage.to_middleware(Some(&checker), true).unwrap()],
            endpoint(Arc::clone(&log)),
        );
        assert_eq!(lenient(call_as(None)).await.unwrap(), Value::Null);
        assert!(log.lock().unwrap().is_empty());
    }

    #[test]
    fn test_authorized_needs_checker() {
        assert!(Stage::authorized(["ADMIN"]).to_middleware(None, false).is_none());
        assert!(Stage::authorized(Vec::<String>::new()).is_authorized());
    }
}
