//! Parameter plans and the values materialized from them.

use std::any::Any;
use std::sync::Arc;

use serde::de::DeserializeOwned;
use serde_json::{Map, Value};

use super::Instance;
use crate::context::GraphContext;
use crate::error::ResolverError;

/// Where one handler parameter comes from.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum ParameterSource {
    /// The parent value (or the context root value for root operations).
    Root,
    /// A single argument by name.
    Arg(String),
    /// Every supplied argument as one object.
    Args,
    /// The per-request [`GraphContext`].
    Context,
    /// Static information about the field being resolved.
    Info,
    /// A dependency resolved from the configured container.
    Inject(String),
}

impl ParameterSource {
    /// Shorthand for [`ParameterSource::Arg`].
    pub fn arg(name: impl Into<String>) -> Self {
        Self::Arg(name.into())
    }

    /// Shorthand for [`ParameterSource::Inject`].
    pub fn inject(token: impl Into<String>) -> Self {
        Self::Inject(token.into())
    }
}

/// Static information about the field being resolved.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FieldInfo {
    /// Name of the type owning the field (`Query` for root queries).
    pub parent_type: String,
    /// Field name.
    pub field_name: String,
    /// Declared return type in SDL notation.
    pub return_type: String,
    /// Response path, when invoked by the engine.
    pub path: Option<String>,
}

/// A single materialized parameter.
#[derive(Debug, Clone)]
pub enum ParamValue {
    /// The parent or root value.
    Root(Value),
    /// One argument.
    Arg {
        /// Argument name.
        name: String,
        /// Coerced value, `Null` when omitted.
        value: Value,
    },
    /// All supplied arguments.
    Args(Map<String, Value>),
    /// The request context.
    Context(GraphContext),
    /// Field information.
    Info(FieldInfo),
    /// An injected dependency.
    Dependency {
        /// Container token.
        token: String,
        /// Resolved instance.
        instance: Instance,
    },
}

/// The invocation as seen by guards and middleware.
///
/// Stages may inspect and rewrite the root value and arguments before
/// calling the next stage. The handler's [`Params`] are materialized from
/// the call that reaches the end of the chain.
#[derive(Debug, Clone)]
pub struct Call {
    /// Parent value.
    pub root: Value,
    /// Coerced arguments, with defaults applied.
    pub args: Map<String, Value>,
    /// Request context.
    pub context: GraphContext,
    /// Field information.
    pub info: FieldInfo,
    pub(crate) dependencies: Vec<(String, Instance)>,
}

impl Call {
    /// Returns an argument value.
    #[must_use]
    pub fn arg(&self, name: &str) -> Option<&Value> {
        self.args.get(name)
    }

    fn dependency(&self, token: &str) -> Option<Instance> {
        self.dependencies
            .iter()
            .find(|(t, _)| t == token)
            .map(|(_, instance)| Arc::clone(instance))
    }
}

/// Ordered handler parameters, one entry per declared [`ParameterSource`].
#[derive(Debug, Clone, Default)]
pub struct Params {
    values: Vec<ParamValue>,
}

impl Params {
    /// Creates parameters from values in plan order.
    #[must_use]
    pub fn new(values: Vec<ParamValue>) -> Self {
        Self { values }
    }

    pub(crate) fn from_call(plan: &[ParameterSource], call: &Call) -> Self {
        let values = plan
            .iter()
            .filter_map(|source| match source {
                ParameterSource::Root => Some(ParamValue::Root(call.root.clone())),
                ParameterSource::Arg(name) => Some(ParamValue::Arg {
                    name: name.clone(),
                    value: call.args.get(name).cloned().unwrap_or(Value::Null),
                }),
                ParameterSource::Args => Some(ParamValue::Args(call.args.clone())),
                ParameterSource::Context => Some(ParamValue::Context(call.context.clone())),
                ParameterSource::Info => Some(ParamValue::Info(call.info.clone())),
                ParameterSource::Inject(token) => {
                    call.dependency(token).map(|instance| ParamValue::Dependency {
                        token: token.clone(),
                        instance,
                    })
                }
            })
            .collect();
        Self { values }
    }

    /// Number of parameters.
    #[must_use]
    pub fn len(&self) -> usize {
        self.values.len()
    }

    /// Returns `true` when the resolver declared no parameters.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    /// Returns the parameter at `index` in plan order.
    #[must_use]
    pub fn get(&self, index: usize) -> Option<&ParamValue> {
        self.values.get(index)
    }

    /// Iterates parameters in plan order.
    pub fn iter(&self) -> std::slice::Iter<'_, ParamValue> {
        self.values.iter()
    }

    /// Returns the root parameter.
    #[must_use]
    pub fn root(&self) -> Option<&Value> {
        self.values.iter().find_map(|v| match v {
            ParamValue::Root(root) => Some(root),
            _ => None,
        })
    }

    /// Returns the raw value of argument `name`.
    #[must_use]
    pub fn arg_value(&self, name: &str) -> Option<&Value> {
        self.values.iter().find_map(|v| match v {
            ParamValue::Arg { name: n, value } if n == name => Some(value),
            ParamValue::Args(args) => args.get(name),
            _ => None,
        })
    }

    /// Deserializes argument `name`. An omitted argument deserializes from
    /// `null`, so optional arguments can be read as `Option<T>`.
    ///
    /// # Errors
    ///
    /// Returns [`ResolverError::InvalidArgument`] if the value does not
    /// deserialize into `T`.
    pub fn arg<T: DeserializeOwned>(&self, name: &str) -> Result<T, ResolverError> {
        let value = self.arg_value(name).cloned().unwrap_or(Value::Null);
        serde_json::from_value(value).map_err(|e| ResolverError::InvalidArgument {
            argument: name.to_string(),
            message: e.to_string(),
        })
    }

    /// Deserializes the whole-arguments parameter.
    ///
    /// # Errors
    ///
    /// Returns [`ResolverError::InvalidArgument`] if the resolver did not
    /// request all arguments or they do not deserialize into `T`.
    pub fn args<T: DeserializeOwned>(&self) -> Result<T, ResolverError> {
        let args = self
            .values
            .iter()
            .find_map(|v| match v {
                ParamValue::Args(args) => Some(args.clone()),
                _ => None,
            })
            .ok_or_else(|| ResolverError::InvalidArgument {
                argument: "*".to_string(),
                message: "resolver did not request all arguments".to_string(),
            })?;
        serde_json::from_value(Value::Object(args)).map_err(|e| ResolverError::InvalidArgument {
            argument: "*".to_string(),
            message: e.to_string(),
        })
    }

    /// Returns the request context parameter.
    #[must_use]
    pub fn context(&self) -> Option<&GraphContext> {
        self.values.iter().find_map(|v| match v {
            ParamValue::Context(ctx) => Some(ctx),
            _ => None,
        })
    }

    /// Returns the field information parameter.
    #[must_use]
    pub fn info(&self) -> Option<&FieldInfo> {
        self.values.iter().find_map(|v| match v {
            ParamValue::Info(info) => Some(info),
            _ => None,
        })
    }

    /// Returns the injected dependency registered under `token`.
    ///
    /// # Errors
    ///
    /// Returns [`ResolverError::Dependency`] if the resolver did not inject
    /// `token` or the instance is not a `T`.
    pub fn inject<T: Any + Send + Sync>(&self, token: &str) -> Result<Arc<T>, ResolverError> {
        let instance = self
            .values
            .iter()
            .find_map(|v| match v {
                ParamValue::Dependency { token: t, instance } if t == token => {
                    Some(Arc::clone(instance))
                }
                _ => None,
            })
            .ok_or_else(|| ResolverError::Dependency {
                token: token.to_string(),
                message: "resolver did not inject this token".to_string(),
            })?;

        instance.downcast::<T>().map_err(|_| ResolverError::Dependency {
            token: token.to_string(),
            message: format!("instance is not a {}", std::any::type_name::<T>()),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn call() -> Call {
        let mut args = Map::new();
        args.insert("id".into(), json!("r-1"));
        Call {
            root: json!({"title": "Soup"}),
            args,
            context: GraphContext::default(),
            info: FieldInfo {
                parent_type: "Query".into(),
                field_name: "recipe".into(),
                return_type: "Recipe".into(),
                path: None,
            },
            dependencies: vec![("store".into(), Arc::new(41_u32) as Instance)],
        }
    }

    #[test]
    fn test_params_follow_plan_order() {
        let plan = vec![
            ParameterSource::Info,
            ParameterSource::arg("id"),
            ParameterSource::Root,
        ];
        let params = Params::from_call(&plan, &call());

        assert_eq!(params.len(), 3);
        assert!(matches!(params.get(0), Some(ParamValue::Info(_))));
        assert!(matches!(params.get(1), Some(ParamValue::Arg { name, .. }) if name == "id"));
        assert_eq!(params.root(), Some(&json!({"title": "Soup"})));
    }

    #[test]
    fn test_missing_arg_reads_as_null() {
        let plan = vec![ParameterSource::arg("limit")];
        let params = Params::from_call(&plan, &call());

        let limit: Option<i32> = params.arg("limit").unwrap();
        assert_eq!(limit, None);
        assert!(params.arg::<i32>("limit").is_err());
    }

    #[test]
    fn test_args_requires_request() {
        let params = Params::from_call(&[ParameterSource::arg("id")], &call());
        assert!(params.args::<Map<String, Value>>().is_err());

        let params = Params::from_call(&[ParameterSource::Args], &call());
        let args: Map<String, Value> = params.args().unwrap();
        assert_eq!(args.get("id"), Some(&json!("r-1")));
        assert_eq!(params.arg::<String>("id").unwrap(), "r-1");
    }

    #[test]
    fn test_inject_downcasts() {
        let params = Params::from_call(&[ParameterSource::inject("store")], &call());
        assert_eq!(*params.inject::<u32>("store").unwrap(), 41);
        assert!(params.inject::<String>("store").is_err());
        assert!(params.inject::<u32>("other").is_err());
    }
}
