//! Built-in GraphQL scalars and their value rules.
//!
//! Output coercion is strict: a resolver returning a string for an `Int`
//! field is a coercion error, not a silent conversion. The only widening is
//! `ID`, which accepts integers and serializes them as strings.

use serde_json::Value;

/// One of the five scalars every schema provides.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum BuiltinScalar {
    /// Signed 32-bit integer.
    Int,
    /// Double-precision floating point.
    Float,
    /// UTF-8 string.
    String,
    /// `true` or `false`.
    Boolean,
    /// Opaque identifier serialized as a string.
    Id,
}

impl BuiltinScalar {
    /// All built-in scalars in registration order.
    pub const ALL: [BuiltinScalar; 5] = [
        Self::Int,
        Self::Float,
        Self::String,
        Self::Boolean,
        Self::Id,
    ];

    /// The GraphQL name of the scalar.
    #[must_use]
    pub fn name(self) -> &'static str {
        match self {
            Self::Int => "Int",
            Self::Float => "Float",
            Self::String => "String",
            Self::Boolean => "Boolean",
            Self::Id => "ID",
        }
    }

    /// Looks up a built-in scalar by GraphQL name.
    #[must_use]
    pub fn from_name(name: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|s| s.name() == name)
    }

    /// Checks a non-null resolver result against this scalar.
    ///
    /// # Errors
    ///
    /// Returns a message describing the mismatch.
    pub fn coerce_output(self, value: &Value) -> Result<Value, String> {
        self.coerce(value)
            .ok_or_else(|| format!("{} cannot represent value {value}", self.name()))
    }

    /// Checks a non-null argument value against this scalar.
    ///
    /// # Errors
    ///
    /// Returns a message describing the mismatch.
    pub fn coerce_input(self, value: &Value) -> Result<Value, String> {
        self.coerce(value)
            .ok_or_else(|| format!("expected {}, found {value}", self.name()))
    }

    fn coerce(self, value: &Value) -> Option<Value> {
        match (self, value) {
            (Self::Int, Value::Number(n)) => n
                .as_i64()
                .filter(|i| i32::try_from(*i).is_ok())
                .map(Value::from),
            (Self::Float, Value::Number(_)) => Some(value.clone()),
            (Self::String, Value::String(_)) => Some(value.clone()),
            (Self::Boolean, Value::Bool(_)) => Some(value.clone()),
            (Self::Id, Value::String(_)) => Some(value.clone()),
            (Self::Id, Value::Number(n)) if n.is_i64() || n.is_u64() => {
                Some(Value::String(n.to_string()))
            }
            _ => None,
        }
    }
}
