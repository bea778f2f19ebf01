//! Typed field accessors.
//!
//! Configuration options that address a value inside a data record are bound
//! once as an [`Accessor`]: either a field-name lookup against the record's
//! field map or a pure function of the record. No runtime string dispatch
//! happens outside of this type.

use std::fmt;
use std::rc::Rc;

use serde_json::Value;

use super::Fields;
use super::node::NodeKey;

/// A binding from a data record to one of its values.
#[derive(Clone, Default)]
pub enum Accessor {
    /// Not configured; always yields `Null`.
    #[default]
    Unset,
    /// Look up a named field on the record.
    Field(String),
    /// Compute the value from the whole record.
    Func(Rc<dyn Fn(&Fields) -> Value>),
}

impl Accessor {
    /// Bind to a named field.
    pub fn field(name: impl Into<String>) -> Self {
        Self::Field(name.into())
    }

    /// Bind to a function of the record.
    pub fn func(f: impl Fn(&Fields) -> Value + 'static) -> Self {
        Self::Func(Rc::new(f))
    }

    /// True unless the accessor is [`Accessor::Unset`].
    #[inline]
    pub fn is_set(&self) -> bool {
        !matches!(self, Self::Unset)
    }

    /// The bound field name, when this accessor is a plain field lookup.
    pub fn field_name(&self) -> Option<&str> {
        match self {
            Self::Field(name) => Some(name),
            _ => None,
        }
    }

    /// Resolve the raw value for a record. Missing fields yield `Null`.
    pub fn value(&self, fields: &Fields) -> Value {
        match self {
            Self::Unset => Value::Null,
            Self::Field(name) => fields.get(name).cloned().unwrap_or(Value::Null),
            Self::Func(f) => f(fields),
        }
    }

    /// Resolve as a finite number, or `None` when absent or malformed.
    pub fn number(&self, fields: &Fields) -> Option<f64> {
        self.value(fields).as_f64().filter(|v| v.is_finite())
    }

    /// Resolve as a canonical node key.
    pub fn key(&self, fields: &Fields) -> Option<NodeKey> {
        NodeKey::from_value(&self.value(fields))
    }
}

impl fmt::Debug for Accessor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Unset => f.write_str("Accessor::Unset"),
            Self::Field(name) => write!(f, "Accessor::Field({name:?})"),
            Self::Func(_) => f.write_str("Accessor::Func(..)"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn record(value: Value) -> Fields {
        let mut fields = Fields::new();
        fields.insert("val".to_owned(), value);
        fields
    }

    #[test]
    fn test_unset_yields_null() {
        let fields = record(json!(7));
        assert_eq!(Accessor::Unset.value(&fields), Value::Null);
        assert_eq!(Accessor::Unset.number(&fields), None);
    }

    #[test]
    fn test_field_lookup() {
        let fields = record(json!(7));
        let acc = Accessor::field("val");
        assert_eq!(acc.number(&fields), Some(7.0));
        assert_eq!(Accessor::field("missing").number(&fields), None);
    }

    #[test]
    fn test_func_accessor() {
        let fields = record(json!(7));
        let acc = Accessor::func(|f| json!(f["val"].as_f64().unwrap_or(0.0) * 2.0));
        assert_eq!(acc.number(&fields), Some(14.0));
    }

    #[test]
    fn test_number_rejects_non_numeric() {
        assert_eq!(Accessor::field("val").number(&record(json!("abc"))), None);
    }

    #[test]
    fn test_key_resolution() {
        let acc = Accessor::field("val");
        assert_eq!(acc.key(&record(json!(3))), Some(NodeKey::new("3")));
        assert_eq!(acc.key(&record(json!("a"))), Some(NodeKey::new("a")));
        assert_eq!(acc.key(&record(Value::Null)), None);
    }
}
