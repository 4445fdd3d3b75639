//! Typed protocol model for the Strata store.
//!
//! Every value that crosses the wire is strongly typed. This module maps
//! untyped caller values ([`SqlValue`]) into protocol values
//! ([`StrataValue`]) through shared, interned [`TypeDescriptor`]s.

use std::fmt;
use std::str::FromStr;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use dashmap::DashMap;
use rust_decimal::Decimal;
use uuid::Uuid;

use crate::error::{StrataError, StrataResult};

/// Member list of a struct type, in declaration order.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct StructShape {
    members: Vec<(String, StrataType)>,
}

impl StructShape {
    pub fn new(members: Vec<(String, StrataType)>) -> Self {
        Self { members }
    }

    pub fn len(&self) -> usize {
        self.members.len()
    }

    pub fn is_empty(&self) -> bool {
        self.members.is_empty()
    }

    pub fn member_name(&self, index: usize) -> &str {
        &self.members[index].0
    }

    pub fn member_type(&self, index: usize) -> &StrataType {
        &self.members[index].1
    }

    pub fn index_of(&self, name: &str) -> Option<usize> {
        self.members.iter().position(|(n, _)| n == name)
    }

    pub fn members(&self) -> impl Iterator<Item = (&str, &StrataType)> {
        self.members.iter().map(|(n, t)| (n.as_str(), t))
    }
}

/// A remote column/parameter type.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum StrataType {
    Bool,
    Int32,
    Int64,
    Float,
    Double,
    Text,
    Bytes,
    Uuid,
    Timestamp,
    Decimal,
    Optional(Box<StrataType>),
    List(Box<StrataType>),
    Struct(Arc<StructShape>),
}

impl StrataType {
    /// Wrap this type into its nullable form. Already-optional types are
    /// returned unchanged.
    pub fn optional(&self) -> StrataType {
        match self {
            StrataType::Optional(_) => self.clone(),
            other => StrataType::Optional(Box::new(other.clone())),
        }
    }

    pub fn list_of(item: StrataType) -> StrataType {
        StrataType::List(Box::new(item))
    }

    pub fn struct_of(members: Vec<(String, StrataType)>) -> StrataType {
        StrataType::Struct(Arc::new(StructShape::new(members)))
    }

    pub fn is_optional(&self) -> bool {
        matches!(self, StrataType::Optional(_))
    }

    /// The item type of a list, if this is a list.
    pub fn list_item(&self) -> Option<&StrataType> {
        match self {
            StrataType::List(item) => Some(item),
            _ => None,
        }
    }

    /// The shape of a struct, if this is a struct.
    pub fn struct_shape(&self) -> Option<&Arc<StructShape>> {
        match self {
            StrataType::Struct(shape) => Some(shape),
            _ => None,
        }
    }
}

impl fmt::Display for StrataType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            StrataType::Bool => write!(f, "Bool"),
            StrataType::Int32 => write!(f, "Int32"),
            StrataType::Int64 => write!(f, "Int64"),
            StrataType::Float => write!(f, "Float"),
            StrataType::Double => write!(f, "Double"),
            StrataType::Text => write!(f, "Text"),
            StrataType::Bytes => write!(f, "Bytes"),
            StrataType::Uuid => write!(f, "Uuid"),
            StrataType::Timestamp => write!(f, "Timestamp"),
            StrataType::Decimal => write!(f, "Decimal"),
            StrataType::Optional(item) => write!(f, "Optional<{}>", item),
            StrataType::List(item) => write!(f, "List<{}>", item),
            StrataType::Struct(shape) => {
                write!(f, "Struct<")?;
                for (i, (name, ty)) in shape.members().enumerate() {
                    if i > 0 {
                        write!(f, ",")?;
                    }
                    write!(f, "{}:{}", name, ty)?;
                }
                write!(f, ">")
            }
        }
    }
}

/// A typed protocol value.
///
/// `Null` is the untyped-null placeholder: a null whose final type is not
/// yet decided. It never reaches the wire; assembly replaces it with a
/// typed empty optional.
#[derive(Debug, Clone, PartialEq)]
pub enum StrataValue {
    Null,
    Bool(bool),
    Int32(i32),
    Int64(i64),
    Float(f32),
    Double(f64),
    Text(String),
    Bytes(Vec<u8>),
    Uuid(Uuid),
    Timestamp(DateTime<Utc>),
    Decimal(Decimal),
    Optional {
        item: StrataType,
        value: Option<Box<StrataValue>>,
    },
    List {
        item: StrataType,
        items: Vec<StrataValue>,
    },
    Struct {
        shape: Arc<StructShape>,
        members: Vec<StrataValue>,
    },
}

impl StrataValue {
    /// The protocol type of this value, `None` for the untyped null.
    pub fn value_type(&self) -> Option<StrataType> {
        match self {
            StrataValue::Null => None,
            StrataValue::Bool(_) => Some(StrataType::Bool),
            StrataValue::Int32(_) => Some(StrataType::Int32),
            StrataValue::Int64(_) => Some(StrataType::Int64),
            StrataValue::Float(_) => Some(StrataType::Float),
            StrataValue::Double(_) => Some(StrataType::Double),
            StrataValue::Text(_) => Some(StrataType::Text),
            StrataValue::Bytes(_) => Some(StrataType::Bytes),
            StrataValue::Uuid(_) => Some(StrataType::Uuid),
            StrataValue::Timestamp(_) => Some(StrataType::Timestamp),
            StrataValue::Decimal(_) => Some(StrataType::Decimal),
            StrataValue::Optional { item, .. } => Some(item.optional()),
            StrataValue::List { item, .. } => Some(StrataType::list_of(item.clone())),
            StrataValue::Struct { shape, .. } => Some(StrataType::Struct(shape.clone())),
        }
    }

    pub fn is_null(&self) -> bool {
        matches!(self, StrataValue::Null)
    }

    /// Wrap a concrete value into an optional of its own type.
    pub fn wrap_optional(self) -> StrataValue {
        match self.value_type() {
            Some(StrataType::Optional(_)) | None => self,
            Some(ty) => StrataValue::Optional {
                item: ty,
                value: Some(Box::new(self)),
            },
        }
    }

    /// The empty value of `Optional<item>`.
    pub fn empty_optional(item: StrataType) -> StrataValue {
        StrataValue::Optional { item, value: None }
    }
}

/// An untyped caller-supplied value, before binding.
#[derive(Debug, Clone, PartialEq)]
pub enum SqlValue {
    Null,
    Bool(bool),
    Int32(i32),
    Int64(i64),
    Float(f32),
    Double(f64),
    Text(String),
    Bytes(Vec<u8>),
    Uuid(Uuid),
    Timestamp(DateTime<Utc>),
    Decimal(Decimal),
    List(Vec<SqlValue>),
}

impl SqlValue {
    pub fn is_null(&self) -> bool {
        matches!(self, SqlValue::Null)
    }

    /// The natural protocol type of this value, with no hint applied.
    /// `None` for nulls and for lists with no typed element.
    pub fn natural_type(&self) -> Option<StrataType> {
        match self {
            SqlValue::Null => None,
            SqlValue::Bool(_) => Some(StrataType::Bool),
            SqlValue::Int32(_) => Some(StrataType::Int32),
            SqlValue::Int64(_) => Some(StrataType::Int64),
            SqlValue::Float(_) => Some(StrataType::Float),
            SqlValue::Double(_) => Some(StrataType::Double),
            SqlValue::Text(_) => Some(StrataType::Text),
            SqlValue::Bytes(_) => Some(StrataType::Bytes),
            SqlValue::Uuid(_) => Some(StrataType::Uuid),
            SqlValue::Timestamp(_) => Some(StrataType::Timestamp),
            SqlValue::Decimal(_) => Some(StrataType::Decimal),
            SqlValue::List(items) => items
                .iter()
                .find_map(|v| v.natural_type())
                .map(StrataType::list_of),
        }
    }
}

impl fmt::Display for SqlValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SqlValue::Null => write!(f, "NULL"),
            SqlValue::Bool(b) => write!(f, "{}", b),
            SqlValue::Int32(n) => write!(f, "{}", n),
            SqlValue::Int64(n) => write!(f, "{}", n),
            SqlValue::Float(n) => write!(f, "{}", n),
            SqlValue::Double(n) => write!(f, "{}", n),
            SqlValue::Text(s) => write!(f, "'{}'", s),
            SqlValue::Bytes(b) => write!(f, "<{} bytes>", b.len()),
            SqlValue::Uuid(u) => write!(f, "'{}'", u),
            SqlValue::Timestamp(ts) => write!(f, "'{}'", ts.to_rfc3339()),
            SqlValue::Decimal(d) => write!(f, "{}", d),
            SqlValue::List(items) => write!(f, "<list of {}>", items.len()),
        }
    }
}

impl From<bool> for SqlValue {
    fn from(b: bool) -> Self {
        SqlValue::Bool(b)
    }
}

impl From<i32> for SqlValue {
    fn from(n: i32) -> Self {
        SqlValue::Int32(n)
    }
}

impl From<i64> for SqlValue {
    fn from(n: i64) -> Self {
        SqlValue::Int64(n)
    }
}

impl From<f32> for SqlValue {
    fn from(n: f32) -> Self {
        SqlValue::Float(n)
    }
}

impl From<f64> for SqlValue {
    fn from(n: f64) -> Self {
        SqlValue::Double(n)
    }
}

impl From<&str> for SqlValue {
    fn from(s: &str) -> Self {
        SqlValue::Text(s.to_string())
    }
}

impl From<String> for SqlValue {
    fn from(s: String) -> Self {
        SqlValue::Text(s)
    }
}

impl From<Uuid> for SqlValue {
    fn from(u: Uuid) -> Self {
        SqlValue::Uuid(u)
    }
}

impl From<DateTime<Utc>> for SqlValue {
    fn from(ts: DateTime<Utc>) -> Self {
        SqlValue::Timestamp(ts)
    }
}

impl From<Decimal> for SqlValue {
    fn from(d: Decimal) -> Self {
        SqlValue::Decimal(d)
    }
}

impl<T: Into<SqlValue>> From<Option<T>> for SqlValue {
    fn from(opt: Option<T>) -> Self {
        match opt {
            Some(v) => v.into(),
            None => SqlValue::Null,
        }
    }
}

/// One column of a described table.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Column {
    pub name: String,
    pub ty: StrataType,
}

impl Column {
    pub fn new(name: impl Into<String>, ty: StrataType) -> Self {
        Self {
            name: name.into(),
            ty,
        }
    }
}

/// Conversion of caller values into exactly one remote type.
///
/// Immutable; interned by [`TypeRegistry`] and shared freely.
#[derive(Debug, PartialEq, Eq)]
pub struct TypeDescriptor {
    ty: StrataType,
}

impl TypeDescriptor {
    fn new(ty: StrataType) -> Self {
        Self { ty }
    }

    pub fn strata_type(&self) -> &StrataType {
        &self.ty
    }

    /// Convert a raw caller value into a protocol value of this type.
    ///
    /// `name` is the parameter being bound; it only feeds error messages.
    pub fn to_value(&self, name: &str, raw: &SqlValue) -> StrataResult<StrataValue> {
        convert(name, &self.ty, raw)
    }
}

fn conversion_error(name: &str, expected: &StrataType, raw: &SqlValue) -> StrataError {
    StrataError::Conversion {
        name: name.to_string(),
        expected: expected.to_string(),
        value: raw.to_string(),
    }
}

fn convert(name: &str, ty: &StrataType, raw: &SqlValue) -> StrataResult<StrataValue> {
    if raw.is_null() {
        return match ty {
            StrataType::Optional(item) => Ok(StrataValue::empty_optional((**item).clone())),
            other => Err(conversion_error(name, other, raw)),
        };
    }

    match (ty, raw) {
        (StrataType::Bool, SqlValue::Bool(b)) => Ok(StrataValue::Bool(*b)),
        (StrataType::Int32, SqlValue::Int32(n)) => Ok(StrataValue::Int32(*n)),
        (StrataType::Int64, SqlValue::Int32(n)) => Ok(StrataValue::Int64(i64::from(*n))),
        (StrataType::Int64, SqlValue::Int64(n)) => Ok(StrataValue::Int64(*n)),
        (StrataType::Float, SqlValue::Float(n)) => Ok(StrataValue::Float(*n)),
        (StrataType::Double, SqlValue::Float(n)) => Ok(StrataValue::Double(f64::from(*n))),
        (StrataType::Double, SqlValue::Double(n)) => Ok(StrataValue::Double(*n)),
        (StrataType::Double, SqlValue::Int32(n)) => Ok(StrataValue::Double(f64::from(*n))),
        (StrataType::Text, SqlValue::Text(s)) => Ok(StrataValue::Text(s.clone())),
        (StrataType::Bytes, SqlValue::Bytes(b)) => Ok(StrataValue::Bytes(b.clone())),
        (StrataType::Bytes, SqlValue::Text(s)) => Ok(StrataValue::Bytes(s.clone().into_bytes())),
        (StrataType::Uuid, SqlValue::Uuid(u)) => Ok(StrataValue::Uuid(*u)),
        (StrataType::Uuid, SqlValue::Text(s)) => Uuid::from_str(s)
            .map(StrataValue::Uuid)
            .map_err(|_| conversion_error(name, ty, raw)),
        (StrataType::Timestamp, SqlValue::Timestamp(ts)) => Ok(StrataValue::Timestamp(*ts)),
        (StrataType::Timestamp, SqlValue::Text(s)) => DateTime::parse_from_rfc3339(s)
            .map(|ts| StrataValue::Timestamp(ts.with_timezone(&Utc)))
            .map_err(|_| conversion_error(name, ty, raw)),
        (StrataType::Decimal, SqlValue::Decimal(d)) => Ok(StrataValue::Decimal(*d)),
        (StrataType::Decimal, SqlValue::Int32(n)) => Ok(StrataValue::Decimal(Decimal::from(*n))),
        (StrataType::Decimal, SqlValue::Int64(n)) => Ok(StrataValue::Decimal(Decimal::from(*n))),
        (StrataType::Decimal, SqlValue::Text(s)) => Decimal::from_str(s)
            .map(StrataValue::Decimal)
            .map_err(|_| conversion_error(name, ty, raw)),
        (StrataType::Optional(item), value) => {
            Ok(convert(name, item, value)?.wrap_optional())
        }
        (StrataType::List(item), SqlValue::List(values)) => {
            let items = values
                .iter()
                .map(|v| convert(name, item, v))
                .collect::<StrataResult<Vec<_>>>()?;
            Ok(StrataValue::List {
                item: (**item).clone(),
                items,
            })
        }
        (expected, value) => Err(conversion_error(name, expected, value)),
    }
}

/// Interning registry of type descriptors.
///
/// Descriptors are created on first sight of a remote type and shared by
/// every caller of the owning context afterwards.
#[derive(Debug, Default)]
pub struct TypeRegistry {
    descriptors: DashMap<StrataType, Arc<TypeDescriptor>>,
}

impl TypeRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Descriptor for a remote type, interned.
    pub fn find(&self, ty: &StrataType) -> Arc<TypeDescriptor> {
        if let Some(found) = self.descriptors.get(ty) {
            return found.clone();
        }
        self.descriptors
            .entry(ty.clone())
            .or_insert_with(|| Arc::new(TypeDescriptor::new(ty.clone())))
            .clone()
    }

    /// Descriptor for the nullable form of a remote type.
    pub fn find_optional(&self, ty: &StrataType) -> Arc<TypeDescriptor> {
        self.find(&ty.optional())
    }

    /// Infer a descriptor from a raw value and an optional type hint.
    ///
    /// The hint wins when present. Returns `None` when nothing can be
    /// inferred, which is only legal for null values.
    pub fn infer(&self, raw: &SqlValue, hint: Option<&StrataType>) -> Option<Arc<TypeDescriptor>> {
        match hint {
            Some(ty) => Some(self.find(ty)),
            None => raw.natural_type().map(|ty| self.find(&ty)),
        }
    }

    pub fn len(&self) -> usize {
        self.descriptors.len()
    }

    pub fn is_empty(&self) -> bool {
        self.descriptors.is_empty()
    }
}

/// The assembled, fully-typed parameter set of one request.
///
/// Iteration order is name order, which keeps request payloads and logs
/// deterministic.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ParamSet {
    values: std::collections::BTreeMap<String, StrataValue>,
}

impl ParamSet {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn put(&mut self, name: impl Into<String>, value: StrataValue) {
        self.values.insert(name.into(), value);
    }

    pub fn get(&self, name: &str) -> Option<&StrataValue> {
        self.values.get(name)
    }

    pub fn contains(&self, name: &str) -> bool {
        self.values.contains_key(name)
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.values.keys().map(|k| k.as_str())
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &StrataValue)> {
        self.values.iter().map(|(k, v)| (k.as_str(), v))
    }
}

impl FromIterator<(String, StrataValue)> for ParamSet {
    fn from_iter<I: IntoIterator<Item = (String, StrataValue)>>(iter: I) -> Self {
        Self {
            values: iter.into_iter().collect(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_optional_wrapping_is_idempotent() {
        let opt = StrataType::Int32.optional();
        assert_eq!(opt, StrataType::Optional(Box::new(StrataType::Int32)));
        assert_eq!(opt.optional(), opt);
    }

    #[test]
    fn test_registry_interns_descriptors() {
        let registry = TypeRegistry::new();
        let a = registry.find(&StrataType::Int64);
        let b = registry.find(&StrataType::Int64);
        assert!(Arc::ptr_eq(&a, &b));
        assert_eq!(registry.len(), 1);
    }

    #[test]
    fn test_infer_prefers_hint() {
        let registry = TypeRegistry::new();
        let desc = registry
            .infer(&SqlValue::Int32(7), Some(&StrataType::Int64))
            .unwrap();
        assert_eq!(desc.strata_type(), &StrataType::Int64);

        let natural = registry.infer(&SqlValue::Int32(7), None).unwrap();
        assert_eq!(natural.strata_type(), &StrataType::Int32);

        assert!(registry.infer(&SqlValue::Null, None).is_none());
    }

    #[test]
    fn test_convert_widens_integers() {
        let registry = TypeRegistry::new();
        let desc = registry.find(&StrataType::Int64);
        let value = desc.to_value("$p1", &SqlValue::Int32(42)).unwrap();
        assert_eq!(value, StrataValue::Int64(42));
    }

    #[test]
    fn test_convert_null_requires_optional() {
        let registry = TypeRegistry::new();
        let plain = registry.find(&StrataType::Text);
        assert!(plain.to_value("name", &SqlValue::Null).is_err());

        let optional = registry.find_optional(&StrataType::Text);
        let value = optional.to_value("name", &SqlValue::Null).unwrap();
        assert_eq!(value, StrataValue::empty_optional(StrataType::Text));
    }

    #[test]
    fn test_convert_optional_wraps_concrete_value() {
        let registry = TypeRegistry::new();
        let optional = registry.find_optional(&StrataType::Int32);
        let value = optional.to_value("n", &SqlValue::Int32(5)).unwrap();
        assert_eq!(value, StrataValue::Int32(5).wrap_optional());
    }

    #[test]
    fn test_convert_rejects_mismatched_value() {
        let registry = TypeRegistry::new();
        let desc = registry.find(&StrataType::Bool);
        let err = desc.to_value("flag", &SqlValue::Text("yes".into())).unwrap_err();
        assert!(err.to_string().starts_with("value-conversion-failed"));
    }

    #[test]
    fn test_struct_shape_lookup() {
        let shape = StructShape::new(vec![
            ("a".to_string(), StrataType::Int32),
            ("b".to_string(), StrataType::Text),
        ]);
        assert_eq!(shape.index_of("a"), Some(0));
        assert_eq!(shape.index_of("b"), Some(1));
        assert_eq!(shape.index_of("c"), None);
        assert_eq!(shape.member_name(1), "b");
    }

    #[test]
    fn test_param_set_is_name_ordered() {
        let mut params = ParamSet::new();
        params.put("b", StrataValue::Int32(2));
        params.put("a", StrataValue::Int32(1));
        let names: Vec<_> = params.names().collect();
        assert_eq!(names, vec!["a", "b"]);
    }
}
