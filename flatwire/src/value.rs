//! Owned value graphs.
//!
//! The input of the writer and the output of greedy decoding. A [`TableValue`] holds one
//! optional value per field of its [`TableSchema`], in descriptor order, and keeps no
//! reference to any buffer.
use crate::{
    scalar::Scalar,
    schema::{TableSchema, WireType},
};

#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum Value {
    Scalar(Scalar),
    String(String),
    Vector(Vec<Value>),
    Table(TableValue),
    /// Struct members in schema order.
    Struct(Vec<Scalar>),
    Union(UnionValue),
}

impl Value {
    pub const fn as_scalar(&self) -> Option<Scalar> {
        match self {
            Value::Scalar(scalar) => Some(*scalar),
            _ => None,
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            Value::String(string) => Some(string),
            _ => None,
        }
    }

    pub fn as_table(&self) -> Option<&TableValue> {
        match self {
            Value::Table(table) => Some(table),
            _ => None,
        }
    }

    pub fn as_vector(&self) -> Option<&[Value]> {
        match self {
            Value::Vector(items) => Some(items),
            _ => None,
        }
    }

    /// Vector of `u8` scalars from raw bytes.
    pub fn bytes(bytes: &[u8]) -> Self {
        Value::Vector(bytes.iter().map(|byte| Value::Scalar(Scalar::U8(*byte))).collect())
    }
}

impl From<Scalar> for Value {
    fn from(scalar: Scalar) -> Self {
        Value::Scalar(scalar)
    }
}

impl From<&str> for Value {
    fn from(string: &str) -> Self {
        Value::String(string.to_owned())
    }
}

impl From<String> for Value {
    fn from(string: String) -> Self {
        Value::String(string)
    }
}

impl From<TableValue> for Value {
    fn from(table: TableValue) -> Self {
        Value::Table(table)
    }
}

/// Value of a union field.
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct UnionValue {
    /// Discriminant: member `tag - 1` of the union's table list.
    pub tag: u8,
    pub table: Box<TableValue>,
}

impl UnionValue {
    pub fn new(tag: u8, table: TableValue) -> Self {
        Self {
            tag,
            table: Box::new(table),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Default)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct TableValue {
    /// One entry per schema field; `None` is absent on the wire.
    pub fields: Vec<Option<Value>>,
}

impl TableValue {
    pub fn new(fields: Vec<Option<Value>>) -> Self {
        Self { fields }
    }

    /// A table of `schema` with every field absent.
    pub fn empty(schema: &TableSchema) -> Self {
        Self {
            fields: vec![None; schema.fields.len()],
        }
    }

    pub fn get(&self, position: usize) -> Option<&Value> {
        self.fields.get(position)?.as_ref()
    }

    /// Set the field called `name`. Returns `false` if `schema` has no such field.
    pub fn set(&mut self, schema: &TableSchema, name: &str, value: impl Into<Value>) -> bool {
        let Some(position) = schema.position(name) else {
            return false;
        };
        if self.fields.len() < schema.fields.len() {
            self.fields.resize(schema.fields.len(), None);
        }
        self.fields[position] = Some(value.into());
        true
    }

    /// The scalar field called `name`, with the schema default substituted when absent.
    pub fn scalar(&self, schema: &TableSchema, name: &str) -> Option<Scalar> {
        let position = schema.position(name)?;
        let field = &schema.fields[position];
        if !matches!(field.ty, WireType::Scalar(_)) {
            return None;
        }
        match self.get(position) {
            Some(value) => value.as_scalar(),
            None => Some(field.default),
        }
    }
}
