//! Value trees decoded from object data
//!
//! A [`ValueField`] pairs a shared [`TemplateField`] with the decoded [`Value`] and
//! the value fields of its children. Decoding and encoding walk the template in
//! declaration order and align the stream to 4 bytes after every node whose
//! template asks for it, once per node rather than once per child.
//!
//! Array nodes keep their elements as children and carry [`Value::Array`]; the
//! element count written back is always the live number of children.

use std::io::{Cursor, Read, Seek, Write};
use std::sync::Arc;

use crate::endian::{EndianReader, EndianWriter};
use crate::error::{Error, Result};
use crate::template::{TemplateField, ValueType};

/// A decoded value
#[derive(Debug, Clone, PartialEq)]
pub enum Value {
    /// Composite nodes carry no value of their own
    None,
    Bool(bool),
    Int8(i8),
    UInt8(u8),
    Int16(i16),
    UInt16(u16),
    Int32(i32),
    UInt32(u32),
    Int64(i64),
    UInt64(u64),
    Float(f32),
    Double(f64),
    /// Raw string bytes, usually UTF-8
    String(Vec<u8>),
    /// Marker for array nodes, the elements are the node's children
    Array,
    ByteArray(Vec<u8>),
}

impl Value {
    pub const fn value_type(&self) -> ValueType {
        match self {
            Value::None => ValueType::None,
            Value::Bool(_) => ValueType::Bool,
            Value::Int8(_) => ValueType::Int8,
            Value::UInt8(_) => ValueType::UInt8,
            Value::Int16(_) => ValueType::Int16,
            Value::UInt16(_) => ValueType::UInt16,
            Value::Int32(_) => ValueType::Int32,
            Value::UInt32(_) => ValueType::UInt32,
            Value::Int64(_) => ValueType::Int64,
            Value::UInt64(_) => ValueType::UInt64,
            Value::Float(_) => ValueType::Float,
            Value::Double(_) => ValueType::Double,
            Value::String(_) => ValueType::String,
            Value::Array => ValueType::Array,
            Value::ByteArray(_) => ValueType::ByteArray,
        }
    }

    /// Zero value of a kind
    pub fn default_for(value_type: ValueType) -> Value {
        match value_type {
            ValueType::None => Value::None,
            ValueType::Bool => Value::Bool(false),
            ValueType::Int8 => Value::Int8(0),
            ValueType::UInt8 => Value::UInt8(0),
            ValueType::Int16 => Value::Int16(0),
            ValueType::UInt16 => Value::UInt16(0),
            ValueType::Int32 => Value::Int32(0),
            ValueType::UInt32 => Value::UInt32(0),
            ValueType::Int64 => Value::Int64(0),
            ValueType::UInt64 => Value::UInt64(0),
            ValueType::Float => Value::Float(0.0),
            ValueType::Double => Value::Double(0.0),
            ValueType::String => Value::String(Vec::new()),
            ValueType::Array => Value::Array,
            ValueType::ByteArray => Value::ByteArray(Vec::new()),
        }
    }

    pub const fn as_bool(&self) -> Option<bool> {
        match self {
            Value::Bool(value) => Some(*value),
            _ => None,
        }
    }

    /// Any integer or boolean widened to `i64`
    pub const fn as_i64(&self) -> Option<i64> {
        Some(match *self {
            Value::Bool(value) => value as i64,
            Value::Int8(value) => value as i64,
            Value::UInt8(value) => value as i64,
            Value::Int16(value) => value as i64,
            Value::UInt16(value) => value as i64,
            Value::Int32(value) => value as i64,
            Value::UInt32(value) => value as i64,
            Value::Int64(value) => value,
            Value::UInt64(value) => value as i64,
            _ => return None,
        })
    }

    /// Any integer or boolean reinterpreted as `u64`
    pub const fn as_u64(&self) -> Option<u64> {
        match *self {
            Value::UInt64(value) => Some(value),
            _ => match self.as_i64() {
                Some(value) => Some(value as u64),
                None => None,
            },
        }
    }

    /// Any numeric value converted to `f64`
    pub fn as_f64(&self) -> Option<f64> {
        match *self {
            Value::Float(value) => Some(value as f64),
            Value::Double(value) => Some(value),
            Value::UInt64(value) => Some(value as f64),
            _ => self.as_i64().map(|value| value as f64),
        }
    }

    /// String bytes as text, if they are valid UTF-8
    pub fn as_str(&self) -> Option<&str> {
        match self {
            Value::String(bytes) => std::str::from_utf8(bytes).ok(),
            _ => None,
        }
    }

    /// Raw bytes of strings and byte arrays
    pub fn as_bytes(&self) -> Option<&[u8]> {
        match self {
            Value::String(bytes) | Value::ByteArray(bytes) => Some(bytes),
            _ => None,
        }
    }
}

/// One decoded field of an object
#[derive(Debug, Clone, PartialEq)]
pub struct ValueField {
    template: Arc<TemplateField>,
    value: Value,
    children: Vec<ValueField>,
}

impl ValueField {
    /// Decode a field and its children at the reader's position
    pub fn read<R: Read + Seek>(
        template: &Arc<TemplateField>,
        reader: &mut EndianReader<R>,
    ) -> Result<Self> {
        let mut children = Vec::new();
        let value = match template.value_type {
            ValueType::Array => {
                let count = reader.read_i32()?;
                if count < 0 {
                    return Err(Error::NegativeArrayCount {
                        field: template.name.clone(),
                        count,
                    });
                }
                let element = array_element(template)?;
                for _ in 0..count {
                    children.push(ValueField::read(element, reader)?);
                }
                Value::Array
            }
            ValueType::ByteArray => {
                let count = reader.read_i32()?;
                if count < 0 {
                    return Err(Error::NegativeArrayCount {
                        field: template.name.clone(),
                        count,
                    });
                }
                Value::ByteArray(reader.read_bytes(count as usize)?)
            }
            ValueType::String => {
                let bytes = reader.read_count_bytes_i32()?;
                reader.align4()?;
                Value::String(bytes)
            }
            ValueType::None => {
                for child in template.children() {
                    children.push(ValueField::read(child, reader)?);
                }
                Value::None
            }
            ValueType::Bool => Value::Bool(reader.read_bool()?),
            ValueType::Int8 => Value::Int8(reader.read_i8()?),
            ValueType::UInt8 => Value::UInt8(reader.read_u8()?),
            ValueType::Int16 => Value::Int16(reader.read_i16()?),
            ValueType::UInt16 => Value::UInt16(reader.read_u16()?),
            ValueType::Int32 => Value::Int32(reader.read_i32()?),
            ValueType::UInt32 => Value::UInt32(reader.read_u32()?),
            ValueType::Int64 => Value::Int64(reader.read_i64()?),
            ValueType::UInt64 => Value::UInt64(reader.read_u64()?),
            ValueType::Float => Value::Float(reader.read_f32()?),
            ValueType::Double => Value::Double(reader.read_f64()?),
        };

        if template.align {
            reader.align4()?;
        }

        Ok(ValueField {
            template: Arc::clone(template),
            value,
            children,
        })
    }

    /// Encode the field with the same layout and alignment as [`ValueField::read`]
    pub fn write<W: Write + Seek>(&self, writer: &mut EndianWriter<W>) -> Result<()> {
        match &self.value {
            Value::Array => {
                writer.write_i32(self.children.len() as i32)?;
                for child in &self.children {
                    child.write(writer)?;
                }
            }
            Value::ByteArray(bytes) => writer.write_count_bytes_i32(bytes)?,
            Value::String(bytes) => {
                writer.write_count_bytes_i32(bytes)?;
                writer.align4()?;
            }
            Value::None => {
                for child in &self.children {
                    child.write(writer)?;
                }
            }
            Value::Bool(value) => writer.write_bool(*value)?,
            Value::Int8(value) => writer.write_i8(*value)?,
            Value::UInt8(value) => writer.write_u8(*value)?,
            Value::Int16(value) => writer.write_i16(*value)?,
            Value::UInt16(value) => writer.write_u16(*value)?,
            Value::Int32(value) => writer.write_i32(*value)?,
            Value::UInt32(value) => writer.write_u32(*value)?,
            Value::Int64(value) => writer.write_i64(*value)?,
            Value::UInt64(value) => writer.write_u64(*value)?,
            Value::Float(value) => writer.write_f32(*value)?,
            Value::Double(value) => writer.write_f64(*value)?,
        }

        if self.template.align {
            writer.align4()?;
        }
        Ok(())
    }

    /// A field holding the zero value of its template, with empty arrays and strings
    pub fn default_for(template: &Arc<TemplateField>) -> Self {
        let children = match template.value_type {
            ValueType::None => template.children().iter().map(ValueField::default_for).collect(),
            _ => Vec::new(),
        };
        ValueField {
            template: Arc::clone(template),
            value: Value::default_for(template.value_type),
            children,
        }
    }

    pub fn template(&self) -> &Arc<TemplateField> {
        &self.template
    }

    pub fn name(&self) -> &str {
        &self.template.name
    }

    pub fn type_name(&self) -> &str {
        &self.template.type_name
    }

    pub fn value(&self) -> &Value {
        &self.value
    }

    /// Child fields, or array elements for array nodes
    pub fn children(&self) -> &[ValueField] {
        &self.children
    }

    /// Look up a direct child by field name
    pub fn get(&self, name: &str) -> Option<&ValueField> {
        self.children.iter().find(|child| child.name() == name)
    }

    pub fn get_mut(&mut self, name: &str) -> Option<&mut ValueField> {
        self.children.iter_mut().find(|child| child.name() == name)
    }

    /// Follow a `/` separated path of child names, e.g. `m_Curve/Array`
    pub fn get_path(&self, path: &str) -> Option<&ValueField> {
        path.split('/')
            .filter(|part| !part.is_empty())
            .try_fold(self, |field, part| field.get(part))
    }

    /// Number of elements of an array node
    pub fn len(&self) -> usize {
        match &self.value {
            Value::ByteArray(bytes) => bytes.len(),
            _ => self.children.len(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Replace the value, which must be of the kind the template declares
    pub fn set_value(&mut self, value: Value) -> Result<()> {
        let actual = value.value_type();
        if actual != self.template.value_type || actual == ValueType::Array {
            return Err(self.mismatch(actual));
        }
        self.value = value;
        Ok(())
    }

    /// Store an integer, converting it to the declared kind
    ///
    /// Conversion uses `as` semantics, so values that do not fit the declared width
    /// are truncated without an error.
    pub fn set_integer(&mut self, value: i64) -> Result<()> {
        self.value = match self.template.value_type {
            ValueType::Bool => Value::Bool(value != 0),
            ValueType::Int8 => Value::Int8(value as i8),
            ValueType::UInt8 => Value::UInt8(value as u8),
            ValueType::Int16 => Value::Int16(value as i16),
            ValueType::UInt16 => Value::UInt16(value as u16),
            ValueType::Int32 => Value::Int32(value as i32),
            ValueType::UInt32 => Value::UInt32(value as u32),
            ValueType::Int64 => Value::Int64(value),
            ValueType::UInt64 => Value::UInt64(value as u64),
            ValueType::Float => Value::Float(value as f32),
            ValueType::Double => Value::Double(value as f64),
            _ => return Err(self.mismatch(ValueType::Int64)),
        };
        Ok(())
    }

    /// Store an unsigned integer, converting it to the declared kind with `as` semantics
    pub fn set_unsigned(&mut self, value: u64) -> Result<()> {
        match self.template.value_type {
            ValueType::UInt64 => {
                self.value = Value::UInt64(value);
                Ok(())
            }
            ValueType::Float => {
                self.value = Value::Float(value as f32);
                Ok(())
            }
            ValueType::Double => {
                self.value = Value::Double(value as f64);
                Ok(())
            }
            _ => self
                .set_integer(value as i64)
                .map_err(|_| self.mismatch(ValueType::UInt64)),
        }
    }

    /// Store a floating point number, converting it to the declared kind with `as` semantics
    pub fn set_float(&mut self, value: f64) -> Result<()> {
        match self.template.value_type {
            ValueType::Float => {
                self.value = Value::Float(value as f32);
                Ok(())
            }
            ValueType::Double => {
                self.value = Value::Double(value);
                Ok(())
            }
            ValueType::UInt64 => {
                self.value = Value::UInt64(value as u64);
                Ok(())
            }
            _ => self
                .set_integer(value as i64)
                .map_err(|_| self.mismatch(ValueType::Double)),
        }
    }

    pub fn set_bool(&mut self, value: bool) -> Result<()> {
        self.set_value(Value::Bool(value))
    }

    pub fn set_string(&mut self, value: impl Into<Vec<u8>>) -> Result<()> {
        self.set_value(Value::String(value.into()))
    }

    pub fn set_byte_array(&mut self, value: Vec<u8>) -> Result<()> {
        self.set_value(Value::ByteArray(value))
    }

    /// Append an element to an array node
    pub fn push_child(&mut self, child: ValueField) -> Result<()> {
        self.ensure_array()?;
        self.children.push(child);
        Ok(())
    }

    /// Append a default element to an array node and return it for editing
    pub fn push_default(&mut self) -> Result<&mut ValueField> {
        self.ensure_array()?;
        let element = ValueField::default_for(array_element(&self.template)?);
        self.children.push(element);
        let last = self.children.len() - 1;
        Ok(&mut self.children[last])
    }

    /// Insert an element into an array node, shifting later elements
    pub fn insert_child(&mut self, index: usize, child: ValueField) -> Result<()> {
        self.ensure_array()?;
        if index > self.children.len() {
            return Err(Error::CustomError(format!(
                "cannot insert element {index} into array {} of {} elements",
                self.name(),
                self.children.len()
            )));
        }
        self.children.insert(index, child);
        Ok(())
    }

    /// Remove and return an element of an array node
    pub fn remove_child(&mut self, index: usize) -> Result<Option<ValueField>> {
        self.ensure_array()?;
        if index < self.children.len() {
            Ok(Some(self.children.remove(index)))
        } else {
            Ok(None)
        }
    }

    /// Replace every element of an array node
    pub fn set_children(&mut self, children: Vec<ValueField>) -> Result<()> {
        self.ensure_array()?;
        self.children = children;
        Ok(())
    }

    /// Mutable access to the elements of an array node
    pub fn elements_mut(&mut self) -> Result<&mut [ValueField]> {
        self.ensure_array()?;
        Ok(&mut self.children)
    }

    fn ensure_array(&self) -> Result<()> {
        if self.template.value_type == ValueType::Array {
            Ok(())
        } else {
            Err(Error::NotAnArray(self.template.name.clone()))
        }
    }

    fn mismatch(&self, actual: ValueType) -> Error {
        Error::ValueTypeMismatch {
            field: self.template.name.clone(),
            expected: self.template.value_type,
            actual,
        }
    }
}

fn array_element(template: &TemplateField) -> Result<&Arc<TemplateField>> {
    template.element().ok_or_else(|| Error::InvalidValueType {
        field: template.name.clone(),
        kind: template.value_type,
    })
}

/// A fully decoded object
#[derive(Debug, Clone, PartialEq)]
pub struct AssetInstance {
    base: ValueField,
}

impl AssetInstance {
    /// Decode an object whose data starts at the reader's position
    pub fn new<R: Read + Seek>(
        template: impl Into<Arc<TemplateField>>,
        reader: &mut EndianReader<R>,
    ) -> Result<Self> {
        let template = template.into();
        Ok(AssetInstance {
            base: ValueField::read(&template, reader)?,
        })
    }

    /// Decode an object from its raw bytes
    pub fn from_bytes(
        template: impl Into<Arc<TemplateField>>,
        data: &[u8],
        big_endian: bool,
    ) -> Result<Self> {
        let mut reader = EndianReader::new(Cursor::new(data), big_endian);
        AssetInstance::new(template, &mut reader)
    }

    /// Wrap an existing value tree
    pub fn from_base_field(base: ValueField) -> Self {
        AssetInstance { base }
    }

    pub fn base_field(&self) -> &ValueField {
        &self.base
    }

    pub fn base_field_mut(&mut self) -> &mut ValueField {
        &mut self.base
    }

    pub fn into_base_field(self) -> ValueField {
        self.base
    }

    pub fn write<W: Write + Seek>(&self, writer: &mut EndianWriter<W>) -> Result<()> {
        self.base.write(writer)
    }

    /// Encode the object into a new buffer
    pub fn to_bytes(&self, big_endian: bool) -> Result<Vec<u8>> {
        let mut writer = EndianWriter::new(Cursor::new(Vec::new()), big_endian);
        self.write(&mut writer)?;
        Ok(writer.into_inner().into_inner())
    }
}
