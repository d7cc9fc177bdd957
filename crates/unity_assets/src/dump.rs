//! Text and JSON dumps of value trees
//!
//! A text dump has one line per field:
//!
//! ```text
//! 0 GameObject Base
//!  0 unsigned int m_Layer = 8
//!  1 string m_Name = "Cube"
//!  0 vector m_Component
//!   1 Array Array (1 item)
//!    0 int size = 1
//!    [0]
//!     0 ComponentPair data
//! ```
//!
//! Each line starts with one space per level of depth, the alignment flag of the
//! field, its type and its name. Scalars and strings carry their value after `=`.
//! Strings are quoted and escape `\`, carriage returns and line feeds.
//!
//! JSON dumps nest objects keyed by `"<align> <type> <name>"`, arrays of elements
//! become arrays of single property objects and byte arrays become arrays of numbers.
//!
//! Importing either format needs no template: the alignment flags and type names in
//! the dump are enough to encode the object again.

use std::fmt::{self, Display};
use std::io::{BufRead, Cursor, Write};

use miette::Diagnostic;
use serde_json::{Map, Number};
use thiserror::Error;
use tracing::debug;

use crate::endian::EndianWriter;
use crate::error::Result;
use crate::template::ValueType;
use crate::value::{Value, ValueField};

/// Every field of a dump that could not be encoded
#[derive(Error, Diagnostic, Debug)]
#[error("{} field(s) of the dump could not be imported", .errors.len())]
#[diagnostic(help("fix the listed fields and import the dump again"))]
pub struct ImportError {
    #[related]
    pub errors: Vec<ImportFieldError>,
}

/// One field of a dump that could not be encoded
#[derive(Error, Diagnostic, Debug, Clone, PartialEq)]
#[error("{location}: {message}")]
pub struct ImportFieldError {
    /// Line number of a text dump or property path of a JSON dump
    pub location: String,
    pub message: String,
}

/// Escape a string for a text dump
///
/// ```
/// assert_eq!(unity_assets::dump::escape("a\\b\r\n"), "a\\\\b\\r\\n");
/// ```
pub fn escape(value: &str) -> String {
    let mut escaped = String::with_capacity(value.len());
    for c in value.chars() {
        match c {
            '\\' => escaped.push_str("\\\\"),
            '\r' => escaped.push_str("\\r"),
            '\n' => escaped.push_str("\\n"),
            c => escaped.push(c),
        }
    }
    escaped
}

/// Reverse of [`escape`]
///
/// Unknown escapes keep the escaped character and a trailing backslash is dropped.
pub fn unescape(value: &str) -> String {
    let mut unescaped = String::with_capacity(value.len());
    let mut chars = value.chars();
    while let Some(c) = chars.next() {
        if c != '\\' {
            unescaped.push(c);
            continue;
        }
        match chars.next() {
            Some('r') => unescaped.push('\r'),
            Some('n') => unescaped.push('\n'),
            Some(other) => unescaped.push(other),
            None => {}
        }
    }
    unescaped
}

fn align_flag(field: &ValueField) -> char {
    // Strings always pad after their character data
    if field.template().align || field.template().value_type == ValueType::String {
        '1'
    } else {
        '0'
    }
}

fn dump_type_name(field: &ValueField) -> &str {
    field
        .template()
        .value_type
        .dump_type_name()
        .unwrap_or_else(|| field.type_name())
}

fn items(count: usize) -> &'static str {
    if count == 1 {
        "item"
    } else {
        "items"
    }
}

struct Indent(usize);

impl Display for Indent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:1$}", "", self.0)
    }
}

/// Text of a scalar value as it appears after `=`
fn scalar_text(value: &Value) -> Option<String> {
    Some(match value {
        Value::Bool(value) => value.to_string(),
        Value::Int8(value) => value.to_string(),
        Value::UInt8(value) => value.to_string(),
        Value::Int16(value) => value.to_string(),
        Value::UInt16(value) => value.to_string(),
        Value::Int32(value) => value.to_string(),
        Value::UInt32(value) => value.to_string(),
        Value::Int64(value) => value.to_string(),
        Value::UInt64(value) => value.to_string(),
        Value::Float(value) => value.to_string(),
        Value::Double(value) => value.to_string(),
        Value::String(bytes) => format!("\"{}\"", escape(&String::from_utf8_lossy(bytes))),
        Value::None | Value::Array | Value::ByteArray(_) => return None,
    })
}

struct TextExporter<'a, W> {
    writer: &'a mut W,
}

impl<W: Write> TextExporter<'_, W> {
    fn field(&mut self, field: &ValueField, depth: usize) -> Result<()> {
        let indent = Indent(depth);
        let align = align_flag(field);
        let type_name = dump_type_name(field);
        let name = field.name();

        match field.value() {
            Value::Array | Value::ByteArray(_) => {
                let count = field.len();
                writeln!(
                    self.writer,
                    "{indent}{align} {type_name} {name} ({count} {})",
                    items(count)
                )?;
                self.size_line(field, depth + 1, count)?;

                if let Value::ByteArray(bytes) = field.value() {
                    for (index, byte) in bytes.iter().enumerate() {
                        writeln!(self.writer, "{}[{index}]", Indent(depth + 1))?;
                        writeln!(self.writer, "{}0 UInt8 data = {byte}", Indent(depth + 2))?;
                    }
                } else {
                    for (index, child) in field.children().iter().enumerate() {
                        writeln!(self.writer, "{}[{index}]", Indent(depth + 1))?;
                        self.field(child, depth + 2)?;
                    }
                }
            }
            value => {
                match scalar_text(value) {
                    Some(text) => writeln!(self.writer, "{indent}{align} {type_name} {name} = {text}")?,
                    None => writeln!(self.writer, "{indent}{align} {type_name} {name}")?,
                }
                for child in field.children() {
                    self.field(child, depth + 1)?;
                }
            }
        }
        Ok(())
    }

    fn size_line(&mut self, field: &ValueField, depth: usize, count: usize) -> Result<()> {
        let (align, type_name, name) = match field.template().size_field() {
            Some(size) => (
                if size.align { '1' } else { '0' },
                size.type_name.as_str(),
                size.name.as_str(),
            ),
            None => ('0', "int", "size"),
        };
        writeln!(self.writer, "{}{align} {type_name} {name} = {count}", Indent(depth))?;
        Ok(())
    }
}

/// Write a text dump of a value tree
pub fn export_text<W: Write>(field: &ValueField, writer: &mut W) -> Result<()> {
    TextExporter { writer }.field(field, 0)
}

fn json_value(field: &ValueField) -> serde_json::Value {
    match field.value() {
        Value::None => {
            let mut object = Map::new();
            for child in field.children() {
                object.insert(json_key(child), json_value(child));
            }
            serde_json::Value::Object(object)
        }
        Value::Array => serde_json::Value::Array(
            field
                .children()
                .iter()
                .map(|child| {
                    let mut element = Map::new();
                    element.insert(json_key(child), json_value(child));
                    serde_json::Value::Object(element)
                })
                .collect(),
        ),
        Value::ByteArray(bytes) => serde_json::Value::Array(
            bytes.iter().map(|&byte| serde_json::Value::from(byte)).collect(),
        ),
        Value::Bool(value) => serde_json::Value::Bool(*value),
        Value::Float(value) => json_float(*value as f64, value.to_string()),
        Value::Double(value) => json_float(*value, value.to_string()),
        Value::UInt64(value) => serde_json::Value::from(*value),
        Value::String(bytes) => serde_json::Value::String(String::from_utf8_lossy(bytes).into_owned()),
        value => value
            .as_i64()
            .map(serde_json::Value::from)
            .unwrap_or(serde_json::Value::Null),
    }
}

/// Non-finite numbers have no JSON representation and are written as strings
fn json_float(value: f64, text: String) -> serde_json::Value {
    Number::from_f64(value)
        .map(serde_json::Value::Number)
        .unwrap_or(serde_json::Value::String(text))
}

fn json_key(field: &ValueField) -> String {
    format!("{} {} {}", align_flag(field), dump_type_name(field), field.name())
}

/// Write a JSON dump of a value tree
pub fn export_json<W: Write>(field: &ValueField, writer: &mut W) -> Result<()> {
    let mut root = Map::new();
    root.insert(json_key(field), json_value(field));
    serde_json::to_writer_pretty(&mut *writer, &serde_json::Value::Object(root))?;
    writeln!(writer)?;
    Ok(())
}

/// Encoding state shared by both importers
struct Importer {
    writer: EndianWriter<Cursor<Vec<u8>>>,
    errors: Vec<ImportFieldError>,
}

impl Importer {
    fn new(big_endian: bool) -> Self {
        Importer {
            writer: EndianWriter::new(Cursor::new(Vec::new()), big_endian),
            errors: Vec::new(),
        }
    }

    fn error(&mut self, location: impl Into<String>, message: impl Into<String>) {
        self.errors.push(ImportFieldError {
            location: location.into(),
            message: message.into(),
        });
    }

    /// Encode one scalar or string value from its dump text
    fn value(&mut self, location: &str, type_name: &str, text: &str) -> Result<()> {
        let value_type = ValueType::from_type_name(type_name);
        match parse_value(value_type, text) {
            Some(value) => self.write_value(&value),
            None => {
                self.error(
                    location,
                    format!("cannot write the value {text:?} as type {type_name:?}"),
                );
                Ok(())
            }
        }
    }

    fn write_value(&mut self, value: &Value) -> Result<()> {
        let writer = &mut self.writer;
        match value {
            Value::Bool(value) => writer.write_bool(*value),
            Value::Int8(value) => writer.write_i8(*value),
            Value::UInt8(value) => writer.write_u8(*value),
            Value::Int16(value) => writer.write_i16(*value),
            Value::UInt16(value) => writer.write_u16(*value),
            Value::Int32(value) => writer.write_i32(*value),
            Value::UInt32(value) => writer.write_u32(*value),
            Value::Int64(value) => writer.write_i64(*value),
            Value::UInt64(value) => writer.write_u64(*value),
            Value::Float(value) => writer.write_f32(*value),
            Value::Double(value) => writer.write_f64(*value),
            Value::String(bytes) => writer.write_count_bytes_i32(bytes),
            Value::ByteArray(bytes) => writer.write_count_bytes_i32(bytes),
            Value::None | Value::Array => Ok(()),
        }
    }

    fn align(&mut self, align: bool) -> Result<()> {
        if align {
            self.writer.align4()?;
        }
        Ok(())
    }

    fn finish(self) -> Result<Vec<u8>> {
        if !self.errors.is_empty() {
            return Err(ImportError {
                errors: self.errors,
            }
            .into());
        }
        Ok(self.writer.into_inner().into_inner())
    }
}

fn parse_bool(text: &str) -> Option<bool> {
    if text.eq_ignore_ascii_case("true") || text == "1" {
        Some(true)
    } else if text.eq_ignore_ascii_case("false") || text == "0" {
        Some(false)
    } else {
        None
    }
}

fn parse_value(value_type: ValueType, text: &str) -> Option<Value> {
    let text = text.trim();
    Some(match value_type {
        ValueType::Bool => Value::Bool(parse_bool(text)?),
        ValueType::Int8 => Value::Int8(text.parse().ok()?),
        ValueType::UInt8 => Value::UInt8(text.parse().ok()?),
        ValueType::Int16 => Value::Int16(text.parse().ok()?),
        ValueType::UInt16 => Value::UInt16(text.parse().ok()?),
        ValueType::Int32 => Value::Int32(text.parse().ok()?),
        ValueType::UInt32 => Value::UInt32(text.parse().ok()?),
        ValueType::Int64 => Value::Int64(text.parse().ok()?),
        ValueType::UInt64 => Value::UInt64(text.parse().ok()?),
        ValueType::Float => Value::Float(text.parse().ok()?),
        ValueType::Double => Value::Double(text.parse().ok()?),
        ValueType::String => Value::String(unquote(text).into_bytes()),
        ValueType::None | ValueType::Array | ValueType::ByteArray => return None,
    })
}

/// Take the text between the first and last quote and unescape it
fn unquote(text: &str) -> String {
    match (text.find('"'), text.rfind('"')) {
        (Some(first), Some(last)) if first < last => unescape(&text[first + 1..last]),
        _ => unescape(text),
    }
}

/// Split `<type> <name>` where the type may be `unsigned <width>`
fn split_type(rest: &str) -> (&str, &str) {
    let rest = rest.trim_start();
    let mut end = rest.find(' ').unwrap_or(rest.len());
    if &rest[..end] == "unsigned" && end < rest.len() {
        let tail = &rest[end + 1..];
        end += 1 + tail.find(' ').unwrap_or(tail.len());
    }
    let (type_name, name) = rest.split_at(end);
    (type_name, name.trim())
}

/// Encode a text dump back into object bytes
///
/// The alignment of composite fields is applied once the dump returns to a
/// shallower depth, or at the end of the dump.
///
/// ```
/// # fn doit() -> unity_assets::error::Result<()> {
/// let dump = "0 Base Base\n 1 string m_Name = \"a\"\n 0 int m_Value = 2\n";
/// let bytes = unity_assets::dump::import_text(dump.as_bytes(), false)?;
/// assert_eq!(bytes, [1, 0, 0, 0, b'a', 0, 0, 0, 2, 0, 0, 0]);
/// # Ok(())
/// # }
/// # doit().unwrap();
/// ```
pub fn import_text<R: BufRead>(reader: R, big_endian: bool) -> Result<Vec<u8>> {
    let mut importer = Importer::new(big_endian);
    let mut aligns: Vec<bool> = Vec::new();

    for (index, line) in reader.lines().enumerate() {
        let line = line?;
        let location = format!("line {}", index + 1);
        let content = line.trim_start_matches(' ');
        if content.trim().is_empty() {
            continue;
        }
        let depth = line.len() - content.len();

        while depth < aligns.len() {
            if let Some(align) = aligns.pop() {
                importer.align(align)?;
            }
        }

        // Index lines open a level of their own so that each element's padding
        // is applied before the next element starts
        if content.starts_with('[') {
            aligns.push(false);
            continue;
        }

        let align = match content.get(..2) {
            Some("1 ") => true,
            Some("0 ") => false,
            _ => {
                importer.error(&location, format!("line {content:?} has no alignment flag"));
                continue;
            }
        };
        let (type_name, rest) = split_type(&content[2..]);

        match rest.split_once('=') {
            Some((_, text)) => {
                importer.value(&location, type_name, text)?;
                importer.align(align)?;
            }
            None => aligns.push(align),
        }
    }

    while let Some(align) = aligns.pop() {
        importer.align(align)?;
    }

    debug!(errors = importer.errors.len(), "imported text dump");
    importer.finish()
}

fn import_json_property(
    importer: &mut Importer,
    key: &str,
    value: &serde_json::Value,
    path: &str,
) -> Result<()> {
    let Some((align, rest)) = key.split_once(' ') else {
        importer.error(path, format!("property {key:?} has no alignment flag"));
        return Ok(());
    };
    let align = align == "1";
    let (type_name, name) = split_type(rest);
    let path = format!("{path}/{name}");

    match value {
        serde_json::Value::Object(object) => {
            for (key, value) in object {
                import_json_property(importer, key, value, &path)?;
            }
        }
        serde_json::Value::Array(elements) => {
            importer.writer.write_i32(elements.len() as i32)?;
            for (index, element) in elements.iter().enumerate() {
                let element_path = format!("{path}[{index}]");
                match element {
                    serde_json::Value::Number(_) => {
                        importer.value(&element_path, "UInt8", &element.to_string())?
                    }
                    serde_json::Value::Object(object) => {
                        for (key, value) in object {
                            import_json_property(importer, key, value, &element_path)?;
                        }
                    }
                    _ => importer.error(element_path, "array elements must be objects or bytes"),
                }
            }
        }
        serde_json::Value::String(text) => {
            if ValueType::from_type_name(type_name) == ValueType::String {
                importer.write_value(&Value::String(text.clone().into_bytes()))?;
            } else {
                importer.value(&path, type_name, text)?;
            }
        }
        serde_json::Value::Bool(_) | serde_json::Value::Number(_) => {
            importer.value(&path, type_name, &value.to_string())?;
        }
        serde_json::Value::Null => importer.error(path, "null is not a value"),
    }
    importer.align(align)
}

/// Encode a JSON dump back into object bytes
pub fn import_json<R: BufRead>(reader: R, big_endian: bool) -> Result<Vec<u8>> {
    let document: serde_json::Value = serde_json::from_reader(reader)?;
    let mut importer = Importer::new(big_endian);

    match document.as_object().and_then(|root| root.iter().next()) {
        Some((key, value)) => import_json_property(&mut importer, key, value, "")?,
        None => importer.error("/", "the dump has no root field"),
    }

    debug!(errors = importer.errors.len(), "imported json dump");
    importer.finish()
}
