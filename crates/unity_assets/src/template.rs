//! Type tree templates
//!
//! A [`TemplateField`] describes how one field of a serialized object is laid out:
//! its name, its declared type, the primitive [`ValueType`] it decodes to, whether
//! it is an array and whether the stream is aligned to 4 bytes after it. Templates
//! are immutable once built and shared between value trees through [`Arc`].

use std::collections::HashMap;
use std::sync::Arc;

use tracing::warn;

use crate::error::{Error, Result};
use crate::strings;
use crate::types::{SerializedType, TypeTreeNode};

/// Type flag marking a node as an array
pub const TYPE_FLAG_ARRAY: u8 = 0x01;

/// Meta flag requesting 4 byte alignment after the node
pub const META_FLAG_ALIGN: u32 = 0x4000;

/// Primitive kind a template decodes to
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash)]
#[repr(u8)]
pub enum ValueType {
    /// Composite node without a value of its own
    #[default]
    None = 0,
    Bool = 1,
    Int8 = 2,
    UInt8 = 3,
    Int16 = 4,
    UInt16 = 5,
    Int32 = 6,
    UInt32 = 7,
    Int64 = 8,
    UInt64 = 9,
    Float = 10,
    Double = 11,
    String = 12,
    Array = 13,
    ByteArray = 14,
}

impl ValueType {
    /// Map a declared type name onto its primitive kind
    ///
    /// Matching is case insensitive. Names without a primitive mapping, such as
    /// `Vector3f` or `PPtr<GameObject>`, are composites and map to [`ValueType::None`].
    pub fn from_type_name(type_name: &str) -> ValueType {
        match type_name.to_ascii_lowercase().as_str() {
            "string" => ValueType::String,
            "sint8" | "sbyte" => ValueType::Int8,
            "uint8" | "char" | "byte" => ValueType::UInt8,
            "sint16" | "short" => ValueType::Int16,
            "uint16" | "unsigned short" | "ushort" => ValueType::UInt16,
            "sint32" | "int" | "type*" => ValueType::Int32,
            "uint32" | "unsigned int" | "uint" => ValueType::UInt32,
            "sint64" | "long" => ValueType::Int64,
            "uint64" | "unsigned long" | "ulong" | "filesize" => ValueType::UInt64,
            "single" | "float" => ValueType::Float,
            "double" => ValueType::Double,
            "bool" => ValueType::Bool,
            _ => ValueType::None,
        }
    }

    /// Canonical type name used when dumping a value of this kind
    pub const fn dump_type_name(self) -> Option<&'static str> {
        Some(match self {
            ValueType::Bool => "bool",
            ValueType::UInt8 => "UInt8",
            ValueType::Int8 => "SInt8",
            ValueType::UInt16 => "UInt16",
            ValueType::Int16 => "SInt16",
            ValueType::UInt32 => "unsigned int",
            ValueType::Int32 => "int",
            ValueType::UInt64 => "UInt64",
            ValueType::Int64 => "SInt64",
            ValueType::Float => "float",
            ValueType::Double => "double",
            ValueType::String => "string",
            ValueType::None | ValueType::Array | ValueType::ByteArray => return None,
        })
    }

    /// Encoded width in bytes of a scalar kind
    pub const fn size(self) -> Option<usize> {
        Some(match self {
            ValueType::Bool | ValueType::Int8 | ValueType::UInt8 => 1,
            ValueType::Int16 | ValueType::UInt16 => 2,
            ValueType::Int32 | ValueType::UInt32 | ValueType::Float => 4,
            ValueType::Int64 | ValueType::UInt64 | ValueType::Double => 8,
            _ => return None,
        })
    }

    /// Whether the kind carries a fixed width scalar
    pub const fn is_scalar(self) -> bool {
        self.size().is_some()
    }
}

/// Schema node for one field of a serialized object
#[derive(Debug, Clone, PartialEq)]
pub struct TemplateField {
    pub name: String,
    pub type_name: String,
    pub value_type: ValueType,
    pub is_array: bool,
    pub align: bool,
    children: Vec<Arc<TemplateField>>,
}

impl TemplateField {
    /// A non-array field whose kind is derived from `type_name`
    pub fn new(
        name: impl Into<String>,
        type_name: impl Into<String>,
        children: Vec<TemplateField>,
    ) -> Self {
        TemplateField::from_parts(name, type_name, false, false, children)
    }

    /// A leaf field of a primitive type
    pub fn scalar(name: impl Into<String>, type_name: impl Into<String>, align: bool) -> Self {
        TemplateField::from_parts(name, type_name, false, align, Vec::new())
    }

    /// The engine's `string` layout, a count prefixed char array followed by a pad
    pub fn string(name: impl Into<String>) -> Self {
        TemplateField::new(
            name,
            "string",
            vec![TemplateField::array(
                "Array",
                "Array",
                TemplateField::scalar("data", "char", false),
            )
            .with_align(true)],
        )
    }

    /// An array node with the engine's `size` and `data` children
    ///
    /// An element of type `UInt8` (or an alias such as `char`) without children
    /// makes this a byte array that decodes as one raw block.
    pub fn array(
        name: impl Into<String>,
        type_name: impl Into<String>,
        element: TemplateField,
    ) -> Self {
        let element = TemplateField {
            name: "data".to_string(),
            ..element
        };
        TemplateField::from_parts(
            name,
            type_name,
            true,
            false,
            vec![TemplateField::scalar("size", "int", false), element],
        )
    }

    /// A `vector` wrapper around an `Array` node, the layout of lists in the engine
    pub fn vector(name: impl Into<String>, element: TemplateField) -> Self {
        TemplateField::new(
            name,
            "vector",
            vec![TemplateField::array("Array", "Array", element).with_align(true)],
        )
    }

    /// Build a field from its raw parts, deriving the value kind
    pub fn from_parts(
        name: impl Into<String>,
        type_name: impl Into<String>,
        is_array: bool,
        align: bool,
        children: Vec<TemplateField>,
    ) -> Self {
        let type_name = type_name.into();
        let children: Vec<_> = children.into_iter().map(Arc::new).collect();

        let value_type = if is_array {
            match children.get(1) {
                Some(element)
                    if element.value_type == ValueType::UInt8 && element.children.is_empty() =>
                {
                    ValueType::ByteArray
                }
                _ => ValueType::Array,
            }
        } else {
            ValueType::from_type_name(&type_name)
        };

        TemplateField {
            name: name.into(),
            type_name,
            value_type,
            is_array,
            align,
            children,
        }
    }

    /// Return this field with its alignment flag replaced
    pub fn with_align(mut self, align: bool) -> Self {
        self.align = align;
        self
    }

    /// Build the template tree of a type table entry
    ///
    /// Nodes are stored flattened in depth-first order with an explicit level; a
    /// node's children are the following nodes one level deeper.
    pub fn from_type_tree(serialized_type: &SerializedType) -> Result<Self> {
        let tree = serialized_type
            .type_tree
            .as_ref()
            .ok_or(Error::MissingTypeInfo {
                class_id: serialized_type.class_id,
                script_index: serialized_type.script_type_index as u16,
            })?;

        if tree.nodes.is_empty() {
            return Err(Error::InvalidTypeTree("type tree has no nodes".to_string()));
        }

        let mut index = 0;
        let root = build_node(&tree.nodes, &tree.string_buffer, &mut index)?;
        if index != tree.nodes.len() {
            return Err(Error::InvalidTypeTree(format!(
                "{} nodes follow the root field",
                tree.nodes.len() - index
            )));
        }
        Ok(root)
    }

    /// Child templates in declaration order
    pub fn children(&self) -> &[Arc<TemplateField>] {
        &self.children
    }

    /// Look up a direct child by field name
    pub fn child(&self, name: &str) -> Option<&Arc<TemplateField>> {
        self.children.iter().find(|child| child.name == name)
    }

    /// The element template of an array node
    pub fn element(&self) -> Option<&Arc<TemplateField>> {
        if self.is_array {
            self.children.get(1)
        } else {
            None
        }
    }

    /// The `size` template of an array node
    pub fn size_field(&self) -> Option<&Arc<TemplateField>> {
        if self.is_array {
            self.children.first()
        } else {
            None
        }
    }
}

fn build_node(nodes: &[TypeTreeNode], strings: &[u8], index: &mut usize) -> Result<TemplateField> {
    let node = &nodes[*index];
    *index += 1;

    let mut children = Vec::new();
    while let Some(next) = nodes.get(*index) {
        if next.level <= node.level {
            break;
        }
        if next.level != node.level + 1 {
            return Err(Error::InvalidTypeTree(format!(
                "node at level {} skips a level below level {}",
                next.level, node.level
            )));
        }
        children.push(build_node(nodes, strings, index)?);
    }

    let name = node_string(node.name_str_offset, strings);
    let type_name = node_string(node.type_str_offset, strings);
    let is_array = node.type_flags & TYPE_FLAG_ARRAY != 0;
    if is_array && children.len() != 2 {
        return Err(Error::InvalidTypeTree(format!(
            "array {name} has {} children instead of 2",
            children.len()
        )));
    }

    Ok(TemplateField::from_parts(
        name,
        type_name,
        is_array,
        node.meta_flags & META_FLAG_ALIGN != 0,
        children,
    ))
}

fn node_string(offset: u32, strings: &[u8]) -> String {
    strings::resolve(offset, strings).unwrap_or_else(|| {
        warn!(offset, "type tree string offset does not resolve");
        String::new()
    })
}

/// Source of templates for files that do not embed their type trees
pub trait ClassDatabase {
    /// Template of the class with the given numeric id
    fn template(&self, class_id: i32) -> Option<TemplateField>;
}

impl ClassDatabase for HashMap<i32, TemplateField> {
    fn template(&self, class_id: i32) -> Option<TemplateField> {
        self.get(&class_id).cloned()
    }
}

#[cfg(test)]
mod test {
    use super::{TemplateField, ValueType, META_FLAG_ALIGN};
    use crate::error::{Error, Result};
    use crate::strings::{common_string_offset, COMMON_STRING_FLAG};
    use crate::types::{SerializedType, TypeTree, TypeTreeNode};

    fn node(level: u8, type_name: &str, name: &str, flags: u8, meta: u32) -> TypeTreeNode {
        TypeTreeNode {
            level,
            type_flags: flags,
            type_str_offset: common_string_offset(type_name).unwrap() | COMMON_STRING_FLAG,
            name_str_offset: common_string_offset(name).unwrap() | COMMON_STRING_FLAG,
            meta_flags: meta,
            ..Default::default()
        }
    }

    #[test]
    fn type_names_map_case_insensitively() {
        assert_eq!(ValueType::from_type_name("SInt32"), ValueType::Int32);
        assert_eq!(ValueType::from_type_name("unsigned short"), ValueType::UInt16);
        assert_eq!(ValueType::from_type_name("FileSize"), ValueType::UInt64);
        assert_eq!(ValueType::from_type_name("Type*"), ValueType::Int32);
        assert_eq!(ValueType::from_type_name("Vector3f"), ValueType::None);
        assert_eq!(ValueType::Int32.dump_type_name(), Some("int"));
        assert_eq!(ValueType::Array.dump_type_name(), None);
    }

    #[test]
    fn byte_arrays_are_detected() {
        let bytes = TemplateField::array("Array", "Array", TemplateField::scalar("x", "UInt8", false));
        assert_eq!(bytes.value_type, ValueType::ByteArray);
        assert_eq!(bytes.element().unwrap().name, "data");

        let ints = TemplateField::array("Array", "Array", TemplateField::scalar("x", "int", false));
        assert_eq!(ints.value_type, ValueType::Array);
    }

    #[test]
    fn builds_tree_from_flat_nodes() -> Result<()> {
        let serialized_type = SerializedType {
            class_id: 1,
            type_tree: Some(TypeTree {
                nodes: vec![
                    node(0, "GameObject", "Base", 0, 0),
                    node(1, "string", "m_Name", 0, META_FLAG_ALIGN),
                    node(2, "Array", "Array", 1, META_FLAG_ALIGN),
                    node(3, "int", "size", 0, 0),
                    node(3, "char", "data", 0, 0),
                    node(1, "bool", "m_IsStatic", 0, META_FLAG_ALIGN),
                ],
                string_buffer: Vec::new(),
            }),
            ..Default::default()
        };

        let root = TemplateField::from_type_tree(&serialized_type)?;
        assert_eq!(root.type_name, "GameObject");
        assert_eq!(root.children().len(), 2);

        let name = root.child("m_Name").unwrap();
        assert_eq!(name.value_type, ValueType::String);
        assert!(name.align);
        assert_eq!(name.children()[0].value_type, ValueType::ByteArray);

        let is_static = root.child("m_IsStatic").unwrap();
        assert_eq!(is_static.value_type, ValueType::Bool);
        assert!(root.child("m_Missing").is_none());
        Ok(())
    }

    #[test]
    fn rejects_skipped_levels() {
        let serialized_type = SerializedType {
            type_tree: Some(TypeTree {
                nodes: vec![node(0, "Object", "Base", 0, 0), node(2, "int", "size", 0, 0)],
                string_buffer: Vec::new(),
            }),
            ..Default::default()
        };
        assert!(matches!(
            TemplateField::from_type_tree(&serialized_type),
            Err(Error::InvalidTypeTree(_))
        ));
    }

    #[test]
    fn missing_tree_is_reported() {
        let serialized_type = SerializedType {
            class_id: 28,
            ..Default::default()
        };
        assert!(matches!(
            TemplateField::from_type_tree(&serialized_type),
            Err(Error::MissingTypeInfo { class_id: 28, .. })
        ));
    }
}
