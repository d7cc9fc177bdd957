//! The engine's shared type tree string table
//!
//! Type tree nodes reference their type and field names by offset. When the high bit
//! of an offset is set the remaining bits index into this table instead of the
//! string buffer stored alongside the nodes.

/// Bit set on string offsets that point into [`COMMON_STRINGS`]
pub const COMMON_STRING_FLAG: u32 = 0x8000_0000;

/// Table entries in order, the table is their zero-joined concatenation
pub const COMMON_STRINGS: &[&str] = &[
    "AABB",
    "AnimationClip",
    "AnimationCurve",
    "AnimationState",
    "Array",
    "Base",
    "BitField",
    "bitset",
    "bool",
    "char",
    "ColorRGBA",
    "Component",
    "data",
    "deque",
    "double",
    "dynamic_array",
    "FastPropertyName",
    "first",
    "float",
    "Font",
    "GameObject",
    "Generic Mono",
    "GradientNEW",
    "GUID",
    "GUIStyle",
    "int",
    "list",
    "long long",
    "map",
    "Matrix4x4f",
    "MdFour",
    "MonoBehaviour",
    "MonoScript",
    "m_ByteSize",
    "m_Curve",
    "m_EditorClassIdentifier",
    "m_EditorHideFlags",
    "m_Enabled",
    "m_ExtensionPtr",
    "m_GameObject",
    "m_Index",
    "m_IsArray",
    "m_IsStatic",
    "m_MetaFlag",
    "m_Name",
    "m_ObjectHideFlags",
    "m_PrefabInternal",
    "m_PrefabParentObject",
    "m_Script",
    "m_StaticEditorFlags",
    "m_Type",
    "m_Version",
    "Object",
    "pair",
    "PPtr<Component>",
    "PPtr<GameObject>",
    "PPtr<Material>",
    "PPtr<MonoBehaviour>",
    "PPtr<MonoScript>",
    "PPtr<Object>",
    "PPtr<Prefab>",
    "PPtr<Sprite>",
    "PPtr<TextAsset>",
    "PPtr<Texture>",
    "PPtr<Texture2D>",
    "PPtr<Transform>",
    "Prefab",
    "Quaternionf",
    "Rectf",
    "RectInt",
    "RectOffset",
    "second",
    "set",
    "short",
    "size",
    "SInt16",
    "SInt32",
    "SInt64",
    "SInt8",
    "staticvector",
    "string",
    "TextAsset",
    "TextMesh",
    "Texture",
    "Texture2D",
    "Transform",
    "TypelessData",
    "UInt16",
    "UInt32",
    "UInt64",
    "UInt8",
    "unsigned int",
    "unsigned long long",
    "unsigned short",
    "vector",
    "Vector2f",
    "Vector3f",
    "Vector4f",
    "m_ScriptingClassIdentifier",
    "Gradient",
    "Type*",
    "int2_storage",
    "int3_storage",
    "BoundsInt",
    "m_CorrespondingSourceObject",
    "m_PrefabInstance",
    "m_PrefabAsset",
    "FileSize",
    "Hash128",
    "RenderingLayerMask",
];

/// Look up a common string by its table offset, without the flag bit
pub fn common_string(offset: u32) -> Option<&'static str> {
    let mut position = 0u32;
    for entry in COMMON_STRINGS {
        if position == offset {
            return Some(entry);
        }
        if position > offset {
            return None;
        }
        position += entry.len() as u32 + 1;
    }
    None
}

/// Offset of a common string within the table, without the flag bit
pub fn common_string_offset(value: &str) -> Option<u32> {
    let mut position = 0u32;
    for entry in COMMON_STRINGS {
        if *entry == value {
            return Some(position);
        }
        position += entry.len() as u32 + 1;
    }
    None
}

/// Resolve a node string offset against a local string buffer
///
/// Offsets with [`COMMON_STRING_FLAG`] set resolve through the common table, any
/// other offset reads a zero terminated string from `local`.
pub fn resolve(offset: u32, local: &[u8]) -> Option<String> {
    if offset & COMMON_STRING_FLAG != 0 {
        return common_string(offset & !COMMON_STRING_FLAG).map(str::to_string);
    }

    let start = offset as usize;
    let tail = local.get(start..)?;
    let end = tail.iter().position(|&b| b == 0).unwrap_or(tail.len());
    Some(String::from_utf8_lossy(&tail[..end]).into_owned())
}

#[cfg(test)]
mod test {
    use super::{common_string, common_string_offset, resolve, COMMON_STRING_FLAG};

    #[test]
    fn offsets_follow_joined_table() {
        assert_eq!(common_string(0), Some("AABB"));
        assert_eq!(common_string(5), Some("AnimationClip"));
        assert_eq!(common_string(3), None);
        assert_eq!(common_string_offset("AnimationClip"), Some(5));
        assert_eq!(common_string_offset("not a common string"), None);

        let offset = common_string_offset("m_Name").unwrap();
        assert_eq!(common_string(offset), Some("m_Name"));
    }

    #[test]
    fn resolve_prefers_flagged_table() {
        let local = b"custom\0other\0";
        assert_eq!(resolve(0, local).as_deref(), Some("custom"));
        assert_eq!(resolve(7, local).as_deref(), Some("other"));
        assert_eq!(resolve(COMMON_STRING_FLAG, local).as_deref(), Some("AABB"));
        assert_eq!(resolve(100, local), None);
    }
}
