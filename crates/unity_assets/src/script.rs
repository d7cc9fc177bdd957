//! Templates for scripted objects that ship without a type tree
//!
//! A `MonoBehaviour` only stores the fields of its engine base class in the class
//! database; the script's own fields have to be derived from the managed assembly.
//! Reading assemblies is left to a [`ScriptReflector`] implementation, this module
//! turns the reflected [`ScriptField`] list into templates following the engine's
//! serialization rules.

use crate::template::{TemplateField, ValueType};
use crate::version::UnityVersion;

/// Engine value types that serialize with a fixed layout
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EngineType {
    Color,
    Color32,
    Gradient,
    Vector2,
    Vector3,
    Vector4,
    LayerMask,
    Quaternion,
    Bounds,
    Rect,
    Matrix4x4,
    AnimationCurve,
    GUIStyle,
    Vector2Int,
    Vector3Int,
    BoundsInt,
}

impl EngineType {
    /// Match a full managed type name such as `UnityEngine.Color`
    pub fn from_full_name(full_name: &str) -> Option<Self> {
        let name = full_name.strip_prefix("UnityEngine.")?;
        Some(match name {
            "Color" => EngineType::Color,
            "Color32" => EngineType::Color32,
            "Gradient" => EngineType::Gradient,
            "Vector2" => EngineType::Vector2,
            "Vector3" => EngineType::Vector3,
            "Vector4" => EngineType::Vector4,
            "LayerMask" => EngineType::LayerMask,
            "Quaternion" => EngineType::Quaternion,
            "Bounds" => EngineType::Bounds,
            "Rect" => EngineType::Rect,
            "Matrix4x4" => EngineType::Matrix4x4,
            "AnimationCurve" => EngineType::AnimationCurve,
            "GUIStyle" => EngineType::GUIStyle,
            "Vector2Int" => EngineType::Vector2Int,
            "Vector3Int" => EngineType::Vector3Int,
            "BoundsInt" => EngineType::BoundsInt,
            _ => return None,
        })
    }

    /// Managed type name without its namespace
    pub const fn name(self) -> &'static str {
        match self {
            EngineType::Color => "Color",
            EngineType::Color32 => "Color32",
            EngineType::Gradient => "Gradient",
            EngineType::Vector2 => "Vector2",
            EngineType::Vector3 => "Vector3",
            EngineType::Vector4 => "Vector4",
            EngineType::LayerMask => "LayerMask",
            EngineType::Quaternion => "Quaternion",
            EngineType::Bounds => "Bounds",
            EngineType::Rect => "Rect",
            EngineType::Matrix4x4 => "Matrix4x4",
            EngineType::AnimationCurve => "AnimationCurve",
            EngineType::GUIStyle => "GUIStyle",
            EngineType::Vector2Int => "Vector2Int",
            EngineType::Vector3Int => "Vector3Int",
            EngineType::BoundsInt => "BoundsInt",
        }
    }
}

/// What a reflected field holds
#[derive(Debug, Clone, PartialEq)]
pub enum ScriptFieldKind {
    /// A `System` primitive by its short name, e.g. `Int32` or `Single`
    Primitive(String),
    /// An enum type, serialized as a 32 bit integer
    Enum(String),
    String,
    Engine(EngineType),
    /// A type deriving from `UnityEngine.Object`, serialized as a reference
    ObjectReference(String),
    /// A `[Serializable]` class or struct with its fields, base type fields first
    Serializable {
        type_name: String,
        fields: Vec<ScriptField>,
    },
    /// Any other type, never serialized
    Unsupported(String),
}

/// A field as reported by assembly reflection
#[derive(Debug, Clone, PartialEq)]
pub struct ScriptField {
    pub name: String,
    pub kind: ScriptFieldKind,
    /// Set for one dimensional arrays and `List<T>`, `kind` is then the element type
    pub is_array: bool,
    pub is_public: bool,
    /// Carries `[SerializeField]`
    pub has_serialize_field: bool,
    pub is_static: bool,
    /// Carries `[NonSerialized]`
    pub is_not_serialized: bool,
    /// `readonly`
    pub is_init_only: bool,
    /// `const`
    pub is_const: bool,
}

impl ScriptField {
    /// A public instance field
    pub fn new(name: impl Into<String>, kind: ScriptFieldKind) -> Self {
        ScriptField {
            name: name.into(),
            kind,
            is_array: false,
            is_public: true,
            has_serialize_field: false,
            is_static: false,
            is_not_serialized: false,
            is_init_only: false,
            is_const: false,
        }
    }

    /// The same field as an array of its kind
    pub fn into_array(mut self) -> Self {
        self.is_array = true;
        self
    }

    /// Whether the engine serializer writes this field
    pub fn is_serialized(&self) -> bool {
        let visible = self.is_public || self.has_serialize_field;
        let excluded = self.is_static || self.is_not_serialized || self.is_init_only || self.is_const;
        let supported = match &self.kind {
            ScriptFieldKind::Primitive(name) => primitive_type_name(name).is_some(),
            ScriptFieldKind::Unsupported(_) => false,
            _ => true,
        };
        visible && !excluded && supported
    }
}

/// Source of reflected script fields
pub trait ScriptReflector {
    /// Fields of the type `full_name` in `assembly`, in declaration order with
    /// inherited fields first, or `None` when the type cannot be found
    fn fields(&self, assembly: &str, full_name: &str) -> Option<Vec<ScriptField>>;
}

/// Templates for the serialized subset of `fields`
pub fn script_templates(fields: &[ScriptField], version: &UnityVersion) -> Vec<TemplateField> {
    fields
        .iter()
        .filter(|field| field.is_serialized())
        .map(|field| field_template(field, version))
        .collect()
}

/// Extend a base class template, usually `MonoBehaviour`, with a script's fields
pub fn extend_template(
    base: &TemplateField,
    fields: &[ScriptField],
    version: &UnityVersion,
) -> TemplateField {
    let children = base
        .children()
        .iter()
        .map(|child| child.as_ref().clone())
        .chain(script_templates(fields, version))
        .collect();
    TemplateField::from_parts(
        base.name.clone(),
        base.type_name.clone(),
        base.is_array,
        base.align,
        children,
    )
}

fn field_template(field: &ScriptField, version: &UnityVersion) -> TemplateField {
    let name = field.name.as_str();
    let template = match &field.kind {
        ScriptFieldKind::Primitive(type_name) => {
            let type_name = primitive_type_name(type_name).unwrap_or(type_name);
            let template = TemplateField::scalar(name, type_name, false);
            let align = aligns(template.value_type);
            template.with_align(align)
        }
        ScriptFieldKind::Enum(type_name) => {
            let mut template = TemplateField::scalar(name, type_name.as_str(), false);
            template.value_type = ValueType::Int32;
            template
        }
        ScriptFieldKind::String => TemplateField::string(name),
        ScriptFieldKind::Engine(engine) => engine_template(name, *engine, version),
        ScriptFieldKind::ObjectReference(type_name) => {
            pptr(name, &format!("PPtr<${type_name}>"), version.major >= 5)
        }
        ScriptFieldKind::Serializable { type_name, fields } => TemplateField::new(
            name,
            type_name.as_str(),
            script_templates(fields, version),
        ),
        ScriptFieldKind::Unsupported(type_name) => TemplateField::new(name, type_name.as_str(), Vec::new()),
    };

    if field.is_array {
        // Elements never align on their own, the array node aligns once after them
        TemplateField::array(name, "Array", template.with_align(false)).with_align(true)
    } else {
        template
    }
}

fn primitive_type_name(name: &str) -> Option<&'static str> {
    Some(match name {
        "Boolean" => "bool",
        "Int64" => "long",
        "Int16" => "short",
        "UInt64" => "ulong",
        "UInt32" => "uint",
        "UInt16" => "ushort",
        "Char" => "char",
        "Byte" => "byte",
        "SByte" => "sbyte",
        "Double" => "double",
        "Single" => "float",
        "Int32" => "int",
        _ => return None,
    })
}

const fn aligns(value_type: ValueType) -> bool {
    matches!(
        value_type,
        ValueType::Bool | ValueType::Int8 | ValueType::UInt8 | ValueType::Int16 | ValueType::UInt16
    )
}

fn float(name: &str) -> TemplateField {
    TemplateField::scalar(name, "float", false)
}

fn int(name: &str) -> TemplateField {
    TemplateField::scalar(name, "int", false)
}

fn floats(names: &[&str]) -> Vec<TemplateField> {
    names.iter().map(|name| float(name)).collect()
}

fn ints(names: &[&str]) -> Vec<TemplateField> {
    names.iter().map(|name| int(name)).collect()
}

fn pptr(name: &str, type_name: &str, wide_path_id: bool) -> TemplateField {
    let path_id = if wide_path_id {
        TemplateField::scalar("m_PathID", "SInt64", false)
    } else {
        int("m_PathID")
    };
    TemplateField::new(name, type_name, vec![int("m_FileID"), path_id])
}

fn color_rgba(name: &str) -> TemplateField {
    TemplateField::new(name, "ColorRGBA", floats(&["r", "g", "b", "a"]))
}

fn engine_template(name: &str, engine: EngineType, version: &UnityVersion) -> TemplateField {
    let type_name = engine.name();
    match engine {
        EngineType::Color => TemplateField::new(name, type_name, floats(&["r", "g", "b", "a"])),
        EngineType::Color32 => TemplateField::new(
            name,
            type_name,
            vec![TemplateField::scalar("rgba", "unsigned int", false)],
        ),
        EngineType::Vector2 => TemplateField::new(name, type_name, floats(&["x", "y"])),
        EngineType::Vector3 => TemplateField::new(name, type_name, floats(&["x", "y", "z"])),
        EngineType::Vector4 | EngineType::Quaternion => {
            TemplateField::new(name, type_name, floats(&["x", "y", "z", "w"]))
        }
        EngineType::Matrix4x4 => {
            let names: Vec<String> = (0..4)
                .flat_map(|column| (0..4).map(move |row| format!("e{row}{column}")))
                .collect();
            TemplateField::new(name, type_name, names.iter().map(|name| float(name)).collect())
        }
        EngineType::Rect => TemplateField::new(name, type_name, floats(&["x", "y", "width", "height"])),
        EngineType::LayerMask => TemplateField::new(
            name,
            type_name,
            vec![TemplateField::scalar("m_Bits", "unsigned int", false)],
        ),
        EngineType::Bounds => TemplateField::new(
            name,
            type_name,
            vec![
                TemplateField::new("m_Center", "Vector3f", floats(&["x", "y", "z"])),
                TemplateField::new("m_Extent", "Vector3f", floats(&["x", "y", "z"])),
            ],
        ),
        EngineType::Vector2Int => TemplateField::new(name, type_name, ints(&["m_X", "m_Y"])),
        EngineType::Vector3Int => TemplateField::new(name, type_name, ints(&["m_X", "m_Y", "m_Z"])),
        EngineType::BoundsInt => TemplateField::new(
            name,
            type_name,
            vec![
                TemplateField::new("m_Center", "Vector3Int", ints(&["m_X", "m_Y", "m_Z"])),
                TemplateField::new("m_Extent", "Vector3Int", ints(&["m_X", "m_Y", "m_Z"])),
            ],
        ),
        EngineType::Gradient => gradient(name, version),
        EngineType::AnimationCurve => animation_curve(name, version),
        EngineType::GUIStyle => gui_style(name),
    }
}

fn gradient(name: &str, version: &UnityVersion) -> TemplateField {
    let float_keys = version.at_least(5, 6, 0);
    let mut children: Vec<TemplateField> = (0..8)
        .map(|index| {
            let key = format!("key{index}");
            if float_keys {
                color_rgba(&key)
            } else {
                TemplateField::new(
                    key,
                    "ColorRGBA",
                    vec![TemplateField::scalar("rgba", "unsigned int", false)],
                )
            }
        })
        .collect();

    for prefix in ["ctime", "atime"] {
        children.extend((0..8).map(|index| {
            TemplateField::scalar(format!("{prefix}{index}"), "UInt16", false)
        }));
    }
    if version.at_least(5, 5, 0) {
        children.push(int("m_Mode"));
    }
    children.push(TemplateField::scalar("m_NumColorKeys", "UInt8", false));
    children.push(TemplateField::scalar("m_NumAlphaKeys", "UInt8", true));

    TemplateField::new(name, "Gradient", children)
}

fn animation_curve(name: &str, version: &UnityVersion) -> TemplateField {
    let mut keyframe = floats(&["time", "value", "inSlope", "outSlope"]);
    if version.major >= 2018 {
        keyframe.push(int("weightedMode"));
        keyframe.extend(floats(&["inWeight", "outWeight"]));
    }

    let curve = TemplateField::new(
        "m_Curve",
        "vector",
        vec![TemplateField::array(
            "Array",
            "Array",
            TemplateField::new("data", "Keyframe", keyframe),
        )],
    );

    TemplateField::new(
        name,
        "AnimationCurve",
        vec![
            curve,
            int("m_PreInfinity"),
            int("m_PostInfinity"),
            int("m_RotationOrder"),
        ],
    )
}

fn gui_style(name: &str) -> TemplateField {
    let state = |name: &str| {
        TemplateField::new(
            name,
            "GUIStyleState",
            vec![pptr("m_Background", "PPtr<Texture2D>", true), color_rgba("m_TextColor")],
        )
    };
    let offset = |name: &str| {
        TemplateField::new(name, "RectOffset", ints(&["m_Left", "m_Right", "m_Top", "m_Bottom"]))
    };

    TemplateField::new(
        name,
        "GUIStyle",
        vec![
            TemplateField::string("m_Name"),
            state("m_Normal"),
            state("m_Hover"),
            state("m_Active"),
            state("m_Focused"),
            state("m_OnNormal"),
            state("m_OnHover"),
            state("m_OnActive"),
            state("m_OnFocused"),
            offset("m_Border"),
            offset("m_Margin"),
            offset("m_Padding"),
            offset("m_Overflow"),
            pptr("m_Font", "PPtr<Font>", true),
            int("m_FontSize"),
            int("m_FontStyle"),
            int("m_Alignment"),
            TemplateField::scalar("m_WordWrap", "bool", false),
            TemplateField::scalar("m_RichText", "bool", true),
            int("m_TextClipping"),
            int("m_ImagePosition"),
            TemplateField::new("m_ContentOffset", "Vector2f", floats(&["x", "y"])),
            float("m_FixedWidth"),
            float("m_FixedHeight"),
            TemplateField::scalar("m_StretchWidth", "bool", false),
            TemplateField::scalar("m_StretchHeight", "bool", true),
        ],
    )
}

#[cfg(test)]
mod test {
    use std::collections::HashMap;

    use super::{
        extend_template, script_templates, EngineType, ScriptField, ScriptFieldKind, ScriptReflector,
    };
    use crate::template::{TemplateField, ValueType};
    use crate::value::AssetInstance;
    use crate::version::UnityVersion;

    struct StaticReflector(HashMap<String, Vec<ScriptField>>);

    impl ScriptReflector for StaticReflector {
        fn fields(&self, _assembly: &str, full_name: &str) -> Option<Vec<ScriptField>> {
            self.0.get(full_name).cloned()
        }
    }

    fn version(value: &str) -> UnityVersion {
        value.parse().unwrap()
    }

    #[test]
    fn filters_unserialized_fields() {
        let fields = vec![
            ScriptField::new("health", ScriptFieldKind::Primitive("Int32".to_string())),
            ScriptField {
                is_public: false,
                ..ScriptField::new("hidden", ScriptFieldKind::Primitive("Int32".to_string()))
            },
            ScriptField {
                is_public: false,
                has_serialize_field: true,
                ..ScriptField::new("kept", ScriptFieldKind::Primitive("Boolean".to_string()))
            },
            ScriptField {
                is_static: true,
                ..ScriptField::new("shared", ScriptFieldKind::Primitive("Int32".to_string()))
            },
            ScriptField {
                is_const: true,
                ..ScriptField::new("limit", ScriptFieldKind::Primitive("Int32".to_string()))
            },
            ScriptField::new("handle", ScriptFieldKind::Primitive("IntPtr".to_string())),
            ScriptField::new("action", ScriptFieldKind::Unsupported("System.Action".to_string())),
        ];

        let templates = script_templates(&fields, &version("2019.4.3f1"));
        let names: Vec<_> = templates.iter().map(|field| field.name.as_str()).collect();
        assert_eq!(names, ["health", "kept"]);
        assert_eq!(templates[0].type_name, "int");
        assert!(!templates[0].align);
        assert_eq!(templates[1].value_type, ValueType::Bool);
        assert!(templates[1].align);
    }

    #[test]
    fn arrays_strings_and_references() {
        let fields = vec![
            ScriptField::new("title", ScriptFieldKind::String),
            ScriptField::new("scores", ScriptFieldKind::Primitive("Single".to_string())).into_array(),
            ScriptField::new("bytes", ScriptFieldKind::Primitive("Byte".to_string())).into_array(),
            ScriptField::new("target", ScriptFieldKind::ObjectReference("Transform".to_string())),
            ScriptField::new("mode", ScriptFieldKind::Enum("Mode".to_string())),
        ];

        let templates = script_templates(&fields, &version("4.7.2f1"));
        assert_eq!(templates[0].value_type, ValueType::String);

        let scores = &templates[1];
        assert!(scores.is_array);
        assert!(scores.align);
        assert_eq!(scores.value_type, ValueType::Array);
        assert_eq!(scores.element().unwrap().type_name, "float");

        assert_eq!(templates[2].value_type, ValueType::ByteArray);
        assert!(!templates[2].element().unwrap().align);

        let target = &templates[3];
        assert_eq!(target.type_name, "PPtr<$Transform>");
        assert_eq!(target.child("m_PathID").unwrap().value_type, ValueType::Int32);

        assert_eq!(templates[4].value_type, ValueType::Int32);
        assert_eq!(templates[4].type_name, "Mode");
    }

    #[test]
    fn engine_layouts_follow_version() {
        let fields = vec![
            ScriptField::new("gradient", ScriptFieldKind::Engine(EngineType::Gradient)),
            ScriptField::new("curve", ScriptFieldKind::Engine(EngineType::AnimationCurve)),
            ScriptField::new("style", ScriptFieldKind::Engine(EngineType::GUIStyle)),
            ScriptField::new("matrix", ScriptFieldKind::Engine(EngineType::Matrix4x4)),
        ];

        let modern = script_templates(&fields, &version("2019.4.3f1"));
        assert_eq!(modern[0].children().len(), 27);
        assert_eq!(modern[0].child("key0").unwrap().children().len(), 4);
        let keyframe = modern[1]
            .child("m_Curve")
            .and_then(|curve| curve.child("Array"))
            .and_then(|array| array.element())
            .unwrap();
        assert_eq!(keyframe.children().len(), 7);
        assert_eq!(modern[2].children().len(), 26);
        assert_eq!(modern[3].children()[1].name, "e10");

        let legacy = script_templates(&fields, &version("5.4.0f1"));
        assert_eq!(legacy[0].children().len(), 26);
        assert_eq!(legacy[0].child("key0").unwrap().children()[0].name, "rgba");
        assert_eq!(EngineType::from_full_name("UnityEngine.Rect"), Some(EngineType::Rect));
        assert_eq!(EngineType::from_full_name("System.Rect"), None);
    }

    #[test]
    fn extends_mono_behaviour_and_decodes() -> crate::error::Result<()> {
        let mut types = HashMap::new();
        types.insert(
            "Game.Player".to_string(),
            vec![
                ScriptField::new("lives", ScriptFieldKind::Primitive("Byte".to_string())),
                ScriptField::new("speed", ScriptFieldKind::Primitive("Single".to_string())),
            ],
        );
        let reflector = StaticReflector(types);

        let base = TemplateField::new(
            "Base",
            "MonoBehaviour",
            vec![TemplateField::scalar("m_Enabled", "UInt8", true)],
        );
        let fields = reflector.fields("Assembly-CSharp.dll", "Game.Player").unwrap();
        let template = extend_template(&base, &fields, &version("2019.4.3f1"));
        assert_eq!(template.children().len(), 3);

        #[rustfmt::skip]
        let data = [
            0x01, 0x00, 0x00, 0x00,
            0x03, 0x00, 0x00, 0x00,
            0x00, 0x00, 0x80, 0x3F,
        ];
        let instance = AssetInstance::from_bytes(template, &data, false)?;
        let base = instance.base_field();
        assert_eq!(base.get("lives").unwrap().value().as_i64(), Some(3));
        assert_eq!(base.get("speed").unwrap().value().as_f64(), Some(1.0));
        Ok(())
    }
}
