use std::collections::HashMap;
use std::io::Cursor;
use std::sync::Arc;

use binrw::BinWrite;
use pretty_assertions::assert_str_eq;
use tracing_test::traced_test;
use unity_assets::error::{Error, Result};
use unity_assets::types::{AssetsFileHeader, AssetsFileMetadata, LargeHeader};
use unity_assets::{
    dump, AssetInstance, AssetsFile, AssetsReplacer, ClassDatabase, EndianWriter, ReplacerSet,
    TemplateField, ValueField,
};

const TRANSFORM_CLASS: i32 = 4;

/// An assets file without objects, the starting point for the files built below
fn empty_assets(version: u32, big_endian: bool) -> Result<Vec<u8>> {
    let header = AssetsFileHeader {
        version,
        endianness: big_endian as u8,
        large: (version >= 22).then(LargeHeader::default),
        ..Default::default()
    };
    let metadata = AssetsFileMetadata {
        unity_version: "2019.4.3f1".to_string(),
        target_platform: 19,
        has_type_tree: true,
        ..Default::default()
    };

    let mut writer = EndianWriter::new(Cursor::new(Vec::new()), big_endian);
    header.write(&mut writer)?;
    metadata.write(&mut writer, version)?;
    Ok(writer.into_inner().into_inner())
}

/// Build a file holding one object per `(path id, data)` pair
fn build_assets(version: u32, objects: &[(i64, Vec<u8>)]) -> Result<Vec<u8>> {
    let mut assets = AssetsFile::new(Cursor::new(empty_assets(version, false)?))?;
    let replacers: ReplacerSet = objects
        .iter()
        .map(|(path_id, data)| AssetsReplacer::add_or_modify(*path_id, TRANSFORM_CLASS, data.clone()))
        .collect();
    assets.write_to_vec(&replacers)
}

fn metadata_len(assets: &AssetsFile<Cursor<Vec<u8>>>) -> Result<u64> {
    let mut writer = EndianWriter::new(Cursor::new(Vec::new()), false);
    assets.metadata().write(&mut writer, assets.version())?;
    Ok(writer.into_inner().into_inner().len() as u64)
}

#[traced_test]
#[test]
fn replacing_one_of_two_objects() -> Result<()> {
    const GAME_OBJECT_CLASS: i32 = 1;
    const TEXTURE_2D_CLASS: i32 = 28;

    let mut empty = AssetsFile::new(Cursor::new(empty_assets(17, false)?))?;
    let replacers: ReplacerSet = [
        AssetsReplacer::add_or_modify(1, GAME_OBJECT_CLASS, vec![0x11; 12]),
        AssetsReplacer::add_or_modify(2, TEXTURE_2D_CLASS, vec![0x22; 64]),
    ]
    .into_iter()
    .collect();
    let source = empty.write_to_vec(&replacers)?;
    let mut assets = AssetsFile::new(Cursor::new(source.clone()))?;
    let original = *assets.object_by_path_id(1).unwrap();

    let replacers: ReplacerSet =
        [AssetsReplacer::add_or_modify(2, TEXTURE_2D_CLASS, vec![0x33; 1024])]
            .into_iter()
            .collect();
    let data = assets.write_to_vec(&replacers)?;
    let mut written = AssetsFile::new(Cursor::new(data.clone()))?;

    let header = *written.header();
    assert_eq!(header.data_offset(), 0x1000);
    assert_eq!(header.file_size(), data.len() as u64);
    assert_eq!(header.file_size(), 0x1000 + 12 + 4 + 1024);
    assert_eq!(header.metadata_size(), 0x14 + metadata_len(&written)? - 0x13);

    let first = *written.object_by_path_id(1).unwrap();
    let second = *written.object_by_path_id(2).unwrap();
    assert_eq!(first.byte_start, original.byte_start);
    assert_eq!(first.byte_size, 12);
    assert_eq!((second.byte_start, second.byte_size), (16, 1024));
    assert_eq!(&data[0x100C..0x1010], &[0, 0, 0, 0]);

    let start = 0x1000 + first.byte_start as usize;
    assert_eq!(&data[start..start + 12], &source[start..start + 12]);
    assert_eq!(written.class_id_of(&first), GAME_OBJECT_CLASS);
    assert_eq!(written.class_id_of(&second), TEXTURE_2D_CLASS);
    assert_eq!(written.read_object(2)?, vec![0x33; 1024]);
    Ok(())
}

#[test]
fn unchanged_write_is_identical() -> Result<()> {
    for version in [13, 14, 15, 17, 22] {
        let data = build_assets(version, &[(1, vec![1, 2, 3]), (7, vec![4; 9])])?;
        let mut assets = AssetsFile::new(Cursor::new(data.clone()))?;
        let written = assets.write_to_vec(&ReplacerSet::new())?;
        assert_str_eq!(format!("{:02X?}", written), format!("{:02X?}", data));
    }
    Ok(())
}

#[test]
fn large_header_metadata_size() -> Result<()> {
    let data = build_assets(22, &[(1, vec![9; 5])])?;
    let assets = AssetsFile::new(Cursor::new(data.clone()))?;

    let header = assets.header();
    assert_eq!(header.header_size(), 0x30);
    assert_eq!(header.file_size(), data.len() as u64);
    assert_eq!(
        header.metadata_size(),
        0x30 + metadata_len(&assets)? - 0x13 - 0x1c
    );
    Ok(())
}

#[test]
fn directory_is_sorted_by_path_id() -> Result<()> {
    let data = build_assets(17, &[(5, vec![5]), (-2, vec![2]), (3, vec![3])])?;
    let mut assets = AssetsFile::new(Cursor::new(data))?;

    let ids: Vec<_> = assets.objects().map(|object| object.path_id).collect();
    assert_eq!(ids, [-2, 3, 5]);
    assert_eq!(assets.read_object(3)?, [3]);
    Ok(())
}

#[test]
fn replacers_modify_and_remove() -> Result<()> {
    let data = build_assets(17, &[(1, vec![1; 4]), (2, vec![2; 4]), (3, vec![3; 4])])?;
    let mut assets = AssetsFile::new(Cursor::new(data))?;

    let mut replacers = ReplacerSet::new();
    replacers.insert(AssetsReplacer::add_or_modify(2, TRANSFORM_CLASS, vec![0xAB; 6]));
    replacers.insert(AssetsReplacer::remove(1));
    replacers.insert(AssetsReplacer::add_or_modify(3, TRANSFORM_CLASS, vec![0xCD]));
    replacers.insert(AssetsReplacer::remove(3));
    let written = assets.write_to_vec(&replacers)?;

    let mut edited = AssetsFile::new(Cursor::new(written))?;
    let ids: Vec<_> = edited.objects().map(|object| object.path_id).collect();
    assert_eq!(ids, [2]);
    assert_eq!(edited.read_object(2)?, vec![0xAB; 6]);
    Ok(())
}

#[test]
fn removing_a_missing_object_fails() -> Result<()> {
    let data = build_assets(17, &[(1, vec![1])])?;
    let mut assets = AssetsFile::new(Cursor::new(data))?;

    let replacers: ReplacerSet = [AssetsReplacer::remove(44)].into_iter().collect();
    assert!(matches!(
        assets.write_to_vec(&replacers),
        Err(Error::ReplacerTargetNotFound(44))
    ));
    Ok(())
}

#[test]
fn objects_are_aligned_to_eight_bytes() -> Result<()> {
    for size in [0usize, 1, 3, 4] {
        let data = build_assets(17, &[(1, vec![0xFF; size]), (2, vec![0xEE; 4])])?;
        let assets = AssetsFile::new(Cursor::new(data.clone()))?;

        let start = (size as u64).div_ceil(8) * 8;
        let second = assets.object_by_path_id(2).unwrap();
        assert_eq!(second.byte_start, start, "first object of {size} bytes");
        assert_eq!(assets.header().file_size(), 0x1000 + start + 4);
        assert_eq!(data.len() as u64, 0x1000 + start + 4);
    }
    Ok(())
}

#[test]
fn big_endian_files_round_trip() -> Result<()> {
    let mut assets = AssetsFile::new(Cursor::new(empty_assets(17, true)?))?;
    let replacers: ReplacerSet = [AssetsReplacer::add_or_modify(
        0x0102_0304_0506,
        TRANSFORM_CLASS,
        vec![7; 3],
    )]
    .into_iter()
    .collect();
    let written = assets.write_to_vec(&replacers)?;

    let mut read = AssetsFile::new(Cursor::new(written))?;
    assert!(read.header().is_big_endian());
    assert_eq!(read.read_object(0x0102_0304_0506)?, [7; 3]);
    Ok(())
}

#[test]
fn byte_fields_pad_before_an_int() -> Result<()> {
    for count in [0usize, 1, 3, 4] {
        let mut fields: Vec<_> = (0..count)
            .map(|index| TemplateField::scalar(format!("m_Flag{index}"), "UInt8", index + 1 == count))
            .collect();
        fields.push(TemplateField::scalar("m_Value", "int", false));
        let template = Arc::new(TemplateField::new("Base", "Flags", fields));

        let mut field = ValueField::default_for(&template);
        for index in 0..count {
            let name = format!("m_Flag{index}");
            field.get_mut(&name).unwrap().set_integer(0xFF)?;
        }
        let bytes = AssetInstance::from_base_field(field).to_bytes(false)?;
        assert_eq!(bytes.len(), count.div_ceil(4) * 4 + 4, "{count} byte fields");
    }
    Ok(())
}

fn transform_template() -> TemplateField {
    TemplateField::new(
        "Base",
        "Transform",
        vec![
            TemplateField::string("m_Name"),
            TemplateField::new(
                "m_LocalPosition",
                "Vector3f",
                vec![
                    TemplateField::scalar("x", "float", false),
                    TemplateField::scalar("y", "float", false),
                    TemplateField::scalar("z", "float", false),
                ],
            ),
            TemplateField::vector(
                "m_Children",
                TemplateField::scalar("data", "SInt64", false),
            ),
        ],
    )
}

#[test]
fn edited_instances_and_dumps_round_trip() -> Result<()> {
    let database = HashMap::from([(TRANSFORM_CLASS, transform_template())]);

    let template = Arc::new(transform_template());
    let mut instance = AssetInstance::from_base_field(ValueField::default_for(&template));
    let base = instance.base_field_mut();
    base.get_mut("m_Name").unwrap().set_string("Root")?;
    base.get_mut("m_LocalPosition")
        .unwrap()
        .get_mut("y")
        .unwrap()
        .set_float(2.5)?;
    let children = base.get_mut("m_Children").unwrap().get_mut("Array").unwrap();
    children.push_default()?.set_integer(9)?;
    children.push_default()?.set_integer(-3)?;

    let mut assets = AssetsFile::new(Cursor::new(empty_assets(17, false)?))?;
    let replacers: ReplacerSet = [AssetsReplacer::add_or_modify(1, TRANSFORM_CLASS, instance.clone())]
        .into_iter()
        .collect();
    let mut written = AssetsFile::new(Cursor::new(assets.write_to_vec(&replacers)?))?;

    let decoded = written.instance(1, Some(&database as &dyn ClassDatabase))?;
    assert_eq!(decoded, instance);

    let mut text = Vec::new();
    dump::export_text(decoded.base_field(), &mut text)?;
    let imported = dump::import_text(text.as_slice(), false)?;
    assert_eq!(imported, written.read_object(1)?);
    Ok(())
}

#[test]
fn object_offsets_past_the_stream_are_rejected() -> Result<()> {
    let data = build_assets(22, &[(1, vec![1, 2, 3, 4])])?;
    let assets = AssetsFile::new(Cursor::new(data.clone()))?;
    let header = *assets.header();

    for byte_start in [u64::MAX - 4, data.len() as u64] {
        let mut metadata = assets.metadata().clone();
        metadata.objects[0].byte_start = byte_start;

        let mut writer = EndianWriter::new(Cursor::new(Vec::new()), false);
        header.write(&mut writer)?;
        metadata.write(&mut writer, 22)?;
        let prefix = writer.into_inner().into_inner();
        let mut corrupted = data.clone();
        corrupted[..prefix.len()].copy_from_slice(&prefix);

        let mut corrupted = AssetsFile::new(Cursor::new(corrupted))?;
        assert!(matches!(
            corrupted.read_object(1),
            Err(Error::ObjectOutOfBounds { path_id: 1 })
        ));
    }
    Ok(())
}
