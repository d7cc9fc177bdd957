use std::fs;
use std::io::Cursor;
use std::path::Path;

use binrw::BinWrite;
use clap::Parser;
use miette::{IntoDiagnostic, Result};
use pretty_assertions::assert_eq;
use unitool::Cli;
use unity_assets::types::{AssetsFileHeader, AssetsFileMetadata, SerializedType, TypeTree, TypeTreeNode};
use unity_assets::{AssetsFile, AssetsReplacer, EndianWriter, ReplacerSet};
use unity_bundle::types::STREAMED_BLOCK;
use unity_bundle::{BlockInfo, BundleFile, BundleHeader, BundleMetadata, DirectoryEntry};

const TRANSFORM_CLASS: i32 = 4;

fn run(args: &[&str]) -> Result<()> {
    let cli = Cli::try_parse_from(std::iter::once("unitool").chain(args.iter().copied()))
        .into_diagnostic()?;
    cli.command.handle()
}

fn path(path: &Path) -> &str {
    path.to_str().unwrap()
}

/// An assets file whose type tree describes `{ int m_Value; float m_Scale; }`
fn typed_assets() -> Result<Vec<u8>> {
    let node = |level, type_str_offset, name_str_offset, byte_size, index| TypeTreeNode {
        version: 1,
        level,
        type_str_offset,
        name_str_offset,
        byte_size,
        index,
        ..Default::default()
    };
    let tree = TypeTree {
        nodes: vec![node(0, 0, 10, 8, 0), node(1, 15, 19, 4, 1), node(1, 27, 33, 4, 2)],
        string_buffer: b"Transform\0Base\0int\0m_Value\0float\0m_Scale\0".to_vec(),
    };

    let header = AssetsFileHeader {
        version: 17,
        ..Default::default()
    };
    let metadata = AssetsFileMetadata {
        unity_version: "2019.4.3f1".to_string(),
        target_platform: 19,
        has_type_tree: true,
        types: vec![SerializedType {
            class_id: TRANSFORM_CLASS,
            type_tree: Some(tree),
            ..Default::default()
        }],
        ..Default::default()
    };

    let mut writer = EndianWriter::new(Cursor::new(Vec::new()), false);
    header.write(&mut writer).into_diagnostic()?;
    metadata.write(&mut writer, 17)?;
    let empty = writer.into_inner().into_inner();

    let mut object = 7i32.to_le_bytes().to_vec();
    object.extend_from_slice(&1.5f32.to_le_bytes());
    let replacers: ReplacerSet = [AssetsReplacer::add_or_modify(1, TRANSFORM_CLASS, object)]
        .into_iter()
        .collect();
    Ok(AssetsFile::new(Cursor::new(empty))?.write_to_vec(&replacers)?)
}

fn build_bundle(entries: &[(&str, u32, Vec<u8>)]) -> Result<Vec<u8>> {
    let mut data = Vec::new();
    let mut directory = Vec::new();
    for (name, flags, bytes) in entries {
        directory.push(DirectoryEntry {
            offset: data.len() as u64,
            size: bytes.len() as u64,
            flags: *flags,
            name: name.to_string(),
        });
        data.extend_from_slice(bytes);
    }
    let metadata = BundleMetadata {
        hash: [0; 16],
        blocks: vec![BlockInfo {
            uncompressed_size: data.len() as u32,
            compressed_size: data.len() as u32,
            flags: STREAMED_BLOCK,
        }],
        directory,
    };

    let mut header = BundleHeader::default();
    let info = metadata.to_bytes(&header)?;
    header.compressed_metadata_size = info.len() as u32;
    header.decompressed_metadata_size = info.len() as u32;
    header.size = header.header_size() + info.len() as u64 + data.len() as u64;

    let mut writer = Cursor::new(Vec::new());
    header.write_aligned(&mut writer)?;
    let mut bundle = writer.into_inner();
    bundle.extend_from_slice(&info);
    bundle.extend_from_slice(&data);
    Ok(bundle)
}

fn sample_bundle() -> Result<Vec<u8>> {
    build_bundle(&[
        ("CAB-0001", 4, typed_assets()?),
        ("CAB-0001.resS", 0, b"texture bytes ".repeat(4096)),
    ])
}

#[test]
fn bundle_pack_unpack_extract() -> Result<()> {
    let dir = tempfile::tempdir().into_diagnostic()?;
    let source = dir.path().join("source.bundle");
    let packed = dir.path().join("packed.bundle");
    let unpacked = dir.path().join("unpacked.bundle");
    let extracted = dir.path().join("extracted");
    fs::write(&source, sample_bundle()?).into_diagnostic()?;

    run(&["bundle", "pack", "-f", path(&source), "-o", path(&packed), "-c", "lzma"])?;
    run(&["bundle", "info", "-f", path(&packed)])?;
    run(&["bundle", "info", "-f", path(&packed), "--json"])?;
    run(&["bundle", "unpack", "-f", path(&packed), "-o", path(&unpacked)])?;
    run(&["bundle", "extract", "-f", path(&packed), "-d", path(&extracted)])?;

    let mut bundle = BundleFile::new(Cursor::new(fs::read(&unpacked).into_diagnostic()?))?;
    assert_eq!(bundle.read_entry(0)?, typed_assets()?);
    assert_eq!(
        fs::read(extracted.join("CAB-0001.resS")).into_diagnostic()?,
        b"texture bytes ".repeat(4096)
    );

    let again = run(&["bundle", "unpack", "-f", path(&packed), "-o", path(&unpacked)]);
    assert!(again.is_err());
    run(&["bundle", "unpack", "-f", path(&packed), "-o", path(&unpacked), "--overwrite"])?;
    Ok(())
}

#[test]
fn bundle_replace_entries() -> Result<()> {
    let dir = tempfile::tempdir().into_diagnostic()?;
    let source = dir.path().join("source.bundle");
    let readme = dir.path().join("readme.txt");
    let output = dir.path().join("edited.bundle");
    fs::write(&source, sample_bundle()?).into_diagnostic()?;
    fs::write(&readme, b"hello").into_diagnostic()?;

    run(&[
        "bundle",
        "replace",
        "-f",
        path(&source),
        "-o",
        path(&output),
        "--remove",
        "CAB-0001.resS",
        "--rename",
        "CAB-0001=CAB-0002",
        "--add",
        &format!("readme.txt={}", path(&readme)),
    ])?;

    let mut bundle = BundleFile::new(Cursor::new(fs::read(&output).into_diagnostic()?))?;
    let names: Vec<_> = bundle.entries().map(|entry| entry.name.clone()).collect();
    assert_eq!(names, ["CAB-0002", "readme.txt"]);
    assert_eq!(bundle.read_entry(1)?, b"hello");

    let missing = run(&[
        "bundle",
        "replace",
        "-f",
        path(&source),
        "-o",
        path(&dir.path().join("missing.bundle")),
        "--remove",
        "CAB-missing",
    ]);
    assert!(missing.is_err());
    Ok(())
}

#[test]
fn assets_dump_and_import() -> Result<()> {
    let dir = tempfile::tempdir().into_diagnostic()?;
    let source = dir.path().join("level0");
    fs::write(&source, typed_assets()?).into_diagnostic()?;

    run(&["assets", "info", "-f", path(&source)])?;
    run(&["assets", "info", "-f", path(&source), "--json"])?;
    run(&["assets", "list", "-f", path(&source)])?;

    for format in ["text", "json"] {
        let dump = dir.path().join(format!("object.{format}"));
        let output = dir.path().join(format!("level0.{format}"));
        run(&[
            "assets", "dump", "-f", path(&source), "-p", "1", "--format", format, "-o", path(&dump),
        ])?;
        run(&[
            "assets",
            "import",
            "-f",
            path(&source),
            "-p",
            "1",
            "-d",
            path(&dump),
            "--format",
            format,
            "-o",
            path(&output),
        ])?;
        assert_eq!(
            fs::read(&output).into_diagnostic()?,
            fs::read(&source).into_diagnostic()?
        );
    }

    let text = fs::read_to_string(dir.path().join("object.text")).into_diagnostic()?;
    assert!(text.contains("m_Value = 7"));
    Ok(())
}

#[test]
fn assets_extract_objects() -> Result<()> {
    let dir = tempfile::tempdir().into_diagnostic()?;
    let source = dir.path().join("level0");
    let extracted = dir.path().join("objects");
    fs::write(&source, typed_assets()?).into_diagnostic()?;

    run(&["assets", "extract", "-f", path(&source), "-d", path(&extracted)])?;

    let mut expected = 7i32.to_le_bytes().to_vec();
    expected.extend_from_slice(&1.5f32.to_le_bytes());
    assert_eq!(
        fs::read(extracted.join("1.4.dat")).into_diagnostic()?,
        expected
    );
    Ok(())
}

#[test]
fn detect_files() -> Result<()> {
    let dir = tempfile::tempdir().into_diagnostic()?;
    fs::write(dir.path().join("data.unity3d"), sample_bundle()?).into_diagnostic()?;
    fs::write(dir.path().join("level0"), typed_assets()?).into_diagnostic()?;
    fs::write(dir.path().join("notes.txt"), b"short").into_diagnostic()?;

    run(&["detect", path(dir.path())])?;
    run(&["detect", "--json", path(dir.path())])?;
    assert!(run(&["detect"]).is_err());
    Ok(())
}
