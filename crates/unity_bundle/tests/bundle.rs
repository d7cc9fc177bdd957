use std::io::Cursor;

use binrw::BinWrite;
use pretty_assertions::assert_eq;
use tracing_test::traced_test;
use unity_assets::types::{AssetsFileHeader, AssetsFileMetadata};
use unity_assets::{AssetsFile, AssetsReplacer, EndianWriter, ReplacerSet};
use unity_bundle::error::{Error, Result};
use unity_bundle::types::STREAMED_BLOCK;
use unity_bundle::{
    BlockInfo, BundleContent, BundleFile, BundleHeader, BundleMetadata, BundleReadOptions,
    BundleReplacer, BundleReplacerSet, BundleState, CompressionType, DirectoryEntry, PackOptions,
};

const SERIALIZED: u32 = 4;

/// An uncompressed bundle holding `entries` back to back in a single block
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
    assemble_bundle(directory, data)
}

/// Header and uncompressed metadata in front of `data`, whatever `directory` says
fn assemble_bundle(directory: Vec<DirectoryEntry>, data: Vec<u8>) -> Result<Vec<u8>> {
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

/// A small assets file with one object per path id
fn build_assets(path_ids: &[i64]) -> Result<Vec<u8>> {
    let header = AssetsFileHeader {
        version: 17,
        ..Default::default()
    };
    let metadata = AssetsFileMetadata {
        unity_version: "2019.4.3f1".to_string(),
        target_platform: 19,
        has_type_tree: true,
        ..Default::default()
    };

    let mut writer = EndianWriter::new(Cursor::new(Vec::new()), false);
    header.write(&mut writer)?;
    metadata.write(&mut writer, 17)?;
    let empty = writer.into_inner().into_inner();

    let replacers: ReplacerSet = path_ids
        .iter()
        .map(|path_id| AssetsReplacer::add_or_modify(*path_id, 1, vec![*path_id as u8; 16]))
        .collect();
    Ok(AssetsFile::new(Cursor::new(empty))?.write_to_vec(&replacers)?)
}

/// Reproducible bytes that LZ4 cannot shrink
fn noise(len: usize) -> Vec<u8> {
    let mut state = 0x2545_F491_4F6C_DD1Du64;
    (0..len)
        .map(|_| {
            state ^= state << 13;
            state ^= state >> 7;
            state ^= state << 17;
            (state >> 24) as u8
        })
        .collect()
}

fn text(len: usize) -> Vec<u8> {
    b"m_Name: Player\nm_IsActive: 1\n"
        .iter()
        .copied()
        .cycle()
        .take(len)
        .collect()
}

fn sample_entries() -> Result<Vec<(&'static str, u32, Vec<u8>)>> {
    Ok(vec![
        ("CAB-0123456789abcdef", SERIALIZED, build_assets(&[1, 2])?),
        ("CAB-0123456789abcdef.resS", 0, text(0x30000)),
        ("CAB-0123456789abcdef.resource", 0, noise(0x8000)),
    ])
}

fn read_all(bundle: &mut BundleFile<Cursor<Vec<u8>>>) -> Result<Vec<(String, Vec<u8>)>> {
    let names: Vec<String> = bundle.entries().map(|entry| entry.name.clone()).collect();
    names
        .into_iter()
        .enumerate()
        .map(|(index, name)| Ok((name, bundle.read_entry(index)?)))
        .collect()
}

#[test]
fn read_uncompressed_bundle() -> Result<()> {
    let entries = sample_entries()?;
    let mut bundle = BundleFile::new(Cursor::new(build_bundle(&entries)?))?;

    assert_eq!(bundle.state(), BundleState::Ready);
    assert_eq!(bundle.len(), 3);
    assert_eq!(bundle.index_for_name("CAB-0123456789abcdef.resS"), Some(1));
    assert_eq!(bundle.index_for_name("missing"), None);
    assert!(bundle.entry(0)?.is_serialized());
    assert!(matches!(bundle.entry(3), Err(Error::EntryNotFound(_))));
    assert!(matches!(bundle.entry_by_name("missing"), Err(Error::EntryNotFound(_))));

    for (index, (name, _, data)) in entries.iter().enumerate() {
        assert_eq!(&bundle.entry(index)?.name, name);
        assert_eq!(&bundle.read_entry(index)?, data);
    }
    Ok(())
}

#[traced_test]
#[test]
fn pack_unpack_round_trip() -> Result<()> {
    let entries = sample_entries()?;
    let source = build_bundle(&entries)?;

    for compression in [
        CompressionType::None,
        CompressionType::Lzma,
        CompressionType::Lz4,
        CompressionType::Lz4Hc,
    ] {
        for info_at_end in [false, true] {
            let options = PackOptions::builder()
                .compression(compression)
                .info_at_end(info_at_end)
                .build();
            let mut bundle = BundleFile::new(Cursor::new(source.clone()))?;
            let packed = bundle.pack(Cursor::new(Vec::new()), &options)?.into_inner();

            let mut packed_bundle = BundleFile::new(Cursor::new(packed.clone()))?;
            assert_eq!(packed_bundle.state(), BundleState::CompressedMetadata);
            assert_eq!(packed_bundle.header().size, packed.len() as u64);
            assert_eq!(packed_bundle.header().is_info_at_end(), info_at_end);
            assert!(matches!(packed_bundle.metadata(), Err(Error::MetadataNotLoaded)));

            let metadata = packed_bundle.load_metadata()?.clone();
            assert_eq!(packed_bundle.state(), BundleState::Ready);
            assert_eq!(metadata.data_len(), bundle.metadata()?.data_len());
            assert_eq!(metadata.directory, bundle.metadata()?.directory);
            assert_eq!(
                metadata.is_data_compressed()?,
                compression != CompressionType::None
            );

            let unpacked = packed_bundle.unpack(Cursor::new(Vec::new()))?.into_inner();
            let mut unpacked = BundleFile::new(Cursor::new(unpacked))?;
            assert_eq!(unpacked.state(), BundleState::Ready);
            assert!(!unpacked.header().is_info_at_end());

            let expected: Vec<_> = entries
                .iter()
                .map(|(name, _, data)| (name.to_string(), data.clone()))
                .collect();
            assert_eq!(read_all(&mut unpacked)?, expected);
        }
    }
    assert!(logs_contain("packed bundle"));
    Ok(())
}

#[test]
fn lzma_packs_a_single_block() -> Result<()> {
    let mut bundle = BundleFile::new(Cursor::new(build_bundle(&sample_entries()?)?))?;
    let options = PackOptions::builder()
        .compression(CompressionType::Lzma)
        .build();
    let packed = bundle.pack(Cursor::new(Vec::new()), &options)?.into_inner();

    let options = BundleReadOptions::builder().decompress_metadata(true).build();
    let packed = BundleFile::with_options(Cursor::new(packed), options)?;
    assert_eq!(packed.state(), BundleState::Ready);

    let blocks = &packed.metadata()?.blocks;
    assert_eq!(blocks.len(), 1);
    assert_eq!(blocks[0].flags, 0x41);
    assert_eq!(blocks[0].compression()?, CompressionType::Lzma);
    Ok(())
}

#[test]
fn lz4_chunks_fall_back_to_stored_blocks() -> Result<()> {
    let random = noise(0x20000);
    let compressible = text(0x20000);
    let source = build_bundle(&[
        ("random", 0, random.clone()),
        ("text", 0, compressible.clone()),
    ])?;

    let mut bundle = BundleFile::new(Cursor::new(source))?;
    let packed = bundle
        .pack(Cursor::new(Vec::new()), &PackOptions::default())?
        .into_inner();
    let mut packed = BundleFile::new(Cursor::new(packed))?;

    let flags: Vec<_> = packed.load_metadata()?.blocks.iter().map(|block| block.flags).collect();
    assert_eq!(flags, [0, 3]);
    assert!(matches!(packed.read_entry(0), Err(Error::CompressedBundle)));

    let unpacked = packed.unpack(Cursor::new(Vec::new()))?.into_inner();
    let mut unpacked = BundleFile::new(Cursor::new(unpacked))?;
    assert_eq!(unpacked.read_entry(0)?, random);
    assert_eq!(unpacked.read_entry(1)?, compressible);
    Ok(())
}

#[test]
fn small_chunks_make_many_blocks() -> Result<()> {
    let data = text(0x1000);
    let mut bundle = BundleFile::new(Cursor::new(build_bundle(&[("text", 0, data.clone())])?))?;
    let options = PackOptions::builder().chunk_size(0x400).build();
    let packed = bundle.pack(Cursor::new(Vec::new()), &options)?.into_inner();

    let mut packed = BundleFile::new(Cursor::new(packed))?;
    assert_eq!(packed.load_metadata()?.blocks.len(), 4);

    let unpacked = packed.unpack(Cursor::new(Vec::new()))?.into_inner();
    assert_eq!(BundleFile::new(Cursor::new(unpacked))?.read_entry(0)?, data);
    Ok(())
}

#[traced_test]
#[test]
fn write_with_replacers() -> Result<()> {
    let entries = sample_entries()?;
    let mut bundle = BundleFile::new(Cursor::new(build_bundle(&entries)?))?;

    let replacers = BundleReplacerSet::from_iter([
        BundleReplacer::remove("CAB-0123456789abcdef.resource"),
        BundleReplacer::rename("CAB-0123456789abcdef.resS", "CAB-fedcba9876543210.resS"),
        BundleReplacer::add_or_modify("readme.txt", b"hello bundle".to_vec()),
    ]);
    let written = bundle.write_to_vec(&replacers)?;
    let written_len = written.len() as u64;

    let mut written = BundleFile::new(Cursor::new(written))?;
    assert_eq!(written.header().size, written_len);
    let names: Vec<_> = written.entries().map(|entry| entry.name.clone()).collect();
    assert_eq!(
        names,
        [
            "CAB-0123456789abcdef",
            "CAB-fedcba9876543210.resS",
            "readme.txt"
        ]
    );

    let blocks = &written.metadata()?.blocks;
    assert_eq!(blocks.len(), 1);
    assert_eq!(blocks[0].flags, STREAMED_BLOCK);

    assert_eq!(written.read_entry(0)?, entries[0].2);
    assert_eq!(written.read_entry(1)?, entries[1].2);
    assert_eq!(written.read_entry(2)?, b"hello bundle");
    assert_eq!(written.entry(2)?.flags, 0);
    assert!(logs_contain("wrote bundle"));
    Ok(())
}

#[test]
fn modify_keeps_entry_position() -> Result<()> {
    let entries = sample_entries()?;
    let mut bundle = BundleFile::new(Cursor::new(build_bundle(&entries)?))?;

    let replacers = BundleReplacerSet::from_iter([BundleReplacer::add_or_modify(
        "CAB-0123456789abcdef.resS",
        vec![7; 10],
    )]);
    let mut written = BundleFile::new(Cursor::new(bundle.write_to_vec(&replacers)?))?;

    assert_eq!(written.len(), 3);
    assert_eq!(written.entry(1)?.size, 10);
    assert_eq!(written.read_entry(1)?, vec![7; 10]);
    assert_eq!(written.read_entry(2)?, entries[2].2);
    Ok(())
}

#[test]
fn write_rejects_missing_targets() -> Result<()> {
    let mut bundle = BundleFile::new(Cursor::new(build_bundle(&sample_entries()?)?))?;

    let replacers = BundleReplacerSet::from_iter([BundleReplacer::rename("CAB-missing", "CAB-new")]);
    let result = bundle.write_to_vec(&replacers);
    assert!(matches!(result, Err(Error::ReplacerTargetNotFound(name)) if name == "CAB-missing"));
    Ok(())
}

#[test]
fn write_requires_uncompressed_data() -> Result<()> {
    let mut bundle = BundleFile::new(Cursor::new(build_bundle(&sample_entries()?)?))?;
    let packed = bundle
        .pack(Cursor::new(Vec::new()), &PackOptions::default())?
        .into_inner();

    let mut packed = BundleFile::new(Cursor::new(packed))?;
    let result = packed.write_to_vec(&BundleReplacerSet::new());
    assert!(matches!(result, Err(Error::MetadataNotLoaded)));

    packed.load_metadata()?;
    let result = packed.write_to_vec(&BundleReplacerSet::new());
    assert!(matches!(result, Err(Error::CompressedBundle)));
    Ok(())
}

#[test]
fn nested_assets_files() -> Result<()> {
    let entries = sample_entries()?;
    let mut bundle = BundleFile::new(Cursor::new(build_bundle(&entries)?))?;

    assert!(bundle.is_assets_file(0)?);
    assert!(!bundle.is_assets_file(1)?);
    assert!(!bundle.is_assets_file(2)?);

    let mut removals = ReplacerSet::new();
    removals.insert(AssetsReplacer::remove(2));
    let replacers = BundleReplacerSet::from_iter([
        BundleReplacer::add_or_modify(
            "CAB-0123456789abcdef",
            BundleContent::Assets {
                data: bundle.read_entry(0)?,
                replacers: removals.clone(),
            },
        ),
        BundleReplacer::add_or_modify(
            "CAB-copy",
            BundleContent::Assets {
                data: entries[0].2.clone(),
                replacers: removals,
            },
        ),
    ]);
    let mut written = BundleFile::new(Cursor::new(bundle.write_to_vec(&replacers)?))?;

    assert_eq!(written.len(), 4);
    assert_eq!(written.entry(3)?.name, "CAB-copy");
    assert!(written.entry(3)?.is_serialized());

    for index in [0, 3] {
        assert!(written.is_assets_file(index)?);
        let mut assets = AssetsFile::new(Cursor::new(written.read_entry(index)?))?;
        let ids: Vec<_> = assets.objects().map(|object| object.path_id).collect();
        assert_eq!(ids, [1]);
        assert_eq!(assets.read_object(1)?, vec![1; 16]);
    }
    Ok(())
}

#[test]
fn entries_outside_the_data_block_are_rejected() -> Result<()> {
    let entry = |offset, size| DirectoryEntry {
        offset,
        size,
        flags: SERIALIZED,
        name: "CAB-0001".to_string(),
    };

    for directory in [vec![entry(0, 8)], vec![entry(u64::MAX - 4, 1)], vec![entry(2, u64::MAX)]] {
        let mut bundle = assemble_bundle(directory, vec![1, 2, 3, 4])?;
        bundle.extend_from_slice(&[0xEE; 4]);
        let mut bundle = BundleFile::new(Cursor::new(bundle))?;

        assert!(matches!(bundle.read_entry(0), Err(Error::EntryOutOfBounds(name)) if name == "CAB-0001"));
        assert!(matches!(bundle.is_assets_file(0), Err(Error::EntryOutOfBounds(_))));
        assert!(matches!(
            bundle.write_to_vec(&BundleReplacerSet::new()),
            Err(Error::EntryOutOfBounds(_))
        ));
    }

    let mut bundle = BundleFile::new(Cursor::new(assemble_bundle(vec![entry(0, 4)], vec![1, 2, 3, 4])?))?;
    assert_eq!(bundle.read_entry(0)?, [1, 2, 3, 4]);
    Ok(())
}
