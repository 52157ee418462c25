//! Dump/restore round-trip tests
//!
//! Whatever a source delivers must come back from the reader byte for byte:
//! the header describes every block, and the data blocks appear in block
//! order then arrival order.

use dbdump_durability::{
    restore_from_path, write_dump, BlockDescriptor, DumpConfig, DumpReader, DumpWriter,
    MemorySink, MemorySource, ServerInfo,
};
use proptest::prelude::*;
use tempfile::TempDir;
use uuid::Uuid;

fn server() -> ServerInfo {
    ServerInfo::new(1_700_000_000, "1.0", "CREATE TYPE default::User;")
}

#[test]
fn test_single_object_scenario() {
    let temp_dir = TempDir::new().unwrap();
    let path = temp_dir.path().join("db.dump");
    let object_id = Uuid::from_u128(0x01);

    let mut source = MemorySource::new(server());
    source.push_object(object_id, vec![], vec![], vec![b"abc".to_vec(), b"de".to_vec()]);
    write_dump(&mut source, &path, DumpConfig::for_testing()).unwrap();

    let reader = DumpReader::open(&path).unwrap();
    let header = reader.decode_header().unwrap();
    assert_eq!(header.server, server());
    assert_eq!(header.blocks.len(), 1);
    assert_eq!(header.blocks[0].descriptor.data_size, 5);
    assert_eq!(header.blocks[0].descriptor.data_blocks_count, 2);
    assert_eq!(header.blocks[0].chunks[0].size, 3);
    assert_eq!(header.blocks[0].chunks[1].size, 2);

    let blocks: Vec<Vec<u8>> = reader.blocks().map(Result::unwrap).collect();
    assert_eq!(blocks, vec![b"abc".to_vec(), b"de".to_vec()]);
}

#[test]
fn test_interleaved_chunks_keep_arrival_order() {
    let temp_dir = TempDir::new().unwrap();
    let path = temp_dir.path().join("interleaved.dump");
    let a = Uuid::from_u128(0xA);
    let b = Uuid::from_u128(0xB);

    // Chunks of two objects interleave, and b's chunks arrive before its
    // descriptor
    let mut source = MemorySource::new(server());
    source
        .push_chunk(b, b"b1".to_vec())
        .push_descriptor(BlockDescriptor::new(a, 4, 2))
        .push_chunk(a, b"a1".to_vec())
        .push_chunk(b, b"b2".to_vec())
        .push_chunk(a, b"a2".to_vec())
        .push_descriptor(BlockDescriptor::new(b, 4, 2).with_deps(vec![a]));

    let mut writer = DumpWriter::new(DumpConfig::for_testing()).unwrap();
    let info = writer.dump(&mut source, &path).unwrap();
    assert_eq!(info.blocks, 2);
    assert_eq!(info.chunks, 4);

    let mut sink = MemorySink::new();
    let summary = restore_from_path(&path, &mut sink).unwrap();
    assert!(summary.complete);
    assert_eq!(
        sink.blocks,
        vec![b"a1".to_vec(), b"a2".to_vec(), b"b1".to_vec(), b"b2".to_vec()]
    );

    let header = DumpReader::open(&path).unwrap().decode_header().unwrap();
    assert_eq!(header.blocks[0].descriptor.schema_object_id, a);
    assert_eq!(header.blocks[1].descriptor.schema_deps, vec![a]);
}

#[test]
fn test_object_without_data() {
    let temp_dir = TempDir::new().unwrap();
    let path = temp_dir.path().join("empty_object.dump");

    let mut source = MemorySource::new(server());
    source.push_descriptor(BlockDescriptor::new(Uuid::from_u128(3), 0, 0));
    write_dump(&mut source, &path, DumpConfig::for_testing()).unwrap();

    let reader = DumpReader::open(&path).unwrap();
    assert_eq!(reader.decode_header().unwrap().blocks.len(), 1);
    assert_eq!(reader.blocks().count(), 0);
}

#[test]
fn test_large_chunk_with_small_copy_buffer() {
    let temp_dir = TempDir::new().unwrap();
    let path = temp_dir.path().join("large.dump");
    let payload: Vec<u8> = (0..100_000u32).map(|i| (i % 251) as u8).collect();

    let mut source = MemorySource::new(server());
    source.push_object(Uuid::from_u128(5), vec![], vec![], vec![payload.clone()]);
    write_dump(&mut source, &path, DumpConfig::for_testing()).unwrap();

    let blocks: Vec<Vec<u8>> = DumpReader::open(&path)
        .unwrap()
        .blocks()
        .map(Result::unwrap)
        .collect();
    assert_eq!(blocks, vec![payload]);
}

#[test]
fn test_header_digest_reported() {
    let temp_dir = TempDir::new().unwrap();
    let path = temp_dir.path().join("digest.dump");

    let mut source = MemorySource::new(server());
    source.push_object(Uuid::from_u128(1), vec![], vec![], vec![b"x".to_vec()]);
    let info = write_dump(&mut source, &path, DumpConfig::for_testing()).unwrap();

    let reader = DumpReader::open(&path).unwrap();
    assert_eq!(info.header_digest, dbdump_core::digest_hex(reader.header_digest()));
    assert_eq!(info.file_bytes, std::fs::metadata(&path).unwrap().len());
}

fn arb_objects() -> impl Strategy<Value = Vec<Vec<Vec<u8>>>> {
    prop::collection::vec(
        prop::collection::vec(prop::collection::vec(any::<u8>(), 0..64), 0..4),
        0..4,
    )
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(32))]

    #[test]
    fn prop_blocks_round_trip(objects in arb_objects()) {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("prop.dump");

        let mut source = MemorySource::new(server());
        let mut expected = Vec::new();
        for (i, chunks) in objects.iter().enumerate() {
            source.push_object(Uuid::from_u128(i as u128 + 1), vec![], vec![], chunks.clone());
            expected.extend(chunks.iter().cloned());
        }
        write_dump(&mut source, &path, DumpConfig::for_testing()).unwrap();

        let reader = DumpReader::open(&path).unwrap();
        prop_assert_eq!(reader.decode_header().unwrap().blocks.len(), objects.len());
        let blocks: Vec<Vec<u8>> = reader.blocks().map(Result::unwrap).collect();
        prop_assert_eq!(blocks, expected);
    }
}
