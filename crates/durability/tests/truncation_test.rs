//! Truncation tests
//!
//! A dump has no trailer, so where it ends decides the outcome:
//! - exactly at a segment boundary: the block sequence ends cleanly
//! - inside a segment: the read fails as truncated
//! - inside the title, version or header: the dump cannot be opened

use std::path::Path;

use dbdump_durability::format::{
    DATA_SEGMENT_PREFIX_SIZE, FILE_PREFIX_SIZE, HEADER_OFFSET,
};
use dbdump_durability::{
    write_dump, BlockStep, DumpConfig, DumpError, DumpReader, MemorySource, ReaderState,
    RestoreConfig, ServerInfo, HEADER_TITLE,
};
use tempfile::TempDir;
use uuid::Uuid;

/// Dump bytes holding "abc" then "de", and the offset of the first segment.
fn sample_bytes(dir: &Path) -> (Vec<u8>, usize) {
    let path = dir.join("sample.dump");
    let mut source = MemorySource::new(ServerInfo::new(1_700_000_000, "1.0", ""));
    source.push_object(
        Uuid::from_u128(1),
        vec![],
        vec![],
        vec![b"abc".to_vec(), b"de".to_vec()],
    );
    write_dump(&mut source, &path, DumpConfig::for_testing()).unwrap();

    let header_len = DumpReader::open(&path).unwrap().header_bytes().len();
    (std::fs::read(&path).unwrap(), HEADER_OFFSET + header_len)
}

#[test]
fn test_boundary_truncation_ends_cleanly() {
    let temp_dir = TempDir::new().unwrap();
    let (data, first) = sample_bytes(temp_dir.path());
    let boundary = first + DATA_SEGMENT_PREFIX_SIZE + 3;

    let mut blocks = DumpReader::from_reader(&data[..boundary]).unwrap().blocks();
    assert_eq!(blocks.next_block().unwrap(), BlockStep::Block(b"abc".to_vec()));
    assert_eq!(blocks.next_block().unwrap(), BlockStep::EndOfSequence);
    assert_eq!(blocks.state(), ReaderState::Done);
}

#[test]
fn test_boundary_truncation_caught_with_header_table() {
    let temp_dir = TempDir::new().unwrap();
    let (data, first) = sample_bytes(temp_dir.path());
    let boundary = first + DATA_SEGMENT_PREFIX_SIZE + 3;
    let config = RestoreConfig::new().with_verify_header_table(true);

    let mut blocks = DumpReader::from_reader_with_config(&data[..boundary], &config)
        .unwrap()
        .blocks();
    assert!(blocks.next_block().is_ok());
    let err = blocks.next_block().unwrap_err();
    assert!(matches!(err, DumpError::ChunkTableMismatch { index: 1, .. }));
}

#[test]
fn test_header_only_dump_has_no_blocks() {
    let temp_dir = TempDir::new().unwrap();
    let (data, first) = sample_bytes(temp_dir.path());

    let blocks = DumpReader::from_reader(&data[..first]).unwrap().blocks();
    assert_eq!(blocks.count(), 0);
}

#[test]
fn test_every_mid_segment_cut_is_fatal() {
    let temp_dir = TempDir::new().unwrap();
    let (data, first) = sample_bytes(temp_dir.path());
    let second = first + DATA_SEGMENT_PREFIX_SIZE + 3;

    for cut in (first + 1..second).chain(second + 1..data.len()) {
        let results: Vec<_> = DumpReader::from_reader(&data[..cut]).unwrap().blocks().collect();
        let last = results.last().unwrap();
        assert!(
            matches!(last, Err(DumpError::Truncated { .. })),
            "cut at {} ended with {:?}",
            cut,
            last
        );
    }
}

#[test]
fn test_truncated_context_names_the_field() {
    let temp_dir = TempDir::new().unwrap();
    let (data, first) = sample_bytes(temp_dir.path());

    let cases = [
        (first + 5, "data block 0 digest"),
        (first + 22, "data block 0 length"),
        (first + DATA_SEGMENT_PREFIX_SIZE + 1, "data block 0 payload"),
    ];
    for (cut, expected) in cases {
        let mut blocks = DumpReader::from_reader(&data[..cut]).unwrap().blocks();
        match blocks.next_block() {
            Err(DumpError::Truncated { context, .. }) => assert_eq!(context, expected),
            other => panic!("cut at {}: unexpected {:?}", cut, other),
        }
    }
}

#[test]
fn test_short_title_is_not_a_dump() {
    let temp_dir = TempDir::new().unwrap();
    let (data, _) = sample_bytes(temp_dir.path());

    for cut in [0, 1, HEADER_TITLE.len() - 1] {
        let err = DumpReader::from_reader(&data[..cut]).unwrap_err();
        assert!(matches!(err, DumpError::NotADump), "cut at {}", cut);
    }
}

#[test]
fn test_cut_inside_version_or_header() {
    let temp_dir = TempDir::new().unwrap();
    let (data, first) = sample_bytes(temp_dir.path());

    let cases = [
        (HEADER_TITLE.len() + 3, "dump version"),
        (FILE_PREFIX_SIZE, "header block marker"),
        (FILE_PREFIX_SIZE + 10, "header digest"),
        (HEADER_OFFSET - 1, "header length"),
        (first - 1, "header bytes"),
    ];
    for (cut, expected) in cases {
        match DumpReader::from_reader(&data[..cut]) {
            Err(DumpError::Truncated { context, .. }) => assert_eq!(context, expected),
            other => panic!("cut at {}: unexpected {:?}", cut, other.map(|r| r.version())),
        }
    }
}
