//! Corruption detection tests
//!
//! These tests verify that damage anywhere in a dump is detected:
//! - SHA-1 detects flipped payload bytes
//! - A damaged header or header digest fails before any block is read
//! - A damaged segment digest fails that segment only after earlier
//!   segments were delivered intact

use std::fs::OpenOptions;
use std::io::{Read, Seek, SeekFrom, Write};
use std::path::Path;

use dbdump_durability::{
    verify_dump, write_dump, DumpConfig, DumpError, DumpReader, MemorySource, ServerInfo,
    DATA_BLOCK_MARKER,
};
use dbdump_durability::format::{DATA_SEGMENT_PREFIX_SIZE, HEADER_OFFSET};
use proptest::prelude::*;
use tempfile::TempDir;
use uuid::Uuid;

/// Write a two-segment dump, returning the offset of the first segment.
fn write_sample(path: &Path) -> u64 {
    let mut source = MemorySource::new(ServerInfo::new(1_700_000_000, "1.0", ""));
    source.push_object(
        Uuid::from_u128(1),
        vec![],
        vec![],
        vec![b"abc".to_vec(), b"de".to_vec()],
    );
    write_dump(&mut source, path, DumpConfig::for_testing()).unwrap();

    let header_len = DumpReader::open(path).unwrap().header_bytes().len();
    (HEADER_OFFSET + header_len) as u64
}

fn flip_byte(path: &Path, offset: u64) {
    let mut file = OpenOptions::new()
        .read(true)
        .write(true)
        .open(path)
        .unwrap();

    file.seek(SeekFrom::Start(offset)).unwrap();
    let mut buf = [0u8; 1];
    file.read_exact(&mut buf).unwrap();

    buf[0] ^= 0xFF;

    file.seek(SeekFrom::Start(offset)).unwrap();
    file.write_all(&buf).unwrap();
    file.sync_all().unwrap();
}

#[test]
fn test_payload_bit_flip() {
    let temp_dir = TempDir::new().unwrap();
    let path = temp_dir.path().join("payload.dump");
    let first = write_sample(&path);

    // Second byte of "abc"
    flip_byte(&path, first + DATA_SEGMENT_PREFIX_SIZE as u64 + 1);

    let mut blocks = DumpReader::open(&path).unwrap().blocks();
    let err = blocks.next().unwrap().unwrap_err();
    assert!(matches!(err, DumpError::BlockChecksumMismatch { index: 0, .. }));
    assert!(err.is_integrity());
}

#[test]
fn test_second_segment_damage_after_first_delivered() {
    let temp_dir = TempDir::new().unwrap();
    let path = temp_dir.path().join("second.dump");
    let first = write_sample(&path);
    let second = first + DATA_SEGMENT_PREFIX_SIZE as u64 + 3;

    // Inside the stored digest of the second segment
    flip_byte(&path, second + 5);

    let mut blocks = DumpReader::open(&path).unwrap().blocks();
    assert_eq!(blocks.next().unwrap().unwrap(), b"abc");
    let err = blocks.next().unwrap().unwrap_err();
    assert!(matches!(err, DumpError::BlockChecksumMismatch { index: 1, .. }));
    assert!(blocks.next().is_none());
}

#[test]
fn test_header_byte_flip() {
    let temp_dir = TempDir::new().unwrap();
    let path = temp_dir.path().join("header.dump");
    write_sample(&path);

    flip_byte(&path, HEADER_OFFSET as u64 + 2);

    let err = DumpReader::open(&path).unwrap_err();
    assert!(matches!(err, DumpError::HeaderChecksumMismatch { .. }));
}

#[test]
fn test_header_digest_flip() {
    let temp_dir = TempDir::new().unwrap();
    let path = temp_dir.path().join("header_digest.dump");
    write_sample(&path);

    // First byte of the stored header digest follows the 'H' marker
    flip_byte(&path, (HEADER_OFFSET - 8 - 20) as u64);

    let err = DumpReader::open(&path).unwrap_err();
    assert!(matches!(err, DumpError::HeaderChecksumMismatch { .. }));
    assert!(err.is_integrity());
}

#[test]
fn test_segment_marker_damage() {
    let temp_dir = TempDir::new().unwrap();
    let path = temp_dir.path().join("marker.dump");
    let first = write_sample(&path);

    flip_byte(&path, first);

    let mut blocks = DumpReader::open(&path).unwrap().blocks();
    let err = blocks.next().unwrap().unwrap_err();
    assert!(matches!(
        err,
        DumpError::MissingDataBlock { index: 0, found } if found == !DATA_BLOCK_MARKER
    ));
    assert!(err.is_format());
}

#[test]
fn test_verify_reports_damage() {
    let temp_dir = TempDir::new().unwrap();
    let path = temp_dir.path().join("verify.dump");
    let first = write_sample(&path);
    assert_eq!(verify_dump(&path).unwrap().chunks, 2);

    // First payload byte
    flip_byte(&path, first + DATA_SEGMENT_PREFIX_SIZE as u64);
    assert!(verify_dump(&path).unwrap_err().is_integrity());
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(24))]

    /// Flipping any byte after the version field makes the dump unreadable.
    #[test]
    fn prop_any_flip_is_detected(seed in any::<u64>()) {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("prop.dump");
        write_sample(&path);

        let len = std::fs::metadata(&path).unwrap().len();
        let start = (HEADER_OFFSET - 29) as u64;
        let offset = start + seed % (len - start);
        flip_byte(&path, offset);

        let result = DumpReader::open(&path).and_then(|reader| {
            reader.blocks().collect::<Result<Vec<_>, _>>()
        });
        prop_assert!(result.is_err(), "flip at offset {} went unnoticed", offset);
    }
}
