//! Snapshot file format for the matchup index
//!
//! The builder writes one snapshot per run and the server loads it at
//! startup. Posting lists are gap-encoded, serialized with bincode and
//! optionally LZ4-compressed.
//!
//! Layout:
//! ```text
//! ┌─────────────────────────────────────────┐
//! │ HEADER (32 bytes)                       │
//! │   magic: [u8; 4] = "CLEO"               │
//! │   version: u16                          │
//! │   compression: u8                       │
//! │   flags: u8 (reserved, 0)               │
//! │   body_len: u64                         │
//! │   body_checksum: u32                    │
//! │   built_at: i64 (unix ms)               │
//! │   header_checksum: u32                  │
//! ├─────────────────────────────────────────┤
//! │ BODY (body_len bytes)                   │
//! │   bincode(SnapshotBody), maybe LZ4      │
//! └─────────────────────────────────────────┘
//! ```
//!
//! Encoding is deterministic: decoding a snapshot and encoding it again with
//! the same compression yields identical bytes.

use crate::champion::Champion;
use crate::index::error::{IndexError, IndexResult};
use crate::index::matchup::{ChampionRecord, MatchupIndex};
use crate::index::postings::PostingList;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};

/// Magic bytes for snapshot identification
const SNAPSHOT_MAGIC: [u8; 4] = *b"CLEO";

/// Current snapshot format version
const SNAPSHOT_VERSION: u16 = 1;

/// Header size in bytes
pub const HEADER_SIZE: usize = 32;

/// Body compression
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
#[repr(u8)]
pub enum CompressionType {
    None = 0,
    #[default]
    Lz4 = 1,
}

impl TryFrom<u8> for CompressionType {
    type Error = IndexError;

    fn try_from(value: u8) -> Result<Self, Self::Error> {
        match value {
            0 => Ok(CompressionType::None),
            1 => Ok(CompressionType::Lz4),
            _ => Err(IndexError::InvalidSnapshot(format!(
                "Unknown compression type: {}",
                value
            ))),
        }
    }
}

/// Snapshot file header
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SnapshotHeader {
    pub version: u16,
    pub compression: CompressionType,
    pub body_len: u64,
    pub body_checksum: u32,
    pub built_at: i64,
}

impl SnapshotHeader {
    pub fn to_bytes(&self) -> [u8; HEADER_SIZE] {
        let mut buf = [0u8; HEADER_SIZE];

        buf[0..4].copy_from_slice(&SNAPSHOT_MAGIC);
        buf[4..6].copy_from_slice(&self.version.to_le_bytes());
        buf[6] = self.compression as u8;
        // byte 7: flags, reserved
        buf[8..16].copy_from_slice(&self.body_len.to_le_bytes());
        buf[16..20].copy_from_slice(&self.body_checksum.to_le_bytes());
        buf[20..28].copy_from_slice(&self.built_at.to_le_bytes());

        let checksum = crc32fast::hash(&buf[0..28]);
        buf[28..32].copy_from_slice(&checksum.to_le_bytes());

        buf
    }

    pub fn from_bytes(buf: &[u8]) -> IndexResult<Self> {
        if buf.len() < HEADER_SIZE {
            return Err(IndexError::Corruption(format!(
                "snapshot is {} bytes, shorter than its header",
                buf.len()
            )));
        }

        let stored = u32::from_le_bytes(le_array(&buf[28..32]));
        let computed = crc32fast::hash(&buf[0..28]);
        if stored != computed {
            return Err(IndexError::Corruption(format!(
                "Header checksum mismatch: stored={}, computed={}",
                stored, computed
            )));
        }

        if buf[0..4] != SNAPSHOT_MAGIC {
            return Err(IndexError::InvalidSnapshot(format!(
                "Invalid magic: {:?}",
                &buf[0..4]
            )));
        }

        let version = u16::from_le_bytes(le_array(&buf[4..6]));
        if version == 0 || version > SNAPSHOT_VERSION {
            return Err(IndexError::InvalidSnapshot(format!(
                "Unsupported version: {}",
                version
            )));
        }

        Ok(Self {
            version,
            compression: CompressionType::try_from(buf[6])?,
            body_len: u64::from_le_bytes(le_array(&buf[8..16])),
            body_checksum: u32::from_le_bytes(le_array(&buf[16..20])),
            built_at: i64::from_le_bytes(le_array(&buf[20..28])),
        })
    }
}

fn le_array<const N: usize>(bytes: &[u8]) -> [u8; N] {
    let mut out = [0u8; N];
    out.copy_from_slice(bytes);
    out
}

/// Serialized body: gap-encoded lists ordered by champion id
#[derive(Debug, Serialize, Deserialize)]
struct SnapshotBody {
    champions: Vec<EncodedChampion>,
    universe: Vec<u32>,
}

#[derive(Debug, Serialize, Deserialize)]
struct EncodedChampion {
    champion: Champion,
    winning: Vec<u32>,
    losing: Vec<u32>,
}

/// Encode an index into snapshot bytes
pub fn encode(index: &MatchupIndex, compression: CompressionType) -> IndexResult<Vec<u8>> {
    let body = SnapshotBody {
        champions: index
            .champions()
            .map(|(champion, record)| EncodedChampion {
                champion,
                winning: record.winning.to_gaps(),
                losing: record.losing.to_gaps(),
            })
            .collect(),
        universe: index.universe().to_gaps(),
    };

    let serialized = bincode::serialize(&body)?;
    let body_bytes = match compression {
        CompressionType::None => serialized,
        CompressionType::Lz4 => lz4_flex::compress_prepend_size(&serialized),
    };

    let header = SnapshotHeader {
        version: SNAPSHOT_VERSION,
        compression,
        body_len: body_bytes.len() as u64,
        body_checksum: crc32fast::hash(&body_bytes),
        built_at: index.built_at(),
    };

    let mut out = Vec::with_capacity(HEADER_SIZE + body_bytes.len());
    out.extend_from_slice(&header.to_bytes());
    out.extend_from_slice(&body_bytes);
    Ok(out)
}

/// Decode snapshot bytes, verifying checksums and index invariants
pub fn decode(bytes: &[u8]) -> IndexResult<MatchupIndex> {
    let header = SnapshotHeader::from_bytes(bytes)?;
    let body_bytes = &bytes[HEADER_SIZE..];

    if body_bytes.len() as u64 != header.body_len {
        return Err(IndexError::Corruption(format!(
            "body is {} bytes, header says {}",
            body_bytes.len(),
            header.body_len
        )));
    }

    let computed = crc32fast::hash(body_bytes);
    if computed != header.body_checksum {
        return Err(IndexError::Corruption(format!(
            "Body checksum mismatch: stored={}, computed={}",
            header.body_checksum, computed
        )));
    }

    let serialized = match header.compression {
        CompressionType::None => body_bytes.to_vec(),
        CompressionType::Lz4 => lz4_flex::decompress_size_prepended(body_bytes)
            .map_err(|e| IndexError::Compression(e.to_string()))?,
    };

    let body: SnapshotBody = bincode::deserialize(&serialized)?;

    let mut champions = BTreeMap::new();
    for entry in body.champions {
        let record = ChampionRecord::new(
            PostingList::from_gaps(&entry.winning)?,
            PostingList::from_gaps(&entry.losing)?,
        );
        if champions.insert(entry.champion, record).is_some() {
            return Err(IndexError::Corruption(format!(
                "champion {} listed twice",
                entry.champion.id()
            )));
        }
    }

    MatchupIndex::new(
        champions,
        PostingList::from_gaps(&body.universe)?,
        header.built_at,
    )
}

/// Write a snapshot file.
///
/// The parent directory must already exist. Data goes to a temporary sibling
/// that is renamed over `path` once fully synced, so a failed write never
/// leaves a partial snapshot behind.
pub fn write_snapshot(
    path: impl AsRef<Path>,
    index: &MatchupIndex,
    compression: CompressionType,
) -> IndexResult<u64> {
    let path = path.as_ref();
    let tmp = temp_sibling(path)?;
    let bytes = encode(index, compression)?;

    let result = (|| -> IndexResult<()> {
        let mut file = BufWriter::new(File::create(&tmp)?);
        file.write_all(&bytes)?;
        file.flush()?;
        file.get_ref().sync_all()?;
        std::fs::rename(&tmp, path)?;
        Ok(())
    })();

    if let Err(e) = result {
        let _ = std::fs::remove_file(&tmp);
        return Err(e);
    }

    Ok(bytes.len() as u64)
}

/// Read and decode a snapshot file
pub fn read_snapshot(path: impl AsRef<Path>) -> IndexResult<MatchupIndex> {
    let path = path.as_ref();
    let bytes = std::fs::read(path).map_err(|source| IndexError::SnapshotUnavailable {
        path: path.to_path_buf(),
        source,
    })?;
    decode(&bytes)
}

fn temp_sibling(path: &Path) -> IndexResult<PathBuf> {
    let file_name = path
        .file_name()
        .ok_or_else(|| IndexError::Destination {
            path: path.to_path_buf(),
            reason: "no file name".to_string(),
        })?
        .to_string_lossy()
        .to_string();

    let parent = match path.parent() {
        Some(p) if !p.as_os_str().is_empty() => p.to_path_buf(),
        _ => PathBuf::from("."),
    };

    if !parent.is_dir() {
        return Err(IndexError::Destination {
            path: path.to_path_buf(),
            reason: format!("directory {:?} does not exist", parent),
        });
    }

    Ok(parent.join(format!(".{}.tmp", file_name)))
}

/// One champion row of the display metadata
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct ChampionSummary {
    pub id: u16,
    pub name: String,
    pub shortname: String,
    pub games: u32,
}

/// Display metadata consumed by front ends; never read back by the server
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct IndexMetadata {
    pub last_updated: i64,
    pub num_games: usize,
    pub champions: Vec<ChampionSummary>,
}

impl IndexMetadata {
    /// Summarize an index: every known champion with its game count
    pub fn from_index(index: &MatchupIndex) -> Self {
        let champions = Champion::all()
            .map(|champion| ChampionSummary {
                id: champion.id(),
                name: champion.name().to_string(),
                shortname: champion.shortname(),
                games: index.games_for(champion) as u32,
            })
            .collect();

        Self {
            last_updated: index.built_at() / 1000,
            num_games: index.total(),
            champions,
        }
    }
}

/// Write the JSON metadata summary next to a snapshot
pub fn write_metadata(path: impl AsRef<Path>, index: &MatchupIndex) -> IndexResult<()> {
    let path = path.as_ref();
    if let Some(parent) = path.parent() {
        if !parent.as_os_str().is_empty() {
            std::fs::create_dir_all(parent)?;
        }
    }

    let file = BufWriter::new(File::create(path)?);
    serde_json::to_writer(file, &IndexMetadata::from_index(index))?;
    Ok(())
}
