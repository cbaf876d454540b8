//! Sorted tile files.
//!
//! A partition is stored as a data file and an index file next to it:
//!
//! ```text
//! part-00003         "TPYR" version:u8 { tile_id:u64 len:u32 bytes[len] }*
//! part-00003.index   "TPYX" version:u8 { tile_id:u64 offset:u64 }*
//! ```
//!
//! All integers are little endian. Records are written in strictly ascending
//! tile id order, which lets readers binary-search the index.
//!
//! Writers stage both files under a `.tmp` suffix and rename them into place
//! on [`TileFileWriter::finish`], so a reader never sees a partial partition.

use crate::error::Result;
use crate::raster::{codec, RasterPayload};
use crate::tile::TileId;
use std::fs::{self, File};
use std::io::{self, BufWriter, Write};
use std::path::{Path, PathBuf};

pub const DATA_MAGIC: &[u8; 4] = b"TPYR";
pub const INDEX_MAGIC: &[u8; 4] = b"TPYX";
pub const FORMAT_VERSION: u8 = 1;

const HEADER_LEN: u64 = 5;
const RECORD_HEADER_LEN: usize = 12;
const INDEX_ENTRY_LEN: usize = 16;

/// Path of the index file belonging to a data file.
pub fn index_path(data_path: &Path) -> PathBuf {
    let mut name = data_path.as_os_str().to_owned();
    name.push(".index");
    PathBuf::from(name)
}

fn staging_path(path: &Path) -> PathBuf {
    let mut name = path.as_os_str().to_owned();
    name.push(".tmp");
    PathBuf::from(name)
}

fn invalid_data(msg: String) -> io::Error {
    io::Error::new(io::ErrorKind::InvalidData, msg)
}

// =============================================================================
// Writer
// =============================================================================

/// What a finished tile file holds.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FileSummary {
    pub records: usize,
    /// Size of the data file in bytes
    pub bytes: u64,
}

/// Appends compressed tile records to a staged data file and its index.
///
/// The caller guarantees ascending ids. Dropping the writer without
/// [`finish`](Self::finish) leaves only staging files behind;
/// [`discard`](Self::discard) removes them.
#[derive(Debug)]
pub struct TileFileWriter {
    path: PathBuf,
    data: BufWriter<File>,
    index: BufWriter<File>,
    offset: u64,
    records: usize,
    compression: u32,
}

impl TileFileWriter {
    /// Starts a new tile file that will be published at `path`.
    pub fn create(path: &Path, compression: u32) -> Result<Self> {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }
        let mut data = BufWriter::new(File::create(staging_path(path))?);
        data.write_all(DATA_MAGIC)?;
        data.write_all(&[FORMAT_VERSION])?;

        let mut index = BufWriter::new(File::create(staging_path(&index_path(path)))?);
        index.write_all(INDEX_MAGIC)?;
        index.write_all(&[FORMAT_VERSION])?;

        Ok(Self {
            path: path.to_path_buf(),
            data,
            index,
            offset: HEADER_LEN,
            records: 0,
            compression: compression.min(9),
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn records(&self) -> usize {
        self.records
    }

    /// Compresses and appends one record. Returns the compressed length.
    pub fn append(&mut self, id: TileId, payload: &RasterPayload) -> Result<usize> {
        let body = codec::compress(payload, self.compression)?;
        let len = u32::try_from(body.len())
            .map_err(|_| invalid_data(format!("record for tile {} exceeds 4 GiB", id)))?;

        self.data.write_all(&id.value().to_le_bytes())?;
        self.data.write_all(&len.to_le_bytes())?;
        self.data.write_all(&body)?;

        self.index.write_all(&id.value().to_le_bytes())?;
        self.index.write_all(&self.offset.to_le_bytes())?;

        self.offset += (RECORD_HEADER_LEN + body.len()) as u64;
        self.records += 1;
        Ok(body.len())
    }

    /// Flushes both files and publishes them by rename.
    pub fn finish(self) -> Result<FileSummary> {
        let data = self.data.into_inner().map_err(|e| e.into_error())?;
        data.sync_all()?;
        let index = self.index.into_inner().map_err(|e| e.into_error())?;
        index.sync_all()?;

        let index_file = index_path(&self.path);
        fs::rename(staging_path(&index_file), &index_file)?;
        fs::rename(staging_path(&self.path), &self.path)?;
        Ok(FileSummary {
            records: self.records,
            bytes: self.offset,
        })
    }

    /// Deletes the staging files without publishing anything.
    pub fn discard(self) -> Result<()> {
        let Self { path, data, index, .. } = self;
        drop(data);
        drop(index);
        remove_if_exists(&staging_path(&path))?;
        remove_if_exists(&staging_path(&index_path(&path)))?;
        Ok(())
    }
}

fn remove_if_exists(path: &Path) -> io::Result<()> {
    match fs::remove_file(path) {
        Err(e) if e.kind() != io::ErrorKind::NotFound => Err(e),
        _ => Ok(()),
    }
}

// =============================================================================
// Reader
// =============================================================================

/// Random and sequential access to a published tile file.
#[derive(Debug)]
pub struct TileFileReader {
    path: PathBuf,
    data: Vec<u8>,
    index: Vec<(TileId, u64)>,
}

impl TileFileReader {
    /// Loads a tile file and its index.
    pub fn open(path: &Path) -> Result<Self> {
        let data = fs::read(path)?;
        check_header(&data, DATA_MAGIC, path)?;

        let index_file = index_path(path);
        let raw_index = fs::read(&index_file)?;
        check_header(&raw_index, INDEX_MAGIC, &index_file)?;

        let entries = &raw_index[HEADER_LEN as usize..];
        if entries.len() % INDEX_ENTRY_LEN != 0 {
            return Err(invalid_data(format!("truncated index {}", index_file.display())).into());
        }
        let mut index = Vec::with_capacity(entries.len() / INDEX_ENTRY_LEN);
        for entry in entries.chunks_exact(INDEX_ENTRY_LEN) {
            let id = TileId(read_u64(&entry[..8]));
            let offset = read_u64(&entry[8..]);
            if let Some(&(previous, _)) = index.last() {
                if id <= previous {
                    return Err(invalid_data(format!(
                        "index {} is not sorted at tile {}",
                        index_file.display(),
                        id
                    ))
                    .into());
                }
            }
            let record_end = offset.checked_add(RECORD_HEADER_LEN as u64);
            if record_end.map_or(true, |end| end > data.len() as u64) {
                return Err(invalid_data(format!(
                    "index {} points past the end of the data file",
                    index_file.display()
                ))
                .into());
            }
            index.push((id, offset));
        }

        Ok(Self {
            path: path.to_path_buf(),
            data,
            index,
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn len(&self) -> usize {
        self.index.len()
    }

    pub fn is_empty(&self) -> bool {
        self.index.is_empty()
    }

    /// Tile ids in ascending order.
    pub fn keys(&self) -> impl Iterator<Item = TileId> + '_ {
        self.index.iter().map(|(id, _)| *id)
    }

    /// Looks up one tile by id.
    pub fn get(&self, id: TileId) -> Result<Option<RasterPayload>> {
        match self.index.binary_search_by_key(&id, |(key, _)| *key) {
            Ok(pos) => self.read_at(self.index[pos]).map(Some),
            Err(_) => Ok(None),
        }
    }

    /// All records in ascending id order.
    pub fn iter(&self) -> impl Iterator<Item = Result<(TileId, RasterPayload)>> + '_ {
        self.index
            .iter()
            .map(move |&entry| self.read_at(entry).map(|payload| (entry.0, payload)))
    }

    fn read_at(&self, (id, offset): (TileId, u64)) -> Result<RasterPayload> {
        let start = offset as usize;
        let stored = TileId(read_u64(&self.data[start..start + 8]));
        if stored != id {
            return Err(invalid_data(format!(
                "{} holds tile {} where the index expects {}",
                self.path.display(),
                stored,
                id
            ))
            .into());
        }
        let mut len = [0u8; 4];
        len.copy_from_slice(&self.data[start + 8..start + RECORD_HEADER_LEN]);
        let body_start = start + RECORD_HEADER_LEN;
        let body_end = body_start + u32::from_le_bytes(len) as usize;
        let body = self.data.get(body_start..body_end).ok_or_else(|| {
            invalid_data(format!("truncated record for tile {} in {}", id, self.path.display()))
        })?;
        codec::decompress(body)
    }
}

fn check_header(bytes: &[u8], magic: &[u8; 4], path: &Path) -> Result<()> {
    if bytes.len() < HEADER_LEN as usize || &bytes[..4] != magic {
        return Err(invalid_data(format!("{} is not a tile file", path.display())).into());
    }
    if bytes[4] != FORMAT_VERSION {
        return Err(invalid_data(format!(
            "{} has format version {}, expected {}",
            path.display(),
            bytes[4],
            FORMAT_VERSION
        ))
        .into());
    }
    Ok(())
}

fn read_u64(bytes: &[u8]) -> u64 {
    let mut buf = [0u8; 8];
    buf.copy_from_slice(&bytes[..8]);
    u64::from_le_bytes(buf)
}
