//! Durable storage for the vector index and its identifier table.
//!
//! Two artifacts in the index directory, always written together:
//!
//! vectors.bin
//! - Header (47 bytes):
//!   - version: u8 (1)
//!   - model_id: [u8; 32] (SHA256 hash of model name)
//!   - dimensions: u16 (little-endian)
//!   - entry_count: u64 (little-endian)
//!   - checksum: u32 (CRC32 of header fields before checksum)
//! - Entries (repeated, slot order):
//!   - embedding: [f32; dimensions] (little-endian)
//!
//! documents.json
//! - JSON array of identifier strings, same slot order.
//!
//! A load only succeeds when both artifacts are present and agree on the
//! entry count; anything else is corrupt state and must fail loudly.

use std::fs::File;
use std::io::{BufReader, BufWriter, Read, Write};
use std::path::{Path, PathBuf};

use crate::semantic::index::VectorIndex;
use crate::semantic::table::DocumentTable;

/// Current file format version
const FORMAT_VERSION: u8 = 1;

/// Header size in bytes: version(1) + model_id(32) + dimensions(2) + entry_count(8) + checksum(4)
const HEADER_SIZE: usize = 47;

/// Vector artifact file name
const VECTORS_FILE: &str = "vectors.bin";

/// Identifier artifact file name
const DOCUMENTS_FILE: &str = "documents.json";

/// Errors that can occur during storage operations.
#[derive(Debug, thiserror::Error)]
pub enum StorageError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("identifier list is not valid JSON: {0}")]
    Json(#[from] serde_json::Error),

    #[error("invalid file format: {0}")]
    InvalidFormat(String),

    #[error("version mismatch: file version {0}, supported version {1}")]
    VersionMismatch(u8, u8),

    #[error("model mismatch: persisted vectors were produced by a different model")]
    ModelMismatch,

    #[error("checksum mismatch: vector file may be corrupted")]
    ChecksumMismatch,

    #[error("dimension mismatch: expected {expected}, file has {got}")]
    DimensionMismatch { expected: usize, got: usize },

    #[error("persisted state is incomplete: {present} exists without {missing}")]
    MissingCounterpart { present: String, missing: String },

    #[error("persisted artifacts disagree: {vectors} vectors but {identifiers} identifiers")]
    CountMismatch { vectors: usize, identifiers: usize },

    #[error("persisted identifier list repeats {0:?}")]
    DuplicateIdentifier(String),
}

/// Storage manager for the index directory.
pub struct IndexStorage {
    dir: PathBuf,
}

impl IndexStorage {
    /// Create a storage manager rooted at the given directory.
    pub fn new(dir: PathBuf) -> Self {
        Self { dir }
    }

    /// Path of the vector artifact.
    pub fn vectors_path(&self) -> PathBuf {
        self.dir.join(VECTORS_FILE)
    }

    /// Path of the identifier artifact.
    pub fn documents_path(&self) -> PathBuf {
        self.dir.join(DOCUMENTS_FILE)
    }

    /// Load persisted state.
    ///
    /// Returns `Ok(None)` when neither artifact exists (fresh start). One
    /// artifact without the other, an entry-count disagreement, or a damaged
    /// file is corrupt state and fails rather than guessing.
    pub fn load(
        &self,
        expected_model_id: &[u8; 32],
        expected_dimensions: usize,
    ) -> Result<Option<(VectorIndex, DocumentTable)>, StorageError> {
        let vectors_path = self.vectors_path();
        let documents_path = self.documents_path();

        match (vectors_path.exists(), documents_path.exists()) {
            (false, false) => return Ok(None),
            (true, false) => {
                return Err(StorageError::MissingCounterpart {
                    present: VECTORS_FILE.to_string(),
                    missing: DOCUMENTS_FILE.to_string(),
                })
            }
            (false, true) => {
                return Err(StorageError::MissingCounterpart {
                    present: DOCUMENTS_FILE.to_string(),
                    missing: VECTORS_FILE.to_string(),
                })
            }
            (true, true) => {}
        }

        let index = self.read_vectors(&vectors_path, expected_model_id, expected_dimensions)?;
        let table = self.read_documents(&documents_path)?;

        if index.len() != table.len() {
            return Err(StorageError::CountMismatch {
                vectors: index.len(),
                identifiers: table.len(),
            });
        }

        Ok(Some((index, table)))
    }

    /// Save the current state to both artifacts.
    ///
    /// Each artifact is written to a temp file, fsynced, and renamed over
    /// the target, so a reader at rest never sees a torn file. The two
    /// renames themselves are not jointly atomic; a crash between them is
    /// detected as corrupt state on the next load.
    pub fn save(
        &self,
        index: &VectorIndex,
        table: &DocumentTable,
        model_id: &[u8; 32],
    ) -> Result<(), StorageError> {
        self.write_atomically(&self.vectors_path(), |file| {
            self.write_vectors(file, index, model_id)
        })?;
        self.write_atomically(&self.documents_path(), |file| {
            self.write_documents(file, table)
        })?;
        Ok(())
    }

    /// Write one artifact via temp file + fsync + rename.
    fn write_atomically<F>(&self, path: &Path, write: F) -> Result<(), StorageError>
    where
        F: FnOnce(&mut BufWriter<File>) -> Result<(), StorageError>,
    {
        let temp_path = path.with_extension("tmp");

        let result = (|| {
            let file = File::create(&temp_path)?;
            let mut writer = BufWriter::new(file);
            write(&mut writer)?;
            writer.flush()?;
            let file = writer
                .into_inner()
                .map_err(|e| std::io::Error::new(std::io::ErrorKind::Other, e))?;
            file.sync_all()?;
            Ok(())
        })();

        if let Err(e) = result {
            // Clean up temp file on error
            let _ = std::fs::remove_file(&temp_path);
            return Err(e);
        }

        std::fs::rename(&temp_path, path)?;
        Ok(())
    }

    /// Write the vector artifact body.
    fn write_vectors(
        &self,
        writer: &mut BufWriter<File>,
        index: &VectorIndex,
        model_id: &[u8; 32],
    ) -> Result<(), StorageError> {
        let header = Header {
            version: FORMAT_VERSION,
            model_id: *model_id,
            dimensions: index.dimensions() as u16,
            entry_count: index.len() as u64,
        };
        self.write_header(writer, &header)?;

        for &value in index.raw() {
            writer.write_all(&value.to_le_bytes())?;
        }

        Ok(())
    }

    /// Write the identifier artifact body.
    fn write_documents(
        &self,
        writer: &mut BufWriter<File>,
        table: &DocumentTable,
    ) -> Result<(), StorageError> {
        let ids: Vec<&str> = table.identifiers().collect();
        serde_json::to_writer(writer, &ids)?;
        Ok(())
    }

    /// Read and validate the vector artifact.
    fn read_vectors(
        &self,
        path: &Path,
        expected_model_id: &[u8; 32],
        expected_dimensions: usize,
    ) -> Result<VectorIndex, StorageError> {
        let file = File::open(path)?;
        let mut reader = BufReader::new(file);

        let header = self.read_header(&mut reader)?;

        if header.model_id != *expected_model_id {
            return Err(StorageError::ModelMismatch);
        }
        if header.dimensions as usize != expected_dimensions {
            return Err(StorageError::DimensionMismatch {
                expected: expected_dimensions,
                got: header.dimensions as usize,
            });
        }

        let value_count = header.entry_count as usize * header.dimensions as usize;
        let mut data = Vec::with_capacity(value_count);
        for _ in 0..value_count {
            let mut float_bytes = [0u8; 4];
            reader.read_exact(&mut float_bytes)?;
            data.push(f32::from_le_bytes(float_bytes));
        }

        VectorIndex::from_raw(expected_dimensions, data).map_err(|e| {
            StorageError::InvalidFormat(format!("vector data does not match header: {}", e))
        })
    }

    /// Read and validate the identifier artifact.
    fn read_documents(&self, path: &Path) -> Result<DocumentTable, StorageError> {
        let file = File::open(path)?;
        let reader = BufReader::new(file);
        let ids: Vec<String> = serde_json::from_reader(reader)?;

        let mut table = DocumentTable::new();
        for id in ids {
            if table.push(&id).is_none() {
                return Err(StorageError::DuplicateIdentifier(id));
            }
        }
        Ok(table)
    }

    /// Read header from the vector artifact.
    fn read_header(&self, reader: &mut BufReader<File>) -> Result<Header, StorageError> {
        let mut header_bytes = [0u8; HEADER_SIZE];
        reader.read_exact(&mut header_bytes)?;

        let version = header_bytes[0];

        // Version check first
        if version > FORMAT_VERSION {
            return Err(StorageError::VersionMismatch(version, FORMAT_VERSION));
        }

        let mut model_id = [0u8; 32];
        model_id.copy_from_slice(&header_bytes[1..33]);

        let dimensions = u16::from_le_bytes([header_bytes[33], header_bytes[34]]);
        let entry_count = u64::from_le_bytes([
            header_bytes[35],
            header_bytes[36],
            header_bytes[37],
            header_bytes[38],
            header_bytes[39],
            header_bytes[40],
            header_bytes[41],
            header_bytes[42],
        ]);
        let stored_checksum = u32::from_le_bytes([
            header_bytes[43],
            header_bytes[44],
            header_bytes[45],
            header_bytes[46],
        ]);

        // Verify checksum (computed over header without checksum field)
        let computed_checksum = crc32fast::hash(&header_bytes[0..43]);
        if stored_checksum != computed_checksum {
            return Err(StorageError::ChecksumMismatch);
        }

        if dimensions == 0 {
            return Err(StorageError::InvalidFormat(
                "header declares zero dimensions".to_string(),
            ));
        }

        Ok(Header {
            version,
            model_id,
            dimensions,
            entry_count,
        })
    }

    /// Write header to the vector artifact.
    fn write_header(
        &self,
        writer: &mut BufWriter<File>,
        header: &Header,
    ) -> Result<(), StorageError> {
        let mut header_bytes = [0u8; HEADER_SIZE];

        header_bytes[0] = header.version;
        header_bytes[1..33].copy_from_slice(&header.model_id);
        header_bytes[33..35].copy_from_slice(&header.dimensions.to_le_bytes());
        header_bytes[35..43].copy_from_slice(&header.entry_count.to_le_bytes());

        // Compute and store checksum
        let checksum = crc32fast::hash(&header_bytes[0..43]);
        header_bytes[43..47].copy_from_slice(&checksum.to_le_bytes());

        writer.write_all(&header_bytes)?;
        Ok(())
    }
}

/// Vector file header structure.
#[derive(Debug)]
struct Header {
    version: u8,
    model_id: [u8; 32],
    dimensions: u16,
    entry_count: u64,
}
