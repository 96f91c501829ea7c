use std::fs::{self, File, OpenOptions};
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};
use std::sync::{Mutex, MutexGuard};

use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::error::{FabricError, Result};
use crate::event::LoggedEvent;

/// Flush/sync strategy for the WAL.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum SyncMode {
    /// `fsync` after every write (safest, highest latency).
    EveryWrite,
    /// Flush to the OS and rely on page-cache buffering.
    #[default]
    OsDefault,
}

/// Configuration for the Write-Ahead Log.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct WalConfig {
    #[serde(default)]
    pub sync_mode: SyncMode,
}

/// Header size: 4 bytes length + 4 bytes CRC.
const HEADER_SIZE: usize = 8;

struct WalWriter {
    writer: BufWriter<File>,
    /// Current write offset in the segment file.
    offset: u64,
}

/// Crash-recoverable event log.
///
/// On-disk format, one frame per event:
/// ```text
/// [4 bytes: payload length (little-endian u32)]
/// [4 bytes: CRC32 of payload (little-endian u32)]
/// [N bytes: payload (bincode-serialized LoggedEvent)]
/// ```
///
/// On recovery the file is read front-to-back. Frames that fail the CRC
/// check are skipped; a truncated tail (torn write) ends recovery.
pub struct WriteAheadLog {
    path: PathBuf,
    writer: Mutex<WalWriter>,
    config: WalConfig,
}

impl WriteAheadLog {
    /// Open (or create) a WAL file at the given path.
    pub fn open(path: &Path, config: WalConfig) -> Result<Self> {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }

        let file = OpenOptions::new()
            .create(true)
            .read(true)
            .append(true)
            .open(path)?;

        let offset = file.metadata()?.len();
        let writer = BufWriter::new(file);

        debug!(path = %path.display(), offset, "WAL opened");
        Ok(Self {
            path: path.to_path_buf(),
            writer: Mutex::new(WalWriter { writer, offset }),
            config,
        })
    }

    /// Append a single event. Returns the byte offset of its frame.
    pub fn append(&self, entry: &LoggedEvent) -> Result<u64> {
        let payload =
            bincode::serialize(entry).map_err(|e| FabricError::Serialization(e.to_string()))?;

        let length = u32::try_from(payload.len())
            .map_err(|_| FabricError::Serialization("WAL entry exceeds 4 GiB".into()))?;
        let crc = crc32fast::hash(&payload);

        let mut w = self.lock_writer()?;
        let entry_offset = w.offset;

        w.writer.write_all(&length.to_le_bytes())?;
        w.writer.write_all(&crc.to_le_bytes())?;
        w.writer.write_all(&payload)?;
        w.writer.flush()?;

        if self.config.sync_mode == SyncMode::EveryWrite {
            w.writer.get_ref().sync_all()?;
        }

        w.offset += HEADER_SIZE as u64 + payload.len() as u64;

        debug!(offset = entry_offset, len = payload.len(), id = %entry.id, "WAL append");
        Ok(entry_offset)
    }

    /// Recover all valid entries, in append order.
    pub fn recover(&self) -> Result<Vec<LoggedEvent>> {
        // No frame may be half-written while the file is read.
        let _guard = self.lock_writer()?;
        let bytes = fs::read(&self.path)?;

        let mut entries = Vec::new();
        let mut offset = 0usize;
        loop {
            match read_frame(&bytes[offset..]) {
                Frame::Entry { entry, len } => {
                    entries.push(entry);
                    offset += len;
                }
                Frame::Corrupt { len, reason } => {
                    warn!(offset, reason = %reason, "skipping corrupt WAL frame");
                    offset += len;
                }
                Frame::Torn { reason } => {
                    warn!(offset, file_len = bytes.len(), reason, "torn WAL tail; stopping recovery");
                    break;
                }
                Frame::End => break,
            }
        }

        debug!(recovered = entries.len(), "WAL recovery complete");
        Ok(entries)
    }

    /// Remove all data from the log.
    pub fn truncate(&self) -> Result<()> {
        let mut w = self.lock_writer()?;

        let file = OpenOptions::new()
            .write(true)
            .truncate(true)
            .open(&self.path)?;
        file.sync_all()?;

        // Reopen in append mode so later writes land at the new end.
        let file = OpenOptions::new().read(true).append(true).open(&self.path)?;
        w.writer = BufWriter::new(file);
        w.offset = 0;

        debug!("WAL truncated");
        Ok(())
    }

    /// Current write offset.
    pub fn offset(&self) -> Result<u64> {
        Ok(self.lock_writer()?.offset)
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn lock_writer(&self) -> Result<MutexGuard<'_, WalWriter>> {
        self.writer
            .lock()
            .map_err(|e| FabricError::LockPoisoned(e.to_string()))
    }
}

impl std::fmt::Debug for WriteAheadLog {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("WriteAheadLog")
            .field("path", &self.path)
            .field("config", &self.config)
            .finish()
    }
}

/// One step of decoding the log from some offset.
enum Frame {
    Entry { entry: LoggedEvent, len: usize },
    /// A complete frame whose payload failed the CRC or did not decode.
    Corrupt { len: usize, reason: String },
    /// Bytes that cannot start a complete frame.
    Torn { reason: &'static str },
    End,
}

fn read_frame(buf: &[u8]) -> Frame {
    if buf.is_empty() {
        return Frame::End;
    }
    let Some((header, body)) = buf.split_first_chunk::<HEADER_SIZE>() else {
        return Frame::Torn {
            reason: "partial header",
        };
    };
    let [l0, l1, l2, l3, c0, c1, c2, c3] = *header;
    let len = u32::from_le_bytes([l0, l1, l2, l3]) as usize;
    let expected_crc = u32::from_le_bytes([c0, c1, c2, c3]);

    if len == 0 {
        return Frame::Torn {
            reason: "zero-length frame",
        };
    }
    let Some(payload) = body.get(..len) else {
        return Frame::Torn {
            reason: "partial payload",
        };
    };

    let frame_len = HEADER_SIZE + len;
    let actual_crc = crc32fast::hash(payload);
    if actual_crc != expected_crc {
        return Frame::Corrupt {
            len: frame_len,
            reason: format!("crc mismatch: expected {expected_crc:08x}, got {actual_crc:08x}"),
        };
    }
    match bincode::deserialize::<LoggedEvent>(payload) {
        Ok(entry) => Frame::Entry {
            entry,
            len: frame_len,
        },
        Err(e) => Frame::Corrupt {
            len: frame_len,
            reason: e.to_string(),
        },
    }
}
