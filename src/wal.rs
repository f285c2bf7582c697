use std::fs::{self, File, OpenOptions};
use std::io::{self, BufReader, BufWriter, Read, Write};
use std::path::{Path, PathBuf};

use crate::model::Event;

/// Frame one event as `[u32 len][bincode payload][u32 crc32]`, little-endian.
/// Returns the number of bytes written.
fn write_record(writer: &mut impl Write, event: &Event) -> io::Result<u64> {
    let payload =
        bincode::serialize(event).map_err(|e| io::Error::new(io::ErrorKind::InvalidData, e))?;
    let len = u32::try_from(payload.len())
        .map_err(|_| io::Error::new(io::ErrorKind::InvalidData, "record too large"))?;
    writer.write_all(&len.to_le_bytes())?;
    writer.write_all(&payload)?;
    writer.write_all(&crc32fast::hash(&payload).to_le_bytes())?;
    Ok(8 + payload.len() as u64)
}

/// Read the next framed record. `Ok(None)` marks the usable end of the log:
/// clean EOF, a torn tail from a crash, or a record failing its checksum.
fn read_record(reader: &mut impl Read) -> io::Result<Option<Event>> {
    let mut word = [0u8; 4];
    if !read_or_eof(reader, &mut word)? {
        return Ok(None);
    }
    let mut payload = vec![0u8; u32::from_le_bytes(word) as usize];
    if !read_or_eof(reader, &mut payload)? || !read_or_eof(reader, &mut word)? {
        return Ok(None);
    }
    if u32::from_le_bytes(word) != crc32fast::hash(&payload) {
        return Ok(None);
    }
    Ok(bincode::deserialize(&payload).ok())
}

fn read_or_eof(reader: &mut impl Read, buf: &mut [u8]) -> io::Result<bool> {
    match reader.read_exact(buf) {
        Ok(()) => Ok(true),
        Err(e) if e.kind() == io::ErrorKind::UnexpectedEof => Ok(false),
        Err(e) => Err(e),
    }
}

/// Append-only booking journal on disk.
///
/// Every provider, pattern, exception and booking change is one record; the
/// in-memory state is rebuilt by replaying the file front to back.
///
/// Appends are buffered and become durable at `commit`. Until then they can
/// be thrown away with `discard_uncommitted`, which also cuts the file back
/// to its last committed length.
pub struct Wal {
    writer: BufWriter<File>,
    path: PathBuf,
    /// File length after the last successful commit.
    committed_len: u64,
    /// Bytes buffered or written since then.
    pending_bytes: u64,
    committed_appends: u64,
    appends_since_compact: u64,
    /// A discard failed; the tail of the file is suspect until one succeeds.
    dirty: bool,
}

impl Wal {
    pub fn open(path: &Path) -> io::Result<Self> {
        let file = OpenOptions::new().create(true).append(true).open(path)?;
        let committed_len = file.metadata()?.len();
        Ok(Self {
            writer: BufWriter::new(file),
            path: path.to_path_buf(),
            committed_len,
            pending_bytes: 0,
            committed_appends: 0,
            appends_since_compact: 0,
            dirty: false,
        })
    }

    #[cfg(test)]
    pub fn append(&mut self, event: &Event) -> io::Result<()> {
        self.append_buffered(event)?;
        self.commit()
    }

    /// Buffer a record without syncing; `commit` makes the batch durable.
    pub fn append_buffered(&mut self, event: &Event) -> io::Result<()> {
        if self.dirty {
            self.discard_uncommitted()?;
        }
        self.pending_bytes += write_record(&mut self.writer, event)?;
        self.appends_since_compact += 1;
        Ok(())
    }

    /// Flush and fsync everything appended since the last commit. On failure
    /// the uncommitted records are discarded, so none of them can reach the
    /// file with a later batch.
    pub fn commit(&mut self) -> io::Result<()> {
        match self.flush_sync() {
            Ok(()) => {
                self.committed_len += self.pending_bytes;
                self.pending_bytes = 0;
                self.committed_appends = self.appends_since_compact;
                Ok(())
            }
            Err(e) => {
                if let Err(discard) = self.discard_uncommitted() {
                    tracing::error!("journal rollback after failed flush failed: {discard}");
                }
                Err(e)
            }
        }
    }

    /// Drop buffered records and truncate anything that already reached the
    /// file since the last commit.
    pub fn discard_uncommitted(&mut self) -> io::Result<()> {
        self.dirty = true;
        let file = OpenOptions::new().append(true).open(&self.path)?;
        let stale = std::mem::replace(&mut self.writer, BufWriter::new(file));
        // into_parts hands back the unwritten buffer instead of flushing it on drop
        let _ = stale.into_parts();
        let file = self.writer.get_ref();
        file.set_len(self.committed_len)?;
        file.sync_all()?;
        self.pending_bytes = 0;
        self.appends_since_compact = self.committed_appends;
        self.dirty = false;
        Ok(())
    }

    fn flush_sync(&mut self) -> io::Result<()> {
        self.writer.flush()?;
        self.writer.get_ref().sync_all()
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn compact_path(path: &Path) -> PathBuf {
        path.with_extension("wal.tmp")
    }

    /// Write the compacted journal next to the live one and fsync it.
    pub fn write_compact_file(path: &Path, events: &[Event]) -> io::Result<()> {
        let mut writer = BufWriter::new(File::create(Self::compact_path(path))?);
        for event in events {
            write_record(&mut writer, event)?;
        }
        writer.flush()?;
        writer.get_ref().sync_all()
    }

    /// Rename the compacted journal over the live one and reopen for appends.
    pub fn swap_compact_file(&mut self) -> io::Result<()> {
        self.writer.flush()?;
        fs::rename(Self::compact_path(&self.path), &self.path)?;
        let file = OpenOptions::new().create(true).append(true).open(&self.path)?;
        self.committed_len = file.metadata()?.len();
        self.writer = BufWriter::new(file);
        self.pending_bytes = 0;
        self.committed_appends = 0;
        self.appends_since_compact = 0;
        self.dirty = false;
        Ok(())
    }

    #[cfg(test)]
    pub fn compact(&mut self, events: &[Event]) -> io::Result<()> {
        Self::write_compact_file(&self.path, events)?;
        self.swap_compact_file()
    }

    pub fn appends_since_compact(&self) -> u64 {
        self.appends_since_compact
    }

    /// All intact records, in order. A missing file is an empty journal.
    pub fn replay(path: &Path) -> io::Result<Vec<Event>> {
        let file = match File::open(path) {
            Ok(f) => f,
            Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(Vec::new()),
            Err(e) => return Err(e),
        };
        let mut reader = BufReader::new(file);
        let mut events = Vec::new();
        while let Some(event) = read_record(&mut reader)? {
            events.push(event);
        }
        Ok(events)
    }
}
