//! CSV ledger backend
//!
//! Videos live in the configured file, playlists in a sibling
//! `<stem>.playlists.csv`. Both files are append-only: an upsert adds a row
//! and lookups take the last row for a key. Rows are never rewritten, so an
//! interrupted run loses at most the row being written: a torn final row is
//! skipped on read and cut off before the next append.

use async_trait::async_trait;
use csv::{ReaderBuilder, WriterBuilder};
use serde::de::DeserializeOwned;
use serde::Serialize;
use std::collections::BTreeMap;
use std::fs::{self, OpenOptions};
use std::io::{ErrorKind, Write};
use std::path::{Path, PathBuf};
use tokio::sync::Mutex;
use tracing::{debug, instrument, warn};

use crate::error::{LedgerError, Result};
use crate::models::{PlaylistRecord, VideoRecord};
use crate::Ledger;

pub const VIDEO_HEADERS: [&str; 4] = ["id", "title", "playlist_id", "file_path"];
pub const PLAYLIST_HEADERS: [&str; 2] = ["id", "name"];

/// Ledger stored as two delimited-text files
///
/// Access from this process is serialised; the files must not be shared
/// with another running uploader.
pub struct CsvLedger {
    videos_path: PathBuf,
    playlists_path: PathBuf,
    lock: Mutex<()>,
}

impl CsvLedger {
    /// Open the ledger at `path`, writing headers into missing or empty files.
    ///
    /// # Errors
    ///
    /// [`LedgerError::Corrupt`] if an existing file has a different header.
    pub async fn open(path: &Path) -> Result<Self> {
        let videos_path = path.to_path_buf();
        let playlists_path = playlists_path_for(path);

        let (videos, playlists) = (videos_path.clone(), playlists_path.clone());
        blocking(move || {
            ensure_table(&videos, &VIDEO_HEADERS)?;
            ensure_table(&playlists, &PLAYLIST_HEADERS)
        })
        .await?;

        debug!(
            videos = %videos_path.display(),
            playlists = %playlists_path.display(),
            "CSV ledger ready"
        );

        Ok(Self {
            videos_path,
            playlists_path,
            lock: Mutex::new(()),
        })
    }

    pub fn videos_path(&self) -> &Path {
        &self.videos_path
    }

    pub fn playlists_path(&self) -> &Path {
        &self.playlists_path
    }
}

#[async_trait]
impl Ledger for CsvLedger {
    async fn find_video(&self, file_path: &str) -> Result<Option<VideoRecord>> {
        let _guard = self.lock.lock().await;
        let path = self.videos_path.clone();
        let key = file_path.to_string();

        blocking(move || {
            let rows = read_table::<VideoRecord>(&path)?.rows;
            Ok(rows.into_iter().rev().find(|row| row.file_path == key))
        })
        .await
    }

    #[instrument(skip(self, record), fields(file_path = %record.file_path))]
    async fn upsert_video(&self, record: &VideoRecord) -> Result<()> {
        let _guard = self.lock.lock().await;
        let path = self.videos_path.clone();
        let record = record.clone();

        let appended = blocking(move || {
            let table: Table<VideoRecord> = read_table(&path)?;
            let latest = table.rows.iter().rev().find(|row| row.file_path == record.file_path);
            if latest == Some(&record) && table.tail == Tail::Clean {
                return Ok(false);
            }
            append_row(&path, &record, table.tail)?;
            Ok(true)
        })
        .await?;

        debug!(appended, "Video recorded");
        Ok(())
    }

    async fn find_playlist(&self, name: &str) -> Result<Option<PlaylistRecord>> {
        let _guard = self.lock.lock().await;
        let path = self.playlists_path.clone();
        let key = name.to_string();

        blocking(move || {
            let rows = read_table::<PlaylistRecord>(&path)?.rows;
            Ok(rows.into_iter().rev().find(|row| row.name == key))
        })
        .await
    }

    #[instrument(skip(self, record), fields(name = %record.name))]
    async fn upsert_playlist(&self, record: &PlaylistRecord) -> Result<()> {
        let _guard = self.lock.lock().await;
        let path = self.playlists_path.clone();
        let record = record.clone();

        let appended = blocking(move || {
            let table: Table<PlaylistRecord> = read_table(&path)?;
            let latest = table.rows.iter().rev().find(|row| row.name == record.name);
            if latest == Some(&record) && table.tail == Tail::Clean {
                return Ok(false);
            }
            append_row(&path, &record, table.tail)?;
            Ok(true)
        })
        .await?;

        debug!(appended, "Playlist recorded");
        Ok(())
    }

    async fn list_videos(&self) -> Result<Vec<VideoRecord>> {
        let _guard = self.lock.lock().await;
        let path = self.videos_path.clone();

        blocking(move || {
            let rows = read_table::<VideoRecord>(&path)?.rows;
            let latest: BTreeMap<String, VideoRecord> = rows
                .into_iter()
                .map(|row| (row.file_path.clone(), row))
                .collect();
            Ok(latest.into_values().collect())
        })
        .await
    }

    async fn list_playlists(&self) -> Result<Vec<PlaylistRecord>> {
        let _guard = self.lock.lock().await;
        let path = self.playlists_path.clone();

        blocking(move || {
            let rows = read_table::<PlaylistRecord>(&path)?.rows;
            let latest: BTreeMap<String, PlaylistRecord> = rows
                .into_iter()
                .map(|row| (row.name.clone(), row))
                .collect();
            Ok(latest.into_values().collect())
        })
        .await
    }
}

/// `ledger.csv` -> `ledger.playlists.csv`
fn playlists_path_for(path: &Path) -> PathBuf {
    let stem = path
        .file_stem()
        .map(|stem| stem.to_string_lossy().into_owned())
        .unwrap_or_else(|| "uploader_ledger".to_string());
    path.with_file_name(format!("{}.playlists.csv", stem))
}

async fn blocking<T, F>(work: F) -> Result<T>
where
    T: Send + 'static,
    F: FnOnce() -> Result<T> + Send + 'static,
{
    tokio::task::spawn_blocking(work)
        .await
        .map_err(|e| LedgerError::Task(e.to_string()))?
}

fn ensure_table(path: &Path, headers: &[&str]) -> Result<()> {
    let is_empty = match fs::metadata(path) {
        Ok(metadata) => metadata.len() == 0,
        Err(e) if e.kind() == ErrorKind::NotFound => true,
        Err(e) => return Err(e.into()),
    };

    if is_empty {
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(parent)?;
        }
        let mut writer = WriterBuilder::new().from_path(path)?;
        writer.write_record(headers)?;
        writer.flush()?;
        return Ok(());
    }

    let mut reader = ReaderBuilder::new().has_headers(true).from_path(path)?;
    let found = reader.headers()?;
    if !found.iter().eq(headers.iter().copied()) {
        return Err(LedgerError::Corrupt {
            path: path.to_path_buf(),
            line: 1,
            message: format!(
                "expected header `{}`, found `{}`",
                headers.join(","),
                found.iter().collect::<Vec<_>>().join(",")
            ),
        });
    }

    Ok(())
}

/// How the file ends after its last complete row.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Tail {
    Clean,
    /// The final row is intact but lacks its line terminator.
    MissingNewline,
    /// The final row was cut short; the file is valid up to this offset.
    Torn(u64),
}

struct Table<T> {
    rows: Vec<T>,
    tail: Tail,
}

fn read_table<T: DeserializeOwned>(path: &Path) -> Result<Table<T>> {
    let data = fs::read(path)?;
    let complete = match data.last() {
        None | Some(b'\n') => data.len(),
        Some(_) => data
            .iter()
            .rposition(|&b| b == b'\n')
            .map(|pos| pos + 1)
            .unwrap_or(0),
    };

    let corrupt = |e: csv::Error| LedgerError::Corrupt {
        path: path.to_path_buf(),
        line: e.position().map(|p| p.line()).unwrap_or(0),
        message: e.to_string(),
    };

    let mut reader = ReaderBuilder::new()
        .has_headers(true)
        .from_reader(&data[..complete]);
    let headers = reader.headers().map_err(corrupt)?.clone();
    let mut rows = Vec::new();
    for result in reader.deserialize() {
        rows.push(result.map_err(corrupt)?);
    }

    if complete == data.len() {
        return Ok(Table {
            rows,
            tail: Tail::Clean,
        });
    }

    let mut tail_reader = ReaderBuilder::new()
        .has_headers(false)
        .from_reader(&data[complete..]);
    let parsed = tail_reader
        .records()
        .next()
        .and_then(|record| record.ok())
        .and_then(|record| record.deserialize::<T>(Some(&headers)).ok());

    let tail = match parsed {
        Some(row) => {
            rows.push(row);
            Tail::MissingNewline
        }
        None => {
            warn!(
                path = %path.display(),
                bytes = data.len() - complete,
                "Skipping incomplete final row"
            );
            Tail::Torn(complete as u64)
        }
    };

    Ok(Table { rows, tail })
}

fn append_row<T: Serialize>(path: &Path, row: &T, tail: Tail) -> Result<()> {
    let mut file = OpenOptions::new().append(true).open(path)?;
    match tail {
        Tail::Clean => {}
        Tail::MissingNewline => file.write_all(b"\n")?,
        Tail::Torn(valid_len) => file.set_len(valid_len)?,
    }

    let mut writer = WriterBuilder::new().has_headers(false).from_writer(file);
    writer.serialize(row)?;
    writer.flush()?;
    Ok(())
}
