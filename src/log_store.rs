// src/log_store.rs
// Append-only local log of every authentication attempt seen at this edge.
//
// Format: `YYYY-MM-DD HH:MM:SS,<uid>,<node_id>,<True|False>,<edge_api_key>`.
// The timestamp is the event time supplied by the node, not wall-clock at
// the edge (spec.md §4.2). Appends and the uploader's truncate-on-ack both
// go through the same lock so truncation is never observed mid-append, and
// `take_for_upload` holds that same lock across the upload call itself so an
// append can never land between the read it uploads and the truncate that
// follows.

use crate::error::Result;
use crate::types::DATE_FORMAT;
use anyhow::Result as AnyResult;
use chrono::NaiveDateTime;
use parking_lot::Mutex;
use std::fs::OpenOptions;
use std::io::{Read, Write};
use std::path::PathBuf;

pub struct AccessLogStore {
    path: PathBuf,
    lock: Mutex<()>,
}

impl AccessLogStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            lock: Mutex::new(()),
        }
    }

    pub fn path(&self) -> &std::path::Path {
        &self.path
    }

    /// Append one decision line. Creates the file on demand if absent.
    pub fn append(&self, date: NaiveDateTime, uid: &str, node_id: &str, result: bool, api_key: &str) -> Result<()> {
        let _guard = self.lock.lock();
        let mut file = OpenOptions::new().create(true).append(true).open(&self.path)?;
        let line = format!(
            "{},{},{},{},{}\n",
            date.format(DATE_FORMAT),
            uid,
            node_id,
            if result { "True" } else { "False" },
            api_key
        );
        file.write_all(line.as_bytes())?;
        Ok(())
    }

    /// Read the whole file as raw bytes (used by the Frequency Analyzer and
    /// the Cloud Uploader). Returns empty if the file does not exist yet.
    pub fn read_all(&self) -> Result<Vec<u8>> {
        let _guard = self.lock.lock();
        self.read_all_locked()
    }

    /// Truncate the file to zero bytes. Only ever called after the origin
    /// acknowledges receipt of the uploaded log.
    pub fn truncate(&self) -> Result<()> {
        let _guard = self.lock.lock();
        self.truncate_locked()
    }

    /// Ensure the file exists (created empty if absent). Missing is not an
    /// error, only a precondition the uploader restores before attempting
    /// an upload.
    pub fn ensure_exists(&self) -> Result<()> {
        let _guard = self.lock.lock();
        OpenOptions::new().create(true).append(true).open(&self.path)?;
        Ok(())
    }

    /// Read the current log contents and pass them to `upload`; truncates
    /// only if `upload` resolves to `Ok(true)`. The file lock is held for
    /// the whole call, including the `await` inside `upload`, so a
    /// concurrent `append` either lands before the read or after the
    /// truncate, never in between.
    pub async fn take_for_upload<F, Fut>(&self, upload: F) -> AnyResult<bool>
    where
        F: FnOnce(Vec<u8>) -> Fut,
        Fut: std::future::Future<Output = AnyResult<bool>>,
    {
        let _guard = self.lock.lock();
        let contents = self.read_all_locked()?;
        let uploaded = upload(contents).await?;
        if uploaded {
            self.truncate_locked()?;
        }
        Ok(uploaded)
    }

    fn read_all_locked(&self) -> Result<Vec<u8>> {
        if !self.path.exists() {
            return Ok(Vec::new());
        }
        let mut file = OpenOptions::new().read(true).open(&self.path)?;
        let mut buf = Vec::new();
        file.read_to_end(&mut buf)?;
        Ok(buf)
    }

    fn truncate_locked(&self) -> Result<()> {
        OpenOptions::new()
            .write(true)
            .create(true)
            .truncate(true)
            .open(&self.path)?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn append_then_read_round_trips_the_line() {
        let dir = tempfile::tempdir().unwrap();
        let store = AccessLogStore::new(dir.path().join("access_log.csv"));
        let date = NaiveDateTime::parse_from_str("2024-05-30 12:00:00", DATE_FORMAT).unwrap();

        store.append(date, "U1", "N1", true, "key123").unwrap();

        let contents = String::from_utf8(store.read_all().unwrap()).unwrap();
        assert_eq!(contents, "2024-05-30 12:00:00,U1,N1,True,key123\n");
    }

    #[test]
    fn read_all_on_absent_file_is_empty() {
        let dir = tempfile::tempdir().unwrap();
        let store = AccessLogStore::new(dir.path().join("does_not_exist.csv"));
        assert!(store.read_all().unwrap().is_empty());
    }

    #[test]
    fn truncate_zeroes_the_file() {
        let dir = tempfile::tempdir().unwrap();
        let store = AccessLogStore::new(dir.path().join("access_log.csv"));
        let date = NaiveDateTime::parse_from_str("2024-05-30 12:00:00", DATE_FORMAT).unwrap();
        store.append(date, "U1", "N1", true, "key123").unwrap();

        store.truncate().unwrap();

        assert!(store.read_all().unwrap().is_empty());
    }
}
