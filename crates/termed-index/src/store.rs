//! Durable storage of committed documents.
//!
//! A directory store keeps one file, `segments.json`, holding the commit
//! generation and every stored document. Commits write a temp file, sync it
//! and rename it over the old one, so a crash leaves either the previous or
//! the new commit point. The memory store discards commits.

use crate::error::{IndexError, Result};
use serde::{Deserialize, Serialize};
use std::fs::File;
use std::io::{BufReader, BufWriter, Write};
use std::path::{Path, PathBuf};
use termed_core::Document;

pub const COMMIT_FILE: &str = "segments.json";
const COMMIT_TEMP_FILE: &str = "segments.json.tmp";

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum IndexLocation {
    Memory,
    Directory(PathBuf),
}

impl IndexLocation {
    pub fn from_directory(directory: Option<&Path>) -> Self {
        match directory {
            Some(dir) => IndexLocation::Directory(dir.to_path_buf()),
            None => IndexLocation::Memory,
        }
    }
}

/// The last durable state of an index.
#[derive(Debug, Default, Deserialize)]
pub struct CommitPoint {
    pub generation: u64,
    pub documents: Vec<Document>,
}

#[derive(Serialize)]
struct CommitPointRef<'a> {
    generation: u64,
    documents: Vec<&'a Document>,
}

#[derive(Debug, Clone)]
pub(crate) struct Store {
    location: IndexLocation,
}

impl Store {
    /// Open the store, returning the last commit point if there is one.
    pub(crate) fn open(location: IndexLocation) -> Result<(Self, Option<CommitPoint>)> {
        let commit = match &location {
            IndexLocation::Memory => None,
            IndexLocation::Directory(dir) => {
                std::fs::create_dir_all(dir).map_err(IndexError::io("create index directory"))?;
                read_commit(&dir.join(COMMIT_FILE))?
            }
        };
        Ok((Self { location }, commit))
    }

    pub(crate) fn location(&self) -> &IndexLocation {
        &self.location
    }

    pub(crate) fn write<'a>(&self, generation: u64, documents: impl Iterator<Item = &'a Document>) -> Result<()> {
        let IndexLocation::Directory(dir) = &self.location else {
            return Ok(());
        };

        let temp = dir.join(COMMIT_TEMP_FILE);
        let point = CommitPointRef { generation, documents: documents.collect() };

        let file = File::create(&temp).map_err(IndexError::io("create commit file"))?;
        let mut writer = BufWriter::new(file);
        serde_json::to_writer(&mut writer, &point).map_err(IndexError::persist("write commit file"))?;
        writer.flush().map_err(IndexError::io("flush commit file"))?;
        writer
            .get_ref()
            .sync_all()
            .map_err(IndexError::io("sync commit file"))?;
        std::fs::rename(&temp, dir.join(COMMIT_FILE)).map_err(IndexError::io("publish commit file"))?;

        tracing::debug!(generation, documents = point.documents.len(), dir = %dir.display(), "store: committed");
        Ok(())
    }
}

fn read_commit(path: &Path) -> Result<Option<CommitPoint>> {
    let file = match File::open(path) {
        Ok(file) => file,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(None),
        Err(e) => return Err(IndexError::Io { op: "open commit file", source: e }),
    };
    let point: CommitPoint =
        serde_json::from_reader(BufReader::new(file)).map_err(IndexError::persist("read commit file"))?;
    tracing::info!(generation = point.generation, documents = point.documents.len(), "store: restored commit point");
    Ok(Some(point))
}
