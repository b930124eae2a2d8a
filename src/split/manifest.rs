//! Split completion marker.
//!
//! A successful split run leaves `_SPLIT_COMPLETE.json` in the output
//! directory. The load pipeline checks for it before importing, so a
//! partial or failed split is never loaded.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use snafu::prelude::*;
use std::fs;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};

use crate::error::{
    EncodeManifestSnafu, InvalidSplitMarkerSnafu, LoadError, MissingSplitMarkerSnafu, SplitError,
    WriteManifestSnafu,
};

/// File name of the marker inside the output directory.
pub const MARKER_FILE: &str = "_SPLIT_COMPLETE.json";

/// One input file recorded in the marker.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ManifestEntry {
    pub source: PathBuf,
    pub base: String,
    pub rows: usize,
    pub chunk_size: usize,
    pub chunks: usize,
}

/// Contents of the completion marker.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SplitManifest {
    pub completed_at: DateTime<Utc>,
    pub files: Vec<ManifestEntry>,
}

impl SplitManifest {
    pub fn new(files: Vec<ManifestEntry>) -> Self {
        Self {
            completed_at: Utc::now(),
            files,
        }
    }

    /// Marker path for an output directory.
    pub fn path_in(output_dir: &Path) -> PathBuf {
        output_dir.join(MARKER_FILE)
    }

    /// Write the marker via a temp file and rename.
    pub fn write(&self, output_dir: &Path) -> Result<PathBuf, SplitError> {
        let path = Self::path_in(output_dir);
        let tmp = path.with_extension("json.tmp");

        let json = serde_json::to_vec_pretty(self).context(EncodeManifestSnafu)?;
        fs::write(&tmp, json).context(WriteManifestSnafu { path: &tmp })?;
        fs::rename(&tmp, &path).context(WriteManifestSnafu { path: &path })?;

        Ok(path)
    }

    /// Remove the marker if present. Returns whether one was removed.
    pub fn remove(output_dir: &Path) -> Result<bool, SplitError> {
        let path = Self::path_in(output_dir);
        match fs::remove_file(&path) {
            Ok(()) => Ok(true),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(false),
            Err(source) => Err(SplitError::WriteManifest { path, source }),
        }
    }

    /// Read the marker, failing if the split has not completed.
    pub fn read(output_dir: &Path) -> Result<Self, LoadError> {
        let path = Self::path_in(output_dir);
        let bytes = match fs::read(&path) {
            Ok(bytes) => bytes,
            Err(_) => return MissingSplitMarkerSnafu { path }.fail(),
        };
        serde_json::from_slice(&bytes).context(InvalidSplitMarkerSnafu { path })
    }
}
