//! Prometheus text export for batch runs.
//!
//! A batch job exits before anything could scrape it, so instead of an
//! HTTP endpoint the recorder is rendered to a file at the end of the run
//! (the node_exporter textfile collector format).

use metrics_exporter_prometheus::{PrometheusBuilder, PrometheusHandle};
use snafu::prelude::*;
use std::path::{Path, PathBuf};
use tracing::debug;

use crate::error::{MetricsError, PrometheusInitSnafu, WriteTextfileSnafu};

/// Installed recorder plus the file it renders to.
pub struct TextfileExporter {
    handle: PrometheusHandle,
    path: PathBuf,
}

impl TextfileExporter {
    /// Install the global Prometheus recorder.
    pub fn install(path: &Path) -> Result<Self, MetricsError> {
        let handle = PrometheusBuilder::new()
            .install_recorder()
            .context(PrometheusInitSnafu)?;

        Ok(Self {
            handle,
            path: path.to_path_buf(),
        })
    }

    /// Render current metrics, replacing the textfile atomically.
    pub fn flush(&self) -> Result<(), MetricsError> {
        let rendered = self.handle.render();
        let tmp = self.path.with_extension("prom.tmp");
        std::fs::write(&tmp, rendered).context(WriteTextfileSnafu { path: &tmp })?;
        std::fs::rename(&tmp, &self.path).context(WriteTextfileSnafu { path: &self.path })?;
        debug!(path = %self.path.display(), "Wrote metrics textfile");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::emit;
    use crate::metrics::events::RowsSplit;
    use tempfile::TempDir;

    #[test]
    fn test_flush_writes_textfile() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("chunkload.prom");
        let exporter = TextfileExporter::install(&path).unwrap();

        emit!(RowsSplit { count: 42 });
        exporter.flush().unwrap();

        let text = std::fs::read_to_string(&path).unwrap();
        assert!(text.contains("chunkload_rows_split_total"));
        assert!(!dir.path().join("chunkload.prom.tmp").exists());
    }
}
