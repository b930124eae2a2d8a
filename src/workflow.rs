//! Entry points for the `split`, `load` and `run` commands.

use tracing::{error, info};

use crate::config::Config;
use crate::error::PipelineError;
use crate::load::{LoadPipeline, LoadReport, LoadRequest};
use crate::split::{SplitPipeline, SplitReport};

/// Split every input file. Any failed file or chunk makes this an error.
pub async fn split(config: &Config, dry_run: bool) -> Result<SplitReport, PipelineError> {
    let report = SplitPipeline::new(&config.paths, &config.split)
        .run(dry_run)
        .await?;

    for failure in &report.file_failures {
        error!("Failed file {}: {}", failure.path.display(), failure.error);
    }
    for failure in &report.chunk_failures {
        error!(
            "Failed chunk {} of {} ({}): {}",
            failure.number,
            failure.source_file.display(),
            failure.format.extension(),
            failure.error
        );
    }

    Ok(report.into_result()?)
}

/// Load one dataset. Returns `None` for a dry run.
pub async fn load(
    config: &Config,
    request: &LoadRequest,
) -> Result<Option<LoadReport>, PipelineError> {
    let report = LoadPipeline::new(&config.paths, &config.load)
        .run(request, &config.database)
        .await?;

    if let Some(report) = &report {
        info!(
            "Loaded {} rows into {} from {} file(s)",
            report.total_rows,
            report.table,
            report.files.len()
        );
    }
    Ok(report)
}

/// Split, then load only if the split fully succeeded.
pub async fn split_then_load(
    config: &Config,
    request: &LoadRequest,
) -> Result<Option<LoadReport>, PipelineError> {
    if let Err(e) = split(config, false).await {
        error!("Skipping load of {}: {}", request.dataset, e);
        return Err(e);
    }
    load(config, request).await
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::SplitError;
    use std::fs;
    use tempfile::TempDir;

    fn config(root: &std::path::Path) -> Config {
        let yaml = format!(
            r#"
paths:
  input_dir: {root}/in
  output_dir: {root}/out
  log_dir: {root}/logs
  schema_dir: {root}/schema
database:
  host: 127.0.0.1
  user: etl
  password: ""
  database: warehouse
"#,
            root = root.display()
        );
        let config = Config::parse(&yaml).unwrap();
        config.prepare_dirs().unwrap();
        fs::create_dir_all(&config.paths.input_dir).unwrap();
        config
    }

    #[tokio::test]
    async fn test_failed_split_skips_load() {
        let root = TempDir::new().unwrap();
        let config = config(root.path());
        fs::write(config.paths.input_dir.join("bad.csv"), "a,b\n1\n").unwrap();

        let request = LoadRequest {
            dataset: "accident".into(),
            ..LoadRequest::default()
        };
        let err = split_then_load(&config, &request).await.unwrap_err();
        assert!(matches!(
            err,
            PipelineError::Split {
                source: SplitError::FilesFailed { files: 1, .. }
            }
        ));

        let load_logs = fs::read_dir(&config.paths.log_dir)
            .unwrap()
            .filter(|e| {
                e.as_ref()
                    .unwrap()
                    .file_name()
                    .to_string_lossy()
                    .starts_with("load_")
            })
            .count();
        assert_eq!(load_logs, 0);
    }

    #[tokio::test]
    async fn test_split_reports_rows() {
        let root = TempDir::new().unwrap();
        let config = config(root.path());
        fs::write(config.paths.input_dir.join("t.csv"), "a,b\n1,2\n3,4\n").unwrap();

        let report = split(&config, false).await.unwrap();
        assert_eq!(report.total_rows(), 2);
        assert!(config.paths.output_dir.join("t_1.csv").exists());
    }
}
