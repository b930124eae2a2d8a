//! Integration tests for chunkload

use async_trait::async_trait;
use chunkload::config::{LoadConfig, PathsConfig, SplitConfig};
use chunkload::error::{DatabaseError, LoadError};
use chunkload::load::{LoadPipeline, LoadRequest, SqlSession};
use chunkload::split::{SplitManifest, SplitPipeline};
use std::fs;
use std::path::Path;
use tempfile::TempDir;

/// Session that answers `LOAD DATA` by counting the data lines of the file.
#[derive(Default)]
struct CountingSession {
    statements: Vec<String>,
}

#[async_trait]
impl SqlSession for CountingSession {
    async fn execute(&mut self, sql: &str) -> Result<u64, DatabaseError> {
        self.statements.push(sql.to_string());
        let Some(rest) = sql.strip_prefix("LOAD DATA LOCAL INFILE '") else {
            return Ok(0);
        };
        let path = rest.split('\'').next().unwrap_or_default();
        let lines = fs::read_to_string(path).map(|t| t.lines().count()).unwrap_or(0);
        Ok(lines.saturating_sub(1) as u64)
    }
}

fn setup() -> (TempDir, PathsConfig) {
    let root = TempDir::new().unwrap();
    let paths = PathsConfig {
        input_dir: root.path().join("in"),
        output_dir: root.path().join("out"),
        log_dir: root.path().join("logs"),
        schema_dir: root.path().join("schema"),
    };
    for dir in [
        &paths.input_dir,
        &paths.output_dir,
        &paths.log_dir,
        &paths.schema_dir,
    ] {
        fs::create_dir_all(dir).unwrap();
    }
    fs::write(
        paths.schema_dir.join("accident.json"),
        r#"{"table": "accident", "columns": {"bcc_acc_id": "INT", "acc_date": "DATE"}}"#,
    )
    .unwrap();
    (root, paths)
}

fn write_accidents(dir: &Path, rows: usize) {
    let mut text = String::from("bcc_acc_id,acc_date\n");
    for i in 0..rows {
        text.push_str(&format!("{i},2024-01-{:02}\n", i % 28 + 1));
    }
    fs::write(dir.join("accident.csv"), text).unwrap();
}

mod pipeline_tests {
    use super::*;

    #[tokio::test]
    async fn test_split_then_load_imports_every_row() {
        let (_root, paths) = setup();
        write_accidents(&paths.input_dir, 15_000);

        let report = SplitPipeline::new(&paths, &SplitConfig::default())
            .run(false)
            .await
            .unwrap()
            .into_result()
            .unwrap();
        assert_eq!(report.total_rows(), 15_000);
        assert!(SplitManifest::path_in(&paths.output_dir).exists());

        let pipeline = LoadPipeline::new(&paths, &LoadConfig::default());
        let plan = pipeline
            .prepare(&LoadRequest {
                dataset: "accident".into(),
                ..LoadRequest::default()
            })
            .unwrap();
        assert_eq!(plan.batch.files.len(), 2);

        let mut session = CountingSession::default();
        let loaded = pipeline.execute(&plan, &mut session).await.unwrap();

        assert_eq!(loaded.total_rows, 15_000);
        assert_eq!(
            loaded.files.iter().map(|f| f.rows).collect::<Vec<_>>(),
            vec![10_000, 5_000]
        );
        assert!(session.statements[0].starts_with("DROP TABLE IF EXISTS accident"));
        assert_eq!(session.statements.last().unwrap(), "COMMIT");
    }

    #[tokio::test]
    async fn test_failed_split_blocks_load() {
        let (_root, paths) = setup();
        write_accidents(&paths.input_dir, 100);
        fs::write(paths.input_dir.join("broken.csv"), "a,b\n1,2,3\n").unwrap();

        let report = SplitPipeline::new(&paths, &SplitConfig::default())
            .run(false)
            .await
            .unwrap();
        assert!(!report.is_success());

        let pipeline = LoadPipeline::new(&paths, &LoadConfig::default());
        let err = pipeline
            .prepare(&LoadRequest {
                dataset: "accident".into(),
                ..LoadRequest::default()
            })
            .unwrap_err();
        assert!(matches!(err, LoadError::MissingSplitMarker { .. }));
    }

    #[tokio::test]
    async fn test_header_only_chunks_are_fatal_for_load() {
        let (_root, paths) = setup();
        fs::write(paths.input_dir.join("accident.csv"), "bcc_acc_id,acc_date\n").unwrap();

        SplitPipeline::new(&paths, &SplitConfig::default())
            .run(false)
            .await
            .unwrap()
            .into_result()
            .unwrap();

        let pipeline = LoadPipeline::new(&paths, &LoadConfig::default());
        let plan = pipeline
            .prepare(&LoadRequest {
                dataset: "accident".into(),
                ..LoadRequest::default()
            })
            .unwrap();
        assert!(plan.batch.is_empty());

        let mut session = CountingSession::default();
        let err = pipeline.execute(&plan, &mut session).await.unwrap_err();
        assert!(matches!(err, LoadError::NoDataImported { .. }));
        assert_eq!(session.statements.last().unwrap(), "ROLLBACK");
    }
}

mod config_tests {
    use chunkload::Config;

    #[test]
    fn test_config_yaml_parsing() {
        let yaml = r#"
paths:
  input_dir: /srv/in
  output_dir: /srv/out
  log_dir: /srv/logs
  schema_dir: /srv/schema
database:
  host: localhost
  port: 3307
  user: etl
  password: ""
  database: warehouse
split:
  formats: [csv, parquet]
  parquet_compression: lz4
metrics:
  textfile: /var/lib/node_exporter/chunkload.prom
"#;
        let config = Config::parse(yaml).unwrap();
        assert_eq!(config.database.port, 3307);
        assert_eq!(config.split.formats.len(), 2);
        assert!(config.metrics.textfile.is_some());
    }
}
