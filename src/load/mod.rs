//! Load pipeline.
//!
//! Loads the schema for a dataset, rebuilds its table, and bulk-imports
//! the matching chunk files from the output directory. The run logs to
//! `load_{dataset}_{YYYYMMDD_HHMMSS}.log`.

pub mod loader;
pub mod schema;
pub mod session;
pub mod table;

use snafu::prelude::*;
use std::path::PathBuf;
use std::time::Instant;
use tracing::instrument::WithSubscriber;
use tracing::{info, warn};

use crate::config::{DatabaseConfig, LoadConfig, OutputFormat, PathsConfig, TableOptions};
use crate::emit;
use crate::error::{LoadError, LoadLogSnafu};
use crate::logging::RunLog;
use crate::metrics::events::LoadCompleted;
use crate::split::SplitManifest;

pub use loader::{BulkLoader, FileImport, ImportBatch, LoadReport, load_statement};
pub use schema::{ColumnDef, SchemaDefinition, SchemaLoader, validate_identifier};
pub use session::{MySqlSession, SqlSession};
pub use table::{TableManager, TableState};

/// What to load.
#[derive(Debug, Clone, Default)]
pub struct LoadRequest {
    /// Schema document name, `{schema_dir}/{dataset}.json`.
    pub dataset: String,
    /// Explicit files; empty means discover by table name.
    pub files: Vec<PathBuf>,
    pub skip_marker_check: bool,
    pub dry_run: bool,
}

/// A resolved load: schema plus the files to import.
#[derive(Debug, Clone)]
pub struct LoadPlan {
    pub schema: SchemaDefinition,
    pub batch: ImportBatch,
}

impl LoadPlan {
    /// Every statement the load would run, in order.
    pub fn statements(&self, options: &TableOptions) -> Vec<String> {
        let table = TableManager::new(self.schema.clone(), options.clone());
        let mut statements = vec![
            table.drop_statement(),
            table.create_statement(),
            table.truncate_statement(),
            "START TRANSACTION".to_string(),
        ];
        statements.extend(
            self.batch
                .files
                .iter()
                .map(|path| load_statement(path, &self.schema)),
        );
        statements.push("COMMIT".to_string());
        statements
    }
}

/// Rebuilds a table and imports chunk files into it.
pub struct LoadPipeline {
    output_dir: PathBuf,
    log_dir: PathBuf,
    schemas: SchemaLoader,
    options: TableOptions,
    require_marker: bool,
}

impl LoadPipeline {
    pub fn new(paths: &PathsConfig, load: &LoadConfig) -> Self {
        Self {
            output_dir: paths.output_dir.clone(),
            log_dir: paths.log_dir.clone(),
            schemas: SchemaLoader::new(&paths.schema_dir),
            options: load.table_options.clone(),
            require_marker: load.require_split_marker,
        }
    }

    /// Load the schema, check the split marker and collect the files.
    pub fn prepare(&self, request: &LoadRequest) -> Result<LoadPlan, LoadError> {
        let schema = self.schemas.load(&request.dataset)?;

        let batch = if request.files.is_empty() {
            if self.require_marker && !request.skip_marker_check {
                let manifest = SplitManifest::read(&self.output_dir)?;
                info!(
                    "Split of {} file(s) completed at {}",
                    manifest.files.len(),
                    manifest.completed_at
                );
            }
            ImportBatch::discover(
                &self.output_dir,
                &schema.table,
                OutputFormat::Csv.extension(),
            )?
        } else {
            ImportBatch::from_files(&schema.table, request.files.clone())?
        };

        if batch.is_empty() {
            warn!(
                "No files for table {} in {}",
                schema.table,
                self.output_dir.display()
            );
        } else {
            info!(
                "Found {} file(s) for table {}",
                batch.files.len(),
                schema.table
            );
        }

        Ok(LoadPlan { schema, batch })
    }

    /// Recreate, truncate and import over an open session.
    pub async fn execute(
        &self,
        plan: &LoadPlan,
        session: &mut dyn SqlSession,
    ) -> Result<LoadReport, LoadError> {
        let start = Instant::now();
        let result = self.rebuild_and_import(plan, session).await;

        emit!(LoadCompleted {
            table: plan.schema.table.clone(),
            duration: start.elapsed(),
            success: result.is_ok(),
        });
        result
    }

    async fn rebuild_and_import(
        &self,
        plan: &LoadPlan,
        session: &mut dyn SqlSession,
    ) -> Result<LoadReport, LoadError> {
        let mut table = TableManager::new(plan.schema.clone(), self.options.clone());
        table.recreate(session).await?;
        table.truncate(session).await?;
        BulkLoader::new(&plan.schema)
            .import(session, &plan.batch)
            .await
    }

    /// Run a full load against MySQL, logging to a per-run file.
    ///
    /// Returns `None` for a dry run, which only logs the statements.
    pub async fn run(
        &self,
        request: &LoadRequest,
        database: &DatabaseConfig,
    ) -> Result<Option<LoadReport>, LoadError> {
        validate_identifier(&request.dataset)?;
        let log = RunLog::create(&self.log_dir, &format!("load_{}", request.dataset))
            .context(LoadLogSnafu)?;

        self.run_logged(request, database)
            .with_subscriber(log.dispatch().clone())
            .await
    }

    async fn run_logged(
        &self,
        request: &LoadRequest,
        database: &DatabaseConfig,
    ) -> Result<Option<LoadReport>, LoadError> {
        let plan = self.prepare(request)?;

        if request.dry_run {
            for statement in plan.statements(&self.options) {
                info!("[dry-run] {statement}");
            }
            return Ok(None);
        }

        let mut session = MySqlSession::connect(database, plan.batch.files.clone()).await?;
        let result = self.execute(&plan, &mut session).await;
        if let Err(e) = session.disconnect().await {
            warn!("Failed to close database connection: {e}");
        }
        result.map(Some)
    }
}
