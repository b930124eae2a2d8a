//! Target table lifecycle.

use tracing::{error, info};

use super::schema::SchemaDefinition;
use super::session::SqlSession;
use crate::config::TableOptions;
use crate::error::LoadError;

/// Whether the table has been rebuilt in this run.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TableState {
    /// Absent, or left from an earlier run.
    Stale,
    /// Dropped and created from the schema in this run.
    Ready,
}

/// Drops, creates and truncates the table described by a schema.
#[derive(Debug)]
pub struct TableManager {
    schema: SchemaDefinition,
    options: TableOptions,
    state: TableState,
}

impl TableManager {
    pub fn new(schema: SchemaDefinition, options: TableOptions) -> Self {
        Self {
            schema,
            options,
            state: TableState::Stale,
        }
    }

    pub fn state(&self) -> TableState {
        self.state
    }

    pub fn schema(&self) -> &SchemaDefinition {
        &self.schema
    }

    pub fn drop_statement(&self) -> String {
        format!("DROP TABLE IF EXISTS {}", self.schema.table)
    }

    /// `CREATE TABLE` with every column `NOT NULL`.
    pub fn create_statement(&self) -> String {
        let columns = self
            .schema
            .columns
            .iter()
            .map(|c| format!("{} {} NOT NULL", c.name, c.sql_type))
            .collect::<Vec<_>>()
            .join(", ");
        let TableOptions {
            engine,
            charset,
            collation,
            row_format,
        } = &self.options;

        format!(
            "CREATE TABLE {} ({columns}) ENGINE={engine} DEFAULT CHARSET={charset} \
             COLLATE={collation} ROW_FORMAT={row_format}",
            self.schema.table
        )
    }

    pub fn truncate_statement(&self) -> String {
        format!("TRUNCATE TABLE {}", self.schema.table)
    }

    /// Drop the table if it exists and create it from the schema.
    pub async fn recreate(&mut self, session: &mut dyn SqlSession) -> Result<(), LoadError> {
        let table = &self.schema.table;

        if let Err(e) = session.execute(&self.drop_statement()).await {
            error!("Failed to drop table {table}: {e}");
            return Err(e.into());
        }
        info!("Dropped table {table} if it existed");

        if let Err(e) = session.execute(&self.create_statement()).await {
            error!("Failed to create table {table}: {e}");
            return Err(e.into());
        }
        info!(
            "Created table {table} with {} column(s)",
            self.schema.columns.len()
        );

        self.state = TableState::Ready;
        Ok(())
    }

    /// Remove every row. Only valid after [`TableManager::recreate`].
    pub async fn truncate(&self, session: &mut dyn SqlSession) -> Result<(), LoadError> {
        let table = &self.schema.table;
        if self.state != TableState::Ready {
            return Err(LoadError::TableNotReady {
                table: table.clone(),
            });
        }

        if let Err(e) = session.execute(&self.truncate_statement()).await {
            error!("Failed to truncate table {table}: {e}");
            return Err(e.into());
        }
        info!("Truncated table {table}");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::DatabaseError;
    use crate::load::schema::ColumnDef;
    use crate::load::session::fake::FakeSession;
    use std::path::Path;

    fn accident() -> SchemaDefinition {
        SchemaDefinition::parse(
            Path::new("accident.json"),
            r#"{"accident": {"bcc_acc_id": "INT", "acc_date": "DATE"}}"#,
        )
        .unwrap()
    }

    #[test]
    fn test_create_statement() {
        let manager = TableManager::new(accident(), TableOptions::default());
        assert_eq!(
            manager.create_statement(),
            "CREATE TABLE accident (bcc_acc_id INT NOT NULL, acc_date DATE NOT NULL) \
             ENGINE=InnoDB DEFAULT CHARSET=utf8mb4 COLLATE=utf8mb4_unicode_ci ROW_FORMAT=COMPRESSED"
        );
        assert_eq!(manager.drop_statement(), "DROP TABLE IF EXISTS accident");
    }

    #[test]
    fn test_every_column_is_not_null() {
        let schema = SchemaDefinition {
            table: "t".into(),
            columns: (0..5)
                .map(|i| ColumnDef {
                    name: format!("c{i}"),
                    sql_type: "VARCHAR(10)".into(),
                })
                .collect(),
        };
        let ddl = TableManager::new(schema, TableOptions::default()).create_statement();
        assert_eq!(ddl.matches("NOT NULL").count(), 5);
    }

    #[tokio::test]
    async fn test_recreate_is_idempotent() {
        let mut session = FakeSession::default();
        let mut manager = TableManager::new(accident(), TableOptions::default());
        assert_eq!(manager.state(), TableState::Stale);

        manager.recreate(&mut session).await.unwrap();
        manager.recreate(&mut session).await.unwrap();

        assert_eq!(manager.state(), TableState::Ready);
        assert_eq!(session.statements.len(), 4);
        assert_eq!(session.statements[0], session.statements[2]);
        assert_eq!(session.statements[1], session.statements[3]);
        assert!(session.statements[0].starts_with("DROP TABLE IF EXISTS"));
    }

    #[tokio::test]
    async fn test_truncate_requires_recreate() {
        let mut session = FakeSession::default();
        let mut manager = TableManager::new(accident(), TableOptions::default());

        let err = manager.truncate(&mut session).await.unwrap_err();
        assert!(matches!(err, LoadError::TableNotReady { .. }));
        assert!(session.statements.is_empty());

        manager.recreate(&mut session).await.unwrap();
        manager.truncate(&mut session).await.unwrap();
        assert_eq!(session.statements.last().unwrap(), "TRUNCATE TABLE accident");
    }

    #[tokio::test]
    async fn test_create_failure_leaves_table_stale() {
        let mut session = FakeSession::default().failing_on("CREATE TABLE");
        let mut manager = TableManager::new(accident(), TableOptions::default());

        let err = manager.recreate(&mut session).await.unwrap_err();
        assert!(matches!(
            err,
            LoadError::Database {
                source: DatabaseError::Server { .. }
            }
        ));
        assert_eq!(manager.state(), TableState::Stale);
    }
}
