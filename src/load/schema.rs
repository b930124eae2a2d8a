//! Schema documents.
//!
//! A schema document is `{schema_dir}/{dataset}.json`. Two shapes are
//! accepted:
//!
//! ```json
//! {"table": "accident", "columns": {"bcc_acc_id": "INT", "acc_date": "DATE"}}
//! {"accident": {"bcc_acc_id": "INT", "acc_date": "DATE"}}
//! ```
//!
//! Column order is document order and defines the positional mapping used
//! by the bulk import.

use regex::Regex;
use serde_json::{Map, Value};
use snafu::prelude::*;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use std::sync::LazyLock;
use tracing::debug;

use crate::error::{
    InvalidColumnTypeSnafu, InvalidIdentifierSnafu, SchemaError, SchemaMalformedSnafu,
    SchemaReadSnafu,
};

/// MySQL identifier length limit.
const MAX_IDENTIFIER_LEN: usize = 64;

static IDENTIFIER: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^[A-Za-z_][A-Za-z0-9_]*$").expect("Invalid regex pattern"));

static COLUMN_TYPE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)^[a-z]+(\s*\(\s*\d+\s*(,\s*\d+\s*)?\))?(\s+unsigned)?$")
        .expect("Invalid regex pattern")
});

/// Check that `name` can be used unquoted as a table or column name.
pub fn validate_identifier(name: &str) -> Result<(), SchemaError> {
    ensure!(
        name.len() <= MAX_IDENTIFIER_LEN && IDENTIFIER.is_match(name),
        InvalidIdentifierSnafu { name }
    );
    Ok(())
}

/// One column of the target table.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ColumnDef {
    pub name: String,
    pub sql_type: String,
}

/// Table name plus ordered columns.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SchemaDefinition {
    pub table: String,
    pub columns: Vec<ColumnDef>,
}

impl SchemaDefinition {
    /// Column names in import order.
    pub fn column_names(&self) -> impl Iterator<Item = &str> {
        self.columns.iter().map(|c| c.name.as_str())
    }

    /// Parse a schema document. `path` is only used in error messages.
    pub fn parse(path: &Path, text: &str) -> Result<Self, SchemaError> {
        let malformed = |message: &str| SchemaError::SchemaMalformed {
            path: path.to_path_buf(),
            message: message.to_string(),
        };

        let value: Value = serde_json::from_str(text).map_err(|e| SchemaError::SchemaMalformed {
            path: path.to_path_buf(),
            message: e.to_string(),
        })?;
        let Value::Object(doc) = value else {
            return Err(malformed("expected a JSON object"));
        };

        let (table, columns) = if doc.contains_key("columns") {
            if let Some(key) = doc.keys().find(|k| *k != "table" && *k != "columns") {
                return Err(malformed(&format!("unexpected key '{key}'")));
            }
            let table = doc
                .get("table")
                .and_then(Value::as_str)
                .ok_or_else(|| malformed("'table' must be a string"))?;
            let columns = doc
                .get("columns")
                .and_then(Value::as_object)
                .ok_or_else(|| malformed("'columns' must be an object"))?;
            (table, columns)
        } else {
            ensure!(
                doc.len() == 1,
                SchemaMalformedSnafu {
                    path,
                    message: format!("expected exactly one top-level key, found {}", doc.len()),
                }
            );
            let Some((table, columns)) = doc.iter().next() else {
                return Err(malformed("document is empty"));
            };
            let columns = columns
                .as_object()
                .ok_or_else(|| malformed("column set must be an object"))?;
            (table.as_str(), columns)
        };

        validate_identifier(table)?;
        let columns = parse_columns(columns).map_err(|e| match e {
            ColumnsError::Schema(e) => e,
            ColumnsError::Malformed(message) => malformed(&message),
        })?;

        Ok(Self {
            table: table.to_string(),
            columns,
        })
    }
}

enum ColumnsError {
    Schema(SchemaError),
    Malformed(String),
}

fn parse_columns(columns: &Map<String, Value>) -> Result<Vec<ColumnDef>, ColumnsError> {
    if columns.is_empty() {
        return Err(ColumnsError::Malformed("no columns defined".to_string()));
    }

    columns
        .iter()
        .map(|(name, ty)| {
            let ty = ty.as_str().ok_or_else(|| {
                ColumnsError::Malformed(format!("type of column '{name}' must be a string"))
            })?;
            validate_identifier(name).map_err(ColumnsError::Schema)?;

            let ty = ty.trim();
            if !COLUMN_TYPE.is_match(ty) {
                return Err(ColumnsError::Schema(
                    InvalidColumnTypeSnafu {
                        column: name,
                        column_type: ty,
                    }
                    .build(),
                ));
            }

            Ok(ColumnDef {
                name: name.clone(),
                sql_type: ty.to_string(),
            })
        })
        .collect()
}

/// Loads schema documents from a directory.
#[derive(Debug, Clone)]
pub struct SchemaLoader {
    dir: PathBuf,
}

impl SchemaLoader {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    /// Path of the document for `dataset`.
    pub fn path_for(&self, dataset: &str) -> PathBuf {
        self.dir.join(format!("{dataset}.json"))
    }

    /// Load and validate the schema for `dataset`.
    pub fn load(&self, dataset: &str) -> Result<SchemaDefinition, SchemaError> {
        validate_identifier(dataset)?;
        let path = self.path_for(dataset);

        let text = match std::fs::read_to_string(&path) {
            Ok(text) => text,
            Err(e) if e.kind() == ErrorKind::NotFound => {
                return Err(SchemaError::SchemaNotFound { path });
            }
            Err(source) => return Err(source).context(SchemaReadSnafu { path }),
        };

        let schema = SchemaDefinition::parse(&path, &text)?;
        debug!(
            dataset,
            table = %schema.table,
            columns = schema.columns.len(),
            "Loaded schema"
        );
        Ok(schema)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn parse(text: &str) -> Result<SchemaDefinition, SchemaError> {
        SchemaDefinition::parse(Path::new("test.json"), text)
    }

    #[test]
    fn test_legacy_document() {
        let schema = parse(r#"{"accident": {"bcc_acc_id": "INT", "acc_date": "DATE"}}"#).unwrap();
        assert_eq!(schema.table, "accident");
        assert_eq!(
            schema.columns,
            vec![
                ColumnDef {
                    name: "bcc_acc_id".into(),
                    sql_type: "INT".into()
                },
                ColumnDef {
                    name: "acc_date".into(),
                    sql_type: "DATE".into()
                },
            ]
        );
    }

    #[test]
    fn test_explicit_document_keeps_column_order() {
        let schema = parse(
            r#"{"table": "trips", "columns": {"z": "VARCHAR(20)", "a": "DECIMAL(10, 2)", "m": "int unsigned"}}"#,
        )
        .unwrap();
        assert_eq!(schema.table, "trips");
        assert_eq!(schema.column_names().collect::<Vec<_>>(), vec!["z", "a", "m"]);
    }

    #[test]
    fn test_malformed_documents() {
        for text in [
            "not json",
            "[1, 2]",
            "{}",
            r#"{"a": {"x": "INT"}, "b": {"y": "INT"}}"#,
            r#"{"a": {}}"#,
            r#"{"a": "INT"}"#,
            r#"{"a": {"x": 5}}"#,
            r#"{"table": 5, "columns": {"x": "INT"}}"#,
            r#"{"table": "t", "columns": {"x": "INT"}, "extra": 1}"#,
        ] {
            let err = parse(text).unwrap_err();
            assert!(
                matches!(err, SchemaError::SchemaMalformed { .. }),
                "{text}: {err}"
            );
        }
    }

    #[test]
    fn test_bad_identifiers() {
        for text in [
            r#"{"drop table x; --": {"a": "INT"}}"#,
            r#"{"t": {"1col": "INT"}}"#,
            r#"{"t": {"a b": "INT"}}"#,
        ] {
            assert!(matches!(
                parse(text).unwrap_err(),
                SchemaError::InvalidIdentifier { .. }
            ));
        }
    }

    #[test]
    fn test_bad_column_types() {
        for ty in ["", "INT; DROP TABLE t", "VARCHAR(", "ENUM('a')", "INT NOT NULL"] {
            let text = format!(r#"{{"t": {{"a": "{ty}"}}}}"#);
            assert!(
                matches!(parse(&text).unwrap_err(), SchemaError::InvalidColumnType { .. }),
                "{ty}"
            );
        }
    }

    #[test]
    fn test_loader_reads_dataset_file() {
        let dir = TempDir::new().unwrap();
        std::fs::write(
            dir.path().join("accident.json"),
            r#"{"accident": {"bcc_acc_id": "INT"}}"#,
        )
        .unwrap();

        let loader = SchemaLoader::new(dir.path());
        let schema = loader.load("accident").unwrap();
        assert_eq!(schema.table, "accident");

        assert!(matches!(
            loader.load("missing").unwrap_err(),
            SchemaError::SchemaNotFound { .. }
        ));
        assert!(matches!(
            loader.load("../etc/passwd").unwrap_err(),
            SchemaError::InvalidIdentifier { .. }
        ));
    }
}
