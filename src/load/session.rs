//! Database session seam.
//!
//! The load pipeline talks to the server through [`SqlSession`]. The MySQL
//! implementation wraps a single `mysql_async` connection with a local
//! infile handler restricted to the files of the current load.

use async_trait::async_trait;
use mysql_async::prelude::Queryable;
use mysql_async::{Conn, OptsBuilder, WhiteListFsHandler};
use snafu::prelude::*;
use std::path::PathBuf;
use tracing::debug;

use crate::config::DatabaseConfig;
use crate::error::{ConnectSnafu, DatabaseError};

/// A connection that executes SQL statements.
#[async_trait]
pub trait SqlSession: Send {
    /// Execute one statement and return the affected row count.
    async fn execute(&mut self, sql: &str) -> Result<u64, DatabaseError>;

    async fn begin(&mut self) -> Result<(), DatabaseError> {
        self.execute("START TRANSACTION").await.map(|_| ())
    }

    async fn commit(&mut self) -> Result<(), DatabaseError> {
        self.execute("COMMIT").await.map(|_| ())
    }

    async fn rollback(&mut self) -> Result<(), DatabaseError> {
        self.execute("ROLLBACK").await.map(|_| ())
    }
}

/// MySQL session over `mysql_async`.
pub struct MySqlSession {
    conn: Conn,
}

impl MySqlSession {
    /// Connect, allowing `LOAD DATA LOCAL INFILE` only for `infiles`.
    ///
    /// Paths must be absolute; the server echoes them back verbatim when it
    /// requests file contents.
    pub async fn connect(
        config: &DatabaseConfig,
        infiles: Vec<PathBuf>,
    ) -> Result<Self, DatabaseError> {
        let target = format!("{}:{}/{}", config.host, config.port, config.database);

        let opts = OptsBuilder::default()
            .ip_or_hostname(config.host.clone())
            .tcp_port(config.port)
            .user(Some(config.user.clone()))
            .pass(Some(config.password.clone()))
            .db_name(Some(config.database.clone()))
            .local_infile_handler(Some(WhiteListFsHandler::new(infiles)));

        let conn = Conn::new(opts)
            .await
            .context(ConnectSnafu { target: &target })?;
        debug!(target = %target, "Connected to MySQL");

        Ok(Self { conn })
    }

    /// Close the connection.
    pub async fn disconnect(self) -> Result<(), DatabaseError> {
        self.conn.disconnect().await?;
        Ok(())
    }
}

#[async_trait]
impl SqlSession for MySqlSession {
    async fn execute(&mut self, sql: &str) -> Result<u64, DatabaseError> {
        self.conn.query_drop(sql).await?;
        Ok(self.conn.affected_rows())
    }
}
