//! Oracle gateway
//!
//! Session gateway backed by the `oracle` crate (ODPI-C). The Oracle client
//! library is loaded once by `OracleGateway::initialize`; after that each
//! job opens its own standalone connection, so sessions are never shared.

use ::oracle::sql_type::OracleType;
use ::oracle::{ResultSet, Row as OracleRow};
use tracing::info;

use super::{Column, Connection, Cursor, Execution, Row, SessionGateway, Value};
use crate::config::ConnectTarget;
use crate::error::{DbError, InitializationError};

/// Gateway opening Oracle connections
#[derive(Debug)]
pub struct OracleGateway {
    _initialized: (),
}

impl OracleGateway {
    /// Loads and initializes the Oracle client layer
    ///
    /// This is the only failure that aborts a whole batch: without a client
    /// library no job could ever connect.
    pub fn initialize() -> Result<Self, InitializationError> {
        let version = ::oracle::Version::client()
            .map_err(|e| InitializationError(e.to_string()))?;

        info!("Oracle client {} initialized", version);

        Ok(Self { _initialized: () })
    }
}

impl SessionGateway for OracleGateway {
    fn connect(&self, target: &ConnectTarget) -> Result<Box<dyn Connection>, DbError> {
        let conn = ::oracle::Connection::connect(&target.user, &target.password, &target.service)
            .map_err(db_error)?;

        Ok(Box::new(OracleConnection { conn }))
    }
}

struct OracleConnection {
    conn: ::oracle::Connection,
}

impl Connection for OracleConnection {
    fn execute(&mut self, sql: &str) -> Result<Execution<'_>, DbError> {
        let mut stmt = self.conn.statement(sql).build().map_err(db_error)?;

        // Statement type is known once prepared; only queries have a select list
        if stmt.is_query() {
            drop(stmt);
            let rows = self.conn.query(sql, &[]).map_err(db_error)?;
            return Ok(Execution::Rows(Box::new(OracleCursor::new(rows))));
        }

        stmt.execute(&[]).map_err(db_error)?;
        let affected = stmt.row_count().map_err(db_error)?;

        Ok(Execution::Affected(affected))
    }

    fn commit(&mut self) -> Result<(), DbError> {
        self.conn.commit().map_err(db_error)
    }

    fn close(self: Box<Self>) -> Result<(), DbError> {
        self.conn.close().map_err(db_error)
    }
}

struct OracleCursor {
    rows: ResultSet<'static, OracleRow>,
    columns: Vec<Column>,
    /// Placeholder for columns that are not serialized, per position
    opaque: Vec<Option<&'static str>>,
}

impl OracleCursor {
    fn new(rows: ResultSet<'static, OracleRow>) -> Self {
        let columns = rows
            .column_info()
            .iter()
            .enumerate()
            .map(|(i, info)| Column {
                name: info.name().to_string(),
                ordinal: i + 1,
            })
            .collect();

        let opaque = rows
            .column_info()
            .iter()
            .map(|info| placeholder(info.oracle_type()))
            .collect();

        Self {
            rows,
            columns,
            opaque,
        }
    }

    fn convert(&self, row: &OracleRow) -> Result<Row, DbError> {
        self.opaque
            .iter()
            .enumerate()
            .map(|(i, opaque)| match opaque {
                Some(placeholder) => Ok(Value::Opaque(*placeholder)),
                None => row
                    .get::<usize, Option<String>>(i)
                    .map(|value| value.map_or(Value::Null, Value::Text))
                    .map_err(db_error),
            })
            .collect()
    }
}

impl Iterator for OracleCursor {
    type Item = Result<Row, DbError>;

    fn next(&mut self) -> Option<Self::Item> {
        let row = self.rows.next()?;
        Some(row.map_err(db_error).and_then(|row| self.convert(&row)))
    }
}

impl Cursor for OracleCursor {
    fn columns(&self) -> &[Column] {
        &self.columns
    }
}

fn placeholder(oracle_type: &OracleType) -> Option<&'static str> {
    match oracle_type {
        OracleType::BLOB | OracleType::BFILE => Some("<BLOB>"),
        OracleType::CLOB | OracleType::NCLOB => Some("<CLOB>"),
        OracleType::Raw(_) | OracleType::LongRaw => Some("<RAW>"),
        _ => None,
    }
}

fn db_error(err: ::oracle::Error) -> DbError {
    match err.db_error() {
        Some(db) => DbError::new(Some(db.code()), db.message()),
        None => DbError::new(None, err.to_string()),
    }
}
