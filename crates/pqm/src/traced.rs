//! The execution boundary.
//!
//! pqm never opens connections or transactions itself. It is handed
//! something implementing [`Connection`] and logs every round-trip through
//! [`TracedConn`].

use std::future::Future;
use std::pin::Pin;
use tokio_postgres::types::ToSql;
use tokio_postgres::{Error, Row};
use tracing::Instrument;

type BoxFuture<'a, T> = Pin<Box<dyn Future<Output = Result<T, Error>> + Send + 'a>>;

/// A handle pqm can read the catalog through and run a batch on.
///
/// This is implemented for `tokio_postgres::Client`,
/// `tokio_postgres::Transaction` and `deadpool_postgres::Object`. Pass a
/// transaction to get an all-or-nothing reconciliation.
pub trait Connection: Send + Sync {
    fn query<'a>(
        &'a self,
        sql: &'a str,
        params: &'a [&'a (dyn ToSql + Sync)],
    ) -> BoxFuture<'a, Vec<Row>>;

    /// Execute semicolon-separated statements with the simple query protocol.
    fn batch_execute<'a>(&'a self, sql: &'a str) -> BoxFuture<'a, ()>;
}

impl Connection for tokio_postgres::Client {
    fn query<'a>(
        &'a self,
        sql: &'a str,
        params: &'a [&'a (dyn ToSql + Sync)],
    ) -> BoxFuture<'a, Vec<Row>> {
        Box::pin(tokio_postgres::Client::query(self, sql, params))
    }

    fn batch_execute<'a>(&'a self, sql: &'a str) -> BoxFuture<'a, ()> {
        Box::pin(tokio_postgres::Client::batch_execute(self, sql))
    }
}

impl Connection for tokio_postgres::Transaction<'_> {
    fn query<'a>(
        &'a self,
        sql: &'a str,
        params: &'a [&'a (dyn ToSql + Sync)],
    ) -> BoxFuture<'a, Vec<Row>> {
        Box::pin(tokio_postgres::Transaction::query(self, sql, params))
    }

    fn batch_execute<'a>(&'a self, sql: &'a str) -> BoxFuture<'a, ()> {
        Box::pin(tokio_postgres::Transaction::batch_execute(self, sql))
    }
}

impl Connection for deadpool_postgres::Object {
    fn query<'a>(
        &'a self,
        sql: &'a str,
        params: &'a [&'a (dyn ToSql + Sync)],
    ) -> BoxFuture<'a, Vec<Row>> {
        let client: &tokio_postgres::Client = self;
        Box::pin(client.query(sql, params))
    }

    fn batch_execute<'a>(&'a self, sql: &'a str) -> BoxFuture<'a, ()> {
        let client: &tokio_postgres::Client = self;
        Box::pin(client.batch_execute(sql))
    }
}

/// A connection bound to the table being reconciled.
///
/// Every round-trip runs in a `debug` span carrying the table, the SQL and
/// what came back.
pub struct TracedConn<'a, C: Connection + ?Sized> {
    conn: &'a C,
    table: &'a str,
}

impl<'a, C: Connection + ?Sized> TracedConn<'a, C> {
    pub fn new(conn: &'a C, table: &'a str) -> Self {
        Self { conn, table }
    }

    /// Run the catalog query.
    pub async fn query(
        &self,
        sql: &str,
        params: &[&(dyn ToSql + Sync)],
    ) -> Result<Vec<Row>, Error> {
        let span = tracing::debug_span!(
            "db.query",
            table = self.table,
            sql = %sql,
            params = params.len(),
            rows = tracing::field::Empty,
        );
        let rows = self
            .conn
            .query(sql, params)
            .instrument(span.clone())
            .await?;
        span.record("rows", rows.len());
        Ok(rows)
    }

    /// Run a statement batch. An empty batch never reaches the server.
    pub async fn batch_execute(&self, sql: &str) -> Result<(), Error> {
        let statements = sql.matches(';').count();
        let span = tracing::debug_span!(
            "db.execute",
            table = self.table,
            sql = %sql,
            statements,
        );
        if statements == 0 {
            return Ok(());
        }
        self.conn.batch_execute(sql).instrument(span).await
    }
}

pub trait ConnectionExt: Connection {
    /// Bind this connection to `table` for span logging.
    fn traced<'a>(&'a self, table: &'a str) -> TracedConn<'a, Self> {
        TracedConn::new(self, table)
    }
}

impl<C: Connection + ?Sized> ConnectionExt for C {}
