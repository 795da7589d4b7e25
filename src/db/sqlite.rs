use crate::db::query::{self, Limit, Predicate, SqlValue};
use crate::db::schema::schema_statements;
use crate::db::traits::Entity;
use crate::error::MicrolightError;
use sqlx::pool::PoolConnection;
use sqlx::query::Query;
use sqlx::sqlite::{SqliteArguments, SqliteConnectOptions, SqliteConnection, SqlitePoolOptions};
use sqlx::{Connection, Pool, Row, Sqlite};
use std::marker::PhantomData;
use std::str::FromStr;
use std::time::Duration;
use tracing::{debug, info};

pub type SqlitePool = Pool<Sqlite>;

/// Handle to the single SQLite file backing the blog.
///
/// The pool holds one connection: access to the file is serialized and
/// every request scope waits its turn for the handle.
#[derive(Clone)]
pub struct Database {
    pool: SqlitePool,
}

impl Database {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    pub async fn connect(database_url: &str) -> Result<Self, MicrolightError> {
        let connect_opts = SqliteConnectOptions::from_str(database_url)?.create_if_missing(true);
        let pool = SqlitePoolOptions::new()
            .max_connections(1)
            .acquire_timeout(Duration::from_secs(5))
            .connect_with(connect_opts)
            .await?;
        Ok(Self::new(pool))
    }

    pub fn pool(&self) -> &SqlitePool {
        &self.pool
    }

    /// Create all tables. Meant to run once at startup, not per request.
    pub async fn init_schema(&self) -> Result<(), MicrolightError> {
        let mut conn = self.pool.acquire().await?;
        for stmt in schema_statements()? {
            sqlx::query(&stmt).execute(&mut *conn).await?;
        }
        info!("database schema ready");
        Ok(())
    }

    /// Acquire the connection for one request scope. It goes back to the
    /// pool when the session is dropped, whichever way the request ends.
    pub async fn session(&self) -> Result<Session, MicrolightError> {
        let conn = self.pool.acquire().await?;
        Ok(Session { conn })
    }
}

pub struct Session {
    conn: PoolConnection<Sqlite>,
}

impl Session {
    pub fn repo<E: Entity>(&mut self) -> Repository<'_, E> {
        Repository {
            conn: &mut *self.conn,
            _entity: PhantomData,
        }
    }
}

/// Table access for one entity type over a borrowed connection.
pub struct Repository<'c, E> {
    conn: &'c mut SqliteConnection,
    _entity: PhantomData<fn() -> E>,
}

impl<E: Entity> Repository<'_, E> {
    /// Rows matching every predicate, in the order SQLite returns them.
    pub async fn find(
        &mut self,
        predicates: &[Predicate],
        limit: impl Into<Limit>,
        offset: u64,
    ) -> Result<Vec<E>, MicrolightError> {
        let stmt = query::select(E::TABLE, predicates, limit.into(), offset)?;
        debug!(table = E::TABLE, sql = %stmt.sql, "select");
        let rows = bind_all(sqlx::query(&stmt.sql), stmt.params)
            .fetch_all(&mut *self.conn)
            .await?;
        rows.iter().map(E::from_row).collect()
    }

    pub async fn find_one(
        &mut self,
        predicates: &[Predicate],
        offset: u64,
    ) -> Result<Option<E>, MicrolightError> {
        let found = self.find(predicates, Limit::Rows(1), offset).await?;
        Ok(found.into_iter().next())
    }

    pub async fn count(&mut self, predicates: &[Predicate]) -> Result<u64, MicrolightError> {
        let stmt = query::count(E::TABLE, predicates)?;
        let row = bind_all(sqlx::query(&stmt.sql), stmt.params)
            .fetch_one(&mut *self.conn)
            .await?;
        let n: i64 = row.try_get(0)?;
        u64::try_from(n).map_err(|_| MicrolightError::DataCorruption(format!("negative row count {n}")))
    }

    /// Delete matching rows inside a transaction. Refuses an empty predicate
    /// list. Returns the number of rows removed.
    pub async fn delete(&mut self, predicates: &[Predicate]) -> Result<u64, MicrolightError> {
        let stmt = query::delete(E::TABLE, predicates)?;
        let mut tx = self.conn.begin().await?;
        let result = bind_all(sqlx::query(&stmt.sql), stmt.params)
            .execute(&mut *tx)
            .await?;
        tx.commit().await?;
        debug!(table = E::TABLE, rows = result.rows_affected(), "delete");
        Ok(result.rows_affected())
    }

    /// Insert inside a transaction and return the new row id.
    pub async fn insert(&mut self, entity: &E) -> Result<i64, MicrolightError> {
        let stmt = query::insert(E::TABLE, entity.to_values())?;
        let mut tx = self.conn.begin().await?;
        let result = bind_all(sqlx::query(&stmt.sql), stmt.params)
            .execute(&mut *tx)
            .await?;
        tx.commit().await?;
        let id = result.last_insert_rowid();
        debug!(table = E::TABLE, id, "insert");
        Ok(id)
    }
}

fn bind_all<'q>(
    mut query: Query<'q, Sqlite, SqliteArguments<'q>>,
    params: Vec<SqlValue>,
) -> Query<'q, Sqlite, SqliteArguments<'q>> {
    for param in params {
        query = match param {
            SqlValue::Null => query.bind(None::<String>),
            SqlValue::Integer(v) => query.bind(v),
            SqlValue::Text(v) => query.bind(v),
        };
    }
    query
}
