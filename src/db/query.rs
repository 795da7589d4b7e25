//! SQL text generation.
//!
//! Values never appear in the generated SQL: every predicate value is
//! returned as a bound parameter alongside the statement. Identifiers cannot
//! be bound, so table names, column names and type tokens must pass a
//! whitelist before they are spliced in.

use regex::Regex;
use std::fmt::Write as _;
use std::sync::LazyLock;

use crate::error::MicrolightError;

static IDENTIFIER: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^[a-zA-Z_]+$").expect("identifier regex is valid"));
static TYPE_TOKEN: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^[a-zA-Z ]+$").expect("type regex is valid"));

pub fn validate_identifier(name: &str) -> Result<&str, MicrolightError> {
    if IDENTIFIER.is_match(name) {
        Ok(name)
    } else {
        Err(MicrolightError::InvalidIdentifier(name.to_string()))
    }
}

fn validate_type_token(token: &str) -> Result<&str, MicrolightError> {
    if TYPE_TOKEN.is_match(token) {
        Ok(token)
    } else {
        Err(MicrolightError::InvalidIdentifier(token.to_string()))
    }
}

/// Scalar bound as a statement parameter.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SqlValue {
    Null,
    Integer(i64),
    Text(String),
}

impl From<i64> for SqlValue {
    fn from(v: i64) -> Self {
        SqlValue::Integer(v)
    }
}

impl From<&str> for SqlValue {
    fn from(v: &str) -> Self {
        SqlValue::Text(v.to_string())
    }
}

impl From<String> for SqlValue {
    fn from(v: String) -> Self {
        SqlValue::Text(v)
    }
}

impl<T: Into<SqlValue>> From<Option<T>> for SqlValue {
    fn from(v: Option<T>) -> Self {
        v.map_or(SqlValue::Null, Into::into)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SqlOp {
    Equal,
    NotEqual,
    Lt,
    Lte,
    Gt,
    Gte,
    Like,
}

impl SqlOp {
    fn as_sql(self) -> &'static str {
        match self {
            SqlOp::Equal => "=",
            SqlOp::NotEqual => "!=",
            SqlOp::Lt => "<",
            SqlOp::Lte => "<=",
            SqlOp::Gt => ">",
            SqlOp::Gte => ">=",
            SqlOp::Like => "LIKE",
        }
    }
}

/// Value normalization applied before binding. Has no effect on quoting.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SqlEscape {
    #[default]
    None,
    Slug,
    Tag,
}

impl SqlEscape {
    pub fn apply(self, value: SqlValue) -> SqlValue {
        match (self, value) {
            (SqlEscape::Slug, SqlValue::Text(s)) => SqlValue::Text(slugify(&s)),
            (SqlEscape::Tag, SqlValue::Text(s)) => SqlValue::Text(normalize_tag(&s)),
            (_, value) => value,
        }
    }
}

/// Lower-case and collapse each run of non-alphanumeric characters into a
/// single `-`, with no leading or trailing dash.
pub fn slugify(raw: &str) -> String {
    let mut slug = String::with_capacity(raw.len());
    for c in raw.chars().flat_map(char::to_lowercase) {
        if c.is_alphanumeric() {
            slug.push(c);
        } else if !slug.is_empty() && !slug.ends_with('-') {
            slug.push('-');
        }
    }
    while slug.ends_with('-') {
        slug.pop();
    }
    slug
}

/// Tags are stored comma-joined, so commas are stripped here.
pub fn normalize_tag(raw: &str) -> String {
    raw.replace(',', "").trim().to_lowercase()
}

#[derive(Debug, Clone, PartialEq)]
pub struct Predicate {
    pub column: String,
    pub value: SqlValue,
    pub op: SqlOp,
    pub escape: SqlEscape,
}

impl Predicate {
    pub fn new(column: impl Into<String>, value: impl Into<SqlValue>, op: SqlOp, escape: SqlEscape) -> Self {
        Self {
            column: column.into(),
            value: value.into(),
            op,
            escape,
        }
    }

    pub fn eq(column: impl Into<String>, value: impl Into<SqlValue>) -> Self {
        Self::new(column, value, SqlOp::Equal, SqlEscape::None)
    }
}

/// Row limit for a select. `-1` in the integer form means no limit.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Limit {
    Unbounded,
    Rows(u64),
}

impl From<i64> for Limit {
    fn from(v: i64) -> Self {
        u64::try_from(v).map_or(Limit::Unbounded, Limit::Rows)
    }
}

/// SQL text plus the parameters to bind, in placeholder order.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Statement {
    pub sql: String,
    pub params: Vec<SqlValue>,
}

/// Build a ` WHERE ...` clause. An empty predicate list yields an empty
/// statement.
pub fn where_clause(predicates: &[Predicate]) -> Result<Statement, MicrolightError> {
    let mut stmt = Statement::default();
    for (i, predicate) in predicates.iter().enumerate() {
        let column = validate_identifier(&predicate.column)?;
        stmt.sql.push_str(if i == 0 { " WHERE " } else { " AND " });
        let _ = write!(stmt.sql, "`{}` {} ?", column, predicate.op.as_sql());
        stmt.params.push(predicate.escape.apply(predicate.value.clone()));
    }
    Ok(stmt)
}

pub fn select(table: &str, predicates: &[Predicate], limit: Limit, offset: u64) -> Result<Statement, MicrolightError> {
    let table = validate_identifier(table)?;
    let filter = where_clause(predicates)?;
    let mut sql = format!("SELECT * FROM `{table}`{}", filter.sql);
    if let Limit::Rows(n) = limit {
        let _ = write!(sql, " LIMIT {} OFFSET {}", sql_integer(n, "limit")?, sql_integer(offset, "offset")?);
    }
    Ok(Statement {
        sql,
        params: filter.params,
    })
}

/// SQLite integers are signed 64-bit.
fn sql_integer(value: u64, what: &str) -> Result<i64, MicrolightError> {
    i64::try_from(value).map_err(|_| MicrolightError::InvalidRequest(format!("{what} {value} is out of range")))
}

pub fn count(table: &str, predicates: &[Predicate]) -> Result<Statement, MicrolightError> {
    let table = validate_identifier(table)?;
    let filter = where_clause(predicates)?;
    Ok(Statement {
        sql: format!("SELECT COUNT(*) FROM `{table}`{}", filter.sql),
        params: filter.params,
    })
}

pub fn delete(table: &str, predicates: &[Predicate]) -> Result<Statement, MicrolightError> {
    let table = validate_identifier(table)?;
    if predicates.is_empty() {
        return Err(MicrolightError::UnsafeBulkOperation("delete"));
    }
    let filter = where_clause(predicates)?;
    Ok(Statement {
        sql: format!("DELETE FROM `{table}`{}", filter.sql),
        params: filter.params,
    })
}

pub fn insert(table: &str, values: Vec<(&str, SqlValue)>) -> Result<Statement, MicrolightError> {
    let table = validate_identifier(table)?;
    if values.is_empty() {
        return Err(MicrolightError::InvalidRequest(format!("insert into `{table}` without columns")));
    }
    let mut columns = Vec::with_capacity(values.len());
    let mut params = Vec::with_capacity(values.len());
    for (column, value) in values {
        columns.push(format!("`{}`", validate_identifier(column)?));
        params.push(value);
    }
    let placeholders = vec!["?"; params.len()].join(", ");
    Ok(Statement {
        sql: format!("INSERT INTO `{table}` ({}) VALUES ({placeholders})", columns.join(", ")),
        params,
    })
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ColumnType {
    Text,
    Integer,
    PrimaryKey,
    /// Any other SQLite type keyword, e.g. `real` or `blob`.
    Custom(String),
}

impl ColumnType {
    fn token(&self) -> &str {
        match self {
            ColumnType::Text => "text",
            ColumnType::Integer => "integer",
            ColumnType::PrimaryKey => "integer primary key",
            ColumnType::Custom(token) => token,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ColumnDefinition {
    pub name: String,
    pub kind: ColumnType,
    pub nullable: bool,
}

impl ColumnDefinition {
    pub fn new(name: impl Into<String>, kind: ColumnType, nullable: bool) -> Self {
        Self {
            name: name.into(),
            kind,
            nullable,
        }
    }

    pub fn primary_key(name: impl Into<String>) -> Self {
        Self::new(name, ColumnType::PrimaryKey, true)
    }

    pub fn text(name: impl Into<String>) -> Self {
        Self::new(name, ColumnType::Text, true)
    }

    pub fn required_text(name: impl Into<String>) -> Self {
        Self::new(name, ColumnType::Text, false)
    }

    pub fn integer(name: impl Into<String>) -> Self {
        Self::new(name, ColumnType::Integer, true)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ForeignKeyRef {
    pub local_column: String,
    pub foreign_table: String,
    pub foreign_column: String,
}

impl ForeignKeyRef {
    pub fn new(
        local_column: impl Into<String>,
        foreign_table: impl Into<String>,
        foreign_column: impl Into<String>,
    ) -> Self {
        Self {
            local_column: local_column.into(),
            foreign_table: foreign_table.into(),
            foreign_column: foreign_column.into(),
        }
    }
}

/// Idempotent `CREATE TABLE IF NOT EXISTS` for the given columns.
pub fn create_table(
    table: &str,
    columns: &[ColumnDefinition],
    foreign_keys: &[ForeignKeyRef],
) -> Result<String, MicrolightError> {
    let table = validate_identifier(table)?;
    if columns.is_empty() {
        return Err(MicrolightError::InvalidRequest(format!("table `{table}` has no columns")));
    }
    let mut parts = Vec::with_capacity(columns.len() + foreign_keys.len());
    for column in columns {
        let name = validate_identifier(&column.name)?;
        let kind = validate_type_token(column.kind.token())?.to_uppercase();
        let not_null = if column.nullable { "" } else { " NOT NULL" };
        parts.push(format!("`{name}` {kind}{not_null}"));
    }
    for fk in foreign_keys {
        let local = validate_identifier(&fk.local_column)?;
        let foreign_table = validate_identifier(&fk.foreign_table)?;
        let foreign_column = validate_identifier(&fk.foreign_column)?;
        parts.push(format!(
            "FOREIGN KEY(`{local}`) REFERENCES `{foreign_table}`(`{foreign_column}`)"
        ));
    }
    Ok(format!("CREATE TABLE IF NOT EXISTS `{table}` ({})", parts.join(", ")))
}
