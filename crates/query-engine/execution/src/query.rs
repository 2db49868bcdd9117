//! Execute a client statement against the database.

use futures_util::TryStreamExt;
use serde_json::Value;
use sqlx::postgres::{PgConnection, PgTypeInfo};
use sqlx::{Either, Executor};
use tracing::{info_span, Instrument};

use crate::decode::decode_row;
use crate::error::Error;
use crate::params::bind_parameters;
use crate::value::Row;

/// A statement as the client sent it, with its positional parameters.
#[derive(Debug, Clone, PartialEq)]
pub struct QueryRequest {
    pub sql: String,
    pub params: Vec<Value>,
}

impl QueryRequest {
    pub fn new(sql: impl Into<String>) -> QueryRequest {
        QueryRequest {
            sql: sql.into(),
            params: Vec::new(),
        }
    }

    #[must_use]
    pub fn with_params(mut self, params: Vec<Value>) -> QueryRequest {
        self.params = params;
        self
    }
}

/// Everything a statement produced.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct QueryOutput {
    /// Rows in the order the database returned them.
    pub rows: Vec<Row>,
    /// Rows affected, summed over every statement in the request.
    pub rows_affected: u64,
    /// The leading keyword of the statement, upper-cased, e.g. `SELECT`.
    pub command: String,
}

/// Execute a statement on a connection.
///
/// Without parameters the SQL goes through the simple query protocol, so a
/// request may hold several statements separated by semicolons. With parameters
/// the statement is described first and every parameter is sent as the type the
/// server inferred for its placeholder.
pub async fn execute(
    connection: &mut PgConnection,
    request: &QueryRequest,
) -> Result<QueryOutput, Error> {
    let mut output = QueryOutput {
        command: command_of(&request.sql),
        ..QueryOutput::default()
    };
    tracing::debug!(
        command = %output.command,
        params = request.params.len(),
        "executing statement"
    );

    if request.params.is_empty() {
        let mut results = (&mut *connection).fetch_many(request.sql.as_str());
        while let Some(result) = results.try_next().await? {
            collect(&mut output, result)?;
        }
    } else {
        let types = describe_parameters(connection, &request.sql)
            .instrument(info_span!("Describe statement"))
            .await?;
        let arguments = bind_parameters(&types, &request.params)?;
        let mut results = sqlx::query_with(&request.sql, arguments).fetch_many(&mut *connection);
        while let Some(result) = results.try_next().await? {
            collect(&mut output, result)?;
        }
    }

    tracing::debug!(
        rows = output.rows.len(),
        rows_affected = output.rows_affected,
        "statement finished"
    );
    Ok(output)
}

fn collect(
    output: &mut QueryOutput,
    result: Either<sqlx::postgres::PgQueryResult, sqlx::postgres::PgRow>,
) -> Result<(), Error> {
    match result {
        Either::Left(done) => output.rows_affected += done.rows_affected(),
        Either::Right(row) => output.rows.push(decode_row(&row)?),
    }
    Ok(())
}

/// The types PostgreSQL infers for the statement's placeholders.
async fn describe_parameters(
    connection: &mut PgConnection,
    sql: &str,
) -> Result<Vec<PgTypeInfo>, Error> {
    let described = (&mut *connection).describe(sql).await?;
    Ok(match described.parameters() {
        Some(Either::Left(types)) => types.to_vec(),
        Some(Either::Right(_)) | None => Vec::new(),
    })
}

/// The command tag PostgreSQL reports for a statement: its first keyword,
/// upper-cased, after leading whitespace and comments. `VALUES` and `TABLE`
/// report `SELECT`, and a `WITH` statement reports its main statement.
pub fn command_of(sql: &str) -> String {
    let keyword = first_keyword(skip_comments(sql));
    match keyword.as_str() {
        "VALUES" | "TABLE" => "SELECT".to_string(),
        "WITH" => main_statement(sql).unwrap_or(keyword),
        _ => keyword,
    }
}

fn skip_comments(sql: &str) -> &str {
    let mut rest = sql.trim_start();
    loop {
        if let Some(comment) = rest.strip_prefix("--") {
            rest = comment
                .split_once('\n')
                .map_or("", |(_, after)| after)
                .trim_start();
        } else if let Some(comment) = rest.strip_prefix("/*") {
            rest = comment
                .split_once("*/")
                .map_or("", |(_, after)| after)
                .trim_start();
        } else {
            return rest;
        }
    }
}

fn first_keyword(sql: &str) -> String {
    sql.trim_start_matches(|c: char| c == '(' || c.is_whitespace())
        .split(|c: char| !c.is_ascii_alphabetic())
        .next()
        .unwrap_or_default()
        .to_ascii_uppercase()
}

/// The statement a `WITH` query runs: the first statement keyword outside
/// the parenthesised CTE bodies.
fn main_statement(sql: &str) -> Option<String> {
    top_level_words(sql)
        .into_iter()
        .skip_while(|word| word != "WITH")
        .skip(1)
        .find_map(|word| match word.as_str() {
            "SELECT" | "INSERT" | "UPDATE" | "DELETE" | "MERGE" => Some(word),
            "VALUES" | "TABLE" => Some("SELECT".to_string()),
            _ => None,
        })
}

/// Upper-cased words outside parentheses, quotes and comments.
fn top_level_words(sql: &str) -> Vec<String> {
    let mut words = Vec::new();
    let mut depth = 0usize;
    let mut word = String::new();
    let mut chars = sql.chars().peekable();

    let mut flush = |word: &mut String, depth: usize| {
        if depth == 0 && !word.is_empty() {
            words.push(word.to_ascii_uppercase());
        }
        word.clear();
    };

    while let Some(c) = chars.next() {
        match c {
            c if c.is_ascii_alphanumeric() || c == '_' => {
                word.push(c);
                continue;
            }
            '(' => {
                flush(&mut word, depth);
                depth += 1;
            }
            ')' => {
                flush(&mut word, depth);
                depth = depth.saturating_sub(1);
            }
            '\'' | '"' => {
                flush(&mut word, depth);
                for inner in chars.by_ref() {
                    if inner == c {
                        break;
                    }
                }
            }
            '-' if chars.peek() == Some(&'-') => {
                flush(&mut word, depth);
                for inner in chars.by_ref() {
                    if inner == '\n' {
                        break;
                    }
                }
            }
            '/' if chars.peek() == Some(&'*') => {
                flush(&mut word, depth);
                chars.next();
                let mut previous = ' ';
                for inner in chars.by_ref() {
                    if previous == '*' && inner == '/' {
                        break;
                    }
                    previous = inner;
                }
            }
            _ => flush(&mut word, depth),
        }
    }
    flush(&mut word, depth);
    words
}
