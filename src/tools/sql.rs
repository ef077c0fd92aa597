//! SQL lookup tool over the internal quarterly financials database.

use std::path::{Path, PathBuf};

use anyhow::Context;
use async_trait::async_trait;
use rusqlite::types::ValueRef;
use rusqlite::{params, Connection, OpenFlags};

use super::Tool;

/// Maximum rows rendered into a single observation.
const MAX_ROWS: usize = 100;

const SAMPLE_ROWS: [(i64, &str, i64, i64); 6] = [
    (2023, "Q1", 85000, 23000),
    (2023, "Q2", 88000, 25000),
    (2023, "Q3", 92000, 28000),
    (2023, "Q4", 95000, 29000),
    (2024, "Q1", 98000, 31000),
    (2024, "Q2", 101000, 33000),
];

/// Execute read-only SQL against the financials database.
pub struct SqlQuery {
    db_path: PathBuf,
}

impl SqlQuery {
    pub fn new(db_path: PathBuf) -> Self {
        Self { db_path }
    }
}

#[async_trait]
impl Tool for SqlQuery {
    fn name(&self) -> &str {
        "sql_database_query"
    }

    fn description(&self) -> &str {
        "Query a SQLite database of QUARTERLY financial data for 2023-2024. Table 'quarterly_financials' has columns: year, quarter, revenue_millions, profit_millions. Best for profit totals, revenue trends and quarterly comparisons. Input: a single SQL query, e.g. SELECT SUM(profit_millions) FROM quarterly_financials WHERE year = 2023"
    }

    async fn invoke(&self, input: &str) -> anyhow::Result<String> {
        let sql = strip_code_fence(input).to_string();
        if sql.is_empty() {
            anyhow::bail!("Empty SQL query");
        }

        tracing::info!("Executing SQL: {}", sql);
        let db_path = self.db_path.clone();
        tokio::task::spawn_blocking(move || run_query(&db_path, &sql))
            .await
            .context("SQL worker panicked")?
    }
}

fn run_query(db_path: &Path, sql: &str) -> anyhow::Result<String> {
    let conn = Connection::open_with_flags(
        db_path,
        OpenFlags::SQLITE_OPEN_READ_ONLY | OpenFlags::SQLITE_OPEN_NO_MUTEX,
    )
    .with_context(|| format!("Failed to open database {}", db_path.display()))?;

    let mut stmt = conn.prepare(sql)?;
    let column_count = stmt.column_count();
    let mut rows = stmt.query([])?;

    let mut rendered = Vec::new();
    let mut truncated = false;
    while let Some(row) = rows.next()? {
        if rendered.len() == MAX_ROWS {
            truncated = true;
            break;
        }
        let values = (0..column_count)
            .map(|i| row.get_ref(i).map(render_value))
            .collect::<Result<Vec<_>, _>>()?;
        rendered.push(if values.len() == 1 {
            format!("({},)", values[0])
        } else {
            format!("({})", values.join(", "))
        });
    }

    if rendered.is_empty() {
        return Ok("Query returned no rows.".to_string());
    }

    let mut result = format!("[{}]", rendered.join(", "));
    if truncated {
        result.push_str(&format!(" ... (showing first {} rows)", MAX_ROWS));
    }
    Ok(result)
}

fn render_value(value: ValueRef<'_>) -> String {
    match value {
        ValueRef::Null => "None".to_string(),
        ValueRef::Integer(i) => i.to_string(),
        ValueRef::Real(f) => f.to_string(),
        ValueRef::Text(t) => format!("'{}'", String::from_utf8_lossy(t)),
        ValueRef::Blob(b) => format!("<{} bytes>", b.len()),
    }
}

/// Remove a surrounding Markdown code fence (```sql ... ```) if present.
fn strip_code_fence(input: &str) -> &str {
    let trimmed = input.trim();
    let Some(body) = trimmed.strip_prefix("```") else {
        return trimmed;
    };
    let body = body.strip_suffix("```").unwrap_or(body);
    // Drop an info string such as `sql` on the opening fence line.
    match body.split_once('\n') {
        Some((info, rest)) if !info.trim().contains(' ') => rest.trim(),
        _ => body.trim(),
    }
}

/// Create the `quarterly_financials` table and insert the sample rows.
///
/// Existing rows are left alone. Returns the number of rows inserted.
pub fn seed_sample_data(db_path: &Path) -> anyhow::Result<usize> {
    let mut conn = Connection::open(db_path)
        .with_context(|| format!("Failed to open database {}", db_path.display()))?;

    conn.execute(
        "CREATE TABLE IF NOT EXISTS quarterly_financials (
            id INTEGER PRIMARY KEY,
            year INTEGER NOT NULL,
            quarter TEXT NOT NULL,
            revenue_millions INTEGER NOT NULL,
            profit_millions INTEGER NOT NULL,
            UNIQUE(year, quarter)
        )",
        [],
    )?;

    let tx = conn.transaction()?;
    let mut inserted = 0;
    {
        let mut stmt = tx.prepare(
            "INSERT OR IGNORE INTO quarterly_financials (year, quarter, revenue_millions, profit_millions) VALUES (?1, ?2, ?3, ?4)",
        )?;
        for (year, quarter, revenue, profit) in SAMPLE_ROWS {
            inserted += stmt.execute(params![year, quarter, revenue, profit])?;
        }
    }
    tx.commit()?;

    tracing::info!(inserted, path = %db_path.display(), "Seeded financials database");
    Ok(inserted)
}
