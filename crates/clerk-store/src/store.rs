use std::path::Path;

use rusqlite::{Connection, params};
use uuid::Uuid;

use clerk_core::{
    BudgetBucket, BudgetOperator, BudgetRecord, KeyRecord, Preferences, SessionContext,
    SessionQuery, SpecRecord, StructuredQuery,
};

use crate::error::{Result, StoreError};
use crate::schema;

/// SQLite-backed storage for the two durable records: learned preferences
/// and the current session context. Saves are full-record rewrites inside
/// one transaction, so a reader never sees a half-written dimension.
#[derive(Debug)]
pub struct Store {
    conn: Connection,
}

impl Store {
    pub fn open(path: &Path) -> Result<Self> {
        let conn = Connection::open(path)?;
        schema::initialize(&conn)?;
        Ok(Self { conn })
    }

    pub fn open_in_memory() -> Result<Self> {
        let conn = Connection::open_in_memory()?;
        schema::initialize(&conn)?;
        Ok(Self { conn })
    }

    pub fn conn(&self) -> &Connection {
        &self.conn
    }

    // --- Metadata ---

    pub fn get_metadata(&self, key: &str) -> Result<Option<String>> {
        let mut stmt = self
            .conn
            .prepare("SELECT value FROM metadata WHERE key = ?1")?;
        let result = stmt.query_row([key], |row| row.get(0)).ok();
        Ok(result)
    }

    pub fn set_metadata(&self, key: &str, value: &str) -> Result<()> {
        self.conn.execute(
            "INSERT OR REPLACE INTO metadata (key, value) VALUES (?1, ?2)",
            params![key, value],
        )?;
        Ok(())
    }

    // --- Learned preferences ---

    pub fn save_preferences(&self, prefs: &Preferences) -> Result<()> {
        let tx = self.conn.unchecked_transaction()?;
        tx.execute("DELETE FROM preferences", [])?;
        {
            let mut stmt = tx.prepare(
                "INSERT INTO preferences
                 (dimension, key, count, confidence, total_amount, operator, spec_type, spec_value, last_seen, seq)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10)",
            )?;

            for (seq, r) in prefs.budget.iter().enumerate() {
                stmt.execute(params![
                    "budget",
                    r.bucket.label(),
                    r.count,
                    r.confidence,
                    Some(r.total_amount),
                    Some(r.operator.to_string()),
                    Option::<String>::None,
                    Option::<String>::None,
                    0u64,
                    seq as i64,
                ])?;
            }
            for (dimension, records) in [
                ("categories", &prefs.categories),
                ("brands", &prefs.brands),
                ("purposes", &prefs.purposes),
            ] {
                for (seq, r) in records.iter().enumerate() {
                    stmt.execute(params![
                        dimension,
                        r.key,
                        r.count,
                        r.confidence,
                        Option::<f64>::None,
                        Option::<String>::None,
                        Option::<String>::None,
                        Option::<String>::None,
                        r.last_seen,
                        seq as i64,
                    ])?;
                }
            }
            for (seq, r) in prefs.specs.iter().enumerate() {
                stmt.execute(params![
                    "specs",
                    r.key,
                    r.count,
                    r.confidence,
                    Option::<f64>::None,
                    Option::<String>::None,
                    Some(r.spec_type.as_str()),
                    Some(r.value.to_string()),
                    r.last_seen,
                    seq as i64,
                ])?;
            }
        }
        tx.commit()?;
        Ok(())
    }

    pub fn load_preferences(&self) -> Result<Preferences> {
        let mut prefs = Preferences {
            budget: self.load_budget_records()?,
            ..Preferences::default()
        };
        prefs.categories = self.load_key_records("categories")?;
        prefs.brands = self.load_key_records("brands")?;
        prefs.purposes = self.load_key_records("purposes")?;
        prefs.specs = self.load_spec_records()?;
        Ok(prefs)
    }

    /// Reset only the learned preferences; session context is untouched.
    pub fn clear_preferences(&self) -> Result<()> {
        self.conn.execute("DELETE FROM preferences", [])?;
        Ok(())
    }

    fn load_budget_records(&self) -> Result<Vec<BudgetRecord>> {
        let mut stmt = self.conn.prepare(
            "SELECT key, count, confidence, total_amount, operator
             FROM preferences WHERE dimension = 'budget' ORDER BY seq",
        )?;
        let rows: Vec<(String, u32, f64, Option<f64>, Option<String>)> = stmt
            .query_map([], |row| {
                Ok((
                    row.get(0)?,
                    row.get(1)?,
                    row.get(2)?,
                    row.get(3)?,
                    row.get(4)?,
                ))
            })?
            .collect::<std::result::Result<_, _>>()?;

        rows.into_iter()
            .map(|(label, count, confidence, total_amount, operator)| {
                let bucket = BudgetBucket::from_label(&label).ok_or_else(|| {
                    StoreError::InvalidData(format!("unknown budget bucket: {label}"))
                })?;
                Ok(BudgetRecord {
                    bucket,
                    count,
                    total_amount: total_amount.unwrap_or(0.0),
                    operator: parse_operator(operator.as_deref())?,
                    confidence,
                })
            })
            .collect()
    }

    fn load_key_records(&self, dimension: &str) -> Result<Vec<KeyRecord>> {
        let mut stmt = self.conn.prepare(
            "SELECT key, count, confidence, last_seen
             FROM preferences WHERE dimension = ?1 ORDER BY seq",
        )?;
        let records = stmt
            .query_map([dimension], |row| {
                Ok(KeyRecord {
                    key: row.get(0)?,
                    count: row.get(1)?,
                    confidence: row.get(2)?,
                    last_seen: row.get(3)?,
                })
            })?
            .collect::<std::result::Result<_, _>>()?;
        Ok(records)
    }

    fn load_spec_records(&self) -> Result<Vec<SpecRecord>> {
        let mut stmt = self.conn.prepare(
            "SELECT key, count, confidence, spec_type, spec_value, last_seen
             FROM preferences WHERE dimension = 'specs' ORDER BY seq",
        )?;
        let rows: Vec<(String, u32, f64, Option<String>, Option<String>, u64)> = stmt
            .query_map([], |row| {
                Ok((
                    row.get(0)?,
                    row.get(1)?,
                    row.get(2)?,
                    row.get(3)?,
                    row.get(4)?,
                    row.get(5)?,
                ))
            })?
            .collect::<std::result::Result<_, _>>()?;

        rows.into_iter()
            .map(|(key, count, confidence, spec_type, spec_value, last_seen)| {
                let value_json = spec_value.unwrap_or_else(|| "null".to_string());
                let value = serde_json::from_str(&value_json).map_err(|e| {
                    StoreError::InvalidData(format!("invalid spec value for '{key}': {e}"))
                })?;
                Ok(SpecRecord {
                    key,
                    spec_type: spec_type.unwrap_or_default(),
                    value,
                    count,
                    confidence,
                    last_seen,
                })
            })
            .collect()
    }

    // --- Session context ---

    pub fn save_session(&self, session: &SessionContext) -> Result<()> {
        let tx = self.conn.unchecked_transaction()?;
        tx.execute("DELETE FROM session_queries", [])?;
        {
            let mut stmt = tx.prepare(
                "INSERT INTO session_queries (id, query, parsed, timestamp, seq)
                 VALUES (?1, ?2, ?3, ?4, ?5)",
            )?;
            for (seq, entry) in session.session_queries.iter().enumerate() {
                let parsed = serde_json::to_string(&entry.parsed).map_err(|e| {
                    StoreError::InvalidData(format!("failed to encode parsed query: {e}"))
                })?;
                stmt.execute(params![
                    entry.id.to_string(),
                    entry.query,
                    parsed,
                    entry.timestamp,
                    seq as i64,
                ])?;
            }
        }

        let browsed = serde_json::to_string(&session.browsed_products)
            .map_err(|e| StoreError::InvalidData(format!("failed to encode session: {e}")))?;
        for (key, value) in [
            ("session_current_page", session.current_page.as_str()),
            ("session_last_query", session.last_query.as_str()),
            ("session_browsed_products", browsed.as_str()),
        ] {
            tx.execute(
                "INSERT OR REPLACE INTO metadata (key, value) VALUES (?1, ?2)",
                params![key, value],
            )?;
        }
        tx.execute(
            "INSERT OR REPLACE INTO metadata (key, value) VALUES ('session_product_count', ?1)",
            [session.product_count.to_string()],
        )?;
        tx.commit()?;
        Ok(())
    }

    pub fn load_session(&self) -> Result<SessionContext> {
        let mut session = SessionContext::default();

        if let Some(page) = self.get_metadata("session_current_page")? {
            session.current_page = page;
        }
        if let Some(query) = self.get_metadata("session_last_query")? {
            session.last_query = query;
        }
        if let Some(count) = self.get_metadata("session_product_count")? {
            session.product_count = count.parse().unwrap_or(0);
        }
        if let Some(browsed) = self.get_metadata("session_browsed_products")? {
            session.browsed_products = serde_json::from_str(&browsed).map_err(|e| {
                StoreError::InvalidData(format!("invalid browsed products: {e}"))
            })?;
        }

        let mut stmt = self.conn.prepare(
            "SELECT id, query, parsed, timestamp FROM session_queries ORDER BY seq",
        )?;
        let rows: Vec<(String, String, String, u64)> = stmt
            .query_map([], |row| {
                Ok((row.get(0)?, row.get(1)?, row.get(2)?, row.get(3)?))
            })?
            .collect::<std::result::Result<_, _>>()?;

        for (id_str, query, parsed_json, timestamp) in rows {
            let parsed: StructuredQuery = serde_json::from_str(&parsed_json).map_err(|e| {
                StoreError::InvalidData(format!("invalid parsed query: {e}"))
            })?;
            session.session_queries.push_back(SessionQuery {
                id: parse_uuid(&id_str)?,
                query,
                parsed,
                timestamp,
            });
        }

        Ok(session)
    }

    // --- Stats ---

    pub fn preference_count(&self, dimension: &str) -> Result<i64> {
        let count = self.conn.query_row(
            "SELECT count(*) FROM preferences WHERE dimension = ?1",
            [dimension],
            |row| row.get(0),
        )?;
        Ok(count)
    }

    pub fn session_query_count(&self) -> Result<i64> {
        let count = self
            .conn
            .query_row("SELECT count(*) FROM session_queries", [], |row| row.get(0))?;
        Ok(count)
    }
}

fn parse_operator(s: Option<&str>) -> Result<BudgetOperator> {
    match s {
        Some("under") => Ok(BudgetOperator::Under),
        Some("around") | None => Ok(BudgetOperator::Around),
        Some(other) => Err(StoreError::InvalidData(format!(
            "unknown budget operator: {other}"
        ))),
    }
}

fn parse_uuid(s: &str) -> Result<Uuid> {
    Uuid::parse_str(s).map_err(|e| StoreError::InvalidData(format!("invalid UUID '{s}': {e}")))
}
