//! The intermediate relational store (Component D): models the template's
//! table tree, buffers solver rows, and answers join queries after `finish`.

mod encode;
mod pool;

pub use encode::ColumnType;
pub use pool::Pool;

use std::cell::{Cell, RefCell};
use std::collections::{BTreeSet, HashMap, HashSet};
use std::sync::Arc;

use rusqlite::types::Value as SqlValue;
use rusqlite::{params_from_iter, Connection};
use serde::{Deserialize, Serialize};
use serde_json::Value;

use self::encode::Encoder;
use self::pool::PoolConnection;
use crate::prelude::*;
use crate::schema::{Schema, TableId};
use crate::template::{Node, Symbol};

/// Configuration the caller supplies before a solve: which symbols have a
/// declared host type (bypassing the surrogate-encoding shim) and how many
/// pooled connections to keep around for concurrent post-`finish` reads.
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(default)]
pub struct StoreConfig {
    pub declared_types: HashMap<String, ColumnType>,
    pub pool_size: usize,
}

impl Default for StoreConfig {
    fn default() -> Self {
        StoreConfig {
            declared_types: HashMap::new(),
            pool_size: 1,
        }
    }
}

/// Which symbols a query should project. `Everything` is the sentinel
/// described in the storage contract: every non-internal symbol column
/// reachable from the relevant tables.
#[derive(Clone, Debug)]
pub enum QuerySymbols {
    Some(Vec<Symbol>),
    Everything,
}

struct BufferedRow {
    id: i64,
    parent_id: Option<i64>,
    values: HashMap<Symbol, Value>,
}

/// The intermediate. Owns one pooled connection exclusively for the
/// lifetime of a solve and the substitutes that follow it.
pub struct Store {
    pool: Arc<Pool>,
    conn: PoolConnection,
    schema: Schema,
    config: StoreConfig,
    sizes: RefCell<HashMap<TableId, i64>>,
    buffers: RefCell<HashMap<TableId, Vec<BufferedRow>>>,
    encoder: RefCell<Encoder>,
    finished: Cell<bool>,
}

impl Store {
    /// Derives the schema from `template`, opens a fresh in-memory database,
    /// and creates every table the schema names.
    pub fn build(template: &Node, config: StoreConfig) -> Result<Self, StoreError> {
        let schema = Schema::build(template);

        // A fresh internal symbol's unique name doubles as this store's
        // private shared-cache database name - no other Store instance can
        // collide with it.
        let db_name = Symbol::internal_fresh("vartree_db");
        let pool = Pool::open(db_name.name(), config.pool_size.max(1))?;
        let conn = pool.get()?;

        let mut sizes = HashMap::new();
        let mut buffers = HashMap::new();

        for table in &schema.tables {
            create_table(&conn, &schema, table, &config)?;
            sizes.insert(table.clone(), 0);
            buffers.insert(table.clone(), Vec::new());
        }

        Ok(Store {
            pool,
            conn,
            schema,
            config,
            sizes: RefCell::new(sizes),
            buffers: RefCell::new(buffers),
            encoder: RefCell::new(Encoder::default()),
            finished: Cell::new(false),
        })
    }

    pub fn schema(&self) -> &Schema {
        &self.schema
    }

    /// The number of rows buffered (or committed) in `table`. Valid both
    /// before and after `finish`. Doubles as the 0-based id the next
    /// appended row will receive.
    pub fn size(&self, table: &TableId) -> i64 {
        *self.sizes.borrow().get(table).unwrap_or(&0)
    }

    /// Buffers one row into `table`, assigning it the next sequential id.
    /// Returns that id.
    pub fn append(
        &self,
        table: &TableId,
        values: HashMap<Symbol, Value>,
        parent_id: i64,
    ) -> Result<i64, StoreError> {
        self.append_inner(table, values, Some(parent_id))
    }

    /// Appends a row whose every declared symbol column is `null` - used by
    /// the `Nullable` error handler's fallback policy.
    pub fn append_null_row(&self, table: &TableId, parent_id: i64) -> Result<i64, StoreError> {
        let columns = self
            .schema
            .columns
            .get(table)
            .cloned()
            .unwrap_or_default();
        let values = columns.into_iter().map(|s| (s, Value::Null)).collect();
        self.append_inner(table, values, Some(parent_id))
    }

    fn append_inner(
        &self,
        table: &TableId,
        values: HashMap<Symbol, Value>,
        parent_id: Option<i64>,
    ) -> Result<i64, StoreError> {
        let mut sizes = self.sizes.borrow_mut();
        let id = *sizes.get(table).unwrap_or(&0);
        sizes.insert(table.clone(), id + 1);
        drop(sizes);

        self.buffers
            .borrow_mut()
            .entry(table.clone())
            .or_default()
            .push(BufferedRow { id, parent_id, values });

        Ok(id)
    }

    /// Inserts the singleton `root` row, bulk-inserts every buffered row in
    /// parent-first order, and transitions the store to read-only.
    pub fn finish(&mut self) -> Result<(), StoreError> {
        self.conn.execute("INSERT INTO root (_id) VALUES (0);", [])?;

        for table in &self.schema.tables {
            if *table == TableId::Root {
                continue;
            }

            let rows = self.buffers.borrow_mut().remove(table).unwrap_or_default();
            if rows.is_empty() {
                continue;
            }

            let columns: Vec<Symbol> = self
                .schema
                .columns
                .get(table)
                .map(|set| set.iter().cloned().collect())
                .unwrap_or_default();

            let mut col_names = vec!["_id".to_string(), "_parent_id".to_string()];
            col_names.extend(columns.iter().map(|s| column_name(s)));

            let placeholders: Vec<String> = (1..=col_names.len()).map(|i| format!("?{i}")).collect();
            let sql = format!(
                "INSERT INTO \"{}\" ({}) VALUES ({});",
                table.sql_name(),
                col_names.join(", "),
                placeholders.join(", ")
            );

            let mut stmt = self.conn.prepare(&sql)?;

            for row in &rows {
                let mut params: Vec<SqlValue> = vec![SqlValue::Integer(row.id), row
                    .parent_id
                    .map(SqlValue::Integer)
                    .unwrap_or(SqlValue::Null)];

                for sym in &columns {
                    let value = row.values.get(sym).cloned().unwrap_or(Value::Null);
                    params.push(self.encode_value(sym, &value));
                }

                stmt.execute(params_from_iter(params))?;
            }

            debug!(table = %table.sql_name(), rows = rows.len(), "flushed buffered rows");
        }

        self.finished.set(true);
        trace!("store finished: {:?}", self.dump_sizes());

        Ok(())
    }

    /// Every table's buffered/committed row count, for debugging.
    #[cfg(test)]
    pub fn dump(&self) -> HashMap<String, i64> {
        self.dump_sizes()
    }

    fn dump_sizes(&self) -> HashMap<String, i64> {
        self.sizes
            .borrow()
            .iter()
            .map(|(t, n)| (t.sql_name(), *n))
            .collect()
    }

    /// Every solution, excluding internal symbols.
    pub fn iterate(&self) -> Result<Vec<HashMap<Symbol, Value>>, StoreError> {
        self.query(&QuerySymbols::Everything, &HashMap::new())
    }

    /// Exactly one solution. The caller asserts uniqueness; this errors if
    /// zero or more than one row satisfies the (implicit, unconstrained)
    /// query instead of silently picking one.
    pub fn get_single(&self) -> Result<HashMap<Symbol, Value>, StoreError> {
        let mut results = self.iterate()?;
        match results.len() {
            0 => Err(StoreError::Pool("get_single: no rows".into())),
            1 => Ok(results.remove(0)),
            n => Err(StoreError::Pool(format!("get_single: expected one row, found {n}"))),
        }
    }

    fn encode_value(&self, sym: &Symbol, value: &Value) -> SqlValue {
        if let Some(ty) = self.config.declared_types.get(sym.name()) {
            return direct_to_sql(value, *ty);
        }
        if matches!(value, Value::Null) {
            return SqlValue::Null;
        }
        SqlValue::Integer(self.encoder.borrow_mut().encode(value))
    }

    fn decode_value(&self, sym: &Symbol, raw: SqlValue) -> Value {
        if let Some(ty) = self.config.declared_types.get(sym.name()) {
            return sql_to_direct(raw, *ty);
        }
        match raw {
            SqlValue::Null => Value::Null,
            SqlValue::Integer(i) => self.encoder.borrow().decode(i),
            other => sql_to_direct(other, ColumnType::Text),
        }
    }

    /// Issues `SELECT DISTINCT` over `symbols`, joining only the tables
    /// transitively required and filtering by `known_values` and the
    /// repeated-symbol equi-join constraints.
    pub fn query(
        &self,
        symbols: &QuerySymbols,
        known_values: &HashMap<Symbol, Value>,
    ) -> Result<Vec<HashMap<Symbol, Value>>, StoreError> {
        if !self.finished.get() {
            return Err(StoreError::Pool("query issued before finish()".into()));
        }

        let requested = self.resolve_requested(symbols);
        let relevant_tables = self.relevant_tables(&requested, known_values);
        let ordered: Vec<TableId> = self
            .schema
            .tables
            .iter()
            .filter(|t| relevant_tables.contains(t))
            .cloned()
            .collect();

        let mut select = Vec::new();
        for sym in &requested {
            let table = self.owning_table_in(sym, &ordered);
            if let Some(table) = table {
                select.push(format!(
                    "\"{}\".\"{}\" AS \"{}\"",
                    table.sql_name(),
                    column_name(sym),
                    sym.name()
                ));
            }
        }

        if select.is_empty() {
            return Ok(Vec::new());
        }

        let mut sql = format!("SELECT DISTINCT {} FROM \"{}\"", select.join(", "), ordered[0].sql_name());

        for table in ordered.iter().skip(1) {
            let parent = self.schema.parent_of.get(table).cloned().unwrap_or(TableId::Root);
            sql.push_str(&format!(
                " JOIN \"{}\" ON \"{}\".\"_parent_id\" = \"{}\".\"_id\"",
                table.sql_name(),
                table.sql_name(),
                parent.sql_name()
            ));
        }

        let mut conditions = Vec::new();
        let mut params: Vec<SqlValue> = Vec::new();

        for (sym, value) in known_values {
            if let Some(table) = self.owning_table_in(sym, &ordered) {
                conditions.push(format!(
                    "\"{}\".\"{}\" = ?{}",
                    table.sql_name(),
                    column_name(sym),
                    params.len() + 1
                ));
                params.push(self.encode_value(sym, value));
            }
        }

        for (sym, occurrence_tables) in &self.schema.repeated {
            let present: Vec<TableId> = occurrence_tables
                .iter()
                .filter(|t| relevant_tables.contains(*t))
                .cloned()
                .collect();
            if present.len() < 2 {
                continue;
            }

            // The schema's canonical table for this symbol anchors the
            // equi-join whenever it survived relevance filtering; otherwise
            // fall back to whichever occurrence did.
            let anchor = self
                .schema
                .canonical
                .get(sym)
                .filter(|c| present.contains(*c))
                .cloned()
                .unwrap_or_else(|| present[0].clone());

            for other in present.iter().filter(|t| **t != anchor) {
                conditions.push(format!(
                    "\"{}\".\"{}\" = \"{}\".\"{}\"",
                    anchor.sql_name(),
                    column_name(sym),
                    other.sql_name(),
                    column_name(sym)
                ));
            }
        }

        if !conditions.is_empty() {
            sql.push_str(" WHERE ");
            sql.push_str(&conditions.join(" AND "));
        }
        sql.push(';');

        trace!(%sql, "issuing query");

        let conn = self.pool.get()?;
        let mut stmt = conn.prepare(&sql)?;
        let mut rows_iter = stmt.query(params_from_iter(params))?;

        let mut out = Vec::new();
        while let Some(row) = rows_iter.next()? {
            let mut record = HashMap::new();
            for (i, sym) in requested.iter().enumerate() {
                if self.owning_table_in(sym, &ordered).is_none() {
                    continue;
                }
                let raw: SqlValue = row.get(i)?;
                record.insert(sym.clone(), self.decode_value(sym, raw));
            }
            out.push(record);
        }

        Ok(out)
    }

    fn resolve_requested(&self, symbols: &QuerySymbols) -> Vec<Symbol> {
        match symbols {
            QuerySymbols::Some(syms) => syms.clone(),
            QuerySymbols::Everything => {
                let mut set = BTreeSet::new();
                for columns in self.schema.columns.values() {
                    for sym in columns {
                        if !sym.is_internal() {
                            set.insert(sym.clone());
                        }
                    }
                }
                set.into_iter().collect()
            }
        }
    }

    fn relevant_tables(
        &self,
        requested: &[Symbol],
        known_values: &HashMap<Symbol, Value>,
    ) -> HashSet<TableId> {
        let mut relevant = HashSet::new();
        relevant.insert(TableId::Root);

        let mut symbols: BTreeSet<Symbol> = requested.iter().cloned().collect();
        symbols.extend(known_values.keys().cloned());
        symbols.extend(self.schema.repeated.keys().cloned());

        for sym in symbols {
            for table in self.tables_containing(&sym) {
                let mut cur = table.clone();
                relevant.insert(cur.clone());
                while let Some(parent) = self.schema.parent_of.get(&cur) {
                    relevant.insert(parent.clone());
                    if *parent == TableId::Root {
                        break;
                    }
                    cur = parent.clone();
                }
            }
        }

        relevant
    }

    fn tables_containing(&self, sym: &Symbol) -> Vec<TableId> {
        self.schema
            .columns
            .iter()
            .filter(|(_, cols)| cols.contains(sym))
            .map(|(t, _)| t.clone())
            .collect()
    }

    fn owning_table_in(&self, sym: &Symbol, ordered: &[TableId]) -> Option<TableId> {
        ordered
            .iter()
            .find(|t| {
                self.schema
                    .columns
                    .get(*t)
                    .map(|cols| cols.contains(sym))
                    .unwrap_or(false)
            })
            .cloned()
    }
}

fn column_name(sym: &Symbol) -> String {
    let mut out = String::from("sym_");
    for c in sym.name().chars() {
        out.push(if c.is_ascii_alphanumeric() { c } else { '_' });
    }
    out
}

fn create_table(
    conn: &Connection,
    schema: &Schema,
    table: &TableId,
    config: &StoreConfig,
) -> Result<(), StoreError> {
    let mut sql = format!("CREATE TABLE \"{}\" (_id INTEGER PRIMARY KEY", table.sql_name());

    if *table != TableId::Root {
        sql.push_str(", _parent_id INTEGER NOT NULL");
    }

    if let Some(columns) = schema.columns.get(table) {
        for sym in columns {
            let sql_type = config
                .declared_types
                .get(sym.name())
                .map(sql_type_name)
                .unwrap_or("INTEGER");
            sql.push_str(&format!(", \"{}\" {}", column_name(sym), sql_type));
        }
    }

    sql.push_str(");");
    conn.execute(&sql, [])?;

    if *table != TableId::Root {
        conn.execute(
            &format!(
                "CREATE INDEX \"{}_parent_idx\" ON \"{}\" (_parent_id);",
                table.sql_name(),
                table.sql_name()
            ),
            [],
        )?;
    }

    Ok(())
}

fn sql_type_name(ty: &ColumnType) -> &'static str {
    match ty {
        ColumnType::Text => "TEXT",
        ColumnType::Integer => "INTEGER",
        ColumnType::Real => "REAL",
    }
}

fn direct_to_sql(value: &Value, ty: ColumnType) -> SqlValue {
    match (ty, value) {
        (_, Value::Null) => SqlValue::Null,
        (ColumnType::Text, v) => SqlValue::Text(v.as_str().map(str::to_owned).unwrap_or_else(|| v.to_string())),
        (ColumnType::Integer, v) => SqlValue::Integer(v.as_i64().unwrap_or_default()),
        (ColumnType::Real, v) => SqlValue::Real(v.as_f64().unwrap_or_default()),
    }
}

fn sql_to_direct(raw: SqlValue, ty: ColumnType) -> Value {
    match (ty, raw) {
        (_, SqlValue::Null) => Value::Null,
        (ColumnType::Text, SqlValue::Text(s)) => Value::String(s),
        (ColumnType::Integer, SqlValue::Integer(i)) => Value::from(i),
        (ColumnType::Real, SqlValue::Real(r)) => Value::from(r),
        (_, SqlValue::Text(s)) => Value::String(s),
        (_, SqlValue::Integer(i)) => Value::from(i),
        (_, SqlValue::Real(r)) => Value::from(r),
        (_, SqlValue::Blob(_)) => Value::Null,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::template::Node;

    use pretty_assertions::assert_eq;

    fn sample_template() -> Node {
        Node::repetition([Node::container([("name".into(), Node::symbol("name"))])])
    }

    #[test]
    fn append_and_finish_roundtrip() {
        let template = sample_template();
        let mut store = Store::build(&template, StoreConfig::default()).unwrap();
        let table = store.schema().table_of(&[crate::template::PathSegment::Elem(0)]);

        let mut row = HashMap::new();
        row.insert(Symbol::new("name"), Value::from("john"));
        let id = store.append(&table, row, 0).unwrap();
        assert_eq!(id, 0);
        assert_eq!(store.size(&table), 1);

        store.finish().unwrap();

        let results = store
            .query(&QuerySymbols::Some(vec![Symbol::new("name")]), &HashMap::new())
            .unwrap();
        assert_eq!(results.len(), 1);
        assert_eq!(results[0].get(&Symbol::new("name")), Some(&Value::from("john")));
    }

    #[test]
    fn declared_types_bypass_the_encoder() {
        let template = sample_template();
        let mut config = StoreConfig::default();
        config.declared_types.insert("name".into(), ColumnType::Text);

        let mut store = Store::build(&template, config).unwrap();
        let table = store.schema().table_of(&[crate::template::PathSegment::Elem(0)]);

        let mut row = HashMap::new();
        row.insert(Symbol::new("name"), Value::from("abe"));
        store.append(&table, row, 0).unwrap();
        store.finish().unwrap();

        let results = store
            .query(&QuerySymbols::Everything, &HashMap::new())
            .unwrap();
        assert_eq!(results[0][&Symbol::new("name")], Value::from("abe"));
    }
}
