//! Queries bound to an execution engine, and the row-store seam.

use crate::specification::{CompileError, Criterion, Engine, Specification, SqlQuery};

/// Sort on the first exact value of an indexed field.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct SortField {
    pub field: String,
    pub descending: bool,
}

impl SortField {
    pub fn asc(field: impl Into<String>) -> Self {
        Self { field: field.into(), descending: false }
    }

    pub fn desc(field: impl Into<String>) -> Self {
        Self { field: field.into(), descending: true }
    }
}

/// A specification plus ordering, limit and target engine.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Query<C> {
    pub specification: Specification<C>,
    /// Empty sorts by relevance.
    pub sort: Vec<SortField>,
    /// `None` is unbounded.
    pub max: Option<usize>,
    pub engine: Engine,
}

impl<C> Query<C> {
    pub fn new(specification: Specification<C>, engine: Engine) -> Self {
        Self { specification, sort: Vec::new(), max: None, engine }
    }

    pub fn sorted_by(mut self, field: SortField) -> Self {
        self.sort.push(field);
        self
    }

    pub fn limit(mut self, max: usize) -> Self {
        self.max = Some(max);
        self
    }
}

impl<C: Criterion> Query<C> {
    /// The `WHERE` fragment of a row-store query.
    pub fn to_sql(&self) -> Result<SqlQuery, CompileError> {
        let sql = self.specification.to_sql()?;
        tracing::trace!(sql = %sql, "specification: compiled to sql");
        Ok(sql)
    }
}

/// Row-store data access, implemented outside this crate. Each method takes
/// a compiled `WHERE` fragment over the table of `K`/`V`.
pub trait RowStoreDao<K, V> {
    fn get_keys(&self, filter: &SqlQuery) -> anyhow::Result<Vec<K>>;

    fn get_values(&self, filter: &SqlQuery) -> anyhow::Result<Vec<V>>;

    fn get(&self, filter: &SqlQuery) -> anyhow::Result<Vec<(K, V)>>;
}

/// Run a row-store query through `dao`, applying the limit. Sorting is the
/// Dao's concern.
pub fn query_row_store<C, D>(dao: &D, query: &Query<C>) -> anyhow::Result<Vec<C::Value>>
where
    C: Criterion,
    D: RowStoreDao<C::Key, C::Value>,
{
    anyhow::ensure!(
        query.engine == Engine::RowStore,
        "query targets the {} engine, not the row store",
        query.engine
    );
    let mut values = dao.get_values(&query.to_sql()?)?;
    if let Some(max) = query.max {
        values.truncate(max);
    }
    Ok(values)
}
