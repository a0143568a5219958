//! In-process backend
//!
//! [`MemoryStore`] keeps every table in memory behind one mutex. It supports
//! filters, ordering, pagination, projection, grouping with having, and
//! distinct. Joins, preloads and raw SQL are rejected with `Unsupported`.
//!
//! Transactions run on a private snapshot of the store and commit by
//! swapping the snapshot in. If anything else wrote to the store after the
//! snapshot was taken, commit fails and the transaction's writes are
//! discarded.
//!
//! # Example
//!
//! ```rust,ignore
//! use storekit::backend::memory::MemoryStore;
//! use storekit::prelude::*;
//!
//! let store = MemoryStore::new();
//! let users = Repository::<User, _>::new(store.clone());
//! let orders = Repository::<Order, _>::new(store);
//! ```

use std::cmp::Ordering;
use std::collections::HashMap;
use std::fmt;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use super::plan::{column_name, QueryPlan};
use crate::context::Context;
use crate::query::{Filter, FilterCondition, FilterOperator, OrderDirection, Value};
use crate::repository::{
    is_unset_key, ConnectionProvider, Entity, Handle, RepositoryError, RepositoryOperation, Row,
    UnitOfWork,
};

#[derive(Debug, Clone, Default)]
struct Table {
    rows: Vec<Row>,
    last_id: i64,
}

#[derive(Debug, Clone, Default)]
struct Tables {
    tables: HashMap<&'static str, Table>,
    version: u64,
}

/// Shared in-memory store; clones share the same tables
#[derive(Clone, Default)]
pub struct MemoryStore {
    state: Arc<Mutex<Tables>>,
}

impl MemoryStore {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> MutexGuard<'_, Tables> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Number of rows currently stored in `table`
    pub fn row_count(&self, table: &str) -> usize {
        self.lock().tables.get(table).map_or(0, |t| t.rows.len())
    }
}

impl fmt::Debug for MemoryStore {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let state = self.lock();
        f.debug_struct("MemoryStore")
            .field("tables", &state.tables.len())
            .field("version", &state.version)
            .finish()
    }
}

fn guard(ctx: &Context, operation: RepositoryOperation) -> Result<(), RepositoryError> {
    if ctx.is_cancelled() {
        return Err(RepositoryError::cancelled(operation));
    }
    Ok(())
}

impl ConnectionProvider for MemoryStore {
    type Handle = MemoryConnection;
    type Tx = MemoryTx;

    async fn db(&self, ctx: &Context) -> Result<MemoryConnection, RepositoryError> {
        guard(ctx, RepositoryOperation::Get)?;
        Ok(MemoryConnection {
            store: self.clone(),
        })
    }

    async fn begin(&self, ctx: &Context) -> Result<MemoryTx, RepositoryError> {
        guard(ctx, RepositoryOperation::Transaction)?;
        let snapshot = self.lock().clone();
        Ok(MemoryTx {
            store: self.clone(),
            base_version: snapshot.version,
            snapshot,
            dirty: false,
        })
    }
}

/// Rejects what an in-process store cannot evaluate
fn validate(plan: &QueryPlan, operation: RepositoryOperation) -> Result<(), RepositoryError> {
    QueryPlan::reject(!plan.joins.is_empty(), operation, "memory", "joins")?;
    QueryPlan::reject(!plan.preloads.is_empty(), operation, "memory", "preloads")?;
    QueryPlan::reject(!plan.raw.is_empty(), operation, "memory", "raw SQL clauses")?;
    QueryPlan::reject(
        plan.filters.iter().any(Filter::contains_sql)
            || plan.having.as_ref().is_some_and(Filter::contains_sql),
        operation,
        "memory",
        "raw SQL filters",
    )
}

fn matches(plan: &QueryPlan, row: &Row) -> bool {
    plan.filters.iter().all(|filter| eval(filter, row))
}

/// Filtered rows, collapsed to one representative per group
fn grouped<'a>(plan: &QueryPlan, rows: &'a [Row]) -> Vec<&'a Row> {
    let matching = rows.iter().filter(|row| matches(plan, row));
    if plan.group.is_empty() {
        return matching.collect();
    }

    let mut keys: Vec<Vec<&Value>> = Vec::new();
    let mut representatives = Vec::new();
    for row in matching {
        let key: Vec<&Value> = plan.group.iter().map(|c| lookup(row, c)).collect();
        if !keys.contains(&key) {
            keys.push(key);
            representatives.push(row);
        }
    }
    representatives
        .into_iter()
        .filter(|row| plan.having.as_ref().map_or(true, |h| eval(h, row)))
        .collect()
}

/// Rows cut down to the projection, deduplicated when distinct
fn project(plan: &QueryPlan, rows: Vec<&Row>) -> Vec<Row> {
    let projection: Vec<&str> = plan.projection().into_iter().map(column_name).collect();
    let projected = rows.into_iter().map(|row| {
        let mut row = row.clone();
        row.retain(|column| projection.contains(&column));
        row
    });
    if !plan.distinct {
        return projected.collect();
    }
    let mut unique: Vec<Row> = Vec::new();
    for row in projected {
        if !unique.contains(&row) {
            unique.push(row);
        }
    }
    unique
}

fn select(plan: &QueryPlan, rows: &[Row]) -> Vec<Row> {
    let mut selected = grouped(plan, rows);

    let order = plan.effective_order();
    selected.sort_by(|a, b| {
        order
            .iter()
            .map(|(column, direction)| {
                let ordering = sort_cmp(lookup(a, column), lookup(b, column));
                match direction {
                    OrderDirection::Ascending => ordering,
                    OrderDirection::Descending => ordering.reverse(),
                }
            })
            .find(|ordering| ordering.is_ne())
            .unwrap_or(Ordering::Equal)
    });

    let projected = project(plan, selected);

    let offset = plan
        .offset
        .and_then(|n| usize::try_from(n).ok())
        .unwrap_or(0);
    let page = projected.into_iter().skip(offset);
    match plan.limit.and_then(|n| usize::try_from(n).ok()) {
        Some(limit) => page.take(limit).collect(),
        None => page.collect(),
    }
}

impl Tables {
    fn rows(&self, table: &str) -> &[Row] {
        self.tables
            .get(table)
            .map(|t| t.rows.as_slice())
            .unwrap_or_default()
    }

    fn insert(
        &mut self,
        table: &'static str,
        primary_key: &'static str,
        mut row: Row,
    ) -> Result<Value, RepositoryError> {
        let table = self.tables.entry(table).or_default();
        let mut key = row.get(primary_key).clone();

        if is_unset_key(&key) {
            if matches!(key, Value::String(_)) {
                return Err(RepositoryError::validation_failed(
                    RepositoryOperation::Create,
                    format!("column '{}' needs an explicit key", primary_key),
                ));
            }
            table.last_id += 1;
            key = Value::Integer(table.last_id);
            row.insert(primary_key, key.clone());
        } else if table.rows.iter().any(|r| r.get(primary_key) == &key) {
            return Err(RepositoryError::constraint_violation(
                RepositoryOperation::Create,
                format!("duplicate key value for '{}': {}", primary_key, key),
            ));
        }

        if let Value::Integer(id) = key {
            table.last_id = table.last_id.max(id);
        }
        table.rows.push(row);
        Ok(key)
    }

    fn update(&mut self, query: &QueryPlan, changes: &Row) -> Result<u64, RepositoryError> {
        validate(query, RepositoryOperation::Update)?;
        query.check_write(RepositoryOperation::Update, "memory")?;
        let changes = query.writable(changes)?;
        let Some(table) = self.tables.get_mut(query.table) else {
            return Ok(0);
        };

        let mut updated = 0;
        for row in table.rows.iter_mut().filter(|row| matches(query, row)) {
            for (column, value) in changes.iter() {
                row.insert(column, value.clone());
            }
            updated += 1;
        }
        Ok(updated)
    }

    fn delete(&mut self, query: &QueryPlan) -> Result<u64, RepositoryError> {
        validate(query, RepositoryOperation::Delete)?;
        query.check_write(RepositoryOperation::Delete, "memory")?;
        let Some(table) = self.tables.get_mut(query.table) else {
            return Ok(0);
        };

        let before = table.rows.len();
        table.rows.retain(|row| !matches(query, row));
        Ok((before - table.rows.len()) as u64)
    }

    fn find(
        &self,
        query: &QueryPlan,
        operation: RepositoryOperation,
    ) -> Result<Vec<Row>, RepositoryError> {
        validate(query, operation)?;
        Ok(select(query, self.rows(query.table)))
    }

    fn first(&self, mut query: QueryPlan) -> Result<Option<Row>, RepositoryError> {
        query.limit = Some(1);
        Ok(self
            .find(&query, RepositoryOperation::Get)?
            .into_iter()
            .next())
    }

    fn count(&self, query: &QueryPlan) -> Result<i64, RepositoryError> {
        validate(query, RepositoryOperation::Count)?;
        let rows = grouped(query, self.rows(query.table));
        // Distinct over a selection counts distinct tuples
        if query.distinct && !query.selects.is_empty() {
            return Ok(project(query, rows).len() as i64);
        }
        Ok(rows.len() as i64)
    }
}

/// Handle for one non-transactional call
#[derive(Debug)]
pub struct MemoryConnection {
    store: MemoryStore,
}

impl MemoryConnection {
    /// Run a write against the shared tables, bumping the version on change
    fn write<R>(
        &self,
        op: impl FnOnce(&mut Tables) -> Result<R, RepositoryError>,
        changed: impl Fn(&R) -> bool,
    ) -> Result<R, RepositoryError> {
        let mut state = self.store.lock();
        let result = op(&mut state)?;
        if changed(&result) {
            state.version += 1;
        }
        Ok(result)
    }
}

impl Handle for MemoryConnection {
    type Query = QueryPlan;

    fn query<T: Entity>(&self) -> QueryPlan {
        QueryPlan::for_entity::<T>()
    }

    async fn insert<T: Entity>(&mut self, ctx: &Context, row: Row) -> Result<Value, RepositoryError> {
        guard(ctx, RepositoryOperation::Create)?;
        self.write(|state| state.insert(T::TABLE, T::PRIMARY_KEY, row), |_| true)
    }

    async fn update(
        &mut self,
        ctx: &Context,
        query: QueryPlan,
        changes: Row,
    ) -> Result<u64, RepositoryError> {
        guard(ctx, RepositoryOperation::Update)?;
        self.write(|state| state.update(&query, &changes), |n| *n > 0)
    }

    async fn delete(&mut self, ctx: &Context, query: QueryPlan) -> Result<u64, RepositoryError> {
        guard(ctx, RepositoryOperation::Delete)?;
        self.write(|state| state.delete(&query), |n| *n > 0)
    }

    async fn first(
        &mut self,
        ctx: &Context,
        query: QueryPlan,
    ) -> Result<Option<Row>, RepositoryError> {
        guard(ctx, RepositoryOperation::Get)?;
        self.store.lock().first(query)
    }

    async fn find(&mut self, ctx: &Context, query: QueryPlan) -> Result<Vec<Row>, RepositoryError> {
        guard(ctx, RepositoryOperation::List)?;
        self.store.lock().find(&query, RepositoryOperation::List)
    }

    async fn count(&mut self, ctx: &Context, query: QueryPlan) -> Result<i64, RepositoryError> {
        guard(ctx, RepositoryOperation::Count)?;
        self.store.lock().count(&query)
    }
}

/// Handle bound to a private snapshot of the store
#[derive(Debug)]
pub struct MemoryTx {
    store: MemoryStore,
    snapshot: Tables,
    base_version: u64,
    dirty: bool,
}

impl Handle for MemoryTx {
    type Query = QueryPlan;

    fn query<T: Entity>(&self) -> QueryPlan {
        QueryPlan::for_entity::<T>()
    }

    async fn insert<T: Entity>(&mut self, ctx: &Context, row: Row) -> Result<Value, RepositoryError> {
        guard(ctx, RepositoryOperation::Create)?;
        let key = self.snapshot.insert(T::TABLE, T::PRIMARY_KEY, row)?;
        self.dirty = true;
        Ok(key)
    }

    async fn update(
        &mut self,
        ctx: &Context,
        query: QueryPlan,
        changes: Row,
    ) -> Result<u64, RepositoryError> {
        guard(ctx, RepositoryOperation::Update)?;
        let updated = self.snapshot.update(&query, &changes)?;
        self.dirty |= updated > 0;
        Ok(updated)
    }

    async fn delete(&mut self, ctx: &Context, query: QueryPlan) -> Result<u64, RepositoryError> {
        guard(ctx, RepositoryOperation::Delete)?;
        let deleted = self.snapshot.delete(&query)?;
        self.dirty |= deleted > 0;
        Ok(deleted)
    }

    async fn first(
        &mut self,
        ctx: &Context,
        query: QueryPlan,
    ) -> Result<Option<Row>, RepositoryError> {
        guard(ctx, RepositoryOperation::Get)?;
        self.snapshot.first(query)
    }

    async fn find(&mut self, ctx: &Context, query: QueryPlan) -> Result<Vec<Row>, RepositoryError> {
        guard(ctx, RepositoryOperation::List)?;
        self.snapshot.find(&query, RepositoryOperation::List)
    }

    async fn count(&mut self, ctx: &Context, query: QueryPlan) -> Result<i64, RepositoryError> {
        guard(ctx, RepositoryOperation::Count)?;
        self.snapshot.count(&query)
    }
}

impl UnitOfWork for MemoryTx {
    async fn commit(self, ctx: &Context) -> Result<(), RepositoryError> {
        guard(ctx, RepositoryOperation::Transaction)?;
        if !self.dirty {
            return Ok(());
        }

        let mut state = self.store.lock();
        if state.version != self.base_version {
            return Err(RepositoryError::transaction_aborted(
                "store was modified after the transaction began",
            ));
        }
        state.tables = self.snapshot.tables;
        state.version += 1;
        Ok(())
    }

    async fn rollback(self, _ctx: &Context) -> Result<(), RepositoryError> {
        Ok(())
    }
}

fn lookup<'a>(row: &'a Row, column: &str) -> &'a Value {
    row.get(column_name(column))
}

fn eval(filter: &Filter, row: &Row) -> bool {
    match filter {
        Filter::Condition(condition) => eval_condition(condition, row),
        Filter::And(filters) => filters.iter().all(|f| eval(f, row)),
        Filter::Or(filters) => filters.iter().any(|f| eval(f, row)),
        Filter::Not(inner) => !eval(inner, row),
        Filter::Sql(..) => false,
    }
}

fn eval_condition(condition: &FilterCondition, row: &Row) -> bool {
    let left = lookup(row, &condition.field);
    let right = &condition.value;
    match condition.operator {
        FilterOperator::Equal => compare(left, right) == Some(Ordering::Equal),
        FilterOperator::NotEqual => compare(left, right).is_some_and(Ordering::is_ne),
        FilterOperator::GreaterThan => compare(left, right) == Some(Ordering::Greater),
        FilterOperator::GreaterThanOrEqual => compare(left, right).is_some_and(Ordering::is_ge),
        FilterOperator::LessThan => compare(left, right) == Some(Ordering::Less),
        FilterOperator::LessThanOrEqual => compare(left, right).is_some_and(Ordering::is_le),
        FilterOperator::Like => match (left, right) {
            (Value::String(text), Value::String(pattern)) => like(text, pattern),
            _ => false,
        },
        FilterOperator::In => match (left, right) {
            (Value::String(s), Value::StringList(list)) => list.contains(s),
            (Value::Integer(n), Value::IntegerList(list)) => list.contains(n),
            _ => false,
        },
        FilterOperator::IsNull => left.is_null(),
        FilterOperator::IsNotNull => !left.is_null(),
    }
}

/// SQL-style comparison; anything involving Null or mismatched types is unknown
fn compare(left: &Value, right: &Value) -> Option<Ordering> {
    match (left, right) {
        (Value::Integer(a), Value::Integer(b)) => Some(a.cmp(b)),
        (Value::Float(a), Value::Float(b)) => a.partial_cmp(b),
        (Value::Integer(a), Value::Float(b)) => (*a as f64).partial_cmp(b),
        (Value::Float(a), Value::Integer(b)) => a.partial_cmp(&(*b as f64)),
        (Value::String(a), Value::String(b)) => Some(a.cmp(b)),
        (Value::Boolean(a), Value::Boolean(b)) => Some(a.cmp(b)),
        _ => None,
    }
}

/// Ordering for ORDER BY; nulls sort last
fn sort_cmp(left: &Value, right: &Value) -> Ordering {
    match (left.is_null(), right.is_null()) {
        (true, true) => Ordering::Equal,
        (true, false) => Ordering::Greater,
        (false, true) => Ordering::Less,
        (false, false) => compare(left, right).unwrap_or(Ordering::Equal),
    }
}

/// `LIKE` matching: `%` is any run of characters, `_` exactly one
fn like(text: &str, pattern: &str) -> bool {
    let text: Vec<char> = text.chars().collect();
    let pattern: Vec<char> = pattern.chars().collect();

    // Classic two-pointer wildcard match with backtracking to the last `%`
    let (mut t, mut p) = (0, 0);
    let mut star: Option<(usize, usize)> = None;
    while t < text.len() {
        if p < pattern.len() && (pattern[p] == '_' || pattern[p] == text[t]) {
            t += 1;
            p += 1;
        } else if p < pattern.len() && pattern[p] == '%' {
            star = Some((p, t));
            p += 1;
        } else if let Some((star_p, star_t)) = star {
            p = star_p + 1;
            t = star_t + 1;
            star = Some((star_p, star_t + 1));
        } else {
            return false;
        }
    }
    pattern[p..].iter().all(|&c| c == '%')
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::query::{
        with_clauses, with_custom, with_distinct, with_filter, with_group, with_having, with_join,
        with_limit, with_offset, with_omit, with_preload, with_scope, with_select, Clause,
        QueryBuilder, QueryOptions, Scope,
    };
    use crate::repository::testing::User;
    use crate::repository::{Crud, Repository, RepositoryErrorKind};

    async fn seeded(names: &[&str]) -> (Repository<User, MemoryStore>, Context) {
        let repo = Repository::new(MemoryStore::new());
        let ctx = Context::new();
        for name in names {
            repo.create(&ctx, &mut User::named(name)).await.unwrap();
        }
        (repo, ctx)
    }

    fn names(users: &[User]) -> Vec<&str> {
        users.iter().map(|u| u.name.as_str()).collect()
    }

    #[test]
    fn test_like_patterns() {
        assert!(like("alice", "a%"));
        assert!(like("alice", "%ice"));
        assert!(like("alice", "a_i%e"));
        assert!(like("alice", "%"));
        assert!(!like("alice", "b%"));
        assert!(!like("alice", "alic"));
        assert!(like("", "%"));
        assert!(!like("", "_"));
    }

    #[test]
    fn test_compare_is_unknown_for_null_and_mixed_types() {
        assert_eq!(compare(&Value::Null, &Value::Null), None);
        assert_eq!(compare(&Value::Integer(1), &Value::String("1".into())), None);
        assert_eq!(
            compare(&Value::Integer(2), &Value::Float(1.5)),
            Some(Ordering::Greater)
        );
    }

    #[test]
    fn test_eval_condition_operators() {
        let row = Row::new().with("age", 30_i64).with("name", "bob");
        assert!(eval(&Filter::from(FilterCondition::gte("age", 30_i64)), &row));
        assert!(eval(&Filter::from(FilterCondition::ne("name", "al")), &row));
        assert!(eval(
            &Filter::from(FilterCondition::in_strings("name", vec!["bob".into()])),
            &row
        ));
        assert!(eval(&Filter::from(FilterCondition::is_null("deleted_at")), &row));
        assert!(!eval(&Filter::from(FilterCondition::ne("deleted_at", 1_i64)), &row));
        assert!(eval(&Filter::eq("users.name", "bob"), &row));
        assert!(eval(
            &Filter::or([Filter::eq("name", "x"), Filter::not(Filter::eq("age", 1_i64))]),
            &row
        ));
        assert!(eval(&Filter::and([]), &row));
        assert!(!eval(&Filter::or([]), &row));
    }

    #[tokio::test]
    async fn test_create_assigns_sequential_keys() {
        let (repo, ctx) = seeded(&["a", "b"]).await;
        let mut user = User::named("c");
        repo.create(&ctx, &mut user).await.unwrap();
        assert_eq!(user.id, 3);
        assert_eq!(repo.provider().row_count("users"), 3);
    }

    #[tokio::test]
    async fn test_duplicate_key_is_constraint_violation() {
        let (repo, ctx) = seeded(&["a"]).await;
        let mut dup = User {
            id: 1,
            name: "again".into(),
        };
        let err = repo.create(&ctx, &mut dup).await.unwrap_err();
        assert_eq!(err.kind, RepositoryErrorKind::ConstraintViolation);
    }

    #[tokio::test]
    async fn test_explicit_key_advances_sequence() {
        let (repo, ctx) = seeded(&[]).await;
        repo.create(&ctx, &mut User { id: 10, name: "x".into() })
            .await
            .unwrap();
        let mut next = User::named("y");
        repo.create(&ctx, &mut next).await.unwrap();
        assert_eq!(next.id, 11);
    }

    #[tokio::test]
    async fn test_order_limit_offset() {
        let (repo, ctx) = seeded(&["c", "a", "d", "b"]).await;
        let users = repo
            .list(
                &ctx,
                QueryOptions::default()
                    .order_by("name", OrderDirection::Ascending)
                    .limit(2)
                    .offset(1),
            )
            .await
            .unwrap();
        assert_eq!(names(&users), vec!["b", "c"]);

        let users = repo
            .list(&ctx, [with_offset(3), with_limit(10)])
            .await
            .unwrap();
        assert_eq!(names(&users), vec!["b"]);
    }

    #[tokio::test]
    async fn test_select_and_omit_project_columns() {
        let (repo, ctx) = seeded(&["a"]).await;

        let users = repo.list(&ctx, [with_select(["name"])]).await.unwrap();
        assert_eq!(users, vec![User { id: 0, name: "a".into() }]);

        let users = repo.list(&ctx, [with_omit(["name"])]).await.unwrap();
        assert_eq!(users, vec![User { id: 1, name: String::new() }]);
    }

    #[tokio::test]
    async fn test_distinct_over_projection() {
        let (repo, ctx) = seeded(&["a", "a", "b"]).await;
        let users = repo
            .list(&ctx, QueryOptions::default().with(with_select(["name"])).distinct(true))
            .await
            .unwrap();
        assert_eq!(names(&users), vec!["a", "b"]);
    }

    #[tokio::test]
    async fn test_group_and_having() {
        let (repo, ctx) = seeded(&["a", "b", "a", "c", "b"]).await;

        let grouped = repo
            .list(&ctx, [with_group("name"), with_select(["name"])])
            .await
            .unwrap();
        assert_eq!(names(&grouped), vec!["a", "b", "c"]);
        assert_eq!(repo.count(&ctx, [with_group("name")]).await.unwrap(), 3);

        let count = repo
            .count(
                &ctx,
                [
                    with_group("name"),
                    with_having(Filter::from(FilterCondition::ne("name", "b"))),
                ],
            )
            .await
            .unwrap();
        assert_eq!(count, 2);
    }

    #[tokio::test]
    async fn test_count_ignores_pagination_and_projection() {
        let (repo, ctx) = seeded(&["a", "b", "c"]).await;
        let count = repo
            .count(&ctx, [with_limit(1), with_offset(1), with_select(["name"])])
            .await
            .unwrap();
        assert_eq!(count, 3);
    }

    #[tokio::test]
    async fn test_count_distinct_selection() {
        let (repo, ctx) = seeded(&["a", "a", "b"]).await;

        let distinct = repo
            .count(&ctx, [with_select(["name"]), with_distinct(true)])
            .await
            .unwrap();
        assert_eq!(distinct, 2);

        // Without a selection distinct rows differ by primary key
        let rows = repo.count(&ctx, [with_distinct(true)]).await.unwrap();
        assert_eq!(rows, 3);
    }

    #[tokio::test]
    async fn test_unsupported_directives() {
        let (repo, ctx) = seeded(&["a"]).await;

        for opts in [
            vec![with_join(["JOIN orders ON orders.user_id = users.id"])],
            vec![with_preload(["orders"])],
            vec![with_clauses([Clause::raw("NULLS FIRST")])],
            vec![with_filter(Filter::sql("name = ?", [Value::from("a")]))],
        ] {
            let err = repo.list(&ctx, opts).await.unwrap_err();
            assert_eq!(err.kind, RepositoryErrorKind::Unsupported);
        }
    }

    #[tokio::test]
    async fn test_locking_clause_is_accepted() {
        let (repo, ctx) = seeded(&["a"]).await;
        let users = repo
            .list(&ctx, [with_clauses([Clause::for_update()])])
            .await
            .unwrap();
        assert_eq!(users.len(), 1);
    }

    #[tokio::test]
    async fn test_update_restricted_by_key_and_filter() {
        let (repo, ctx) = seeded(&["a", "b", "a"]).await;

        let renamed = User { id: 0, name: "z".into() };
        let updated = repo
            .update(&ctx, &renamed, [with_filter(Filter::eq("name", "a"))])
            .await
            .unwrap();
        assert_eq!(updated, 2);

        let keyed = User { id: 2, name: "y".into() };
        assert_eq!(repo.update(&ctx, &keyed, QueryOptions::default()).await.unwrap(), 1);

        let users = repo.list(&ctx, QueryOptions::default()).await.unwrap();
        assert_eq!(names(&users), vec!["z", "y", "z"]);
    }

    #[tokio::test]
    async fn test_unrestricted_update_and_delete_are_refused() {
        let (repo, ctx) = seeded(&["a"]).await;

        let err = repo
            .update(&ctx, &User::named("z"), QueryOptions::default())
            .await
            .unwrap_err();
        assert_eq!(err.kind, RepositoryErrorKind::ValidationFailed);

        let err = repo.delete(&ctx, QueryOptions::default()).await.unwrap_err();
        assert_eq!(err.kind, RepositoryErrorKind::ValidationFailed);
        assert_eq!(repo.count(&ctx, QueryOptions::default()).await.unwrap(), 1);
    }

    #[tokio::test]
    async fn test_scope_without_filter_cannot_delete_everything() {
        let (repo, ctx) = seeded(&["a", "b", "c"]).await;

        let first_only = Scope::new(|q: &mut dyn QueryBuilder| q.limit(1));
        let err = repo.delete(&ctx, [with_scope(first_only)]).await.unwrap_err();
        assert_eq!(err.kind, RepositoryErrorKind::Unsupported);

        let dedupe = Scope::new(|q: &mut dyn QueryBuilder| q.distinct());
        let err = repo.delete(&ctx, [with_custom(dedupe)]).await.unwrap_err();
        assert_eq!(err.kind, RepositoryErrorKind::Unsupported);

        let filtered = Scope::new(|q: &mut dyn QueryBuilder| q.filter(Filter::eq("name", "b")));
        assert_eq!(repo.delete(&ctx, [with_scope(filtered)]).await.unwrap(), 1);
        assert_eq!(repo.count(&ctx, QueryOptions::default()).await.unwrap(), 2);
    }

    #[tokio::test]
    async fn test_paged_delete_is_refused_not_widened() {
        let (repo, ctx) = seeded(&["a", "a", "a"]).await;
        let err = repo
            .delete(&ctx, [with_filter(Filter::eq("name", "a")), with_limit(1)])
            .await
            .unwrap_err();
        assert_eq!(err.kind, RepositoryErrorKind::Unsupported);
        assert_eq!(err.operation, RepositoryOperation::Delete);
        assert_eq!(repo.count(&ctx, QueryOptions::default()).await.unwrap(), 3);
    }

    #[tokio::test]
    async fn test_update_honours_omit_and_select() {
        let (repo, ctx) = seeded(&["a"]).await;
        let renamed = User { id: 1, name: "z".into() };

        let err = repo
            .update(&ctx, &renamed, [with_omit(["name"])])
            .await
            .unwrap_err();
        assert_eq!(err.kind, RepositoryErrorKind::ValidationFailed);
        let users = repo.list(&ctx, QueryOptions::default()).await.unwrap();
        assert_eq!(names(&users), vec!["a"]);

        let updated = repo
            .update(&ctx, &renamed, [with_select(["name"])])
            .await
            .unwrap();
        assert_eq!(updated, 1);
        let users = repo.list(&ctx, QueryOptions::default()).await.unwrap();
        assert_eq!(names(&users), vec!["z"]);
    }

    #[tokio::test]
    async fn test_cancelled_context_fails_fast() {
        let (repo, ctx) = seeded(&["a"]).await;
        ctx.cancel();
        let err = repo.count(&ctx, QueryOptions::default()).await.unwrap_err();
        assert_eq!(err.kind, RepositoryErrorKind::Cancelled);
    }

    #[tokio::test]
    async fn test_tables_are_shared_between_clones() {
        let store = MemoryStore::new();
        let first = Repository::<User, _>::new(store.clone());
        let second = Repository::<User, _>::new(store.clone());
        let ctx = Context::new();

        first.create(&ctx, &mut User::named("a")).await.unwrap();
        assert_eq!(second.count(&ctx, QueryOptions::default()).await.unwrap(), 1);
        assert_eq!(store.row_count("users"), 1);
        assert_eq!(store.row_count("orders"), 0);
    }
}
