//! The query state every backend records from the option applier

use crate::query::{Clause, Filter, LockStrength, OrderDirection, QueryBuilder};
use crate::repository::{Entity, RepositoryError, RepositoryOperation, Row};

/// Everything the applier asked for, recorded against one entity's table
///
/// Backends interpret the plan when a handle executes it.
#[derive(Debug, Clone)]
pub struct QueryPlan {
    pub table: &'static str,
    pub primary_key: &'static str,
    pub columns: &'static [&'static str],
    /// Conjunctive row filters
    pub filters: Vec<Filter>,
    pub limit: Option<i64>,
    pub offset: Option<i64>,
    pub order: Vec<(String, OrderDirection)>,
    pub locking: Option<LockStrength>,
    /// Raw SQL clauses, in order
    pub raw: Vec<String>,
    pub preloads: Vec<String>,
    pub selects: Vec<String>,
    pub omit: Vec<String>,
    pub joins: Vec<String>,
    /// Group-by columns
    pub group: Vec<String>,
    pub having: Option<Filter>,
    pub distinct: bool,
}

impl QueryPlan {
    pub fn for_entity<T: Entity>() -> Self {
        Self {
            table: T::TABLE,
            primary_key: T::PRIMARY_KEY,
            columns: T::columns(),
            filters: Vec::new(),
            limit: None,
            offset: None,
            order: Vec::new(),
            locking: None,
            raw: Vec::new(),
            preloads: Vec::new(),
            selects: Vec::new(),
            omit: Vec::new(),
            joins: Vec::new(),
            group: Vec::new(),
            having: None,
            distinct: false,
        }
    }

    /// Columns to return: the selection (or every column) minus omissions
    pub fn projection(&self) -> Vec<&str> {
        let base: Vec<&str> = if self.selects.is_empty() {
            self.columns.to_vec()
        } else {
            self.selects.iter().map(String::as_str).collect()
        };
        base.into_iter()
            .filter(|c| !self.omit.iter().any(|o| column_name(o) == column_name(c)))
            .collect()
    }

    /// Order to apply: the requested one, or the primary key when ungrouped
    pub fn effective_order(&self) -> Vec<(String, OrderDirection)> {
        if self.order.is_empty() && self.group.is_empty() {
            vec![(self.primary_key.to_string(), OrderDirection::Ascending)]
        } else {
            self.order.clone()
        }
    }

    /// Checks every backend runs before an update or delete
    ///
    /// Directives that only shape a result set are refused rather than
    /// ignored, and a write must be restricted by at least one filter.
    pub fn check_write(
        &self,
        operation: RepositoryOperation,
        backend: &str,
    ) -> Result<(), RepositoryError> {
        Self::reject(
            self.limit.is_some() || self.offset.is_some(),
            operation,
            backend,
            "limit or offset on writes",
        )?;
        Self::reject(!self.order.is_empty(), operation, backend, "ordering on writes")?;
        Self::reject(self.locking.is_some(), operation, backend, "row locks on writes")?;
        Self::reject(
            !self.group.is_empty() || self.having.is_some(),
            operation,
            backend,
            "grouping on writes",
        )?;
        Self::reject(self.distinct, operation, backend, "distinct on writes")?;

        if self.filters.is_empty() {
            return Err(RepositoryError::validation_failed(
                operation,
                format!(
                    "{} without a primary key or filter would touch every row",
                    operation
                ),
            ));
        }
        Ok(())
    }

    /// Narrow `changes` to the selected columns, minus omitted ones
    pub fn writable(&self, changes: &Row) -> Result<Row, RepositoryError> {
        let selected = |column: &str| {
            self.selects.is_empty() || self.selects.iter().any(|s| column_name(s) == column)
        };
        let omitted = |column: &str| self.omit.iter().any(|o| column_name(o) == column);

        let narrowed: Row = changes
            .iter()
            .filter(|(column, _)| selected(*column) && !omitted(*column))
            .map(|(column, value)| (column.to_string(), value.clone()))
            .collect();
        if narrowed.is_empty() {
            return Err(RepositoryError::validation_failed(
                RepositoryOperation::Update,
                "select and omit leave no columns to update",
            ));
        }
        Ok(narrowed)
    }

    /// Fail with `Unsupported` when `present` is true
    pub fn reject(
        present: bool,
        operation: RepositoryOperation,
        backend: &str,
        what: &str,
    ) -> Result<(), RepositoryError> {
        if present {
            return Err(RepositoryError::unsupported(
                operation,
                format!("{} backend does not support {}", backend, what),
            ));
        }
        Ok(())
    }
}

/// Column part of a possibly table-qualified name
pub fn column_name(name: &str) -> &str {
    name.rsplit('.').next().unwrap_or(name).trim()
}

impl QueryBuilder for QueryPlan {
    fn filter(&mut self, filter: Filter) {
        self.filters.push(filter);
    }

    fn limit(&mut self, limit: i64) {
        self.limit = Some(limit);
    }

    fn offset(&mut self, offset: i64) {
        self.offset = Some(offset);
    }

    fn clause(&mut self, clause: Clause) {
        match clause {
            Clause::OrderBy { column, direction } => self.order.push((column, direction)),
            Clause::Locking(strength) => self.locking = Some(strength),
            Clause::Raw(sql) => self.raw.push(sql),
        }
    }

    fn preload(&mut self, relation: String) {
        self.preloads.push(relation);
    }

    fn select(&mut self, columns: Vec<String>) {
        self.selects = columns;
    }

    fn omit(&mut self, columns: Vec<String>) {
        self.omit = columns;
    }

    fn join(&mut self, join: String) {
        self.joins.push(join);
    }

    fn group(&mut self, group: String) {
        self.group = group
            .split(',')
            .map(str::trim)
            .filter(|c| !c.is_empty())
            .map(str::to_string)
            .collect();
    }

    fn having(&mut self, having: Filter) {
        self.having = Some(having);
    }

    fn distinct(&mut self) {
        self.distinct = true;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::query::{QueryOptions, Scope};
    use crate::repository::testing::User;
    use crate::repository::RepositoryErrorKind;

    #[test]
    fn test_plan_records_applied_options() {
        let mut plan = QueryPlan::for_entity::<User>();
        QueryOptions::default()
            .filter(Filter::eq("name", "a"))
            .page(2, 10)
            .order_by("name", OrderDirection::Descending)
            .group("name, id")
            .with(crate::query::with_clauses([Clause::for_share()]))
            .custom(Scope::new(|q: &mut dyn QueryBuilder| q.distinct()))
            .apply_to(&mut plan);

        assert_eq!(plan.table, "users");
        assert_eq!(plan.filters, vec![Filter::eq("name", "a")]);
        assert_eq!((plan.limit, plan.offset), (Some(10), Some(10)));
        assert_eq!(
            plan.order,
            vec![("name".to_string(), OrderDirection::Descending)]
        );
        assert_eq!(plan.group, vec!["name", "id"]);
        assert_eq!(plan.locking, Some(LockStrength::Share));
        assert!(plan.distinct);
    }

    #[test]
    fn test_projection() {
        let mut plan = QueryPlan::for_entity::<User>();
        assert_eq!(plan.projection(), vec!["id", "name"]);

        plan.omit(vec!["users.name".to_string()]);
        assert_eq!(plan.projection(), vec!["id"]);

        plan.select(vec!["name".to_string(), "id".to_string()]);
        plan.omit(vec!["id".to_string()]);
        assert_eq!(plan.projection(), vec!["name"]);
    }

    #[test]
    fn test_check_write_requires_a_filter() {
        let mut plan = QueryPlan::for_entity::<User>();
        plan.limit(1);
        plan.distinct();
        let err = plan
            .check_write(RepositoryOperation::Delete, "memory")
            .unwrap_err();
        assert_eq!(err.kind, RepositoryErrorKind::Unsupported);

        let plan = QueryPlan::for_entity::<User>();
        let err = plan
            .check_write(RepositoryOperation::Delete, "memory")
            .unwrap_err();
        assert_eq!(err.kind, RepositoryErrorKind::ValidationFailed);
        assert!(err.message.contains("delete without a primary key or filter"));
    }

    #[test]
    fn test_check_write_rejects_result_shaping() {
        let cases: Vec<QueryOptions> = vec![
            QueryOptions::default().limit(1),
            QueryOptions::default().offset(2),
            QueryOptions::default().order_by("name", OrderDirection::Ascending),
            QueryOptions::default().with(crate::query::with_clauses([Clause::for_update()])),
            QueryOptions::default().group("name"),
            QueryOptions::default().distinct(true),
        ];
        for options in cases {
            let mut plan = QueryPlan::for_entity::<User>();
            options.filter(Filter::eq("name", "a")).apply_to(&mut plan);
            let err = plan
                .check_write(RepositoryOperation::Update, "memory")
                .unwrap_err();
            assert_eq!(err.kind, RepositoryErrorKind::Unsupported);
        }

        let mut plan = QueryPlan::for_entity::<User>();
        plan.filter(Filter::eq("name", "a"));
        assert!(plan.check_write(RepositoryOperation::Update, "memory").is_ok());
    }

    #[test]
    fn test_writable_honours_select_and_omit() {
        let changes = Row::new().with("name", "z").with("email", "z@example.com");

        let mut plan = QueryPlan::for_entity::<User>();
        assert_eq!(plan.writable(&changes).unwrap(), changes);

        plan.omit(vec!["email".to_string()]);
        assert_eq!(plan.writable(&changes).unwrap(), Row::new().with("name", "z"));

        plan.select(vec!["users.email".to_string()]);
        plan.omit(Vec::new());
        assert_eq!(
            plan.writable(&changes).unwrap(),
            Row::new().with("email", "z@example.com")
        );

        plan.omit(vec!["email".to_string()]);
        let err = plan.writable(&changes).unwrap_err();
        assert_eq!(err.kind, RepositoryErrorKind::ValidationFailed);
    }

    #[test]
    fn test_effective_order_defaults_to_primary_key() {
        let mut plan = QueryPlan::for_entity::<User>();
        assert_eq!(
            plan.effective_order(),
            vec![("id".to_string(), OrderDirection::Ascending)]
        );

        plan.group("name".to_string());
        assert!(plan.effective_order().is_empty());
    }
}
