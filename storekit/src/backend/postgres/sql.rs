//! Statement rendering and row decoding
//!
//! Every value is bound as a parameter; identifiers are double-quoted.
//! Join fragments and raw clauses are passed through verbatim.

use sqlx::postgres::PgRow;
use sqlx::{Column, Postgres, Row as _, TypeInfo};

use crate::backend::plan::QueryPlan;
use crate::query::{Filter, FilterCondition, FilterOperator, OrderDirection, Value};
use crate::repository::{is_unset_key, RepositoryError, RepositoryOperation, Row};

pub(crate) type Statement = sqlx::QueryBuilder<'static, Postgres>;

const BACKEND: &str = "postgres";

/// Quote a possibly dotted identifier: `users.name` → `"users"."name"`
pub(crate) fn quote_ident(name: &str) -> String {
    name.split('.')
        .map(|part| match part.trim() {
            "*" => "*".to_string(),
            part => format!("\"{}\"", part.replace('"', "\"\"")),
        })
        .collect::<Vec<_>>()
        .join(".")
}

/// Column reference, qualified with the base table once joins are involved
fn column_ref(plan: &QueryPlan, column: &str) -> String {
    if plan.joins.is_empty() || column.contains('.') {
        quote_ident(column)
    } else {
        quote_ident(&format!("{}.{}", plan.table, column))
    }
}

fn push_value(sql: &mut Statement, value: &Value) {
    match value {
        Value::String(s) => sql.push_bind(s.clone()),
        Value::Integer(n) => sql.push_bind(*n),
        Value::Float(f) => sql.push_bind(*f),
        Value::Boolean(b) => sql.push_bind(*b),
        Value::StringList(list) => sql.push_bind(list.clone()),
        Value::IntegerList(list) => sql.push_bind(list.clone()),
        Value::Null => sql.push("NULL"),
    };
}

fn push_condition(sql: &mut Statement, plan: &QueryPlan, condition: &FilterCondition) {
    sql.push(column_ref(plan, &condition.field));
    match (condition.operator, &condition.value) {
        (FilterOperator::IsNull, _) | (FilterOperator::Equal, Value::Null) => {
            sql.push(" IS NULL");
        }
        (FilterOperator::IsNotNull, _) | (FilterOperator::NotEqual, Value::Null) => {
            sql.push(" IS NOT NULL");
        }
        (FilterOperator::In, list @ (Value::StringList(_) | Value::IntegerList(_))) => {
            sql.push(" = ANY(");
            push_value(sql, list);
            sql.push(")");
        }
        (FilterOperator::In, value) => {
            sql.push(" IN (");
            push_value(sql, value);
            sql.push(")");
        }
        (operator, value) => {
            sql.push(format!(" {} ", operator));
            push_value(sql, value);
        }
    }
}

/// Substitute bound arguments for each `?` in a raw fragment
fn push_fragment(
    sql: &mut Statement,
    fragment: &str,
    args: &[Value],
    operation: RepositoryOperation,
) -> Result<(), RepositoryError> {
    let parts: Vec<&str> = fragment.split('?').collect();
    if parts.len() != args.len() + 1 {
        return Err(RepositoryError::validation_failed(
            operation,
            format!(
                "SQL fragment has {} placeholder(s) but {} argument(s)",
                parts.len() - 1,
                args.len()
            ),
        ));
    }

    sql.push("(");
    for (i, part) in parts.into_iter().enumerate() {
        sql.push(part);
        if let Some(arg) = args.get(i) {
            push_value(sql, arg);
        }
    }
    sql.push(")");
    Ok(())
}

fn push_filter(
    sql: &mut Statement,
    plan: &QueryPlan,
    filter: &Filter,
    operation: RepositoryOperation,
) -> Result<(), RepositoryError> {
    match filter {
        Filter::Condition(condition) => push_condition(sql, plan, condition),
        Filter::And(filters) => push_joined(sql, plan, filters, " AND ", "TRUE", operation)?,
        Filter::Or(filters) => push_joined(sql, plan, filters, " OR ", "FALSE", operation)?,
        Filter::Not(inner) => {
            sql.push("NOT (");
            push_filter(sql, plan, inner, operation)?;
            sql.push(")");
        }
        Filter::Sql(fragment, args) => push_fragment(sql, fragment, args, operation)?,
    }
    Ok(())
}

fn push_joined(
    sql: &mut Statement,
    plan: &QueryPlan,
    filters: &[Filter],
    separator: &str,
    empty: &str,
    operation: RepositoryOperation,
) -> Result<(), RepositoryError> {
    if filters.is_empty() {
        sql.push(empty);
        return Ok(());
    }
    sql.push("(");
    for (i, filter) in filters.iter().enumerate() {
        if i > 0 {
            sql.push(separator);
        }
        push_filter(sql, plan, filter, operation)?;
    }
    sql.push(")");
    Ok(())
}

fn push_source(sql: &mut Statement, plan: &QueryPlan) {
    sql.push(quote_ident(plan.table));
    for join in &plan.joins {
        sql.push(" ");
        sql.push(join);
    }
}

fn push_where(
    sql: &mut Statement,
    plan: &QueryPlan,
    operation: RepositoryOperation,
) -> Result<(), RepositoryError> {
    for (i, filter) in plan.filters.iter().enumerate() {
        sql.push(if i == 0 { " WHERE " } else { " AND " });
        push_filter(sql, plan, filter, operation)?;
    }
    Ok(())
}

fn push_grouping(
    sql: &mut Statement,
    plan: &QueryPlan,
    operation: RepositoryOperation,
) -> Result<(), RepositoryError> {
    if !plan.group.is_empty() {
        let columns: Vec<String> = plan.group.iter().map(|c| column_ref(plan, c)).collect();
        sql.push(" GROUP BY ");
        sql.push(columns.join(", "));
    }
    if let Some(having) = &plan.having {
        sql.push(" HAVING ");
        push_filter(sql, plan, having, operation)?;
    }
    Ok(())
}

fn push_order(sql: &mut Statement, plan: &QueryPlan, order: &[(String, OrderDirection)]) {
    for (i, (column, direction)) in order.iter().enumerate() {
        sql.push(if i == 0 { " ORDER BY " } else { ", " });
        sql.push(column_ref(plan, column));
        sql.push(" ");
        sql.push(direction.as_sql());
    }
}

/// `SELECT` for every row the plan matches
pub(crate) fn select(
    plan: &QueryPlan,
    operation: RepositoryOperation,
) -> Result<Statement, RepositoryError> {
    QueryPlan::reject(!plan.preloads.is_empty(), operation, BACKEND, "preloads")?;

    let mut sql = Statement::new("SELECT ");
    if plan.distinct {
        sql.push("DISTINCT ");
    }
    let columns: Vec<String> = plan
        .projection()
        .into_iter()
        .map(|c| column_ref(plan, c))
        .collect();
    sql.push(if columns.is_empty() {
        "*".to_string()
    } else {
        columns.join(", ")
    });

    sql.push(" FROM ");
    push_source(&mut sql, plan);
    push_where(&mut sql, plan, operation)?;
    push_grouping(&mut sql, plan, operation)?;
    for raw in &plan.raw {
        sql.push(" ");
        sql.push(raw);
    }
    push_order(&mut sql, plan, &plan.order);
    if let Some(limit) = plan.limit {
        sql.push(" LIMIT ");
        sql.push_bind(limit);
    }
    if let Some(offset) = plan.offset {
        sql.push(" OFFSET ");
        sql.push_bind(offset);
    }
    if let Some(lock) = plan.locking {
        sql.push(" ");
        sql.push(lock.as_sql());
    }
    Ok(sql)
}

/// `SELECT` for the first matching row, ordered by primary key unless told otherwise
pub(crate) fn first(mut plan: QueryPlan) -> Result<Statement, RepositoryError> {
    plan.limit = Some(1);
    if !plan.distinct {
        plan.order = plan.effective_order();
    }
    select(&plan, RepositoryOperation::Get)
}

/// `SELECT COUNT(*)`, counting groups when the plan groups and distinct
/// tuples when it selects columns with distinct
pub(crate) fn count(plan: &QueryPlan) -> Result<Statement, RepositoryError> {
    let operation = RepositoryOperation::Count;
    let mut sql = Statement::new("SELECT COUNT(*) FROM ");
    let distinct = plan.distinct && !plan.selects.is_empty();
    if plan.group.is_empty() && !distinct {
        push_source(&mut sql, plan);
        push_where(&mut sql, plan, operation)?;
        return Ok(sql);
    }

    if distinct {
        let columns: Vec<String> = plan
            .projection()
            .into_iter()
            .map(|c| column_ref(plan, c))
            .collect();
        sql.push("(SELECT DISTINCT ");
        sql.push(columns.join(", "));
        sql.push(" FROM ");
    } else {
        sql.push("(SELECT 1 FROM ");
    }
    push_source(&mut sql, plan);
    push_where(&mut sql, plan, operation)?;
    push_grouping(&mut sql, plan, operation)?;
    sql.push(") AS counted");
    Ok(sql)
}

/// `INSERT ... RETURNING <pk>`; Null columns and an unset key are left to column defaults
pub(crate) fn insert(table: &str, primary_key: &str, row: Row) -> Statement {
    let values: Vec<(String, Value)> = row
        .into_iter()
        .filter(|(column, value)| {
            !value.is_null() && !(column.as_str() == primary_key && is_unset_key(value))
        })
        .collect();

    let mut sql = Statement::new("INSERT INTO ");
    sql.push(quote_ident(table));
    if values.is_empty() {
        sql.push(" DEFAULT VALUES");
    } else {
        let columns: Vec<String> = values.iter().map(|(c, _)| quote_ident(c)).collect();
        sql.push(" (");
        sql.push(columns.join(", "));
        sql.push(") VALUES (");
        for (i, (_, value)) in values.iter().enumerate() {
            if i > 0 {
                sql.push(", ");
            }
            push_value(&mut sql, value);
        }
        sql.push(")");
    }
    sql.push(" RETURNING ");
    sql.push(quote_ident(primary_key));
    sql
}

fn reject_for_write(plan: &QueryPlan, operation: RepositoryOperation) -> Result<(), RepositoryError> {
    QueryPlan::reject(!plan.joins.is_empty(), operation, BACKEND, "joins on writes")?;
    QueryPlan::reject(!plan.preloads.is_empty(), operation, BACKEND, "preloads")?;
    QueryPlan::reject(!plan.raw.is_empty(), operation, BACKEND, "raw clauses on writes")?;
    plan.check_write(operation, BACKEND)
}

pub(crate) fn update(plan: &QueryPlan, changes: &Row) -> Result<Statement, RepositoryError> {
    let operation = RepositoryOperation::Update;
    reject_for_write(plan, operation)?;
    let changes = plan.writable(changes)?;

    let mut sql = Statement::new("UPDATE ");
    sql.push(quote_ident(plan.table));
    for (i, (column, value)) in changes.iter().enumerate() {
        sql.push(if i == 0 { " SET " } else { ", " });
        sql.push(quote_ident(column));
        sql.push(" = ");
        push_value(&mut sql, value);
    }
    push_where(&mut sql, plan, operation)?;
    Ok(sql)
}

pub(crate) fn delete(plan: &QueryPlan) -> Result<Statement, RepositoryError> {
    let operation = RepositoryOperation::Delete;
    reject_for_write(plan, operation)?;

    let mut sql = Statement::new("DELETE FROM ");
    sql.push(quote_ident(plan.table));
    push_where(&mut sql, plan, operation)?;
    Ok(sql)
}

/// Decode every column of a result row
pub(crate) fn decode_row(
    record: &PgRow,
    operation: RepositoryOperation,
) -> Result<Row, RepositoryError> {
    record
        .columns()
        .iter()
        .map(|column| {
            let value = decode_value(record, column.ordinal(), operation)?;
            Ok((column.name().to_string(), value))
        })
        .collect()
}

/// Decode one column by its PostgreSQL type
pub(crate) fn decode_value(
    record: &PgRow,
    index: usize,
    operation: RepositoryOperation,
) -> Result<Value, RepositoryError> {
    let column = record
        .try_column(index)
        .map_err(|e| RepositoryError::from_sqlx(operation, e))?;

    let decoded = match column.type_info().name() {
        "INT2" => record
            .try_get::<Option<i16>, _>(index)
            .map(|v| Value::from(v.map(i64::from))),
        "INT4" => record
            .try_get::<Option<i32>, _>(index)
            .map(|v| Value::from(v.map(i64::from))),
        "INT8" => record.try_get::<Option<i64>, _>(index).map(Value::from),
        "FLOAT4" => record
            .try_get::<Option<f32>, _>(index)
            .map(|v| Value::from(v.map(f64::from))),
        "FLOAT8" => record.try_get::<Option<f64>, _>(index).map(Value::from),
        "BOOL" => record.try_get::<Option<bool>, _>(index).map(Value::from),
        "TEXT" | "VARCHAR" | "BPCHAR" | "NAME" | "CITEXT" => {
            record.try_get::<Option<String>, _>(index).map(Value::from)
        }
        "TEXT[]" | "VARCHAR[]" => record
            .try_get::<Option<Vec<String>>, _>(index)
            .map(Value::from),
        "INT8[]" => record
            .try_get::<Option<Vec<i64>>, _>(index)
            .map(Value::from),
        "INT4[]" => record.try_get::<Option<Vec<i32>>, _>(index).map(|v| {
            Value::from(v.map(|list| list.into_iter().map(i64::from).collect::<Vec<i64>>()))
        }),
        "UUID" => record
            .try_get::<Option<sqlx::types::Uuid>, _>(index)
            .map(|v| Value::from(v.map(|id| id.to_string()))),
        "TIMESTAMPTZ" => record
            .try_get::<Option<chrono::DateTime<chrono::Utc>>, _>(index)
            .map(|v| Value::from(v.map(|ts| ts.to_rfc3339()))),
        "TIMESTAMP" => record
            .try_get::<Option<chrono::NaiveDateTime>, _>(index)
            .map(|v| Value::from(v.map(|ts| ts.to_string()))),
        "DATE" => record
            .try_get::<Option<chrono::NaiveDate>, _>(index)
            .map(|v| Value::from(v.map(|d| d.to_string()))),
        "JSON" | "JSONB" => record
            .try_get::<Option<sqlx::types::JsonValue>, _>(index)
            .map(|v| Value::from(v.map(|json| json.to_string()))),
        other => {
            return Err(RepositoryError::serialization_error(
                operation,
                format!("column '{}' has unsupported type {}", column.name(), other),
            ))
        }
    };
    decoded.map_err(|e| RepositoryError::from_sqlx(operation, e))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::query::{
        with_clauses, with_group, with_having, with_join, with_omit, with_preload, with_select,
        Clause, FilterCondition, QueryBuilder, QueryOptions, Scope,
    };
    use crate::repository::testing::User;
    use crate::repository::RepositoryErrorKind;

    fn plan(options: QueryOptions) -> QueryPlan {
        let mut plan = QueryPlan::for_entity::<User>();
        options.apply_to(&mut plan);
        plan
    }

    #[test]
    fn test_quote_ident() {
        assert_eq!(quote_ident("name"), "\"name\"");
        assert_eq!(quote_ident("users.name"), "\"users\".\"name\"");
        assert_eq!(quote_ident("orders.*"), "\"orders\".*");
        assert_eq!(quote_ident("we\"ird"), "\"we\"\"ird\"");
    }

    #[test]
    fn test_select_full_order() {
        let options = QueryOptions::default()
            .filter(Filter::eq("name", "a"))
            .order_by("name", OrderDirection::Descending)
            .limit(10)
            .offset(20)
            .with(with_clauses([Clause::for_update()]));
        let sql = select(&plan(options), RepositoryOperation::List).unwrap();
        assert_eq!(
            sql.sql(),
            "SELECT \"id\", \"name\" FROM \"users\" WHERE \"name\" = $1 \
             ORDER BY \"name\" DESC LIMIT $2 OFFSET $3 FOR UPDATE"
        );
    }

    #[test]
    fn test_select_projection_and_distinct() {
        let options = QueryOptions::default()
            .with(with_select(["name"]))
            .distinct(true);
        let sql = select(&plan(options), RepositoryOperation::List).unwrap();
        assert_eq!(sql.sql(), "SELECT DISTINCT \"name\" FROM \"users\"");

        let options = QueryOptions::default().with(with_omit(["name"]));
        let sql = select(&plan(options), RepositoryOperation::List).unwrap();
        assert_eq!(sql.sql(), "SELECT \"id\" FROM \"users\"");
    }

    #[test]
    fn test_select_with_join_qualifies_columns() {
        let options = QueryOptions::default()
            .join(["JOIN orders ON orders.user_id = users.id"])
            .filter(Filter::and([
                Filter::eq("orders.total", 5_i64),
                Filter::eq("name", "a"),
            ]));
        let sql = select(&plan(options), RepositoryOperation::List).unwrap();
        assert_eq!(
            sql.sql(),
            "SELECT \"users\".\"id\", \"users\".\"name\" FROM \"users\" \
             JOIN orders ON orders.user_id = users.id \
             WHERE (\"orders\".\"total\" = $1 AND \"users\".\"name\" = $2)"
        );
    }

    #[test]
    fn test_filter_tree_rendering() {
        let filter = Filter::or([
            Filter::from(FilterCondition::is_null("name")),
            Filter::not(Filter::from(FilterCondition::in_integers("id", vec![1, 2]))),
            Filter::and([]),
            Filter::eq("name", Value::Null),
        ]);
        let sql = select(&plan(QueryOptions::default().filter(filter)), RepositoryOperation::List)
            .unwrap();
        assert_eq!(
            sql.sql(),
            "SELECT \"id\", \"name\" FROM \"users\" WHERE (\"name\" IS NULL OR \
             NOT (\"id\" = ANY($1)) OR TRUE OR \"name\" IS NULL)"
        );
    }

    #[test]
    fn test_sql_fragment_binds_arguments() {
        let filter = Filter::sql("lower(name) = ? OR id > ?", [Value::from("a"), Value::from(3_i64)]);
        let sql = select(&plan(QueryOptions::default().filter(filter)), RepositoryOperation::List)
            .unwrap();
        assert_eq!(
            sql.sql(),
            "SELECT \"id\", \"name\" FROM \"users\" WHERE (lower(name) = $1 OR id > $2)"
        );
    }

    #[test]
    fn test_sql_fragment_placeholder_mismatch() {
        let filter = Filter::sql("name = ? AND id = ?", [Value::from("a")]);
        let err = select(&plan(QueryOptions::default().filter(filter)), RepositoryOperation::List)
            .err()
            .unwrap();
        assert_eq!(err.kind, RepositoryErrorKind::ValidationFailed);
    }

    #[test]
    fn test_group_having_and_raw() {
        let options = QueryOptions::default()
            .with(with_select(["name"]))
            .with(with_group("name"))
            .with(with_having(Filter::sql("COUNT(*) > ?", [Value::from(1_i64)])))
            .with(with_clauses([Clause::raw("/* report */")]));
        let sql = select(&plan(options), RepositoryOperation::List).unwrap();
        assert_eq!(
            sql.sql(),
            "SELECT \"name\" FROM \"users\" GROUP BY \"name\" HAVING (COUNT(*) > $1) /* report */"
        );
    }

    #[test]
    fn test_first_orders_by_primary_key() {
        let sql = first(plan(QueryOptions::default().filter(Filter::eq("name", "a")))).unwrap();
        assert_eq!(
            sql.sql(),
            "SELECT \"id\", \"name\" FROM \"users\" WHERE \"name\" = $1 ORDER BY \"id\" ASC LIMIT $2"
        );

        let sql = first(plan(QueryOptions::default().order_by("name", OrderDirection::Ascending)))
            .unwrap();
        assert!(sql.sql().contains("ORDER BY \"name\" ASC LIMIT"));
    }

    #[test]
    fn test_count_ignores_projection_and_pagination() {
        let options = QueryOptions::default()
            .filter(Filter::eq("name", "a"))
            .with(with_select(["name"]))
            .limit(5)
            .offset(5);
        let sql = count(&plan(options)).unwrap();
        assert_eq!(sql.sql(), "SELECT COUNT(*) FROM \"users\" WHERE \"name\" = $1");
    }

    #[test]
    fn test_count_groups() {
        let sql = count(&plan(QueryOptions::default().with(with_group("name")))).unwrap();
        assert_eq!(
            sql.sql(),
            "SELECT COUNT(*) FROM (SELECT 1 FROM \"users\" GROUP BY \"name\") AS counted"
        );
    }

    #[test]
    fn test_count_distinct_selection() {
        let options = QueryOptions::default()
            .filter(Filter::eq("name", "a"))
            .with(with_select(["name"]))
            .distinct(true);
        let sql = count(&plan(options)).unwrap();
        assert_eq!(
            sql.sql(),
            "SELECT COUNT(*) FROM (SELECT DISTINCT \"name\" FROM \"users\" WHERE \"name\" = $1) AS counted"
        );

        // Distinct alone keeps counting rows
        let sql = count(&plan(QueryOptions::default().distinct(true))).unwrap();
        assert_eq!(sql.sql(), "SELECT COUNT(*) FROM \"users\"");
    }

    #[test]
    fn test_insert_leaves_unset_key_to_default() {
        let sql = insert("users", "id", Row::new().with("id", 0_i64).with("name", "a"));
        assert_eq!(
            sql.sql(),
            "INSERT INTO \"users\" (\"name\") VALUES ($1) RETURNING \"id\""
        );

        let sql = insert("users", "id", Row::new().with("id", 7_i64).with("name", "a"));
        assert_eq!(
            sql.sql(),
            "INSERT INTO \"users\" (\"id\", \"name\") VALUES ($1, $2) RETURNING \"id\""
        );

        let sql = insert("audit", "id", Row::new().with("id", Value::Null));
        assert_eq!(sql.sql(), "INSERT INTO \"audit\" DEFAULT VALUES RETURNING \"id\"");
    }

    #[test]
    fn test_update_and_delete() {
        let restricted = plan(QueryOptions::default().filter(Filter::eq("id", 3_i64)));

        let sql = update(&restricted, &Row::new().with("name", "b")).unwrap();
        assert_eq!(
            sql.sql(),
            "UPDATE \"users\" SET \"name\" = $1 WHERE \"id\" = $2"
        );

        let sql = delete(&restricted).unwrap();
        assert_eq!(sql.sql(), "DELETE FROM \"users\" WHERE \"id\" = $1");
    }

    #[test]
    fn test_update_writes_only_selected_columns() {
        let changes = Row::new().with("name", "b").with("email", "b@example.com");

        let omitted = plan(
            QueryOptions::default()
                .filter(Filter::eq("id", 3_i64))
                .with(with_omit(["email"])),
        );
        let sql = update(&omitted, &changes).unwrap();
        assert_eq!(sql.sql(), "UPDATE \"users\" SET \"name\" = $1 WHERE \"id\" = $2");

        let selected = plan(
            QueryOptions::default()
                .filter(Filter::eq("id", 3_i64))
                .with(with_select(["email"])),
        );
        let sql = update(&selected, &changes).unwrap();
        assert_eq!(sql.sql(), "UPDATE \"users\" SET \"email\" = $1 WHERE \"id\" = $2");
    }

    #[test]
    fn test_writes_refuse_result_shaping_and_missing_filters() {
        let limited = plan(QueryOptions::default().custom(Scope::new(|q: &mut dyn QueryBuilder| {
            q.limit(1)
        })));
        let err = delete(&limited).err().unwrap();
        assert_eq!(err.kind, RepositoryErrorKind::Unsupported);

        let paged = plan(QueryOptions::default().filter(Filter::eq("name", "a")).limit(1));
        let err = delete(&paged).err().unwrap();
        assert_eq!(err.kind, RepositoryErrorKind::Unsupported);

        let scoped = plan(QueryOptions::default().custom(Scope::new(|q: &mut dyn QueryBuilder| {
            q.distinct()
        })));
        let err = update(&scoped, &Row::new().with("name", "b")).err().unwrap();
        assert_eq!(err.kind, RepositoryErrorKind::Unsupported);

        let unrestricted = plan(QueryOptions::default());
        let err = delete(&unrestricted).err().unwrap();
        assert_eq!(err.kind, RepositoryErrorKind::ValidationFailed);
    }

    #[test]
    fn test_unsupported_directives() {
        let preload = plan(QueryOptions::default().with(with_preload(["orders"])));
        let err = select(&preload, RepositoryOperation::List).err().unwrap();
        assert_eq!(err.kind, RepositoryErrorKind::Unsupported);

        let joined = plan(QueryOptions::default().with(with_join(["JOIN orders ON true"])));
        let err = delete(&joined).err().unwrap();
        assert_eq!(err.kind, RepositoryErrorKind::Unsupported);
        assert_eq!(err.operation, RepositoryOperation::Delete);
    }
}
