//! Fixed-order application of query options

use super::builder::QueryBuilder;
use super::options::QueryOptions;

/// Apply `options` to `builder`
///
/// Directives are applied in this order, regardless of the order they were
/// built in:
///
/// 1. filter, when set
/// 2. limit, when positive
/// 3. offset, when positive
/// 4. clauses, in order
/// 5. preloads, in order
/// 6. select, when non-empty
/// 7. omit, when non-empty
/// 8. joins, in order
/// 9. group, when non-empty
/// 10. having, when set
/// 11. distinct, when true
/// 12. scopes, in order
/// 13. custom, when set
///
/// `select` and `omit` are both forwarded verbatim when both are present.
/// `None` leaves the builder untouched.
///
/// # Example
///
/// ```rust
/// use storekit::query::{apply_options, Clause, Filter, QueryBuilder, QueryOptions};
///
/// #[derive(Default)]
/// struct Sql(Vec<String>);
///
/// impl QueryBuilder for Sql {
///     fn filter(&mut self, _: Filter) { self.0.push("WHERE".into()) }
///     fn limit(&mut self, n: i64) { self.0.push(format!("LIMIT {n}")) }
///     fn offset(&mut self, n: i64) { self.0.push(format!("OFFSET {n}")) }
///     fn clause(&mut self, _: Clause) {}
///     fn preload(&mut self, _: String) {}
///     fn select(&mut self, _: Vec<String>) {}
///     fn omit(&mut self, _: Vec<String>) {}
///     fn join(&mut self, _: String) {}
///     fn group(&mut self, _: String) {}
///     fn having(&mut self, _: Filter) {}
///     fn distinct(&mut self) {}
/// }
///
/// let mut sql = Sql::default();
/// let opts = QueryOptions::default().offset(5).limit(10).filter(Filter::eq("a", 1_i64));
/// apply_options(&mut sql, Some(opts));
/// assert_eq!(sql.0, vec!["WHERE", "LIMIT 10", "OFFSET 5"]);
/// ```
pub fn apply_options(builder: &mut dyn QueryBuilder, options: Option<QueryOptions>) {
    let Some(options) = options else {
        return;
    };

    if let Some(filter) = options.filter {
        builder.filter(filter);
    }

    if options.limit > 0 {
        builder.limit(options.limit);
    }

    if options.offset > 0 {
        builder.offset(options.offset);
    }

    for clause in options.clauses {
        builder.clause(clause);
    }

    for preload in options.preloads {
        builder.preload(preload);
    }

    if !options.selects.is_empty() {
        builder.select(options.selects);
    }

    if !options.omit.is_empty() {
        builder.omit(options.omit);
    }

    for join in options.joins {
        builder.join(join);
    }

    if !options.group.is_empty() {
        builder.group(options.group);
    }

    if let Some(having) = options.having {
        builder.having(having);
    }

    if options.distinct {
        builder.distinct();
    }

    for scope in &options.scopes {
        scope.apply(builder);
    }

    if let Some(custom) = &options.custom {
        custom.apply(builder);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::query::builder::testing::RecordingBuilder;
    use crate::query::{
        build_options, with_clauses, with_custom, with_distinct, with_filter, with_group,
        with_having, with_join, with_limit, with_offset, with_omit, with_preload, with_scope,
        with_select, Clause, Filter, QueryOption, Scope,
    };

    fn recorded(options: Option<QueryOptions>) -> Vec<String> {
        let mut builder = RecordingBuilder::default();
        apply_options(&mut builder, options);
        builder.calls
    }

    #[test]
    fn test_none_is_identity() {
        assert!(recorded(None).is_empty());
    }

    #[test]
    fn test_empty_options_apply_nothing() {
        assert!(recorded(Some(build_options(Vec::new()))).is_empty());
    }

    #[test]
    fn test_full_precedence_order() {
        let scope_a = Scope::new(|q: &mut dyn QueryBuilder| q.group("scope_a".to_string()));
        let scope_b = Scope::new(|q: &mut dyn QueryBuilder| q.group("scope_b".to_string()));
        let custom = Scope::new(|q: &mut dyn QueryBuilder| q.limit(99));

        // Authored back to front
        let options = build_options([
            with_custom(custom),
            with_scope(scope_a),
            with_scope(scope_b),
            with_distinct(true),
            with_having(Filter::eq("h", 1_i64)),
            with_group("g"),
            with_join(["j1", "j2"]),
            with_omit(["o"]),
            with_select(["s"]),
            with_preload(["p1", "p2"]),
            with_clauses([Clause::raw("c1"), Clause::raw("c2")]),
            with_offset(5),
            with_limit(10),
            with_filter(Filter::eq("f", 1_i64)),
        ]);

        let calls = recorded(Some(options));
        let expected = vec![
            format!("filter {:?}", Filter::eq("f", 1_i64)),
            "limit 10".to_string(),
            "offset 5".to_string(),
            format!("clause {:?}", Clause::raw("c1")),
            format!("clause {:?}", Clause::raw("c2")),
            "preload p1".to_string(),
            "preload p2".to_string(),
            "select s".to_string(),
            "omit o".to_string(),
            "join j1".to_string(),
            "join j2".to_string(),
            "group g".to_string(),
            format!("having {:?}", Filter::eq("h", 1_i64)),
            "distinct".to_string(),
            "group scope_a".to_string(),
            "group scope_b".to_string(),
            "limit 99".to_string(),
        ];
        assert_eq!(calls, expected);
    }

    #[test]
    fn test_non_positive_limit_and_offset_are_skipped() {
        let calls = recorded(Some(build_options([with_limit(0), with_offset(-3)])));
        assert!(calls.is_empty());

        let calls = recorded(Some(build_options([with_limit(-1), with_offset(2)])));
        assert_eq!(calls, vec!["offset 2"]);
    }

    #[test]
    fn test_select_and_omit_both_forwarded() {
        let calls = recorded(Some(build_options([
            with_omit(["password"]),
            with_select(["id", "password"]),
        ])));
        assert_eq!(calls, vec!["select id,password", "omit password"]);
    }

    #[test]
    fn test_authoring_order_does_not_matter() {
        let filter_and_limit: Vec<QueryOption> =
            vec![with_filter(Filter::eq("a", 1_i64)), with_limit(10)];
        let joins: Vec<QueryOption> = vec![with_join(["JOIN t ON t.id = a.t_id"])];

        let first = build_options(filter_and_limit.iter().cloned().chain(joins.iter().cloned()));
        let second = build_options(joins.into_iter().chain(filter_and_limit));

        assert_eq!(recorded(Some(first)), recorded(Some(second)));
    }

    #[test]
    fn test_builder_chain_and_functional_options_apply_identically() {
        let chained = QueryOptions::default().limit(10).offset(5).distinct(true);
        let built = build_options([with_limit(10), with_offset(5), with_distinct(true)]);

        let mut from_chain = RecordingBuilder::default();
        chained.apply_to(&mut from_chain);
        let mut from_build = RecordingBuilder::default();
        built.apply_to(&mut from_build);

        assert_eq!(from_chain, from_build);
        assert_eq!(from_chain.calls, vec!["limit 10", "offset 5", "distinct"]);
    }
}
