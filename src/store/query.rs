//! Dynamic filter-to-SQL translation shared by `query`, `search`, and
//! `stats`. Built around `sqlx::QueryBuilder`, the sqlx-native analogue of
//! the hand-rolled bind-index builder seen in dynamic-filter repositories
//! elsewhere in the corpus.

use crate::model::Filter;
use sqlx::{QueryBuilder, Sqlite};

/// Appends `WHERE`/`AND` predicates for every set field of `filter`, plus
/// the implicit latest-session scope when the filter calls for it.
/// `alias` is an optional table alias/prefix (e.g. `"r."`) for use in
/// joined queries. `has_where` must be `true` when `qb` already carries a
/// `WHERE` clause (e.g. `search`'s `WHERE records_fts MATCH ?`), so the
/// first predicate here continues with `AND` instead of opening a second
/// `WHERE`.
pub fn push_predicates<'a>(
    qb: &mut QueryBuilder<'a, Sqlite>,
    filter: &'a Filter,
    alias: &str,
    has_where: bool,
) {
    let mut first = !has_where;
    let mut clause = |qb: &mut QueryBuilder<'a, Sqlite>, sql: &str| {
        qb.push(if first { " WHERE " } else { " AND " });
        first = false;
        qb.push(sql);
    };

    if let Some(source) = &filter.source {
        clause(qb, &format!("{alias}source = "));
        qb.push_bind(source.as_str());
    }
    if let Some(min_severity) = filter.min_severity {
        clause(qb, &format!("{alias}severity <= "));
        qb.push_bind(min_severity.ordinal());
    }
    if let Some(category) = &filter.category {
        clause(qb, &format!("{alias}category = "));
        qb.push_bind(category.as_str());
    }
    if let Some(from) = filter.emit_time_from {
        clause(qb, &format!("{alias}emit_time >= "));
        qb.push_bind(from);
    }
    if let Some(to) = filter.emit_time_to {
        clause(qb, &format!("{alias}emit_time <= "));
        qb.push_bind(to);
    }
    if let Some(instance_id) = &filter.instance_id {
        clause(qb, &format!("{alias}instance_id = "));
        qb.push_bind(instance_id.as_str());
    }

    if let Some(session_id) = &filter.session_id {
        clause(qb, &format!("{alias}session_id = "));
        qb.push_bind(session_id.as_str());
    } else if filter.needs_latest_session_scope() {
        clause(
            qb,
            &format!(
                "{alias}session_id = (SELECT session_id FROM records \
                 ORDER BY receive_time DESC, id DESC LIMIT 1)"
            ),
        );
    }
}

/// Primary ordering used by `query` and `search`.
pub const ORDER_BY: &str = " ORDER BY emit_time DESC, id DESC";

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{Filter, Severity};

    #[test]
    fn no_predicates_without_a_filter() {
        let filter = Filter {
            all_sessions: true,
            ..Default::default()
        };
        let mut qb: QueryBuilder<Sqlite> = QueryBuilder::new("SELECT * FROM records");
        push_predicates(&mut qb, &filter, "", false);
        assert_eq!(qb.sql(), "SELECT * FROM records");
    }

    #[test]
    fn severity_predicate_uses_le() {
        let filter = Filter {
            min_severity: Some(Severity::Error),
            all_sessions: true,
            ..Default::default()
        };
        let mut qb: QueryBuilder<Sqlite> = QueryBuilder::new("SELECT * FROM records");
        push_predicates(&mut qb, &filter, "", false);
        assert!(qb.sql().contains("severity <= "));
    }

    #[test]
    fn default_filter_scopes_to_latest_session() {
        let filter = Filter::default();
        let mut qb: QueryBuilder<Sqlite> = QueryBuilder::new("SELECT * FROM records");
        push_predicates(&mut qb, &filter, "", false);
        assert!(qb.sql().contains("ORDER BY receive_time DESC, id DESC LIMIT 1"));
    }

    #[test]
    fn has_where_continues_with_and_instead_of_a_second_where() {
        let filter = Filter::default();
        let mut qb: QueryBuilder<Sqlite> =
            QueryBuilder::new("SELECT * FROM records_fts WHERE records_fts MATCH ?");
        push_predicates(&mut qb, &filter, "r.", true);
        let sql = qb.sql();
        assert_eq!(sql.matches(" WHERE ").count(), 1);
        assert!(sql.contains(" AND r.session_id = "));
    }
}
