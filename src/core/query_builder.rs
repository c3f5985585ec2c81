//! Parameterized SQL generation
//!
//! Every identifier that reaches SQL text comes from a static whitelist
//! (resource columns, filter fields, sort fields); every value is bound as a
//! `?` placeholder. The placeholder style is shared by MySQL and SQLite.
//!
//! # Example
//!
//! ```rust,ignore
//! let statements = QueryBuilder::for_resource::<Arena>().build(&query);
//! // SELECT arena_id, arena_name, ... FROM arenas WHERE arena_name LIKE ? ESCAPE '!'
//! //   ORDER BY capacity DESC, arena_id ASC LIMIT ? OFFSET ?
//! // SELECT COUNT(*) FROM arenas WHERE arena_name LIKE ? ESCAPE '!'
//! ```

use crate::core::field::FieldValue;
use crate::core::query::{ListQuery, Predicate};
use crate::core::resource::{Column, Resource, TableRef};

/// SQL text with its bound values, in placeholder order
#[derive(Debug, Clone, PartialEq)]
pub struct BuiltQuery {
    pub sql: String,
    pub params: Vec<FieldValue>,
}

/// The select and count statements of one listing, sharing a WHERE clause
#[derive(Debug, Clone, PartialEq)]
pub struct ListStatements {
    pub select: BuiltQuery,
    pub count: BuiltQuery,
}

/// Escape character used for LIKE patterns
const LIKE_ESCAPE: char = '!';

/// Escape LIKE wildcards so a prefix filter matches literally
pub fn escape_like(raw: &str) -> String {
    let mut escaped = String::with_capacity(raw.len());
    for c in raw.chars() {
        if matches!(c, '%' | '_' | LIKE_ESCAPE) {
            escaped.push(LIKE_ESCAPE);
        }
        escaped.push(c);
    }
    escaped
}

/// One filter condition, pushing its bound values onto `params`
fn condition(column: &str, predicate: &Predicate, params: &mut Vec<FieldValue>) -> String {
    match predicate {
        Predicate::Equals(value) => {
            params.push(value.clone());
            format!("{} = ?", column)
        }
        Predicate::Prefix(prefix) => {
            params.push(FieldValue::String(format!("{}%", escape_like(prefix))));
            format!("{} LIKE ? ESCAPE '{}'", column, LIKE_ESCAPE)
        }
        Predicate::AtLeast(value) => {
            params.push(value.clone());
            format!("{} >= ?", column)
        }
        Predicate::Range(lo, hi) => {
            params.push(lo.clone());
            params.push(hi.clone());
            format!("{} BETWEEN ? AND ?", column)
        }
    }
}

/// Builds statements for one resource table
#[derive(Debug, Clone, Copy)]
pub struct QueryBuilder {
    table: TableRef,
    columns: &'static [Column],
}

impl QueryBuilder {
    pub fn for_resource<R: Resource>() -> Self {
        Self {
            table: R::TABLE,
            columns: R::columns(),
        }
    }

    fn column_list(&self) -> String {
        self.columns
            .iter()
            .map(|c| c.name)
            .collect::<Vec<_>>()
            .join(", ")
    }

    /// Build the select and count statements for a listing
    pub fn build(&self, query: &ListQuery) -> ListStatements {
        let mut conditions = Vec::new();
        let mut params = Vec::new();

        for (column, predicate) in query.filter.iter() {
            conditions.push(condition(column, predicate, &mut params));
        }

        // Joined filters become a semi-join on the referenced table
        for (join, column, predicate) in query.filter.joined() {
            conditions.push(format!(
                "{} IN (SELECT {} FROM {} WHERE {})",
                join.column,
                join.table.id_column,
                join.table.table,
                condition(column, predicate, &mut params)
            ));
        }

        if let Some(scope) = &query.scope {
            let any = scope
                .columns
                .iter()
                .map(|c| format!("{} = ?", c))
                .collect::<Vec<_>>()
                .join(" OR ");
            conditions.push(format!("({})", any));
            params.extend(scope.columns.iter().map(|_| scope.value.clone()));
        }

        let where_clause = if conditions.is_empty() {
            String::new()
        } else {
            format!(" WHERE {}", conditions.join(" AND "))
        };

        let count = BuiltQuery {
            sql: format!("SELECT COUNT(*) FROM {}{}", self.table.table, where_clause),
            params: params.clone(),
        };

        let mut sql = format!(
            "SELECT {} FROM {}{} ORDER BY {} {}",
            self.column_list(),
            self.table.table,
            where_clause,
            query.sort.field,
            query.sort.direction.as_sql()
        );
        // Stable order across pages when the sort column has ties
        if query.sort.field != self.table.id_column {
            sql.push_str(&format!(", {} ASC", self.table.id_column));
        }
        if let Some(page) = query.page {
            sql.push_str(" LIMIT ? OFFSET ?");
            params.push(FieldValue::Integer(page.limit() as i64));
            params.push(FieldValue::Integer(page.offset() as i64));
        }

        ListStatements {
            select: BuiltQuery { sql, params },
            count,
        }
    }

    pub fn select_by_id(&self, id: i64) -> BuiltQuery {
        BuiltQuery {
            sql: format!(
                "SELECT {} FROM {} WHERE {} = ?",
                self.column_list(),
                self.table.table,
                self.table.id_column
            ),
            params: vec![FieldValue::Integer(id)],
        }
    }

    /// Insert the given columns; a NULL id column is left to the store
    pub fn insert(&self, values: &[(Column, FieldValue)]) -> BuiltQuery {
        let values: Vec<_> = values
            .iter()
            .filter(|(c, v)| !(c.name == self.table.id_column && v.is_null()))
            .collect();
        let names: Vec<_> = values.iter().map(|(c, _)| c.name).collect();
        let placeholders = vec!["?"; names.len()].join(", ");
        BuiltQuery {
            sql: format!(
                "INSERT INTO {} ({}) VALUES ({})",
                self.table.table,
                names.join(", "),
                placeholders
            ),
            params: values.into_iter().map(|(_, v)| v.clone()).collect(),
        }
    }

    /// Overwrite every non-id column of row `id`
    pub fn update(&self, id: i64, values: &[(Column, FieldValue)]) -> BuiltQuery {
        let values: Vec<_> = values
            .iter()
            .filter(|(c, _)| c.name != self.table.id_column)
            .collect();
        let assignments = values
            .iter()
            .map(|(c, _)| format!("{} = ?", c.name))
            .collect::<Vec<_>>()
            .join(", ");
        let mut params: Vec<_> = values.into_iter().map(|(_, v)| v.clone()).collect();
        params.push(FieldValue::Integer(id));
        BuiltQuery {
            sql: format!(
                "UPDATE {} SET {} WHERE {} = ?",
                self.table.table, assignments, self.table.id_column
            ),
            params,
        }
    }

    pub fn delete(&self, id: i64) -> BuiltQuery {
        BuiltQuery {
            sql: format!(
                "DELETE FROM {} WHERE {} = ?",
                self.table.table, self.table.id_column
            ),
            params: vec![FieldValue::Integer(id)],
        }
    }

    /// Existence check for an arbitrary table's primary key
    pub fn exists_by_id(table: TableRef, id: i64) -> BuiltQuery {
        BuiltQuery {
            sql: format!(
                "SELECT 1 FROM {} WHERE {} = ? LIMIT 1",
                table.table, table.id_column
            ),
            params: vec![FieldValue::Integer(id)],
        }
    }

    /// Check for a row holding `value` in `column`, other than row `except`
    pub fn exists_unique(
        table: TableRef,
        column: &'static str,
        value: &FieldValue,
        except: Option<i64>,
    ) -> BuiltQuery {
        let mut sql = format!("SELECT 1 FROM {} WHERE {} = ?", table.table, column);
        let mut params = vec![value.clone()];
        if let Some(id) = except {
            sql.push_str(&format!(" AND {} <> ?", table.id_column));
            params.push(FieldValue::Integer(id));
        }
        sql.push_str(" LIMIT 1");
        BuiltQuery { sql, params }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::field::FieldKind;
    use crate::core::paginator::PageSpec;
    use crate::core::query::{FilterSpec, Join, Scope, SortDirection, SortSpec};

    const GAMES: TableRef = TableRef::new("games", "game_id");
    const COLUMNS: &[Column] = &[
        Column::new("game_id", FieldKind::Integer),
        Column::new("game_date", FieldKind::Date),
        Column::new("game_type", FieldKind::Text),
    ];

    fn builder() -> QueryBuilder {
        QueryBuilder {
            table: GAMES,
            columns: COLUMNS,
        }
    }

    fn query(filter: FilterSpec) -> ListQuery {
        ListQuery {
            filter,
            sort: SortSpec {
                field: "game_id",
                direction: SortDirection::Asc,
            },
            page: None,
            scope: None,
        }
    }

    #[test]
    fn test_unfiltered_listing() {
        let statements = builder().build(&query(FilterSpec::new()));
        assert_eq!(
            statements.select.sql,
            "SELECT game_id, game_date, game_type FROM games ORDER BY game_id ASC"
        );
        assert_eq!(statements.count.sql, "SELECT COUNT(*) FROM games");
        assert!(statements.select.params.is_empty());
    }

    #[test]
    fn test_prefix_is_bound_and_escaped() {
        let mut filter = FilterSpec::new();
        filter.insert("game_type", Predicate::Prefix("50%_off".into()));
        let statements = builder().build(&query(filter));
        assert!(statements.select.sql.contains("game_type LIKE ? ESCAPE '!'"));
        assert!(!statements.select.sql.contains("50%"));
        assert_eq!(
            statements.select.params,
            vec![FieldValue::String("50!%!_off%".into())]
        );
        assert_eq!(statements.count.params, statements.select.params);
    }

    #[test]
    fn test_sort_page_and_tie_break() {
        let mut q = query(FilterSpec::new());
        q.sort = SortSpec {
            field: "game_date",
            direction: SortDirection::Desc,
        };
        q.page = Some(PageSpec {
            page: 3,
            page_size: 10,
        });
        let statements = builder().build(&q);
        assert!(
            statements
                .select
                .sql
                .ends_with("ORDER BY game_date DESC, game_id ASC LIMIT ? OFFSET ?")
        );
        assert_eq!(
            statements.select.params,
            vec![FieldValue::Integer(10), FieldValue::Integer(20)]
        );
        assert!(!statements.count.sql.contains("LIMIT"));
    }

    #[test]
    fn test_scope_is_anded_into_both_statements() {
        let mut filter = FilterSpec::new();
        filter.insert(
            "game_date",
            Predicate::AtLeast(FieldKind::Date.parse_str("2024-01-01").unwrap()),
        );
        let q = query(filter).with_scope(Scope::new(&["home_team_id", "away_team_id"], 4_i64));
        let statements = builder().build(&q);
        assert_eq!(
            statements.count.sql,
            "SELECT COUNT(*) FROM games WHERE game_date >= ? AND (home_team_id = ? OR away_team_id = ?)"
        );
        assert_eq!(statements.count.params.len(), 3);
    }

    #[test]
    fn test_joined_filter_is_a_bound_subquery() {
        let mut filter = FilterSpec::new();
        filter.insert("game_type", Predicate::Prefix("reg".into()));
        filter.insert_joined(
            Join {
                column: "arena_id",
                table: TableRef::new("arenas", "arena_id"),
            },
            "arena_name",
            Predicate::Prefix("Rogers".into()),
        );
        let q = query(filter).with_scope(Scope::new(&["arena_id"], 2_i64));
        let statements = builder().build(&q);
        assert_eq!(
            statements.count.sql,
            "SELECT COUNT(*) FROM games WHERE game_type LIKE ? ESCAPE '!' \
             AND arena_id IN (SELECT arena_id FROM arenas WHERE arena_name LIKE ? ESCAPE '!') \
             AND (arena_id = ?)"
        );
        assert_eq!(
            statements.count.params,
            vec![
                FieldValue::String("reg%".into()),
                FieldValue::String("Rogers%".into()),
                FieldValue::Integer(2),
            ]
        );
    }

    #[test]
    fn test_insert_leaves_null_id_to_store() {
        let values = vec![
            (COLUMNS[0], FieldValue::Null),
            (COLUMNS[2], FieldValue::String("regular".into())),
        ];
        let built = builder().insert(&values);
        assert_eq!(built.sql, "INSERT INTO games (game_type) VALUES (?)");
        assert_eq!(built.params.len(), 1);
    }

    #[test]
    fn test_update_binds_id_last() {
        let values = vec![
            (COLUMNS[0], FieldValue::Integer(5)),
            (COLUMNS[2], FieldValue::String("playoffs".into())),
        ];
        let built = builder().update(5, &values);
        assert_eq!(built.sql, "UPDATE games SET game_type = ? WHERE game_id = ?");
        assert_eq!(built.params.last(), Some(&FieldValue::Integer(5)));
    }

    #[test]
    fn test_exists_unique_excludes_own_row() {
        let built = QueryBuilder::exists_unique(
            TableRef::new("teams", "team_id"),
            "team_name",
            &FieldValue::String("Leafs".into()),
            Some(3),
        );
        assert_eq!(
            built.sql,
            "SELECT 1 FROM teams WHERE team_name = ? AND team_id <> ? LIMIT 1"
        );
    }
}
