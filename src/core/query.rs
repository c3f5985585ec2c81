//! Typed list-query parameters
//!
//! A raw query-string map is parsed against a per-resource [`QueryConfig`]
//! into a [`ListQuery`]: an ordered [`FilterSpec`], a [`SortSpec`] and an
//! optional [`PageSpec`]. Nothing outside the whitelist survives parsing, so
//! builders and stores downstream only ever see known columns.
//!
//! # Example
//!
//! ```rust,ignore
//! // GET /arenas?city=Tor&capacity=18000&sort_by=capacity&order_by=DESC&page=1&page_size=10
//! let query = ListQuery::parse(&params, Arena::query_config())?;
//! assert_eq!(query.sort.direction, SortDirection::Desc);
//! ```

use crate::core::error::EngineError;
use crate::core::field::{FieldKind, FieldValue};
use crate::core::paginator::PageSpec;
use crate::core::resource::TableRef;
use indexmap::IndexMap;
use std::cmp::Ordering;
use std::collections::HashMap;

/// Query-string keys that are never filters
pub const RESERVED_PARAMS: &[&str] = &["sort_by", "order_by", "page", "page_size"];

// =============================================================================
// Whitelists
// =============================================================================

/// How a filter value is compared with its column
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PredicateKind {
    /// `column = value`
    Equals,
    /// anchored prefix, `column LIKE 'value%'`
    Prefix,
    /// `column >= value`
    AtLeast,
    /// `lo,hi`, inclusive on both ends
    Range,
}

/// A foreign key from the listed table into `table`.
///
/// Filters declared through a join compare a column of the referenced row,
/// e.g. games filtered by the name of the arena they were played in.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Join {
    pub column: &'static str,
    pub table: TableRef,
}

/// One whitelisted filter field
#[derive(Debug, Clone, Copy)]
pub struct FilterField {
    /// Query-string key
    pub name: &'static str,
    /// Column compared, in the listed table or the joined one
    pub column: &'static str,
    pub predicate: PredicateKind,
    pub kind: FieldKind,
    pub via: Option<Join>,
}

impl FilterField {
    pub const fn new(name: &'static str, predicate: PredicateKind, kind: FieldKind) -> Self {
        Self {
            name,
            column: name,
            predicate,
            kind,
            via: None,
        }
    }

    /// Compare `column` rather than the column named like the key
    pub const fn on(self, column: &'static str) -> Self {
        Self { column, ..self }
    }

    /// Compare the column in the `table` row referenced by `foreign_key`
    pub const fn through(self, foreign_key: &'static str, table: TableRef) -> Self {
        Self {
            via: Some(Join {
                column: foreign_key,
                table,
            }),
            ..self
        }
    }
}

/// Per-resource whitelist of filters and sortable columns
#[derive(Debug, Clone, Copy)]
pub struct QueryConfig {
    pub filters: &'static [FilterField],
    pub sort_fields: &'static [&'static str],
    /// Column used when no `sort_by` is supplied
    pub default_sort: &'static str,
}

impl QueryConfig {
    fn filter(&self, name: &str) -> Option<&FilterField> {
        self.filters.iter().find(|f| f.name == name)
    }

    fn sort_field(&self, name: &str) -> Option<&'static str> {
        self.sort_fields.iter().copied().find(|f| *f == name)
    }

    fn allowed_keys(&self) -> String {
        self.filters
            .iter()
            .map(|f| f.name)
            .chain(RESERVED_PARAMS.iter().copied())
            .collect::<Vec<_>>()
            .join(", ")
    }
}

// =============================================================================
// FilterSpec
// =============================================================================

/// A parsed, typed filter value
#[derive(Debug, Clone, PartialEq)]
pub enum Predicate {
    Equals(FieldValue),
    Prefix(String),
    AtLeast(FieldValue),
    Range(FieldValue, FieldValue),
}

impl Predicate {
    /// Evaluate the predicate against a stored column value
    pub fn matches(&self, value: &FieldValue) -> bool {
        if value.is_null() {
            return false;
        }
        match self {
            Predicate::Equals(expected) => value.collates_eq(expected),
            Predicate::Prefix(prefix) => value.starts_with(prefix),
            Predicate::AtLeast(min) => matches!(
                value.collate(min),
                Some(Ordering::Greater | Ordering::Equal)
            ),
            Predicate::Range(lo, hi) => {
                matches!(
                    value.collate(lo),
                    Some(Ordering::Greater | Ordering::Equal)
                ) && matches!(value.collate(hi), Some(Ordering::Less | Ordering::Equal))
            }
        }
    }
}

/// Ordered mapping of whitelisted column to predicate
///
/// Entries keep the whitelist order, which keeps generated SQL stable for a
/// given set of parameters. Filters on joined tables are kept apart from the
/// listed table's own columns.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct FilterSpec {
    entries: IndexMap<&'static str, Predicate>,
    joined: IndexMap<(&'static str, &'static str), (Join, Predicate)>,
}

impl FilterSpec {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, column: &'static str, predicate: Predicate) {
        self.entries.insert(column, predicate);
    }

    /// Filter on `column` of the row `join` points at
    pub fn insert_joined(&mut self, join: Join, column: &'static str, predicate: Predicate) {
        self.joined
            .insert((join.column, column), (join, predicate));
    }

    pub fn get(&self, column: &str) -> Option<&Predicate> {
        self.entries.get(column).or_else(|| {
            self.joined
                .iter()
                .find(|((_, c), _)| *c == column)
                .map(|(_, (_, predicate))| predicate)
        })
    }

    /// Filters on the listed table's own columns
    pub fn iter(&self) -> impl Iterator<Item = (&'static str, &Predicate)> {
        self.entries.iter().map(|(k, v)| (*k, v))
    }

    /// Filters on joined tables, with the join and the joined column
    pub fn joined(&self) -> impl Iterator<Item = (Join, &'static str, &Predicate)> {
        self.joined
            .iter()
            .map(|((_, column), (join, predicate))| (*join, *column, predicate))
    }

    pub fn len(&self) -> usize {
        self.entries.len() + self.joined.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty() && self.joined.is_empty()
    }
}

// =============================================================================
// SortSpec
// =============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SortDirection {
    #[default]
    Asc,
    Desc,
}

impl SortDirection {
    /// Parse `asc`/`desc`, case-insensitively
    pub fn parse(raw: &str) -> Option<Self> {
        match raw.to_ascii_lowercase().as_str() {
            "asc" => Some(SortDirection::Asc),
            "desc" => Some(SortDirection::Desc),
            _ => None,
        }
    }

    pub fn as_sql(&self) -> &'static str {
        match self {
            SortDirection::Asc => "ASC",
            SortDirection::Desc => "DESC",
        }
    }

    /// Apply the direction to an ascending ordering
    pub fn apply(&self, ordering: Ordering) -> Ordering {
        match self {
            SortDirection::Asc => ordering,
            SortDirection::Desc => ordering.reverse(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SortSpec {
    pub field: &'static str,
    pub direction: SortDirection,
}

// =============================================================================
// Scope
// =============================================================================

/// Fixed predicate for nested listings: any of `columns` equals `value`
///
/// `/teams/{id}/games` scopes games with `home_team_id = ? OR away_team_id = ?`.
#[derive(Debug, Clone, PartialEq)]
pub struct Scope {
    pub columns: &'static [&'static str],
    pub value: FieldValue,
}

impl Scope {
    pub fn new(columns: &'static [&'static str], value: impl Into<FieldValue>) -> Self {
        Self {
            columns,
            value: value.into(),
        }
    }

    /// Evaluate the scope against a row, given a column accessor
    pub fn matches(&self, column: impl Fn(&str) -> FieldValue) -> bool {
        self.columns
            .iter()
            .any(|c| column(*c).collates_eq(&self.value))
    }
}

// =============================================================================
// ListQuery
// =============================================================================

/// Everything needed to run one filtered, sorted, optionally paged listing
#[derive(Debug, Clone, PartialEq)]
pub struct ListQuery {
    pub filter: FilterSpec,
    pub sort: SortSpec,
    pub page: Option<PageSpec>,
    pub scope: Option<Scope>,
}

impl ListQuery {
    /// Unfiltered listing in default order
    pub fn all(config: &QueryConfig) -> Self {
        Self {
            filter: FilterSpec::new(),
            sort: SortSpec {
                field: config.default_sort,
                direction: SortDirection::Asc,
            },
            page: None,
            scope: None,
        }
    }

    /// Parse a raw query-string map against a resource whitelist.
    ///
    /// Pagination is checked first, so a half-specified page fails whatever
    /// else the request carries. Unknown keys are reported in sorted order so
    /// the error is deterministic.
    pub fn parse(
        params: &HashMap<String, String>,
        config: &QueryConfig,
    ) -> Result<Self, EngineError> {
        let page = PageSpec::from_params(
            params.get("page").map(String::as_str),
            params.get("page_size").map(String::as_str),
        )?;

        let mut unknown: Vec<&str> = params
            .keys()
            .map(String::as_str)
            .filter(|k| !RESERVED_PARAMS.contains(k) && config.filter(k).is_none())
            .collect();
        unknown.sort_unstable();
        if let Some(key) = unknown.first() {
            return Err(EngineError::invalid_input(
                *key,
                format!(
                    "unknown query parameter; allowed parameters are: {}",
                    config.allowed_keys()
                ),
            ));
        }

        let field = match params.get("sort_by") {
            Some(raw) => config.sort_field(raw).ok_or_else(|| {
                EngineError::invalid_input(
                    "sort_by",
                    format!(
                        "'{}' is not sortable; allowed fields are: {}",
                        raw,
                        config.sort_fields.join(", ")
                    ),
                )
            })?,
            None => config.default_sort,
        };

        let direction = match params.get("order_by") {
            Some(raw) => SortDirection::parse(raw).ok_or_else(|| {
                EngineError::invalid_input(
                    "order_by",
                    format!("'{}' is not a sort direction; use asc or desc", raw),
                )
            })?,
            None => SortDirection::Asc,
        };

        let mut filter = FilterSpec::new();
        for spec in config.filters {
            let Some(raw) = params.get(spec.name) else {
                continue;
            };
            let predicate = parse_predicate(spec, raw)?;
            match spec.via {
                Some(join) => filter.insert_joined(join, spec.column, predicate),
                None => filter.insert(spec.column, predicate),
            }
        }

        Ok(Self {
            filter,
            sort: SortSpec { field, direction },
            page,
            scope: None,
        })
    }

    /// Restrict the listing to rows matching `scope`
    pub fn with_scope(mut self, scope: Scope) -> Self {
        self.scope = Some(scope);
        self
    }
}

fn parse_predicate(spec: &FilterField, raw: &str) -> Result<Predicate, EngineError> {
    if raw.trim().is_empty() {
        return Err(EngineError::invalid_input(spec.name, "must not be empty"));
    }

    let typed = |value: &str| {
        spec.kind.parse_str(value.trim()).ok_or_else(|| {
            EngineError::invalid_input(spec.name, format!("must be a valid {}", spec.kind.name()))
        })
    };

    match spec.predicate {
        PredicateKind::Equals => typed(raw).map(Predicate::Equals),
        PredicateKind::Prefix => Ok(Predicate::Prefix(raw.to_string())),
        PredicateKind::AtLeast => typed(raw).map(Predicate::AtLeast),
        PredicateKind::Range => {
            let (lo, hi) = raw.split_once(',').ok_or_else(|| {
                EngineError::invalid_input(spec.name, "must be a range written as 'low,high'")
            })?;
            let (lo, hi) = (typed(lo)?, typed(hi)?);
            if lo.collate(&hi) == Some(Ordering::Greater) {
                return Err(EngineError::invalid_input(
                    spec.name,
                    "range lower bound is greater than its upper bound",
                ));
            }
            Ok(Predicate::Range(lo, hi))
        }
    }
}
