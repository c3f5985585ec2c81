//! Arenas

use super::team::Team;
use crate::core::field::FieldKind;
use crate::core::query::{FilterField, PredicateKind, QueryConfig};
use crate::core::resource::{Column, ForeignKey, Resource, TableRef};
use crate::core::validation::{Rule, RuleSet};
use serde::{Deserialize, Serialize};
use std::sync::OnceLock;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct Arena {
    #[serde(default)]
    pub arena_id: Option<i64>,
    pub arena_name: String,
    pub city: String,
    pub province: String,
    pub capacity: i64,
    pub year_built: i64,
    /// Home team, if the arena has one
    #[serde(default)]
    pub team_id: Option<i64>,
}

const COLUMNS: &[Column] = &[
    Column::new("arena_id", FieldKind::Integer),
    Column::new("arena_name", FieldKind::Text),
    Column::new("city", FieldKind::Text),
    Column::new("province", FieldKind::Text),
    Column::new("capacity", FieldKind::Integer),
    Column::new("year_built", FieldKind::Integer),
    Column::nullable("team_id", FieldKind::Integer),
];

static QUERY: QueryConfig = QueryConfig {
    filters: &[
        FilterField::new("arena_name", PredicateKind::Prefix, FieldKind::Text),
        FilterField::new("city", PredicateKind::Prefix, FieldKind::Text),
        FilterField::new("province", PredicateKind::Prefix, FieldKind::Text),
        FilterField::new("capacity", PredicateKind::AtLeast, FieldKind::Integer),
        FilterField::new("year_built", PredicateKind::Range, FieldKind::Integer),
    ],
    sort_fields: &["arena_name", "capacity", "year_built"],
    default_sort: "arena_id",
};

fn text(max: usize) -> Vec<Rule> {
    vec![
        Rule::Required,
        Rule::Type(FieldKind::Text),
        Rule::LengthBetween(1, max),
    ]
}

fn rules(id_rules: Vec<Rule>) -> RuleSet {
    let mut name = text(100);
    name.push(Rule::unique(Arena::TABLE, "arena_name"));

    RuleSet::new()
        .field("arena_id", id_rules)
        .field("arena_name", name)
        .field("city", text(100))
        .field("province", text(100))
        .field(
            "capacity",
            vec![Rule::Required, Rule::Type(FieldKind::Integer), Rule::Min(0.0)],
        )
        .field(
            "year_built",
            vec![
                Rule::Required,
                Rule::Type(FieldKind::Integer),
                Rule::Min(1800.0),
                Rule::Max(2100.0),
            ],
        )
        .field(
            "team_id",
            vec![
                Rule::Type(FieldKind::Integer),
                Rule::Min(1.0),
                Rule::exists(Team::TABLE),
            ],
        )
}

impl Resource for Arena {
    const TABLE: TableRef = TableRef::new("arenas", "arena_id");
    const SINGULAR: &'static str = "arena";

    fn columns() -> &'static [Column] {
        COLUMNS
    }

    fn unique_columns() -> &'static [&'static str] {
        &["arena_name"]
    }

    fn foreign_keys() -> &'static [ForeignKey] {
        &[ForeignKey {
            column: "team_id",
            references: Team::TABLE,
        }]
    }

    fn query_config() -> &'static QueryConfig {
        &QUERY
    }

    fn create_rules() -> &'static RuleSet {
        static RULES: OnceLock<RuleSet> = OnceLock::new();
        RULES.get_or_init(|| {
            rules(vec![
                Rule::Type(FieldKind::Integer),
                Rule::Min(1.0),
                Rule::unique(Arena::TABLE, "arena_id"),
            ])
        })
    }

    fn update_rules() -> &'static RuleSet {
        static RULES: OnceLock<RuleSet> = OnceLock::new();
        RULES.get_or_init(|| {
            rules(vec![
                Rule::Required,
                Rule::Type(FieldKind::Integer),
                Rule::Min(1.0),
            ])
        })
    }

    fn delete_rules() -> &'static RuleSet {
        static RULES: OnceLock<RuleSet> = OnceLock::new();
        RULES.get_or_init(|| {
            RuleSet::new().field(
                "arena_id",
                vec![Rule::Required, Rule::Type(FieldKind::Integer), Rule::Min(1.0)],
            )
        })
    }

    fn id(&self) -> Option<i64> {
        self.arena_id
    }

    fn set_id(&mut self, id: i64) {
        self.arena_id = Some(id);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::resource::normalize;
    use serde_json::json;

    #[test]
    fn test_home_team_is_optional() {
        let arena: Arena = normalize(&json!({
            "arena_name": "Scotiabank Arena",
            "city": "Toronto",
            "province": "Ontario",
            "capacity": 18800,
            "year_built": 1999
        }))
        .unwrap();
        assert_eq!(arena.team_id, None);
        assert_eq!(arena.capacity, 18800);
    }

    #[test]
    fn test_team_id_references_teams() {
        assert_eq!(Arena::foreign_keys()[0].references, Team::TABLE);
    }
}
