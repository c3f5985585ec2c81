//! Players

use super::team::Team;
use crate::core::field::FieldKind;
use crate::core::query::{FilterField, PredicateKind, QueryConfig};
use crate::core::resource::{Column, ForeignKey, Resource, TableRef};
use crate::core::validation::{Rule, RuleSet};
use serde::{Deserialize, Serialize};
use std::sync::OnceLock;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct Player {
    #[serde(default)]
    pub player_id: Option<i64>,
    pub first_name: String,
    pub last_name: String,
    pub team_id: i64,
}

const COLUMNS: &[Column] = &[
    Column::new("player_id", FieldKind::Integer),
    Column::new("first_name", FieldKind::Text),
    Column::new("last_name", FieldKind::Text),
    Column::new("team_id", FieldKind::Integer),
];

static QUERY: QueryConfig = QueryConfig {
    filters: &[
        FilterField::new("first_name", PredicateKind::Prefix, FieldKind::Text),
        FilterField::new("last_name", PredicateKind::Prefix, FieldKind::Text),
        FilterField::new("team_id", PredicateKind::Equals, FieldKind::Integer),
    ],
    sort_fields: &["first_name", "last_name"],
    default_sort: "player_id",
};

fn name() -> Vec<Rule> {
    vec![
        Rule::Required,
        Rule::Type(FieldKind::Text),
        Rule::LengthBetween(1, 50),
    ]
}

fn rules(id_rules: Vec<Rule>) -> RuleSet {
    RuleSet::new()
        .field("player_id", id_rules)
        .field("first_name", name())
        .field("last_name", name())
        .field(
            "team_id",
            vec![
                Rule::Required,
                Rule::Type(FieldKind::Integer),
                Rule::Min(1.0),
                Rule::exists(Team::TABLE),
            ],
        )
}

impl Resource for Player {
    const TABLE: TableRef = TableRef::new("players", "player_id");
    const SINGULAR: &'static str = "player";

    fn columns() -> &'static [Column] {
        COLUMNS
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
                Rule::unique(Player::TABLE, "player_id"),
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
                "player_id",
                vec![Rule::Required, Rule::Type(FieldKind::Integer), Rule::Min(1.0)],
            )
        })
    }

    fn id(&self) -> Option<i64> {
        self.player_id
    }

    fn set_id(&mut self, id: i64) {
        self.player_id = Some(id);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_rule_sets_cover_every_column() {
        for column in Player::columns() {
            assert!(Player::create_rules().knows(column.name), "{}", column.name);
            assert!(Player::update_rules().knows(column.name), "{}", column.name);
        }
    }
}
