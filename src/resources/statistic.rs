//! Per-game player statistics

use super::game::Game;
use super::player::Player;
use crate::core::field::FieldKind;
use crate::core::query::{FilterField, PredicateKind, QueryConfig};
use crate::core::resource::{Column, ForeignKey, Resource, TableRef};
use crate::core::validation::{Rule, RuleSet};
use serde::{Deserialize, Serialize};
use std::sync::OnceLock;

/// Scope columns for the statistics of one game
pub const GAME_STATS: &[&str] = &["game_id"];

/// One player's line in one game
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct Statistic {
    #[serde(default)]
    pub stat_id: Option<i64>,
    pub game_id: i64,
    pub player_id: i64,
    pub goals_scored: i64,
    pub assists: i64,
    pub shot_on_target: i64,
}

const COLUMNS: &[Column] = &[
    Column::new("stat_id", FieldKind::Integer),
    Column::new("game_id", FieldKind::Integer),
    Column::new("player_id", FieldKind::Integer),
    Column::new("goals_scored", FieldKind::Integer),
    Column::new("assists", FieldKind::Integer),
    Column::new("shot_on_target", FieldKind::Integer),
];

// `assist` and `sog` are the public keys for the assists and shots columns
static QUERY: QueryConfig = QueryConfig {
    filters: &[
        FilterField::new("first_name", PredicateKind::Prefix, FieldKind::Text)
            .through("player_id", Player::TABLE),
        FilterField::new("goals_scored", PredicateKind::AtLeast, FieldKind::Integer),
        FilterField::new("assist", PredicateKind::AtLeast, FieldKind::Integer).on("assists"),
        FilterField::new("sog", PredicateKind::AtLeast, FieldKind::Integer).on("shot_on_target"),
    ],
    sort_fields: &["goals_scored", "assists", "shot_on_target"],
    default_sort: "stat_id",
};

fn reference(table: TableRef) -> Vec<Rule> {
    vec![
        Rule::Required,
        Rule::Type(FieldKind::Integer),
        Rule::Min(1.0),
        Rule::exists(table),
    ]
}

fn count() -> Vec<Rule> {
    vec![Rule::Required, Rule::Type(FieldKind::Integer), Rule::Min(0.0)]
}

fn rules(id_rules: Vec<Rule>) -> RuleSet {
    RuleSet::new()
        .field("stat_id", id_rules)
        .field("game_id", reference(Game::TABLE))
        .field("player_id", reference(Player::TABLE))
        .field("goals_scored", count())
        .field("assists", count())
        .field("shot_on_target", count())
}

impl Resource for Statistic {
    const TABLE: TableRef = TableRef::new("statistics", "stat_id");
    const SINGULAR: &'static str = "statistic";

    fn columns() -> &'static [Column] {
        COLUMNS
    }

    fn foreign_keys() -> &'static [ForeignKey] {
        &[
            ForeignKey {
                column: "game_id",
                references: Game::TABLE,
            },
            ForeignKey {
                column: "player_id",
                references: Player::TABLE,
            },
        ]
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
                Rule::unique(Statistic::TABLE, "stat_id"),
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
                "stat_id",
                vec![Rule::Required, Rule::Type(FieldKind::Integer), Rule::Min(1.0)],
            )
        })
    }

    fn id(&self) -> Option<i64> {
        self.stat_id
    }

    fn set_id(&mut self, id: i64) {
        self.stat_id = Some(id);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::query::{ListQuery, Predicate};
    use crate::core::field::FieldValue;
    use std::collections::HashMap;

    #[test]
    fn test_short_keys_filter_their_columns() {
        let params = HashMap::from([
            ("assist".to_string(), "1".to_string()),
            ("sog".to_string(), "3".to_string()),
        ]);
        let query = ListQuery::parse(&params, Statistic::query_config()).unwrap();
        assert_eq!(
            query.filter.get("assists"),
            Some(&Predicate::AtLeast(FieldValue::Integer(1)))
        );
        assert_eq!(
            query.filter.get("shot_on_target"),
            Some(&Predicate::AtLeast(FieldValue::Integer(3)))
        );
    }

    #[test]
    fn test_first_name_reaches_players() {
        let params = HashMap::from([("first_name".to_string(), "Con".to_string())]);
        let query = ListQuery::parse(&params, Statistic::query_config()).unwrap();
        let (join, column, _) = query.filter.joined().next().unwrap();
        assert_eq!(join.table, Player::TABLE);
        assert_eq!(column, "first_name");
    }
}
