//! Games

use super::arena::Arena;
use super::team::Team;
use crate::core::field::FieldKind;
use crate::core::query::{FilterField, PredicateKind, QueryConfig};
use crate::core::resource::{Column, ForeignKey, Resource, TableRef};
use crate::core::validation::{Rule, RuleSet};
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use std::sync::OnceLock;

/// Game types
pub const GAME_TYPES: &[&str] = &["regular", "preseason", "playoffs"];

/// Side of the rink the home team starts on
pub const SIDES: &[&str] = &["left", "right"];

/// Scope columns for a team's games, home or away
pub const TEAM_GAMES: &[&str] = &["home_team_id", "away_team_id"];

/// Scope columns for an arena's games
pub const ARENA_GAMES: &[&str] = &["arena_id"];

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct Game {
    #[serde(default)]
    pub game_id: Option<i64>,
    pub game_date: NaiveDate,
    pub home_team_id: i64,
    pub away_team_id: i64,
    pub home_score: i64,
    pub away_score: i64,
    pub arena_id: i64,
    pub game_type: String,
    pub side_start: String,
}

const COLUMNS: &[Column] = &[
    Column::new("game_id", FieldKind::Integer),
    Column::new("game_date", FieldKind::Date),
    Column::new("home_team_id", FieldKind::Integer),
    Column::new("away_team_id", FieldKind::Integer),
    Column::new("home_score", FieldKind::Integer),
    Column::new("away_score", FieldKind::Integer),
    Column::new("arena_id", FieldKind::Integer),
    Column::new("game_type", FieldKind::Text),
    Column::new("side_start", FieldKind::Text),
];

static QUERY: QueryConfig = QueryConfig {
    filters: &[
        FilterField::new("game_date", PredicateKind::AtLeast, FieldKind::Date),
        FilterField::new("game_type", PredicateKind::Prefix, FieldKind::Text),
        FilterField::new("side_start", PredicateKind::Prefix, FieldKind::Text),
        FilterField::new("home_team_id", PredicateKind::Equals, FieldKind::Integer),
    ],
    sort_fields: &[
        "game_date",
        "game_type",
        "side_start",
        "home_score",
        "away_score",
    ],
    default_sort: "game_id",
};

/// Whitelist for the games of one team or arena
pub static WITHIN_PARENT: QueryConfig = QueryConfig {
    filters: &[
        FilterField::new("game_date", PredicateKind::AtLeast, FieldKind::Date),
        FilterField::new("arena_name", PredicateKind::Prefix, FieldKind::Text)
            .through("arena_id", Arena::TABLE),
        FilterField::new("game_type", PredicateKind::Prefix, FieldKind::Text),
        FilterField::new("side_start", PredicateKind::Prefix, FieldKind::Text),
    ],
    sort_fields: &[
        "game_date",
        "game_type",
        "side_start",
        "home_score",
        "away_score",
    ],
    default_sort: "game_id",
};

fn team_ref() -> Vec<Rule> {
    vec![
        Rule::Required,
        Rule::Type(FieldKind::Integer),
        Rule::Min(1.0),
        Rule::exists(Team::TABLE),
    ]
}

fn score() -> Vec<Rule> {
    vec![Rule::Required, Rule::Type(FieldKind::Integer), Rule::Min(0.0)]
}

fn rules(id_rules: Vec<Rule>) -> RuleSet {
    let mut away = team_ref();
    away.push(Rule::differs_from("home_team_id"));

    RuleSet::new()
        .field("game_id", id_rules)
        .field("game_date", vec![Rule::Required, Rule::Type(FieldKind::Date)])
        .field("home_team_id", team_ref())
        .field("away_team_id", away)
        .field("home_score", score())
        .field("away_score", score())
        .field(
            "arena_id",
            vec![
                Rule::Required,
                Rule::Type(FieldKind::Integer),
                Rule::Min(1.0),
                Rule::exists(Arena::TABLE),
            ],
        )
        .field(
            "game_type",
            vec![
                Rule::Required,
                Rule::Type(FieldKind::Text),
                Rule::Enum(GAME_TYPES),
            ],
        )
        .field(
            "side_start",
            vec![Rule::Required, Rule::Type(FieldKind::Text), Rule::Enum(SIDES)],
        )
}

impl Resource for Game {
    const TABLE: TableRef = TableRef::new("games", "game_id");
    const SINGULAR: &'static str = "game";

    fn columns() -> &'static [Column] {
        COLUMNS
    }

    fn foreign_keys() -> &'static [ForeignKey] {
        &[
            ForeignKey {
                column: "home_team_id",
                references: Team::TABLE,
            },
            ForeignKey {
                column: "away_team_id",
                references: Team::TABLE,
            },
            ForeignKey {
                column: "arena_id",
                references: Arena::TABLE,
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
                Rule::unique(Game::TABLE, "game_id"),
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
                "game_id",
                vec![Rule::Required, Rule::Type(FieldKind::Integer), Rule::Min(1.0)],
            )
        })
    }

    fn id(&self) -> Option<i64> {
        self.game_id
    }

    fn set_id(&mut self, id: i64) {
        self.game_id = Some(id);
    }
}
