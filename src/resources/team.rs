//! Teams

use crate::core::field::FieldKind;
use crate::core::query::{FilterField, PredicateKind, QueryConfig};
use crate::core::resource::{Column, Resource, TableRef};
use crate::core::validation::{Rule, RuleSet};
use serde::{Deserialize, Serialize};
use std::sync::OnceLock;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct Team {
    #[serde(default)]
    pub team_id: Option<i64>,
    pub team_name: String,
    pub abbreviation: String,
    pub founding_year: i64,
    pub championships: i64,
    pub general_manager: String,
}

const COLUMNS: &[Column] = &[
    Column::new("team_id", FieldKind::Integer),
    Column::new("team_name", FieldKind::Text),
    Column::new("abbreviation", FieldKind::Text),
    Column::new("founding_year", FieldKind::Integer),
    Column::new("championships", FieldKind::Integer),
    Column::new("general_manager", FieldKind::Text),
];

static QUERY: QueryConfig = QueryConfig {
    filters: &[
        FilterField::new("team_name", PredicateKind::Prefix, FieldKind::Text),
        FilterField::new("founding_year", PredicateKind::Equals, FieldKind::Integer),
        FilterField::new("abbreviation", PredicateKind::Equals, FieldKind::Text),
    ],
    sort_fields: &[
        "team_name",
        "founding_year",
        "championships",
        "general_manager",
        "abbreviation",
    ],
    default_sort: "team_id",
};

fn rules(id_rules: Vec<Rule>) -> RuleSet {
    RuleSet::new()
        .field("team_id", id_rules)
        .field(
            "team_name",
            vec![
                Rule::Required,
                Rule::Type(FieldKind::Text),
                Rule::LengthBetween(1, 100),
                Rule::unique(Team::TABLE, "team_name"),
            ],
        )
        .field(
            "abbreviation",
            vec![
                Rule::Required,
                Rule::Type(FieldKind::Text),
                Rule::pattern(r"^[A-Z]{2,5}$"),
                Rule::unique(Team::TABLE, "abbreviation"),
            ],
        )
        .field(
            "founding_year",
            vec![
                Rule::Required,
                Rule::Type(FieldKind::Integer),
                Rule::Min(1800.0),
                Rule::Max(2100.0),
            ],
        )
        .field(
            "championships",
            vec![Rule::Required, Rule::Type(FieldKind::Integer), Rule::Min(0.0)],
        )
        .field(
            "general_manager",
            vec![
                Rule::Required,
                Rule::Type(FieldKind::Text),
                Rule::LengthBetween(1, 100),
            ],
        )
}

impl Resource for Team {
    const TABLE: TableRef = TableRef::new("teams", "team_id");
    const SINGULAR: &'static str = "team";

    fn columns() -> &'static [Column] {
        COLUMNS
    }

    fn unique_columns() -> &'static [&'static str] {
        &["team_name", "abbreviation"]
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
                Rule::unique(Team::TABLE, "team_id"),
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
                "team_id",
                vec![Rule::Required, Rule::Type(FieldKind::Integer), Rule::Min(1.0)],
            )
        })
    }

    fn id(&self) -> Option<i64> {
        self.team_id
    }

    fn set_id(&mut self, id: i64) {
        self.team_id = Some(id);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::resource::normalize;
    use serde_json::json;

    #[test]
    fn test_normalize_coerces_numeric_strings() {
        let team: Team = normalize(&json!({
            "team_name": "Toronto Maple Leafs",
            "abbreviation": "TOR",
            "founding_year": "1917",
            "championships": 13,
            "general_manager": "Brad Treliving"
        }))
        .unwrap();
        assert_eq!(team.team_id, None);
        assert_eq!(team.founding_year, 1917);
    }

    #[test]
    fn test_unknown_fields_are_rejected() {
        let result = normalize::<Team>(&json!({
            "team_name": "Leafs",
            "abbreviation": "TOR",
            "founding_year": 1917,
            "championships": 13,
            "general_manager": "x",
            "mascot": "Carlton"
        }));
        assert!(result.is_err());
    }

    #[test]
    fn test_rule_sets_cover_every_column() {
        for column in Team::columns() {
            assert!(Team::create_rules().knows(column.name), "{}", column.name);
            assert!(Team::update_rules().knows(column.name), "{}", column.name);
        }
        assert!(!Team::delete_rules().knows("team_name"));
    }
}
