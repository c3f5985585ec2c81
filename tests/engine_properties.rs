//! End-to-end behaviour of the query and batch engines over the in-memory
//! store

#![cfg(feature = "in-memory")]

use async_trait::async_trait;
use puck::core::error::{FailureKind, StoreError};
use puck::core::field::FieldValue;
use puck::core::paginator::{Nested, PageSpec, Paginated};
use puck::core::query::ListQuery;
use puck::core::repository::{Applied, Lookup, Repository, Write};
use puck::core::resource::{Resource, TableRef};
use puck::core::service::ResourceService;
use puck::resources::game::{ARENA_GAMES, TEAM_GAMES, WITHIN_PARENT};
use puck::resources::statistic::GAME_STATS;
use puck::resources::{Arena, Game, Player, Statistic, Team};
use puck::storage::InMemoryStore;
use serde_json::{Value, json};
use std::collections::HashMap;
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};

// =============================================================================
// Fixtures
// =============================================================================

fn team(name: &str, abbreviation: &str, founded: i64) -> Value {
    json!({
        "team_name": name,
        "abbreviation": abbreviation,
        "founding_year": founded,
        "championships": 1,
        "general_manager": "J. Campbell"
    })
}

fn arena(name: &str, capacity: i64) -> Value {
    json!({
        "arena_name": name,
        "city": "Toronto",
        "province": "Ontario",
        "capacity": capacity,
        "year_built": 1999
    })
}

fn params(pairs: &[(&str, &str)]) -> HashMap<String, String> {
    pairs
        .iter()
        .map(|(k, v)| (k.to_string(), v.to_string()))
        .collect()
}

fn teams(store: &Arc<InMemoryStore>) -> ResourceService<Team, InMemoryStore> {
    ResourceService::new(store.clone())
}

async fn seed_teams(service: &ResourceService<Team, InMemoryStore>, count: usize) {
    let records = (0..count)
        .map(|i| {
            let letter = char::from(b'A' + i as u8);
            team(
                &format!("Team {:02}", i),
                &format!("T{}{}", letter, letter),
                1900 + (i as i64 * 7) % 50,
            )
        })
        .collect();
    let result = service.create(records).await.unwrap();
    assert!(result.is_success(), "{}", result.message());
}

fn rows<T: Clone>(page: &Paginated<T>) -> Vec<T> {
    page.data.clone()
}

fn game(home: i64, away: i64, arena_id: i64) -> Value {
    json!({
        "game_date": "2024-02-01",
        "home_team_id": home,
        "away_team_id": away,
        "home_score": 2,
        "away_score": 1,
        "arena_id": arena_id,
        "game_type": "regular",
        "side_start": "left"
    })
}

fn game_ids<P>(nested: &Nested<P, Game>) -> Vec<Option<i64>> {
    nested.data.iter().map(|g| g.game_id).collect()
}

/// Delegates to an in-memory store and counts batch applications
struct CountingStore {
    inner: InMemoryStore,
    applies: AtomicUsize,
}

impl CountingStore {
    fn new() -> Self {
        Self {
            inner: InMemoryStore::new(),
            applies: AtomicUsize::new(0),
        }
    }
}

#[async_trait]
impl Lookup for CountingStore {
    async fn exists_by_id(&self, table: TableRef, id: i64) -> Result<bool, StoreError> {
        self.inner.exists_by_id(table, id).await
    }

    async fn exists_unique(
        &self,
        table: TableRef,
        column: &'static str,
        value: &FieldValue,
        except: Option<i64>,
    ) -> Result<bool, StoreError> {
        self.inner.exists_unique(table, column, value, except).await
    }
}

#[async_trait]
impl Repository<Team> for CountingStore {
    async fn find(&self, query: &ListQuery) -> Result<(Vec<Team>, u64), StoreError> {
        Repository::<Team>::find(&self.inner, query).await
    }

    async fn find_by_id(&self, id: i64) -> Result<Option<Team>, StoreError> {
        Repository::<Team>::find_by_id(&self.inner, id).await
    }

    async fn apply(&self, writes: Vec<Write<Team>>) -> Result<Vec<Applied<Team>>, StoreError> {
        self.applies.fetch_add(1, Ordering::SeqCst);
        Repository::<Team>::apply(&self.inner, writes).await
    }
}

// =============================================================================
// Read path
// =============================================================================

#[tokio::test]
async fn test_page_windows_never_exceed_page_size() {
    let store = Arc::new(InMemoryStore::new());
    let service = teams(&store);
    seed_teams(&service, 7).await;

    for page in 1..=4u64 {
        for size in 1..=5u64 {
            let (page_raw, size_raw) = (page.to_string(), size.to_string());
            let spec = PageSpec::from_params(Some(page_raw.as_str()), Some(size_raw.as_str()))
                .unwrap()
                .unwrap();
            assert_eq!(spec.offset(), (page - 1) * size);

            let result = service
                .list(&params(&[
                    ("page", page_raw.as_str()),
                    ("page_size", size_raw.as_str()),
                ]))
                .await
                .unwrap();
            let listing = result.data().unwrap();
            assert!(listing.data.len() as u64 <= size);
            assert_eq!(listing.meta.total_records, 7);
            assert_eq!(listing.meta.total_pages, 7u64.div_ceil(size));
            let expected = 7u64.saturating_sub(spec.offset()).min(size);
            assert_eq!(listing.data.len() as u64, expected);
        }
    }
}

#[tokio::test]
async fn test_page_past_the_end_is_empty_success() {
    let store = Arc::new(InMemoryStore::new());
    let service = teams(&store);
    seed_teams(&service, 3).await;

    let result = service
        .list(&params(&[("page", "9"), ("page_size", "2")]))
        .await
        .unwrap();
    assert!(result.is_success());
    let listing = result.data().unwrap();
    assert!(listing.data.is_empty());
    assert_eq!(listing.meta.page, 9);
    assert_eq!(listing.meta.total_pages, 2);
}

#[tokio::test]
async fn test_half_specified_page_is_invalid_input() {
    let store = Arc::new(InMemoryStore::new());
    let service = teams(&store);
    seed_teams(&service, 2).await;

    for request in [
        params(&[("page", "1"), ("team_name", "Team")]),
        params(&[("page_size", "5"), ("sort_by", "team_name")]),
        params(&[("page", "2"), ("founding_year", "1900"), ("order_by", "desc")]),
    ] {
        let result = service.list(&request).await.unwrap();
        assert!(!result.is_success());
        assert_eq!(result.failure_kind(), Some(FailureKind::InvalidInput));
        assert!(result.message().contains("must be present in the URI"));
    }
}

#[tokio::test]
async fn test_unlisted_sort_field_is_rejected() {
    let store = Arc::new(InMemoryStore::new());
    let service = teams(&store);

    let result = service
        .list(&params(&[("sort_by", "password")]))
        .await
        .unwrap();
    assert_eq!(result.failure_kind(), Some(FailureKind::InvalidInput));
    assert!(result.message().contains("sort_by"));
}

#[tokio::test]
async fn test_descending_sort_is_non_increasing() {
    let store = Arc::new(InMemoryStore::new());
    let service = teams(&store);
    seed_teams(&service, 9).await;

    let result = service
        .list(&params(&[("sort_by", "founding_year"), ("order_by", "DESC")]))
        .await
        .unwrap();
    let years: Vec<i64> = rows(result.data().unwrap())
        .iter()
        .map(|t| t.founding_year)
        .collect();
    assert_eq!(years.len(), 9);
    assert!(years.windows(2).all(|w| w[0] >= w[1]), "{:?}", years);
}

#[tokio::test]
async fn test_prefix_filter_matches_only_leading_text() {
    let store = Arc::new(InMemoryStore::new());
    let arenas: ResourceService<Arena, InMemoryStore> = ResourceService::new(store.clone());
    let created = arenas
        .create(vec![
            arena("Scotiabank Arena", 19800),
            arena("The Scotiabank Place", 18500),
        ])
        .await
        .unwrap();
    assert!(created.is_success(), "{}", created.message());

    let result = arenas
        .list(&params(&[("arena_name", "Sc")]))
        .await
        .unwrap();
    let names: Vec<String> = rows(result.data().unwrap())
        .into_iter()
        .map(|a| a.arena_name)
        .collect();
    assert_eq!(names, vec!["Scotiabank Arena".to_string()]);
}

#[tokio::test]
async fn test_unknown_filter_names_the_parameter() {
    let store = Arc::new(InMemoryStore::new());
    let service = teams(&store);

    let result = service
        .list(&params(&[("owner", "someone")]))
        .await
        .unwrap();
    assert_eq!(result.failure_kind(), Some(FailureKind::InvalidInput));
    assert!(result.message().contains("'owner'"));
}

#[tokio::test]
async fn test_games_scoped_to_a_team() {
    let store = Arc::new(InMemoryStore::new());
    let service = teams(&store);
    seed_teams(&service, 3).await;
    let arenas: ResourceService<Arena, InMemoryStore> = ResourceService::new(store.clone());
    assert!(arenas.create(vec![arena("Rink", 5000)]).await.unwrap().is_success());

    let games: ResourceService<Game, InMemoryStore> = ResourceService::new(store.clone());
    let created = games
        .create(vec![game(1, 2, 1), game(2, 3, 1), game(3, 1, 1)])
        .await
        .unwrap();
    assert!(created.is_success(), "{}", created.message());

    let result = games
        .list_within::<Team>(&params(&[]), &WITHIN_PARENT, 2, TEAM_GAMES)
        .await
        .unwrap();
    let nested = result.data().unwrap();
    assert_eq!(game_ids(nested), vec![Some(1), Some(2)]);
    assert_eq!(nested.parent.team_name, "Team 01");
    assert_eq!(nested.meta.total_records, 2);

    let missing = games
        .list_within::<Team>(&params(&[]), &WITHIN_PARENT, 42, TEAM_GAMES)
        .await
        .unwrap();
    assert_eq!(missing.failure_kind(), Some(FailureKind::NotFound));
    assert!(missing.message().contains("42"));
}

#[tokio::test]
async fn test_nested_games_filter_by_arena_name() {
    let store = Arc::new(InMemoryStore::new());
    let service = teams(&store);
    seed_teams(&service, 2).await;
    let arenas: ResourceService<Arena, InMemoryStore> = ResourceService::new(store.clone());
    let created = arenas
        .create(vec![arena("Maple Garden", 5000), arena("Harbour Rink", 3000)])
        .await
        .unwrap();
    assert!(created.is_success(), "{}", created.message());

    let games: ResourceService<Game, InMemoryStore> = ResourceService::new(store.clone());
    let created = games
        .create(vec![game(1, 2, 1), game(2, 1, 2), game(1, 2, 2)])
        .await
        .unwrap();
    assert!(created.is_success(), "{}", created.message());

    let result = games
        .list_within::<Team>(
            &params(&[("arena_name", "harb")]),
            &WITHIN_PARENT,
            1,
            TEAM_GAMES,
        )
        .await
        .unwrap();
    assert_eq!(game_ids(result.data().unwrap()), vec![Some(2), Some(3)]);

    // Arena listings accept the same whitelist
    let result = games
        .list_within::<Arena>(
            &params(&[("arena_name", "Maple")]),
            &WITHIN_PARENT,
            2,
            ARENA_GAMES,
        )
        .await
        .unwrap();
    let nested = result.data().unwrap();
    assert!(nested.data.is_empty());
    assert_eq!(nested.parent.arena_name, "Harbour Rink");

    // The plain games whitelist has no arena_name
    let result = games.list(&params(&[("arena_name", "Maple")])).await.unwrap();
    assert_eq!(result.failure_kind(), Some(FailureKind::InvalidInput));
}

#[tokio::test]
async fn test_statistics_of_a_game() {
    let store = Arc::new(InMemoryStore::new());
    let service = teams(&store);
    seed_teams(&service, 2).await;
    let arenas: ResourceService<Arena, InMemoryStore> = ResourceService::new(store.clone());
    assert!(arenas.create(vec![arena("Rink", 5000)]).await.unwrap().is_success());
    let games: ResourceService<Game, InMemoryStore> = ResourceService::new(store.clone());
    assert!(
        games
            .create(vec![game(1, 2, 1), game(2, 1, 1)])
            .await
            .unwrap()
            .is_success()
    );

    let players: ResourceService<Player, InMemoryStore> = ResourceService::new(store.clone());
    let created = players
        .create(vec![
            json!({"first_name": "Connor", "last_name": "Reid", "team_id": 1}),
            json!({"first_name": "Mitch", "last_name": "Lowe", "team_id": 2}),
            json!({"first_name": "Cole", "last_name": "Hart", "team_id": 2}),
        ])
        .await
        .unwrap();
    assert!(created.is_success(), "{}", created.message());

    let line = |game_id: i64, player_id: i64, goals: i64, assists: i64, shots: i64| {
        json!({
            "game_id": game_id,
            "player_id": player_id,
            "goals_scored": goals,
            "assists": assists,
            "shot_on_target": shots
        })
    };
    let statistics: ResourceService<Statistic, InMemoryStore> =
        ResourceService::new(store.clone());
    let created = statistics
        .create(vec![
            line(1, 1, 2, 0, 5),
            line(1, 2, 0, 2, 1),
            line(1, 3, 1, 1, 4),
            line(2, 1, 3, 1, 6),
        ])
        .await
        .unwrap();
    assert!(created.is_success(), "{}", created.message());

    let within_game = |pairs: &[(&str, &str)]| {
        let params = params(pairs);
        let statistics = statistics.clone();
        async move {
            statistics
                .list_within::<Game>(&params, Statistic::query_config(), 1, GAME_STATS)
                .await
                .unwrap()
        }
    };

    let all = within_game(&[]).await;
    let nested = all.data().unwrap();
    assert_eq!(nested.meta.total_records, 3);
    assert_eq!(nested.parent.game_id, Some(1));

    let stat_ids = |result: &puck::core::outcome::OperationResult<Nested<Game, Statistic>>| {
        result
            .data()
            .unwrap()
            .data
            .iter()
            .map(|s| s.stat_id)
            .collect::<Vec<_>>()
    };
    assert_eq!(stat_ids(&within_game(&[("first_name", "co")]).await), vec![Some(1), Some(3)]);
    assert_eq!(stat_ids(&within_game(&[("goals_scored", "1")]).await), vec![Some(1), Some(3)]);
    assert_eq!(stat_ids(&within_game(&[("assist", "2")]).await), vec![Some(2)]);
    assert_eq!(stat_ids(&within_game(&[("sog", "4")]).await), vec![Some(1), Some(3)]);

    let paged = within_game(&[("page", "2"), ("page_size", "2")]).await;
    assert_eq!(stat_ids(&paged), vec![Some(3)]);

    let missing = statistics
        .list_within::<Game>(&params(&[]), Statistic::query_config(), 9, GAME_STATS)
        .await
        .unwrap();
    assert_eq!(missing.failure_kind(), Some(FailureKind::NotFound));

    // A game with statistics cannot be deleted
    let result = games.delete(vec![json!({"game_id": 1})]).await.unwrap();
    assert_eq!(result.failure_kind(), Some(FailureKind::ConstraintViolation));
}

// =============================================================================
// Write path
// =============================================================================

#[tokio::test]
async fn test_one_invalid_record_blocks_the_whole_batch() {
    let store = Arc::new(CountingStore::new());
    let service: ResourceService<Team, CountingStore> = ResourceService::new(store.clone());

    let mut broken = team("Broken", "BRK", 1950);
    broken.as_object_mut().unwrap().remove("team_name");

    let result = service
        .create(vec![team("First", "FST", 1920), broken, team("Third", "THD", 1930)])
        .await
        .unwrap();

    assert!(!result.is_success());
    assert_eq!(result.failure_kind(), Some(FailureKind::ValidationFailure));
    let outcome = result.errors().unwrap();
    assert!(!outcome.is_valid());
    assert!(outcome.get(0).unwrap().errors.is_empty());
    assert!(!outcome.get(1).unwrap().errors.is_empty());
    assert!(outcome.get(2).unwrap().errors.is_empty());
    assert_eq!(outcome.get(1).unwrap().errors[0].field, "team_name");
    assert_eq!(outcome.get(1).unwrap().errors[0].rule, "required");

    assert_eq!(store.applies.load(Ordering::SeqCst), 0);
    let (stored, total) =
        Repository::<Team>::find(&store.inner, &ListQuery::all(Team::query_config()))
            .await
            .unwrap();
    assert!(stored.is_empty());
    assert_eq!(total, 0);
}

#[tokio::test]
async fn test_existing_id_fails_uniqueness_for_the_batch() {
    let store = Arc::new(CountingStore::new());
    let service: ResourceService<Team, CountingStore> = ResourceService::new(store.clone());
    assert!(service
        .create(vec![team("Original", "ORG", 1917)])
        .await
        .unwrap()
        .is_success());
    let applies_before = store.applies.load(Ordering::SeqCst);

    let mut clash = team("Newcomer", "NEW", 2001);
    clash["team_id"] = json!(1);
    let result = service
        .create(vec![team("Fresh", "FRS", 1990), clash])
        .await
        .unwrap();

    assert_eq!(result.failure_kind(), Some(FailureKind::ValidationFailure));
    let outcome = result.errors().unwrap();
    assert!(outcome.get(0).unwrap().is_valid());
    let errors = &outcome.get(1).unwrap().errors;
    assert!(errors.iter().any(|e| e.field == "team_id" && e.rule == "unique"));
    assert_eq!(store.applies.load(Ordering::SeqCst), applies_before);

    let fresh = service
        .list(&params(&[("team_name", "Fresh")]))
        .await
        .unwrap();
    assert!(fresh.data().unwrap().data.is_empty());
}

#[tokio::test]
async fn test_in_batch_duplicates_hit_the_store_constraint() {
    let store = Arc::new(InMemoryStore::new());
    let service = teams(&store);

    let result = service
        .create(vec![team("Twins", "TWA", 1950), team("twins", "TWB", 1951)])
        .await
        .unwrap();

    assert_eq!(result.failure_kind(), Some(FailureKind::ConstraintViolation));
    let outcome = result.errors().unwrap();
    assert!(outcome.get(0).unwrap().is_valid());
    assert!(!outcome.get(1).unwrap().is_valid());

    let listing = service.list(&params(&[])).await.unwrap();
    assert_eq!(listing.data().unwrap().meta.total_records, 0);
}

#[tokio::test]
async fn test_deleting_a_missing_id_is_not_found() {
    let store = Arc::new(InMemoryStore::new());
    let service = teams(&store);
    seed_teams(&service, 1).await;

    let result = service
        .delete(vec![json!({"team_id": 1}), json!({"team_id": 404})])
        .await
        .unwrap();

    assert!(!result.is_success());
    assert_eq!(result.failure_kind(), Some(FailureKind::NotFound));
    assert!(result.message().contains("404"));
    assert!(result.errors().unwrap().get(1).is_some_and(|r| !r.is_valid()));

    // The valid delete in the same batch was rolled back
    assert!(service.get(1).await.unwrap().is_success());
}

#[tokio::test]
async fn test_referenced_rows_cannot_be_deleted() {
    let store = Arc::new(InMemoryStore::new());
    let service = teams(&store);
    seed_teams(&service, 1).await;
    let arenas: ResourceService<Arena, InMemoryStore> = ResourceService::new(store.clone());
    let mut home = arena("Home Rink", 9000);
    home["team_id"] = json!(1);
    assert!(arenas.create(vec![home]).await.unwrap().is_success());

    let result = service.delete(vec![json!({"team_id": 1})]).await.unwrap();
    assert_eq!(result.failure_kind(), Some(FailureKind::ConstraintViolation));
    assert!(service.get(1).await.unwrap().is_success());
}

#[tokio::test]
async fn test_insert_then_fetch_round_trip() {
    let store = Arc::new(InMemoryStore::new());
    let service = teams(&store);

    let input = team("Halifax Harbour Hawks", "HHH", 1994);
    let created = service.create(vec![input.clone()]).await.unwrap();
    assert!(created.is_success());
    let id = created.data().unwrap()[0].team_id.unwrap();

    let fetched = service.get(id).await.unwrap().into_data().unwrap();
    let stored = serde_json::to_value(&fetched).unwrap();
    for (key, value) in input.as_object().unwrap() {
        assert_eq!(&stored[key], value, "field {}", key);
    }
}

#[tokio::test]
async fn test_update_reports_before_and_after() {
    let store = Arc::new(InMemoryStore::new());
    let service = teams(&store);
    seed_teams(&service, 1).await;

    let mut changed = team("Renamed", "RNM", 1900);
    changed["team_id"] = json!(1);
    let result = service.update(vec![changed]).await.unwrap();
    assert!(result.is_success(), "{}", result.message());

    let changes = result.into_data().unwrap();
    assert_eq!(changes[0].before.team_name, "Team 00");
    assert_eq!(changes[0].after.team_name, "Renamed");
}

#[tokio::test]
async fn test_update_of_unknown_id_is_not_found() {
    let store = Arc::new(InMemoryStore::new());
    let service = teams(&store);

    let mut ghost = team("Ghost", "GHO", 1900);
    ghost["team_id"] = json!(77);
    let updated = service.update(vec![ghost]).await.unwrap();
    let deleted = service.delete(vec![json!({"team_id": 77})]).await.unwrap();

    for result in [updated.failure_kind(), deleted.failure_kind()] {
        assert_eq!(result, Some(FailureKind::NotFound));
    }
    assert!(updated.message().contains("77"));
    assert!(updated.errors().unwrap().get(0).is_some_and(|r| !r.is_valid()));
}

#[tokio::test]
async fn test_update_batch_with_unknown_id_rolls_back() {
    let store = Arc::new(InMemoryStore::new());
    let service = teams(&store);
    seed_teams(&service, 1).await;

    let mut renamed = team("Renamed", "RNM", 1900);
    renamed["team_id"] = json!(1);
    let mut ghost = team("Ghost", "GHO", 1900);
    ghost["team_id"] = json!(77);
    let result = service.update(vec![renamed, ghost]).await.unwrap();
    assert_eq!(result.failure_kind(), Some(FailureKind::NotFound));
    assert!(result.errors().unwrap().get(1).is_some_and(|r| !r.is_valid()));

    let stored = service.get(1).await.unwrap().into_data().unwrap();
    assert_eq!(stored.team_name, "Team 00");
}

#[tokio::test]
async fn test_empty_batch_is_invalid_input() {
    let store = Arc::new(InMemoryStore::new());
    let service = teams(&store);

    let result = service.create(Vec::new()).await.unwrap();
    assert_eq!(result.failure_kind(), Some(FailureKind::InvalidInput));
}
