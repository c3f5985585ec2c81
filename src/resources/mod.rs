//! The hockey resources: teams, arenas, the games played between them,
//! and the players' statistics in each game

pub mod arena;
pub mod game;
pub mod player;
pub mod statistic;
pub mod team;

pub use arena::Arena;
pub use game::Game;
pub use player::Player;
pub use statistic::Statistic;
pub use team::Team;
