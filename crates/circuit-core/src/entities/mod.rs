//! Domain entities

pub mod bracket;
pub mod matches;
pub mod prize;
pub mod registration;
pub mod standing;
pub mod tournament;

pub use bracket::{
    Bracket, BracketStatus, BracketType, BracketView, MatchNode, RoundView, SeedEntry, SlotView,
};
pub use matches::{
    AdminOverride, Dispute, GameStat, Match, MatchSlot, MatchStatus, MatchType, Side,
};
pub use prize::{Prize, PrizeStatus, PrizeType};
pub use registration::{Registration, RegistrationStatus, Team};
pub use standing::{Standing, StreakType};
pub use tournament::{
    RegistrationType, Tournament, TournamentFormat, TournamentStatus, Visibility,
};
