//! Ports - contracts the engine requires from infrastructure

pub mod cache;
pub mod store;
pub mod wallet;

pub use cache::CacheStore;
pub use store::{
    BracketFilter, BracketRepository, MatchFilter, MatchOrder, MatchRepository, Page, PrizeFilter,
    PrizeRepository, RegistrationFilter, RegistrationOrder, RegistrationRepository, SortDir,
    StandingFilter, StandingOrder, StandingRepository, Store, TournamentFilter, TournamentOrder,
    TournamentRepository, TxWork,
};
pub use wallet::{TransferOutcome, TransferRequest, WalletHandle, WalletService};
