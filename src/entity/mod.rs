//! SeaORM entity definitions

pub mod giveaway;
pub mod giveaway_prize;
pub mod lock;
pub mod participant;
pub mod pre_winner;
pub mod prize;
pub mod requirement;
pub mod ticket;
pub mod transfer;
pub mod user;
pub mod win;

pub use giveaway::GiveawayStatus;
pub use giveaway_prize::PrizeKind;
pub use requirement::RequirementKind;
pub use win::WinStatus;
