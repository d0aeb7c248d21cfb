//! Storage services. Each borrows a connection handle, which may be the pool
//! or an open transaction, so callers decide the unit of work.

pub mod entry;
pub mod giveaway;
pub mod lock;
pub mod pre_winner;
pub mod prize;
pub mod user;
pub mod win;

pub use entry::Entry;
pub use giveaway::{Giveaway, NewGiveaway};
pub use lock::{Acquire, Lock};
pub use pre_winner::{Candidate, PreWinner};
pub use prize::Prize;
pub use user::User;
pub use win::Win;
