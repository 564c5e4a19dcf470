//! Data models for Talkstick

mod ledger_entry;
mod participant;
mod stats;
mod token;
mod topic;

pub use ledger_entry::*;
pub use participant::*;
pub use stats::*;
pub use token::*;
pub use topic::*;
