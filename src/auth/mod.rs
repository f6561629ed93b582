//! Accounts and transaction authentication.

pub mod account;
pub mod ante;
pub mod mapper;

pub use account::{Account, AppAccount, BaseAccount};
pub use ante::{ante_handler, AnteOutcome};
pub use mapper::{get_account, set_account};
