pub mod balance;
pub mod events;
pub mod session_manager;
pub mod submitter;

pub use balance::{BalanceService, BalanceSource};
pub use events::EventPump;
pub use session_manager::SessionManager;
pub use submitter::{TransactionFailure, TransactionSubmitter};
