pub mod create_deposit;

pub use create_deposit::{CreateDeposit, DepositInput};
