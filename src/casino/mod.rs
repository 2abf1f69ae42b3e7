pub mod client;

pub use client::{CasinoClient, CasinoError};
