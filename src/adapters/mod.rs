pub mod postgres_store;

pub use postgres_store::PostgresTransactionStore;
