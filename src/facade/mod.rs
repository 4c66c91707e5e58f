pub mod database;

pub use database::{Outcome, clear_database, clear_with, conclude};
