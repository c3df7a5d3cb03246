pub mod account_db;
pub mod lead_db;
