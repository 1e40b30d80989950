pub mod app_state;
pub mod catalog;
pub mod connection_manager;
pub mod filter;
pub mod history;
pub mod json_inspect;
pub mod profiles;
pub mod query_runner;
pub mod results;
pub mod saved_queries;
pub mod session;
pub mod sorting;
pub mod sql_generator;
