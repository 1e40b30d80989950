pub mod export;
pub mod postgres;
