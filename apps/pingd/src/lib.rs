pub mod cli;
pub mod config;
pub mod daemon;
pub mod database;
pub mod lifecycle;
pub mod monitoring;
pub mod pool;
pub mod validation;
