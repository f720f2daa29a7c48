pub mod acapi;
pub mod acbot;
pub mod acdb;
pub mod error;
pub mod models;
pub mod notify;
pub mod scheduler;
pub mod sync;
