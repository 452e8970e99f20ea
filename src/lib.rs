// src/lib.rs
pub mod ports {
    pub mod host;
    pub mod replay_host;
}
pub mod config;
pub mod error;
pub mod pairtrade;
pub mod sizing;
pub mod spread;
pub mod state_machine;
pub mod stationarity;
pub mod stats;
pub mod synthetic;
pub mod zscore;
