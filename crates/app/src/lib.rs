pub mod capture;
pub mod config;
pub mod indicator;
pub mod runtime;
pub mod store;
pub mod timesync;
pub mod uplink;
