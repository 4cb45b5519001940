pub mod cli;
pub mod config;
pub mod models;
pub mod services;
pub mod store;
pub mod telemetry;

pub use config::Config;
pub use models::energy::{BatteryState, EnergySnapshot, WeatherSample, WeatherSource};
pub use services::simulation_cycle::{CycleError, SimulationCycle, SoftFailure, TickReport};
pub use store::{SnapshotStore, StoreError};
