pub mod battery_model;
pub mod daily_energy;
pub mod load_profile;
pub mod simulation_cycle;
pub mod solar_algorithm;
pub mod weather_service;
