// simulation_engine/mod.rs
pub mod network;
pub mod simulation;
pub mod vehicles;
