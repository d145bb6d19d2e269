pub mod action;
pub mod base;
pub mod camera;
pub mod config;
pub mod registry;
pub mod reward;
pub mod rover;
pub mod sensors;
pub mod simulator;
pub mod wrappers;
