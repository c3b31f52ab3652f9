pub mod chart;
pub mod config;
pub mod error;
pub mod event;
pub mod model;
pub mod sim;
pub mod surface;
pub mod ui;
