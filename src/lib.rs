pub mod cli;
pub mod commands;
pub mod config;
pub mod envelope;
pub mod identity;
pub mod orchestrator;
pub mod platform;
pub mod repo;
pub mod settings;
pub mod ui;
