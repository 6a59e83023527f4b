pub mod commands;
pub mod launch;
pub mod monitor;
pub mod state;
