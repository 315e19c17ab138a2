// PZ Panel - Project Zomboid server administration backend

pub mod config;
pub mod console;
pub mod http;
pub mod instances;
pub mod logs;
pub mod operations;
pub mod rcon;
