pub mod command;
pub mod error;
pub mod node;
pub mod poller;
pub mod probe;
pub mod registry;
pub mod service;
pub mod types;
