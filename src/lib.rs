pub mod config;
pub mod contract;
pub mod orchestration;
pub mod prompts;
pub mod sandbox;
pub mod session;
pub mod shared;
