pub mod bus;
pub mod client;
pub mod config;
pub mod console;
pub mod decoder;
pub mod display;
pub mod framebuffer;
pub mod memory;
pub mod simulation;
