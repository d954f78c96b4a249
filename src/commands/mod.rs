// src/commands/mod.rs
//! Command handlers for the comfyenv CLI

mod detect;
mod show;
mod sync;

pub use detect::cmd_detect;
pub use show::cmd_show;
pub use sync::{cmd_recreate, cmd_sync};
