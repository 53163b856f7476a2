// ABOUTME: Library crate for devharbor exposing config resolution, container
// lifecycle and terminal session management for the CLI and tests

#![allow(missing_docs)]

pub mod cli;
pub mod config;
pub mod docker;
pub mod orchestrator;
pub mod paths;
pub mod terminal;
