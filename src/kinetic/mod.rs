// SPDX-License-Identifier: MIT

//! Workflow engine, the agents built on it, and their front ends

pub mod agents;
pub mod cli;
pub mod config;
pub mod mcp;
pub mod server;
pub mod tools;
pub mod workflow;
