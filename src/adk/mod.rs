// SPDX-License-Identifier: MIT

//! Agent development kit: the collaborator seams the workflow engine consumes
//!
//! - [`model`] - chat model trait, message types and the OpenAI-compatible client
//! - [`tool`] - tool trait invoked by agents
//! - [`error`] - typed errors shared across the crate

pub mod error;
pub mod model;
pub mod tool;
