//! Types shared between the admin client core, local storage and the CLI.

pub mod domain;
pub mod error;
pub mod protocol;
