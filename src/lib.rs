//! Layered module configuration.
//!
//! Options are declared once in a [`schema::Schema`], resolved from the command line and then
//! an INI file (earlier sources win, declared defaults fill the gaps) into an immutable
//! [`resolver::FlagStore`], and bound into strongly-typed per-module configuration structs.

pub mod config;
pub mod error;
pub mod layer;
pub mod layering;
pub mod module1;
pub mod resolver;
pub mod schema;
