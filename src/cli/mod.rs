//! Command-line front end.

pub mod args;
