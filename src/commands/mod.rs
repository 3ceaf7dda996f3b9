//! # CLI Command Implementations
//!
//! One module per subcommand. Each module contains an `Args` struct derived
//! with `clap` and an `execute` function that orchestrates the library to
//! perform the command's work.

pub mod completions;
pub mod gen;
pub mod numpy2;
pub mod report;
pub mod test;
