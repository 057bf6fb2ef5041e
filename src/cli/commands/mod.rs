//! One module per subcommand.

pub mod create;
pub mod delete;
pub mod list;
pub mod meta;
pub mod rekey;
pub mod reveal;
