//! CLI 命令处理

pub mod check;
pub mod output;
pub mod run;

pub use check::*;
pub use output::*;
pub use run::*;
