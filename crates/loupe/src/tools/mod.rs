//! A set of built-in tools that models can use.

mod current_time;
mod random_date;
mod read_file;

pub use current_time::CurrentTimeTool;
pub use random_date::RandomDateTool;
pub use read_file::ReadFileTool;
