pub mod ast;
pub mod context;
mod executor;
pub mod parser;
mod process;
pub mod resolve;

pub use ast::ParseOutcome;
pub use context::{Environment, ExecutionContext};
pub use parser::parse;

#[cfg(test)]
mod tests;
