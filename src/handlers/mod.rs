pub mod env;
pub mod input;
pub mod run;
pub mod session;
