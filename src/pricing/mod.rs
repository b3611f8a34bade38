pub mod parser;

pub use parser::PlanTableParser;
