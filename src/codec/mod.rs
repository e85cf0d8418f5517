mod generator;
mod parser;

pub use self::generator::Generator;
pub use self::parser::{Parser, ParserListener};
