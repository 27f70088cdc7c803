//! The umbra tokenizer and parser.
//!
//! [tokenize] turns a NUL-terminated source buffer into a flat token stream,
//! classifying spacing and rewriting unbalanced groupings into error tokens.
//! [parse] climbs precedence levels over that stream to build the module's
//! expression tree. Neither stage ever aborts early; every problem becomes a
//! diagnostic and a recovery node, and the `ok` flag tells the driver whether
//! later stages may trust the result.

pub mod cursor;
pub mod numeric;
pub mod parser;
pub mod tokenizer;

pub use numeric::{parse_numeric, NumericOutcome};
pub use parser::parse;
pub use tokenizer::tokenize;
