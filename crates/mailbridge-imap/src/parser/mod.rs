//! Response parser.
//!
//! Sans-I/O: [`ResponseParser::parse`] takes one complete response
//! (literals included) and never touches the network.

mod lexer;
mod response;

pub use lexer::{Lexer, Token};
pub use response::{Response, ResponseParser, Status, StatusResponse, UntaggedResponse};
