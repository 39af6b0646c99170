pub mod layout;
pub mod reader;
pub mod sweep;
pub mod writer;
