pub mod reader;
pub mod scoring;
pub mod writer;
