pub mod commands;
pub mod gofmt;
pub mod header;
pub mod output;
pub mod pricing;
pub mod render;
pub mod wait;
