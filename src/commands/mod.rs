pub mod generate;
pub use self::generate::{generate, GenerateOptions};
