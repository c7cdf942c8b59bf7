pub mod reader;
pub mod writer;

pub use reader::ContainerReader;
pub use writer::{write_unit, WriteError};
