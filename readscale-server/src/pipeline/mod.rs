pub mod read;
pub mod write;

pub use read::ReadPipeline;
pub use write::WritePipeline;
