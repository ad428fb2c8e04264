pub mod chunk_writer;
pub mod xml;

pub use chunk_writer::ChunkWriter;
