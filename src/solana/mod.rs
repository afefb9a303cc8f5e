// 链上I/O域 / Chain I/O domain
pub mod client;
pub mod confirm;
pub mod feed;
pub mod pipeline;

pub use client::SolanaClient;
pub use pipeline::IngestionPipeline;
