pub mod post_stream;

pub use post_stream::PostStream;
