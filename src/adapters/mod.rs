// Adapters layer: concrete implementations for external systems (http, stores).

pub mod collection;
pub mod http;
pub mod storage;

pub use collection::CollectionExtractor;
pub use http::HttpExtractor;
