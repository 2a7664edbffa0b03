pub mod etl;
pub mod load;
pub mod pipeline;
pub mod transform;

pub use crate::domain::model::{CollectionRef, Document, RawRecord, RefreshResult, RefreshStatus};
pub use crate::domain::ports::{DocumentStore, Extractor, Pipeline, StoreConnector, Transformer};
pub use crate::utils::error::Result;
