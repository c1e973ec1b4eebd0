// In src/lib.rs
pub mod constants;
pub mod dataset;
pub mod error;
pub mod manifest;
pub mod stream;
pub mod transport;
pub mod types;

pub use dataset::DataSet;
pub use error::{DatalogError, Result};
pub use stream::DataStream;
pub use transport::{HttpTransport, Transport};
pub use types::{Config, Measure};
