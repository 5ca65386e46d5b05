pub mod archive;
pub mod config;
pub mod dataset;
pub mod dr;
pub mod epoch;
pub mod extract;
pub mod io;
pub mod plot;
pub mod psd;
pub mod signal;

pub use archive::PsdArchive;
pub use config::{AnalysisConfig, PsdMethod};
pub use signal::{Markers, Recording};
