pub mod batch;
pub mod importer;
pub mod jobs;

pub use batch::BatchProcessor;
pub use importer::{ImportOutcome, NfeImporter};
pub use jobs::{JobRegistry, RegistryStats};
