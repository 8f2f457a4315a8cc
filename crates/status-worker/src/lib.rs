mod processor_worker;

pub use processor_worker::{CycleOutcome, ProcessorWorker, ProcessorWorkerConfig};
