//! Store Module - task output storage
//!
//! - `outputs`: OutputStore, the `id → value` map owned by the scheduler

mod outputs;

pub use outputs::OutputStore;
