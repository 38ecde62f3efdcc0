mod state;

pub use state::{Generation, ReviewSession, Snapshot, ThreadRow};
