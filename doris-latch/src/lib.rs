mod handle;

pub use handle::{HandleState, LockableHandle};
