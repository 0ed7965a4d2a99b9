pub mod process_loop;
pub mod shutdown;

pub use process_loop::{LoopOutcome, Worker, WorkerOptions};
pub use shutdown::{install_signal_handlers, ControlSignal, ShutdownHandle};
