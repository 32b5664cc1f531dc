mod coordinator;
mod driver;
mod scheduler;

pub use coordinator::{ScrollAction, ScrollBehavior, ScrollCoordinator, ScrollTarget};
pub use driver::{ScrollDriver, ScrollEvent};
pub use scheduler::{DebounceScheduler, TaskHandle};
