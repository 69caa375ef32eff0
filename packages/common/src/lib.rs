pub mod bus;
pub mod config;
pub mod event;
pub mod retry;

pub use bus::{EventBus, Subscription};
pub use event::{ChangeKind, EntityChanged, Envelope, Event};
pub use retry::{OperationClass, RetryPolicy, Transient};
