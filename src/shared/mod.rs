pub mod clock;
pub mod errors;
pub mod field_update;
pub mod shutdown;

pub use clock::{Clock, FixedClock, SharedClock, SystemClock};
pub use errors::{DomainError, ErrorKind, InfraError};
pub use field_update::FieldUpdate;
pub use shutdown::{ShutdownCoordinator, ShutdownSignal};
