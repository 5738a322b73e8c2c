//! Standard middleware.

mod logging;
mod transaction;
mod validation;

pub use logging::{DispatchTimer, LoggingMiddleware};
pub use transaction::{TransactionError, TransactionManager, TransactionMiddleware};
pub use validation::{Validate, ValidationError, ValidationMiddleware};
