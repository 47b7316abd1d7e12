//! Destination resolution for the development proxy
//!
//! This module resolves the proxy's logical destinations into concrete
//! network addresses, negotiates schemes for discovered endpoints, and
//! carries the change notifications that tell callers to re-resolve.

pub mod cancel;
pub mod change;
pub mod destination;
pub mod resolver;
pub mod scheme;

pub use cancel::{CancellationSignal, CancellationSource, cancellation};
pub use change::{
    CallbackRegistration, ChangeToken, ChangeTrigger, CompositeChangeToken, CompositeRegistration,
    change_token,
};
pub use destination::{DestinationMap, DestinationOverride, DestinationSpec, ResolvedDestinations};
pub use resolver::DestinationResolver;
pub use scheme::SchemePolicy;
