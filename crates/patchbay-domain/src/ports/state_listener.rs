//! Component state observation

use crate::value_objects::ComponentState;

/// Observer of committed component state transitions
///
/// Notified on the component's gate after each transition commits, so the
/// reported order is exact. Administrative callers use this as the
/// completion signal for `enable`/`disable` requests.
pub trait ComponentStateListener: Send + Sync {
    /// A component moved from `old` to `new`
    fn on_state_change(&self, component: &str, old: ComponentState, new: ComponentState);
}
