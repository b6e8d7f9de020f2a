use core::fmt::Debug;

/// Architecture-specific interrupt masking interface.
///
/// `disable` captures the current mask state and then masks interrupts;
/// `restore` puts back exactly the captured state. Pairs must nest strictly.
/// Interleaving two pairs makes the inner restore win over the outer one.
pub trait IrqControl {
    /// Saved interrupt state
    type State: Copy + Debug;

    /// Disable interrupts and return the previous state.
    fn disable() -> Self::State;

    /// Restore interrupts to a previous state.
    fn restore(state: Self::State);

    /// Whether interrupts are currently masked by this controller.
    fn is_masked() -> bool;
}
