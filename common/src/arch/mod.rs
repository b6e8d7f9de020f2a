//! Interrupt-mask control per core.
//!
//! [`PlatformIrq`] is the implementation the rest of the layer uses by
//! default. Bare-metal A/R-profile ARM builds mask IRQs directly through the
//! CPSR. M-profile cores have no CPSR, so they go through the
//! `critical-section` crate like every other target; that is what the host
//! simulation (with the `std` feature), `cortex-m` and most RTOS ports
//! provide.

pub mod cs;

pub use cs::CsIrq;

cfg_if::cfg_if! {
    if #[cfg(all(target_arch = "arm", target_os = "none", not(target_feature = "mclass")))] {
        pub mod arm;
        pub use arm::ArmIrq;

        /// Interrupt control used by default on this target.
        pub type PlatformIrq = arm::ArmIrq;
    } else {
        /// Interrupt control used by default on this target.
        pub type PlatformIrq = cs::CsIrq;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sync::irq::IrqControl;

    #[test]
    fn inner_exit_leaves_the_outer_section_masked() {
        let outer = PlatformIrq::disable();
        let inner = PlatformIrq::disable();
        PlatformIrq::restore(inner);
        assert!(PlatformIrq::is_masked());

        PlatformIrq::restore(outer);
        assert!(!PlatformIrq::is_masked());
    }
}
