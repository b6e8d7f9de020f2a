use crate::sync::irq::IrqControl;

const CPSR_I_BIT: u32 = 1 << 7;

/// Interrupt-mask control for A/R-profile ARM cores through the CPSR I bit.
///
/// # State Management
///
/// The saved state is the I bit as it was before masking: `true` means IRQs
/// were enabled. `restore` only re-enables when the captured state says so,
/// which makes strictly nested enter/exit pairs safe: the inner exit sees
/// "already masked" and leaves the mask alone.
///
/// # Assembly Details
///
/// - `mrs {0}, cpsr`: read the current program status register
/// - `cpsid i`: mask IRQs
/// - `cpsie i`: unmask IRQs
pub struct ArmIrq;

impl IrqControl for ArmIrq {
    type State = bool;

    #[inline(always)]
    fn disable() -> bool {
        let cpsr: u32;
        unsafe {
            core::arch::asm!(
                "mrs {0}, cpsr",
                "cpsid i",
                out(reg) cpsr,
                options(nomem, nostack)
            );
        }
        cpsr & CPSR_I_BIT == 0
    }

    #[inline(always)]
    fn restore(was_enabled: bool) {
        if was_enabled {
            unsafe {
                core::arch::asm!("cpsie i", options(nomem, nostack));
            }
        }
    }

    #[inline(always)]
    fn is_masked() -> bool {
        let cpsr: u32;
        unsafe {
            core::arch::asm!("mrs {0}, cpsr", out(reg) cpsr, options(nomem, nostack));
        }
        cpsr & CPSR_I_BIT != 0
    }
}
