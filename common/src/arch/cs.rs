use crate::sync::irq::IrqControl;

cfg_if::cfg_if! {
    if #[cfg(any(test, feature = "std"))] {
        use core::cell::Cell;

        std::thread_local! {
            /// Critical sections this thread has entered through [`CsIrq`].
            static DEPTH: Cell<usize> = const { Cell::new(0) };
        }

        fn enter() {
            DEPTH.with(|depth| depth.set(depth.get() + 1));
        }

        fn leave() {
            DEPTH.with(|depth| depth.set(depth.get().saturating_sub(1)));
        }

        fn depth() -> usize {
            DEPTH.with(Cell::get)
        }
    } else {
        use core::sync::atomic::{AtomicUsize, Ordering};

        /// Critical sections entered through [`CsIrq`]. Without threads the
        /// count is shared by every context, which is exact on one core.
        static DEPTH: AtomicUsize = AtomicUsize::new(0);

        fn enter() {
            DEPTH.fetch_add(1, Ordering::Relaxed);
        }

        fn leave() {
            DEPTH.fetch_sub(1, Ordering::Relaxed);
        }

        fn depth() -> usize {
            DEPTH.load(Ordering::Relaxed)
        }
    }
}

/// Interrupt control backed by the `critical-section` crate.
///
/// Whatever implementation the final binary links (a single-core PRIMASK
/// impl such as `cortex-m`'s, an RTOS scheduler lock, or the `std` global
/// mutex on the host) supplies both the masking and the restore token.
pub struct CsIrq;

impl IrqControl for CsIrq {
    type State = critical_section::RestoreState;

    #[inline]
    fn disable() -> Self::State {
        // SAFETY: every acquire is paired with exactly one `restore` by the
        // guards in `crate::sync`.
        let state = unsafe { critical_section::acquire() };
        enter();
        state
    }

    #[inline]
    fn restore(state: Self::State) {
        leave();
        // SAFETY: `state` was produced by the matching `disable` call.
        unsafe { critical_section::release(state) }
    }

    /// Whether the calling context is inside a critical section.
    fn is_masked() -> bool {
        depth() > 0
    }
}
