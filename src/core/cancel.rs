//! Cancellation token for in-flight fetches and imports.

use std::cell::{Cell, RefCell};
use std::fmt;
use std::rc::Rc;

type Hook = Box<dyn FnOnce()>;

/// Registration key returned by [`CancelToken::on_cancel`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct HookId(u64);

/// Shared, single-threaded cancellation flag.
///
/// Clones observe the same flag. Hooks registered with [`on_cancel`]
/// run once when the token is cancelled, which lets a host abort the
/// underlying request. A request that settles first takes its hook back
/// with [`release`].
///
/// [`on_cancel`]: CancelToken::on_cancel
/// [`release`]: CancelToken::release
#[derive(Clone, Default)]
pub struct CancelToken {
    inner: Rc<Inner>,
}

#[derive(Default)]
struct Inner {
    cancelled: Cell<bool>,
    next_hook: Cell<u64>,
    hooks: RefCell<Vec<(HookId, Hook)>>,
}

impl CancelToken {
    pub fn new() -> Self {
        Self::default()
    }

    #[inline]
    pub fn is_cancelled(&self) -> bool {
        self.inner.cancelled.get()
    }

    /// Cancel and run pending hooks. Later calls do nothing.
    pub fn cancel(&self) {
        if self.inner.cancelled.replace(true) {
            return;
        }
        let hooks = std::mem::take(&mut *self.inner.hooks.borrow_mut());
        for (_, hook) in hooks {
            hook();
        }
    }

    /// Run `hook` on cancellation, immediately if already cancelled.
    pub fn on_cancel(&self, hook: impl FnOnce() + 'static) -> HookId {
        let id = HookId(self.inner.next_hook.get());
        self.inner.next_hook.set(id.0 + 1);
        if self.is_cancelled() {
            hook();
        } else {
            self.inner.hooks.borrow_mut().push((id, Box::new(hook)));
        }
        id
    }

    /// Drop the hook registered as `id` without running it.
    pub fn release(&self, id: HookId) {
        let hook = {
            let mut hooks = self.inner.hooks.borrow_mut();
            hooks
                .iter()
                .position(|(hook_id, _)| *hook_id == id)
                .map(|index| hooks.swap_remove(index))
        };
        // Captures are dropped outside the borrow
        drop(hook);
    }

    /// Number of hooks waiting for cancellation.
    pub fn pending_hooks(&self) -> usize {
        self.inner.hooks.borrow().len()
    }
}

impl fmt::Debug for CancelToken {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CancelToken")
            .field("cancelled", &self.is_cancelled())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_clones_share_flag() {
        let token = CancelToken::new();
        let clone = token.clone();
        assert!(!clone.is_cancelled());
        token.cancel();
        assert!(clone.is_cancelled());
    }

    #[test]
    fn test_hooks_run_once() {
        let token = CancelToken::new();
        let hits = Rc::new(Cell::new(0));

        let counter = hits.clone();
        token.on_cancel(move || counter.set(counter.get() + 1));
        token.cancel();
        token.cancel();
        assert_eq!(hits.get(), 1);

        let counter = hits.clone();
        token.on_cancel(move || counter.set(counter.get() + 10));
        assert_eq!(hits.get(), 11);
    }

    #[test]
    fn test_released_hook_never_runs() {
        let token = CancelToken::new();
        let hits = Rc::new(Cell::new(0));

        let counter = hits.clone();
        let first = token.on_cancel(move || counter.set(counter.get() + 1));
        let counter = hits.clone();
        let _second = token.on_cancel(move || counter.set(counter.get() + 10));
        assert_eq!(token.pending_hooks(), 2);

        token.release(first);
        token.release(first);
        assert_eq!(token.pending_hooks(), 1);

        token.cancel();
        assert_eq!(hits.get(), 10);
        assert_eq!(token.pending_hooks(), 0);
    }
}
