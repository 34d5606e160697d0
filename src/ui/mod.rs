/// UI module exports
use gloo_timers::callback::Timeout;
use std::cell::Cell;
use std::rc::Rc;

pub mod components;
pub mod popup;
pub mod settings;

/// Run `f` once after `delay_ms`
pub fn run_later(delay_ms: u32, f: impl FnOnce() + 'static) {
    Timeout::new(delay_ms, f).forget();
}

/// Collapses bursts of calls into the last one, e.g. saves while typing
#[derive(Default)]
pub struct Debouncer {
    timeout: Option<Timeout>,
    pending: Rc<Cell<bool>>,
}

impl Debouncer {
    pub fn schedule(&mut self, delay_ms: u32, f: impl FnOnce() + 'static) {
        self.cancel();
        let pending = self.pending.clone();
        pending.set(true);
        self.timeout = Some(Timeout::new(delay_ms, move || {
            pending.set(false);
            f();
        }));
    }

    /// Drops the queued call, if any
    pub fn cancel(&mut self) {
        // Dropping a Timeout clears it
        self.timeout.take();
        self.pending.set(false);
    }

    pub fn is_pending(&self) -> bool {
        self.pending.get()
    }
}
