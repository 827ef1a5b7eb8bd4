use std::cell::Cell;

/// Runtime limits for the reactive engine and the host update loop.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Config {
    /// Passes over the pending-reaction queue before the engine gives up on a
    /// reaction cycle.
    pub max_reaction_iterations: usize,
    /// Back-to-back renders of one instance (updates requested while it was
    /// rendering) before the host reports `UpdateDepthExceeded`.
    pub max_update_depth: usize,
}

impl Config {
    pub const DEFAULT: Config = Config {
        max_reaction_iterations: 100,
        max_update_depth: 50,
    };
}

impl Default for Config {
    fn default() -> Self {
        Self::DEFAULT
    }
}

thread_local! {
    static CONFIG: Cell<Config> = const { Cell::new(Config::DEFAULT) };
}

pub fn config() -> Config {
    CONFIG.with(|c| c.get())
}

/// Adjusts the configuration of the current thread.
pub fn configure(f: impl FnOnce(&mut Config)) {
    CONFIG.with(|c| {
        let mut cfg = c.get();
        f(&mut cfg);
        c.set(cfg);
    });
}
