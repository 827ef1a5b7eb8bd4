use std::cell::Cell;

thread_local! {
    static STATIC_RENDERING: Cell<bool> = const { Cell::new(false) };
}

/// Switches the current thread to non-interactive rendering: components
/// render once with no tracking, no reactions and no scheduling. Meant for
/// one-shot output such as server-side rendering.
pub fn use_static_rendering(enable: bool) {
    STATIC_RENDERING.with(|s| s.set(enable));
}

pub fn is_using_static_rendering() -> bool {
    STATIC_RENDERING.with(|s| s.get())
}
