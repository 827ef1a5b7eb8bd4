use std::cell::RefCell;
use std::rc::Rc;

/// Work the host defers while a batched-updates scope is open.
pub(crate) trait PendingUpdate {
    fn flush(&self);
}

thread_local! {
    static QUEUE: RefCell<UpdateQueue> = RefCell::new(UpdateQueue::default());
}

#[derive(Default)]
struct UpdateQueue {
    depth: usize,
    pending: Vec<Rc<dyn PendingUpdate>>,
}

struct BatchScope;

impl Drop for BatchScope {
    fn drop(&mut self) {
        let flush = QUEUE.with(|q| {
            let mut q = q.borrow_mut();
            q.depth -= 1;
            q.depth == 0
        });
        if flush && !std::thread::panicking() {
            flush_updates();
        }
    }
}

/// Defers forced updates requested inside `f` and performs each of them once,
/// in request order, when the outermost scope exits.
pub fn batched_updates<R>(f: impl FnOnce() -> R) -> R {
    QUEUE.with(|q| q.borrow_mut().depth += 1);
    let _scope = BatchScope;
    f()
}

pub fn is_batching_updates() -> bool {
    QUEUE.with(|q| q.borrow().depth > 0)
}

pub(crate) fn enqueue(update: Rc<dyn PendingUpdate>) {
    QUEUE.with(|q| q.borrow_mut().pending.push(update));
}

fn flush_updates() {
    loop {
        let batch = QUEUE.with(|q| std::mem::take(&mut q.borrow_mut().pending));
        if batch.is_empty() {
            break;
        }
        log::debug!("flushing {} batched update(s)", batch.len());
        for update in batch {
            update.flush();
        }
    }
}
