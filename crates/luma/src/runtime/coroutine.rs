// Coroutine scheduler: cooperative, symmetric transfer on a single OS
// thread. Each coroutine gets its own evaluation state and a lazily started
// native stack; values cross through the coroutine object's transfer slot,
// never through the stack-switch machinery itself.

use crate::gc::CoroutineId;
use crate::runtime::error::{Control, ErrorKind, Eval, RtError};
use crate::runtime::{RtState, Runtime};
use crate::value::{CoroStatus, Coroutine, Value};
use generator::Gn;

/// 4 MiB per coroutine stack (virtual; committed lazily). The evaluator's
/// call-depth limit keeps real usage far below this.
const CORO_STACK_SIZE: usize = 0x40_0000;

/// Everything the suspended stack needs to find its runtime again. The
/// runtime is single-threaded; the pointer never crosses threads.
struct CoroSeed {
    state: *const RtState,
    id: CoroutineId,
}

unsafe impl Send for CoroSeed {}

impl Runtime {
    /// coroutine.create: allocate a suspended coroutine around `entry`.
    pub(crate) fn coro_create(&self, entry: Value) -> Eval<Value> {
        if !entry.is_function() {
            return Err(self.error_here(
                ErrorKind::CoroutineError,
                format!(
                    "cannot create coroutine from a {} value",
                    entry.type_name()
                ),
            ));
        }
        self.maybe_collect();
        let exec = self.new_exec(None);
        let id = {
            let mut heap = self.state.heap.borrow_mut();
            heap.create_coroutine(Coroutine::new(entry, exec))
        };
        self.with_exec(exec, |e| e.coro = Some(id));
        let cost = self.state.heap.borrow().credit_cost(crate::gc::GcId::Coroutine(id));
        self.state.gc.borrow_mut().track_allocation(cost);
        Ok(Value::Coroutine(id))
    }

    /// coroutine.resume: transfer control into `id` until it yields,
    /// finishes or fails. State errors come back as `Err` with a
    /// CoroutineError payload, like any script error.
    pub(crate) fn coro_resume(
        &self,
        id: CoroutineId,
        args: Vec<Value>,
    ) -> Result<Vec<Value>, RtError> {
        let status = self.state.heap.borrow().coroutine(id).status;
        match status {
            CoroStatus::Dead => return Err(self.coro_state_error("cannot resume dead coroutine")),
            CoroStatus::Running | CoroStatus::Normal => {
                return Err(self.coro_state_error("cannot resume non-suspended coroutine"));
            }
            CoroStatus::Suspended => {}
        }

        let prev_exec = self.cur();
        let resumer = self.with_exec(prev_exec, |e| e.coro);
        let co_exec = {
            let mut heap = self.state.heap.borrow_mut();
            let co = heap.coroutine_mut(id);
            co.status = CoroStatus::Running;
            co.transfer = args;
            co.resumer = resumer;
            co.exec
        };
        if let Some(parent) = resumer {
            self.state.heap.borrow_mut().coroutine_mut(parent).status = CoroStatus::Normal;
        }
        self.state.current_exec.set(co_exec);

        // Take the machine out so nothing borrows the heap across the stack
        // switch.
        let mut machine = {
            let mut heap = self.state.heap.borrow_mut();
            let co = heap.coroutine_mut(id);
            match co.machine.take() {
                Some(m) => m,
                None => {
                    let seed = CoroSeed {
                        state: std::rc::Rc::as_ptr(&self.state),
                        id,
                    };
                    Gn::<()>::new_scoped_opt(CORO_STACK_SIZE, move |_scope| {
                        let seed = seed;
                        let st = unsafe { &*seed.state };
                        st.runtime().coroutine_body(seed.id);
                    })
                }
            }
        };

        machine.resume();

        self.state.current_exec.set(prev_exec);
        let (status, transfer, error) = {
            let mut heap = self.state.heap.borrow_mut();
            if let Some(parent) = resumer {
                heap.coroutine_mut(parent).status = CoroStatus::Running;
            }
            let co = heap.coroutine_mut(id);
            if !co.is_dead() {
                co.machine = Some(machine);
            }
            (co.status, std::mem::take(&mut co.transfer), co.error.take())
        };

        match status {
            CoroStatus::Suspended => Ok(transfer),
            CoroStatus::Dead => match error {
                Some(e) => Err(e),
                None => Ok(transfer),
            },
            // The machine came back without suspending or dying.
            _ => Err(self.coro_state_error("coroutine in inconsistent state")),
        }
    }

    /// Runs on the coroutine's own stack.
    fn coroutine_body(&self, id: CoroutineId) {
        let (entry, args) = {
            let mut heap = self.state.heap.borrow_mut();
            let co = heap.coroutine_mut(id);
            co.started = true;
            (co.entry, std::mem::take(&mut co.transfer))
        };
        let result = self.call_value(entry, args);
        let mut heap = self.state.heap.borrow_mut();
        let co = heap.coroutine_mut(id);
        co.status = CoroStatus::Dead;
        match result {
            Ok(values) => co.transfer = values,
            Err(Control::Error(e)) => co.error = Some(e),
            Err(Control::Close(e)) => co.error = e,
            Err(other) => {
                debug_assert!(false, "stray control escaped coroutine: {:?}", other);
                co.error = Some(RtError::new(ErrorKind::CoroutineError, Value::Nil));
            }
        }
    }

    /// coroutine.yield: suspend the running coroutine, handing `values` to
    /// the resumer; returns the next resume's arguments.
    pub(crate) fn coro_yield(&self, values: Vec<Value>) -> Eval<Vec<Value>> {
        let Some(id) = self.with_cur_exec(|e| e.coro) else {
            return Err(self.error_here(
                ErrorKind::CoroutineError,
                "attempt to yield from outside a coroutine".to_string(),
            ));
        };
        {
            let mut heap = self.state.heap.borrow_mut();
            let co = heap.coroutine_mut(id);
            co.transfer = values;
            co.status = CoroStatus::Suspended;
        }
        generator::yield_with(());
        // Resumed (or being torn down).
        let (resume_args, close_requested) = {
            let mut heap = self.state.heap.borrow_mut();
            let co = heap.coroutine_mut(id);
            (std::mem::take(&mut co.transfer), co.close_requested)
        };
        if close_requested {
            return Err(Control::Close(None));
        }
        Ok(resume_args)
    }

    /// coroutine.close: tear down a suspended coroutine, running its
    /// to-be-closed values in reverse order.
    pub(crate) fn coro_close(&self, id: CoroutineId) -> Result<(), RtError> {
        let (status, started) = {
            let heap = self.state.heap.borrow();
            let co = heap.coroutine(id);
            (co.status, co.started)
        };
        match status {
            CoroStatus::Dead => Ok(()),
            CoroStatus::Running | CoroStatus::Normal => {
                Err(self.coro_state_error("cannot close a running coroutine"))
            }
            CoroStatus::Suspended if !started => {
                self.state.heap.borrow_mut().coroutine_mut(id).status = CoroStatus::Dead;
                Ok(())
            }
            CoroStatus::Suspended => {
                self.state.heap.borrow_mut().coroutine_mut(id).close_requested = true;
                match self.coro_resume(id, Vec::new()) {
                    Ok(_) => Ok(()),
                    Err(e) => Err(e),
                }
            }
        }
    }

    pub(crate) fn coro_status(&self, id: CoroutineId) -> CoroStatus {
        self.state.heap.borrow().coroutine(id).status
    }

    /// The coroutine driving the current execution, if any.
    pub(crate) fn current_coroutine(&self) -> Option<CoroutineId> {
        self.with_cur_exec(|e| e.coro)
    }

    fn coro_state_error(&self, msg: &str) -> RtError {
        let value = self.str_value(msg);
        let mut err = RtError::new(ErrorKind::CoroutineError, value);
        err.traceback = self.capture_traceback();
        err
    }
}
