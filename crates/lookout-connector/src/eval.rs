use std::any::Any;
use std::fmt;
use std::panic::{catch_unwind, AssertUnwindSafe};
use std::sync::Arc;
use std::time::Instant;

use lookout_dump::{Dumper, SerializedValue, Value, ValueArena};
use lookout_gate::PasswordHash;
use lookout_proto::{eval_marker, EvalRequest, EvalResult, InboundRequest};

pub type EvalError = Box<dyn std::error::Error + Send + Sync>;

/// Runs client-submitted code. How the code is interpreted is up to the
/// host; the dispatcher only sees the returned value or error.
pub trait EvalSandbox: Send + Sync {
    fn execute(&self, code: &str, cx: &mut EvalContext) -> Result<Value, EvalError>;
}

impl<F> EvalSandbox for F
where
    F: Fn(&str, &mut EvalContext) -> Result<Value, EvalError> + Send + Sync,
{
    fn execute(&self, code: &str, cx: &mut EvalContext) -> Result<Value, EvalError> {
        self(code, cx)
    }
}

/// Scratch space handed to the sandbox for one job.
#[derive(Debug, Default)]
pub struct EvalContext {
    arena: ValueArena,
    output: String,
}

impl EvalContext {
    /// Arena for describing the returned value.
    pub fn arena(&mut self) -> &mut ValueArena {
        &mut self.arena
    }

    /// Appends to the captured output text.
    pub fn print(&mut self, text: &str) {
        self.output.push_str(text);
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum EvalState {
    Idle,
    AwaitingJob,
    Executing,
    Responded,
}

/// One accepted evaluation request. Jobs run once and are never retried.
pub struct EvalJob {
    job_id: String,
    code: String,
    session: String,
    state: EvalState,
}

impl fmt::Debug for EvalJob {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("EvalJob")
            .field("job_id", &self.job_id)
            .field("code_len", &self.code.len())
            .field("session", &self.session)
            .field("state", &self.state)
            .finish()
    }
}

impl EvalJob {
    pub fn job_id(&self) -> &str {
        &self.job_id
    }

    pub fn session(&self) -> &str {
        &self.session
    }

    pub fn state(&self) -> EvalState {
        self.state
    }

    fn advance(&mut self, next: EvalState) {
        tracing::trace!(target: "lookout.eval", job_id = %self.job_id, from = ?self.state, to = ?next, "eval state");
        self.state = next;
    }
}

/// Accepts signed evaluation requests and runs them through the sandbox.
#[derive(Clone)]
pub struct EvalDispatcher {
    sandbox: Arc<dyn EvalSandbox>,
    password: PasswordHash,
}

impl fmt::Debug for EvalDispatcher {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("EvalDispatcher").finish_non_exhaustive()
    }
}

impl EvalDispatcher {
    pub fn new(sandbox: Arc<dyn EvalSandbox>, password: PasswordHash) -> Self {
        Self { sandbox, password }
    }

    /// Looks for an evaluation request on `request`. Malformed requests and
    /// bad signatures are dropped without telling the client why.
    pub fn accept(
        &self,
        request: &(impl InboundRequest + ?Sized),
        session: &str,
    ) -> Option<EvalJob> {
        let marker = eval_marker(request)?;
        let EvalRequest {
            job_id,
            code,
            signature,
        } = match EvalRequest::decode(marker) {
            Ok(request) => request,
            Err(err) => {
                tracing::debug!(target: "lookout.eval", error = %err, "ignoring malformed eval request");
                return None;
            }
        };
        if !self.password.verify_eval(&code, &signature) {
            tracing::debug!(target: "lookout.eval", %job_id, "ignoring eval request with a bad signature");
            return None;
        }
        let mut job = EvalJob {
            job_id,
            code,
            session: session.to_owned(),
            state: EvalState::Idle,
        };
        job.advance(EvalState::AwaitingJob);
        Some(job)
    }

    /// Runs `job` and always produces a result, whether the code returned a
    /// value, an error or panicked.
    pub fn execute(&self, job: &mut EvalJob, dumper: &Dumper) -> EvalResult {
        job.advance(EvalState::Executing);
        let started = Instant::now();
        let mut cx = EvalContext::default();
        let outcome = catch_unwind(AssertUnwindSafe(|| {
            self.sandbox.execute(&job.code, &mut cx)
        }));
        let duration_ms = u64::try_from(started.elapsed().as_millis()).unwrap_or(u64::MAX);

        let (value, failure) = match outcome {
            Ok(Ok(value)) => (dumper.dump(&cx.arena, &value), None),
            Ok(Err(err)) => (SerializedValue::Null, Some(err.to_string())),
            Err(payload) => {
                let message = panic_message(payload.as_ref());
                (SerializedValue::Null, Some(format!("panicked: {message}")))
            }
        };
        job.advance(EvalState::Responded);

        tracing::info!(
            target: "lookout.eval",
            job_id = %job.job_id,
            duration_ms,
            failed = failure.is_some(),
            "eval job finished"
        );
        EvalResult {
            job_id: job.job_id.clone(),
            value,
            output: cx.output,
            duration_ms,
            failure,
        }
    }
}

pub(crate) fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(message) = payload.downcast_ref::<&str>() {
        return (*message).to_owned();
    }
    payload
        .downcast_ref::<String>()
        .cloned()
        .unwrap_or_else(|| "Box<dyn Any>".to_owned())
}
