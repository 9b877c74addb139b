//! Command lifecycle hooks.
//!
//! The command layer wraps every exchange in a before/after pair so that
//! observers, such as [`TracingHook`], can follow commands without knowing
//! anything about the pool or the wire protocol.
//!
//! ```rust,ignore
//! let mut hooks = Hooks::new();
//! hooks.add_hook(TracingHook::new());
//!
//! let mut ctx = HookContext::new();
//! let cmd = hooks
//!     .process(&mut ctx, Cmd::new("get").arg("user:1"), |cmd| execute(conn, cmd))
//!     .await;
//! ```

mod command;
mod trace;

pub use command::{Cmd, CommandError, cmd_string, cmds_string};
pub use trace::TracingHook;

use std::any::{Any, TypeId};
use std::collections::HashMap;
use std::fmt;
use std::future::Future;
use std::sync::Arc;
use tracing::{Instrument, Span};

/// Per-command state shared between the before and after calls.
pub struct HookContext {
    span: Span,
    extensions: HashMap<TypeId, Box<dyn Any + Send + Sync>>,
}

impl HookContext {
    /// Create a context under the current span.
    pub fn new() -> Self {
        Self::with_span(Span::current())
    }

    /// Create a context under `span`.
    pub fn with_span(span: Span) -> Self {
        Self {
            span,
            extensions: HashMap::new(),
        }
    }

    /// Span the command executes in.
    pub fn span(&self) -> &Span {
        &self.span
    }

    /// Replace the span the command executes in, returning the old one.
    pub fn replace_span(&mut self, span: Span) -> Span {
        std::mem::replace(&mut self.span, span)
    }

    /// Attach a value, returning the previous value of the same type.
    pub fn insert<T: Send + Sync + 'static>(&mut self, value: T) -> Option<T> {
        self.extensions
            .insert(TypeId::of::<T>(), Box::new(value))
            .and_then(|old| old.downcast().ok().map(|boxed| *boxed))
    }

    /// Borrow an attached value.
    pub fn get<T: Send + Sync + 'static>(&self) -> Option<&T> {
        self.extensions
            .get(&TypeId::of::<T>())
            .and_then(|value| value.downcast_ref())
    }

    /// Detach a value.
    pub fn remove<T: Send + Sync + 'static>(&mut self) -> Option<T> {
        self.extensions
            .remove(&TypeId::of::<T>())
            .and_then(|value| value.downcast().ok().map(|boxed| *boxed))
    }
}

impl Default for HookContext {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Debug for HookContext {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("HookContext")
            .field("span", &self.span)
            .field("extensions", &self.extensions.len())
            .finish()
    }
}

/// Observer of command execution.
///
/// Every method defaults to doing nothing. An error from a before call
/// aborts the command; an error from an after call replaces its outcome.
pub trait Hook: Send + Sync {
    /// Called before a single command runs.
    fn before_process(&self, ctx: &mut HookContext, cmd: &Cmd) -> Result<(), CommandError> {
        let _ = (ctx, cmd);
        Ok(())
    }

    /// Called after a single command ran, or was aborted.
    fn after_process(&self, ctx: &mut HookContext, cmd: &Cmd) -> Result<(), CommandError> {
        let _ = (ctx, cmd);
        Ok(())
    }

    /// Called before a pipeline runs.
    fn before_process_pipeline(
        &self,
        ctx: &mut HookContext,
        cmds: &[Cmd],
    ) -> Result<(), CommandError> {
        let _ = (ctx, cmds);
        Ok(())
    }

    /// Called after a pipeline ran, or was aborted.
    fn after_process_pipeline(
        &self,
        ctx: &mut HookContext,
        cmds: &[Cmd],
    ) -> Result<(), CommandError> {
        let _ = (ctx, cmds);
        Ok(())
    }
}

/// An ordered chain of hooks.
#[derive(Clone, Default)]
pub struct Hooks {
    hooks: Vec<Arc<dyn Hook>>,
}

impl Hooks {
    /// Create an empty chain.
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a hook. Hooks see "before" in insertion order and "after" in
    /// reverse.
    pub fn add_hook(&mut self, hook: impl Hook + 'static) {
        self.hooks.push(Arc::new(hook));
    }

    /// Number of hooks.
    pub fn len(&self) -> usize {
        self.hooks.len()
    }

    /// Whether the chain is empty.
    pub fn is_empty(&self) -> bool {
        self.hooks.is_empty()
    }

    /// Run `exec` on `cmd` surrounded by the chain.
    ///
    /// If a before hook fails, `exec` is skipped and the error becomes the
    /// command's outcome. The after hooks of every hook whose before ran
    /// are still called.
    pub async fn process<F, Fut>(&self, ctx: &mut HookContext, mut cmd: Cmd, exec: F) -> Cmd
    where
        F: FnOnce(Cmd) -> Fut,
        Fut: Future<Output = Cmd>,
    {
        let mut entered = 0;
        let mut aborted = false;
        for hook in &self.hooks {
            entered += 1;
            if let Err(err) = hook.before_process(ctx, &cmd) {
                cmd.set_err(Some(err));
                aborted = true;
                break;
            }
        }

        if !aborted {
            cmd = exec(cmd).instrument(ctx.span().clone()).await;
        }

        for hook in self.hooks[..entered].iter().rev() {
            if let Err(err) = hook.after_process(ctx, &cmd) {
                cmd.set_err(Some(err));
            }
        }
        cmd
    }

    /// Run `exec` on a batch of commands surrounded by the chain.
    ///
    /// Hook errors are recorded on every command of the batch.
    pub async fn process_pipeline<F, Fut>(
        &self,
        ctx: &mut HookContext,
        mut cmds: Vec<Cmd>,
        exec: F,
    ) -> Vec<Cmd>
    where
        F: FnOnce(Vec<Cmd>) -> Fut,
        Fut: Future<Output = Vec<Cmd>>,
    {
        let mut entered = 0;
        let mut aborted = false;
        for hook in &self.hooks {
            entered += 1;
            if let Err(err) = hook.before_process_pipeline(ctx, &cmds) {
                set_cmds_err(&mut cmds, err);
                aborted = true;
                break;
            }
        }

        if !aborted {
            cmds = exec(cmds).instrument(ctx.span().clone()).await;
        }

        for hook in self.hooks[..entered].iter().rev() {
            if let Err(err) = hook.after_process_pipeline(ctx, &cmds) {
                set_cmds_err(&mut cmds, err);
            }
        }
        cmds
    }
}

impl fmt::Debug for Hooks {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Hooks").field("len", &self.hooks.len()).finish()
    }
}

fn set_cmds_err(cmds: &mut [Cmd], err: CommandError) {
    for cmd in cmds {
        cmd.set_err(Some(err.clone()));
    }
}
