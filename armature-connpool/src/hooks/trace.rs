//! Tracing observer for commands and pipelines.

use tracing::{Span, field};

use super::{Cmd, CommandError, Hook, HookContext, cmd_string, cmds_string};

/// Opens a client span around every command and pipeline.
///
/// Nothing is recorded when the context's span is disabled, so the hook
/// costs next to nothing when no subscriber is interested. The `Nil`
/// outcome is a normal reply and does not mark the span as failed.
#[derive(Debug, Clone)]
pub struct TracingHook {
    db_system: &'static str,
}

// Span opened in `before_*` and the span it replaced in the context.
struct CommandSpan {
    span: Span,
    previous: Span,
}

impl TracingHook {
    /// Create a hook reporting `db.system = "redis"`.
    pub fn new() -> Self {
        Self { db_system: "redis" }
    }

    /// Set the `db.system` attribute.
    pub fn with_db_system(mut self, db_system: &'static str) -> Self {
        self.db_system = db_system;
        self
    }

    fn enter(ctx: &mut HookContext, span: Span) {
        let previous = ctx.replace_span(span.clone());
        ctx.insert(CommandSpan { span, previous });
    }

    fn exit(ctx: &mut HookContext, err: Option<&CommandError>) {
        let Some(CommandSpan { span, previous }) = ctx.remove::<CommandSpan>() else {
            return;
        };
        if let Some(err) = err
            && !err.is_nil()
        {
            span.record("otel.status_code", "ERROR");
            span.record("otel.status_message", field::display(err));
            tracing::error!(parent: &span, error = %err, "Command failed");
        }
        ctx.replace_span(previous);
    }
}

impl Default for TracingHook {
    fn default() -> Self {
        Self::new()
    }
}

impl Hook for TracingHook {
    fn before_process(&self, ctx: &mut HookContext, cmd: &Cmd) -> Result<(), CommandError> {
        if ctx.span().is_disabled() {
            return Ok(());
        }

        let span = tracing::info_span!(
            parent: ctx.span(),
            "command",
            otel.name = %cmd.full_name(),
            otel.kind = "client",
            otel.status_code = field::Empty,
            otel.status_message = field::Empty,
            db.system = self.db_system,
            db.statement = %cmd_string(cmd),
        );
        Self::enter(ctx, span);
        Ok(())
    }

    fn after_process(&self, ctx: &mut HookContext, cmd: &Cmd) -> Result<(), CommandError> {
        Self::exit(ctx, cmd.err());
        Ok(())
    }

    fn before_process_pipeline(
        &self,
        ctx: &mut HookContext,
        cmds: &[Cmd],
    ) -> Result<(), CommandError> {
        if ctx.span().is_disabled() {
            return Ok(());
        }

        let (summary, statements) = cmds_string(cmds);
        let span = tracing::info_span!(
            parent: ctx.span(),
            "pipeline",
            otel.name = %format!("pipeline {}", summary),
            otel.kind = "client",
            otel.status_code = field::Empty,
            otel.status_message = field::Empty,
            db.system = self.db_system,
            db.redis.num_cmd = cmds.len(),
            db.statement = %statements,
        );
        Self::enter(ctx, span);
        Ok(())
    }

    fn after_process_pipeline(
        &self,
        ctx: &mut HookContext,
        cmds: &[Cmd],
    ) -> Result<(), CommandError> {
        let failed = cmds.iter().filter_map(Cmd::err).find(|err| !err.is_nil());
        Self::exit(ctx, failed);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use parking_lot::Mutex;
    use std::fmt;
    use std::sync::Arc;
    use tracing::field::{Field, Visit};
    use tracing::{Event, Subscriber, span};
    use tracing_subscriber::layer::{Context, Layer, SubscriberExt};
    use tracing_subscriber::registry::LookupSpan;

    #[derive(Clone, Default)]
    struct Capture {
        lines: Arc<Mutex<Vec<String>>>,
    }

    struct Fields<'a>(&'a mut Vec<String>);

    impl Visit for Fields<'_> {
        fn record_debug(&mut self, field: &Field, value: &dyn fmt::Debug) {
            self.0.push(format!("{}={:?}", field.name(), value));
        }

        fn record_str(&mut self, field: &Field, value: &str) {
            self.0.push(format!("{}={}", field.name(), value));
        }
    }

    impl<S> Layer<S> for Capture
    where
        S: Subscriber + for<'a> LookupSpan<'a>,
    {
        fn on_new_span(&self, attrs: &span::Attributes<'_>, _id: &span::Id, _ctx: Context<'_, S>) {
            let mut lines = self.lines.lock();
            lines.push(format!("new {}", attrs.metadata().name()));
            attrs.record(&mut Fields(&mut lines));
        }

        fn on_record(&self, _id: &span::Id, values: &span::Record<'_>, _ctx: Context<'_, S>) {
            values.record(&mut Fields(&mut self.lines.lock()));
        }

        fn on_event(&self, event: &Event<'_>, _ctx: Context<'_, S>) {
            let mut lines = self.lines.lock();
            lines.push(format!("event {}", event.metadata().level()));
        }

        fn on_close(&self, _id: span::Id, _ctx: Context<'_, S>) {
            self.lines.lock().push("close".to_string());
        }
    }

    fn with_capture(f: impl FnOnce()) -> Vec<String> {
        let capture = Capture::default();
        let subscriber = tracing_subscriber::registry().with(capture.clone());
        tracing::subscriber::with_default(subscriber, f);
        capture.lines.lock().clone()
    }

    #[test]
    fn test_disabled_span_records_nothing() {
        let hook = TracingHook::new();
        let mut ctx = HookContext::with_span(Span::none());
        let cmd = Cmd::new("get").arg("k");

        hook.before_process(&mut ctx, &cmd).unwrap();
        assert!(ctx.get::<CommandSpan>().is_none());
        hook.after_process(&mut ctx, &cmd).unwrap();
        assert!(ctx.span().is_none());
    }

    #[test]
    fn test_command_span() {
        let lines = with_capture(|| {
            let hook = TracingHook::new();
            let parent = tracing::info_span!("request");
            let mut ctx = HookContext::with_span(parent.clone());
            let cmd = Cmd::new("SET").arg("k").arg("v");

            hook.before_process(&mut ctx, &cmd).unwrap();
            assert_ne!(ctx.span().id(), parent.id());
            hook.after_process(&mut ctx, &cmd).unwrap();
            assert_eq!(ctx.span().id(), parent.id());
        });

        assert!(lines.contains(&"new command".to_string()));
        assert!(lines.contains(&"otel.name=set".to_string()));
        assert!(lines.contains(&"db.system=redis".to_string()));
        assert!(lines.contains(&"db.statement=SET k v".to_string()));
        assert!(!lines.iter().any(|line| line.starts_with("otel.status_code")));
    }

    #[test]
    fn test_error_is_recorded() {
        let lines = with_capture(|| {
            let hook = TracingHook::new();
            let mut ctx = HookContext::with_span(tracing::info_span!("request"));
            let mut cmd = Cmd::new("incr").arg("k");

            hook.before_process(&mut ctx, &cmd).unwrap();
            cmd.set_err(Some(CommandError::Server("WRONGTYPE".to_string())));
            hook.after_process(&mut ctx, &cmd).unwrap();
        });

        assert!(lines.contains(&"otel.status_code=ERROR".to_string()));
        assert!(lines.contains(&"otel.status_message=WRONGTYPE".to_string()));
        assert!(lines.contains(&"event ERROR".to_string()));
    }

    #[test]
    fn test_nil_is_not_an_error() {
        let lines = with_capture(|| {
            let hook = TracingHook::new();
            let mut ctx = HookContext::with_span(tracing::info_span!("request"));
            let mut cmd = Cmd::new("get").arg("missing");

            hook.before_process(&mut ctx, &cmd).unwrap();
            cmd.set_err(Some(CommandError::Nil));
            hook.after_process(&mut ctx, &cmd).unwrap();
        });

        assert!(lines.contains(&"new command".to_string()));
        assert!(!lines.iter().any(|line| line.starts_with("otel.status_code")));
        assert!(!lines.contains(&"event ERROR".to_string()));
    }

    #[test]
    fn test_pipeline_span() {
        let lines = with_capture(|| {
            let hook = TracingHook::new().with_db_system("valkey");
            let mut ctx = HookContext::with_span(tracing::info_span!("request"));
            let mut cmds = vec![Cmd::new("set").arg("a").arg(1), Cmd::new("get").arg("a")];

            hook.before_process_pipeline(&mut ctx, &cmds).unwrap();
            cmds[1].set_err(Some(CommandError::Io("connection reset".to_string())));
            hook.after_process_pipeline(&mut ctx, &cmds).unwrap();
        });

        assert!(lines.contains(&"new pipeline".to_string()));
        assert!(lines.contains(&"otel.name=pipeline set get".to_string()));
        assert!(lines.contains(&"db.system=valkey".to_string()));
        assert!(lines.contains(&"db.redis.num_cmd=2".to_string()));
        assert!(lines.contains(&"otel.status_code=ERROR".to_string()));
        assert!(lines.contains(&"close".to_string()));
    }

    #[test]
    fn test_pipeline_error_after_nil_is_recorded() {
        let lines = with_capture(|| {
            let hook = TracingHook::new();
            let mut ctx = HookContext::with_span(tracing::info_span!("request"));
            let mut cmds = vec![Cmd::new("get").arg("missing"), Cmd::new("incr").arg("k")];

            hook.before_process_pipeline(&mut ctx, &cmds).unwrap();
            cmds[0].set_err(Some(CommandError::Nil));
            cmds[1].set_err(Some(CommandError::Server("WRONGTYPE".to_string())));
            hook.after_process_pipeline(&mut ctx, &cmds).unwrap();
        });

        assert!(lines.contains(&"otel.status_code=ERROR".to_string()));
        assert!(lines.contains(&"otel.status_message=WRONGTYPE".to_string()));
        assert!(lines.contains(&"event ERROR".to_string()));
    }

    #[test]
    fn test_pipeline_of_nils_is_not_an_error() {
        let lines = with_capture(|| {
            let hook = TracingHook::new();
            let mut ctx = HookContext::with_span(tracing::info_span!("request"));
            let mut cmds = vec![Cmd::new("get").arg("a"), Cmd::new("get").arg("b")];

            hook.before_process_pipeline(&mut ctx, &cmds).unwrap();
            cmds[0].set_err(Some(CommandError::Nil));
            cmds[1].set_err(Some(CommandError::Nil));
            hook.after_process_pipeline(&mut ctx, &cmds).unwrap();
        });

        assert!(lines.contains(&"new pipeline".to_string()));
        assert!(!lines.iter().any(|line| line.starts_with("otel.status_code")));
    }
}
