use std::collections::BTreeMap;
use std::fmt;
use tracing::Level;

/// Identity attached to every event a [`StructuredLogger`] emits
#[derive(Debug, Clone)]
pub struct LogContext {
    /// Subsystem name: "session", "api", "reconcile", ...
    pub component: String,
    /// Set when the logger is scoped to one property
    pub consumer_id: Option<String>,
    pub extra_fields: BTreeMap<String, String>,
}

impl LogContext {
    pub fn new(component: &str) -> Self {
        Self {
            component: component.to_string(),
            consumer_id: None,
            extra_fields: BTreeMap::new(),
        }
    }

    pub fn with_consumer_id(mut self, consumer_id: &str) -> Self {
        self.consumer_id = Some(consumer_id.to_string());
        self
    }

    pub fn with_field(mut self, key: &str, value: String) -> Self {
        self.extra_fields.insert(key.to_string(), value);
        self
    }
}

/// `k=v` pairs of the extra fields, rendered lazily
struct Extras<'a>(&'a BTreeMap<String, String>);

impl fmt::Display for Extras<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (i, (key, value)) in self.0.iter().enumerate() {
            if i > 0 {
                f.write_str(",")?;
            }
            write!(f, "{}={}", key, value)?;
        }
        Ok(())
    }
}

/// Component-scoped logger
///
/// `component` and `consumer_id` are recorded as discrete tracing fields so
/// JSON output can be filtered per property.
#[derive(Debug, Clone)]
pub struct StructuredLogger {
    context: LogContext,
}

macro_rules! emit_at {
    ($macro:ident, $ctx:expr, $message:expr) => {{
        let ctx = $ctx;
        let consumer_id = ctx.consumer_id.as_deref().unwrap_or("-");
        if ctx.extra_fields.is_empty() {
            tracing::$macro!(component = %ctx.component, consumer_id, "{}", $message);
        } else {
            let extra = Extras(&ctx.extra_fields);
            tracing::$macro!(component = %ctx.component, consumer_id, %extra, "{}", $message);
        }
    }};
}

impl StructuredLogger {
    pub fn new(context: LogContext) -> Self {
        Self { context }
    }

    /// Same component, scoped to one property
    pub fn for_property(&self, consumer_id: &str) -> Self {
        Self::new(self.context.clone().with_consumer_id(consumer_id))
    }

    pub fn context(&self) -> &LogContext {
        &self.context
    }

    pub fn emit(&self, level: Level, message: &str) {
        let ctx = &self.context;
        match level {
            Level::ERROR => emit_at!(error, ctx, message),
            Level::WARN => emit_at!(warn, ctx, message),
            Level::INFO => emit_at!(info, ctx, message),
            Level::DEBUG => emit_at!(debug, ctx, message),
            _ => emit_at!(trace, ctx, message),
        }
    }

    pub fn error(&self, message: &str) {
        self.emit(Level::ERROR, message);
    }

    pub fn warn(&self, message: &str) {
        self.emit(Level::WARN, message);
    }

    pub fn info(&self, message: &str) {
        self.emit(Level::INFO, message);
    }

    pub fn debug(&self, message: &str) {
        self.emit(Level::DEBUG, message);
    }

    pub fn trace(&self, message: &str) {
        self.emit(Level::TRACE, message);
    }
}

pub fn get_logger(component: &str) -> StructuredLogger {
    StructuredLogger::new(LogContext::new(component))
}

pub fn get_logger_with_context(context: LogContext) -> StructuredLogger {
    StructuredLogger::new(context)
}
