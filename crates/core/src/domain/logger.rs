// Logger - ordered, context-keyed log messages
//
// `LogContext` is a closed set (no user-defined contexts); `Logger`
// preserves insertion order per context and never deduplicates on merge.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum LogContext {
    Error,
    Warning,
    Info,
    Event,
    Network,
    FileSystem,
    Startup,
    Shutdown,
    User,
    Authentication,
    Security,
}

impl LogContext {
    pub const ALL: [LogContext; 11] = [
        LogContext::Error,
        LogContext::Warning,
        LogContext::Info,
        LogContext::Event,
        LogContext::Network,
        LogContext::FileSystem,
        LogContext::Startup,
        LogContext::Shutdown,
        LogContext::User,
        LogContext::Authentication,
        LogContext::Security,
    ];
}

impl std::fmt::Display for LogContext {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            LogContext::Error => "ERROR",
            LogContext::Warning => "WARNING",
            LogContext::Info => "INFO",
            LogContext::Event => "EVENT",
            LogContext::Network => "NETWORK",
            LogContext::FileSystem => "FILE_SYSTEM",
            LogContext::Startup => "STARTUP",
            LogContext::Shutdown => "SHUTDOWN",
            LogContext::User => "USER",
            LogContext::Authentication => "AUTHENTICATION",
            LogContext::Security => "SECURITY",
        };
        write!(f, "{s}")
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LogMessage {
    pub datetime: chrono::DateTime<chrono::Utc>,
    pub origin: String,
    pub body: String,
}

impl LogMessage {
    pub fn new(datetime: chrono::DateTime<chrono::Utc>, origin: impl Into<String>, body: impl Into<String>) -> Self {
        Self {
            datetime,
            origin: origin.into(),
            body: body.into(),
        }
    }
}

/// A rendering style for `Logger::render`. Color decoration is purely a
/// display concern, never persisted.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RenderStyle {
    Plain,
    Colored,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Logger {
    #[serde(flatten)]
    contexts: BTreeMap<LogContext, Vec<LogMessage>>,
}

impl Logger {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn log(&mut self, context: LogContext, origin: impl Into<String>, body: impl Into<String>) {
        self.log_at(context, chrono::Utc::now(), origin, body);
    }

    pub fn log_at(
        &mut self,
        context: LogContext,
        datetime: chrono::DateTime<chrono::Utc>,
        origin: impl Into<String>,
        body: impl Into<String>,
    ) {
        self.contexts
            .entry(context)
            .or_default()
            .push(LogMessage::new(datetime, origin, body));
    }

    pub fn get(&self, context: LogContext) -> &[LogMessage] {
        self.contexts
            .get(&context)
            .map(|v| v.as_slice())
            .unwrap_or(&[])
    }

    pub fn is_empty(&self) -> bool {
        self.contexts.values().all(|v| v.is_empty())
    }

    /// Concatenate `other`'s messages onto `self`, per context, preserving
    /// order and without deduplication.
    pub fn merge(&mut self, other: &Logger) {
        for (ctx, msgs) in &other.contexts {
            self.contexts.entry(*ctx).or_default().extend(msgs.iter().cloned());
        }
    }

    /// Build a new `Logger` containing only the given contexts.
    pub fn pick(&self, contexts: &[LogContext]) -> Logger {
        let mut out = Logger::new();
        for ctx in contexts {
            if let Some(msgs) = self.contexts.get(ctx) {
                out.contexts.insert(*ctx, msgs.clone());
            }
        }
        out
    }

    /// Build a new `Logger` containing every context except the given ones.
    pub fn complement(&self, contexts: &[LogContext]) -> Logger {
        let excluded: std::collections::HashSet<_> = contexts.iter().copied().collect();
        let mut out = Logger::new();
        for (ctx, msgs) in &self.contexts {
            if !excluded.contains(ctx) {
                out.contexts.insert(*ctx, msgs.clone());
            }
        }
        out
    }

    /// Flatten every context (in `LogContext::ALL` declaration order) into
    /// a single ordered sequence of rendered lines.
    pub fn render(&self, style: RenderStyle) -> String {
        let mut lines = Vec::new();
        for ctx in LogContext::ALL {
            for msg in self.get(ctx) {
                lines.push(render_line(ctx, msg, style));
            }
        }
        lines.join("\n")
    }
}

fn render_line(ctx: LogContext, msg: &LogMessage, style: RenderStyle) -> String {
    let tag = match style {
        RenderStyle::Plain => ctx.to_string(),
        RenderStyle::Colored => format!("{}{}{}", ansi_prefix(ctx), ctx, ANSI_RESET),
    };
    format!("[{}] {} {}: {}", tag, msg.datetime.to_rfc3339(), msg.origin, msg.body)
}

const ANSI_RESET: &str = "\x1b[0m";

fn ansi_prefix(ctx: LogContext) -> &'static str {
    match ctx {
        LogContext::Error | LogContext::Security => "\x1b[31m",
        LogContext::Warning | LogContext::Authentication => "\x1b[33m",
        LogContext::Event | LogContext::Startup | LogContext::Shutdown => "\x1b[36m",
        LogContext::Info | LogContext::User => "\x1b[37m",
        LogContext::Network | LogContext::FileSystem => "\x1b[34m",
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn merge_concatenates_without_dedup() {
        let mut a = Logger::new();
        a.log(LogContext::Info, "a", "one");
        let mut b = Logger::new();
        b.log(LogContext::Info, "a", "one");
        a.merge(&b);
        assert_eq!(a.get(LogContext::Info).len(), 2);
    }

    #[test]
    fn pick_and_complement_partition_contexts() {
        let mut l = Logger::new();
        l.log(LogContext::Info, "a", "x");
        l.log(LogContext::Error, "a", "y");
        let picked = l.pick(&[LogContext::Info]);
        assert_eq!(picked.get(LogContext::Info).len(), 1);
        assert!(picked.get(LogContext::Error).is_empty());
        let rest = l.complement(&[LogContext::Info]);
        assert!(rest.get(LogContext::Info).is_empty());
        assert_eq!(rest.get(LogContext::Error).len(), 1);
    }
}
