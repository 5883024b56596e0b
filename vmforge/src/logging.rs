//! Operator-facing job logging and process-wide tracing setup.
//!
//! `JobLogger` is the single sink shared by concurrently running batch jobs.
//! It is constructed once at process start and handed down by `Arc`
//! reference; components never reach for ambient global state. Writes are
//! whole lines, serialized per sink, flushed before the call returns, so
//! concurrent jobs cannot interleave partial lines.
//!
//! Diagnostic logging (developer-facing) goes through `tracing` and is
//! configured separately via `init_tracing`.

use std::io::Write;

use parking_lot::Mutex;

type Sink = Mutex<Box<dyn Write + Send>>;

pub struct JobLogger {
    out: Sink,
    err: Sink,
}

impl JobLogger {
    /// Logger writing informational lines to stdout and errors to stderr.
    pub fn stdio() -> Self {
        Self::with_sinks(Box::new(std::io::stdout()), Box::new(std::io::stderr()))
    }

    pub fn with_sinks(out: Box<dyn Write + Send>, err: Box<dyn Write + Send>) -> Self {
        Self {
            out: Mutex::new(out),
            err: Mutex::new(err),
        }
    }

    pub fn info(&self, msg: &str) {
        Self::write_line(&self.out, msg);
    }

    pub fn error(&self, msg: &str) {
        Self::write_line(&self.err, msg);
    }

    fn write_line(sink: &Sink, msg: &str) {
        let mut sink = sink.lock();
        // Single write per line; visible before the call returns.
        let _ = writeln!(sink, "{}", msg);
        let _ = sink.flush();
    }
}

/// Initialize the tracing subscriber for the process.
///
/// Honors `RUST_LOG`; defaults to `info` when unset.
pub fn init_tracing() {
    use tracing_subscriber::EnvFilter;

    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .init();
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io;
    use std::sync::Arc;

    /// Shared in-memory sink for inspecting logger output.
    #[derive(Clone, Default)]
    pub(crate) struct SharedBuf(pub Arc<Mutex<Vec<u8>>>);

    impl Write for SharedBuf {
        fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
            self.0.lock().extend_from_slice(buf);
            Ok(buf.len())
        }

        fn flush(&mut self) -> io::Result<()> {
            Ok(())
        }
    }

    impl SharedBuf {
        pub(crate) fn lines(&self) -> Vec<String> {
            String::from_utf8(self.0.lock().clone())
                .unwrap()
                .lines()
                .map(str::to_string)
                .collect()
        }
    }

    #[test]
    fn info_and_error_use_separate_sinks() {
        let out = SharedBuf::default();
        let err = SharedBuf::default();
        let logger = JobLogger::with_sinks(Box::new(out.clone()), Box::new(err.clone()));

        logger.info("created web1");
        logger.error("web2 failed");

        assert_eq!(out.lines(), vec!["created web1"]);
        assert_eq!(err.lines(), vec!["web2 failed"]);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 8)]
    async fn concurrent_writes_never_interleave_lines() {
        let out = SharedBuf::default();
        let logger = Arc::new(JobLogger::with_sinks(
            Box::new(out.clone()),
            Box::new(io::sink()),
        ));

        let mut handles = Vec::new();
        for job in 0..16 {
            let logger = Arc::clone(&logger);
            handles.push(tokio::spawn(async move {
                for i in 0..50 {
                    logger.info(&format!("job-{job} line-{i} {}", "x".repeat(64)));
                }
            }));
        }
        for h in handles {
            h.await.unwrap();
        }

        let lines = out.lines();
        assert_eq!(lines.len(), 16 * 50);
        for line in lines {
            // Every line must be exactly one complete message.
            assert!(
                line.starts_with("job-") && line.ends_with(&"x".repeat(64)),
                "interleaved line: {line}"
            );
        }
    }
}
