//! Pluggable logging hook.
//!
//! The pipeline emits a handful of informational messages (skipped stages,
//! compiled plans). Rather than forcing a logging framework on embedders,
//! it writes to a process-wide slot holding the most recently installed
//! [`Logger`]. When no logger is installed the calls are silent no-ops.
//! Install [`TracingLogger`] to forward everything to `tracing`.

use std::sync::{Arc, RwLock};

/// Minimal logging interface consumed by the pipeline.
pub trait Logger: Send + Sync {
    fn info(&self, msg: &str);
    fn debug(&self, msg: &str);
}

static LOGGER: RwLock<Option<Arc<dyn Logger>>> = RwLock::new(None);

/// Install a logger into the process-wide slot.
///
/// Intended to be called once during startup, before `start`/`run`; the
/// slot is not meant for mid-run swaps.
pub fn set_logger(logger: Arc<dyn Logger>) {
    *LOGGER.write().unwrap() = Some(logger);
}

pub(crate) fn log_info(msg: &str) {
    if let Some(logger) = LOGGER.read().unwrap().as_ref() {
        logger.info(msg);
    }
}

pub(crate) fn log_debug(msg: &str) {
    if let Some(logger) = LOGGER.read().unwrap().as_ref() {
        logger.debug(msg);
    }
}

/// Forwards pipeline log lines to the `tracing` ecosystem.
pub struct TracingLogger;

impl Logger for TracingLogger {
    fn info(&self, msg: &str) {
        tracing::info!("{msg}");
    }

    fn debug(&self, msg: &str) {
        tracing::debug!("{msg}");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    struct CountingLogger {
        infos: AtomicUsize,
        debugs: AtomicUsize,
    }

    impl Logger for CountingLogger {
        fn info(&self, _msg: &str) {
            self.infos.fetch_add(1, Ordering::SeqCst);
        }
        fn debug(&self, _msg: &str) {
            self.debugs.fetch_add(1, Ordering::SeqCst);
        }
    }

    #[test]
    fn installed_logger_receives_messages() {
        let counting = Arc::new(CountingLogger {
            infos: AtomicUsize::new(0),
            debugs: AtomicUsize::new(0),
        });
        set_logger(Arc::clone(&counting) as Arc<dyn Logger>);

        log_info("hello");
        log_debug("world");

        assert_eq!(counting.infos.load(Ordering::SeqCst), 1);
        assert_eq!(counting.debugs.load(Ordering::SeqCst), 1);
    }
}
