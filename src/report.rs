/// Sink for progress and failure messages emitted by the flush pipeline.
pub trait Reporter: Send + Sync {
    fn info(&self, message: &str);
    fn error(&self, message: &str);

    fn debug(&self, _message: &str) {}
}

/// Forwards to the `log` facade.
#[derive(Debug, Default, Clone, Copy)]
pub struct LogReporter;

impl Reporter for LogReporter {
    fn info(&self, message: &str) {
        log::info!("{message}");
    }

    fn error(&self, message: &str) {
        log::error!("{message}");
    }

    fn debug(&self, message: &str) {
        log::debug!("{message}");
    }
}
