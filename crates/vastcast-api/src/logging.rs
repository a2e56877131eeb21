//! Structured conversion logging.

use tracing::{error, info, warn, Span};

/// Logs conversion lifecycle events with the job token attached.
#[derive(Debug, Clone)]
pub struct ConversionLogger {
    job_id: String,
    operation: String,
}

impl ConversionLogger {
    pub fn new(job_id: &str, operation: &str) -> Self {
        Self {
            job_id: job_id.to_string(),
            operation: operation.to_string(),
        }
    }

    pub fn log_start(&self, message: &str) {
        info!(
            job_id = %self.job_id,
            operation = %self.operation,
            "Conversion started: {}", message
        );
    }

    pub fn log_progress(&self, message: &str) {
        info!(
            job_id = %self.job_id,
            operation = %self.operation,
            "Conversion progress: {}", message
        );
    }

    pub fn log_warning(&self, message: &str) {
        warn!(
            job_id = %self.job_id,
            operation = %self.operation,
            "Conversion warning: {}", message
        );
    }

    pub fn log_error(&self, message: &str) {
        error!(
            job_id = %self.job_id,
            operation = %self.operation,
            "Conversion error: {}", message
        );
    }

    pub fn log_completion(&self, message: &str) {
        info!(
            job_id = %self.job_id,
            operation = %self.operation,
            "Conversion completed: {}", message
        );
    }

    pub fn job_id(&self) -> &str {
        &self.job_id
    }

}

/// Span that scopes one conversion, from loading the input onward.
/// `job_id` stays empty until artifact names are generated.
pub fn conversion_span(source: &str) -> Span {
    tracing::info_span!("conversion", source = %source, job_id = tracing::field::Empty)
}

/// Record the job token on the enclosing conversion span.
pub fn record_job_id(job_id: &str) {
    Span::current().record("job_id", job_id);
}
