/// Message output trait definition for host output plugins
use crate::error::{BatchError, OutputError};
use crate::output::message::LogMessage;

/// Trait implemented by message outputs.
///
/// This is the host's output-plugin lifecycle contract: the host constructs
/// an output once, pushes messages at it one at a time or in batches,
/// queries liveness, and stops it exactly once when the output is removed.
/// The host's message-output framework does not guarantee single-threaded
/// access, so implementations must tolerate concurrent `write` calls.
///
/// # Example
///
/// ```
/// use xmpp_output::output::{LogMessage, MessageOutput};
/// use xmpp_output::OutputError;
///
/// struct StdoutOutput;
///
/// impl MessageOutput for StdoutOutput {
///     fn name(&self) -> String {
///         "stdout".to_string()
///     }
///
///     fn write(&self, message: &LogMessage) -> Result<(), OutputError> {
///         println!("{:?}", message);
///         Ok(())
///     }
///
///     fn stop(&self) {}
///
///     fn is_running(&self) -> bool {
///         true
///     }
/// }
/// ```
pub trait MessageOutput: Send + Sync {
    /// Returns the display name of the output.
    fn name(&self) -> String;

    /// Forward a single message.
    ///
    /// A failed message is dropped, not queued; the error tells the caller
    /// why.
    fn write(&self, message: &LogMessage) -> Result<(), OutputError>;

    /// Forward a batch of messages in input order.
    ///
    /// Best-effort: an error on one message does not prevent attempting the
    /// remaining messages. Failures are collected per input index.
    fn write_batch(&self, messages: &[LogMessage]) -> Result<(), BatchError> {
        let mut failures = Vec::new();
        for (index, message) in messages.iter().enumerate() {
            if let Err(error) = self.write(message) {
                failures.push((index, error));
            }
        }
        if failures.is_empty() {
            Ok(())
        } else {
            Err(BatchError {
                attempted: messages.len(),
                failures,
            })
        }
    }

    /// Stop the output and release its resources.
    ///
    /// Called at most once by the host; implementations should tolerate a
    /// second call anyway.
    fn stop(&self);

    /// Whether the output currently believes it can deliver messages.
    fn is_running(&self) -> bool;
}
