use crate::config::PollConfig;

/// State shared by the components of one run: the configuration and the
/// user-visible warning log. Created per invocation and dropped at the end.
#[derive(Debug)]
pub struct RunContext {
    config: PollConfig,
    warnings: Vec<String>,
}

impl RunContext {
    pub fn new(config: PollConfig) -> Self {
        Self {
            config,
            warnings: Vec::new(),
        }
    }

    pub fn config(&self) -> &PollConfig {
        &self.config
    }

    /// Record a non-terminal problem. It is logged and kept for publishing.
    pub fn warn(&mut self, message: impl Into<String>) {
        let message = message.into();
        log::warn!("{}", message);
        self.warnings.push(message);
    }

    pub fn warnings(&self) -> &[String] {
        &self.warnings
    }

    pub fn take_warnings(&mut self) -> Vec<String> {
        std::mem::take(&mut self.warnings)
    }
}

impl Default for RunContext {
    fn default() -> Self {
        Self::new(PollConfig::default())
    }
}
