use crate::native::BindType;
use log::Level;

/// Statement-level log helper. Disabled loggers are silent, so call sites do
/// not need to check the flag themselves.
#[derive(Debug, Clone, Copy)]
pub struct StructuredLogger {
    enabled: bool,
}

impl StructuredLogger {
    pub fn new(enabled: bool) -> Self {
        Self { enabled }
    }

    pub fn is_enabled(&self) -> bool {
        self.enabled
    }

    pub fn log_statement(&self, level: Level, action: &str, sql: &str) {
        if !self.enabled {
            return;
        }

        log::log!(level, "Statement {}: {}", action, sql);
    }

    pub fn log_bind(&self, name: &str, bind_type: BindType, max_length: i64, detail: &str) {
        if !self.enabled {
            return;
        }

        log::debug!(
            "Bind :{} type={:?}({}) max_length={} value={}",
            name,
            bind_type,
            bind_type.code(),
            max_length,
            detail
        );
    }

    pub fn log_error(&self, action: &str, error: &str) {
        if !self.enabled {
            return;
        }

        log::error!("Error during {}: {}", action, error);
    }
}

impl Default for StructuredLogger {
    fn default() -> Self {
        Self::new(true)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_structured_logger_new() {
        let logger = StructuredLogger::new(true);
        assert!(logger.is_enabled());
    }

    #[test]
    fn test_structured_logger_default() {
        let logger = StructuredLogger::default();
        assert!(logger.is_enabled());
    }

    #[test]
    fn test_structured_logger_disabled() {
        let logger = StructuredLogger::new(false);
        assert!(!logger.is_enabled());
        logger.log_statement(Level::Info, "prepare", "SELECT 1 FROM dual");
        logger.log_bind("x", BindType::Chr, -1, "hello");
        logger.log_error("execute", "ORA-00942");
    }

    #[test]
    fn test_log_levels_enabled() {
        let logger = StructuredLogger::new(true);
        logger.log_statement(Level::Debug, "execute", "SELECT 1 FROM dual");
        logger.log_statement(Level::Trace, "execute", "SELECT 1 FROM dual");
        logger.log_bind("out_cur", BindType::Rset, -1, "cursor");
        logger.log_error("fetch", "fetch out of sequence");
    }
}
