pub(crate) const DEFAULT_LISTEN: &str = "127.0.0.1:3001";
pub(crate) const DEFAULT_LOG_LEVEL: &str = "info";
