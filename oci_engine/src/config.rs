use crate::error::{OciError, Result};
use crate::protocol::FetchStyle;
use serde::Deserialize;

pub const ENV_NUMBER_ARRAY_TYPE: &str = "OCI_ENGINE_NUMBER_ARRAY_TYPE";
pub const ENV_CHAR_ARRAY_TYPE: &str = "OCI_ENGINE_CHAR_ARRAY_TYPE";
pub const ENV_DEBUG_PARAMETER: &str = "OCI_ENGINE_DEBUG_PARAMETER";
pub const ENV_STRICT_ERRATA: &str = "OCI_ENGINE_STRICT_ERRATA";
pub const ENV_FETCH_STYLE: &str = "OCI_ENGINE_FETCH_STYLE";

/// Statement engine settings.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    /// Collection type used for numeric array binds.
    pub number_array_type: String,
    /// Collection type used for character array binds.
    pub char_array_type: String,
    /// Reserved parameter name that switches on bind logging and is never
    /// sent to the server.
    pub debug_parameter: String,
    /// Reject unknown errata instead of binding them as characters.
    pub strict_errata: bool,
    pub default_fetch_style: FetchStyle,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            number_array_type: "T_ARRNUM".to_string(),
            char_array_type: "T_ARRCHAR".to_string(),
            debug_parameter: "p_DEBUG".to_string(),
            strict_errata: false,
            default_fetch_style: FetchStyle::Associative,
        }
    }
}

pub(crate) fn parse_env_bool(raw: &str) -> Option<bool> {
    let normalized = raw.trim().to_lowercase();
    if normalized.is_empty() {
        return None;
    }

    match normalized.as_str() {
        "1" | "true" | "yes" | "y" => Some(true),
        "0" | "false" | "no" | "n" => Some(false),
        _ => None,
    }
}

fn env_string(key: &str) -> Option<String> {
    std::env::var(key).ok().filter(|s| !s.trim().is_empty())
}

impl EngineConfig {
    pub fn from_json(raw: &str) -> Result<Self> {
        let config: Self = serde_json::from_str(raw)?;
        config.validate()?;
        Ok(config)
    }

    /// Defaults overridden by `OCI_ENGINE_*` environment variables.
    pub fn from_env() -> Result<Self> {
        let mut config = Self::default();

        if let Some(v) = env_string(ENV_NUMBER_ARRAY_TYPE) {
            config.number_array_type = v;
        }
        if let Some(v) = env_string(ENV_CHAR_ARRAY_TYPE) {
            config.char_array_type = v;
        }
        if let Some(v) = env_string(ENV_DEBUG_PARAMETER) {
            config.debug_parameter = v;
        }
        if let Some(v) = env_string(ENV_STRICT_ERRATA) {
            config.strict_errata = parse_env_bool(&v).ok_or_else(|| {
                OciError::Config(format!("{} must be a boolean, got {:?}", ENV_STRICT_ERRATA, v))
            })?;
        }
        if let Some(v) = env_string(ENV_FETCH_STYLE) {
            config.default_fetch_style = v.parse().map_err(OciError::Config)?;
        }

        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<()> {
        if self.number_array_type.trim().is_empty() || self.char_array_type.trim().is_empty() {
            return Err(OciError::Config(
                "collection type names must not be empty".to_string(),
            ));
        }
        if self.default_fetch_style == FetchStyle::Column {
            return Err(OciError::Config(
                "column is not a valid default fetch style".to_string(),
            ));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serial_test::serial;

    fn clear_env() {
        for key in [
            ENV_NUMBER_ARRAY_TYPE,
            ENV_CHAR_ARRAY_TYPE,
            ENV_DEBUG_PARAMETER,
            ENV_STRICT_ERRATA,
            ENV_FETCH_STYLE,
        ] {
            std::env::remove_var(key);
        }
    }

    #[test]
    fn test_defaults() {
        let config = EngineConfig::default();
        assert_eq!(config.number_array_type, "T_ARRNUM");
        assert_eq!(config.char_array_type, "T_ARRCHAR");
        assert_eq!(config.debug_parameter, "p_DEBUG");
        assert!(!config.strict_errata);
        assert_eq!(config.default_fetch_style, FetchStyle::Associative);
    }

    #[test]
    fn test_from_json_partial_uses_defaults() {
        let config =
            EngineConfig::from_json(r#"{"strict_errata": true, "default_fetch_style": "object"}"#)
                .unwrap();
        assert!(config.strict_errata);
        assert_eq!(config.default_fetch_style, FetchStyle::Object);
        assert_eq!(config.number_array_type, "T_ARRNUM");
    }

    #[test]
    fn test_from_json_rejects_column_default() {
        let err = EngineConfig::from_json(r#"{"default_fetch_style": "column"}"#).unwrap_err();
        assert!(matches!(err, OciError::Config(_)));
    }

    #[test]
    fn test_from_json_invalid() {
        assert!(EngineConfig::from_json("{not json").is_err());
    }

    #[test]
    fn test_parse_env_bool() {
        assert_eq!(parse_env_bool("YES"), Some(true));
        assert_eq!(parse_env_bool(" 0 "), Some(false));
        assert_eq!(parse_env_bool(""), None);
        assert_eq!(parse_env_bool("maybe"), None);
    }

    #[test]
    #[serial]
    fn test_from_env_overrides() {
        clear_env();
        std::env::set_var(ENV_NUMBER_ARRAY_TYPE, "NUM_TAB");
        std::env::set_var(ENV_STRICT_ERRATA, "true");
        std::env::set_var(ENV_FETCH_STYLE, "num");

        let config = EngineConfig::from_env().unwrap();
        assert_eq!(config.number_array_type, "NUM_TAB");
        assert!(config.strict_errata);
        assert_eq!(config.default_fetch_style, FetchStyle::Indexed);
        assert_eq!(config.char_array_type, "T_ARRCHAR");
        clear_env();
    }

    #[test]
    #[serial]
    fn test_from_env_invalid_bool() {
        clear_env();
        std::env::set_var(ENV_STRICT_ERRATA, "sometimes");
        assert!(matches!(EngineConfig::from_env(), Err(OciError::Config(_))));
        clear_env();
    }
}
