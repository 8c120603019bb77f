use std::env;

#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct ServiceContext {
    pub(crate) service_name: String,
    pub(crate) environment: String,
    pub(crate) component: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum LogFormat {
    Full,
    Compact,
}

#[derive(Debug, Clone)]
pub(crate) struct ObservabilityConfig {
    pub(crate) service_context: ServiceContext,
    pub(crate) format: LogFormat,
    /// Warnings captured during config parsing so they can be logged after tracing is initialized.
    pub(crate) warnings: Vec<String>,
}

impl ObservabilityConfig {
    pub(crate) fn from_env(component: &str) -> Self {
        Self::from_lookup(component, |key| env::var(key).ok())
    }

    pub(crate) fn from_lookup(component: &str, lookup: impl Fn(&str) -> Option<String>) -> Self {
        let component = component.trim().to_string();
        let mut warnings = Vec::new();

        let service_name = lookup("SERVICE_NAME")
            .filter(|v| !v.trim().is_empty())
            .unwrap_or_else(|| component.clone());

        let environment = lookup("STAGE")
            .filter(|v| !v.trim().is_empty())
            .unwrap_or_else(|| "unknown".to_string());

        let format = match lookup("LOG_FORMAT") {
            Some(raw) if !raw.trim().is_empty() => match parse_format(&raw) {
                Some(format) => format,
                None => {
                    warnings.push(format!(
                        "LOG_FORMAT is invalid (value: {raw}); defaulting to full"
                    ));
                    LogFormat::Full
                }
            },
            _ => LogFormat::Full,
        };

        Self {
            service_context: ServiceContext {
                service_name,
                environment,
                component,
            },
            format,
            warnings,
        }
    }
}

fn parse_format(input: &str) -> Option<LogFormat> {
    match input.trim().to_ascii_lowercase().as_str() {
        "full" | "pretty" => Some(LogFormat::Full),
        "compact" => Some(LogFormat::Compact),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn lookup(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key| map.get(key).cloned()
    }

    #[test]
    fn service_name_defaults_to_component() {
        let config = ObservabilityConfig::from_lookup(" worker ", lookup(&[("STAGE", "")]));
        assert_eq!(config.service_context.service_name, "worker");
        assert_eq!(config.service_context.environment, "unknown");
        assert!(config.warnings.is_empty());
    }

    #[test]
    fn invalid_format_falls_back_with_a_warning() {
        let config = ObservabilityConfig::from_lookup(
            "backend",
            lookup(&[("SERVICE_NAME", "procedures-api"), ("LOG_FORMAT", "xml")]),
        );
        assert_eq!(config.service_context.service_name, "procedures-api");
        assert_eq!(config.format, LogFormat::Full);
        assert_eq!(config.warnings.len(), 1);
    }

    #[test]
    fn compact_format_is_recognised() {
        let config =
            ObservabilityConfig::from_lookup("backend", lookup(&[("LOG_FORMAT", "Compact")]));
        assert_eq!(config.format, LogFormat::Compact);
    }
}
