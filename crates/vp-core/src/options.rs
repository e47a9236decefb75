//! Rendering options applied by a proxy when it talks to the server.

use serde::{Deserialize, Serialize};

/// Options fixed when a proxy is built.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ProxyOptions {
    /// Scale the color map over every timestep instead of the current one.
    pub scale_by_all_times: bool,
    /// Visibility sent with every scalar bar refresh.
    pub show_scalar_bar: bool,
}

impl ProxyOptions {
    /// Rescale type understood by the server.
    pub fn rescale_type(&self) -> &'static str {
        if self.scale_by_all_times {
            "time"
        } else {
            "data"
        }
    }
}

impl Default for ProxyOptions {
    fn default() -> Self {
        Self {
            scale_by_all_times: false,
            show_scalar_bar: true,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_scale_by_current_data() {
        let options = ProxyOptions::default();
        assert!(!options.scale_by_all_times);
        assert!(options.show_scalar_bar);
        assert_eq!(options.rescale_type(), "data");
    }

    #[test]
    fn missing_yaml_fields_fall_back_to_defaults() {
        let options: ProxyOptions = serde_yaml::from_str("scale_by_all_times: true").unwrap();
        assert_eq!(options.rescale_type(), "time");
        assert!(options.show_scalar_bar);
    }
}
