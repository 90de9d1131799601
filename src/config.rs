//! Parameters recognized by the group-state engine. Populated by an
//! external loader; this crate never reads a file itself.

use serde::{Deserialize, Serialize};

#[derive(Clone, Copy, Debug, Deserialize, Serialize)]
#[serde(default)]
pub struct Config {
    pub robustness_value: u8,
    pub query_interval_secs: u32,
    pub query_response_interval_secs: u32,
    pub startup_query_interval_secs: u32,
    pub startup_query_count: u8,
    pub last_member_query_interval_secs: u32,
    pub last_member_query_count: u8,
    pub fast_upstream_leave: bool,
}

impl Default for Config {
    fn default() -> Self {
        let robustness_value = 2;
        let query_interval_secs = 125;
        Config {
            robustness_value,
            query_interval_secs,
            query_response_interval_secs: 10,
            startup_query_interval_secs: query_interval_secs / 4,
            startup_query_count: robustness_value,
            last_member_query_interval_secs: 1,
            last_member_query_count: robustness_value,
            fast_upstream_leave: false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_match_rfc2236() {
        let cfg = Config::default();
        assert_eq!(cfg.robustness_value, 2);
        assert_eq!(cfg.query_interval_secs, 125);
        assert_eq!(cfg.startup_query_interval_secs, 31);
        assert_eq!(cfg.startup_query_count, 2);
        assert_eq!(cfg.last_member_query_count, 2);
        assert!(!cfg.fast_upstream_leave);
    }
}
