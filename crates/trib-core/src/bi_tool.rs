//! Supported BI tools whose query history can be mined for dashboards

use crate::error::CoreError;
use serde::{Deserialize, Serialize};

/// BI tool type
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum BiTool {
    Mode,
    Tableau,
    Metabase,
}

impl BiTool {
    /// All supported tools
    pub const ALL: [BiTool; 3] = [BiTool::Mode, BiTool::Tableau, BiTool::Metabase];
}

impl std::fmt::Display for BiTool {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            BiTool::Mode => write!(f, "Mode"),
            BiTool::Tableau => write!(f, "Tableau"),
            BiTool::Metabase => write!(f, "Metabase"),
        }
    }
}

impl std::str::FromStr for BiTool {
    type Err = CoreError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        BiTool::ALL
            .into_iter()
            .find(|tool| tool.to_string().eq_ignore_ascii_case(s))
            .ok_or_else(|| CoreError::InvalidVariant {
                kind: "BI tool",
                value: s.to_string(),
            })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_case_insensitive() {
        assert_eq!("mode".parse::<BiTool>().unwrap(), BiTool::Mode);
        assert_eq!("TABLEAU".parse::<BiTool>().unwrap(), BiTool::Tableau);
        assert_eq!("Metabase".parse::<BiTool>().unwrap(), BiTool::Metabase);
        assert!("looker".parse::<BiTool>().is_err());
    }
}
