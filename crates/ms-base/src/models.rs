use std::fmt;
use std::str::FromStr;

/// Models offered for the analysis request
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum GeminiModel {
    #[default]
    Flash25,
    Pro25,
    FlashLite25,
    Flash20,
}

impl GeminiModel {
    pub const ALL: [GeminiModel; 4] =
        [GeminiModel::Flash25, GeminiModel::Pro25, GeminiModel::FlashLite25, GeminiModel::Flash20];

    /// API model identifier
    pub fn api_name(self) -> &'static str {
        match self {
            GeminiModel::Flash25 => "gemini-2.5-flash",
            GeminiModel::Pro25 => "gemini-2.5-pro",
            GeminiModel::FlashLite25 => "gemini-2.5-flash-lite",
            GeminiModel::Flash20 => "gemini-2.0-flash",
        }
    }

    /// Human-readable display name
    pub fn display_name(self) -> &'static str {
        match self {
            GeminiModel::Flash25 => "Gemini 2.5 Flash",
            GeminiModel::Pro25 => "Gemini 2.5 Pro",
            GeminiModel::FlashLite25 => "Gemini 2.5 Flash-Lite",
            GeminiModel::Flash20 => "Gemini 2.0 Flash",
        }
    }

    /// Next model in selection order, wrapping around
    pub fn next(self) -> Self {
        let idx = Self::ALL.iter().position(|m| *m == self).unwrap_or(0);
        Self::ALL[(idx + 1) % Self::ALL.len()]
    }
}

impl fmt::Display for GeminiModel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.api_name())
    }
}

impl FromStr for GeminiModel {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .into_iter()
            .find(|m| m.api_name() == s)
            .ok_or_else(|| format!("unknown model '{}' (expected one of: {})", s, Self::ALL.map(|m| m.api_name()).join(", ")))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn next_cycles_through_all() {
        let mut m = GeminiModel::default();
        for _ in 0..GeminiModel::ALL.len() {
            m = m.next();
        }
        assert_eq!(m, GeminiModel::default());
    }

    #[test]
    fn parse_api_name() {
        assert_eq!("gemini-2.5-pro".parse::<GeminiModel>(), Ok(GeminiModel::Pro25));
        assert!("gpt-4".parse::<GeminiModel>().unwrap_err().contains("gemini-2.5-flash"));
    }
}
