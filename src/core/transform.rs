//! Normalization rules shared by the source transforms.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Placeholder stored when a launch has no description.
pub const MISSING_DETAILS: &str = "Aucun détail fourni pour cette mission.";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AspectFormat {
    Square,
    Landscape,
    Portrait,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Trend {
    Up,
    Down,
    /// Manually created entry without market history.
    New,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum Category {
    TopTier,
    Other,
    MemeCoin,
    Portfolio,
}

impl Category {
    pub const ALL: [Category; 4] = [
        Category::TopTier,
        Category::Other,
        Category::MemeCoin,
        Category::Portfolio,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Category::TopTier => "top-tier",
            Category::Other => "other",
            Category::MemeCoin => "meme-coin",
            Category::Portfolio => "portfolio",
        }
    }
}

impl fmt::Display for Category {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Category {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        Category::ALL
            .into_iter()
            .find(|c| c.as_str() == s.trim())
            .ok_or_else(|| {
                let allowed: Vec<&str> = Category::ALL.iter().map(Category::as_str).collect();
                format!("unknown category '{}', expected one of {}", s, allowed.join(", "))
            })
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LaunchStatus {
    Success,
    Failure,
}

pub fn round2(value: f64) -> f64 {
    (value * 100.0).round() / 100.0
}

/// Classifies `width / height`. Missing or non-positive sides count as 1.
/// Returns the format and the ratio rounded to two decimals.
pub fn classify_aspect(width: Option<f64>, height: Option<f64>) -> (AspectFormat, f64) {
    let w = width.filter(|w| w.is_finite() && *w > 0.0).unwrap_or(1.0);
    let h = height.filter(|h| h.is_finite() && *h > 0.0).unwrap_or(1.0);
    let ratio = w / h;

    let format = if (0.9..=1.1).contains(&ratio) {
        AspectFormat::Square
    } else if ratio > 1.1 {
        AspectFormat::Landscape
    } else {
        AspectFormat::Portrait
    };

    (format, round2(ratio))
}

/// A change of exactly zero is `Down`.
pub fn classify_trend(change_24h: Option<f64>) -> Trend {
    if change_24h.unwrap_or(0.0) > 0.0 {
        Trend::Up
    } else {
        Trend::Down
    }
}

/// Ranks 1..=10 are top tier; an unranked coin is `Other`.
pub fn classify_tier(rank: Option<u64>) -> Category {
    match rank {
        Some(rank) if rank <= 10 => Category::TopTier,
        _ => Category::Other,
    }
}

pub fn classify_status(success: bool) -> LaunchStatus {
    if success {
        LaunchStatus::Success
    } else {
        LaunchStatus::Failure
    }
}

pub fn details_or_placeholder(details: Option<&str>) -> String {
    match details.map(str::trim) {
        Some(text) if !text.is_empty() => text.to_string(),
        _ => MISSING_DETAILS.to_string(),
    }
}
