//! `rootMargin` parsing (CSS margin shorthand).
//!
//! Accepts one to four lengths, each in `px` or `%`, mapped the CSS way:
//!
//! | Values | Mapping                          |
//! |--------|----------------------------------|
//! | 1      | all sides                        |
//! | 2      | vertical, horizontal             |
//! | 3      | top, horizontal, bottom          |
//! | 4      | top, right, bottom, left         |

use std::fmt;
use std::str::FromStr;

/// A single margin length.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Length {
    Px(f64),
    /// Percentage of the root box dimension on the same axis.
    Percent(f64),
}

impl Length {
    /// Resolve to pixels against the root box dimension on the same axis.
    #[inline]
    pub fn resolve(self, basis: f64) -> f64 {
        match self {
            Self::Px(px) => px,
            Self::Percent(pct) => basis * pct / 100.0,
        }
    }
}

impl FromStr for Length {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let parse = |num: &str| {
            num.parse::<f64>()
                .ok()
                .filter(|n| n.is_finite())
                .ok_or_else(|| format!("invalid length `{s}`"))
        };

        if let Some(num) = s.strip_suffix("px") {
            parse(num).map(Self::Px)
        } else if let Some(num) = s.strip_suffix('%') {
            parse(num).map(Self::Percent)
        } else if s == "0" {
            Ok(Self::Px(0.0))
        } else {
            Err(format!("length `{s}` must end in `px` or `%`"))
        }
    }
}

impl fmt::Display for Length {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Px(px) => write!(f, "{px}px"),
            Self::Percent(pct) => write!(f, "{pct}%"),
        }
    }
}

/// Margin added around the intersection root box.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RootMargin {
    pub top: Length,
    pub right: Length,
    pub bottom: Length,
    pub left: Length,
}

impl Default for RootMargin {
    fn default() -> Self {
        Self::uniform(Length::Px(0.0))
    }
}

impl RootMargin {
    pub const fn uniform(length: Length) -> Self {
        Self {
            top: length,
            right: length,
            bottom: length,
            left: length,
        }
    }
}

impl FromStr for RootMargin {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let values = s
            .split_whitespace()
            .map(str::parse::<Length>)
            .collect::<Result<Vec<_>, _>>()?;

        match values.as_slice() {
            [all] => Ok(Self::uniform(*all)),
            [vertical, horizontal] => Ok(Self {
                top: *vertical,
                right: *horizontal,
                bottom: *vertical,
                left: *horizontal,
            }),
            [top, horizontal, bottom] => Ok(Self {
                top: *top,
                right: *horizontal,
                bottom: *bottom,
                left: *horizontal,
            }),
            [top, right, bottom, left] => Ok(Self {
                top: *top,
                right: *right,
                bottom: *bottom,
                left: *left,
            }),
            [] => Err("expected at least one length".to_string()),
            _ => Err(format!("expected at most 4 lengths, found {}", values.len())),
        }
    }
}

impl fmt::Display for RootMargin {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {} {} {}", self.top, self.right, self.bottom, self.left)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_single_value() {
        let margin: RootMargin = "200px".parse().unwrap();
        assert_eq!(margin, RootMargin::uniform(Length::Px(200.0)));
    }

    #[test]
    fn test_parse_shorthand_mapping() {
        let margin: RootMargin = "10px 5%".parse().unwrap();
        assert_eq!(margin.top, Length::Px(10.0));
        assert_eq!(margin.bottom, Length::Px(10.0));
        assert_eq!(margin.left, Length::Percent(5.0));
        assert_eq!(margin.right, Length::Percent(5.0));

        let margin: RootMargin = "1px 2px 3px".parse().unwrap();
        assert_eq!(margin.top, Length::Px(1.0));
        assert_eq!(margin.right, Length::Px(2.0));
        assert_eq!(margin.bottom, Length::Px(3.0));
        assert_eq!(margin.left, Length::Px(2.0));

        let margin: RootMargin = "0px -4px 0 8px".parse().unwrap();
        assert_eq!(margin.right, Length::Px(-4.0));
        assert_eq!(margin.bottom, Length::Px(0.0));
        assert_eq!(margin.left, Length::Px(8.0));
    }

    #[test]
    fn test_parse_rejects_bad_input() {
        assert!("".parse::<RootMargin>().is_err());
        assert!("10em".parse::<RootMargin>().is_err());
        assert!("1px 2px 3px 4px 5px".parse::<RootMargin>().is_err());
        assert!("pxpx".parse::<RootMargin>().is_err());
    }

    #[test]
    fn test_percent_resolves_against_basis() {
        assert_eq!(Length::Percent(50.0).resolve(800.0), 400.0);
        assert_eq!(Length::Px(12.0).resolve(800.0), 12.0);
    }

    #[test]
    fn test_display_round_trip() {
        let margin = RootMargin::default();
        assert_eq!(margin.to_string(), "0px 0px 0px 0px");
    }
}
