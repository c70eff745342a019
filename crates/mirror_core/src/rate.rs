use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum RateParseError {
    #[error("rate limit is empty")]
    Empty,
    #[error("invalid rate limit {0:?}; usage: --rate-limit 200k")]
    Invalid(String),
    #[error("unknown rate limit suffix {0:?}; expected k, m or g")]
    UnknownSuffix(char),
}

/// Parse a rate such as `400k`, `2M`, `1.5m` or `800` into bytes per second.
///
/// Suffixes are decimal multipliers (k = 1000). A bare number is bytes.
pub fn parse_rate(input: &str) -> Result<u64, RateParseError> {
    let trimmed = input.trim();
    let Some(last) = trimmed.chars().last() else {
        return Err(RateParseError::Empty);
    };

    let (number, multiplier) = if last.is_ascii_digit() || last == '.' {
        (trimmed, 1.0)
    } else {
        let multiplier = match last.to_ascii_lowercase() {
            'b' => 1.0,
            'k' => 1e3,
            'm' => 1e6,
            'g' => 1e9,
            other => return Err(RateParseError::UnknownSuffix(other)),
        };
        (&trimmed[..trimmed.len() - last.len_utf8()], multiplier)
    };

    let value: f64 = number
        .trim()
        .parse()
        .map_err(|_| RateParseError::Invalid(trimmed.to_string()))?;
    if !value.is_finite() || value <= 0.0 {
        return Err(RateParseError::Invalid(trimmed.to_string()));
    }
    let bytes = (value * multiplier) as u64;
    if bytes == 0 {
        return Err(RateParseError::Invalid(trimmed.to_string()));
    }
    Ok(bytes)
}

/// Human-readable byte count using the same decimal base as [`parse_rate`].
pub fn format_bytes(bytes: u64) -> String {
    const UNITS: [(&str, f64); 3] = [("GB", 1e9), ("MB", 1e6), ("kB", 1e3)];
    let value = bytes as f64;
    for (unit, size) in UNITS {
        if value >= size * 0.85 {
            return format!("{:.1} {unit}", value / size);
        }
    }
    format!("{bytes} B")
}
