//! Normalization of pit-stop duration strings.
//!
//! The results API reports short stops as plain seconds (`"22.814"`) and long
//! ones as `minutes:seconds` (`"1:02.311"`). Anything with more than one colon
//! would be a stop of over an hour, which is not a meaningful pit stop.

use crate::parser::ParseError;

/// Converts a duration string to seconds.
///
/// Returns `Ok(None)` for missing input and for durations with more than one
/// colon. Fails when the text is not numeric.
pub fn parse_duration(text: Option<&str>) -> Result<Option<f64>, ParseError> {
    let Some(text) = text else {
        return Ok(None);
    };

    let invalid = || ParseError::InvalidDuration(text.to_string());

    match text.matches(':').count() {
        0 => text
            .trim()
            .parse::<f64>()
            .map(Some)
            .map_err(|_| invalid()),
        1 => {
            let (minutes, seconds) = text.split_once(':').ok_or_else(invalid)?;
            let minutes = minutes.trim().parse::<f64>().map_err(|_| invalid())?;
            let seconds = seconds.trim().parse::<f64>().map_err(|_| invalid())?;
            Ok(Some(minutes * 60.0 + seconds))
        }
        _ => Ok(None),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn seconds(text: &str) -> f64 {
        parse_duration(Some(text))
            .expect("should parse")
            .expect("should have a value")
    }

    #[test]
    fn test_plain_seconds() {
        assert!((seconds("92.3") - 92.3).abs() < 1e-9);
        assert!((seconds("22.814") - 22.814).abs() < 1e-9);
    }

    #[test]
    fn test_minutes_and_seconds() {
        assert!((seconds("1:32.3") - 92.3).abs() < 1e-9);
        assert!((seconds("0:21.5") - 21.5).abs() < 1e-9);
    }

    #[test]
    fn test_over_an_hour_has_no_value() {
        assert_eq!(parse_duration(Some("1:02:03")).unwrap(), None);
    }

    #[test]
    fn test_missing_input_passes_through() {
        assert_eq!(parse_duration(None).unwrap(), None);
    }

    #[test]
    fn test_non_numeric_is_an_error() {
        assert!(matches!(
            parse_duration(Some("n/a")),
            Err(ParseError::InvalidDuration(_))
        ));
        assert!(parse_duration(Some("22.1|23.4")).is_err());
        assert!(parse_duration(Some("x:12.0")).is_err());
    }
}
