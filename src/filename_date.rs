use crate::error::UploaderError;
use chrono::NaiveDateTime;
use std::path::Path;

/// Layout of the timestamp embedded in recording file names
pub const FILENAME_DATE_FORMAT: &str = "%Y-%m-%d_%H-%M-%S";

/// Layout used when the timestamp is shown in titles and descriptions
pub const DISPLAY_DATE_FORMAT: &str = "%Y-%m-%d %H:%M:%S";

// "YYYY-MM-DD_hh-mm-ss": separator positions, every other byte is a digit
const SEPARATORS: [(usize, u8); 5] = [(4, b'-'), (7, b'-'), (10, b'_'), (13, b'-'), (16, b'-')];
const STAMP_LEN: usize = 19;

/// Parse the recording timestamp from a path such as `ouP-2021-02-11_12-27-41.avi`.
///
/// `prefix` is removed when the file stem starts with it. The remainder must
/// be exactly `YYYY-MM-DD_hh-mm-ss` and a real calendar date and time.
pub fn parse_video_date(path: &Path, prefix: &str) -> Result<NaiveDateTime, UploaderError> {
    let stem = path
        .file_stem()
        .and_then(|s| s.to_str())
        .ok_or_else(|| UploaderError::DateParse {
            input: path.display().to_string(),
            reason: "file name is empty or not valid UTF-8".to_string(),
        })?;

    let stamp = stem.strip_prefix(prefix).unwrap_or(stem);

    let invalid = |reason: &str| UploaderError::DateParse {
        input: stamp.to_string(),
        reason: reason.to_string(),
    };

    if stamp.len() != STAMP_LEN {
        return Err(invalid("expected the layout YYYY-MM-DD_hh-mm-ss"));
    }

    let bytes = stamp.as_bytes();
    for (i, byte) in bytes.iter().enumerate() {
        let ok = match SEPARATORS.iter().find(|(pos, _)| *pos == i) {
            Some((_, sep)) => byte == sep,
            None => byte.is_ascii_digit(),
        };
        if !ok {
            return Err(invalid("expected the layout YYYY-MM-DD_hh-mm-ss"));
        }
    }

    NaiveDateTime::parse_from_str(stamp, FILENAME_DATE_FORMAT)
        .map_err(|e| invalid(&format!("not a valid date and time ({})", e)))
}

pub fn format_video_date(date: &NaiveDateTime) -> String {
    date.format(DISPLAY_DATE_FORMAT).to_string()
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Datelike, Timelike};

    fn parse(name: &str) -> Result<NaiveDateTime, UploaderError> {
        parse_video_date(Path::new(name), "ouP-")
    }

    #[test]
    fn parses_prefixed_recording_name() {
        let date = parse("/recordings/ouP-2021-02-11_12-27-41.avi").unwrap();

        assert_eq!((date.year(), date.month(), date.day()), (2021, 2, 11));
        assert_eq!((date.hour(), date.minute(), date.second()), (12, 27, 41));
        assert_eq!(format_video_date(&date), "2021-02-11 12:27:41");
    }

    #[test]
    fn prefix_is_optional() {
        let date = parse("2020-12-31_23-59-59.mp4").unwrap();
        assert_eq!(format_video_date(&date), "2020-12-31 23:59:59");
    }

    #[test]
    fn prefix_is_only_stripped_at_the_start() {
        assert!(parse("2021-02-11_12-27-41ouP-.avi").is_err());
    }

    #[test]
    fn formatting_round_trips_the_numeric_fields() {
        for stamp in [
            "2021-02-11_12-27-41",
            "1999-01-01_00-00-00",
            "2024-02-29_06-05-04",
        ] {
            let date = parse(&format!("ouP-{}.avi", stamp)).unwrap();
            assert_eq!(date.format(FILENAME_DATE_FORMAT).to_string(), stamp);
        }
    }

    #[test]
    fn rejects_names_without_a_timestamp() {
        for name in [
            "random.mp4",
            "ouP-2021-13-40_99-99-99.avi",
            "ouP-2021-2-11_12-27-41.avi",
            "ouP-2021-02-11 12-27-41.avi",
            "ouP-2021-02-11_12-27-4x.avi",
            "ouP-+021-02-11_12-27-41.avi",
            "ouP-2023-02-29_12-00-00.avi",
            "ouP-2021-02-11_12-27-41-extra.avi",
            "ouP-.avi",
        ] {
            assert!(
                matches!(parse(name), Err(UploaderError::DateParse { .. })),
                "{name} should not parse"
            );
        }
    }
}
