//! Tokenizing helpers shared by the text-based decoders

use std::collections::BTreeMap;

use spectro_types::{SpectroStatus, StatusMessage};

/// Response bytes as text, surrounding whitespace and line endings removed
///
/// Non-UTF-8 bytes are replaced rather than rejected; the decoders report
/// whatever they cannot understand through the status.
pub fn response_text(raw: &[u8]) -> String {
    String::from_utf8_lossy(raw)
        .trim_end_matches(['\r', '\n'])
        .to_string()
}

/// Split `text` on `delimiter`, trimming every field
pub fn fields(text: &str, delimiter: char) -> Vec<&str> {
    text.split(delimiter).map(str::trim).collect()
}

/// Response split into lines, CR/LF agnostic
///
/// Leading blanks are kept: status lines are read by column.
pub fn lines(text: &str) -> Vec<&str> {
    text.lines().map(str::trim_end).collect()
}

/// Parse spectral samples, one token per wavelength
///
/// The token at `index` belongs to `origin_nm + step_nm * index` whether or
/// not its neighbours parse. Each value is divided by `divisor`. A token
/// that is not a finite number adds one
/// [`StatusMessage::InvalidValue`] warning and is skipped.
pub fn parse_samples<'a, I>(
    tokens: I,
    origin_nm: u32,
    step_nm: u32,
    divisor: f64,
    status: &mut SpectroStatus,
) -> BTreeMap<u32, f64>
where
    I: IntoIterator<Item = &'a str>,
{
    let mut values = BTreeMap::new();

    for (index, token) in tokens.into_iter().enumerate() {
        let wavelength = origin_nm + step_nm * index as u32;

        match token.parse::<f64>() {
            Ok(value) if value.is_finite() => {
                values.insert(wavelength, value / divisor);
            }
            _ => status.add_warning(StatusMessage::InvalidValue {
                wavelength,
                token: token.to_string(),
            }),
        }
    }

    values
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_response_text_trims_line_endings() {
        assert_eq!(response_text(b"OK00,1\r\n"), "OK00,1");
        assert_eq!(response_text(b""), "");
    }

    #[test]
    fn test_response_text_keeps_blank_columns() {
        assert_eq!(response_text(b" 0IOL\r"), " 0IOL");
        assert_eq!(response_text(b"0000000IML \r\n"), "0000000IML ");
        assert_eq!(lines(" LL400\r\n 1.0  \r\n"), vec![" LL400", " 1.0"]);
    }

    #[test]
    fn test_fields() {
        assert_eq!(fields("OK00, 12 ,3", ','), vec!["OK00", "12", "3"]);
        assert_eq!(fields("", ','), vec![""]);
    }

    #[test]
    fn test_lines() {
        assert_eq!(lines("a\r\nb\nc"), vec!["a", "b", "c"]);
    }

    #[test]
    fn test_samples_follow_index() {
        let mut status = SpectroStatus::new();
        let values = parse_samples(["85.00", "50", "12.5"], 400, 10, 100.0, &mut status);

        assert!(status.warnings().is_empty());
        assert_eq!(values.get(&400), Some(&0.85));
        assert_eq!(values.get(&410), Some(&0.5));
        assert_eq!(values.get(&420), Some(&0.125));
    }

    #[test]
    fn test_bad_token_is_one_warning() {
        let mut status = SpectroStatus::new();
        let values = parse_samples(["10", "abc", "30"], 400, 10, 100.0, &mut status);

        assert!(status.is_success());
        assert_eq!(
            status.warnings(),
            &[StatusMessage::InvalidValue {
                wavelength: 410,
                token: "abc".into()
            }]
        );
        assert_eq!(values.keys().copied().collect::<Vec<_>>(), vec![400, 420]);
    }

    #[test]
    fn test_non_finite_rejected() {
        let mut status = SpectroStatus::new();
        let values = parse_samples(["NaN", "inf"], 400, 10, 1.0, &mut status);
        assert!(values.is_empty());
        assert_eq!(status.warnings().len(), 2);
    }
}
