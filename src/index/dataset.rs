//! UnicodeData.txt parsing
//!
//! Each line is one record of semicolon-separated fields. Only three fields
//! matter here: the hexadecimal code point (field 0), the character name
//! (field 1) and the Unicode 1.0 name (field 10), which serves as the
//! alternate name. Some names are placeholders in angle brackets:
//! `<control>` for control characters and `<..., First>` / `<..., Last>`
//! pairs delimiting ranges whose names are derived algorithmically.

use crate::error::{CharFinderError, Result};

pub const CODE_POINT_FIELD: usize = 0;
pub const NAME_FIELD: usize = 1;
pub const ALTERNATE_NAME_FIELD: usize = 10;
/// Records with fewer fields than this are malformed
pub const MIN_FIELDS: usize = ALTERNATE_NAME_FIELD + 1;

const MAX_CODE_POINT: u32 = 0x10FFFF;

/// One well-formed dataset line
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DatasetRecord {
    /// 1-based line number in the source text
    pub line: usize,
    pub code_point: u32,
    pub name: String,
    pub alternate_name: Option<String>,
}

/// How a record's name field should be interpreted
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NameKind<'a> {
    /// A real character name
    Literal(&'a str),
    /// `<control>`; the alternate name is the only usable name
    Control,
    /// `<Label, First>`
    RangeStart(&'a str),
    /// `<Label, Last>`
    RangeEnd(&'a str),
    /// Any other bracketed placeholder
    Placeholder(&'a str),
}

impl DatasetRecord {
    pub fn name_kind(&self) -> NameKind<'_> {
        let Some(inner) = self
            .name
            .strip_prefix('<')
            .and_then(|rest| rest.strip_suffix('>'))
        else {
            return NameKind::Literal(&self.name);
        };

        if inner == "control" {
            NameKind::Control
        } else if let Some(label) = inner.strip_suffix(", First") {
            NameKind::RangeStart(label)
        } else if let Some(label) = inner.strip_suffix(", Last") {
            NameKind::RangeEnd(label)
        } else {
            NameKind::Placeholder(inner)
        }
    }
}

/// Parse one line. Blank lines and `#` comments yield `Ok(None)`.
pub fn parse_line(line_number: usize, line: &str) -> Result<Option<DatasetRecord>> {
    let line = line.trim();
    if line.is_empty() || line.starts_with('#') {
        return Ok(None);
    }

    let malformed = |reason: String| CharFinderError::DatasetFormat {
        line: line_number,
        reason,
    };

    let fields: Vec<&str> = line.split(';').collect();
    if fields.len() < MIN_FIELDS {
        return Err(malformed(format!(
            "expected at least {MIN_FIELDS} fields, found {}",
            fields.len()
        )));
    }

    let code_hex = fields[CODE_POINT_FIELD].trim();
    if code_hex.is_empty() {
        return Err(malformed("missing code point".to_string()));
    }
    let code_point = u32::from_str_radix(code_hex, 16)
        .ok()
        .filter(|cp| *cp <= MAX_CODE_POINT)
        .ok_or_else(|| malformed(format!("invalid code point {code_hex:?}")))?;

    let name = fields[NAME_FIELD].trim();
    if name.is_empty() {
        return Err(malformed(format!("missing name for U+{code_point:04X}")));
    }

    let alternate_name = Some(fields[ALTERNATE_NAME_FIELD].trim())
        .filter(|alt| !alt.is_empty())
        .map(str::to_string);

    Ok(Some(DatasetRecord {
        line: line_number,
        code_point,
        name: name.to_string(),
        alternate_name,
    }))
}

/// Lazily parse every line of `text`
pub fn records(text: &str) -> impl Iterator<Item = Result<DatasetRecord>> + '_ {
    text.lines()
        .enumerate()
        .filter_map(|(idx, line)| parse_line(idx + 1, line).transpose())
}

/// Like [`records`] for raw file contents. A line that is not valid UTF-8 is
/// a malformed record; the rest of the file is still parsed.
pub fn records_from_bytes(bytes: &[u8]) -> impl Iterator<Item = Result<DatasetRecord>> + '_ {
    bytes
        .split(|byte| *byte == b'\n')
        .enumerate()
        .map(|(idx, line)| (idx, line.strip_suffix(b"\r").unwrap_or(line)))
        .filter_map(|(idx, line)| match std::str::from_utf8(line) {
            Ok(line) => parse_line(idx + 1, line).transpose(),
            Err(e) => Some(Err(CharFinderError::DatasetFormat {
                line: idx + 1,
                reason: format!("invalid UTF-8 at byte {}", e.valid_up_to()),
            })),
        })
}

/// Name prefix for algorithmically named ranges, `None` for unnamed ranges
/// such as private use areas and surrogates
pub(crate) fn range_name_prefix(label: &str) -> Option<RangeNaming> {
    if label.starts_with("CJK Ideograph") {
        Some(RangeNaming::Prefixed("CJK UNIFIED IDEOGRAPH-"))
    } else if label.starts_with("Tangut Ideograph") {
        Some(RangeNaming::Prefixed("TANGUT IDEOGRAPH-"))
    } else if label.starts_with("Khitan Small Script") {
        Some(RangeNaming::Prefixed("KHITAN SMALL SCRIPT CHARACTER-"))
    } else if label.starts_with("Nushu Character") {
        Some(RangeNaming::Prefixed("NUSHU CHARACTER-"))
    } else if label == "Hangul Syllable" {
        Some(RangeNaming::HangulSyllable)
    } else {
        None
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum RangeNaming {
    Prefixed(&'static str),
    HangulSyllable,
}

impl RangeNaming {
    pub(crate) fn name_for(self, code_point: u32) -> Option<String> {
        match self {
            Self::Prefixed(prefix) => Some(format!("{prefix}{code_point:04X}")),
            Self::HangulSyllable => hangul_syllable_name(code_point),
        }
    }
}

const HANGUL_S_BASE: u32 = 0xAC00;
const HANGUL_V_COUNT: u32 = 21;
const HANGUL_T_COUNT: u32 = 28;
const HANGUL_N_COUNT: u32 = HANGUL_V_COUNT * HANGUL_T_COUNT;
const HANGUL_S_COUNT: u32 = 19 * HANGUL_N_COUNT;

const JAMO_L: [&str; 19] = [
    "G", "GG", "N", "D", "DD", "R", "M", "B", "BB", "S", "SS", "", "J", "JJ", "C", "K", "T", "P",
    "H",
];
const JAMO_V: [&str; 21] = [
    "A", "AE", "YA", "YAE", "EO", "E", "YEO", "YE", "O", "WA", "WAE", "OE", "YO", "U", "WEO",
    "WE", "WI", "YU", "EU", "YI", "I",
];
const JAMO_T: [&str; 28] = [
    "", "G", "GG", "GS", "N", "NJ", "NH", "D", "L", "LG", "LM", "LB", "LS", "LT", "LP", "LH", "M",
    "B", "BS", "S", "SS", "NG", "J", "C", "K", "T", "P", "H",
];

/// Algorithmic name of a precomposed Hangul syllable (Unicode §3.12)
pub fn hangul_syllable_name(code_point: u32) -> Option<String> {
    let s_index = code_point.checked_sub(HANGUL_S_BASE)?;
    if s_index >= HANGUL_S_COUNT {
        return None;
    }
    let l = (s_index / HANGUL_N_COUNT) as usize;
    let v = ((s_index % HANGUL_N_COUNT) / HANGUL_T_COUNT) as usize;
    let t = (s_index % HANGUL_T_COUNT) as usize;
    Some(format!(
        "HANGUL SYLLABLE {}{}{}",
        JAMO_L[l], JAMO_V[v], JAMO_T[t]
    ))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_named_record() {
        let record = parse_line(7, "2603;SNOWMAN;So;0;ON;;;;;N;;;;;").unwrap().unwrap();
        assert_eq!(record.line, 7);
        assert_eq!(record.code_point, 0x2603);
        assert_eq!(record.name, "SNOWMAN");
        assert_eq!(record.alternate_name, None);
        assert_eq!(record.name_kind(), NameKind::Literal("SNOWMAN"));
    }

    #[test]
    fn test_parse_alternate_name() {
        let record = parse_line(1, "00A6;BROKEN BAR;So;0;ON;;;;;N;BROKEN VERTICAL BAR;;;;")
            .unwrap()
            .unwrap();
        assert_eq!(record.alternate_name.as_deref(), Some("BROKEN VERTICAL BAR"));
    }

    #[test]
    fn test_control_and_range_markers() {
        let control = parse_line(1, "000A;<control>;Cc;0;B;;;;;N;LINE FEED (LF);;;;")
            .unwrap()
            .unwrap();
        assert_eq!(control.name_kind(), NameKind::Control);
        assert_eq!(control.alternate_name.as_deref(), Some("LINE FEED (LF)"));

        let first = parse_line(2, "4E00;<CJK Ideograph, First>;Lo;0;L;;;;;N;;;;;")
            .unwrap()
            .unwrap();
        assert_eq!(first.name_kind(), NameKind::RangeStart("CJK Ideograph"));

        let last = parse_line(3, "9FFF;<CJK Ideograph, Last>;Lo;0;L;;;;;N;;;;;")
            .unwrap()
            .unwrap();
        assert_eq!(last.name_kind(), NameKind::RangeEnd("CJK Ideograph"));
    }

    #[test]
    fn test_blank_and_comment_lines_are_ignored() {
        assert!(parse_line(1, "").unwrap().is_none());
        assert!(parse_line(2, "   ").unwrap().is_none());
        assert!(parse_line(3, "# comment").unwrap().is_none());
    }

    #[test]
    fn test_malformed_records() {
        let too_short = parse_line(4, "2603;SNOWMAN;So").unwrap_err();
        assert!(matches!(too_short, CharFinderError::DatasetFormat { line: 4, .. }));

        let no_code = parse_line(5, ";SNOWMAN;So;0;ON;;;;;N;;;;;").unwrap_err();
        assert!(no_code.to_string().contains("missing code point"));

        let bad_hex = parse_line(6, "ZZZZ;SNOWMAN;So;0;ON;;;;;N;;;;;").unwrap_err();
        assert!(bad_hex.to_string().contains("invalid code point"));

        let out_of_range = parse_line(7, "110000;BEYOND;So;0;ON;;;;;N;;;;;").unwrap_err();
        assert!(out_of_range.to_string().contains("invalid code point"));

        let no_name = parse_line(8, "2603;;So;0;ON;;;;;N;;;;;").unwrap_err();
        assert!(no_name.to_string().contains("missing name"));
    }

    #[test]
    fn test_records_reports_line_numbers() {
        let text = "0041;LATIN CAPITAL LETTER A;Lu;0;L;;;;;N;;;;0061;\n\nbroken\n";
        let parsed: Vec<_> = records(text).collect();
        assert_eq!(parsed.len(), 2);
        assert_eq!(parsed[0].as_ref().unwrap().line, 1);
        assert!(matches!(
            parsed[1],
            Err(CharFinderError::DatasetFormat { line: 3, .. })
        ));
    }

    #[test]
    fn test_invalid_utf8_lines_are_malformed() {
        let bytes = b"2603;SN\xFFOWMAN;So;0;ON;;;;;N;;;;;\r\n2604;COMET;So;0;ON;;;;;N;;;;;\r\n";
        let parsed: Vec<_> = records_from_bytes(bytes).collect();
        assert_eq!(parsed.len(), 2);
        assert!(matches!(
            &parsed[0],
            Err(CharFinderError::DatasetFormat { line: 1, reason }) if reason.contains("invalid UTF-8")
        ));
        let comet = parsed[1].as_ref().unwrap();
        assert_eq!((comet.line, comet.code_point), (2, 0x2604));
        assert_eq!(comet.name, "COMET");
    }

    #[test]
    fn test_hangul_syllable_names() {
        assert_eq!(hangul_syllable_name(0xAC00).as_deref(), Some("HANGUL SYLLABLE GA"));
        assert_eq!(hangul_syllable_name(0xAC01).as_deref(), Some("HANGUL SYLLABLE GAG"));
        assert_eq!(hangul_syllable_name(0xD4DB).as_deref(), Some("HANGUL SYLLABLE PWILH"));
        assert_eq!(hangul_syllable_name(0xD7A3).as_deref(), Some("HANGUL SYLLABLE HIH"));
        assert_eq!(hangul_syllable_name(0xD7A4), None);
        assert_eq!(hangul_syllable_name(0xABFF), None);
    }

    #[test]
    fn test_range_naming() {
        let cjk = range_name_prefix("CJK Ideograph Extension A").unwrap();
        assert_eq!(cjk.name_for(0x3400).as_deref(), Some("CJK UNIFIED IDEOGRAPH-3400"));
        let tangut = range_name_prefix("Tangut Ideograph").unwrap();
        assert_eq!(tangut.name_for(0x17000).as_deref(), Some("TANGUT IDEOGRAPH-17000"));
        assert!(range_name_prefix("Private Use").is_none());
        assert!(range_name_prefix("Non Private Use High Surrogate").is_none());
    }
}
