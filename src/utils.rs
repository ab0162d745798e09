use chrono::NaiveDate;

const DATE_FORMAT: &str = "%Y-%m-%d";

/// Extracts the draw number from labels such as `第6868回` or `6868`.
pub fn parse_draw_label(label: &str) -> Option<u32> {
    let digits: String = label
        .chars()
        .skip_while(|c| !c.is_ascii_digit())
        .take_while(|c| c.is_ascii_digit())
        .collect();
    digits.parse::<u32>().ok().filter(|n| *n > 0)
}

/// Accepts `YYYY/MM/DD` (upstream) or `YYYY-MM-DD` and returns `YYYY-MM-DD`.
pub fn normalize_draw_date(date: &str) -> Option<String> {
    let date = date.trim();
    ["%Y/%m/%d", DATE_FORMAT]
        .iter()
        .find_map(|format| NaiveDate::parse_from_str(date, format).ok())
        .map(|parsed| parsed.format(DATE_FORMAT).to_string())
}

/// True when `date` is already a canonical `YYYY-MM-DD` calendar date.
pub fn is_iso_date(date: &str) -> bool {
    date.len() == 10 && NaiveDate::parse_from_str(date, DATE_FORMAT).is_ok()
}

/// Keeps the digits of `text` and left-pads them to four characters.
pub fn winning_number_from_text(text: &str) -> Option<String> {
    let digits: String = text.chars().filter(|c| c.is_ascii_digit()).collect();
    if digits.is_empty() || digits.len() > 4 {
        return None;
    }
    Some(format!("{digits:0>4}"))
}

pub fn digits_from_winning_number(winning_number: &str) -> Option<[u8; 4]> {
    let bytes = winning_number.as_bytes();
    if bytes.len() != 4 || !bytes.iter().all(u8::is_ascii_digit) {
        return None;
    }
    Some([
        bytes[0] - b'0',
        bytes[1] - b'0',
        bytes[2] - b'0',
        bytes[3] - b'0',
    ])
}

pub fn winning_number_from_digits(digits: &[u8; 4]) -> String {
    digits.iter().map(|d| d.to_string()).collect()
}

/// Parses payout text such as `940,800円`. `該当なし` (no winner) yields `None`.
pub fn parse_payout_amount(text: &str) -> Option<i64> {
    if text.trim().is_empty() || text.contains("該当なし") {
        return None;
    }
    let cleaned: String = text
        .chars()
        .filter(|c| !matches!(c, ',' | '円') && !c.is_whitespace())
        .collect();
    let start = cleaned.find(|c: char| c.is_ascii_digit())?;
    if cleaned[..start].contains('-') {
        return None;
    }
    let digits: String = cleaned[start..]
        .chars()
        .take_while(|c| c.is_ascii_digit())
        .collect();
    digits.parse().ok()
}

/// Cache-busting token for `version.json`: the latest date and draw number.
pub fn version_token(latest_date: &str, latest_draw_no: u32) -> String {
    format!("{latest_date}-{latest_draw_no:03}")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn draw_labels() {
        assert_eq!(parse_draw_label("第6868回"), Some(6868));
        assert_eq!(parse_draw_label("第0001回"), Some(1));
        assert_eq!(parse_draw_label("42"), Some(42));
        assert_eq!(parse_draw_label("第0000回"), None);
        assert_eq!(parse_draw_label("回"), None);
    }

    #[test]
    fn dates_are_normalized_to_iso() {
        assert_eq!(normalize_draw_date("2025/12/05").as_deref(), Some("2025-12-05"));
        assert_eq!(normalize_draw_date(" 2025-12-05 ").as_deref(), Some("2025-12-05"));
        assert_eq!(normalize_draw_date("2025/02/30"), None);
        assert_eq!(normalize_draw_date("yesterday"), None);

        assert!(is_iso_date("2025-12-05"));
        assert!(!is_iso_date("2025/12/05"));
        assert!(!is_iso_date("2025-13-01"));
    }

    #[test]
    fn digits_and_winning_number_agree() {
        assert_eq!(winning_number_from_digits(&[1, 2, 3, 4]), "1234");
        assert_eq!(digits_from_winning_number("0427"), Some([0, 4, 2, 7]));
        assert_eq!(digits_from_winning_number("427"), None);
        assert_eq!(digits_from_winning_number("12a4"), None);
        assert_eq!(winning_number_from_text("4 2 7").as_deref(), Some("0427"));
        assert_eq!(winning_number_from_text(""), None);
    }

    #[test]
    fn payout_amounts() {
        assert_eq!(parse_payout_amount("940,800円"), Some(940_800));
        assert_eq!(parse_payout_amount(" 1,100 円"), Some(1_100));
        assert_eq!(parse_payout_amount("該当なし"), None);
        assert_eq!(parse_payout_amount(""), None);
        assert_eq!(parse_payout_amount("-500"), None);
        assert_eq!(parse_payout_amount("-1,100円"), None);
        assert_eq!(parse_payout_amount("¥500"), Some(500));
    }

    #[test]
    fn version_token_encodes_date_and_draw() {
        assert_eq!(version_token("2025-12-05", 6870), "2025-12-05-6870");
        assert_eq!(version_token("1994-10-07", 1), "1994-10-07-001");
        assert!(version_token("2025-12-05", 6870) < version_token("2025-12-08", 6871));
    }
}
