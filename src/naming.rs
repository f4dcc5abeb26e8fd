// Local folders and catalog folder names carry a trailing `_<digits>`
// version suffix; the stripped base name is the join key between the two.
pub fn split_suffix(raw: &str) -> (&str, Option<u64>) {
    if let Some(idx) = raw.rfind('_') {
        let digits = &raw[idx + 1..];
        if idx > 0 && !digits.is_empty() && digits.bytes().all(|b| b.is_ascii_digit()) {
            if let Ok(number) = digits.parse::<u64>() {
                return (&raw[..idx], Some(number));
            }
        }
    }
    (raw, None)
}
