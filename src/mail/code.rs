use regex::Regex;

use crate::domain::otp::OneTimeCode;

/// Finds a verification code of a fixed number of digits in message text.
///
/// Only whole digit runs count: with `length = 6`, `"4829131234"` yields
/// nothing even though it contains six-digit substrings.
#[derive(Debug, Clone)]
pub struct CodeExtractor {
    length: usize,
    digits: Regex,
}

impl CodeExtractor {
    pub fn new(length: usize) -> Self {
        Self {
            length,
            // ASCII only; `\d` would also accept other scripts' digits
            digits: Regex::new(r"[0-9]+").expect("static pattern"),
        }
    }

    pub fn extract(&self, text: &str) -> Option<OneTimeCode> {
        self.digits
            .find_iter(text)
            .map(|m| m.as_str())
            .find(|run| run.len() == self.length)
            .map(OneTimeCode::new)
    }
}

impl Default for CodeExtractor {
    fn default() -> Self {
        Self::new(6)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn finds_code_in_snippet() {
        let ex = CodeExtractor::default();
        let code = ex.extract("Your code is 482913. It expires in 10 minutes.");
        assert_eq!(code.as_ref().map(OneTimeCode::as_str), Some("482913"));
    }

    #[test]
    fn ignores_longer_digit_runs() {
        let ex = CodeExtractor::default();
        assert!(ex.extract("Order 4829131234 shipped").is_none());
        assert_eq!(
            ex.extract("Ref 4829131234, code 771204").unwrap().as_str(),
            "771204"
        );
    }

    #[test]
    fn skips_dates_and_amounts() {
        let ex = CodeExtractor::default();
        assert!(ex.extract("Sent 2024-03-05 for $1,299.00").is_none());
        assert_eq!(
            ex.extract("Sent 2024-03-05: 000417 is your code").unwrap().as_str(),
            "000417"
        );
    }

    #[test]
    fn same_text_same_answer() {
        let ex = CodeExtractor::default();
        let text = "codes: 12345 then 654321 then 111111";
        let first = ex.extract(text).map(OneTimeCode::into_secret);
        let second = ex.extract(text).map(OneTimeCode::into_secret);
        assert_eq!(first, second);
        assert_eq!(first.as_deref(), Some("654321"));
    }

    #[test]
    fn length_is_configurable() {
        let ex = CodeExtractor::new(4);
        assert_eq!(ex.extract("PIN 123456 or 9876").unwrap().as_str(), "9876");
    }
}
