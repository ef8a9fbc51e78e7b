//! HTML-entity decoding for summary and body text.
//!
//! A single compiled pattern recognizes the common named entities plus
//! decimal (`&#65;`) and hexadecimal (`&#x41;`) codepoint references.
//! Everything else passes through verbatim.

use regex::Regex;

/// Compiled HTML-entity matcher, owned by the manager.
#[derive(Debug)]
pub struct EntityMatcher {
    re: Regex,
}

impl EntityMatcher {
    /// Compiles the entity pattern.
    pub fn new() -> Self {
        #[allow(clippy::expect_used)]
        let re = Regex::new(
            "&(nbsp|lt|gt|amp|quot|apos|cent|pound|yen|euro|copy|reg);\
             |&#([0-9]+);\
             |&#x([0-9a-fA-F]+);",
        )
        .expect("entity pattern is a constant");

        Self { re }
    }

    /// Decodes entities in `text`, returning the scalar sequence.
    pub fn decode(&self, text: &str) -> Vec<char> {
        let mut out: Vec<char> = Vec::with_capacity(text.len());
        let mut last_end = 0;

        for caps in self.re.captures_iter(text) {
            #[allow(clippy::expect_used)]
            let all = caps.get(0).expect("whole-match group always present");

            out.extend(text[last_end..all.start()].chars());
            last_end = all.end();

            if let Some(named) = caps.get(1) {
                out.push(match named.as_str() {
                    "nbsp" => ' ',
                    "lt" => '<',
                    "gt" => '>',
                    "amp" => '&',
                    "quot" => '"',
                    "apos" => '\'',
                    "cent" => '¢',
                    "pound" => '£',
                    "yen" => '¥',
                    "euro" => '€',
                    "copy" => '©',
                    _ => '®',
                });
            } else {
                let (digits, radix) = match (caps.get(2), caps.get(3)) {
                    (Some(dec), _) => (dec.as_str(), 10),
                    (_, Some(hex)) => (hex.as_str(), 16),
                    _ => continue,
                };

                if let Some(ch) = u32::from_str_radix(digits, radix)
                    .ok()
                    .and_then(char::from_u32)
                {
                    out.push(ch);
                }
            }
        }

        out.extend(text[last_end..].chars());
        out
    }
}

impl Default for EntityMatcher {
    fn default() -> Self {
        Self::new()
    }
}
