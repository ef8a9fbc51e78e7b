//! Per-notification format-string expansion.
//!
//! Templates come from the configuration (`title-format`, `summary-format`,
//! `body-format`) and support `%a` (application), `%s` (summary), `%b`
//! (body), `%A` (an asterisk when the notification has actions), `%%` for a
//! literal percent and `\n` for a newline. Other escape sequences expand to
//! nothing.

/// Content substituted into a format template.
#[derive(Debug, Clone, Copy, Default)]
pub struct FormatContent<'a> {
    /// Application name (`%a`).
    pub app: &'a [char],
    /// Summary (`%s`).
    pub summary: &'a [char],
    /// Body (`%b`).
    pub body: &'a [char],
    /// Whether the notification has any actions (`%A`).
    pub has_actions: bool,
}

enum State {
    None,
    AfterPercent,
    AfterBackslash,
}

/// Expands `fmt` against `content`.
///
/// Returns the expanded scalar sequence; an empty result means the template
/// produced no visible output and the corresponding text block is skipped.
pub fn expand(fmt: &str, content: &FormatContent<'_>) -> Vec<char> {
    let mut out = Vec::with_capacity(fmt.len());
    let mut state = State::None;

    for ch in fmt.chars() {
        match state {
            State::None => match ch {
                '%' => state = State::AfterPercent,
                '\\' => state = State::AfterBackslash,
                _ => out.push(ch),
            },
            State::AfterPercent => {
                match ch {
                    'a' => out.extend_from_slice(content.app),
                    's' => out.extend_from_slice(content.summary),
                    'b' => out.extend_from_slice(content.body),
                    'A' => {
                        if content.has_actions {
                            out.push('*');
                        }
                    }
                    '%' => out.push('%'),
                    _ => {}
                }
                state = State::None;
            }
            State::AfterBackslash => {
                if ch == 'n' {
                    out.push('\n');
                }
                state = State::None;
            }
        }
    }

    out
}
