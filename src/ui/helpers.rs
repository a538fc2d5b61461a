use ratatui::prelude::Line;
use unicode_width::{UnicodeWidthChar, UnicodeWidthStr};

pub fn truncate_string(s: &str, max_width: usize) -> String {
    if s.width() <= max_width {
        s.to_string()
    } else {
        let mut result = String::new();
        let mut width = 0;
        for c in s.chars() {
            let cw = c.width().unwrap_or(0);
            if width + cw + 1 > max_width {
                result.push('…');
                break;
            }
            result.push(c);
            width += cw;
        }
        result
    }
}

/// Count how many rows a Line takes when word-wrapped to `max_width`
/// Row count as a terminal coordinate, saturating at `u16::MAX`.
pub fn rows_u16(n: usize) -> u16 {
    u16::try_from(n).unwrap_or(u16::MAX)
}

pub fn count_wrapped_lines(line: &Line, max_width: usize) -> usize {
    if max_width == 0 {
        return 1;
    }

    let full_text: String = line.spans.iter().map(|s| s.content.as_ref()).collect();
    if full_text.is_empty() {
        return 1;
    }

    let mut line_count = 1;
    let mut current_width = 0;
    for word in full_text.split_inclusive(|c: char| c.is_whitespace()) {
        let word_width = word.width();
        if current_width == 0 {
            current_width = word_width;
        } else if current_width + word_width <= max_width {
            current_width += word_width;
        } else {
            line_count += 1;
            current_width = word_width;
        }

        // Words longer than the viewport are broken
        while current_width > max_width {
            line_count += 1;
            current_width = current_width.saturating_sub(max_width);
        }
    }
    line_count
}
