use once_cell::sync::Lazy;
use regex::Regex;

use crate::ocr::Line;

// Numbered markers ("1."), bullet glyphs, or a single letter with a dot ("a.", "B.").
static LIST_PREFIX: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^(\d+\.|[•\-*●◆►✓✔✕✖✗✘➤➢➣]+|\p{L}\.)$").expect("list prefix pattern")
});

pub fn is_list_prefix(token: &str) -> bool {
    LIST_PREFIX.is_match(token)
}

/// Maps one translated block back onto the block's lines, one string per line.
///
/// A translation that kept the original line breaks is used as-is. Otherwise
/// words are dealt out in proportion to each line's pixel width, the last line
/// taking whatever is left; a list marker always travels with the word after it.
pub fn split_translated_block(translated: &str, lines: &[Line]) -> Vec<String> {
    if lines.is_empty() {
        return Vec::new();
    }

    let segments = translated
        .split('\n')
        .map(|segment| segment.trim_end_matches('\r'))
        .filter(|segment| !segment.trim().is_empty())
        .collect::<Vec<_>>();
    if segments.len() == lines.len() {
        return segments.into_iter().map(str::to_string).collect();
    }

    let words = translated.split_whitespace().collect::<Vec<_>>();
    if words.is_empty() {
        return vec![String::new(); lines.len()];
    }

    let total_words = words.len();
    let total_width = lines.iter().map(|line| line.bbox.w as f64).sum::<f64>();
    let last = lines.len() - 1;
    let mut result = Vec::with_capacity(lines.len());
    let mut cursor = 0usize;

    for (idx, line) in lines.iter().enumerate() {
        let remaining = total_words - cursor;
        let count = if idx == last {
            remaining
        } else if remaining > 0 && is_list_prefix(words[cursor]) {
            remaining.min(2)
        } else {
            let share = width_share(line.bbox.w as f64, total_width, lines.len(), total_words)
                .max(1)
                .min(remaining);
            // A trailing marker moves down to the line holding its word.
            if share > 1
                && cursor + share < total_words
                && is_list_prefix(words[cursor + share - 1])
            {
                share - 1
            } else {
                share
            }
        };
        result.push(words[cursor..cursor + count].join(" "));
        cursor += count;
    }

    result
}

fn width_share(width: f64, total_width: f64, line_count: usize, total_words: usize) -> usize {
    let ratio = if total_width > 0.0 {
        width / total_width
    } else {
        1.0 / line_count as f64
    };
    (total_words as f64 * ratio).round() as usize
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ocr::{BBoxPx, Rgb};

    fn line(width: u32) -> Line {
        Line {
            words: Vec::new(),
            bbox: BBoxPx::new(0, 0, width, 20),
            background_color: Rgb::WHITE,
            text: String::new(),
        }
    }

    #[test]
    fn newline_structure_is_kept_verbatim() {
        let lines = vec![line(100), line(100)];
        let split = split_translated_block("1. Hello world\n2. Foo bar", &lines);
        insta::assert_snapshot!(split.join("|"), @"1. Hello world|2. Foo bar");
    }

    #[test]
    fn words_follow_line_widths() {
        let lines = vec![line(300), line(100)];
        let split = split_translated_block("one two three four five six seven eight", &lines);
        assert_eq!(split, vec!["one two three four five six", "seven eight"]);
    }

    #[test]
    fn last_line_absorbs_the_remainder() {
        let lines = vec![line(10), line(10), line(10)];
        let split = split_translated_block("a b c d e f g", &lines);
        assert_eq!(split, vec!["a b", "c d", "e f g"]);
    }

    #[test]
    fn list_marker_keeps_its_first_word() {
        let lines = vec![line(50), line(400), line(50)];
        let split = split_translated_block("• first item text here • second", &lines);
        assert_eq!(split, vec!["• first", "item text here • second", ""]);
        let words = split
            .iter()
            .map(|line| line.split_whitespace().count())
            .sum::<usize>();
        assert_eq!(words, 7);
    }

    #[test]
    fn list_marker_is_not_left_at_a_line_end() {
        let lines = vec![line(300), line(100)];
        let split = split_translated_block("Intro text • item", &lines);
        assert_eq!(split, vec!["Intro text", "• item"]);

        let split = split_translated_block("Steps: 1. open 2.", &[line(300), line(100)]);
        assert_eq!(split, vec!["Steps: 1. open", "2."]);
    }

    #[test]
    fn words_run_out_before_lines() {
        let lines = vec![line(10), line(10), line(10)];
        let split = split_translated_block("solo", &lines);
        assert_eq!(split, vec!["solo", "", ""]);
    }

    #[test]
    fn blank_translation_maps_to_empty_lines() {
        let lines = vec![line(10), line(10)];
        assert_eq!(split_translated_block("  \n ", &lines), vec!["", ""]);
        assert!(split_translated_block("text", &[]).is_empty());
    }

    #[test]
    fn list_prefix_patterns() {
        for token in ["1.", "12.", "•", "-", "**", "a.", "B.", "é."] {
            assert!(is_list_prefix(token), "{token}");
        }
        for token in ["1", "ab.", "word", "1.5", ""] {
            assert!(!is_list_prefix(token), "{token}");
        }
    }
}
