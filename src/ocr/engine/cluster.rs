use crate::ocr::{BBoxPx, WordDetection};

use super::geom::{union_bbox, vertical_overlap_ratio};

/// Thresholds for grouping words into visual lines.
#[derive(Debug, Clone, PartialEq)]
pub struct ClusterConfig {
    /// How many of the most recent open lines a word may join.
    pub lookback: usize,
    pub min_overlap_ratio: f32,
    pub min_center_distance: f32,
    pub center_distance_factor: f32,
}

impl Default for ClusterConfig {
    fn default() -> Self {
        Self {
            lookback: 3,
            min_overlap_ratio: 0.5,
            min_center_distance: 5.0,
            center_distance_factor: 0.4,
        }
    }
}

struct OpenLine {
    bbox: BBoxPx,
    words: Vec<WordDetection>,
}

/// Groups words into lines ordered top-to-bottom, each ordered left-to-right.
///
/// Words are visited by ascending top edge and join the most recently opened
/// compatible line within the lookback window. When several open lines are
/// compatible the most recent one wins.
pub fn group_words_into_lines(
    words: &[WordDetection],
    config: &ClusterConfig,
) -> Vec<Vec<WordDetection>> {
    let mut sorted = words.to_vec();
    sorted.sort_by_key(|word| word.bbox.y);

    let lookback = config.lookback.max(1);
    let mut lines: Vec<OpenLine> = Vec::new();
    for word in sorted {
        let target = lines
            .iter()
            .enumerate()
            .rev()
            .take(lookback)
            .find(|(_, line)| same_line(&line.bbox, &word.bbox, config))
            .map(|(idx, _)| idx);
        match target {
            Some(idx) => {
                let line = &mut lines[idx];
                line.bbox = union_bbox(&line.bbox, &word.bbox);
                line.words.push(word);
            }
            None => lines.push(OpenLine {
                bbox: word.bbox,
                words: vec![word],
            }),
        }
    }

    lines.sort_by_key(|line| line.bbox.y);
    lines
        .into_iter()
        .map(|mut line| {
            line.words.sort_by_key(|word| word.bbox.x);
            line.words
        })
        .collect()
}

fn same_line(line: &BBoxPx, word: &BBoxPx, config: &ClusterConfig) -> bool {
    if vertical_overlap_ratio(line, word) >= config.min_overlap_ratio {
        return true;
    }
    let average_height = (line.h as f32 + word.h as f32) * 0.5;
    let threshold = config
        .min_center_distance
        .max(config.center_distance_factor * average_height);
    (line.center_y() - word.center_y()).abs() <= threshold
}
