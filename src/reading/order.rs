//! The reading-order sort itself.

use crate::detect::DetectedLine;

use super::segment::TextSegment;

// ---------------------------------------------------------------------------
// SortOptions
// ---------------------------------------------------------------------------

/// Parameters of the reading-order sort.
#[derive(Debug, Clone, Copy)]
pub struct SortOptions {
    /// Lines below this confidence are discarded.
    pub confidence_threshold: f32,
    /// Height of one row bucket in detector coordinate units. Lines whose
    /// centroids fall into the same bucket are ordered by horizontal
    /// position.
    pub row_height: f32,
}

impl Default for SortOptions {
    fn default() -> Self {
        Self {
            confidence_threshold: 0.5,
            row_height: 20.0,
        }
    }
}

// ---------------------------------------------------------------------------
// sort_lines
// ---------------------------------------------------------------------------

/// Filter, sort and rank raw detector lines.
///
/// Order is ascending by `(row, x̄)` where `row = floor(ȳ / row_height)` —
/// top-to-bottom, then left-to-right within a row.
pub(crate) fn sort_lines(lines: Vec<DetectedLine>, opts: &SortOptions) -> Vec<TextSegment> {
    // A non-positive row height would collapse every line into one bucket.
    let row_height = if opts.row_height > 0.0 {
        opts.row_height
    } else {
        SortOptions::default().row_height
    };

    let mut keyed: Vec<(i64, f32, DetectedLine)> = lines
        .into_iter()
        .filter(|line| line.confidence >= opts.confidence_threshold)
        .filter(|line| !line.text.trim().is_empty())
        .map(|line| {
            let c = line.quad.centroid();
            let row = (c.y / row_height).floor() as i64;
            (row, c.x, line)
        })
        .collect();

    keyed.sort_by(|a, b| a.0.cmp(&b.0).then_with(|| a.1.total_cmp(&b.1)));

    keyed
        .into_iter()
        .enumerate()
        .map(|(order, (_, _, line))| TextSegment {
            text: line.text,
            quad: line.quad,
            confidence: line.confidence,
            order,
        })
        .collect()
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use crate::detect::Quad;

    fn line_at(x: f32, y: f32, text: &str, confidence: f32) -> DetectedLine {
        // 0-sized quad keeps the centroid exactly at (x, y).
        DetectedLine::new(Quad::from_rect(x, y, 0.0, 0.0), text, confidence)
    }

    #[test]
    fn rows_run_top_to_bottom() {
        let segments = sort_lines(
            vec![
                line_at(0.0, 90.0, "bottom", 0.9),
                line_at(0.0, 10.0, "top", 0.9),
                line_at(0.0, 50.0, "middle", 0.9),
            ],
            &SortOptions::default(),
        );

        let texts: Vec<&str> = segments.iter().map(|s| s.text.as_str()).collect();
        assert_eq!(texts, ["top", "middle", "bottom"]);
    }

    /// Centroids at y = 8 and y = 15 share the 20-unit row bucket, so the
    /// line at x̄ = 10 must come before the one at x̄ = 50.
    #[test]
    fn same_row_bucket_orders_by_x() {
        let segments = sort_lines(
            vec![
                line_at(50.0, 8.0, "right", 0.9),
                line_at(10.0, 15.0, "left", 0.9),
            ],
            &SortOptions::default(),
        );

        let texts: Vec<&str> = segments.iter().map(|s| s.text.as_str()).collect();
        assert_eq!(texts, ["left", "right"]);
    }

    #[test]
    fn low_confidence_lines_are_discarded() {
        let segments = sort_lines(
            vec![
                line_at(0.0, 0.0, "kept", 0.5),
                line_at(0.0, 30.0, "dropped", 0.49),
            ],
            &SortOptions::default(),
        );

        assert_eq!(segments.len(), 1);
        assert_eq!(segments[0].text, "kept");
    }

    #[test]
    fn whitespace_only_lines_are_discarded() {
        let segments = sort_lines(
            vec![
                line_at(0.0, 0.0, "  \t ", 0.9),
                line_at(0.0, 30.0, "", 0.9),
                line_at(0.0, 60.0, "text", 0.9),
            ],
            &SortOptions::default(),
        );

        assert_eq!(segments.len(), 1);
        assert_eq!(segments[0].text, "text");
    }

    #[test]
    fn order_is_rank_after_filtering() {
        let segments = sort_lines(
            vec![
                line_at(0.0, 50.0, "c", 0.9),
                line_at(0.0, 25.0, "dropped", 0.1),
                line_at(0.0, 10.0, "a", 0.9),
                line_at(30.0, 0.0, "d", 0.9),
                line_at(0.0, 12.0, "b", 0.9),
            ],
            &SortOptions::default(),
        );

        let ranked: Vec<(usize, &str)> =
            segments.iter().map(|s| (s.order, s.text.as_str())).collect();
        assert_eq!(ranked, [(0, "a"), (1, "b"), (2, "c"), (3, "d")]);
    }

    #[test]
    fn everything_filtered_yields_empty() {
        let segments = sort_lines(
            vec![
                line_at(0.0, 0.0, "faint", 0.2),
                line_at(0.0, 30.0, "   ", 0.9),
            ],
            &SortOptions::default(),
        );
        assert!(segments.is_empty());
    }

    #[test]
    fn no_input_yields_empty() {
        assert!(sort_lines(Vec::new(), &SortOptions::default()).is_empty());
    }

    #[test]
    fn zero_row_height_falls_back_to_default_bucketing() {
        let segments = sort_lines(
            vec![
                line_at(0.0, 90.0, "bottom", 0.9),
                line_at(0.0, 10.0, "top", 0.9),
            ],
            &SortOptions {
                confidence_threshold: 0.5,
                row_height: 0.0,
            },
        );

        let texts: Vec<&str> = segments.iter().map(|s| s.text.as_str()).collect();
        assert_eq!(texts, ["top", "bottom"]);
    }
}
