//! Greedy non-max suppression over corner-form boxes.

/// Box in `[y1, x1, y2, x2]` corner form.
pub type CornerBox = [f32; 4];

pub fn corners_from_center(cx: f32, cy: f32, w: f32, h: f32) -> CornerBox {
    [cy - h / 2.0, cx - w / 2.0, cy + h / 2.0, cx + w / 2.0]
}

/// Intersection over union. Corners may be given in either order.
pub fn iou(a: &CornerBox, b: &CornerBox) -> f32 {
    let (ay1, ay2) = (a[0].min(a[2]), a[0].max(a[2]));
    let (ax1, ax2) = (a[1].min(a[3]), a[1].max(a[3]));
    let (by1, by2) = (b[0].min(b[2]), b[0].max(b[2]));
    let (bx1, bx2) = (b[1].min(b[3]), b[1].max(b[3]));

    let area_a = (ay2 - ay1) * (ax2 - ax1);
    let area_b = (by2 - by1) * (bx2 - bx1);
    if area_a <= 0.0 || area_b <= 0.0 {
        return 0.0;
    }

    let inter_h = (ay2.min(by2) - ay1.max(by1)).max(0.0);
    let inter_w = (ax2.min(bx2) - ax1.max(bx1)).max(0.0);
    let inter = inter_h * inter_w;
    inter / (area_a + area_b - inter)
}

/// Suppression parameters.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct NmsParams {
    pub max_output: usize,
    pub iou_threshold: f32,
    pub score_threshold: f32,
}

/// Returns indices of kept boxes in survival order (descending score,
/// earlier index first on ties).
///
/// Candidates scoring below `score_threshold` never enter suppression. A
/// candidate is dropped when its IoU with any kept box reaches
/// `iou_threshold`.
pub fn non_max_suppression(boxes: &[CornerBox], scores: &[f32], params: NmsParams) -> Vec<usize> {
    let mut order: Vec<usize> = (0..boxes.len().min(scores.len()))
        .filter(|&i| scores[i].is_finite() && scores[i] >= params.score_threshold)
        .collect();
    order.sort_by(|&a, &b| scores[b].total_cmp(&scores[a]));

    let mut kept: Vec<usize> = Vec::with_capacity(params.max_output.min(order.len()));
    for candidate in order {
        if kept.len() >= params.max_output {
            break;
        }
        let overlaps = kept
            .iter()
            .any(|&k| iou(&boxes[k], &boxes[candidate]) >= params.iou_threshold);
        if !overlaps {
            kept.push(candidate);
        }
    }
    kept
}

#[cfg(test)]
mod tests {
    use super::*;

    fn params(iou_threshold: f32, score_threshold: f32) -> NmsParams {
        NmsParams {
            max_output: 100,
            iou_threshold,
            score_threshold,
        }
    }

    #[test]
    fn iou_of_identical_and_disjoint_boxes() {
        let a = [0.0, 0.0, 10.0, 10.0];
        let b = [20.0, 20.0, 30.0, 30.0];
        assert_eq!(iou(&a, &a), 1.0);
        assert_eq!(iou(&a, &b), 0.0);
    }

    #[test]
    fn iou_half_overlap() {
        let a = [0.0, 0.0, 10.0, 10.0];
        let b = [0.0, 5.0, 10.0, 15.0];
        // intersection 50, union 150
        assert!((iou(&a, &b) - 1.0 / 3.0).abs() < 1e-6);
    }

    #[test]
    fn degenerate_boxes_never_overlap() {
        let a = [0.0, 0.0, 0.0, 10.0];
        assert_eq!(iou(&a, &a), 0.0);
    }

    #[test]
    fn suppresses_lower_scoring_duplicate() {
        let boxes = vec![
            [0.0, 0.0, 10.0, 10.0],
            [0.0, 1.0, 10.0, 11.0],
            [50.0, 50.0, 60.0, 60.0],
        ];
        let scores = vec![0.6, 0.9, 0.3];
        let kept = non_max_suppression(&boxes, &scores, params(0.45, 0.1));
        assert_eq!(kept, vec![1, 2]);
    }

    #[test]
    fn score_threshold_filters_before_suppression() {
        let boxes = vec![[0.0, 0.0, 10.0, 10.0], [50.0, 50.0, 60.0, 60.0]];
        let scores = vec![0.2, 0.5];
        assert_eq!(non_max_suppression(&boxes, &scores, params(0.45, 0.5)), vec![1]);
    }

    #[test]
    fn caps_output_count() {
        let boxes: Vec<CornerBox> = (0..250)
            .map(|i| {
                let o = i as f32 * 20.0;
                [o, o, o + 10.0, o + 10.0]
            })
            .collect();
        let scores = vec![0.8; 250];
        let kept = non_max_suppression(&boxes, &scores, params(0.45, 0.0));
        assert_eq!(kept.len(), 100);
        // ties keep index order
        assert_eq!(kept[..3], [0, 1, 2]);
    }

    #[test]
    fn nan_scores_are_ignored() {
        let boxes = vec![[0.0, 0.0, 10.0, 10.0]];
        assert!(non_max_suppression(&boxes, &[f32::NAN], params(0.5, 0.0)).is_empty());
    }
}
