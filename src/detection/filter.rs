// Ultralytics 🚀 AGPL-3.0 License - https://ultralytics.com/license
//! 人员过滤器 (Detection Filter)
//! 职责: 原始检测 → 仅保留 person 且置信度达标 → 本帧序号 + 人数

use super::types::{Detection, FilteredDetection, FilteredFrame};
use crate::PERSON_LABEL;

/// 只保留行人类别的过滤器
#[derive(Clone, Debug)]
pub struct DetectionFilter {
    conf_threshold: f32,
}

impl DetectionFilter {
    pub fn new(conf_threshold: f32) -> Self {
        Self { conf_threshold }
    }

    /// 过滤并编号
    ///
    /// `display_id` 是过滤后序列下标 + 1, 顺序即检测器输出顺序 (不排序, 不跨帧).
    pub fn filter(&self, detections: Vec<Detection>) -> FilteredFrame {
        let people: Vec<FilteredDetection> = detections
            .into_iter()
            .filter(|d| d.class_label == PERSON_LABEL && d.confidence >= self.conf_threshold)
            .enumerate()
            .map(|(index, detection)| FilteredDetection {
                detection,
                display_id: index + 1,
            })
            .collect();

        FilteredFrame {
            count: people.len(),
            people,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::detection::types::BoundingBox;

    fn det(x1: f32, conf: f32, label: &str) -> Detection {
        Detection::new(BoundingBox::new(x1, x1, x1 + 10.0, x1 + 10.0), conf, label)
    }

    #[test]
    fn test_low_confidence_person_dropped() {
        let filter = DetectionFilter::new(0.5);
        let frame = filter.filter(vec![
            Detection::new(BoundingBox::new(0.0, 0.0, 10.0, 10.0), 0.9, "person"),
            Detection::new(BoundingBox::new(5.0, 5.0, 15.0, 15.0), 0.3, "person"),
        ]);

        assert_eq!(frame.count, 1);
        assert_eq!(frame.people.len(), 1);
        assert_eq!(frame.people[0].display_id, 1);
        assert_eq!(frame.people[0].detection.confidence, 0.9);
    }

    #[test]
    fn test_empty_input() {
        let frame = DetectionFilter::new(0.5).filter(Vec::new());
        assert_eq!(frame.count, 0);
        assert!(frame.is_empty());
    }

    #[test]
    fn test_threshold_is_inclusive() {
        let frame = DetectionFilter::new(0.5).filter(vec![det(0.0, 0.5, "person")]);
        assert_eq!(frame.count, 1);
    }

    #[test]
    fn test_other_classes_ignored_and_ids_contiguous() {
        let filter = DetectionFilter::new(0.5);
        let input = vec![
            det(0.0, 0.8, "car"),
            det(10.0, 0.7, "person"),
            det(20.0, 0.2, "person"),
            det(30.0, 0.95, "dog"),
            det(40.0, 0.6, "person"),
            det(50.0, 0.99, "person"),
        ];
        let expected = input
            .iter()
            .filter(|d| d.class_label == "person" && d.confidence >= 0.5)
            .count();

        let frame = filter.filter(input);

        assert_eq!(frame.count, expected);
        assert_eq!(frame.count, frame.people.len());
        let ids: Vec<usize> = frame.people.iter().map(|p| p.display_id).collect();
        assert_eq!(ids, (1..=expected).collect::<Vec<_>>());
        // 保持检测器输出顺序
        let xs: Vec<f32> = frame.people.iter().map(|p| p.detection.bbox.x1).collect();
        assert_eq!(xs, vec![10.0, 40.0, 50.0]);
    }
}
