//! Fixed layout and styling of the annotations drawn on each frame.

use crate::detection::domain::crowd_status::CrowdStatus;
use crate::detection::domain::detection::{Detection, ObjectClass};
use crate::detection::domain::object_counts::ObjectCounts;

pub type Rgb = [u8; 3];

pub const RED: Rgb = [255, 0, 0];
pub const GREEN: Rgb = [0, 255, 0];
pub const WHITE: Rgb = [255, 255, 255];

/// Overlay text starts this many pixels left of the right frame edge.
pub const OVERLAY_RIGHT_INSET: i32 = 200;

/// Baselines of the person count, head count and status lines.
pub const PERSON_LINE_Y: i32 = 30;
pub const HEAD_LINE_Y: i32 = 60;
pub const STATUS_LINE_Y: i32 = 100;

/// Pixel height of overlay text.
pub const OVERLAY_TEXT_SCALE: f32 = 32.0;

/// Pixel height of per-box labels.
pub const LABEL_TEXT_SCALE: f32 = 16.0;

pub const BOX_THICKNESS: u32 = 2;

/// One line of overlay text. `y` is the text baseline.
#[derive(Clone, Debug, PartialEq)]
pub struct OverlayLine {
    pub text: String,
    pub x: i32,
    pub y: i32,
    pub color: Rgb,
}

/// The three overlay lines for a frame `frame_width` pixels wide.
///
/// Narrow frames push `x` negative; text is clipped by the canvas.
pub fn overlay_lines(counts: ObjectCounts, status: CrowdStatus, frame_width: u32) -> Vec<OverlayLine> {
    let x = frame_width as i32 - OVERLAY_RIGHT_INSET;
    let status_color = match status {
        CrowdStatus::Crowded => RED,
        CrowdStatus::Uncrowded => GREEN,
    };
    vec![
        OverlayLine {
            text: format!("Person: {}", counts.person),
            x,
            y: PERSON_LINE_Y,
            color: RED,
        },
        OverlayLine {
            text: format!("Head: {}", counts.head),
            x,
            y: HEAD_LINE_Y,
            color: RED,
        },
        OverlayLine {
            text: status.to_string(),
            x,
            y: STATUS_LINE_Y,
            color: status_color,
        },
    ]
}

/// Box color per class.
pub fn box_color(class: ObjectClass) -> Rgb {
    match class {
        ObjectClass::Head => [255, 56, 56],
        ObjectClass::Person => [255, 157, 151],
        ObjectClass::Other => [255, 112, 31],
    }
}

/// Text drawn above a detection box.
pub fn box_label(detection: &Detection) -> String {
    format!("{} {:.2}", detection.label(), detection.confidence())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::shared::bounding_box::BoundingBox;
    use rstest::rstest;

    #[test]
    fn test_overlay_anchored_to_right_edge() {
        let lines = overlay_lines(ObjectCounts::new(3, 2), CrowdStatus::Uncrowded, 640);
        assert_eq!(lines.len(), 3);
        assert!(lines.iter().all(|l| l.x == 440));
        assert_eq!(
            lines.iter().map(|l| l.y).collect::<Vec<_>>(),
            vec![30, 60, 100]
        );
    }

    #[test]
    fn test_overlay_text_and_count_colors() {
        let lines = overlay_lines(ObjectCounts::new(3, 2), CrowdStatus::Uncrowded, 640);
        assert_eq!(lines[0].text, "Person: 3");
        assert_eq!(lines[1].text, "Head: 2");
        assert_eq!(lines[0].color, RED);
        assert_eq!(lines[1].color, RED);
    }

    #[rstest]
    #[case(CrowdStatus::Crowded, "Crowded", RED)]
    #[case(CrowdStatus::Uncrowded, "Uncrowded", GREEN)]
    fn test_status_line(#[case] status: CrowdStatus, #[case] text: &str, #[case] color: Rgb) {
        let lines = overlay_lines(ObjectCounts::new(16, 0), status, 640);
        assert_eq!(lines[2].text, text);
        assert_eq!(lines[2].color, color);
    }

    #[test]
    fn test_zero_counts_still_produce_all_lines() {
        let lines = overlay_lines(ObjectCounts::default(), CrowdStatus::Uncrowded, 640);
        assert_eq!(lines[0].text, "Person: 0");
        assert_eq!(lines[1].text, "Head: 0");
        assert_eq!(lines[2].text, "Uncrowded");
    }

    #[test]
    fn test_box_label_format() {
        let d = Detection::new("Head", 0.876, BoundingBox::new(0.0, 0.0, 5.0, 5.0));
        assert_eq!(box_label(&d), "Head 0.88");
    }

    #[test]
    fn test_classes_have_distinct_colors() {
        assert_ne!(box_color(ObjectClass::Person), box_color(ObjectClass::Head));
        assert_ne!(box_color(ObjectClass::Person), box_color(ObjectClass::Other));
    }
}
