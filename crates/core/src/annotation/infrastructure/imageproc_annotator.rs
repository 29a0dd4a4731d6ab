use ab_glyph::{Font, FontVec, PxScale, ScaleFont};
use image::{Rgb, RgbImage};
use imageproc::drawing::{draw_filled_rect_mut, draw_hollow_rect_mut, draw_text_mut, text_size};
use imageproc::rect::Rect;

use crate::annotation::domain::frame_annotator::FrameAnnotator;
use crate::annotation::domain::overlay::{
    box_color, box_label, overlay_lines, OverlayLine, BOX_THICKNESS, LABEL_TEXT_SCALE,
    OVERLAY_TEXT_SCALE, WHITE,
};
use crate::detection::domain::crowd_status::CrowdStatus;
use crate::detection::domain::detection::{Detection, DetectionSet};
use crate::detection::domain::object_counts::ObjectCounts;
use crate::shared::frame::Frame;

/// Padding around label text inside its filled background.
const LABEL_PADDING: i32 = 2;

/// CPU annotator drawing with `imageproc` and an `ab_glyph` font.
pub struct ImageprocAnnotator {
    font: FontVec,
}

impl ImageprocAnnotator {
    pub fn new(font: FontVec) -> Self {
        Self { font }
    }

    fn draw_detection(&self, img: &mut RgbImage, detection: &Detection) {
        let color = Rgb(box_color(detection.class()));
        let (x, y, w, h) = detection.bbox().to_pixel_rect();

        for t in 0..BOX_THICKNESS {
            let inset = 2 * t;
            if w <= inset || h <= inset {
                break;
            }
            let rect = Rect::at(x + t as i32, y + t as i32).of_size(w - inset, h - inset);
            draw_hollow_rect_mut(img, rect, color);
        }

        let label = box_label(detection);
        let scale = PxScale::from(LABEL_TEXT_SCALE);
        let (tw, th) = text_size(scale, &self.font, &label);
        let bg_w = tw + 2 * LABEL_PADDING as u32;
        let bg_h = th + 2 * LABEL_PADDING as u32;

        // Above the box when there is room, otherwise just inside its top edge
        let bg_y = if y - bg_h as i32 >= 0 { y - bg_h as i32 } else { y };
        draw_filled_rect_mut(img, Rect::at(x, bg_y).of_size(bg_w, bg_h), color);
        draw_text_mut(
            img,
            Rgb(WHITE),
            x + LABEL_PADDING,
            bg_y + LABEL_PADDING,
            scale,
            &self.font,
            &label,
        );
    }

    fn draw_overlay_line(&self, img: &mut RgbImage, line: &OverlayLine) {
        let scale = PxScale::from(OVERLAY_TEXT_SCALE);
        // imageproc positions text by its top edge; overlay lines are baselines
        let ascent = self.font.as_scaled(scale).ascent().round() as i32;
        let top = line.y - ascent;
        let color = Rgb(line.color);

        // Double strike for a heavier stroke
        draw_text_mut(img, color, line.x, top, scale, &self.font, &line.text);
        draw_text_mut(img, color, line.x + 1, top, scale, &self.font, &line.text);
    }
}

impl FrameAnnotator for ImageprocAnnotator {
    fn annotate(
        &self,
        frame: Frame,
        detections: &DetectionSet,
        counts: ObjectCounts,
        status: CrowdStatus,
    ) -> Result<Frame, Box<dyn std::error::Error>> {
        if frame.is_degenerate() {
            return Err(format!(
                "cannot annotate a {}x{} frame",
                frame.width(),
                frame.height()
            )
            .into());
        }
        let index = frame.index();
        let width = frame.width();
        let mut img = frame
            .into_rgb_image()
            .ok_or("frame buffer does not match its dimensions")?;

        for detection in detections {
            self.draw_detection(&mut img, detection);
        }
        for line in overlay_lines(counts, status, width) {
            self.draw_overlay_line(&mut img, &line);
        }

        Ok(Frame::from_rgb_image(img, index))
    }
}
