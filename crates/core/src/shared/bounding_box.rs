/// Axis-aligned box in frame pixel coordinates, corners `(x1, y1)`-`(x2, y2)`.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct BoundingBox {
    pub x1: f64,
    pub y1: f64,
    pub x2: f64,
    pub y2: f64,
}

impl BoundingBox {
    pub fn new(x1: f64, y1: f64, x2: f64, y2: f64) -> Self {
        Self { x1, y1, x2, y2 }
    }

    /// Builds a box from YOLO's center/size encoding.
    pub fn from_center(cx: f64, cy: f64, w: f64, h: f64) -> Self {
        Self::new(cx - w / 2.0, cy - h / 2.0, cx + w / 2.0, cy + h / 2.0)
    }

    pub fn width(&self) -> f64 {
        (self.x2 - self.x1).max(0.0)
    }

    pub fn height(&self) -> f64 {
        (self.y2 - self.y1).max(0.0)
    }

    pub fn area(&self) -> f64 {
        self.width() * self.height()
    }

    pub fn iou(&self, other: &BoundingBox) -> f64 {
        let ix1 = self.x1.max(other.x1);
        let iy1 = self.y1.max(other.y1);
        let ix2 = self.x2.min(other.x2);
        let iy2 = self.y2.min(other.y2);

        let inter = (ix2 - ix1).max(0.0) * (iy2 - iy1).max(0.0);
        if inter == 0.0 {
            return 0.0;
        }
        inter / (self.area() + other.area() - inter)
    }

    /// Clips the box to a `width` x `height` frame.
    ///
    /// Returns `None` when nothing of the box remains visible.
    pub fn clamp_to(&self, width: u32, height: u32) -> Option<BoundingBox> {
        let w = width as f64;
        let h = height as f64;
        let clamped = BoundingBox::new(
            self.x1.clamp(0.0, w),
            self.y1.clamp(0.0, h),
            self.x2.clamp(0.0, w),
            self.y2.clamp(0.0, h),
        );
        if clamped.width() < 1.0 || clamped.height() < 1.0 {
            None
        } else {
            Some(clamped)
        }
    }

    /// Integer pixel rectangle `(x, y, w, h)` covering the box.
    pub fn to_pixel_rect(&self) -> (i32, i32, u32, u32) {
        let x = self.x1.round() as i32;
        let y = self.y1.round() as i32;
        let w = self.width().round().max(1.0) as u32;
        let h = self.height().round().max(1.0) as u32;
        (x, y, w, h)
    }
}
