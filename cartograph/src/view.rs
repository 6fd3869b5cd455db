use cartograph_types::{Rect, Size};
use nalgebra::Point2;

/// Maps dataset coordinates onto the pixels of a canvas.
///
/// The view is centered on a map point and has a uniform resolution (map units per pixel) on
/// both axes, so shapes are never stretched. The Y axis is flipped: map Y grows up, pixel Y
/// grows down.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CanvasView {
    center: Point2<f64>,
    resolution: f64,
    size: Size,
}

impl CanvasView {
    /// Creates a view with the given center point and resolution.
    pub fn new(center: Point2<f64>, resolution: f64, size: Size<u32>) -> Self {
        Self {
            center,
            resolution,
            size: Size::new(f64::from(size.width()), f64::from(size.height())),
        }
    }

    /// Creates the view that shows the whole `extent` on a canvas of the given size, as large
    /// as possible without distortion and centered along the axis with spare room.
    ///
    /// An extent with zero width and height (e.g. a single point) is shown at one map unit per
    /// pixel.
    pub fn fit(extent: &Rect, size: Size<u32>) -> Self {
        let width = f64::from(size.width().max(1));
        let height = f64::from(size.height().max(1));

        let resolution = (extent.width() / width).max(extent.height() / height);
        let resolution = if resolution > 0.0 && resolution.is_finite() {
            resolution
        } else {
            1.0
        };

        Self::new(extent.center(), resolution, size)
    }

    /// Map point at the center of the canvas.
    pub fn center(&self) -> Point2<f64> {
        self.center
    }

    /// Map units per pixel.
    pub fn resolution(&self) -> f64 {
        self.resolution
    }

    /// Canvas size in pixels.
    pub fn size(&self) -> Size {
        self.size
    }

    /// Pixel position of a map point. The pixel grid starts at the top left corner of the
    /// canvas.
    pub fn map_to_screen(&self, point: Point2<f64>) -> Point2<f64> {
        Point2::new(
            (point.x - self.center.x) / self.resolution + self.size.half_width(),
            self.size.half_height() - (point.y - self.center.y) / self.resolution,
        )
    }

    /// Map point at a pixel position.
    pub fn screen_to_map(&self, px_position: Point2<f64>) -> Point2<f64> {
        Point2::new(
            self.center.x + (px_position.x - self.size.half_width()) * self.resolution,
            self.center.y + (self.size.half_height() - px_position.y) * self.resolution,
        )
    }

    /// Map area covered by the canvas.
    pub fn bbox(&self) -> Rect {
        Rect::from_corners(
            self.screen_to_map(Point2::new(0.0, 0.0)),
            self.screen_to_map(Point2::new(self.size.width(), self.size.height())),
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_abs_diff_eq;

    #[test]
    fn fit_wide_extent() {
        let view = CanvasView::fit(&Rect::new(0.0, 0.0, 200.0, 50.0), Size::new(100, 100));
        assert_abs_diff_eq!(view.resolution(), 2.0);

        let top_left = view.map_to_screen(Point2::new(0.0, 50.0));
        assert_abs_diff_eq!(top_left.x, 0.0);
        assert_abs_diff_eq!(top_left.y, 37.5);

        let bottom_right = view.map_to_screen(Point2::new(200.0, 0.0));
        assert_abs_diff_eq!(bottom_right.x, 100.0);
        assert_abs_diff_eq!(bottom_right.y, 62.5);
    }

    #[test]
    fn fit_covers_extent() {
        let extent = Rect::new(-10.0, 5.0, 30.0, 85.0);
        let view = CanvasView::fit(&extent, Size::new(640, 480));
        let bbox = view.bbox();

        assert!(bbox.x_min() <= extent.x_min() && bbox.x_max() >= extent.x_max());
        assert_abs_diff_eq!(bbox.y_min(), extent.y_min(), epsilon = 1e-9);
        assert_abs_diff_eq!(bbox.y_max(), extent.y_max(), epsilon = 1e-9);
    }

    #[test]
    fn screen_to_map_inverts_map_to_screen() {
        let view = CanvasView::new(Point2::new(12.0, -3.0), 0.25, Size::new(300, 200));
        let point = Point2::new(20.5, 1.75);
        let back = view.screen_to_map(view.map_to_screen(point));
        assert_abs_diff_eq!(back.x, point.x, epsilon = 1e-9);
        assert_abs_diff_eq!(back.y, point.y, epsilon = 1e-9);
    }

    #[test]
    fn degenerate_extent() {
        let view = CanvasView::fit(&Rect::new(5.0, 5.0, 5.0, 5.0), Size::new(10, 10));
        assert_abs_diff_eq!(view.resolution(), 1.0);
        let center = view.map_to_screen(Point2::new(5.0, 5.0));
        assert_abs_diff_eq!(center.x, 5.0);
        assert_abs_diff_eq!(center.y, 5.0);
    }
}
