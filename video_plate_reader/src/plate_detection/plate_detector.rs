use opencv::core::count_non_zero;
use opencv::core::find_non_zero;
use opencv::core::Point;
use opencv::core::Rect;
use opencv::core::Scalar;
use opencv::core::Size;
use opencv::core::Vector;
use opencv::core::BORDER_DEFAULT;
use opencv::core::CV_8UC1;

use opencv::imgproc::approx_poly_dp;
use opencv::imgproc::arc_length;
use opencv::imgproc::bilateral_filter;
use opencv::imgproc::bounding_rect;
use opencv::imgproc::canny;
use opencv::imgproc::contour_area;
use opencv::imgproc::cvt_color;
use opencv::imgproc::draw_contours;
use opencv::imgproc::find_contours;
use opencv::imgproc::resize;
use opencv::imgproc::CHAIN_APPROX_SIMPLE;
use opencv::imgproc::COLOR_BGR2GRAY;
use opencv::imgproc::INTER_AREA;
use opencv::imgproc::LINE_8;
use opencv::imgproc::RETR_TREE;

use opencv::prelude::Mat;
use opencv::prelude::MatTraitConst;

use crate::config::DetectorConfig;
use crate::error::PlateError;

/// Cropped grayscale region around an accepted four sided contour.
///
/// `boundary` and `bounding_box` are in working-resolution coordinates, i.e.
/// after the frame has been resized to the configured working width.
#[derive(Debug)]
pub struct PlateCandidate {
    pub boundary: Vector<Point>,
    pub bounding_box: Rect,
    pub region: Mat,
}

/// Finds the plate-like quadrilateral in a frame.
///
/// The search is greedy: contours are ranked by enclosed area and the first
/// one whose polygon approximation has four vertices wins, even if a larger
/// four sided shape sits further down the ranking.
#[derive(Debug, Clone, Default)]
pub struct PlateDetector {
    config: DetectorConfig,
}

impl PlateDetector {
    pub fn new(config: DetectorConfig) -> Self {
        return PlateDetector { config };
    }

    pub fn detect(&self, image: &Mat) -> Result<Option<PlateCandidate>, PlateError> {
        if image.empty() {
            return Ok(None);
        }
        let resized = self.resize_to_working_width(image)?;
        let smoothed = self.smoothed_gray(&resized)?;

        let mut edges = Mat::default();
        canny(
            &smoothed,
            &mut edges,
            self.config.canny_low,
            self.config.canny_high,
            3,
            false,
        )?;

        let contours = self.largest_contours(&edges)?;
        let boundary = match self.first_quadrilateral(&contours)? {
            Some(boundary) => boundary,
            None => return Ok(None),
        };

        crop_to_boundary(&smoothed, boundary)
    }

    fn resize_to_working_width(&self, image: &Mat) -> Result<Mat, PlateError> {
        let width = self.config.working_width;
        let ratio = width as f64 / image.cols() as f64;
        let height = ((image.rows() as f64 * ratio) as i32).max(1);

        let mut resized = Mat::default();
        resize(
            image,
            &mut resized,
            Size::new(width, height),
            0.0,
            0.0,
            INTER_AREA,
        )?;
        Ok(resized)
    }

    fn smoothed_gray(&self, image: &Mat) -> Result<Mat, PlateError> {
        let grey = if image.channels() == 1 {
            image.try_clone()?
        } else {
            let mut grey = Mat::default();
            cvt_color(image, &mut grey, COLOR_BGR2GRAY, 0)?;
            grey
        };

        let mut smoothed = Mat::default();
        bilateral_filter(
            &grey,
            &mut smoothed,
            self.config.bilateral_diameter,
            self.config.sigma_color,
            self.config.sigma_space,
            BORDER_DEFAULT,
        )?;
        Ok(smoothed)
    }

    /// Every contour in the edge map, largest enclosed area first, truncated to
    /// `max_contours`. Equal areas keep their extraction order.
    fn largest_contours(&self, edges: &Mat) -> Result<Vec<Vector<Point>>, PlateError> {
        let mut contours = Vector::<Vector<Point>>::new();
        find_contours(
            edges,
            &mut contours,
            RETR_TREE,
            CHAIN_APPROX_SIMPLE,
            Point::default(),
        )?;

        let mut ranked = Vec::with_capacity(contours.len());
        for contour in contours {
            let area = contour_area(&contour, false)?;
            ranked.push((area, contour));
        }
        ranked.sort_by(|a, b| b.0.total_cmp(&a.0));
        ranked.truncate(self.config.max_contours);

        Ok(ranked.into_iter().map(|(_, contour)| contour).collect())
    }

    fn first_quadrilateral(
        &self,
        contours: &[Vector<Point>],
    ) -> Result<Option<Vector<Point>>, PlateError> {
        for contour in contours {
            let perimeter = arc_length(contour, true)?;
            let mut approx = Vector::<Point>::new();
            approx_poly_dp(
                contour,
                &mut approx,
                self.config.approx_ratio * perimeter,
                true,
            )?;
            if approx.len() == 4 {
                return Ok(Some(approx));
            }
        }
        Ok(None)
    }
}

/// Fills the boundary into a mask and crops `grey` to the tightest box around
/// the mask. An empty mask yields no candidate. The crop is taken from the
/// unmasked image, so pixels outside the quadrilateral but inside its box stay.
fn crop_to_boundary(
    grey: &Mat,
    boundary: Vector<Point>,
) -> Result<Option<PlateCandidate>, PlateError> {
    let mut mask =
        Mat::new_rows_cols_with_default(grey.rows(), grey.cols(), CV_8UC1, Scalar::all(0.0))?;
    let mut polygons = Vector::<Vector<Point>>::new();
    polygons.push(boundary.clone());
    draw_contours(
        &mut mask,
        &polygons,
        0,
        Scalar::all(255.0),
        -1,
        LINE_8,
        &Mat::default(),
        i32::MAX,
        Point::default(),
    )?;

    if count_non_zero(&mask)? == 0 {
        log::debug!("accepted quadrilateral produced an empty mask");
        return Ok(None);
    }

    let mut inside = Vector::<Point>::new();
    find_non_zero(&mask, &mut inside)?;
    let bounding_box = bounding_rect(&inside)?;
    if bounding_box.width <= 0 || bounding_box.height <= 0 {
        return Ok(None);
    }

    let region = grey.apply_1(bounding_box)?.try_clone()?;
    Ok(Some(PlateCandidate {
        boundary,
        bounding_box,
        region,
    }))
}

#[cfg(test)]
mod tests {
    use super::*;
    use opencv::core::CV_8UC3;
    use opencv::imgproc::rectangle;
    use opencv::prelude::MatTraitConstManual;

    fn blank_frame() -> Mat {
        Mat::new_rows_cols_with_default(480, 640, CV_8UC3, Scalar::all(0.0)).unwrap()
    }

    fn frame_with_plate() -> Mat {
        let mut frame = blank_frame();
        rectangle(
            &mut frame,
            Rect::new(200, 180, 240, 80),
            Scalar::all(255.0),
            -1,
            LINE_8,
            0,
        )
        .unwrap();
        frame
    }

    #[test]
    fn blank_frame_has_no_candidate() {
        let detector = PlateDetector::default();
        assert!(detector.detect(&blank_frame()).unwrap().is_none());
    }

    #[test]
    fn empty_mat_has_no_candidate() {
        let detector = PlateDetector::default();
        assert!(detector.detect(&Mat::default()).unwrap().is_none());
    }

    #[test]
    fn finds_axis_aligned_rectangle() {
        let detector = PlateDetector::default();
        let candidate = detector.detect(&frame_with_plate()).unwrap().unwrap();

        assert_eq!(candidate.boundary.len(), 4);
        // 640 -> 620 scales the 240x80 rectangle at (200, 180) by 0.96875.
        let bbox = candidate.bounding_box;
        assert!((bbox.x - 194).abs() <= 4, "x = {}", bbox.x);
        assert!((bbox.y - 174).abs() <= 4, "y = {}", bbox.y);
        assert!((bbox.width - 233).abs() <= 8, "width = {}", bbox.width);
        assert!((bbox.height - 78).abs() <= 8, "height = {}", bbox.height);
        assert_eq!(candidate.region.rows(), bbox.height);
        assert_eq!(candidate.region.cols(), bbox.width);
        assert_eq!(candidate.region.channels(), 1);
    }

    #[test]
    fn detection_is_deterministic() {
        let detector = PlateDetector::default();
        let frame = frame_with_plate();
        let first = detector.detect(&frame).unwrap().unwrap();
        let second = detector.detect(&frame).unwrap().unwrap();

        assert_eq!(first.bounding_box, second.bounding_box);
        assert_eq!(first.boundary.to_vec(), second.boundary.to_vec());
        assert_eq!(
            first.region.data_bytes().unwrap(),
            second.region.data_bytes().unwrap()
        );
    }

    #[test]
    fn grayscale_input_is_accepted() {
        let mut frame =
            Mat::new_rows_cols_with_default(240, 320, CV_8UC1, Scalar::all(0.0)).unwrap();
        rectangle(
            &mut frame,
            Rect::new(80, 90, 160, 50),
            Scalar::all(255.0),
            -1,
            LINE_8,
            0,
        )
        .unwrap();
        let candidate = PlateDetector::default().detect(&frame).unwrap();
        assert!(candidate.is_some());
    }
}
