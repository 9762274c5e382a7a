//! Comparator, landmark and report tests.

use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

use image::Rgb;
use vidcompare::landmarks::{compare_face_landmarks, landmark_distance};
use vidcompare::metrics::PSNR_IDENTICAL;
use vidcompare::{
    Comparator, CompareError, Frame, FrameMask, KeyColorMask, Landmark, LandmarkDetector,
    OperationType, ProgressCallback, ProgressInfo,
};

fn solid(value: u8) -> Frame {
    Frame::from_pixel(16, 16, Rgb([value, value, value]))
}

/// Places one landmark at `(red / 255, 0)`; frames with red == 0 have no face.
struct RedChannelDetector;

impl LandmarkDetector for RedChannelDetector {
    fn detect(&self, frame: &Frame) -> Result<Option<Vec<Landmark>>, CompareError> {
        let red = frame.get_pixel(0, 0).0[0];
        if red == 0 {
            return Ok(None);
        }
        Ok(Some(vec![Landmark::new(f64::from(red) / 255.0, 0.0)]))
    }
}

struct FailingDetector;

impl LandmarkDetector for FailingDetector {
    fn detect(&self, _frame: &Frame) -> Result<Option<Vec<Landmark>>, CompareError> {
        Err(CompareError::ExternalTool {
            tool: "face-api".to_string(),
            reason: "quota exceeded".to_string(),
        })
    }
}

// ── Landmarks ────────────────────────────────────────────────────

#[test]
fn landmark_distance_is_mean_euclidean() {
    let first = [Landmark::new(0.0, 0.0), Landmark::new(1.0, 1.0)];
    let second = [Landmark::new(0.3, 0.4), Landmark::new(1.0, 1.0)];
    let distance = landmark_distance(&first, &second).unwrap();
    assert!((distance - 0.25).abs() < 1e-12, "got {distance}");
}

#[test]
fn landmark_distance_needs_paired_points() {
    let one = [Landmark::new(0.0, 0.0)];
    let two = [Landmark::new(0.0, 0.0), Landmark::new(0.5, 0.5)];
    assert_eq!(landmark_distance(&one, &two), None);
    assert_eq!(landmark_distance(&[], &[]), None);
}

#[test]
fn compare_face_landmarks_without_face_is_none() {
    let result = compare_face_landmarks(&RedChannelDetector, &solid(0), &solid(100)).unwrap();
    assert_eq!(result, None);
}

#[test]
fn compare_face_landmarks_measures_distance() {
    let result = compare_face_landmarks(&RedChannelDetector, &solid(51), &solid(102)).unwrap();
    let distance = result.expect("both frames have a face");
    assert!((distance - 0.2).abs() < 1e-12, "got {distance}");
}

// ── Comparator ───────────────────────────────────────────────────

#[test]
fn compare_identical_sequences() {
    let frames = vec![solid(10), solid(20), solid(30)];
    let report = Comparator::new()
        .compare("clip.mp4", &frames, &frames)
        .unwrap();

    assert_eq!(report.video, "clip.mp4");
    assert_eq!(report.frames_compared, 3);
    assert_eq!(report.average_mse, Some(0.0));
    assert_eq!(report.average_psnr, Some(PSNR_IDENTICAL));
    assert!((report.average_ssim.unwrap() - 1.0).abs() < 1e-9);
    assert_eq!(report.average_landmark_difference, None);
    let numbers: Vec<usize> = report.frames.iter().map(|m| m.frame).collect();
    assert_eq!(numbers, vec![1, 2, 3]);
}

#[test]
fn compare_uses_shorter_sequence() {
    let generated = vec![solid(10), solid(10)];
    let reference = vec![solid(10), solid(10), solid(10), solid(10)];
    let report = Comparator::new()
        .compare("short.mp4", &generated, &reference)
        .unwrap();
    assert_eq!(report.frames_compared, 2);
}

#[test]
fn compare_empty_sequence_has_no_averages() {
    let report = Comparator::new()
        .compare("empty.mp4", &[], &[solid(0)])
        .unwrap();
    assert_eq!(report.frames_compared, 0);
    assert_eq!(report.average_mse, None);
    assert_eq!(report.average_psnr, None);
    assert_eq!(report.average_ssim, None);
}

#[test]
fn compare_averages_per_frame_metrics() {
    let generated = vec![solid(20), solid(10)];
    let reference = vec![solid(10), solid(10)];
    let report = Comparator::new()
        .compare("avg.mp4", &generated, &reference)
        .unwrap();

    // Frame 1: 3 * 10^2 per pixel, frame 2: identical.
    assert_eq!(report.frames[0].mse, 300.0);
    assert_eq!(report.frames[1].mse, 0.0);
    assert_eq!(report.average_mse, Some(150.0));
}

#[test]
fn landmark_average_skips_frames_without_face() {
    let generated = vec![solid(51), solid(0), solid(51)];
    let reference = vec![solid(102), solid(102), solid(153)];
    let report = Comparator::new()
        .with_landmark_detector(Arc::new(RedChannelDetector))
        .compare("faces.mp4", &generated, &reference)
        .unwrap();

    assert_eq!(report.frames[1].landmark_difference, None);
    let average = report.average_landmark_difference.unwrap();
    // (0.2 + 0.4) / 2
    assert!((average - 0.3).abs() < 1e-12, "got {average}");
}

#[test]
fn detector_failure_counts_as_no_landmarks() {
    let frames = vec![solid(40), solid(50)];
    let report = Comparator::new()
        .with_landmark_detector(Arc::new(FailingDetector))
        .compare("offline.mp4", &frames, &frames)
        .unwrap();

    assert_eq!(report.frames_compared, 2);
    assert!(report.frames.iter().all(|m| m.landmark_difference.is_none()));
    assert_eq!(report.average_landmark_difference, None);
}

#[test]
fn compare_rejects_mismatched_frame_shapes() {
    let generated = vec![Frame::new(16, 16)];
    let reference = vec![Frame::new(8, 8)];
    let result = Comparator::new().compare("resized.mp4", &generated, &reference);
    assert!(matches!(result, Err(CompareError::DimensionMismatch { .. })));
}

// ── Masking ──────────────────────────────────────────────────────

/// Keeps only the left half of a frame.
fn left_half(frame: &Frame) -> Result<Frame, CompareError> {
    let mut masked = frame.clone();
    let half = frame.width() / 2;
    for (x, _, pixel) in masked.enumerate_pixels_mut() {
        if x >= half {
            *pixel = Rgb([0, 0, 0]);
        }
    }
    Ok(masked)
}

/// Reference and generated frames that only differ on their right half.
fn differing_right_half(value: u8) -> (Frame, Frame) {
    let reference = solid(value);
    let mut generated = reference.clone();
    for (x, _, pixel) in generated.enumerate_pixels_mut() {
        if x >= 8 {
            *pixel = Rgb([255, 0, 255]);
        }
    }
    (generated, reference)
}

#[test]
fn mask_is_applied_to_both_frames_before_metrics() {
    let (generated, reference) = differing_right_half(40);

    let unmasked = Comparator::new()
        .compare("unmasked.mp4", &[generated.clone()], &[reference.clone()])
        .unwrap();
    assert!(unmasked.average_mse.unwrap() > 0.0);

    let masked = Comparator::new()
        .with_mask(Arc::new(left_half))
        .compare("masked.mp4", &[generated], &[reference])
        .unwrap();
    assert_eq!(masked.average_mse, Some(0.0));
    assert_eq!(masked.average_psnr, Some(PSNR_IDENTICAL));
}

#[test]
fn landmarks_see_masked_frames() {
    // The detector reads pixel (0, 0); masking it out removes the face.
    let blank_corner = |frame: &Frame| -> Result<Frame, CompareError> {
        let mut masked = frame.clone();
        masked.put_pixel(0, 0, Rgb([0, 0, 0]));
        Ok(masked)
    };
    let frames = vec![solid(51)];
    let report = Comparator::new()
        .with_landmark_detector(Arc::new(RedChannelDetector))
        .with_mask(Arc::new(blank_corner))
        .compare("masked_faces.mp4", &frames, &frames)
        .unwrap();
    assert_eq!(report.average_landmark_difference, None);
}

#[test]
fn key_color_mask_ignores_backdrop_differences() {
    let backdrop = Rgb([0, 177, 64]);
    let mut generated = Frame::from_pixel(16, 16, backdrop);
    let mut reference = Frame::from_pixel(16, 16, Rgb([0, 180, 60]));
    for frame in [&mut generated, &mut reference] {
        frame.put_pixel(8, 8, Rgb([200, 120, 90]));
    }

    let report = Comparator::new()
        .with_mask(Arc::new(KeyColorMask::new(backdrop).with_tolerance(5)))
        .compare("backdrop.mp4", &[generated], &[reference])
        .unwrap();
    assert_eq!(report.average_mse, Some(0.0));
}

struct FailingMask;

impl FrameMask for FailingMask {
    fn mask(&self, _frame: &Frame) -> Result<Frame, CompareError> {
        Err(CompareError::ExternalTool {
            tool: "segmenter".to_string(),
            reason: "model not loaded".to_string(),
        })
    }
}

#[test]
fn mask_failure_fails_the_comparison() {
    let frames = vec![solid(10), solid(20)];
    let result = Comparator::new()
        .with_mask(Arc::new(FailingMask))
        .compare("unmaskable.mp4", &frames, &frames);
    assert!(matches!(result, Err(CompareError::ExternalTool { .. })));
}

// ── Progress ─────────────────────────────────────────────────────

#[derive(Default)]
struct CountingProgress {
    calls: AtomicU64,
    last_operation: std::sync::Mutex<Option<OperationType>>,
}

impl ProgressCallback for CountingProgress {
    fn on_progress(&self, info: &ProgressInfo) {
        self.calls.fetch_add(1, Ordering::SeqCst);
        *self.last_operation.lock().unwrap() = Some(info.operation);
    }
}

#[test]
fn comparison_reports_progress_per_frame() {
    let progress = Arc::new(CountingProgress::default());
    let frames = vec![solid(1), solid(2), solid(3), solid(4)];
    Comparator::new()
        .with_progress(progress.clone())
        .compare("progress.mp4", &frames, &frames)
        .unwrap();

    assert_eq!(progress.calls.load(Ordering::SeqCst), 5);
    assert_eq!(
        *progress.last_operation.lock().unwrap(),
        Some(OperationType::Comparison)
    );
}

// ── Reports ──────────────────────────────────────────────────────

#[test]
fn report_serializes_to_json() {
    let frames = vec![solid(10)];
    let report = Comparator::new()
        .compare("json.mp4", &frames, &frames)
        .unwrap();

    let value = serde_json::to_value(&report).unwrap();
    assert_eq!(value["video"], "json.mp4");
    assert_eq!(value["frames_compared"], 1);
    assert_eq!(value["frames"][0]["frame"], 1);
    assert!(value["average_landmark_difference"].is_null());
}
