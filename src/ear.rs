//! Eye aspect ratio estimation
//!
//! Turns six contour points per eye into a scalar openness ratio. Open eyes
//! sit around 0.25-0.35, closed eyes drop towards zero.

use crate::types::{EyeContour, EyeLandmarks, Point};

/// Guards the horizontal span against degenerate geometry
pub const EAR_EPSILON: f64 = 1e-6;

/// Face Mesh indices of the right eye contour, `p1..p6` order
pub const RIGHT_EYE_LANDMARKS: [usize; 6] = [33, 160, 158, 133, 153, 144];

/// Face Mesh indices of the left eye contour, `p1..p6` order
pub const LEFT_EYE_LANDMARKS: [usize; 6] = [362, 385, 387, 263, 373, 380];

/// EAR of a single eye: `(|p2-p6| + |p3-p5|) / (2|p1-p4| + eps)`
pub fn eye_aspect_ratio(eye: &EyeContour) -> f64 {
    let vertical_a = eye[1].distance(&eye[5]);
    let vertical_b = eye[2].distance(&eye[4]);
    let horizontal = eye[0].distance(&eye[3]);
    (vertical_a + vertical_b) / (2.0 * horizontal + EAR_EPSILON)
}

/// Average EAR over both eyes
pub fn average_ear(landmarks: &EyeLandmarks) -> f64 {
    (eye_aspect_ratio(&landmarks.left) + eye_aspect_ratio(&landmarks.right)) / 2.0
}

/// Pick both eye contours out of a full face mesh.
///
/// Returns `None` when the mesh does not contain the required indices,
/// which callers treat the same as "no face".
pub fn extract_eye_landmarks(mesh: &[Point]) -> Option<EyeLandmarks> {
    Some(EyeLandmarks {
        left: pick(mesh, &LEFT_EYE_LANDMARKS)?,
        right: pick(mesh, &RIGHT_EYE_LANDMARKS)?,
    })
}

fn pick(mesh: &[Point], indices: &[usize; 6]) -> Option<EyeContour> {
    let mut contour = [Point::default(); 6];
    for (slot, &idx) in contour.iter_mut().zip(indices.iter()) {
        *slot = *mesh.get(idx)?;
    }
    Some(contour)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn eye(height: f64) -> EyeContour {
        [
            Point::new(0.0, 0.0),
            Point::new(1.0, height),
            Point::new(2.0, height),
            Point::new(3.0, 0.0),
            Point::new(2.0, -height),
            Point::new(1.0, -height),
        ]
    }

    #[test]
    fn test_open_eye_ratio() {
        // vertical spans are 2h each, horizontal span is 3
        let ear = eye_aspect_ratio(&eye(0.45));
        assert!((ear - (0.9 + 0.9) / 6.0).abs() < 1e-6);
    }

    #[test]
    fn test_closed_eye_ratio_is_zero() {
        assert!(eye_aspect_ratio(&eye(0.0)).abs() < 1e-12);
    }

    #[test]
    fn test_degenerate_geometry_does_not_divide_by_zero() {
        let collapsed = [Point::new(1.0, 1.0); 6];
        let ear = eye_aspect_ratio(&collapsed);
        assert!(ear.is_finite());
        assert_eq!(ear, 0.0);
    }

    #[test]
    fn test_average_of_both_eyes() {
        let landmarks = EyeLandmarks {
            left: eye(0.3),
            right: eye(0.6),
        };
        let expected = (eye_aspect_ratio(&eye(0.3)) + eye_aspect_ratio(&eye(0.6))) / 2.0;
        assert!((average_ear(&landmarks) - expected).abs() < 1e-12);
    }

    #[test]
    fn test_extract_from_mesh() {
        let mesh: Vec<Point> = (0..468).map(|i| Point::new(i as f64, 0.0)).collect();
        let landmarks = extract_eye_landmarks(&mesh).unwrap();
        assert_eq!(landmarks.right[0].x, 33.0);
        assert_eq!(landmarks.left[3].x, 263.0);

        assert!(extract_eye_landmarks(&mesh[..100]).is_none());
    }
}
