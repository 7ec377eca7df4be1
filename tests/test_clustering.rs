use emissions::core::clustering::{ClusterDetector, FeatureScaling};
use emissions::{ClusteringParams, EmissionsError, RawFieldSet};
use ndarray::{Array1, Array2};

/// Scan with a background of low readings and one elevated patch.
///
/// Pixels are spread on a regular lon/lat grid, one scanline per 840 ms.
fn plume_scan(lines: usize, pixels: usize) -> RawFieldSet {
    let value = Array2::from_shape_fn((lines, pixels), |(l, p)| {
        if (2..5).contains(&l) && (2..5).contains(&p) {
            0.20
        } else {
            0.02
        }
    });
    let longitude = Array2::from_shape_fn((lines, pixels), |(_, p)| 10.0 + p as f64 * 0.04);
    let latitude = Array2::from_shape_fn((lines, pixels), |(l, _)| 45.0 + l as f64 * 0.04);
    let quality = Array2::from_elem((lines, pixels), 1.0);
    let delta_time = Array1::from_shape_fn(lines, |l| l as f64 * 840.0);
    let valid = Array2::from_elem((lines, pixels), true);

    RawFieldSet::new(value, longitude, latitude, quality, delta_time, valid).unwrap()
}

#[test]
fn test_detects_elevated_patch() {
    let _ = env_logger::builder().is_test(true).try_init();

    let mut fields = plume_scan(8, 8);
    // Shrink the time column so one scanline step stays within eps
    fields.delta_time.mapv_inplace(|t| t / 1.0e4);
    let params = ClusteringParams {
        eps: 0.1,
        min_samples: 3,
        scaling: FeatureScaling::Raw,
        max_silhouette_samples: 1_000,
    };

    let report = ClusterDetector::new(params).unwrap().detect(&fields).unwrap();

    assert_eq!(report.assignments.len(), 64);
    assert_eq!(report.cluster_count, 2);
    assert_eq!(report.noise_count, 0);

    let patch_label = report
        .assignments
        .iter()
        .find(|a| a.line == 3 && a.pixel == 3)
        .unwrap()
        .cluster;
    let patch_members = report
        .assignments
        .iter()
        .filter(|a| a.cluster == patch_label)
        .count();
    assert_eq!(patch_members, 9);

    let silhouette = report.silhouette.expect("two clusters give a silhouette");
    assert!(silhouette > -1.0 && silhouette <= 1.0);
}

#[test]
fn test_raw_scaling_dominated_by_time() {
    // In native units a scanline step of 840 ms dwarfs every other column, so
    // no pixel has a neighbour on another line and each line splits apart.
    let fields = plume_scan(6, 6);
    let params = ClusteringParams {
        eps: 1.0,
        min_samples: 2,
        scaling: FeatureScaling::Raw,
        max_silhouette_samples: 1_000,
    };
    let report = ClusterDetector::new(params).unwrap().detect(&fields).unwrap();
    assert_eq!(report.cluster_count, 6);

    for line in 0..6 {
        let labels: Vec<_> = report
            .assignments
            .iter()
            .filter(|a| a.line == line)
            .map(|a| a.cluster)
            .collect();
        assert!(labels.iter().all(|l| *l == labels[0] && l.is_some()));
    }
}

#[test]
fn test_invalid_pixels_are_skipped() {
    let mut fields = plume_scan(4, 4);
    fields.valid[[0, 0]] = false;
    fields.valid[[3, 3]] = false;

    let report = ClusterDetector::new(ClusteringParams::default())
        .unwrap()
        .detect(&fields)
        .unwrap();
    assert_eq!(report.assignments.len(), 14);
    assert_eq!(report.labels().len(), 14);
    assert!(report.assignments.iter().all(|a| (a.line, a.pixel) != (0, 0)));
}

#[test]
fn test_insufficient_data() {
    let fields = plume_scan(2, 2);
    let params = ClusteringParams {
        min_samples: 5,
        ..ClusteringParams::default()
    };

    match ClusterDetector::new(params).unwrap().detect(&fields) {
        Err(EmissionsError::InsufficientData { found, required }) => {
            assert_eq!(found, 4);
            assert_eq!(required, 5);
        }
        other => panic!("expected InsufficientData, got {:?}", other),
    }
}

#[test]
fn test_invalid_parameters() {
    let params = ClusteringParams {
        min_samples: 0,
        ..ClusteringParams::default()
    };
    assert!(matches!(
        ClusterDetector::new(params),
        Err(EmissionsError::Config(_))
    ));
}

#[test]
fn test_full_width_scanlines() {
    // A real swath is far wider than a KD-tree leaf, and every pixel on a line
    // shares the same delta time.
    let fields = plume_scan(10, 215);

    let raw = ClusteringParams {
        eps: 1.0,
        min_samples: 2,
        scaling: FeatureScaling::Raw,
        max_silhouette_samples: 1_000,
    };
    let report = ClusterDetector::new(raw).unwrap().detect(&fields).unwrap();
    assert_eq!(report.assignments.len(), 10 * 215);
    assert_eq!(report.cluster_count, 10);
    assert_eq!(report.noise_count, 0);

    let standardized = ClusteringParams {
        scaling: FeatureScaling::Standardize,
        ..ClusteringParams::default()
    };
    let report = ClusterDetector::new(standardized)
        .unwrap()
        .detect(&fields)
        .unwrap();
    assert_eq!(report.assignments.len(), 10 * 215);
    assert_eq!(report.labels().len(), 10 * 215);
}
