mod common;

use common::*;
use image::Rgb;
use std::collections::HashSet;

fn pixel_count(bundle: &ResultBundle, label: u32) -> u32 {
    bundle.label_map.pixels().filter(|p| p[0] == label).count() as u32
}

#[test]
fn test_blank_plate_has_no_colonies() {
    let bundle = analyze(blank_plate(200, 200), &AnalysisConfig::default()).unwrap();

    assert_eq!(bundle.total_colonies(), 0);
    assert!(bundle.top_colonies.is_empty());
    assert!(bundle.label_map.pixels().all(|p| p[0] == 0));

    let summary = bundle.summary();
    assert_eq!(summary.total_colonies, 0);
    assert_eq!(summary.average_area, 0.0);
}

#[test]
fn test_two_round_colonies() {
    let bundle = analyze(two_colonies(), &AnalysisConfig::default()).unwrap();

    assert_eq!(bundle.total_colonies(), 2);
    for colony in &bundle.colonies {
        let area = colony.region.area;
        assert!((400..=600).contains(&area), "area {area} far from the drawn disc");

        let morphology = colony.morphology.as_ref().unwrap();
        assert_eq!(morphology.form, ColonyForm::Circular);
        assert_eq!(morphology.margin, ColonyMargin::Entire);
    }

    // label 1 is the upper-left disc
    let (row, col) = bundle.colony(1).unwrap().region.centroid;
    assert!((row - 70.0).abs() < 2.0 && (col - 70.0).abs() < 2.0);
}

#[test]
fn test_touching_colonies_are_split() {
    let bundle = analyze(touching_colonies(), &AnalysisConfig::default()).unwrap();
    assert_eq!(bundle.total_colonies(), 2);

    let config = AnalysisConfig {
        watershed: false,
        ..Default::default()
    };
    let merged = analyze(touching_colonies(), &config).unwrap();
    assert_eq!(merged.total_colonies(), 1);
}

#[test]
fn test_label_map_agrees_with_regions() {
    let bundle = analyze(mixed_colonies(), &AnalysisConfig::default()).unwrap();
    assert_eq!(bundle.total_colonies(), 5);

    let labels: Vec<u32> = bundle.colonies.iter().map(|c| c.label()).collect();
    assert_eq!(labels, (1..=5).collect::<Vec<u32>>());

    for colony in &bundle.colonies {
        assert_eq!(colony.region.area, pixel_count(&bundle, colony.label()));
        assert!(colony.region.convex_area >= colony.region.area);
        let morphology = colony.morphology.as_ref().unwrap();
        assert!((0.0..=1.0).contains(&morphology.circularity));
        assert!(morphology.aspect_ratio >= 1.0);
    }
    let max_label = bundle.label_map.pixels().map(|p| p[0]).max().unwrap();
    assert_eq!(max_label, 5);
}

#[test]
fn test_elongated_colony_is_not_round() {
    let bundle = analyze(mixed_colonies(), &AnalysisConfig::default()).unwrap();

    let elongated = bundle
        .colonies
        .iter()
        .max_by(|a, b| {
            let ra = a.morphology.as_ref().unwrap().aspect_ratio;
            let rb = b.morphology.as_ref().unwrap().aspect_ratio;
            ra.total_cmp(&rb)
        })
        .unwrap();

    let (row, col) = elongated.region.centroid;
    assert!((row - 170.0).abs() < 3.0 && (col - 160.0).abs() < 3.0);
    let morphology = elongated.morphology.as_ref().unwrap();
    assert!(morphology.aspect_ratio > 2.0);
    assert_ne!(morphology.form, ColonyForm::Circular);
    assert_ne!(morphology.form, ColonyForm::Oval);
}

#[test]
fn test_top_selection_is_capped_by_colony_count() {
    let config = AnalysisConfig {
        n_top_colonies: 5,
        ..Default::default()
    };
    let image = plate_with_discs(
        200,
        200,
        &[(60.0, 60.0, 8.0), (140.0, 60.0, 10.0), (100.0, 140.0, 12.0)],
    );
    let bundle = analyze(image, &config).unwrap();

    assert_eq!(bundle.total_colonies(), 3);
    assert_eq!(bundle.top_colonies.len(), 3);
    let unique: HashSet<u32> = bundle.top_colonies.iter().copied().collect();
    assert_eq!(unique.len(), 3);
}

#[test]
fn test_zero_penalty_ranks_purely_by_interest() {
    let config = AnalysisConfig {
        penalty_factor: 0.0,
        n_top_colonies: 3,
        ..Default::default()
    };
    let bundle = analyze(mixed_colonies(), &config).unwrap();

    let mut expected: Vec<(f64, u32)> = bundle.colonies.iter().map(|c| (c.bio_interest(), c.label())).collect();
    expected.sort_by(|a, b| b.0.total_cmp(&a.0).then(a.1.cmp(&b.1)));
    let expected: Vec<u32> = expected.iter().take(3).map(|(_, label)| *label).collect();

    assert_eq!(bundle.top_colonies, expected);
}

#[test]
fn test_every_colony_gets_a_unique_rank() {
    let bundle = analyze(mixed_colonies(), &AnalysisConfig::default()).unwrap();

    let mut ranks: Vec<usize> = bundle
        .colonies
        .iter()
        .map(|c| c.score.as_ref().unwrap().rank)
        .collect();
    ranks.sort_unstable();
    assert_eq!(ranks, (1..=bundle.total_colonies()).collect::<Vec<_>>());

    for colony in &bundle.colonies {
        let bio = colony.bio_interest();
        assert!((0.0..=1.0).contains(&bio), "bio interest {bio} out of range");
    }
}

#[test]
fn test_color_clusters_are_deterministic() {
    let image = plate_with_colored_discs(
        220,
        220,
        &[
            ((60.0, 60.0, 10.0), Rgb([230, 220, 200])),
            ((160.0, 60.0, 10.0), Rgb([235, 225, 205])),
            ((60.0, 160.0, 10.0), Rgb([200, 60, 50])),
            ((160.0, 160.0, 10.0), Rgb([60, 200, 70])),
        ],
    );
    let config = AnalysisConfig {
        color_n_clusters: 3,
        ..Default::default()
    };

    let first = analyze(image.clone(), &config).unwrap();
    let second = analyze(image, &config).unwrap();

    let clusters = |bundle: &ResultBundle| -> Vec<usize> {
        bundle
            .colonies
            .iter()
            .map(|c| c.color.as_ref().unwrap().color_cluster)
            .collect()
    };
    assert_eq!(first.total_colonies(), 4);
    assert_eq!(clusters(&first), clusters(&second));
    assert_eq!(first.color_clusters, Some(3));
}

#[test]
fn test_skipped_analyses_leave_records_empty() {
    let config = AnalysisConfig {
        run_color_analysis: false,
        run_density_analysis: false,
        ..Default::default()
    };
    let bundle = analyze(two_colonies(), &config).unwrap();

    assert_eq!(bundle.total_colonies(), 2);
    assert!(!bundle.stages.color && !bundle.stages.density);
    for colony in &bundle.colonies {
        assert!(colony.color.is_none());
        assert!(colony.density.is_none());
        assert!(colony.morphology.is_some());
        assert!(colony.score.is_some());
    }
    let summary = bundle.summary();
    assert!(summary.color_clusters.is_none());
    assert!(summary.dense_colonies.is_none());
    assert_eq!(summary.circular_colonies, Some(2));
}

#[test]
fn test_skipped_stage_scores_are_absent_from_rows() {
    let config = AnalysisConfig {
        run_morphology: false,
        run_density_analysis: false,
        ..Default::default()
    };
    let bundle = analyze(two_colonies(), &config).unwrap();

    for row in bundle.rows() {
        assert_eq!(row.morphology_score, None);
        assert_eq!(row.form_score, None);
        assert_eq!(row.density_score, None);
        assert!(row.size_score.is_some());
        assert!(row.bio_interest.is_some());
    }
}

#[test]
fn test_analysis_is_repeatable() {
    let first = analyze(mixed_colonies(), &AnalysisConfig::default()).unwrap();
    let second = analyze(mixed_colonies(), &AnalysisConfig::default()).unwrap();

    assert_eq!(first.label_map, second.label_map);
    assert_eq!(first.top_colonies, second.top_colonies);
    assert_eq!(first.rows(), second.rows());
}

#[test]
fn test_image_sources_agree() {
    let image = two_colonies();
    let file = write_png(&image);

    let from_path = analyze(file.path(), &AnalysisConfig::default()).unwrap();
    let bytes = std::fs::read(file.path()).unwrap();
    let from_bytes = analyze(bytes, &AnalysisConfig::default()).unwrap();
    let from_image = analyze(image, &AnalysisConfig::default()).unwrap();

    assert_eq!(from_path.label_map, from_image.label_map);
    assert_eq!(from_bytes.label_map, from_image.label_map);
}

#[test]
fn test_undecodable_input_is_invalid_image() {
    let file = write_corrupt_file();
    let err = analyze(file.path(), &AnalysisConfig::default()).unwrap_err();
    assert!(matches!(err, ColonyError::InvalidImage(_)));

    let err = analyze(vec![1u8, 2, 3], &AnalysisConfig::default()).unwrap_err();
    assert!(matches!(err, ColonyError::InvalidImage(_)));
}

#[test]
fn test_invalid_config_is_rejected_before_analysis() {
    let config = AnalysisConfig {
        adaptive_block_size: 4,
        ..Default::default()
    };
    let err = analyze(two_colonies(), &config).unwrap_err();
    assert!(matches!(err, ColonyError::InvalidConfig(_)));
}

#[test]
fn test_debug_output_writes_every_stage() {
    let dir = tempfile::TempDir::new().unwrap();
    let out = dir.path().join("debug");
    let analyzer = ColonyAnalyzer::new(AnalysisConfig::default())
        .unwrap()
        .with_debug(out.clone());

    analyzer.analyze(two_colonies()).unwrap();

    for name in [
        "00_input.png",
        "01_preprocessing.png",
        "02_plate_detection.png",
        "03_segmentation.png",
        "04_morphology_analysis.png",
        "05_color_analysis.png",
        "06_density_analysis.png",
        "07_scoring.png",
    ] {
        assert!(out.join(name).exists(), "missing {name}");
    }
}

#[test]
fn test_dim_colony_is_found_next_to_bright_ones() {
    let image = plate_with_colored_discs(
        220,
        220,
        &[
            ((60.0, 60.0, 10.0), Rgb([230, 220, 200])),
            ((160.0, 60.0, 10.0), Rgb([235, 225, 205])),
            ((60.0, 160.0, 10.0), Rgb([200, 60, 50])),
            ((160.0, 160.0, 10.0), Rgb([230, 220, 200])),
        ],
    );
    let bundle = analyze(image, &AnalysisConfig::default()).unwrap();
    assert_eq!(bundle.total_colonies(), 4);

    let label = bundle.label_map.get_pixel(60, 160)[0];
    assert_ne!(label, 0);
    let area = pixel_count(&bundle, label);
    assert!((250..=360).contains(&area), "red colony area {area}");
}

#[test]
fn test_long_ellipse_is_one_colony() {
    let mut image = blank_plate(200, 200);
    for (x, y, pixel) in image.enumerate_pixels_mut() {
        let dx = (x as f64 - 100.0) / 45.0;
        let dy = (y as f64 - 100.0) / 6.0;
        if dx * dx + dy * dy <= 1.0 {
            *pixel = COLONY;
        }
    }
    let bundle = analyze(image, &AnalysisConfig::default()).unwrap();
    assert_eq!(bundle.total_colonies(), 1);
    assert!(bundle.colonies[0].morphology.as_ref().unwrap().aspect_ratio > 4.0);
}
