//! End-to-end behavior of the color removal engine

mod common;

use chromashade::segmentation::refine_alpha_mask;
use chromashade::{remove_color, ColorRemovalConfig, ColorSeed, ColorSegmenter, EditSession, Raster, Result};
use common::{busy_scene, green_ramp, rgb_unchanged, split, white_margin, BLUE, GREEN, RED};

fn no_refine(tolerance: f32) -> Result<ColorRemovalConfig> {
    ColorRemovalConfig::builder()
        .tolerance(tolerance)
        .auto_refine(false)
        .build()
}

#[test]
fn test_global_seed_clears_uniform_raster() -> Result<()> {
    let raster = Raster::filled(4, 4, GREEN)?;
    let seed = ColorSeed::sample_global(&raster, 0, 0);
    let config = ColorRemovalConfig::builder().tolerance(50.0).build()?;

    let out = remove_color(&raster, &[seed], &config)?;

    assert_eq!(out.transparent_count(), 16);
    assert!(rgb_unchanged(&raster, &out));
    Ok(())
}

#[test]
fn test_local_seed_respects_color_boundary() -> Result<()> {
    let raster = split(10, 10, RED, BLUE);
    let seed = ColorSeed::sample_local(&raster, 2, 2).with_tolerance(10.0);

    let out = remove_color(&raster, &[seed], &no_refine(50.0)?)?;

    for y in 0..10 {
        for x in 0..10 {
            let expected = if x < 5 { 0 } else { 255 };
            assert_eq!(out.pixel(x, y)[3], expected, "alpha at ({}, {})", x, y);
        }
    }
    assert!(rgb_unchanged(&raster, &out));
    Ok(())
}

#[test]
fn test_flood_fill_stays_in_clicked_region() -> Result<()> {
    // Two small red patches on blue; neither covers a sampling grid point
    let raster = Raster::from_fn(80, 80, |x, y| {
        let first = (1..7).contains(&x) && (1..7).contains(&y);
        let second = (41..47).contains(&x) && (41..47).contains(&y);
        if first || second {
            RED
        } else {
            BLUE
        }
    })?;
    let seed = ColorSeed::sample_local(&raster, 3, 3);

    let out = remove_color(&raster, &[seed], &no_refine(40.0)?)?;

    assert_eq!(out.transparent_count(), 36);
    assert_eq!(out.pixel(3, 3)[3], 0);
    assert_eq!(out.pixel(44, 44)[3], 255);
    assert_eq!(out.pixel(20, 20)[3], 255);
    Ok(())
}

#[test]
fn test_refinement_drops_isolated_speck() {
    let mut raster = Raster::filled(9, 9, [120, 40, 40, 255]).unwrap();
    raster.set_pixel(4, 4, [120, 40, 40, 0]);

    refine_alpha_mask(&mut raster, 40.0);

    assert_eq!(raster.pixel(4, 4)[3], 255);
    assert_eq!(raster.transparent_count(), 0);
}

#[test]
fn test_empty_seed_list_is_identity() -> Result<()> {
    let raster = busy_scene(40);
    for config in [ColorRemovalConfig::default(), no_refine(300.0)?] {
        assert_eq!(remove_color(&raster, &[], &config)?, raster);
    }
    Ok(())
}

#[test]
fn test_cleared_count_grows_with_tolerance() -> Result<()> {
    let raster = green_ramp(48, 48);
    let mut previous = 0;
    for tolerance in [0.0, 10.0, 25.0, 50.0, 90.0, 150.0, 250.0, 442.0] {
        let seed = ColorSeed::sample_global(&raster, 24, 24).with_tolerance(tolerance);
        let out = remove_color(&raster, &[seed], &no_refine(50.0)?)?;
        let cleared = out.transparent_count();
        assert!(
            cleared >= previous,
            "tolerance {} cleared {} < {}",
            tolerance,
            cleared,
            previous
        );
        previous = cleared;
    }
    assert!(previous > 0);
    Ok(())
}

/// Transparent count after each seed list, asserting it never shrinks
fn assert_cleared_grows(
    raster: &Raster,
    sweeps: impl IntoIterator<Item = (f32, Vec<ColorSeed>)>,
) -> Result<usize> {
    let mut previous = 0;
    for (tolerance, seeds) in sweeps {
        let cleared = remove_color(raster, &seeds, &no_refine(50.0)?)?.transparent_count();
        assert!(
            cleared >= previous,
            "tolerance {} cleared {} < {}",
            tolerance,
            cleared,
            previous
        );
        previous = cleared;
    }
    Ok(previous)
}

#[test]
fn test_margin_clearing_grows_with_white_seed_tolerance() -> Result<()> {
    let raster = white_margin(300);
    let white = ColorSeed::sample_global(&raster, 0, 0);
    let sweeps = [0.0, 10.0, 25.0, 50.0, 100.0].map(|t| {
        (
            t,
            vec![ColorSeed::global([0, 255, 0]).with_tolerance(50.0), white.with_tolerance(t)],
        )
    });
    let cleared = assert_cleared_grows(&raster, sweeps)?;
    // The margin columns are all gone once the white seed reaches them
    assert!(cleared >= 8 * 300);
    Ok(())
}

#[test]
fn test_margin_clearing_grows_with_colored_seed_tolerance() -> Result<()> {
    let raster = white_margin(300);
    let white = ColorSeed::sample_global(&raster, 0, 0).with_tolerance(25.0);
    let sweeps = [0.0, 10.0, 25.0, 50.0, 100.0].map(|t| {
        (t, vec![white, ColorSeed::global([180, 40, 40]).with_tolerance(t)])
    });
    assert!(assert_cleared_grows(&raster, sweeps)? > 0);
    Ok(())
}

#[test]
fn test_output_is_deterministic() -> Result<()> {
    let raster = busy_scene(96);
    let seeds = [
        ColorSeed::sample_global(&raster, 0, 0),
        ColorSeed::sample_local(&raster, 57, 38),
    ];
    let segmenter = ColorSegmenter::new(ColorRemovalConfig::default());

    let first = segmenter.segment(&raster, &seeds)?;
    let second = segmenter.segment(&raster, &seeds)?;

    assert_eq!(first, second);
    Ok(())
}

#[test]
fn test_only_alpha_changes_on_pathological_rasters() -> Result<()> {
    let rasters = [
        Raster::filled(16, 16, [0, 0, 0, 255])?,
        Raster::filled(16, 16, [255, 255, 255, 255])?,
        Raster::filled(1, 1, [10, 200, 30, 128])?,
        busy_scene(33),
    ];
    for raster in &rasters {
        let seeds = [
            ColorSeed::sample_global(raster, 0, 0).with_tolerance(442.0),
            ColorSeed::sample_local(raster, 100, -5),
        ];
        let out = remove_color(raster, &seeds, &ColorRemovalConfig::default())?;
        assert_eq!(out.dimensions(), raster.dimensions());
        assert!(rgb_unchanged(raster, &out));
    }
    Ok(())
}

#[test]
fn test_session_undo_restores_previous_render() -> Result<()> {
    let raster = split(20, 20, GREEN, BLUE);
    let mut session = EditSession::new(raster.clone());

    session.pick_global(0, 0);
    let green_removed = session.render_color_removal()?;
    session.pick_global(19, 19);
    let both_removed = session.render_color_removal()?;
    assert!(both_removed.raster.transparent_count() > green_removed.raster.transparent_count());

    session.undo();
    assert_eq!(session.render_color_removal()?.raster, green_removed.raster);
    session.reset();
    assert_eq!(session.render_color_removal()?.raster, raster);
    Ok(())
}
