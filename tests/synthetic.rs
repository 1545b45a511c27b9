//! # Synthetic end-to-end scenarios
//!
//! Matches procedurally generated image pairs whose true disparity is known by construction.

// -----------------------------------------------------------------------------------------------
// IMPORTS
// -----------------------------------------------------------------------------------------------

use cv_stereo::prelude::*;

// -----------------------------------------------------------------------------------------------
// HELPERS
// -----------------------------------------------------------------------------------------------

/// Deterministic non-periodic texture in `[0, 97)`.
fn sample(x: usize, y: usize) -> f32 {
    let mut h = x.wrapping_mul(0x9e37_79b9) ^ y.wrapping_mul(0x85eb_ca6b);
    h ^= h >> 13;
    h = h.wrapping_mul(0xc2b2_ae35);
    ((h >> 7) % 97) as f32
}

/// An image sampling the texture at `(x + shift_x, y + shift_y)`.
fn textured(width: usize, height: usize, shift_x: usize, shift_y: usize) -> GrayFloatImage {
    GrayFloatImage::from_fn(width, height, |x, y| sample(x + shift_x, y + shift_y))
}

fn params() -> Params {
    Params {
        window_size: 5,
        disparity_search_width: 8,
        disparity_max: 7,
        disparity_inconsistency: 1,
        grain_size: 4,
        intensity_diff_max: 100.0,
        blend: 0.0,
        ..Params::default()
    }
}

// -----------------------------------------------------------------------------------------------
// TESTS
// -----------------------------------------------------------------------------------------------

#[test]
fn shifted_pair_recovers_the_disparity() {
    env_logger::builder().is_test(true).try_init().ok();

    // right = left shifted left by 3 px.
    let frame = StereoFrame::new(textured(16, 16, 0, 0), textured(16, 16, 3, 0));
    let mut matcher = StereoMatcher::sad(params()).unwrap();
    let map = matcher.compute(&frame).unwrap();

    // The map only covers window positions with a full neighbourhood and search range:
    // columns 9..=13, rows 2..=13 for these parameters.
    for v in 2..=13 {
        for u in 9..=13 {
            let d = map.get(u, v);
            assert!(
                (d - 3.0).abs() <= 0.5,
                "disparity {} at ({}, {}) is not the planted shift",
                d,
                u,
                v
            );
            assert_eq!(d.round(), 3.0);
        }
    }

    // Zero within window_size / 2 px of every border.
    for v in 0..16 {
        for u in 0..16 {
            if v < 2 || v > 13 || u < 2 || u > 13 {
                assert_eq!(map.get(u, v), 0.0, "border pixel ({}, {})", u, v);
            }
        }
    }
}

#[test]
fn nonzero_disparities_stay_in_the_search_range() {
    let frame = StereoFrame::new(textured(32, 24, 0, 0), textured(32, 24, 3, 0));
    let mut matcher = StereoMatcher::sad(params()).unwrap();
    let map = matcher.compute(&frame).unwrap();

    let min = matcher.params().disparity_min() as f32;
    let max = matcher.params().disparity_max as f32;
    let mut accepted = 0;
    for v in 0..24 {
        for u in 0..32 {
            let d = map.get(u, v);
            if d != 0.0 {
                accepted += 1;
                assert!(d >= min && d <= max, "disparity {} at ({}, {})", d, u, v);
            }
        }
    }
    assert!(accepted > 0);
}

#[test]
fn textureless_pair_is_fully_rejected() {
    // All costs tie, the two scan directions resolve the tie to opposite ends of the search
    // range, and the horizontal back-match rejects every pixel.
    let flat = GrayFloatImage::from_fn(16, 16, |_, _| 50.0);
    let frame = StereoFrame::new(flat.clone(), flat);
    let mut matcher = StereoMatcher::sad(params()).unwrap();
    let map = matcher.compute(&frame).unwrap();

    for v in 0..16 {
        for u in 0..16 {
            assert_eq!(map.get(u, v), 0.0);
        }
    }
}

#[test]
fn zero_tolerance_keeps_a_perfectly_consistent_pair() {
    let frame = StereoFrame::new(textured(16, 16, 0, 0), textured(16, 16, 3, 0));
    let mut matcher = StereoMatcher::sad(Params {
        disparity_inconsistency: 0,
        ..params()
    })
    .unwrap();
    let map = matcher.compute(&frame).unwrap();

    for v in 2..=13 {
        for u in 9..=13 {
            assert!(map.get(u, v) != 0.0, "pixel ({}, {}) was invalidated", u, v);
        }
    }
}

#[test]
fn reruns_and_chunkings_are_bit_identical() {
    let frame = StereoFrame::new(textured(32, 24, 0, 0), textured(32, 24, 3, 0));

    let mut single = StereoMatcher::sad(Params {
        grain_size: 0,
        ..params()
    })
    .unwrap();
    let mut chunked = StereoMatcher::sad(Params {
        grain_size: 3,
        ..params()
    })
    .unwrap();

    let first = single.compute(&frame).unwrap();
    let second = single.compute(&frame).unwrap();
    let third = chunked.compute(&frame).unwrap();

    for v in 0..24 {
        for u in 0..32 {
            assert_eq!(first.get(u, v).to_bits(), second.get(u, v).to_bits());
            assert_eq!(first.get(u, v).to_bits(), third.get(u, v).to_bits());
        }
    }
}

#[test]
fn guided_matcher_recovers_the_disparity() {
    let frame = StereoFrame::new(textured(24, 24, 0, 0), textured(24, 24, 3, 0));
    let mut matcher = StereoMatcher::guided(Params {
        epsilon: 50.0,
        ..params()
    })
    .unwrap();
    let map = matcher.compute(&frame).unwrap();

    // Guided aggregation has a window_size - 1 margin: columns 11..=19, rows 4..=19.
    for v in 4..=19 {
        for u in 11..=19 {
            let d = map.get(u, v);
            assert_eq!(d.round(), 3.0, "disparity {} at ({}, {})", d, u, v);
        }
    }
}

#[test]
fn vertical_back_match_keeps_a_consistent_triple() {
    // top = left shifted up by 3 px, matching the horizontal shift of the right view.
    let frame = StereoFrame::with_top(
        textured(24, 24, 0, 0),
        textured(24, 24, 3, 0),
        textured(24, 24, 0, 3),
    );
    let mut matcher = StereoMatcher::sad(Params {
        do_vertical_back_match: true,
        ..params()
    })
    .unwrap();
    let map = matcher.compute(&frame).unwrap();

    // Where both fields are defined the disparities agree and survive the post-pass.
    for v in 12..=21 {
        for u in 9..=21 {
            let d = map.get(u, v);
            assert_eq!(d.round(), 3.0, "disparity {} at ({}, {})", d, u, v);
        }
    }

    // Rows whose implied top-image row lies outside the vertical field are invalidated.
    for u in 9..=21 {
        assert_eq!(map.get(u, 5), 0.0);
    }
}

#[test]
fn vertical_back_match_rejects_an_inconsistent_triple() {
    let frame = StereoFrame::with_top(
        textured(24, 24, 0, 0),
        textured(24, 24, 3, 0),
        GrayFloatImage::from_fn(24, 24, |_, _| 50.0),
    );
    let mut matcher = StereoMatcher::sad(Params {
        do_vertical_back_match: true,
        ..params()
    })
    .unwrap();
    let map = matcher.compute(&frame).unwrap();

    for v in 0..24 {
        for u in 0..24 {
            assert_eq!(map.get(u, v), 0.0);
        }
    }
}
