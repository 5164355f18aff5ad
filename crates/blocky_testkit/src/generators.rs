//! Property-based test generators using proptest.
//!
//! Provides strategies for generating payloads the engine accepts.

use blocky_core::{BackgroundImage, ElementEditable, TextEditable};
use proptest::prelude::*;

/// Strategy for generating valid hex colors in every accepted width.
pub fn color_strategy() -> impl Strategy<Value = String> {
    prop::string::string_regex("#([0-9a-f]{3}|[0-9A-F]{4}|[0-9a-f]{6}|[0-9a-fA-F]{8})")
        .expect("Invalid regex")
}

/// Strategy for generating display names.
pub fn name_strategy() -> impl Strategy<Value = String> {
    prop::string::string_regex("[A-Za-z][A-Za-z0-9 '-]{0,23}").expect("Invalid regex")
}

/// Strategy for generating asset bytes.
pub fn image_data_strategy() -> impl Strategy<Value = Vec<u8>> {
    prop::collection::vec(any::<u8>(), 0..512)
}

/// Strategy for generating right-angle rotations.
pub fn rotation_strategy() -> impl Strategy<Value = i64> {
    prop_oneof![Just(0), Just(90), Just(180), Just(270)]
}

/// Strategy for generating a new background payload.
pub fn new_background_strategy() -> impl Strategy<Value = BackgroundImage> {
    (name_strategy(), image_data_strategy()).prop_map(|(name, data)| BackgroundImage::new(name, data))
}

/// Strategy for generating element payloads.
///
/// Backgrounds are either absent or new bytes, never references to assets
/// that may not exist.
pub fn element_editable_strategy() -> impl Strategy<Value = ElementEditable> {
    (
        prop::option::of(name_strategy()),
        (-64i64..64, -64i64..64),
        (1i64..16, 1i64..16),
        rotation_strategy(),
        prop::option::of(new_background_strategy()),
        prop::option::of(color_strategy()),
    )
        .prop_map(
            |(name, (x, y), (width, height), rotation, background_image, background_color)| {
                ElementEditable {
                    name,
                    x,
                    y,
                    width,
                    height,
                    rotation,
                    background_image,
                    background_color,
                }
            },
        )
}

/// Strategy for generating text payloads.
pub fn text_editable_strategy() -> impl Strategy<Value = TextEditable> {
    (
        prop::option::of(name_strategy()),
        prop::option::of("[ -~]{0,64}"),
        color_strategy(),
        1i64..200,
        (-2048i64..2048, -2048i64..2048),
        rotation_strategy(),
    )
        .prop_map(|(name, value, color, font_size, (x, y), rotation)| TextEditable {
            name,
            value,
            color,
            font_size,
            x,
            y,
            rotation,
        })
}
