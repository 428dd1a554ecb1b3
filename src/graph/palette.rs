//! Deterministic hub colour assignment

/// Linear RGB triple in `[0, 1]`.
pub type Rgb = [f32; 3];

/// Colour given to leaves that belong to no hub.
pub const NEUTRAL_GRAY: Rgb = [0.55, 0.55, 0.58];

/// Fixed hub palette, cycled by hub insertion order.
pub const HUB_PALETTE: [Rgb; 12] = [
    [0.902, 0.294, 0.235], // vermilion
    [0.204, 0.596, 0.859], // azure
    [0.180, 0.800, 0.443], // emerald
    [0.945, 0.769, 0.059], // saffron
    [0.608, 0.349, 0.714], // amethyst
    [0.102, 0.737, 0.612], // teal
    [0.902, 0.494, 0.133], // carrot
    [0.925, 0.439, 0.651], // rose
    [0.533, 0.839, 0.271], // lime
    [0.361, 0.420, 0.929], // indigo
    [0.957, 0.616, 0.498], // salmon
    [0.447, 0.816, 0.914], // sky
];

/// Colour of the hub at `index` (insertion order).
pub fn hub_color(index: u32) -> Rgb {
    HUB_PALETTE[index as usize % HUB_PALETTE.len()]
}

/// Convert a hue in `[0, 1)` to a fully saturated RGB colour.
pub fn hue_to_rgb(hue: f32) -> Rgb {
    let h = hue.rem_euclid(1.0) * 6.0;
    let x = 1.0 - (h % 2.0 - 1.0).abs();
    match h as u32 {
        0 => [1.0, x, 0.0],
        1 => [x, 1.0, 0.0],
        2 => [0.0, 1.0, x],
        3 => [0.0, x, 1.0],
        4 => [x, 0.0, 1.0],
        _ => [1.0, 0.0, x],
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_palette_cycles() {
        assert_eq!(hub_color(0), HUB_PALETTE[0]);
        assert_eq!(hub_color(12), HUB_PALETTE[0]);
        assert_eq!(hub_color(13), HUB_PALETTE[1]);
    }

    #[test]
    fn test_palette_never_gray() {
        assert!(HUB_PALETTE.iter().all(|c| *c != NEUTRAL_GRAY));
    }

    #[test]
    fn test_hue_primaries() {
        assert_eq!(hue_to_rgb(0.0), [1.0, 0.0, 0.0]);
        let green = hue_to_rgb(1.0 / 3.0);
        assert!((green[1] - 1.0).abs() < 1e-5 && green[0] < 1e-4);
        assert_eq!(hue_to_rgb(1.0), hue_to_rgb(0.0));
    }
}
