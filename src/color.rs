use eframe::egui::Color32;
use palette::{Hsl, IntoColor, Srgb};

// ---------------------------------------------------------------------------
// Plot colours
// ---------------------------------------------------------------------------

/// Colours for `n` windrose speed bins: a hue ramp from blue (calm) to
/// red (strongest bin).
pub fn speed_bin_colors(n: usize) -> Vec<Color32> {
    if n == 0 {
        return Vec::new();
    }
    (0..n)
        .map(|i| {
            let t = if n == 1 { 0.0 } else { i as f32 / (n - 1) as f32 };
            let hue = 220.0 * (1.0 - t);
            let hsl = Hsl::new(hue, 0.8, 0.5);
            let rgb: Srgb = hsl.into_color();
            Color32::from_rgb(
                (rgb.red * 255.0) as u8,
                (rgb.green * 255.0) as u8,
                (rgb.blue * 255.0) as u8,
            )
        })
        .collect()
}

/// Map a matplotlib-style colour letter (from the FORMATTING config
/// section) to a colour. Unknown letters fall back to blue.
pub fn style_color(letter: char) -> Color32 {
    match letter {
        'b' => Color32::from_rgb(50, 100, 230),
        'g' => Color32::from_rgb(40, 170, 70),
        'r' => Color32::from_rgb(220, 50, 50),
        'c' => Color32::from_rgb(60, 190, 190),
        'm' => Color32::from_rgb(190, 60, 190),
        'y' => Color32::from_rgb(210, 180, 40),
        'k' => Color32::BLACK,
        'w' => Color32::WHITE,
        _ => Color32::from_rgb(50, 100, 230),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn bin_colors_span_blue_to_red() {
        let colors = speed_bin_colors(6);
        assert_eq!(colors.len(), 6);
        // First bin is blueish, last is reddish.
        assert!(colors[0].b() > colors[0].r());
        assert!(colors[5].r() > colors[5].b());
    }

    #[test]
    fn unknown_style_letter_falls_back_to_blue() {
        assert_eq!(style_color('z'), style_color('b'));
    }
}
