//! Font resolution and glyph rasterization
//!
//! Fonts are looked up through an ordered list of candidate files. The first
//! one that parses and covers every character of the glyph text wins. When no
//! candidate works, a small built-in bitmap font is used instead so that an
//! icon is always produced.

use anyhow::{bail, Result};
use log::{debug, info, warn};
use rusttype::{point, Font, Rect, Scale};
use std::{
    fmt,
    path::{Path, PathBuf},
};

/// Fonts tried after any user supplied `--font` files, in order.
const SYSTEM_FONT_CANDIDATES: &[&str] = &[
    // macOS
    "/System/Library/Fonts/SFNSDisplay.ttf",
    "/System/Library/Fonts/Helvetica.ttc",
    // Linux
    "/usr/share/fonts/truetype/dejavu/DejaVuSans.ttf",
    "/usr/share/fonts/TTF/DejaVuSans.ttf",
    "/usr/share/fonts/truetype/liberation/LiberationSans-Regular.ttf",
    // Windows
    "C:\\Windows\\Fonts\\arial.ttf",
    "C:\\Windows\\Fonts\\segoeui.ttf",
];

/// Upper bound on coverage samples held by one mask (64 MiB of `f32`).
pub const MAX_MASK_SAMPLES: usize = 1 << 24;

/// Cell size of the built-in bitmap font.
const BITMAP_CELL: u32 = 8;

/// 8x8 bitmap for the florin sign, most significant bit on the left.
const BITMAP_FLORIN: [u8; 8] = [
    0b0000_1110,
    0b0001_1000,
    0b0001_1000,
    0b0111_1110,
    0b0001_1000,
    0b0001_1000,
    0b0001_1000,
    0b0111_0000,
];

/// Drawn for any character the bitmap font does not know.
const BITMAP_MISSING: [u8; 8] = [
    0b0111_1110,
    0b0100_0010,
    0b0100_0010,
    0b0100_0010,
    0b0100_0010,
    0b0100_0010,
    0b0100_0010,
    0b0111_1110,
];

/// Returns the default candidate list, with `preferred` paths tried first.
pub fn font_candidates(preferred: &[PathBuf]) -> Vec<PathBuf> {
    preferred
        .iter()
        .cloned()
        .chain(SYSTEM_FONT_CANDIDATES.iter().map(PathBuf::from))
        .collect()
}

/// The font selected for rendering.
pub enum IconFont {
    /// A TrueType/OpenType font loaded from disk.
    Outline { font: Font<'static>, path: PathBuf },
    /// The built-in 8x8 bitmap font.
    Builtin,
}

impl fmt::Debug for IconFont {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            IconFont::Outline { path, .. } => f.debug_tuple("Outline").field(path).finish(),
            IconFont::Builtin => f.write_str("Builtin"),
        }
    }
}

impl IconFont {
    /// Human readable name of the font source.
    pub fn describe(&self) -> String {
        match self {
            IconFont::Outline { path, .. } => path.display().to_string(),
            IconFont::Builtin => "built-in bitmap font".to_string(),
        }
    }

    pub fn is_builtin(&self) -> bool {
        matches!(self, IconFont::Builtin)
    }

    /// Rasterize `text` at `px` pixels and crop the result to its ink.
    ///
    /// Fails when the text would need more than [`MAX_MASK_SAMPLES`].
    pub fn rasterize(&self, text: &str, px: f32) -> Result<GlyphMask> {
        match self {
            IconFont::Outline { font, .. } => rasterize_outline(font, text, px),
            IconFont::Builtin => rasterize_bitmap(text, px),
        }
    }
}

/// Walk `candidates` in order and return the first usable font.
///
/// Every candidate is tried at most once. Failures are only logged; the
/// built-in font is the final fallback and always succeeds.
pub fn resolve_font(candidates: &[PathBuf], text: &str) -> IconFont {
    for path in candidates {
        match load_font(path, text) {
            Ok(font) => {
                info!("using font {}", path.display());
                return IconFont::Outline {
                    font,
                    path: path.clone(),
                };
            }
            Err(reason) => debug!("skipping font {}: {}", path.display(), reason),
        }
    }

    warn!(
        "no system font could be loaded, falling back to the built-in bitmap font; \
         pass --font <FILE> for a better result"
    );
    IconFont::Builtin
}

fn load_font(path: &Path, text: &str) -> Result<Font<'static>, String> {
    let data = std::fs::read(path).map_err(|err| err.to_string())?;
    let font = Font::try_from_vec(data).ok_or_else(|| "not a supported font file".to_string())?;

    if let Some(missing) = text.chars().find(|&c| font.glyph(c).id().0 == 0) {
        return Err(format!("no glyph for {missing:?}"));
    }

    Ok(font)
}

fn rasterize_outline(font: &Font<'static>, text: &str, px: f32) -> Result<GlyphMask> {
    let scale = Scale::uniform(px);
    let v_metrics = font.v_metrics(scale);
    let glyphs: Vec<_> = font
        .layout(text, scale, point(0.0, v_metrics.ascent))
        .collect();

    let bounds = glyphs
        .iter()
        .filter_map(|glyph| glyph.pixel_bounding_box())
        .reduce(|a, b| Rect {
            min: point(a.min.x.min(b.min.x), a.min.y.min(b.min.y)),
            max: point(a.max.x.max(b.max.x), a.max.y.max(b.max.y)),
        });

    let Some(bounds) = bounds else {
        return GlyphMask::new(0, 0);
    };

    let mut mask = GlyphMask::new(bounds.width() as u32, bounds.height() as u32)?;
    for glyph in &glyphs {
        if let Some(bb) = glyph.pixel_bounding_box() {
            let dx = (bb.min.x - bounds.min.x) as u32;
            let dy = (bb.min.y - bounds.min.y) as u32;
            glyph.draw(|x, y, v| mask.accumulate(x + dx, y + dy, v));
        }
    }

    mask.trim()
}

fn rasterize_bitmap(text: &str, px: f32) -> Result<GlyphMask> {
    let scale = ((px / BITMAP_CELL as f32).round() as u32).max(1);
    let cell = BITMAP_CELL.saturating_mul(scale);
    let width = u32::try_from(text.chars().count())
        .ok()
        .and_then(|chars| cell.checked_mul(chars));
    let Some(width) = width else {
        bail!("glyph text is too long to render at {px}px");
    };

    let mut mask = GlyphMask::new(width, cell)?;
    for (i, c) in text.chars().enumerate() {
        let rows = bitmap_glyph(c);
        let origin_x = i as u32 * cell;
        for (row, &bits) in rows.iter().enumerate() {
            for col in 0..BITMAP_CELL {
                if (bits >> (BITMAP_CELL - 1 - col)) & 1 == 0 {
                    continue;
                }
                for sy in 0..scale {
                    for sx in 0..scale {
                        mask.accumulate(
                            origin_x + col * scale + sx,
                            row as u32 * scale + sy,
                            1.0,
                        );
                    }
                }
            }
        }
    }

    mask.trim()
}

fn bitmap_glyph(c: char) -> [u8; 8] {
    match c {
        'ƒ' | 'f' => BITMAP_FLORIN,
        ' ' => [0; 8],
        _ => BITMAP_MISSING,
    }
}

/// Anti-aliased coverage of rendered text, cropped to its ink.
#[derive(Debug, Clone, PartialEq)]
pub struct GlyphMask {
    width: u32,
    height: u32,
    coverage: Vec<f32>,
}

impl GlyphMask {
    pub fn new(width: u32, height: u32) -> Result<Self> {
        let samples = (width as usize)
            .checked_mul(height as usize)
            .filter(|&samples| samples <= MAX_MASK_SAMPLES);
        let Some(samples) = samples else {
            bail!(
                "glyph mask of {width}x{height} pixels exceeds the limit of {MAX_MASK_SAMPLES} samples"
            );
        };

        Ok(Self {
            width,
            height,
            coverage: vec![0.0; samples],
        })
    }

    pub fn width(&self) -> u32 {
        self.width
    }

    pub fn height(&self) -> u32 {
        self.height
    }

    /// Coverage in `0.0..=1.0`, zero outside the mask.
    pub fn coverage(&self, x: u32, y: u32) -> f32 {
        if x >= self.width || y >= self.height {
            return 0.0;
        }
        self.coverage[(y * self.width + x) as usize]
    }

    /// Overlapping glyphs keep the strongest coverage.
    fn accumulate(&mut self, x: u32, y: u32, v: f32) {
        if x >= self.width || y >= self.height {
            return;
        }
        let slot = &mut self.coverage[(y * self.width + x) as usize];
        *slot = slot.max(v.clamp(0.0, 1.0));
    }

    /// Crop to the smallest rectangle holding every non-zero sample.
    fn trim(self) -> Result<Self> {
        let mut min_x = u32::MAX;
        let mut min_y = u32::MAX;
        let mut max_x = 0;
        let mut max_y = 0;

        for y in 0..self.height {
            for x in 0..self.width {
                if self.coverage(x, y) > 0.0 {
                    min_x = min_x.min(x);
                    min_y = min_y.min(y);
                    max_x = max_x.max(x);
                    max_y = max_y.max(y);
                }
            }
        }

        if min_x == u32::MAX {
            return Self::new(0, 0);
        }

        let mut trimmed = Self::new(max_x - min_x + 1, max_y - min_y + 1)?;
        for y in 0..trimmed.height {
            for x in 0..trimmed.width {
                trimmed.coverage[(y * trimmed.width + x) as usize] =
                    self.coverage(x + min_x, y + min_y);
            }
        }
        Ok(trimmed)
    }
}
