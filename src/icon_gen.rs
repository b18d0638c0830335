use crate::contents_json::{ContentsFile, ImageEntry, APP_ICON_SIZE, AUTHOR};
use crate::font::{font_candidates, resolve_font, GlyphMask, IconFont};
use anyhow::{Context, Result};
use image::{
    codecs::png::{CompressionType, FilterType as PngFilterType, PngEncoder},
    imageops::{self, FilterType},
    ColorType, DynamicImage, ImageBuffer, ImageEncoder, ImageFormat, Pixel, Rgb, RgbImage, Rgba,
    RgbaImage,
};
use log::debug;
use std::{
    fs::create_dir_all,
    io::Write,
    path::{Path, PathBuf},
    str::FromStr,
};

/// Edge length the style constants are designed for.
pub const REFERENCE_SIZE: u32 = 1024;

/// Output filename used when none is given.
pub const DEFAULT_OUTPUT: &str = "AppIcon-1024.png";

/// Default glyph: the florin / function sign.
pub const DEFAULT_GLYPH: &str = "ƒ";

pub const DEFAULT_TOP_COLOR: Rgb<u8> = Rgb([0x4A, 0x90, 0xE2]);
pub const DEFAULT_BOTTOM_COLOR: Rgb<u8> = Rgb([0x2A, 0x60, 0x99]);

/// Failure kinds reported by [`generate_icon`].
#[derive(Debug, thiserror::Error)]
pub enum RenderError {
    /// The linked imaging library cannot encode PNG files.
    #[error("the `image` crate was built without PNG encoding support")]
    MissingCodec,

    /// Anything else that went wrong while drawing or writing files.
    #[error(transparent)]
    Render(#[from] anyhow::Error),
}

/// Every visual constant of the icon.
///
/// Pixel values are relative to the canvas `size`; [`IconStyle::for_size`]
/// scales the reference design to other sizes.
#[derive(Debug, Clone, PartialEq)]
pub struct IconStyle {
    pub size: u32,
    pub top_color: Rgb<u8>,
    pub bottom_color: Rgb<u8>,
    /// Alpha of the glossy highlight at the very top row.
    pub highlight_alpha: u8,
    pub glyph: String,
    pub font_px: f32,
    /// How far the glyph sits above the true vertical center.
    pub vertical_adjust: i32,
    pub shadow_offset: i32,
    pub shadow_alpha: u8,
    pub bar_width: u32,
    pub bar_thickness: u32,
    /// Distance between the bottom of the glyph ink and the bar.
    pub bar_gap: i32,
    pub bar_alpha: u8,
}

impl Default for IconStyle {
    fn default() -> Self {
        Self {
            size: REFERENCE_SIZE,
            top_color: DEFAULT_TOP_COLOR,
            bottom_color: DEFAULT_BOTTOM_COLOR,
            highlight_alpha: 100,
            glyph: DEFAULT_GLYPH.to_string(),
            font_px: 500.0,
            vertical_adjust: 50,
            shadow_offset: 4,
            shadow_alpha: 80,
            bar_width: 300,
            bar_thickness: 4,
            bar_gap: 40,
            bar_alpha: 180,
        }
    }
}

impl IconStyle {
    /// The reference design scaled to a `size` x `size` canvas.
    pub fn for_size(size: u32) -> Self {
        let reference = Self::default();
        let factor = size as f64 / REFERENCE_SIZE as f64;
        let scale = |v: u32| ((v as f64 * factor).round() as u32).max(1);
        let scale_i = |v: i32| (v as f64 * factor).round() as i32;

        Self {
            size,
            font_px: (reference.font_px as f64 * factor) as f32,
            vertical_adjust: scale_i(reference.vertical_adjust),
            shadow_offset: scale_i(reference.shadow_offset).max(1),
            bar_width: scale(reference.bar_width),
            bar_thickness: scale(reference.bar_thickness),
            bar_gap: scale_i(reference.bar_gap),
            ..reference
        }
    }
}

/// Where the glyph ink lands on the canvas.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct GlyphPlacement {
    pub x: i32,
    pub y: i32,
    pub width: u32,
    pub height: u32,
}

#[derive(Debug, Clone)]
pub struct Options {
    pub style: IconStyle,
    pub output: PathBuf,
    /// Font files tried before the system candidates.
    pub fonts: Vec<PathBuf>,
    /// Additional downscaled copies written next to the output.
    pub extra_sizes: Vec<u32>,
    /// Xcode icon set directory to populate.
    pub appiconset: Option<PathBuf>,
}

impl Default for Options {
    fn default() -> Self {
        Self {
            style: IconStyle::default(),
            output: PathBuf::from(DEFAULT_OUTPUT),
            fonts: Vec::new(),
            extra_sizes: Vec::new(),
            appiconset: None,
        }
    }
}

/// Parse a CSS color string into an opaque RGB triple.
pub fn parse_color(value: &str) -> Result<Rgb<u8>, String> {
    let color = css_color::Srgb::from_str(value)
        .map_err(|_| format!("invalid CSS color: {value:?}"))?;
    let channel = |c: f32| (c.clamp(0.0, 1.0) * 255.0).round() as u8;
    Ok(Rgb([
        channel(color.red),
        channel(color.green),
        channel(color.blue),
    ]))
}

/// Fails with [`RenderError::MissingCodec`] when PNG output is unavailable.
pub fn ensure_png_support() -> Result<(), RenderError> {
    if ImageFormat::Png.writing_enabled() {
        Ok(())
    } else {
        Err(RenderError::MissingCodec)
    }
}

/// Render the icon and write every requested artifact.
pub fn generate_icon(options: &Options) -> Result<(), RenderError> {
    generate_icon_with(options, ensure_png_support)
}

/// [`generate_icon`] with a custom PNG capability check.
///
/// `png_support` runs before any font lookup or file I/O.
pub fn generate_icon_with<F>(options: &Options, png_support: F) -> Result<(), RenderError>
where
    F: FnOnce() -> Result<(), RenderError>,
{
    png_support()?;

    let style = &options.style;
    let font = resolve_font(&font_candidates(&options.fonts), &style.glyph);

    println!(
        "Generating {}x{} icon with {}...",
        style.size,
        style.size,
        font.describe()
    );
    if font.is_builtin() {
        println!("⚠️  Using the built-in font. For a better result, install a system font or pass --font.");
    }
    let icon = render_icon(style, &font)?;
    let png = encode_png(&icon)?;

    write_atomically(&options.output, &png)?;
    println!("✓ Generated {}", options.output.display());

    if !options.extra_sizes.is_empty() {
        let out_dir = parent_dir(&options.output);
        generate_custom_sizes(&icon, &options.extra_sizes, &out_dir)?;
    }

    if let Some(dir) = &options.appiconset {
        let filename = options
            .output
            .file_name()
            .map(|name| name.to_string_lossy().into_owned())
            .unwrap_or_else(|| DEFAULT_OUTPUT.to_string());
        generate_appiconset(dir, &filename, &icon, &png)?;
    }

    Ok(())
}

/// Draw the complete icon. Deterministic for a given style and font.
pub fn render_icon(style: &IconStyle, font: &IconFont) -> Result<RgbImage> {
    let mask = font
        .rasterize(&style.glyph, style.font_px)
        .context("Failed to rasterize the glyph")?;

    let mut canvas = draw_background(style);
    apply_highlight(&mut canvas, style);

    let placement = place_glyph(&mask, style);
    debug!("glyph placed at {placement:?}");

    draw_glyph(&mut canvas, &mask, placement, style);
    draw_bar(&mut canvas, placement, style);

    Ok(DynamicImage::ImageRgba8(canvas).to_rgb8())
}

/// Color of background row `y`: truncated linear interpolation at `y / size`.
pub fn gradient_row_color(top: Rgb<u8>, bottom: Rgb<u8>, y: u32, size: u32) -> Rgb<u8> {
    let ratio = y as f64 / size as f64;
    let lerp = |a: u8, b: u8| (a as f64 + (b as f64 - a as f64) * ratio) as u8;
    Rgb([
        lerp(top[0], bottom[0]),
        lerp(top[1], bottom[1]),
        lerp(top[2], bottom[2]),
    ])
}

/// Highlight alpha for row `y`; zero from the vertical middle downwards.
pub fn highlight_alpha(y: u32, size: u32, max_alpha: u8) -> u8 {
    let half = size / 2;
    if y >= half {
        return 0;
    }
    let ratio = y as f64 / half as f64;
    (max_alpha as f64 * (1.0 - ratio)) as u8
}

/// Opaque canvas holding the vertical background gradient.
pub fn draw_background(style: &IconStyle) -> RgbaImage {
    let rows: Vec<Rgba<u8>> = (0..style.size)
        .map(|y| gradient_row_color(style.top_color, style.bottom_color, y, style.size).to_rgba())
        .collect();

    ImageBuffer::from_fn(style.size, style.size, |_, y| rows[y as usize])
}

/// Transparent layer with the white gloss fading out over the top half.
pub fn highlight_layer(style: &IconStyle) -> RgbaImage {
    ImageBuffer::from_fn(style.size, style.size, |_, y| {
        Rgba([255, 255, 255, highlight_alpha(y, style.size, style.highlight_alpha)])
    })
}

pub fn apply_highlight(canvas: &mut RgbaImage, style: &IconStyle) {
    let layer = highlight_layer(style);
    imageops::overlay(canvas, &layer, 0, 0);
}

/// Center the ink box, shifted up by the style's vertical adjustment.
pub fn place_glyph(mask: &GlyphMask, style: &IconStyle) -> GlyphPlacement {
    let size = style.size as i32;
    let (width, height) = (mask.width(), mask.height());

    GlyphPlacement {
        x: (size - width as i32).div_euclid(2),
        y: (size - height as i32).div_euclid(2) - style.vertical_adjust,
        width,
        height,
    }
}

/// Drop shadow first, then the glyph itself in opaque white.
pub fn draw_glyph(
    canvas: &mut RgbaImage,
    mask: &GlyphMask,
    placement: GlyphPlacement,
    style: &IconStyle,
) {
    draw_mask(
        canvas,
        mask,
        placement.x + style.shadow_offset,
        placement.y + style.shadow_offset,
        Rgba([0, 0, 0, style.shadow_alpha]),
    );
    draw_mask(
        canvas,
        mask,
        placement.x,
        placement.y,
        Rgba([255, 255, 255, 255]),
    );
}

/// `(x, y, width, height)` of the decorative bar below the glyph.
pub fn bar_rect(placement: GlyphPlacement, style: &IconStyle) -> (i32, i32, u32, u32) {
    let x = (style.size as i32 - style.bar_width as i32).div_euclid(2);
    let y = placement.y + placement.height as i32 + style.bar_gap;
    (x, y, style.bar_width, style.bar_thickness)
}

pub fn draw_bar(canvas: &mut RgbaImage, placement: GlyphPlacement, style: &IconStyle) {
    let (x, y, width, height) = bar_rect(placement, style);
    let color = Rgba([255, 255, 255, style.bar_alpha]);

    for dy in 0..height as i32 {
        for dx in 0..width as i32 {
            blend_at(canvas, x + dx, y + dy, color);
        }
    }
}

fn draw_mask(canvas: &mut RgbaImage, mask: &GlyphMask, x: i32, y: i32, color: Rgba<u8>) {
    for my in 0..mask.height() {
        for mx in 0..mask.width() {
            let coverage = mask.coverage(mx, my);
            let alpha = (color[3] as f32 * coverage).round() as u8;
            if alpha == 0 {
                continue;
            }
            blend_at(
                canvas,
                x + mx as i32,
                y + my as i32,
                Rgba([color[0], color[1], color[2], alpha]),
            );
        }
    }
}

fn blend_at(canvas: &mut RgbaImage, x: i32, y: i32, color: Rgba<u8>) {
    if x < 0 || y < 0 || x >= canvas.width() as i32 || y >= canvas.height() as i32 {
        return;
    }
    canvas.get_pixel_mut(x as u32, y as u32).blend(&color);
}

/// Encode an opaque icon as PNG with the strongest compression.
pub fn encode_png(image: &RgbImage) -> Result<Vec<u8>> {
    let mut buf = Vec::new();
    let encoder =
        PngEncoder::new_with_quality(&mut buf, CompressionType::Best, PngFilterType::Adaptive);
    encoder
        .write_image(image.as_raw(), image.width(), image.height(), ColorType::Rgb8)
        .context("Failed to encode PNG")?;
    Ok(buf)
}

/// The file only appears at `path` once all bytes are on disk.
fn write_atomically(path: &Path, bytes: &[u8]) -> Result<()> {
    let dir = parent_dir(path);
    create_dir_all(&dir).context("Can't create output directory")?;

    let mut file = tempfile::NamedTempFile::new_in(&dir)
        .with_context(|| format!("Failed to create temporary file in {}", dir.display()))?;
    file.write_all(bytes).context("Failed to write PNG")?;
    file.persist(path)
        .map_err(|err| err.error)
        .with_context(|| format!("Failed to save {}", path.display()))?;
    Ok(())
}

fn parent_dir(path: &Path) -> PathBuf {
    match path.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => parent.to_path_buf(),
        _ => PathBuf::from("."),
    }
}

fn generate_custom_sizes(icon: &RgbImage, sizes: &[u32], out_dir: &Path) -> Result<()> {
    println!("Generating custom PNG sizes...");
    let source = DynamicImage::ImageRgb8(icon.clone());
    for &size in sizes {
        let resized = source.resize_exact(size, size, FilterType::Lanczos3).to_rgb8();
        let filename = format!("AppIcon-{size}x{size}.png");
        write_atomically(&out_dir.join(&filename), &encode_png(&resized)?)?;
        println!("  ✓ Generated {filename}");
    }
    Ok(())
}

/// Xcode only accepts a 1024 icon; other sizes are resampled to it.
fn generate_appiconset(dir: &Path, filename: &str, icon: &RgbImage, png: &[u8]) -> Result<()> {
    create_dir_all(dir).context("Can't create icon set directory")?;

    if icon.dimensions() == (APP_ICON_SIZE, APP_ICON_SIZE) {
        write_atomically(&dir.join(filename), png)?;
    } else {
        let resized = DynamicImage::ImageRgb8(icon.clone())
            .resize_exact(APP_ICON_SIZE, APP_ICON_SIZE, FilterType::Lanczos3)
            .to_rgb8();
        write_atomically(&dir.join(filename), &encode_png(&resized)?)?;
    }

    let mut contents = ContentsFile::new(AUTHOR.to_string());
    contents.add_image(ImageEntry::universal_app_icon(filename.to_string()));
    contents.write_to_dir(dir)?;

    println!("  ✓ Generated {}", dir.join("Contents.json").display());
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn small_style() -> IconStyle {
        IconStyle::for_size(128)
    }

    #[test]
    fn test_gradient_endpoints() {
        assert_eq!(
            gradient_row_color(DEFAULT_TOP_COLOR, DEFAULT_BOTTOM_COLOR, 0, 1024),
            DEFAULT_TOP_COLOR
        );
        // ratio 0.5: 74 - 16, 144 - 24, 226 - 36.5 truncated
        assert_eq!(
            gradient_row_color(DEFAULT_TOP_COLOR, DEFAULT_BOTTOM_COLOR, 512, 1024),
            Rgb([58, 120, 189])
        );
        // truncation lands the last row on the end color
        assert_eq!(
            gradient_row_color(DEFAULT_TOP_COLOR, DEFAULT_BOTTOM_COLOR, 1023, 1024),
            Rgb([42, 96, 153])
        );
    }

    #[test]
    fn test_background_rows_are_solid() {
        let style = small_style();
        let canvas = draw_background(&style);
        for y in [0, 17, 64, 127] {
            let expected = gradient_row_color(style.top_color, style.bottom_color, y, 128);
            for x in [0, 50, 127] {
                let pixel = canvas.get_pixel(x, y);
                assert_eq!(pixel.to_rgb(), expected, "row {y} column {x}");
                assert_eq!(pixel[3], 255);
            }
        }
    }

    #[test]
    fn test_highlight_alpha_fades_out() {
        let size = 1024;
        assert_eq!(highlight_alpha(0, size, 100), 100);
        let mut previous = u8::MAX;
        for y in 0..size / 2 {
            let alpha = highlight_alpha(y, size, 100);
            assert!(alpha <= previous, "alpha increased at row {y}");
            previous = alpha;
        }
        assert_eq!(highlight_alpha(size / 2, size, 100), 0);
        assert_eq!(highlight_alpha(size - 1, size, 100), 0);
    }

    #[test]
    fn test_highlight_composites_over_background() {
        let style = small_style();
        let mut canvas = draw_background(&style);
        apply_highlight(&mut canvas, &style);

        let top = canvas.get_pixel(10, 0);
        let alpha = 100.0 / 255.0;
        for channel in 0..3 {
            let bg = style.top_color[channel] as f32;
            let expected = bg * (1.0 - alpha) + 255.0 * alpha;
            let diff = (top[channel] as f32 - expected).abs();
            assert!(diff <= 1.0, "channel {channel}: {} vs {expected}", top[channel]);
        }

        let below = canvas.get_pixel(10, 100);
        let expected = gradient_row_color(style.top_color, style.bottom_color, 100, 128);
        assert_eq!(below.to_rgb(), expected, "lower half must be untouched");
    }

    #[test]
    fn test_style_scaling() {
        assert_eq!(IconStyle::for_size(REFERENCE_SIZE), IconStyle::default());

        let half = IconStyle::for_size(512);
        assert_eq!(half.font_px, 250.0);
        assert_eq!(half.bar_width, 150);
        assert_eq!(half.bar_thickness, 2);
        assert_eq!(half.shadow_offset, 2);
        assert_eq!(half.vertical_adjust, 25);

        let tiny = IconStyle::for_size(16);
        assert_eq!(tiny.bar_thickness, 1);
        assert_eq!(tiny.shadow_offset, 1);
    }

    #[test]
    fn test_glyph_is_centered_with_adjustment() {
        let style = IconStyle::default();
        let mask = IconFont::Builtin.rasterize("ƒ", style.font_px).unwrap();
        let placement = place_glyph(&mask, &style);

        assert_eq!(placement.width, mask.width());
        assert_eq!(placement.height, mask.height());
        assert_eq!(
            placement.x,
            (1024 - mask.width() as i32).div_euclid(2),
            "glyph should be horizontally centered"
        );
        assert_eq!(
            placement.y,
            (1024 - mask.height() as i32).div_euclid(2) - 50
        );
    }

    #[test]
    fn test_bar_sits_below_glyph() {
        let style = IconStyle::default();
        let placement = GlyphPlacement {
            x: 300,
            y: 200,
            width: 400,
            height: 500,
        };
        assert_eq!(bar_rect(placement, &style), (362, 740, 300, 4));
    }

    #[test]
    fn test_render_with_builtin_font() {
        let style = small_style();
        let icon = render_icon(&style, &IconFont::Builtin).unwrap();
        assert_eq!(icon.dimensions(), (128, 128));

        let mask = IconFont::Builtin
            .rasterize(&style.glyph, style.font_px)
            .unwrap();
        let placement = place_glyph(&mask, &style);

        // a fully covered pixel of the glyph is pure white
        let (mx, my) = (0..mask.height())
            .flat_map(|y| (0..mask.width()).map(move |x| (x, y)))
            .find(|&(x, y)| mask.coverage(x, y) == 1.0)
            .expect("bitmap glyph has solid pixels");
        let pixel = icon.get_pixel(
            (placement.x + mx as i32) as u32,
            (placement.y + my as i32) as u32,
        );
        assert_eq!(*pixel, Rgb([255, 255, 255]));

        // the bar brightens the background it covers
        let (bx, by, bw, _) = bar_rect(placement, &style);
        let bar_pixel = icon.get_pixel((bx + bw as i32 / 2) as u32, by as u32);
        let background = gradient_row_color(style.top_color, style.bottom_color, by as u32, 128);
        assert!(bar_pixel[0] > background[0] && bar_pixel[2] >= background[2]);
    }

    #[test]
    fn test_render_is_deterministic() {
        let style = small_style();
        let first = encode_png(&render_icon(&style, &IconFont::Builtin).unwrap()).unwrap();
        let second = encode_png(&render_icon(&style, &IconFont::Builtin).unwrap()).unwrap();
        assert_eq!(first, second);
    }

    #[test]
    fn test_offscreen_glyph_is_clipped() {
        let mut style = small_style();
        style.vertical_adjust = 1000;
        let icon = render_icon(&style, &IconFont::Builtin).unwrap();
        assert_eq!(icon.dimensions(), (128, 128));
    }

    #[test]
    fn test_parse_color() {
        assert_eq!(parse_color("#4A90E2").unwrap(), DEFAULT_TOP_COLOR);
        assert_eq!(parse_color("#2a6099").unwrap(), DEFAULT_BOTTOM_COLOR);
        assert_eq!(parse_color("#fff").unwrap(), Rgb([255, 255, 255]));
        assert!(parse_color("not-a-color").is_err());
    }

    #[test]
    fn test_png_support_is_available() {
        assert!(ensure_png_support().is_ok());
    }

    #[test]
    fn test_generate_writes_all_artifacts() {
        let dir = tempfile::TempDir::new().expect("Failed to create temp directory");
        let options = Options {
            style: small_style(),
            output: dir.path().join("out").join("icon.png"),
            fonts: Vec::new(),
            extra_sizes: vec![32, 64],
            appiconset: Some(dir.path().join("AppIcon.appiconset")),
        };

        generate_icon(&options).unwrap();

        let icon = image::open(&options.output).unwrap();
        assert_eq!((icon.width(), icon.height()), (128, 128));
        assert_eq!(icon.color(), image::ColorType::Rgb8);

        for size in [32, 64] {
            let path = dir.path().join("out").join(format!("AppIcon-{size}x{size}.png"));
            let extra = image::open(&path).unwrap();
            assert_eq!((extra.width(), extra.height()), (size, size));
        }

        let set = dir.path().join("AppIcon.appiconset");
        let set_icon = image::open(set.join("icon.png")).unwrap();
        assert_eq!(
            (set_icon.width(), set_icon.height()),
            (APP_ICON_SIZE, APP_ICON_SIZE),
            "icon set must hold a 1024 icon whatever the canvas size"
        );

        let contents: ContentsFile = serde_json::from_str(
            &std::fs::read_to_string(set.join("Contents.json")).unwrap(),
        )
        .unwrap();
        assert_eq!(contents.images.len(), 1);
        assert_eq!(contents.images[0].size, "1024x1024");
        assert_eq!(contents.images[0].filename, "icon.png");
    }

    #[test]
    fn test_missing_codec_stops_before_any_output() {
        let dir = tempfile::TempDir::new().expect("Failed to create temp directory");
        let options = Options {
            style: small_style(),
            output: dir.path().join("out").join("icon.png"),
            fonts: Vec::new(),
            extra_sizes: vec![32],
            appiconset: Some(dir.path().join("AppIcon.appiconset")),
        };

        let result = generate_icon_with(&options, || Err(RenderError::MissingCodec));

        assert!(matches!(result, Err(RenderError::MissingCodec)));
        assert!(!dir.path().join("out").exists(), "no output directory expected");
        assert!(!dir.path().join("AppIcon.appiconset").exists());
    }

    #[test]
    fn test_oversized_glyph_is_a_render_error() {
        let dir = tempfile::TempDir::new().expect("Failed to create temp directory");
        let mut style = IconStyle::for_size(8192);
        style.glyph = "\u{E000}".repeat(300);
        let options = Options {
            style,
            output: dir.path().join("icon.png"),
            ..Options::default()
        };

        let result = generate_icon(&options);

        assert!(matches!(result, Err(RenderError::Render(_))));
        assert!(!options.output.exists());
    }
}
