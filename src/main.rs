use clap::Parser;
use env_logger::Env;
use glass_icon::icon_gen::{
    self, IconStyle, Options, RenderError, DEFAULT_BOTTOM_COLOR, DEFAULT_GLYPH, DEFAULT_OUTPUT,
    DEFAULT_TOP_COLOR, REFERENCE_SIZE,
};
use image::Rgb;
use std::{
    io::{self, Write},
    path::PathBuf,
    process::ExitCode,
};

#[derive(Debug, Parser)]
#[clap(
    name = "glass-icon",
    about = "Render the Glass Calculator app icon as a PNG"
)]
struct Args {
    /// Output PNG file.
    #[clap(short, long, value_name = "FILE", default_value = DEFAULT_OUTPUT)]
    output: PathBuf,

    /// Edge length of the icon in pixels.
    #[clap(
        short,
        long,
        value_name = "PX",
        default_value_t = REFERENCE_SIZE,
        value_parser = clap::value_parser!(u32).range(16..=8192)
    )]
    size: u32,

    /// Text drawn in the middle of the icon.
    #[clap(long, default_value = DEFAULT_GLYPH)]
    glyph: String,

    /// Gradient color at the top edge (CSS color format)
    #[clap(long, value_name = "COLOR", value_parser = icon_gen::parse_color)]
    top_color: Option<Rgb<u8>>,

    /// Gradient color at the bottom edge (CSS color format)
    #[clap(long, value_name = "COLOR", value_parser = icon_gen::parse_color)]
    bottom_color: Option<Rgb<u8>>,

    /// Font file to try before the system fonts. May be repeated.
    #[clap(long = "font", value_name = "FILE")]
    fonts: Vec<PathBuf>,

    /// Extra PNG sizes written next to the output, e.g. 180,120,80
    #[clap(
        short,
        long,
        value_delimiter = ',',
        value_name = "SIZES",
        value_parser = clap::value_parser!(u32).range(1..=8192)
    )]
    png: Vec<u32>,

    /// Also populate an Xcode AppIcon.appiconset directory
    #[clap(long, value_name = "DIR")]
    appiconset: Option<PathBuf>,
}

impl Args {
    fn into_options(self) -> Options {
        let mut style = IconStyle::for_size(self.size);
        style.glyph = self.glyph;
        style.top_color = self.top_color.unwrap_or(DEFAULT_TOP_COLOR);
        style.bottom_color = self.bottom_color.unwrap_or(DEFAULT_BOTTOM_COLOR);

        Options {
            style,
            output: self.output,
            fonts: self.fonts,
            extra_sizes: self.png,
            appiconset: self.appiconset,
        }
    }
}

fn main() -> ExitCode {
    env_logger::Builder::from_env(Env::default().default_filter_or("info")).init();

    let options = Args::parse().into_options();

    println!("🎨 Generating the Glass Calculator icon...\n");

    match icon_gen::generate_icon(&options) {
        Ok(()) => {
            print_next_steps(&options);
            ExitCode::SUCCESS
        }
        Err(err) => ExitCode::from(report(&err, &mut io::stderr())),
    }
}

/// Write user guidance for `err` and return the process exit status.
fn report(err: &RenderError, out: &mut impl Write) -> u8 {
    // Nothing useful is left to do if stderr itself is gone.
    let _ = write_guidance(err, out);
    match err {
        RenderError::MissingCodec => 2,
        RenderError::Render(_) => 1,
    }
}

fn write_guidance(err: &RenderError, out: &mut impl Write) -> io::Result<()> {
    match err {
        RenderError::MissingCodec => {
            writeln!(out, "❌ Error: PNG support is missing from the `image` crate")?;
            writeln!(out, "💡 Rebuild with the `png` feature enabled:")?;
            writeln!(
                out,
                "   image = {{ version = \"0.24\", features = [\"png\"] }}"
            )?;
        }
        RenderError::Render(err) => {
            writeln!(out, "❌ Error generating the icon: {err:#}")?;
            writeln!(out, "\n💡 Alternatives:")?;
            writeln!(out, "1. Use an online generator such as https://www.appicon.co")?;
            writeln!(out, "2. Export the AppIconView preview from Xcode")?;
            writeln!(out, "3. Draw the icon by hand in Figma or Sketch")?;
        }
    }
    Ok(())
}

fn print_next_steps(options: &Options) {
    let size = options.style.size;
    println!("📐 Size: {size}x{size} pixels");
    println!("\n📋 Next steps:");
    println!("1. Open the project in Xcode");
    println!("2. Go to Assets.xcassets > AppIcon");
    println!(
        "3. Drag {} into the 1024x1024 slot",
        options.output.display()
    );
}
