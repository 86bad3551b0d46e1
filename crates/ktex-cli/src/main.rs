use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{Context, bail};
use clap::{ArgAction, Parser, Subcommand};
use image::{DynamicImage, ImageReader, RgbaImage};
use ktex_core::atlas_key::KEY_EXTENSION;
use ktex_core::prelude::*;
use serde::Deserialize;
use tracing::{debug, info};
use walkdir::WalkDir;

#[derive(Parser, Debug)]
#[command(
    name = "ktex",
    about = "Convert images to and from KTEX textures and pack texture atlases",
    version,
    author
)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
    /// Show progress bars (disable with --progress false or --quiet)
    #[arg(long, default_value_t = true, action=ArgAction::Set, global=true, help_heading = "Logging/UX")]
    progress: bool,
    /// Increase verbosity (-v, -vv)
    #[arg(short, long, action=ArgAction::Count, global=true, help_heading = "Logging/UX")]
    verbose: u8,
    /// Quiet mode (overrides verbose)
    #[arg(
        short,
        long,
        default_value_t = false,
        global = true,
        help_heading = "Logging/UX"
    )]
    quiet: bool,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Convert one image into a TEX file
    Compress(CompressArgs),
    /// Convert a TEX file back into an image
    Decompress(DecompressArgs),
    /// Pack every image in a directory into an atlas TEX plus XML key
    Pack(PackArgs),
    /// Split an atlas back into its element images using its XML key
    Unpack(UnpackArgs),
    /// Write the raw data and metadata of every mipmap
    Dump(DumpArgs),
    /// Print the header and mipmap summary of a TEX file
    Info(InfoArgs),
}

/// Encoding flags shared by `compress` and `pack`.
#[derive(Parser, Debug, Clone)]
struct EncodeArgs {
    /// Pixel format: dxt1|dxt3|dxt5|rgb|rgba|etc2eac (default dxt5)
    #[arg(short, long, help_heading = "Encoding")]
    format: Option<String>,
    /// Keep straight alpha (do not premultiply)
    #[arg(short, long, default_value_t = false, help_heading = "Encoding")]
    straight: bool,
    /// Unoptimized: store only the base level, no mip chain
    #[arg(short, long, default_value_t = false, help_heading = "Encoding")]
    unoptimized: bool,
    /// YAML file with encoding options; explicit flags win over it
    #[arg(long, help_heading = "Encoding")]
    config: Option<PathBuf>,
}

#[derive(Parser, Debug, Clone)]
struct CompressArgs {
    /// Input image
    #[arg(short, long, help_heading = "Input/Output")]
    input: PathBuf,
    /// Output TEX file (defaults to the input path with a .tex extension)
    #[arg(short, long, help_heading = "Input/Output")]
    output: Option<PathBuf>,
    #[command(flatten)]
    encode: EncodeArgs,
}

#[derive(Parser, Debug, Clone)]
struct DecompressArgs {
    /// Input TEX file
    #[arg(short, long, help_heading = "Input/Output")]
    input: PathBuf,
    /// Output image (defaults to the input path with a .png extension)
    #[arg(short, long, help_heading = "Input/Output")]
    output: Option<PathBuf>,
    /// Leave alpha premultiplied
    #[arg(short, long, default_value_t = false)]
    straight: bool,
}

#[derive(Parser, Debug, Clone)]
struct PackArgs {
    /// Directory of images (not searched recursively)
    #[arg(short, long, help_heading = "Input/Output")]
    input: PathBuf,
    /// Output directory for <dirname>.tex and <dirname>.xml
    #[arg(short, long, help_heading = "Input/Output")]
    output: PathBuf,
    /// Leave a one pixel gap right of and below every element
    #[arg(short, long, default_value_t = false, help_heading = "Layout")]
    margin: bool,
    #[command(flatten)]
    encode: EncodeArgs,
}

#[derive(Parser, Debug, Clone)]
struct UnpackArgs {
    /// Atlas key (.xml); the TEX it names must sit next to it
    #[arg(short, long, help_heading = "Input/Output")]
    input: PathBuf,
    /// Output directory; images land in <output>/<atlas name>/
    #[arg(short, long, help_heading = "Input/Output")]
    output: PathBuf,
    /// Leave alpha premultiplied
    #[arg(short, long, default_value_t = false)]
    straight: bool,
}

#[derive(Parser, Debug, Clone)]
struct DumpArgs {
    /// Input TEX file
    #[arg(short, long)]
    input: PathBuf,
    /// Output directory (defaults to a directory named after the input)
    #[arg(short, long)]
    output: Option<PathBuf>,
}

#[derive(Parser, Debug, Clone)]
struct InfoArgs {
    /// Input TEX file
    #[arg(short, long)]
    input: PathBuf,
    /// Print the header and mipmap table as JSON instead
    #[arg(long, default_value_t = false)]
    json: bool,
}

fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    init_tracing_with_level(cli.quiet, cli.verbose);
    match &cli.command {
        Commands::Compress(args) => run_compress(args),
        Commands::Decompress(args) => run_decompress(args),
        Commands::Pack(args) => run_pack(args, cli.progress && !cli.quiet),
        Commands::Unpack(args) => run_unpack(args),
        Commands::Dump(args) => run_dump(args),
        Commands::Info(args) => run_info(args),
    }
}

fn run_compress(args: &CompressArgs) -> anyhow::Result<()> {
    let opts = args.encode.to_tex_options()?;
    let output = args
        .output
        .clone()
        .unwrap_or_else(|| args.input.with_extension(TEX_EXTENSION));
    let img = load_image(&args.input)?;
    let tex = to_tex(&img, &opts).with_context(|| format!("convert {}", args.input.display()))?;
    tex.write_to_file(&output)
        .with_context(|| format!("write {}", output.display()))?;
    info!(?output, mips = tex.mip_map_count(), "wrote texture");
    Ok(())
}

fn run_decompress(args: &DecompressArgs) -> anyhow::Result<()> {
    let output = args
        .output
        .clone()
        .unwrap_or_else(|| args.input.with_extension("png"));
    let tex = read_tex_file(&args.input)?;
    let opts = FromTexOptions {
        demultiply_alpha: !args.straight,
    };
    let img = from_tex(&tex, &opts).with_context(|| format!("decode {}", args.input.display()))?;
    img.save(&output)
        .with_context(|| format!("write {}", output.display()))?;
    info!(?output, "wrote image");
    Ok(())
}

fn run_pack(args: &PackArgs, show_progress: bool) -> anyhow::Result<()> {
    if !args.input.is_dir() {
        bail!("input {} is not a directory", args.input.display());
    }
    let opts = args.encode.to_tex_options()?;
    fs::create_dir_all(&args.output)
        .with_context(|| format!("create output dir {}", args.output.display()))?;

    let atlas_name = dir_name(&args.input)?;
    let paths = gather_images(&args.input)?;
    if paths.is_empty() {
        bail!("no images found in {}", args.input.display());
    }
    let images = load_images_with_progress(&paths, show_progress)?;

    let atlas = pack_atlas(
        &images,
        &PackOptions {
            use_margin: args.margin,
        },
    )?;
    info!(
        elements = atlas.elements.len(),
        width = atlas.width(),
        height = atlas.height(),
        "packed atlas"
    );

    let key = AtlasKey::from_atlas(&atlas, &atlas_name, !opts.premultiply_alpha);
    let tex = to_tex(&DynamicImage::ImageRgba8(atlas.image), &opts)?;

    let tex_path = args.output.join(&key.atlas_filename);
    tex.write_to_file(&tex_path)
        .with_context(|| format!("write {}", tex_path.display()))?;
    info!(?tex_path, "wrote atlas");

    let key_path = args.output.join(format!("{atlas_name}.{KEY_EXTENSION}"));
    key.write_to_file(&key_path)
        .with_context(|| format!("write {}", key_path.display()))?;
    info!(?key_path, "wrote atlas key");
    Ok(())
}

fn run_unpack(args: &UnpackArgs) -> anyhow::Result<()> {
    if !args.input.is_file() || !has_extension(&args.input, KEY_EXTENSION) {
        bail!("input {} is not an .{KEY_EXTENSION} atlas key", args.input.display());
    }
    let key = AtlasKey::from_file(&args.input)
        .with_context(|| format!("read atlas key {}", args.input.display()))?;

    let key_dir = args.input.parent().unwrap_or(Path::new("."));
    let tex_path = key_dir.join(&key.atlas_filename);
    if !tex_path.is_file() {
        bail!("atlas {} named by the key does not exist", tex_path.display());
    }
    let tex = read_tex_file(&tex_path)?;

    let out_dir = args.output.join(file_stem(&tex_path)?);
    fs::create_dir_all(&out_dir)
        .with_context(|| format!("create output dir {}", out_dir.display()))?;

    let opts = FromTexOptions {
        demultiply_alpha: !args.straight && !key.straight_alpha,
    };
    let image = from_tex(&tex, &opts)
        .with_context(|| format!("decode {}", tex_path.display()))?
        .to_rgba8();
    let atlas = key
        .to_atlas(image)
        .with_context(|| format!("apply {} to {}", args.input.display(), tex_path.display()))?;

    for (name, img) in unpack_atlas(&atlas)? {
        let png_path = out_dir.join(format!("{name}.png"));
        img.save(&png_path)
            .with_context(|| format!("write {}", png_path.display()))?;
        debug!(?png_path, "wrote element");
    }
    info!(elements = atlas.elements.len(), ?out_dir, "unpacked atlas");
    Ok(())
}

fn run_dump(args: &DumpArgs) -> anyhow::Result<()> {
    let tex = read_tex_file_with(
        &args.input,
        ReadOptions {
            any_pixel_format: true,
        },
    )?;
    if !tex.has_mip_maps() {
        bail!("{} contains no mipmaps", args.input.display());
    }
    let out_dir = match &args.output {
        Some(dir) => dir.clone(),
        None => args.input.with_file_name(file_stem(&args.input)?),
    };
    fs::create_dir_all(&out_dir)
        .with_context(|| format!("create output dir {}", out_dir.display()))?;

    for (i, mip) in tex.mip_maps().iter().enumerate() {
        let meta_path = out_dir.join(format!("{i}-meta.json"));
        fs::write(&meta_path, mip.metadata_json())
            .with_context(|| format!("write {}", meta_path.display()))?;
        let data_path = out_dir.join(format!("{i}-data.bin"));
        fs::write(&data_path, &mip.data)
            .with_context(|| format!("write {}", data_path.display()))?;
    }
    info!(mips = tex.mip_map_count(), ?out_dir, "dumped texture");
    Ok(())
}

fn run_info(args: &InfoArgs) -> anyhow::Result<()> {
    let tex = read_tex_file_with(
        &args.input,
        ReadOptions {
            any_pixel_format: true,
        },
    )?;
    if args.json {
        let mips: Vec<_> = tex.mip_maps().iter().map(|m| m.meta()).collect();
        let doc = serde_json::json!({ "header": tex.header, "mip_maps": mips });
        println!("{}", serde_json::to_string_pretty(&doc)?);
    } else {
        println!("{}", tex.info());
    }
    Ok(())
}

impl EncodeArgs {
    /// YAML file first, then explicit flags on top.
    fn to_tex_options(&self) -> anyhow::Result<ToTexOptions> {
        let mut opts = ToTexOptions::default();
        if let Some(path) = &self.config {
            let file = fs::read_to_string(path)
                .with_context(|| format!("read config {}", path.display()))?;
            let y: YamlConfig = serde_yaml::from_str(&file)
                .with_context(|| format!("parse config {}", path.display()))?;
            opts = y.into_tex_options(opts);
        }
        if let Some(f) = &self.format {
            opts.pixel_format = parse_pixel_format(f)?;
        }
        if self.straight {
            opts.premultiply_alpha = false;
        }
        if self.unoptimized {
            opts.generate_mip_maps = false;
        }
        debug!(?opts, "encoding options");
        Ok(opts)
    }
}

#[derive(Debug, Deserialize, Default)]
struct YamlConfig {
    pixel_format: Option<String>,
    texture_type: Option<String>,
    generate_mip_maps: Option<bool>,
    premultiply_alpha: Option<bool>,
}

impl YamlConfig {
    fn into_tex_options(self, mut opts: ToTexOptions) -> ToTexOptions {
        if let Some(v) = self.pixel_format.as_deref().and_then(|s| s.parse().ok()) {
            opts.pixel_format = v;
        }
        if let Some(v) = self.texture_type.as_deref().and_then(|s| s.parse().ok()) {
            opts.texture_type = v;
        }
        if let Some(v) = self.generate_mip_maps {
            opts.generate_mip_maps = v;
        }
        if let Some(v) = self.premultiply_alpha {
            opts.premultiply_alpha = v;
        }
        opts
    }
}

fn parse_pixel_format(s: &str) -> anyhow::Result<PixelFormat> {
    s.parse::<PixelFormat>().map_err(|_| {
        anyhow::anyhow!("unknown pixel format '{s}' (expected dxt1|dxt3|dxt5|rgb|rgba|etc2eac)")
    })
}

fn read_tex_file(path: &Path) -> anyhow::Result<Tex> {
    read_tex_file_with(path, ReadOptions::default())
}

/// Inspection commands accept pixel formats the codecs cannot decode.
fn read_tex_file_with(path: &Path, opts: ReadOptions) -> anyhow::Result<Tex> {
    Tex::from_file_with(path, opts).with_context(|| format!("read {}", path.display()))
}

fn dir_name(p: &Path) -> anyhow::Result<String> {
    let abs = p
        .canonicalize()
        .with_context(|| format!("resolve {}", p.display()))?;
    abs.file_name()
        .and_then(|s| s.to_str())
        .map(str::to_string)
        .with_context(|| format!("{} has no usable directory name", p.display()))
}

fn file_stem(p: &Path) -> anyhow::Result<String> {
    p.file_stem()
        .and_then(|s| s.to_str())
        .map(str::to_string)
        .with_context(|| format!("{} has no usable file name", p.display()))
}

fn has_extension(p: &Path, ext: &str) -> bool {
    p.extension().and_then(|e| e.to_str()) == Some(ext)
}

/// Images directly inside `dir`, sorted by path.
fn gather_images(dir: &Path) -> anyhow::Result<Vec<PathBuf>> {
    let mut list = Vec::new();
    for entry in WalkDir::new(dir).min_depth(1).max_depth(1).sort_by_file_name() {
        let entry = entry.with_context(|| format!("list {}", dir.display()))?;
        let p = entry.path();
        if p.is_file() && is_image(p) {
            list.push(p.to_path_buf());
        }
    }
    Ok(list)
}

fn is_image(p: &Path) -> bool {
    matches!(
        p.extension()
            .and_then(|e| e.to_str())
            .map(|s| s.to_ascii_lowercase()),
        Some(ext) if matches!(ext.as_str(), "png" | "jpg" | "jpeg" | "bmp" | "tga" | "gif")
    )
}

fn load_images_with_progress(paths: &[PathBuf], progress: bool) -> anyhow::Result<NamedImages> {
    use indicatif::{ProgressBar, ProgressStyle};
    let bar = if progress {
        let b = ProgressBar::new(paths.len() as u64);
        b.set_style(
            ProgressStyle::with_template(
                "{spinner:.green} loading {pos}/{len} [{elapsed_precise}] {wide_msg}",
            )
            .context("progress bar template")?,
        );
        Some(b)
    } else {
        None
    };
    let mut named: BTreeMap<String, RgbaImage> = BTreeMap::new();
    let mut sources: BTreeMap<String, &Path> = BTreeMap::new();
    for p in paths {
        let msg = p.file_name().and_then(|s| s.to_str()).unwrap_or("");
        if let Some(b) = &bar {
            b.set_message(msg.to_string());
        }
        let name = file_stem(p)?;
        if let Some(first) = sources.insert(name.clone(), p) {
            bail!(
                "element name '{name}' is used by both {} and {}",
                first.display(),
                p.display()
            );
        }
        named.insert(name, load_image(p)?.to_rgba8());
        if let Some(b) = &bar {
            b.inc(1);
        }
    }
    if let Some(b) = &bar {
        b.finish_and_clear();
    }
    Ok(named)
}

fn load_image(p: &Path) -> anyhow::Result<DynamicImage> {
    let img = ImageReader::open(p)
        .with_context(|| format!("open {}", p.display()))?
        .with_guessed_format()?
        .decode()
        .with_context(|| format!("decode {}", p.display()))?;
    Ok(img)
}

fn init_tracing_with_level(quiet: bool, verbose: u8) {
    let level = if quiet {
        "error".to_string()
    } else {
        match verbose {
            0 => "info".into(),
            1 => "debug".into(),
            _ => "trace".into(),
        }
    };
    let _ = tracing_subscriber::fmt()
        .with_env_filter(level)
        .with_target(false)
        .try_init();
}
