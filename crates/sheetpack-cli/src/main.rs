use std::fs;
use std::path::{Path, PathBuf};
use std::time::Instant;

use anyhow::Context;
use clap::{ArgAction, Parser, Subcommand};
use globset::{Glob, GlobSet, GlobSetBuilder};
use serde::{Deserialize, Serialize};
use sheetpack_core::cache::persist::content_digest;
use sheetpack_core::cache::{PackCache, PersistentCache};
use sheetpack_core::config::{AtlasConfig, PackerConfig, SearchStrategy, SortOrder};
use sheetpack_core::frameset::{FrameSetBuilder, SourceEntry, apply_measurements, normalize_path};
use sheetpack_core::model::{Frame, Measurement, Rect};
use sheetpack_core::{pack_frames, to_json_hash};
use tracing::{debug, info};
use walkdir::WalkDir;

/// Config file looked up next to the frames when `--config` is not given.
const DEFAULT_CONFIG_FILE: &str = "tileset.yaml";

#[derive(Parser, Debug)]
#[command(
    name = "sheetpack",
    about = "Lay out a folder of sprite frames on one sheet",
    version,
    author
)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
    /// Show a progress bar while probing frames
    #[arg(long, default_value_t = false, action=ArgAction::Set, global=true, help_heading = "Logging/UX")]
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
    /// Pack each frame directory and write `<name>.json` next to it (or into --out-dir)
    Pack(PackArgs),
    /// Print the descriptor to stdout; never reads or writes the cache journal
    Layout(PackArgs),
}

#[derive(Parser, Debug, Clone)]
struct PackArgs {
    // Input/Output
    /// Frame directories; each one becomes one sheet
    #[arg(required = true, help_heading = "Input/Output")]
    inputs: Vec<PathBuf>,
    /// Output directory (defaults to each input directory)
    #[arg(short, long, help_heading = "Input/Output")]
    out_dir: Option<PathBuf>,
    /// YAML atlas config (defaults to `<DIR>/tileset.yaml` when present)
    #[arg(long, help_heading = "Input/Output")]
    config: Option<PathBuf>,
    /// Include patterns (glob). If set, only files matching any pattern are considered
    #[arg(long, help_heading = "Input/Output")]
    include: Vec<String>,
    /// Exclude patterns (glob). Files matching any pattern will be ignored
    #[arg(long, help_heading = "Input/Output")]
    exclude: Vec<String>,

    // Layout
    /// Max sheet width
    #[arg(long, help_heading = "Layout")]
    max_width: Option<u32>,
    /// Max sheet height
    #[arg(long, help_heading = "Layout")]
    max_height: Option<u32>,
    /// Sort order: area_desc|max_side_desc|height_desc|width_desc|name_asc|none
    #[arg(long, help_heading = "Layout")]
    sort_order: Option<String>,

    // Search
    /// Canvas search: sweep | genetic
    #[arg(long, help_heading = "Search")]
    strategy: Option<String>,
    /// Seed for the genetic search
    #[arg(long, help_heading = "Search")]
    seed: Option<u64>,
    /// Evaluate sweep candidates in parallel (requires feature `parallel`)
    #[arg(long, default_value_t = false, help_heading = "Search")]
    parallel: bool,

    // Cache/Export
    /// Ignore and do not update the cache journal
    #[arg(long, default_value_t = false, help_heading = "Cache/Export")]
    no_cache: bool,
    /// Print the merged configuration (after YAML/CLI) and exit
    #[arg(long, default_value_t = false, help_heading = "Cache/Export")]
    print_config: bool,
    /// Output format for --print-config: json|yaml
    #[arg(long, default_value = "json", value_parser = ["json", "yaml"], help_heading = "Cache/Export")]
    print_config_format: String,
    /// Dry run: compute layout and stats but do not write files
    #[arg(long, default_value_t = false, help_heading = "Cache/Export")]
    dry_run: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Mode {
    Pack,
    Layout,
}

fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    init_tracing_with_level(cli.quiet, cli.verbose);
    let progress = cli.progress && !cli.quiet;
    // one cache for the whole run
    let cache = PackCache::new();
    let (args, mode) = match &cli.command {
        Commands::Pack(args) => (args, Mode::Pack),
        Commands::Layout(args) => (args, Mode::Layout),
    };
    for input in &args.inputs {
        run_dir(input, args, mode, progress, &cache)?;
    }
    Ok(())
}

/// Everything that decides a layout; serialized into the build digest.
#[derive(Debug, Serialize)]
struct EffectiveConfig {
    atlas: AtlasConfig,
    packer: PackerConfig,
}

fn load_config(dir: &Path, args: &PackArgs) -> anyhow::Result<EffectiveConfig> {
    let path = match &args.config {
        Some(p) => Some(p.clone()),
        None => Some(dir.join(DEFAULT_CONFIG_FILE)).filter(|p| p.is_file()),
    };
    let yaml = match &path {
        Some(p) => {
            let text =
                fs::read_to_string(p).with_context(|| format!("read config {}", p.display()))?;
            serde_yaml::from_str::<YamlConfig>(&text)
                .with_context(|| format!("parse config {}", p.display()))?
        }
        None => YamlConfig::default(),
    };
    let atlas = yaml.atlas.clone();
    let mut packer = atlas.packer_config(yaml.into_packer_config(PackerConfig::default())?);
    if let Some(v) = args.max_width {
        packer.max_width = v;
    }
    if let Some(v) = args.max_height {
        packer.max_height = v;
    }
    if let Some(v) = &args.sort_order {
        packer.sort_order = parse_sort_order(v)?;
    }
    if let Some(v) = &args.strategy {
        packer.strategy = parse_strategy(v)?;
    }
    if let Some(v) = args.seed {
        packer.seed = v;
    }
    if args.parallel {
        packer.parallel = true;
    }
    atlas.validate()?;
    packer.validate()?;
    Ok(EffectiveConfig { atlas, packer })
}

fn run_dir(
    input: &Path,
    args: &PackArgs,
    mode: Mode,
    progress: bool,
    cache: &PackCache,
) -> anyhow::Result<()> {
    let cwd = std::env::current_dir().context("current directory")?;
    let root = normalize_path(&cwd, input);
    anyhow::ensure!(root.is_dir(), "{} is not a directory", root.display());

    let cfg = load_config(&root, args)?;
    if args.print_config {
        match args.print_config_format.as_str() {
            "yaml" => println!("{}", serde_yaml::to_string(&cfg)?),
            _ => println!("{}", serde_json::to_string_pretty(&cfg)?),
        }
        return Ok(());
    }

    let dir_name = root
        .file_name()
        .and_then(|s| s.to_str())
        .with_context(|| format!("directory name of {}", root.display()))?;
    let output = cfg.atlas.output_name(dir_name);
    let out_dir = args.out_dir.clone().unwrap_or_else(|| root.clone());

    let paths = gather_paths(&root, &args.include, &args.exclude)?;
    let entries: Vec<SourceEntry> = paths.iter().map(SourceEntry::from_path).collect();
    let mut frames = FrameSetBuilder::new(&root, &output, &cfg.atlas).build(&entries)?;
    info!(output = %output, count = frames.len(), "frame set built");

    let use_journal = mode == Mode::Pack && !args.no_cache;
    let journal = PersistentCache::in_dir(&out_dir);
    let descriptor_path = out_dir.join(format!("{output}.json"));
    let digest = if use_journal {
        let config_json = serde_json::to_string(&cfg)?;
        let contents = read_contents(&frames)?;
        let digest = content_digest(&config_json, &contents);
        if journal.is_fresh(&output, &digest, &[&descriptor_path]) {
            info!(output = %output, "up to date, skipping");
            return Ok(());
        }
        Some(digest)
    } else {
        None
    };

    let measurements = probe_frames_with_progress(&frames, cfg.atlas.trim, progress)?;
    apply_measurements(&mut frames, &measurements, &cfg.atlas.measure_config())?;

    let t0 = Instant::now();
    let outcome = pack_frames(&frames, &cfg.packer, cache, &output)?;
    let stats = outcome.result.stats();
    debug!(elapsed_ms = t0.elapsed().as_millis() as u64, "pack finished");
    info!(output = %output, from_cache = outcome.from_cache, "{}", stats.summary());

    let descriptor = to_json_hash(&outcome.result, &frames, &format!("{output}.png"));
    match mode {
        Mode::Layout => println!("{}", serde_json::to_string_pretty(&descriptor)?),
        Mode::Pack if args.dry_run => println!(
            "{output}: {}x{} frames={} occupancy={:.2}%",
            outcome.result.canvas.width,
            outcome.result.canvas.height,
            stats.num_frames,
            stats.occupancy * 100.0
        ),
        Mode::Pack => {
            fs::create_dir_all(&out_dir)
                .with_context(|| format!("create out_dir {}", out_dir.display()))?;
            fs::write(&descriptor_path, serde_json::to_string_pretty(&descriptor)?)
                .with_context(|| format!("write {}", descriptor_path.display()))?;
            info!(path = %descriptor_path.display(), "descriptor written");
            if let Some(digest) = digest {
                journal
                    .record(&output, &digest)
                    .with_context(|| format!("record {}", journal.path().display()))?;
            }
        }
    }
    Ok(())
}

/// Files directly inside `dir`, sorted by name.
fn gather_paths(dir: &Path, include: &[String], exclude: &[String]) -> anyhow::Result<Vec<PathBuf>> {
    let inc_set = build_globset(include)?;
    let exc_set = build_globset(exclude)?;
    let mut list: Vec<PathBuf> = Vec::new();
    for entry in WalkDir::new(dir)
        .min_depth(1)
        .max_depth(1)
        .sort_by_file_name()
        .into_iter()
        .filter_map(|e| e.ok())
    {
        let p = entry.path();
        if entry.file_type().is_file() && !should_skip(p, inc_set.as_ref(), exc_set.as_ref()) {
            list.push(p.to_path_buf());
        }
    }
    Ok(list)
}

fn build_globset(patterns: &[String]) -> anyhow::Result<Option<GlobSet>> {
    if patterns.is_empty() {
        return Ok(None);
    }
    let mut b = GlobSetBuilder::new();
    for pat in patterns {
        b.add(Glob::new(pat).with_context(|| format!("glob pattern {pat}"))?);
    }
    Ok(Some(b.build()?))
}

fn should_skip(p: &Path, include: Option<&GlobSet>, exclude: Option<&GlobSet>) -> bool {
    let s = p.to_string_lossy().replace('\\', "/");
    if exclude.is_some_and(|ex| ex.is_match(&s)) {
        return true;
    }
    include.is_some_and(|inc| !inc.is_match(&s))
}

fn read_contents(frames: &[Frame]) -> anyhow::Result<Vec<Vec<u8>>> {
    frames
        .iter()
        .map(|f| fs::read(&f.path).with_context(|| format!("read {}", f.path.display())))
        .collect()
}

fn probe_frames_with_progress(
    frames: &[Frame],
    trim: bool,
    progress: bool,
) -> anyhow::Result<Vec<Measurement>> {
    use indicatif::{ProgressBar, ProgressStyle};
    let bar = if progress {
        let b = ProgressBar::new(frames.len() as u64);
        b.set_style(ProgressStyle::with_template(
            "{spinner:.green} probing {pos}/{len} [{elapsed_precise}] {wide_msg}",
        )?);
        Some(b)
    } else {
        None
    };
    let mut list = Vec::with_capacity(frames.len());
    for f in frames {
        if let Some(b) = &bar {
            b.set_message(f.name.clone());
        }
        list.push(probe_frame(&f.path, trim).with_context(|| format!("probe {}", f.path.display()))?);
        if let Some(b) = &bar {
            b.inc(1);
        }
    }
    if let Some(b) = &bar {
        b.finish_and_clear();
    }
    Ok(list)
}

/// Header-only size probe; decodes pixels only when trimming.
fn probe_frame(path: &Path, trim: bool) -> anyhow::Result<Measurement> {
    if !trim {
        let (width, height) = image::image_dimensions(path)?;
        return Ok(Measurement {
            width,
            height,
            trim: None,
        });
    }
    let rgba = image::open(path)?.to_rgba8();
    let (w, h) = rgba.dimensions();
    Ok(match opaque_bounds(&rgba) {
        Some(b) => Measurement {
            width: b.w,
            height: b.h,
            trim: Some(Rect::new(b.x, b.y, w, h)),
        },
        // fully transparent: keep the whole image
        None => Measurement {
            width: w,
            height: h,
            trim: Some(Rect::new(0, 0, w, h)),
        },
    })
}

/// Bounding box of pixels with non-zero alpha.
fn opaque_bounds(rgba: &image::RgbaImage) -> Option<Rect> {
    let mut bounds: Option<(u32, u32, u32, u32)> = None;
    for (x, y, px) in rgba.enumerate_pixels() {
        if px[3] == 0 {
            continue;
        }
        bounds = Some(match bounds {
            None => (x, y, x, y),
            Some((x1, y1, x2, y2)) => (x1.min(x), y1.min(y), x2.max(x), y2.max(y)),
        });
    }
    bounds.map(|(x1, y1, x2, y2)| Rect::new(x1, y1, x2 - x1 + 1, y2 - y1 + 1))
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
        .with_writer(std::io::stderr)
        .try_init();
}

/// `tileset.yaml`: atlas keys at the top level plus optional packer overrides.
#[derive(Debug, Deserialize, Default)]
struct YamlConfig {
    #[serde(flatten)]
    atlas: AtlasConfig,
    max_width: Option<u32>,
    max_height: Option<u32>,
    sort_order: Option<String>,
    strategy: Option<String>,
    aspect_threshold: Option<u64>,
    max_aspect_ratio: Option<f64>,
    sweep_samples: Option<u32>,
    population: Option<usize>,
    generations: Option<usize>,
    live_rate: Option<f64>,
    seed: Option<u64>,
    parallel: Option<bool>,
}

impl YamlConfig {
    fn into_packer_config(self, mut cfg: PackerConfig) -> anyhow::Result<PackerConfig> {
        if let Some(v) = self.max_width {
            cfg.max_width = v;
        }
        if let Some(v) = self.max_height {
            cfg.max_height = v;
        }
        if let Some(v) = self.sort_order {
            cfg.sort_order = parse_sort_order(&v)?;
        }
        if let Some(v) = self.strategy {
            cfg.strategy = parse_strategy(&v)?;
        }
        if let Some(v) = self.aspect_threshold {
            cfg.aspect_threshold = v;
        }
        if let Some(v) = self.max_aspect_ratio {
            cfg.max_aspect_ratio = v;
        }
        if let Some(v) = self.sweep_samples {
            cfg.sweep_samples = v;
        }
        if let Some(v) = self.population {
            cfg.population = v;
        }
        if let Some(v) = self.generations {
            cfg.generations = v;
        }
        if let Some(v) = self.live_rate {
            cfg.live_rate = v;
        }
        if let Some(v) = self.seed {
            cfg.seed = v;
        }
        if let Some(v) = self.parallel {
            cfg.parallel = v;
        }
        Ok(cfg)
    }
}

fn parse_sort_order(s: &str) -> anyhow::Result<SortOrder> {
    s.parse()
        .map_err(|_| anyhow::anyhow!("unknown sort order: {s}"))
}

fn parse_strategy(s: &str) -> anyhow::Result<SearchStrategy> {
    s.parse()
        .map_err(|_| anyhow::anyhow!("unknown search strategy: {s}"))
}
