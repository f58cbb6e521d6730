mod render;

use std::path::{Path, PathBuf};
use std::time::Instant;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand, ValueEnum};

use poster_compose::frames::{generate_layouts, FramesManifest, LayoutSelection};
use poster_compose::paths::resolve_manifest_path;
use poster_compose::SceneBuilder;
use poster_core::hash::fingerprint;
use poster_core::{PosterConfig, PosterError};
use poster_ir::asset::{stage_rig_chain, validate_taxonomy, GroupRole};
use poster_ir::manifest::MM_PER_INCH;
use poster_ir::{load_document, save_document, AssetDocument, LibraryDocument, ManifestDocument, SceneDocument};
use poster_library::{
    bake, build_library, link, link_then_bake, verify_packed, BakeReport, LibrarySet, RecipeStore, SyncOptions,
};

use crate::render::RenderJob;

#[derive(Parser)]
#[command(
    name = "poster",
    version,
    about = "Poster pipeline: scene composition and material library tools",
    long_about = "Compose poster scenes from a JSON manifest, maintain the shared material library,\nand link or bake library materials into asset documents."
)]
struct Cli {
    /// Project configuration file (default: ./poster.toml when present)
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Only log warnings and errors
    #[arg(short, long, global = true)]
    quiet: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Build or update the material library and regenerate its catalog
    BuildLibrary {
        /// Recipe file (.json or .toml); defaults to the built-in starter set
        #[arg(long)]
        recipes: Option<PathBuf>,

        #[arg(long)]
        library: Option<PathBuf>,

        #[arg(long)]
        catalog: Option<PathBuf>,

        /// Start a fresh library instead of updating the existing one
        #[arg(long)]
        force_new: bool,
    },

    /// Link library materials into an asset document
    Link {
        /// Asset document to update
        asset: PathBuf,

        #[arg(long)]
        library: Option<PathBuf>,

        /// Material name patterns (comma separated, `*` and `?` wildcards)
        #[arg(long, value_delimiter = ',')]
        materials: Vec<String>,

        /// Write here instead of updating the asset in place
        #[arg(short, long)]
        out: Option<PathBuf>,
    },

    /// Localize linked materials and pack media so the asset is self-contained
    Bake {
        asset: PathBuf,

        #[arg(short, long)]
        out: Option<PathBuf>,

        /// Leave media external
        #[arg(long)]
        no_pack: bool,

        /// Only bake materials used by a mesh (leaves the asset not self-contained)
        #[arg(long)]
        used_only: bool,
    },

    /// Link then bake a development asset into a separate compiled asset
    LinkThenBake {
        /// Development asset (left unchanged)
        asset: PathBuf,

        /// Compiled asset to write
        #[arg(short, long)]
        out: PathBuf,

        #[arg(long)]
        library: Option<PathBuf>,

        #[arg(long, value_delimiter = ',')]
        materials: Vec<String>,

        #[arg(long)]
        no_pack: bool,

        #[arg(long)]
        used_only: bool,
    },

    /// Build or refresh the poster scene document from a manifest
    ComposeScene {
        /// Poster manifest (JSON)
        manifest: Option<PathBuf>,

        /// Scene document to write (default: poster_scene.json next to the manifest)
        #[arg(short, long)]
        out: Option<PathBuf>,

        /// Override the manifest's output ppi
        #[arg(long)]
        ppi: Option<u32>,
    },

    /// Hand a composed scene document to the external renderer
    Render {
        /// Scene document (default: [paths] scene_output)
        scene: Option<PathBuf>,

        /// Image to write (default: [render] output, else poster.png next to the scene)
        #[arg(short, long)]
        output: Option<PathBuf>,

        #[arg(long)]
        ppi: Option<u32>,

        /// Print the renderer command line without running it
        #[arg(long)]
        dry_run: bool,
    },

    /// Generate per-frame stage layouts inside an asset document
    StageFrames {
        /// Frames manifest (JSON)
        manifest: PathBuf,

        #[arg(long, value_enum, default_value = "both")]
        layout: LayoutArg,

        /// Write here instead of updating the source asset in place
        #[arg(short, long)]
        out: Option<PathBuf>,
    },

    /// Validate an asset document against the group taxonomy and print its structure
    CheckAsset {
        asset: PathBuf,
    },
}

#[derive(Clone, Copy, ValueEnum)]
enum LayoutArg {
    Stacked,
    Timez,
    Both,
}

impl From<LayoutArg> for LayoutSelection {
    fn from(arg: LayoutArg) -> Self {
        match arg {
            LayoutArg::Stacked => LayoutSelection::Stacked,
            LayoutArg::Timez => LayoutSelection::TimeZ,
            LayoutArg::Both => LayoutSelection::Both,
        }
    }
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    let filter = if cli.quiet {
        tracing_subscriber::EnvFilter::new("warn")
    } else {
        tracing_subscriber::EnvFilter::try_from_default_env()
            .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info"))
    };
    // Reports go to stdout; logs stay on stderr.
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();

    let config = load_config(cli.config.as_deref())?;

    match cli.command {
        Commands::BuildLibrary {
            recipes,
            library,
            catalog,
            force_new,
        } => cmd_build_library(&config, recipes, library, catalog, force_new),
        Commands::Link {
            asset,
            library,
            materials,
            out,
        } => cmd_link(&config, asset, library, materials, out),
        Commands::Bake {
            asset,
            out,
            no_pack,
            used_only,
        } => cmd_bake(&config, asset, out, no_pack, used_only),
        Commands::LinkThenBake {
            asset,
            out,
            library,
            materials,
            no_pack,
            used_only,
        } => cmd_link_then_bake(&config, asset, out, library, materials, no_pack, used_only),
        Commands::ComposeScene { manifest, out, ppi } => cmd_compose_scene(&config, manifest, out, ppi),
        Commands::Render {
            scene,
            output,
            ppi,
            dry_run,
        } => cmd_render(&config, scene, output, ppi, dry_run),
        Commands::StageFrames { manifest, layout, out } => cmd_stage_frames(manifest, layout.into(), out),
        Commands::CheckAsset { asset } => cmd_check_asset(asset),
    }
}

fn load_config(path: Option<&Path>) -> Result<PosterConfig> {
    match path {
        Some(path) => PosterConfig::load_from_file(path)
            .with_context(|| format!("failed to load configuration {}", path.display())),
        None => {
            let cwd = std::env::current_dir().unwrap_or_else(|_| PathBuf::from("."));
            PosterConfig::discover(&cwd).context("failed to load poster.toml")
        }
    }
}

/// Print every error, then fail with a summary.
fn fail_with(errors: Vec<PosterError>, what: &str) -> Result<()> {
    for error in &errors {
        eprintln!("   ✗ {}", error);
    }
    anyhow::bail!("{}: {} error(s)", what, errors.len())
}

fn sync_options(config: &PosterConfig, materials: Vec<String>, no_pack: bool, used_only: bool) -> SyncOptions {
    let mut options = SyncOptions::from(&config.sync);
    if !materials.is_empty() {
        options.patterns = materials;
    }
    if no_pack {
        options.pack = false;
    }
    if used_only {
        options.used_only = true;
    }
    options
}

fn asset_dir(path: &Path) -> PathBuf {
    path.parent()
        .filter(|p| !p.as_os_str().is_empty())
        .map(Path::to_path_buf)
        .unwrap_or_else(|| PathBuf::from("."))
}

fn load_asset(path: &Path) -> Result<AssetDocument> {
    load_document(path).with_context(|| format!("failed to load asset {}", path.display()))
}

/// Load the library and return its canonical path, which is what linked
/// materials record so later bakes resolve it from any directory.
fn load_library(path: &Path) -> Result<(PathBuf, LibraryDocument)> {
    if !path.is_file() {
        anyhow::bail!(
            "material library {} not found; run `poster build-library` first",
            path.display()
        );
    }
    let library =
        poster_library::load_library(path).with_context(|| format!("failed to load library {}", path.display()))?;
    let canonical = std::fs::canonicalize(path).with_context(|| format!("failed to resolve {}", path.display()))?;
    Ok((canonical, library))
}

fn print_bake_report(report: &BakeReport) {
    println!("   ✓ Baked {} material(s)", report.baked.len());
    println!("   ✓ Packed {} media file(s)", report.packed.len());
    if !report.skipped_unused.is_empty() {
        println!("   ! Left {} unused material(s) linked", report.skipped_unused.len());
    }
    let remaining = &report.remaining;
    if remaining.is_self_contained() {
        println!("   ✓ Self-contained: no linked materials, no external media");
    } else {
        println!(
            "   ! Remaining linked: materials={} media={}",
            remaining.materials.len(),
            remaining.media.len()
        );
        for library in &remaining.libraries {
            println!("     library: {}", library);
        }
        for media in &remaining.media {
            println!("     media:   {}", media);
        }
    }
}

fn cmd_build_library(
    config: &PosterConfig,
    recipes: Option<PathBuf>,
    library: Option<PathBuf>,
    catalog: Option<PathBuf>,
    force_new: bool,
) -> Result<()> {
    let start = Instant::now();
    let library_path = library.unwrap_or_else(|| config.paths.library.clone());
    let catalog_path = catalog.unwrap_or_else(|| config.paths.catalog.clone());

    let store = match recipes.or_else(|| config.paths.recipes.clone()) {
        Some(path) => match RecipeStore::load(&path) {
            Ok(store) => store,
            Err(errors) => return fail_with(errors, &format!("invalid recipes in {}", path.display())),
        },
        None => RecipeStore::builtin(),
    };

    println!("📚 Building material library {}", library_path.display());
    let summary = build_library(&store, &library_path, &catalog_path, force_new)?;
    println!(
        "   ✓ {} created, {} updated, {} unchanged",
        summary.created.len(),
        summary.updated.len(),
        summary.unchanged.len()
    );
    println!("   ✓ Catalog {}", catalog_path.display());
    println!("   Done in {:.2?}", start.elapsed());
    Ok(())
}

fn cmd_link(
    config: &PosterConfig,
    asset: PathBuf,
    library: Option<PathBuf>,
    materials: Vec<String>,
    out: Option<PathBuf>,
) -> Result<()> {
    let options = sync_options(config, materials, false, false);
    let (library_path, lib) = load_library(&library.unwrap_or_else(|| config.paths.library.clone()))?;
    let mut doc = load_asset(&asset)?;

    println!("🔗 Linking {} into {}", library_path.display(), asset.display());
    let report = link(&mut doc, &lib, &library_path, &options.patterns);

    let target = out.unwrap_or(asset);
    save_document(&doc, &target).with_context(|| format!("failed to write {}", target.display()))?;
    println!(
        "   ✓ Linked {}, refreshed {}, skipped {} local",
        report.linked.len(),
        report.refreshed.len(),
        report.skipped_local.len()
    );
    println!("   ✓ Wrote {}", target.display());
    Ok(())
}

fn cmd_bake(config: &PosterConfig, asset: PathBuf, out: Option<PathBuf>, no_pack: bool, used_only: bool) -> Result<()> {
    let options = sync_options(config, Vec::new(), no_pack, used_only);
    let mut doc = load_asset(&asset)?;
    let base = asset_dir(&asset);

    println!("🔥 Baking {}", asset.display());
    let mut libraries = LibrarySet::new(&base);
    let report = bake(&mut doc, &mut libraries, &base, &options)
        .with_context(|| format!("failed to bake {}", asset.display()))?;

    let target = out.unwrap_or(asset);
    save_document(&doc, &target).with_context(|| format!("failed to write {}", target.display()))?;
    print_bake_report(&report);
    println!("   ✓ Wrote {}", target.display());
    Ok(())
}

fn cmd_link_then_bake(
    config: &PosterConfig,
    asset: PathBuf,
    out: PathBuf,
    library: Option<PathBuf>,
    materials: Vec<String>,
    no_pack: bool,
    used_only: bool,
) -> Result<()> {
    if out == asset {
        anyhow::bail!("--out must differ from the development asset {}", asset.display());
    }
    let options = sync_options(config, materials, no_pack, used_only);
    let (library_path, lib) = load_library(&library.unwrap_or_else(|| config.paths.library.clone()))?;
    let dev = load_asset(&asset)?;

    println!("🔗 Compiling {} → {}", asset.display(), out.display());
    let (compiled, link_report, bake_report) =
        link_then_bake(&dev, &lib, &library_path, &asset_dir(&asset), &options)
            .with_context(|| format!("failed to compile {}", asset.display()))?;

    save_document(&compiled, &out).with_context(|| format!("failed to write {}", out.display()))?;
    println!(
        "   ✓ Linked {}, refreshed {}, skipped {} local",
        link_report.linked.len(),
        link_report.refreshed.len(),
        link_report.skipped_local.len()
    );
    print_bake_report(&bake_report);
    println!("   ✓ Wrote {}", out.display());
    Ok(())
}

fn cmd_compose_scene(
    config: &PosterConfig,
    manifest: Option<PathBuf>,
    out: Option<PathBuf>,
    ppi: Option<u32>,
) -> Result<()> {
    let start = Instant::now();
    let Some(manifest_path) = manifest.or_else(|| config.paths.manifest.clone()) else {
        anyhow::bail!("no manifest given and [paths] manifest is not set");
    };
    let manifest = match ManifestDocument::load(&manifest_path) {
        Ok(m) => m,
        Err(errors) => return fail_with(errors, &format!("invalid manifest {}", manifest_path.display())),
    };
    let out = out
        .or_else(|| config.paths.scene_output.clone())
        .unwrap_or_else(|| asset_dir(&manifest_path).join("poster_scene.json"));
    let ppi = ppi.or(config.render.ppi);

    let mut scene: SceneDocument = if out.is_file() {
        load_document(&out).with_context(|| format!("failed to load scene {}", out.display()))?
    } else {
        SceneDocument::new()
    };
    let before = out.is_file().then(|| fingerprint(&scene)).transpose()?;

    println!("🧩 Composing {} from {}", out.display(), manifest_path.display());
    let report = match SceneBuilder::new(&manifest).with_ppi(ppi).build(&mut scene) {
        Ok(report) => report,
        Err(errors) => return fail_with(errors, "manifest validation failed"),
    };

    for resolution in &report.resolutions {
        let marker = if resolution.is_fallback() { "!" } else { "✓" };
        println!(
            "   {} {} '{}' → '{}' ({})",
            marker,
            resolution.path.display(),
            resolution.requested,
            resolution.group,
            resolution.step
        );
    }
    if !report.is_success() {
        for failure in &report.failures {
            eprintln!("   ✗ {}: {}", failure.entry, failure.error);
        }
        anyhow::bail!(
            "{} of {} entries failed; {} was not written",
            report.failures.len(),
            report.failures.len() + report.built.len(),
            out.display()
        );
    }

    if before == Some(fingerprint(&scene)?) {
        println!("   ✓ {} unchanged", out.display());
    } else {
        save_document(&scene, &out).with_context(|| format!("failed to write {}", out.display()))?;
    }
    println!(
        "   ✓ Built {}, removed {}, skipped {} ({} fallback resolution(s))",
        report.built.len(),
        report.removed.len(),
        report.skipped.len(),
        report.fallback_count()
    );
    println!(
        "   ✓ {}x{} px at {} ppi",
        scene.poster.resolution_px, scene.poster.resolution_px, scene.poster.ppi
    );
    println!("   ✓ Wrote {} in {:.2?}", out.display(), start.elapsed());
    Ok(())
}

fn cmd_render(
    config: &PosterConfig,
    scene: Option<PathBuf>,
    output: Option<PathBuf>,
    ppi: Option<u32>,
    dry_run: bool,
) -> Result<()> {
    let Some(scene_path) = scene.or_else(|| config.paths.scene_output.clone()) else {
        anyhow::bail!("no scene given and [paths] scene_output is not set");
    };
    let doc: SceneDocument =
        load_document(&scene_path).with_context(|| format!("failed to load scene {}", scene_path.display()))?;

    let resolution = match ppi.or(config.render.ppi) {
        Some(ppi) => ((doc.poster.size_mm / MM_PER_INCH) * ppi as f64).round() as u32,
        None => doc.poster.resolution_px,
    };
    if resolution == 0 {
        anyhow::bail!("scene {} has no output resolution; compose it first", scene_path.display());
    }
    let output = output
        .or_else(|| config.render.output.clone())
        .unwrap_or_else(|| asset_dir(&scene_path).join("poster.png"));

    let job = RenderJob::new(&config.render, &scene_path, &output, resolution);
    if dry_run {
        println!("{}", job.command_line());
        return Ok(());
    }

    let start = Instant::now();
    println!("🎨 Rendering {} at {}x{} px", scene_path.display(), job.resolution, job.resolution);
    job.run()?;
    println!("   ✓ Wrote {} in {:.2?}", output.display(), start.elapsed());
    Ok(())
}

fn cmd_stage_frames(manifest_path: PathBuf, selection: LayoutSelection, out: Option<PathBuf>) -> Result<()> {
    let manifest = FramesManifest::load(&manifest_path)
        .with_context(|| format!("failed to load frames manifest {}", manifest_path.display()))?;
    let source = resolve_manifest_path(Some(&manifest_path), &manifest.source_asset.path);
    let mut doc = load_asset(&source)?;

    println!("🎞  Generating stage frames in {}", source.display());
    let reports = generate_layouts(&mut doc, &manifest, selection)?;
    for report in &reports {
        println!(
            "   ✓ {}: {} frame(s), z span {:.1} mm",
            report.group, report.frames, report.z_total
        );
    }

    let target = out.unwrap_or(source);
    save_document(&doc, &target).with_context(|| format!("failed to write {}", target.display()))?;
    println!("   ✓ Wrote {}", target.display());
    Ok(())
}

fn cmd_check_asset(path: PathBuf) -> Result<()> {
    let doc = load_asset(&path)?;
    println!("🔍 Checking {}", path.display());

    for group in doc.top_level_groups() {
        print_group(&doc, &group.name, 1);
    }
    for material in &doc.materials {
        let state = if material.is_linked() { "linked" } else { "local" };
        println!("   material {} ({})", material.name, state);
    }
    for media in &doc.media {
        let state = if media.is_external() { "external" } else { "packed" };
        println!("   media {} ({}, {})", media.name, state, media.path);
    }

    let mut errors = match validate_taxonomy(&doc) {
        Ok(()) => Vec::new(),
        Err(errors) => errors,
    };
    if let Err(packed) = verify_packed(&doc) {
        errors.extend(packed);
    }
    if !errors.is_empty() {
        return fail_with(errors, &format!("{} failed the check", path.display()));
    }
    println!("   ✓ Taxonomy OK");
    println!("   ✓ {} linked material(s), {} external media", doc.linked_material_count(), doc.external_media_count());
    Ok(())
}

fn print_group(doc: &AssetDocument, name: &str, depth: usize) {
    let Some(group) = doc.group(name) else {
        return;
    };
    let indent = "  ".repeat(depth);
    println!("{}{} [{:?}] {} entities", indent, group.name, group.role(), group.entities.len());
    if group.role() == GroupRole::Rig && group.entities.len() == 3 {
        match stage_rig_chain(doc, &group.name) {
            Ok([root, yaw, pitch]) => println!("{}  rig: {} → {} → {}", indent, root, yaw, pitch),
            Err(e) => println!("{}  rig: {}", indent, e),
        }
    }
    for child in &group.children {
        print_group(doc, child, depth + 1);
    }
}
