//! Subcommand implementations.

use std::path::{Path, PathBuf};

use anyhow::{bail, Context, Result};
use tracing::{debug, info};

use uniconv_core::{
    catalog::extension_of,
    converter::{EncoderCapabilities, MediaTranscoder},
    dispatcher::{format_bytes, suggested_file_name},
    AcceptMatcher, CatalogEntry, Config, ConversionCategory, ConversionSession, DiskFile,
    FfmpegEngine, FormatCatalog, SourceFile,
};

/// Arguments of the `convert` subcommand.
#[derive(Debug)]
pub struct ConvertRequest {
    pub input: PathBuf,
    pub target: String,
    pub category: Option<String>,
    pub out: Option<PathBuf>,
    pub json: bool,
}

pub fn categories(catalog: &FormatCatalog, json: bool) -> Result<()> {
    if json {
        let rendered = serde_json::to_string_pretty(catalog.list_categories())
            .context("Failed to serialize catalog")?;
        println!("{}", rendered);
        return Ok(());
    }

    for entry in catalog.list_categories() {
        println!("{} {} ({})", entry.icon, entry.name, entry.category);
        if !entry.description.is_empty() {
            println!("   {}", entry.description);
        }
        println!("   formats: {}", entry.formats.join(", "));
    }
    Ok(())
}

pub fn formats(catalog: &FormatCatalog, input: &Path, category: Option<&str>) -> Result<()> {
    let name = file_name(input);
    let entry = resolve_entry(catalog, &name, category)
        .with_context(|| format!("No category accepts {:?}; pass --category", name))?;

    let source_ext = extension_of(&name);
    let targets = catalog.available_targets(entry.category, &source_ext);
    println!("{} {} -> {}", entry.icon, entry.name, targets.join(", "));
    Ok(())
}

pub async fn engine(config: Config, json: bool) -> Result<()> {
    let media = MediaTranscoder::new(FfmpegEngine::new(config.engine));
    let loaded = media.load().await;
    let capabilities = media.engine().capabilities().await;
    media.terminate().await;
    loaded.context("Media engine could not be loaded")?;

    if json {
        let rendered = serde_json::to_string_pretty(&capabilities)
            .context("Failed to serialize capabilities")?;
        println!("{}", rendered);
        return Ok(());
    }

    for (encoder, available) in encoder_rows(&capabilities) {
        println!("{:<12} {}", encoder, if available { "yes" } else { "no" });
    }
    if !capabilities.supports_video() {
        println!("video conversions need libx264 and aac");
    }
    Ok(())
}

fn encoder_rows(capabilities: &EncoderCapabilities) -> [(&'static str, bool); 6] {
    [
        ("libx264", capabilities.libx264),
        ("aac", capabilities.aac),
        ("libmp3lame", capabilities.libmp3lame),
        ("libvorbis", capabilities.libvorbis),
        ("libopus", capabilities.libopus),
        ("libwebp", capabilities.libwebp),
    ]
}

pub async fn convert(config: Config, catalog: FormatCatalog, request: ConvertRequest) -> Result<()> {
    let file = DiskFile::open(&request.input)
        .await
        .with_context(|| format!("Failed to open {:?}", request.input))?;
    let target = request.target.trim().to_ascii_lowercase();

    let entry = resolve_entry(&catalog, file.name(), request.category.as_deref())
        .unwrap_or_else(|| generic_entry(&target));
    info!(category = %entry.category, file = file.name(), target = %target, "Converting");

    let session = ConversionSession::new(catalog, FfmpegEngine::new(config.engine));
    let outcome = run_conversion(&session, entry, file, &target, &request).await;
    session.shutdown().await;
    outcome
}

async fn run_conversion(
    session: &ConversionSession<FfmpegEngine>,
    entry: CatalogEntry,
    file: DiskFile,
    target: &str,
    request: &ConvertRequest,
) -> Result<()> {
    let dispatcher = session.dispatcher_for(entry);

    if dispatcher.category().is_media() {
        eprintln!("Loading media engine...");
    }
    dispatcher
        .prepare()
        .await
        .context("Media engine could not be loaded")?;

    dispatcher.select_file(file).await?;
    dispatcher.select_format(target).await?;

    let mut progress = dispatcher.subscribe_progress();
    let printer = tokio::spawn(async move {
        while progress.changed().await.is_ok() {
            let percent = *progress.borrow_and_update();
            eprint!("\rConverting... {:>3}%", percent);
        }
    });

    let converted = dispatcher.convert().await;
    printer.abort();
    eprintln!();

    if request.json {
        let snapshot = dispatcher.snapshot().await;
        let rendered =
            serde_json::to_string_pretty(&snapshot).context("Failed to serialize state")?;
        println!("{}", rendered);
    }
    converted.context("Conversion failed")?;

    let Some(result) = dispatcher.take_result().await else {
        bail!("Conversion finished without a result");
    };

    let out = request
        .out
        .clone()
        .unwrap_or_else(|| PathBuf::from(suggested_file_name(target)));
    tokio::fs::write(&out, &result.data)
        .await
        .with_context(|| format!("Failed to write {:?}", out))?;

    debug!(mime = result.mime_type, duration_ms = result.duration_ms, "Result written");
    eprintln!(
        "Wrote {} ({}, {})",
        out.display(),
        format_bytes(result.data.len() as u64),
        result.mime_type
    );
    Ok(())
}

/// Picks the catalog entry for a file.
///
/// An explicit category wins; otherwise the first entry whose accept list
/// takes the file, then the first entry listing its extension.
fn resolve_entry(
    catalog: &FormatCatalog,
    name: &str,
    category: Option<&str>,
) -> Option<CatalogEntry> {
    if let Some(category) = category {
        let category = category.parse::<ConversionCategory>().ok()?;
        return catalog.find(category).cloned();
    }

    catalog
        .list_categories()
        .iter()
        .find(|entry| accepts(entry, name))
        .or_else(|| {
            catalog
                .category_for_extension(&extension_of(name))
                .and_then(|category| catalog.find(category))
        })
        .cloned()
}

fn accepts(entry: &CatalogEntry, name: &str) -> bool {
    let has_rules = !entry.accept.extensions.is_empty() || !entry.accept.mime_patterns.is_empty();
    has_rules && entry.accept.matches(name, None)
}

/// Passthrough entry for files no category accepts.
fn generic_entry(target: &str) -> CatalogEntry {
    CatalogEntry {
        category: ConversionCategory::Generic,
        name: "Files".to_string(),
        icon: "📄".to_string(),
        description: "Copy the file under a new extension".to_string(),
        formats: vec![target.to_string()],
        accept: AcceptMatcher::default(),
    }
}

fn file_name(path: &Path) -> String {
    path.file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_default()
}
