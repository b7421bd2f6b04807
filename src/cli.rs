use std::path::{Path, PathBuf};
use std::time::Instant;

use anyhow::{bail, Context};
use clap::Parser;

use snapedit::codec::OutputFormat;
use snapedit::config::load_editor_config;
use snapedit::recipe::{load_recipe, Recipe};
use snapedit::session::{spawn_decode, UploadStatus};
use snapedit::EditorSession;

const DEFAULT_QUALITY: u8 = 90;

/// Apply a JSON edit recipe to an image and export the result.
#[derive(Parser, Debug)]
#[command(name = "snapedit", version, about)]
pub struct CliArgs {
    /// Image to edit (PNG, JPEG, WebP, ...).
    pub input: PathBuf,

    /// Where to write the exported image.
    pub output: PathBuf,

    /// Recipe with transform, crop, resize, overlays and adjustments.
    #[arg(short, long, value_name = "RECIPE.json")]
    pub recipe: Option<PathBuf>,

    /// Output format: png, jpeg or webp. Inferred from the output extension when omitted.
    #[arg(short, long, value_name = "FORMAT")]
    pub format: Option<String>,

    /// JPEG quality (1-100).
    #[arg(short, long, default_value_t = DEFAULT_QUALITY, value_name = "1-100")]
    pub quality: u8,
}

pub fn run(args: CliArgs) -> anyhow::Result<()> {
    let started = Instant::now();
    let format = resolve_format(args.format.as_deref(), &args.output, args.quality)?;

    let recipe = match &args.recipe {
        Some(path) => load_recipe(path)?,
        None => Recipe::default(),
    };
    let bytes = std::fs::read(&args.input)
        .with_context(|| format!("failed to read {}", args.input.display()))?;

    let mut session = EditorSession::new(load_editor_config());
    let declared_size = bytes.len() as u64;
    let pending = spawn_decode(session.begin_upload(bytes, declared_size));
    let outcome = pending.recv().context("decode worker exited without a result")?;
    let status = session
        .finish_upload(outcome)
        .with_context(|| format!("failed to load {}", args.input.display()))?;
    if status == UploadStatus::Stale {
        bail!("decode of {} was superseded", args.input.display());
    }
    recipe.apply(&mut session).context("failed to apply recipe")?;

    let encoded = session.render_final(format)?;
    std::fs::write(&args.output, &encoded)
        .with_context(|| format!("failed to write {}", args.output.display()))?;

    tracing::info!(
        output = %args.output.display(),
        format = format.label(),
        bytes = encoded.len(),
        elapsed_ms = started.elapsed().as_millis() as u64,
        "wrote output"
    );
    Ok(())
}

fn resolve_format(explicit: Option<&str>, output: &Path, quality: u8) -> anyhow::Result<OutputFormat> {
    if let Some(name) = explicit {
        return match OutputFormat::from_extension(name, quality) {
            Some(format) => Ok(format),
            None => bail!("unsupported output format {name:?}; expected png, jpeg or webp"),
        };
    }
    let extension = output
        .extension()
        .and_then(|extension| extension.to_str())
        .unwrap_or("png");
    OutputFormat::from_extension(extension, quality)
        .with_context(|| format!("cannot infer an output format from {}", output.display()))
}
