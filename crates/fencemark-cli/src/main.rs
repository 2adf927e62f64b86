use anyhow::{Context, Result, bail};
use clap::{Parser, ValueEnum};
use fencemark_config::Config;
use fencemark_engine::{
    Engine, ExecutionMode, ParseStrategy, Source, extract_toc, render_document,
};
use std::{
    fs,
    io::{self, Write},
    path::{Path, PathBuf},
    sync::Arc,
};

#[derive(Parser, Debug)]
#[command(name = "fencemark")]
#[command(about = "Convert fence-marker documents to HTML")]
struct Args {
    /// Document to convert
    input: PathBuf,

    /// Output file (defaults to stdout, or the configured output directory)
    #[arg(short, long)]
    output: Option<PathBuf>,

    /// Execution mode; `auto` picks one from the document size
    #[arg(long, value_enum, default_value_t = ModeArg::Auto)]
    mode: ModeArg,

    /// Stop at the first marker or structure problem
    #[arg(long)]
    strict: bool,

    /// Write the table of contents as JSON instead of HTML
    #[arg(long)]
    toc: bool,

    /// Config file (defaults to ~/.config/fencemark/config.toml)
    #[arg(long)]
    config: Option<PathBuf>,

    /// Worker threads for parallel mode (0 = all cores)
    #[arg(long)]
    workers: Option<usize>,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, ValueEnum)]
enum ModeArg {
    Auto,
    Whole,
    Sequential,
    Parallel,
}

impl ModeArg {
    fn execution_mode(self) -> Option<ExecutionMode> {
        match self {
            ModeArg::Auto => None,
            ModeArg::Whole => Some(ExecutionMode::Whole),
            ModeArg::Sequential => Some(ExecutionMode::Sequential),
            ModeArg::Parallel => Some(ExecutionMode::Parallel),
        }
    }
}

fn load_config(args: &Args) -> Result<Config> {
    match &args.config {
        Some(path) => Config::load_from_path(path)?
            .with_context(|| format!("config file {} not found", path.display())),
        None => {
            log::debug!("Config path: {}", Config::config_path().display());
            Ok(Config::load()?)
        }
    }
}

/// Where output goes: `-o`, else `<output_dir>/<stem>.<ext>`, else stdout.
fn output_path(args: &Args, config: &Config) -> Option<PathBuf> {
    if let Some(path) = &args.output {
        return Some(path.clone());
    }
    let dir = config.output_dir.as_ref()?;
    let stem = args.input.file_stem()?;
    let ext = if args.toc { "json" } else { "html" };
    Some(dir.join(stem).with_extension(ext))
}

fn engine_for(args: &Args, config: &Config) -> Engine {
    let mut options = config.engine.clone();
    if args.strict {
        options.strategy = ParseStrategy::Strict;
    }
    if let Some(workers) = args.workers {
        options.workers = workers;
    }
    Engine::new(options).with_registry(Arc::new(config.keyword_registry()))
}

fn convert(args: &Args, config: &Config) -> Result<String> {
    let engine = engine_for(args, config);
    let source = Source::file(args.input.clone());
    let stream = match args.mode.execution_mode() {
        Some(mode) => engine.stream_as(source, mode),
        None => engine.stream(source),
    }
    .with_context(|| format!("cannot open {}", args.input.display()))?
    .with_progress(|p| {
        log::debug!(
            "{}/{} lines ({:.0}%), {:.0} lines/s",
            p.current_line,
            p.total_lines,
            p.percent,
            p.lines_per_second
        )
    });

    let document = stream.collect_document()?;
    for diagnostic in &document.diagnostics {
        match &diagnostic.suggestion {
            Some(hint) => log::warn!("line {}: {} ({hint})", diagnostic.line, diagnostic.message),
            None => log::warn!("line {}: {}", diagnostic.line, diagnostic.message),
        }
    }
    let summary = &document.summary;
    log::info!(
        "{} lines in {} mode: {} units, {} failed, {} hard splits",
        summary.total_lines,
        summary.mode,
        summary.units,
        summary.failed_chunks,
        summary.hard_splits
    );

    if args.toc {
        Ok(serde_json::to_string_pretty(&extract_toc(&document.nodes))?)
    } else {
        Ok(render_document(&document.nodes))
    }
}

fn write_output(path: Option<&Path>, content: &str) -> Result<()> {
    match path {
        Some(path) => {
            if let Some(parent) = path.parent() {
                fs::create_dir_all(parent)?;
            }
            fs::write(path, content)
                .with_context(|| format!("cannot write {}", path.display()))?;
            log::info!("Wrote {}", path.display());
        }
        None => {
            let mut stdout = io::stdout().lock();
            stdout.write_all(content.as_bytes())?;
            stdout.write_all(b"\n")?;
        }
    }
    Ok(())
}

fn main() -> Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let args = Args::parse();
    if !args.input.is_file() {
        bail!("{} is not a file", args.input.display());
    }

    let config = load_config(&args)?;
    let content = convert(&args, &config)?;
    write_output(output_path(&args, &config).as_deref(), &content)
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use tempfile::TempDir;

    fn args(extra: &[&str]) -> Args {
        let mut argv = vec!["fencemark", "doc.fm"];
        argv.extend_from_slice(extra);
        Args::try_parse_from(argv).unwrap()
    }

    #[test]
    fn defaults() {
        let args = args(&[]);
        assert_eq!(args.mode, ModeArg::Auto);
        assert!(!args.strict && !args.toc);
        assert_eq!(args.mode.execution_mode(), None);
    }

    #[test]
    fn parses_flags() {
        let args = args(&["--mode", "parallel", "--strict", "--toc", "--workers", "3", "-o", "out.json"]);
        assert_eq!(args.mode.execution_mode(), Some(ExecutionMode::Parallel));
        assert!(args.strict && args.toc);
        assert_eq!(args.workers, Some(3));
        assert_eq!(args.output, Some(PathBuf::from("out.json")));
    }

    #[test]
    fn rejects_unknown_mode() {
        assert!(Args::try_parse_from(["fencemark", "doc.fm", "--mode", "fast"]).is_err());
    }

    #[test]
    fn output_path_precedence() {
        let mut config = Config::default();
        assert_eq!(output_path(&args(&[]), &config), None);

        config.output_dir = Some(PathBuf::from("/out"));
        assert_eq!(
            output_path(&args(&[]), &config),
            Some(PathBuf::from("/out/doc.html"))
        );
        assert_eq!(
            output_path(&args(&["--toc"]), &config),
            Some(PathBuf::from("/out/doc.json"))
        );
        assert_eq!(
            output_path(&args(&["-o", "x.html"]), &config),
            Some(PathBuf::from("x.html"))
        );
    }

    #[test]
    fn converts_file_to_html_and_toc() {
        let dir = TempDir::new().unwrap();
        let input = dir.path().join("doc.fm");
        fs::write(&input, ";;;目次;;;\n\n;;;見出し1;;; Hello ;;;\n\n;;;太字\n内容\n;;;\n").unwrap();
        let input = input.to_string_lossy().to_string();

        let html_args = Args::try_parse_from(["fencemark", input.as_str()]).unwrap();
        let html = convert(&html_args, &Config::default()).unwrap();
        assert!(html.contains(r#"<h1 id="heading-1">Hello</h1>"#));
        assert!(html.contains("<strong>内容</strong>"));

        let toc_args = Args::try_parse_from(["fencemark", input.as_str(), "--toc"]).unwrap();
        let toc: serde_json::Value =
            serde_json::from_str(&convert(&toc_args, &Config::default()).unwrap()).unwrap();
        assert_eq!(toc["heading_count"], 1);
        assert_eq!(toc["entries"][0]["title"], "Hello");
    }

    #[test]
    fn strict_mode_fails_on_unknown_keyword() {
        let dir = TempDir::new().unwrap();
        let input = dir.path().join("bad.fm");
        fs::write(&input, ";;;太時\nx\n;;;\n").unwrap();
        let input = input.to_string_lossy().to_string();

        let args = Args::try_parse_from(["fencemark", input.as_str(), "--strict"]).unwrap();
        assert!(convert(&args, &Config::default()).is_err());

        let graceful = Args::try_parse_from(["fencemark", input.as_str()]).unwrap();
        let html = convert(&graceful, &Config::default()).unwrap();
        assert!(html.contains(r#"class="marker-error""#));
    }

    #[test]
    fn config_aliases_apply() {
        let dir = TempDir::new().unwrap();
        let input = dir.path().join("alias.fm");
        fs::write(&input, ";;;bold\nx\n;;;\n").unwrap();
        let input = input.to_string_lossy().to_string();

        let mut config = Config::default();
        config.keywords.aliases.insert("bold".into(), "太字".into());
        let args = Args::try_parse_from(["fencemark", input.as_str()]).unwrap();
        assert_eq!(convert(&args, &config).unwrap(), "<strong>x</strong>");
    }
}
