//! SurveyCAD 命令行入口
//!
//! 退出码：0 校验通过，1 校验失败，2 处理错误（I/O、畸形几何、坐标系错误等）。

mod config;

use std::path::{Path, PathBuf};
use std::process::ExitCode;

use anyhow::{bail, Context, Result};
use clap::{Parser, Subcommand};
use tracing::{info, warn};
use tracing_subscriber::{fmt, EnvFilter};

use config::{AppConfig, ConfigError};
use surveycad_core::crs::CoordinateSystem;
use surveycad_core::resolver::CoordinateSystemResolver;
use surveycad_file::{
    snapshot, validate_batch, validate_files, ExportOptions, Exporter, ImportMode, ImportRequest,
    Importer, MemoryStore, NoStandards, StandardsLookup, StandardsTable, ValidationOptions,
    ValidationReport,
};

const EXIT_PASS: u8 = 0;
const EXIT_FAIL: u8 = 1;
const EXIT_ERROR: u8 = 2;

#[derive(Parser)]
#[command(name = "surveycad")]
#[command(version, about = "DXF import/export and round-trip coordinate validation for survey drawings")]
struct Cli {
    /// Config file, overrides SURVEYCAD_CONFIG and ./config/default.toml
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Compare an original DXF against its exported counterpart
    Validate {
        original: PathBuf,
        exported: PathBuf,
        /// Positional tolerance in drawing units (feet)
        tolerance: Option<f64>,
        /// Angular tolerance in degrees
        #[arg(long)]
        angular_tolerance: Option<f64>,
        /// Print the report as JSON
        #[arg(long)]
        json: bool,
    },

    /// Import a DXF file into a store snapshot
    Import {
        file: PathBuf,
        #[arg(long)]
        store: Option<PathBuf>,
        #[arg(long)]
        project: Option<String>,
        /// Project coordinate system (LOCAL, WGS84, EPSG:2226, ...)
        #[arg(long)]
        crs: Option<String>,
        /// Coordinate system the file was drawn in, defaults to the project's
        #[arg(long)]
        source_crs: Option<String>,
        /// Supersede the project's current entities
        #[arg(long)]
        replace: bool,
    },

    /// Export a project from a store snapshot to DXF
    Export {
        #[arg(long)]
        store: Option<PathBuf>,
        #[arg(long)]
        project: Option<String>,
        #[arg(long)]
        out: PathBuf,
        #[arg(long)]
        standards: Option<PathBuf>,
        #[arg(long)]
        crs: Option<String>,
        /// Reproject to this coordinate system on export
        #[arg(long)]
        target_crs: Option<String>,
    },

    /// Import, export and validate a file in one pass
    Roundtrip {
        file: PathBuf,
        #[arg(long)]
        standards: Option<PathBuf>,
        /// Keep the exported DXF at this path
        #[arg(long)]
        out: Option<PathBuf>,
        #[arg(long)]
        tolerance: Option<f64>,
        #[arg(long)]
        json: bool,
    },

    /// Validate every `original exported` pair listed in a manifest, in parallel
    ValidateBatch {
        manifest: PathBuf,
        #[arg(long)]
        tolerance: Option<f64>,
        #[arg(long)]
        json: bool,
    },
}

fn main() -> ExitCode {
    let cli = Cli::parse();
    let (config, config_error) = match load_configuration(cli.config.as_deref()) {
        Ok(config) => (config, None),
        Err(err) => (AppConfig::default(), Some(err)),
    };
    init_logging(&config);
    // 日志级别来自配置，加载失败只能在初始化之后报告
    if let Some(err) = config_error {
        warn!(error = %err, "Failed to load config, using defaults");
    }

    match run(cli.command, &config) {
        Ok(code) => ExitCode::from(code),
        Err(err) => {
            eprintln!("error: {err:#}");
            ExitCode::from(EXIT_ERROR)
        }
    }
}

fn load_configuration(override_path: Option<&Path>) -> Result<AppConfig, ConfigError> {
    match override_path {
        Some(path) => AppConfig::from_file(path),
        None => AppConfig::discover(),
    }
}

fn init_logging(config: &AppConfig) {
    let filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(&config.logging.level))
        .unwrap_or_else(|_| EnvFilter::new("info"));
    let _ = fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .try_init();
}

fn run(command: Command, config: &AppConfig) -> Result<u8> {
    match command {
        Command::Validate {
            original,
            exported,
            tolerance,
            angular_tolerance,
            json,
        } => {
            let mut options = validation_options(config, tolerance);
            if let Some(angular) = angular_tolerance {
                options.angular_tolerance = angular;
            }
            let report = validate_files(&original, &exported, &options)?;
            print_report(&report, json)?;
            Ok(exit_code(&report))
        }

        Command::Import {
            file,
            store,
            project,
            crs,
            source_crs,
            replace,
        } => {
            let store_path = store_path(config, store)?;
            let project_id = project_id(config, project)?;
            let mut request = ImportRequest::new(project_id, project_crs(config, crs.as_deref())?)
                .with_mode(if replace {
                    ImportMode::Replace
                } else {
                    ImportMode::Append
                });
            if let Some(source) = source_crs {
                request = request.with_source_crs(parse_crs(&source)?);
            }

            let mut store = snapshot::load_or_default(&store_path)
                .with_context(|| format!("failed to open store {}", store_path.display()))?;
            let resolver = CoordinateSystemResolver::new();
            let statistics = Importer::new(&resolver)
                .import_file(&file, &request, &mut store)
                .with_context(|| format!("failed to import {}", file.display()))?;
            snapshot::save(&store, &store_path)
                .with_context(|| format!("failed to save store {}", store_path.display()))?;

            println!("{}", serde_json::to_string_pretty(&statistics)?);
            Ok(EXIT_PASS)
        }

        Command::Export {
            store,
            project,
            out,
            standards,
            crs,
            target_crs,
        } => {
            let store_path = store_path(config, store)?;
            let project_id = project_id(config, project)?;
            let store = snapshot::load(&store_path)
                .with_context(|| format!("failed to open store {}", store_path.display()))?;
            let standards = load_standards(config, standards)?;
            let options = ExportOptions {
                project_crs: project_crs(config, crs.as_deref())?,
                target_crs: target_crs.as_deref().map(parse_crs).transpose()?,
            };

            let resolver = CoordinateSystemResolver::new();
            let statistics = Exporter::new(standards.as_ref(), &resolver, options)
                .export_file(&store, &project_id, &out)
                .with_context(|| format!("failed to export project '{project_id}'"))?;
            for warning in &statistics.warnings {
                warn!("{warning}");
            }
            println!("{}", serde_json::to_string_pretty(&statistics)?);
            Ok(EXIT_PASS)
        }

        Command::Roundtrip {
            file,
            standards,
            out,
            tolerance,
            json,
        } => {
            let standards = load_standards(config, standards)?;
            let options = validation_options(config, tolerance);
            let report = roundtrip(&file, standards.as_ref(), out.as_deref(), &options)?;
            print_report(&report, json)?;
            Ok(exit_code(&report))
        }

        Command::ValidateBatch {
            manifest,
            tolerance,
            json,
        } => {
            let pairs = read_manifest(&manifest)?;
            let options = validation_options(config, tolerance);
            info!("Validating {} file pairs", pairs.len());

            let mut code = EXIT_PASS;
            for ((original, _), result) in pairs.iter().zip(validate_batch(&pairs, &options)) {
                match result {
                    Ok(report) => {
                        print_report(&report, json)?;
                        println!();
                        code = code.max(exit_code(&report));
                    }
                    Err(err) => {
                        eprintln!("error: {}: {err}", original.display());
                        code = EXIT_ERROR;
                    }
                }
            }
            Ok(code)
        }
    }
}

/// 导入到临时内存存储，导出到文件，再对两个文件做独立校验
fn roundtrip(
    file: &Path,
    standards: &dyn StandardsLookup,
    out: Option<&Path>,
    options: &ValidationOptions,
) -> Result<ValidationReport> {
    const PROJECT: &str = "roundtrip";

    let resolver = CoordinateSystemResolver::new();
    let mut store = MemoryStore::new();
    let request = ImportRequest::new(PROJECT, CoordinateSystem::Local);
    let statistics = Importer::new(&resolver)
        .import_file(file, &request, &mut store)
        .with_context(|| format!("failed to import {}", file.display()))?;
    info!(
        imported = statistics.entities_imported,
        skipped = statistics.entities_skipped,
        "Round-trip import complete"
    );

    let temp;
    let exported_path = match out {
        Some(path) => path,
        None => {
            temp = tempfile::Builder::new()
                .prefix("surveycad-roundtrip-")
                .suffix(".dxf")
                .tempfile()
                .context("failed to create temporary DXF")?;
            temp.path()
        }
    };

    let exporter = Exporter::new(standards, &resolver, ExportOptions::default());
    let export_stats = exporter
        .export_file(&store, PROJECT, exported_path)
        .context("failed to export round-trip DXF")?;
    for warning in &export_stats.warnings {
        warn!("{warning}");
    }

    Ok(validate_files(file, exported_path, options)?)
}

fn validation_options(config: &AppConfig, tolerance: Option<f64>) -> ValidationOptions {
    match tolerance {
        Some(t) => config.validation.with_tolerance(t),
        None => config.validation,
    }
}

fn exit_code(report: &ValidationReport) -> u8 {
    if report.passed {
        EXIT_PASS
    } else {
        EXIT_FAIL
    }
}

fn print_report(report: &ValidationReport, json: bool) -> Result<()> {
    if json {
        println!("{}", report.to_json()?);
    } else {
        println!("{report}");
    }
    Ok(())
}

fn parse_crs(text: &str) -> Result<CoordinateSystem> {
    text.parse::<CoordinateSystem>()
        .with_context(|| format!("invalid coordinate system '{text}'"))
}

fn project_crs(config: &AppConfig, flag: Option<&str>) -> Result<CoordinateSystem> {
    parse_crs(flag.unwrap_or(&config.project.crs))
}

fn project_id(config: &AppConfig, flag: Option<String>) -> Result<String> {
    match flag.or_else(|| config.project.id.clone()) {
        Some(id) => Ok(id),
        None => bail!("no project id given (use --project or [project].id)"),
    }
}

fn store_path(config: &AppConfig, flag: Option<PathBuf>) -> Result<PathBuf> {
    match flag.or_else(|| config.project.store.clone()) {
        Some(path) => Ok(path),
        None => bail!("no store snapshot given (use --store or [project].store)"),
    }
}

fn load_standards(config: &AppConfig, flag: Option<PathBuf>) -> Result<Box<dyn StandardsLookup>> {
    match flag.or_else(|| config.standards.path.clone()) {
        Some(path) => {
            let table = StandardsTable::load(&path)
                .with_context(|| format!("failed to load standards {}", path.display()))?;
            Ok(Box::new(table))
        }
        None => Ok(Box::new(NoStandards)),
    }
}

/// 清单每行一对 `original exported`，空行和 `#` 开头的行忽略
fn read_manifest(path: &Path) -> Result<Vec<(PathBuf, PathBuf)>> {
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("failed to read manifest {}", path.display()))?;
    parse_manifest(&content)
}

fn parse_manifest(content: &str) -> Result<Vec<(PathBuf, PathBuf)>> {
    let mut pairs = Vec::new();
    for (number, line) in content.lines().enumerate() {
        let line = line.trim();
        if line.is_empty() || line.starts_with('#') {
            continue;
        }
        let fields: Vec<&str> = line.split_whitespace().collect();
        match fields.as_slice() {
            [original, exported] => pairs.push((PathBuf::from(original), PathBuf::from(exported))),
            _ => bail!("manifest line {}: expected `original exported`", number + 1),
        }
    }
    Ok(pairs)
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn test_cli_definition() {
        Cli::command().debug_assert();
    }

    #[test]
    fn test_validate_positional_tolerance() {
        let cli = Cli::parse_from(["surveycad", "validate", "a.dxf", "b.dxf", "0.01", "--json"]);
        match cli.command {
            Command::Validate {
                tolerance, json, ..
            } => {
                assert_eq!(tolerance, Some(0.01));
                assert!(json);
            }
            _ => panic!("expected validate"),
        }
    }

    #[test]
    fn test_parse_manifest() {
        let pairs = parse_manifest("# survey set\na.dxf a_out.dxf\n\n  b.dxf   b_out.dxf \n").unwrap();
        assert_eq!(
            pairs,
            vec![
                (PathBuf::from("a.dxf"), PathBuf::from("a_out.dxf")),
                (PathBuf::from("b.dxf"), PathBuf::from("b_out.dxf")),
            ]
        );
        assert!(parse_manifest("only-one.dxf\n").is_err());
    }

    #[test]
    fn test_tolerance_flag_overrides_config() {
        let config = AppConfig::default();
        let options = validation_options(&config, Some(0.02));
        assert_eq!(options.tolerance, 0.02);
        assert_eq!(options.height_tolerance, 0.02);
        assert_eq!(validation_options(&config, None), ValidationOptions::default());
    }

    #[test]
    fn test_roundtrip_of_simple_drawing_passes() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("simple.dxf");
        let mut drawing = dxf::Drawing::new();
        drawing.add_entity(dxf::entities::Entity::new(dxf::entities::EntityType::Line(
            dxf::entities::Line::new(
                dxf::Point::new(0.0, 0.0, 10.0),
                dxf::Point::new(100.0, 0.0, 10.0),
            ),
        )));
        drawing.save_file(&path).unwrap();

        let report = roundtrip(&path, &NoStandards, None, &ValidationOptions::default()).unwrap();
        assert!(report.passed, "{report}");
        assert_eq!(report.matched, 1);
    }
}
