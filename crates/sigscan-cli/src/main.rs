use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use sigscan_core::{check, load_config, scan_parallel, Availability, ScanConfig, YaraCompiler};
use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};
use std::process::ExitCode;
use tracing::{error, info};
use walkdir::WalkDir;

/// 扫描被中止（规则目录不可读或坏规则无法剔除）
const EXIT_NO_RESULT: u8 = 2;
/// 扫描器被禁用或缺少后端
const EXIT_UNAVAILABLE: u8 = 3;

/// 命令行入口（基于 clap）
#[derive(Parser, Debug)]
#[command(name = "sigscan", version, about = "YARA 签名扫描")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// 扫描目标文件/目录并输出 JSON 结果
    Scan {
        /// 配置文件（TOML，可含 [Yara] 表）
        #[arg(long)]
        config: Option<PathBuf>,

        /// 规则目录（覆盖配置）
        #[arg(long)]
        rules: Option<PathBuf>,

        /// 额外的忽略标签，可重复
        #[arg(long = "ignore-tag")]
        ignore_tags: Vec<String>,

        /// 允许规则 include 其他文件
        #[arg(long)]
        includes: bool,

        /// 线程数（"auto"=CPU 核心数）
        #[arg(long, default_value = "auto")]
        threads: String,

        /// 输出文件；缺省写到标准输出
        #[arg(long)]
        output: Option<PathBuf>,

        /// 目标文件或目录（目录递归展开）
        #[arg(required = true)]
        targets: Vec<PathBuf>,
    },
    /// 检查扫描器是否可用
    Check {
        #[arg(long)]
        config: Option<PathBuf>,
    },
}

fn main() -> Result<ExitCode> {
    // 初始化日志（支持通过 RUST_LOG 控制等级，例如 info、debug）
    init_tracing();
    let cli = Cli::parse();

    match cli.command {
        Commands::Check { config } => {
            let cfg = resolve_config(config.as_deref())?;
            let availability = check(&cfg);
            println!("{availability:?}");
            Ok(exit_for(availability))
        }
        Commands::Scan { config, rules, ignore_tags, includes, threads, output, targets } => {
            let mut cfg = resolve_config(config.as_deref())?;
            if let Some(dir) = rules {
                cfg.ruledir = dir;
            }
            cfg.ignore_tags.extend(ignore_tags);
            cfg.includes |= includes;

            let availability = check(&cfg);
            if !availability.is_ready() {
                error!(?availability, "scanner unavailable");
                return Ok(exit_for(availability));
            }

            let files = expand_targets(&targets);
            info!(ruledir = ?cfg.ruledir, files = files.len(), "starting scan");

            let (result, stats) = match scan_parallel(&cfg, &files, &YaraCompiler, parse_threads(&threads)) {
                Ok(done) => done,
                Err(abort) => {
                    error!(error = %abort, "scan produced no result");
                    return Ok(ExitCode::from(EXIT_NO_RESULT));
                }
            };

            let mut out: Box<dyn Write> = match &output {
                Some(path) => Box::new(BufWriter::new(File::create(path).context("create output file")?)),
                None => Box::new(BufWriter::new(std::io::stdout().lock())),
            };
            serde_json::to_writer_pretty(&mut out, &result).context("write result")?;
            writeln!(out)?;
            out.flush()?;

            info!(
                files_scanned = stats.files_total,
                files_matched = stats.files_matched,
                files_skipped = stats.files_skipped,
                hits = stats.hits_total,
                hits_ignored = stats.hits_ignored,
                rules = stats.rules_loaded,
                rules_rejected = stats.rules_rejected,
                "scan finished"
            );
            Ok(ExitCode::SUCCESS)
        }
    }
}

fn init_tracing() {
    use tracing_subscriber::{EnvFilter, FmtSubscriber};
    let env_filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    // 日志写到 stderr，避免与 stdout 上的 JSON 混在一起
    let subscriber = FmtSubscriber::builder()
        .with_env_filter(env_filter)
        .with_writer(std::io::stderr)
        .finish();
    let _ = tracing::subscriber::set_global_default(subscriber);
}

fn resolve_config(path: Option<&Path>) -> Result<ScanConfig> {
    match path {
        Some(p) => load_config(p),
        None => Ok(ScanConfig::default()),
    }
}

fn exit_for(availability: Availability) -> ExitCode {
    if availability.is_ready() {
        ExitCode::SUCCESS
    } else {
        ExitCode::from(EXIT_UNAVAILABLE)
    }
}

/// 展开目标：文件原样保留，目录递归列出其中的文件（按路径排序）
fn expand_targets(targets: &[PathBuf]) -> Vec<PathBuf> {
    let mut files = Vec::new();
    for target in targets {
        if !target.is_dir() {
            // 不存在的文件也交给扫描流程，由重试与跳过逻辑处理
            files.push(target.clone());
            continue;
        }
        let mut found: Vec<PathBuf> = WalkDir::new(target)
            .min_depth(1)
            .into_iter()
            .filter_map(|e| e.ok())
            .filter(|e| e.file_type().is_file())
            .map(|e| e.into_path())
            .collect();
        found.sort();
        files.extend(found);
    }
    files
}

/// 解析线程参数
fn parse_threads(s: &str) -> Option<usize> {
    if s.eq_ignore_ascii_case("auto") { return None; }
    match s.parse::<usize>() {
        Ok(n) if n >= 1 => Some(n),
        _ => None,
    }
}
