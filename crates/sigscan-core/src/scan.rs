//! 扫描主流程与结果组装
//!
//! 规则只编译一次；之后按输入顺序逐个处理目标文件。
//! 单文件失败只影响该文件，整批扫描仅在规则阶段可能中止。
use std::path::{Path, PathBuf};
use tracing::{debug, info, warn};

use crate::compiler::{RuleCompiler, RuleEngine};
use crate::engine::{match_file, FileOutcome};
use crate::error::ScanAbort;
use crate::findings::normalize_hits;
use crate::options::{ScanConfig, ScanStats};
use crate::rules::{build_rules, CompiledRules, RuleSet};
use crate::types::{Availability, FileHitMap, ScanMetadata, ScanResult, NAME, TYPE};

/// 扫描器是否可用（禁用或缺少后端时不应调用 scan）
pub fn check(cfg: &ScanConfig) -> Availability {
    if !cfg.enabled {
        return Availability::Disabled;
    }
    if cfg!(feature = "yara") {
        Availability::Ready
    } else {
        Availability::BackendMissing
    }
}

/// 扫描目标文件
/// - `Err(ScanAbort)`：规则目录不可读或出现无法剔除的坏规则（"无结果"）
/// - `Ok` 且 `matches` 为空：正常的零命中
pub fn scan<C, P>(cfg: &ScanConfig, files: &[P], compiler: &C) -> Result<ScanResult, ScanAbort>
where
    C: RuleCompiler + ?Sized,
    P: AsRef<Path>,
{
    scan_with_stats(cfg, files, compiler).map(|(result, _)| result)
}

/// 同 `scan`，附带统计信息
pub fn scan_with_stats<C, P>(
    cfg: &ScanConfig,
    files: &[P],
    compiler: &C,
) -> Result<(ScanResult, ScanStats), ScanAbort>
where
    C: RuleCompiler + ?Sized,
    P: AsRef<Path>,
{
    let compiled = build_rules(cfg, compiler)?;
    let (matches, file_stats) = scan_files(&compiled.engine, files, cfg);
    Ok(finish(compiled, matches, file_stats))
}

/// 并行批量扫描：规则编译一次，目标列表切成互不相交的连续分片，在 Rayon 线程池中处理。
/// 分片结果按原顺序拼接，输出与串行扫描一致。
/// `threads`：None 表示 CPU 核数；Some(1) 走串行。
pub fn scan_parallel<C, P>(
    cfg: &ScanConfig,
    files: &[P],
    compiler: &C,
    threads: Option<usize>,
) -> Result<(ScanResult, ScanStats), ScanAbort>
where
    C: RuleCompiler + ?Sized,
    C::Engine: Sync,
    P: AsRef<Path> + Sync,
{
    use rayon::prelude::*;

    let compiled = build_rules(cfg, compiler)?;
    let threads = threads.unwrap_or_else(num_cpus::get).max(1);
    if threads == 1 || files.len() < 2 {
        let (matches, file_stats) = scan_files(&compiled.engine, files, cfg);
        return Ok(finish(compiled, matches, file_stats));
    }

    let pool = match rayon::ThreadPoolBuilder::new().num_threads(threads).build() {
        Ok(pool) => pool,
        Err(e) => {
            warn!(error = %e, "cannot build thread pool, scanning serially");
            let (matches, file_stats) = scan_files(&compiled.engine, files, cfg);
            return Ok(finish(compiled, matches, file_stats));
        }
    };
    let chunk = files.len().div_ceil(threads);
    let engine = &compiled.engine;
    let parts: Vec<_> = pool.install(|| {
        files
            .par_chunks(chunk)
            .map(|part| scan_files(engine, part, cfg))
            .collect()
    });

    let mut matches = Vec::new();
    let mut file_stats = ScanStats::default();
    for (part, stats) in parts {
        matches.extend(part);
        file_stats.absorb_files(&stats);
    }
    Ok(finish(compiled, matches, file_stats))
}

/// 用已编译引擎逐个处理目标文件
pub fn scan_files<E, P>(engine: &E, files: &[P], cfg: &ScanConfig) -> (Vec<(PathBuf, FileHitMap)>, ScanStats)
where
    E: RuleEngine + ?Sized,
    P: AsRef<Path>,
{
    let policy = cfg.open_policy();
    let mut stats = ScanStats::default();
    let mut matches = Vec::new();

    for file in files {
        let path: &Path = file.as_ref();
        stats.files_total += 1;
        let hits = match match_file(engine, path, &policy) {
            FileOutcome::Hits(hits) => hits,
            FileOutcome::Skipped(_) => {
                stats.files_skipped += 1;
                continue;
            }
        };
        if hits.is_empty() {
            continue;
        }
        stats.hits_total += hits.len();
        let (map, ignored) = normalize_hits(hits, &cfg.ignore_tags);
        stats.hits_ignored += ignored;
        // 全部被过滤与零命中一样，不出现在结果中
        if map.is_empty() {
            debug!(path = %path.display(), ignored, "all hits filtered by tag");
            continue;
        }
        stats.files_matched += 1;
        matches.push((path.to_path_buf(), map));
    }

    (matches, stats)
}

/// 组装扫描元数据
pub fn metadata_for(rules: &RuleSet) -> ScanMetadata {
    ScanMetadata {
        name: NAME.to_string(),
        kind: TYPE.to_string(),
        rules: rules.sorted_paths(),
    }
}

fn finish<E>(
    compiled: CompiledRules<E>,
    matches: Vec<(PathBuf, FileHitMap)>,
    mut stats: ScanStats,
) -> (ScanResult, ScanStats) {
    stats.rules_loaded = compiled.rules.len();
    stats.rules_rejected = compiled.rejected.len();
    info!(
        files = stats.files_total,
        matched = stats.files_matched,
        skipped = stats.files_skipped,
        rules = stats.rules_loaded,
        "scan finished"
    );
    let result = ScanResult { matches, metadata: metadata_for(&compiled.rules) };
    (result, stats)
}
