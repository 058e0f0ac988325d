//! 规则文件枚举与规则集构建（带自愈编译）
//!
//! 流程：递归枚举规则目录 → 按后缀过滤 → 绝对路径集合 → 编译；
//! 编译器指出的出错文件若仍在集合中则剔除并重试，集合严格缩小，循环必然结束。
use std::collections::BTreeSet;
use std::io;
use std::path::{Path, PathBuf};
use tracing::{debug, error, info, warn};
use walkdir::WalkDir;

use crate::compiler::RuleCompiler;
use crate::error::{CompileError, ScanAbort};
use crate::options::ScanConfig;

/// 参与编译的规则文件集合（以绝对路径为标识）
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RuleSet {
    paths: BTreeSet<PathBuf>,
}

impl RuleSet {
    pub fn from_paths<I>(paths: I) -> Self
    where
        I: IntoIterator<Item = PathBuf>,
    {
        Self { paths: paths.into_iter().collect() }
    }

    pub fn contains(&self, path: &Path) -> bool {
        self.paths.contains(path)
    }

    pub fn len(&self) -> usize {
        self.paths.len()
    }

    pub fn is_empty(&self) -> bool {
        self.paths.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &Path> {
        self.paths.iter().map(PathBuf::as_path)
    }

    /// 按路径字符串字典序排列的路径列表（写入元数据）
    pub fn sorted_paths(&self) -> Vec<String> {
        let mut out: Vec<String> = self.paths.iter().map(|p| p.to_string_lossy().into_owned()).collect();
        out.sort();
        out
    }

    fn remove(&mut self, path: &Path) -> bool {
        self.paths.remove(path)
    }
}

/// 编译成功后的引擎与最终规则集
#[derive(Debug)]
pub struct CompiledRules<E> {
    pub engine: E,
    /// 恰为最终参与编译的规则文件
    pub rules: RuleSet,
    /// 恢复过程中被剔除的文件（按剔除顺序）
    pub rejected: Vec<PathBuf>,
}

/// 枚举失败（携带出错路径）
#[derive(Debug)]
pub struct EnumerateError {
    pub path: PathBuf,
    pub source: io::Error,
}

/// 递归列出 `root` 下的所有文件，返回相对 `root` 的路径（按文件名排序遍历）
pub fn enumerate_rule_files(root: &Path) -> Result<Vec<PathBuf>, EnumerateError> {
    let mut out = Vec::new();
    for entry in WalkDir::new(root).min_depth(1).sort_by_file_name() {
        let entry = entry.map_err(|e| EnumerateError {
            path: e.path().map(Path::to_path_buf).unwrap_or_else(|| root.to_path_buf()),
            source: io::Error::from(e),
        })?;
        // 符号链接按其指向判定
        let is_file = entry.file_type().is_file() || (entry.path_is_symlink() && entry.path().is_file());
        if !is_file {
            continue;
        }
        if let Ok(rel) = entry.path().strip_prefix(root) {
            out.push(rel.to_path_buf());
        }
    }
    Ok(out)
}

/// 转为绝对路径（不解析符号链接）；失败时原样返回
pub(crate) fn absolutize(path: &Path) -> PathBuf {
    std::path::absolute(path).unwrap_or_else(|_| path.to_path_buf())
}

/// 枚举并按后缀过滤，得到候选规则集
pub fn collect_rule_set(cfg: &ScanConfig) -> Result<RuleSet, ScanAbort> {
    let files = enumerate_rule_files(&cfg.ruledir).map_err(|e| {
        error!(path = %e.path.display(), error = %e.source, "cannot read rule files");
        ScanAbort::RuleDirUnreadable { path: e.path, source: e.source }
    })?;
    let rules = RuleSet::from_paths(
        files
            .into_iter()
            .filter(|rel| cfg.is_rule_file(&rel.to_string_lossy()))
            .map(|rel| absolutize(&cfg.ruledir.join(rel)))
            .filter(|path| {
                // 后端以路径字符串作为命名空间与错误来源，非 UTF-8 路径无法对应回规则集
                let utf8 = path.to_str().is_some();
                if !utf8 {
                    warn!(file = %path.display(), "skipping rule file with non UTF-8 path");
                }
                utf8
            }),
    );
    debug!(ruledir = %cfg.ruledir.display(), candidates = rules.len(), "collected rule files");
    Ok(rules)
}

/// 单次编译尝试的分类结果
#[derive(Debug)]
pub(crate) enum CompileStep<E> {
    Success(E),
    /// 出错文件仍在规则集中，可剔除后重试
    Recoverable(PathBuf, CompileError),
    /// 无法通过剔除文件恢复
    Fatal(CompileError),
}

pub(crate) fn classify<E>(attempt: Result<E, CompileError>, rules: &RuleSet) -> CompileStep<E> {
    let err = match attempt {
        Ok(engine) => return CompileStep::Success(engine),
        Err(err) => err,
    };
    if matches!(err, CompileError::Backend(_)) {
        return CompileStep::Fatal(err);
    }
    match err.offending_file().map(absolutize) {
        Some(bad) if rules.contains(&bad) => CompileStep::Recoverable(bad, err),
        _ => CompileStep::Fatal(err),
    }
}

/// 自愈编译：反复编译并剔除出错文件，直到成功或无法继续
pub fn compile_with_recovery<C>(
    compiler: &C,
    mut rules: RuleSet,
    includes: bool,
) -> Result<CompiledRules<C::Engine>, ScanAbort>
where
    C: RuleCompiler + ?Sized,
{
    let mut rejected = Vec::new();
    loop {
        match classify(compiler.compile(&rules, includes), &rules) {
            CompileStep::Success(engine) => {
                info!(rules = rules.len(), rejected = rejected.len(), "rules compiled");
                return Ok(CompiledRules { engine, rules, rejected });
            }
            CompileStep::Recoverable(bad, err) => {
                warn!(file = %bad.display(), error = %err, "dropping rule file that failed to compile");
                rules.remove(&bad);
                rejected.push(bad);
            }
            CompileStep::Fatal(CompileError::Syntax { file, message }) => {
                let label = file.as_deref().map(|p| p.display().to_string()).unwrap_or_default();
                error!(file = %label, "invalid rule cannot be removed from the rule set, aborting");
                error!("{message}");
                return Err(ScanAbort::UnrecoverableRule { file, message });
            }
            CompileStep::Fatal(err) => {
                error!(error = %err, "rule compilation failed, aborting");
                return Err(ScanAbort::Compile(err));
            }
        }
    }
}

/// 规则集构建入口：枚举 → 过滤 → 自愈编译
pub fn build_rules<C>(cfg: &ScanConfig, compiler: &C) -> Result<CompiledRules<C::Engine>, ScanAbort>
where
    C: RuleCompiler + ?Sized,
{
    let rules = collect_rule_set(cfg)?;
    compile_with_recovery(compiler, rules, cfg.includes)
}
