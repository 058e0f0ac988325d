//! 扫描配置与统计信息（模块）
//!
//! 配置是每次调用构造的不可变值，按参数传入扫描入口；不存在被调用方改写的共享默认配置。
use anyhow::{Context, Result};
use serde::Deserialize;
use std::collections::BTreeSet;
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::retry::RetryPolicy;

/// 配置文件中扫描器所在的表名
pub const CONFIG_SECTION: &str = "Yara";

/// 扫描配置（字段名与配置文件保持一致）
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ScanConfig {
    /// 规则根目录（递归枚举）
    pub ruledir: PathBuf,
    /// 规则文件后缀白名单（纯后缀匹配）
    pub fileextensions: Vec<String>,
    /// 命中这些标签之一的结果将被丢弃
    #[serde(rename = "ignore-tags")]
    pub ignore_tags: BTreeSet<String>,
    /// 规则是否允许 include 其他文件
    pub includes: bool,
    /// 总开关；为 false 时扫描器报告不可用
    #[serde(rename = "ENABLED")]
    pub enabled: bool,
    /// 打开目标文件的最大尝试次数
    #[serde(rename = "open-attempts")]
    pub open_attempts: u32,
    /// 两次打开尝试之间的等待（毫秒）
    #[serde(rename = "open-backoff-ms")]
    pub open_backoff_ms: u64,
}

impl Default for ScanConfig {
    fn default() -> Self {
        Self {
            ruledir: PathBuf::from("etc").join("yarasigs"),
            fileextensions: vec![".yar".into(), ".yara".into(), ".sig".into()],
            ignore_tags: BTreeSet::from(["TLPRED".to_string()]),
            includes: false,
            enabled: true,
            open_attempts: 5,
            open_backoff_ms: 3000,
        }
    }
}

impl ScanConfig {
    /// 以指定规则目录构造，其余字段取默认值
    pub fn with_ruledir(ruledir: impl Into<PathBuf>) -> Self {
        Self { ruledir: ruledir.into(), ..Self::default() }
    }

    /// 目标文件打开的重试策略
    pub fn open_policy(&self) -> RetryPolicy {
        RetryPolicy {
            max_attempts: self.open_attempts,
            backoff: Duration::from_millis(self.open_backoff_ms),
        }
    }

    /// 路径是否以任一配置后缀结尾
    pub fn is_rule_file(&self, name: &str) -> bool {
        self.fileextensions.iter().any(|ext| name.ends_with(ext.as_str()))
    }
}

/// 从 TOML 文件加载配置
/// - 若文档含 `[Yara]` 表，则只读取该表；否则整个文档即为扫描器配置
/// - 缺失字段取默认值
pub fn load_config(path: &Path) -> Result<ScanConfig> {
    let txt = std::fs::read_to_string(path)
        .with_context(|| format!("read config {}", path.display()))?;
    parse_config(&txt).with_context(|| format!("parse config {}", path.display()))
}

pub(crate) fn parse_config(txt: &str) -> Result<ScanConfig> {
    let mut doc: toml::Table = toml::from_str(txt)?;
    let section = match doc.remove(CONFIG_SECTION) {
        Some(v @ toml::Value::Table(_)) => v,
        Some(_) => anyhow::bail!("`{CONFIG_SECTION}` must be a table"),
        None => toml::Value::Table(doc),
    };
    Ok(section.try_into::<ScanConfig>()?)
}

/// 扫描统计信息（便于 CLI 打印）
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct ScanStats {
    pub files_total: usize,
    pub files_matched: usize,
    pub files_skipped: usize,
    pub hits_total: usize,
    pub hits_ignored: usize,
    pub rules_loaded: usize,
    pub rules_rejected: usize,
}

impl ScanStats {
    /// 合并另一批文件的计数（规则计数不累加，规则只编译一次）
    pub(crate) fn absorb_files(&mut self, other: &ScanStats) {
        self.files_total += other.files_total;
        self.files_matched += other.files_matched;
        self.files_skipped += other.files_skipped;
        self.hits_total += other.hits_total;
        self.hits_ignored += other.hits_ignored;
    }
}
