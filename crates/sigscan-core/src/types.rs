//! 公共类型（对外暴露）
use serde::Serialize;
use std::collections::{BTreeMap, BTreeSet};
use std::path::PathBuf;

/// 扫描器名称（写入元数据）
pub const NAME: &str = "Yara";
/// 扫描器类型（写入元数据）
pub const TYPE: &str = "Signature";

/// 规则元数据中的标量值
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum MetaValue {
    Integer(i64),
    Float(f64),
    Bool(bool),
    String(String),
}

/// 单条规则命中
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct HitRecord {
    pub meta: BTreeMap<String, MetaValue>,
    pub namespace: String,
    pub rule: String,
    pub tags: BTreeSet<String>,
}

/// 单个文件的命中表：规范键 → 命中
pub type FileHitMap = BTreeMap<String, HitRecord>;

/// 扫描元数据
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ScanMetadata {
    #[serde(rename = "Name")]
    pub name: String,
    #[serde(rename = "Type")]
    pub kind: String,
    /// 最终参与编译的规则文件，按路径字符串排序
    #[serde(rename = "Rules")]
    pub rules: Vec<String>,
}

/// 扫描结果
/// - `matches` 按目标文件的处理顺序排列，只包含过滤后仍有命中的文件
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ScanResult {
    pub matches: Vec<(PathBuf, FileHitMap)>,
    pub metadata: ScanMetadata,
}

impl ScanResult {
    /// 按路径取某个文件的命中表
    pub fn hits_for(&self, path: &std::path::Path) -> Option<&FileHitMap> {
        self.matches.iter().find(|(p, _)| p == path).map(|(_, m)| m)
    }
}

/// 扫描器可用性
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Availability {
    Ready,
    /// 配置中 ENABLED = false
    Disabled,
    /// 未编译规则引擎后端（`yara` feature 关闭）
    BackendMissing,
}

impl Availability {
    pub fn is_ready(self) -> bool {
        matches!(self, Availability::Ready)
    }
}
