//! 测试用字面量规则后端
//!
//! 规则文件每行一条：`名称 标签 字面量`，标签以逗号分隔，`-` 表示无标签。
//! 控制指令（单独成行）：
//! - `!syntax`：报告本文件语法错误
//! - `!error-in <路径>`：报告指定路径语法错误（模拟被 include 的文件出错）
//! - `!anonymous`：语法错误但不指出文件
//! - `!backend`：后端故障
//!
//! 目标内容以 `CORRUPT_MARKER` 开头时匹配失败。
use std::collections::{BTreeMap, BTreeSet};
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicUsize, Ordering};

use crate::compiler::{RuleCompiler, RuleEngine};
use crate::error::{CompileError, MatchError};
use crate::rules::RuleSet;
use crate::types::{HitRecord, MetaValue};

pub(crate) const CORRUPT_MARKER: &[u8] = b"\x7fCORRUPT";

#[derive(Default)]
pub(crate) struct LiteralCompiler {
    attempts: AtomicUsize,
}

impl LiteralCompiler {
    pub(crate) fn new() -> Self {
        Self::default()
    }

    /// 已调用 compile 的次数
    pub(crate) fn attempts(&self) -> usize {
        self.attempts.load(Ordering::SeqCst)
    }
}

#[derive(Debug)]
struct LiteralRule {
    namespace: String,
    name: String,
    tags: BTreeSet<String>,
    literal: Vec<u8>,
}

#[derive(Debug)]
pub(crate) struct LiteralEngine {
    rules: Vec<LiteralRule>,
}

impl RuleCompiler for LiteralCompiler {
    type Engine = LiteralEngine;

    fn compile(&self, rules: &RuleSet, _includes: bool) -> Result<LiteralEngine, CompileError> {
        self.attempts.fetch_add(1, Ordering::SeqCst);
        let mut out = Vec::new();
        for path in rules.iter() {
            let txt = std::fs::read_to_string(path)
                .map_err(|e| CompileError::syntax(path, e.to_string()))?;
            for line in txt.lines().map(str::trim).filter(|l| !l.is_empty()) {
                if let Some(directive) = line.strip_prefix('!') {
                    return Err(directive_error(path, directive));
                }
                let mut parts = line.splitn(3, ' ');
                let (Some(name), Some(tags), Some(literal)) = (parts.next(), parts.next(), parts.next())
                else {
                    return Err(CompileError::syntax(path, format!("{}(1): bad rule line", path.display())));
                };
                let tags = tags
                    .split(',')
                    .filter(|t| !t.is_empty() && *t != "-")
                    .map(str::to_string)
                    .collect();
                out.push(LiteralRule {
                    namespace: path.to_string_lossy().into_owned(),
                    name: name.to_string(),
                    tags,
                    literal: literal.as_bytes().to_vec(),
                });
            }
        }
        Ok(LiteralEngine { rules: out })
    }
}

fn directive_error(path: &Path, directive: &str) -> CompileError {
    let message = format!("{}(1): syntax error, unexpected directive", path.display());
    match directive.split_once(' ') {
        Some(("error-in", other)) => CompileError::syntax(PathBuf::from(other), message),
        _ if directive == "anonymous" => CompileError::Syntax { file: None, message },
        _ if directive == "backend" => CompileError::Backend("out of memory".into()),
        _ => CompileError::syntax(path, message),
    }
}

impl RuleEngine for LiteralEngine {
    fn scan(&self, data: &[u8]) -> Result<Vec<HitRecord>, MatchError> {
        if data.starts_with(CORRUPT_MARKER) {
            return Err(MatchError("corrupt input".into()));
        }
        let hits = self
            .rules
            .iter()
            .filter(|r| data.windows(r.literal.len()).any(|w| w == r.literal.as_slice()))
            .map(|r| HitRecord {
                meta: BTreeMap::from([("literal".to_string(), MetaValue::String(String::from_utf8_lossy(&r.literal).into_owned()))]),
                namespace: r.namespace.clone(),
                rule: r.name.clone(),
                tags: r.tags.clone(),
            })
            .collect();
        Ok(hits)
    }
}

/// 构造命中（normalizer 测试用）
pub(crate) fn hit(namespace: &str, rule: &str, tags: &[&str]) -> HitRecord {
    HitRecord {
        meta: BTreeMap::new(),
        namespace: namespace.to_string(),
        rule: rule.to_string(),
        tags: tags.iter().map(|t| t.to_string()).collect(),
    }
}

/// 在目录下写入文件（自动创建父目录），返回绝对路径
pub(crate) fn write_file(dir: &Path, rel: &str, content: &str) -> PathBuf {
    let path = dir.join(rel);
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent).unwrap();
    }
    std::fs::write(&path, content).unwrap();
    std::path::absolute(&path).unwrap()
}
