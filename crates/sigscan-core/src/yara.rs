//! 基于 yara-x 的规则后端
//!
//! 每个规则文件编译进以其绝对路径命名的命名空间，因此命中的规范键形如 `a.yar:Rule`。
use std::path::PathBuf;
use tracing::debug;

use crate::compiler::{RuleCompiler, RuleEngine};
use crate::error::{CompileError, MatchError};
use crate::rules::RuleSet;
use crate::types::{HitRecord, MetaValue};

/// yara-x 编译器
#[derive(Debug, Default, Clone, Copy)]
pub struct YaraCompiler;

/// 编译完成的 yara-x 规则
pub struct YaraEngine {
    rules: yara_x::Rules,
}

impl RuleCompiler for YaraCompiler {
    type Engine = YaraEngine;

    fn compile(&self, rules: &RuleSet, includes: bool) -> Result<YaraEngine, CompileError> {
        let mut compiler = yara_x::Compiler::new();
        compiler.enable_includes(includes);
        for path in rules.iter() {
            // 无法读取的规则文件与语法错误同样处理：由上层剔除
            let source = std::fs::read_to_string(path).map_err(|e| {
                CompileError::syntax(path, format!("{}: {}", path.display(), e))
            })?;
            let origin = path.to_string_lossy();
            compiler.new_namespace(&origin);
            let code = yara_x::SourceCode::from(source.as_str()).with_origin(&*origin);
            if let Err(err) = compiler.add_source(code) {
                let message = err.to_string();
                // 出错位置可能位于被 include 的文件
                let file = reported_origin(&message).map(PathBuf::from).unwrap_or_else(|| path.to_path_buf());
                return Err(CompileError::Syntax { file: Some(file), message });
            }
            debug!(file = %path.display(), "rule file added");
        }
        Ok(YaraEngine { rules: compiler.build() })
    }
}

/// 从错误报告的 `--> 文件:行:列` 中取出文件
fn reported_origin(report: &str) -> Option<&str> {
    let located = report.lines().find_map(|l| l.trim_start().strip_prefix("--> "))?;
    let mut parts = located.trim_end().rsplitn(3, ':');
    parts.next()?.parse::<usize>().ok()?;
    parts.next()?.parse::<usize>().ok()?;
    parts.next().filter(|f| !f.is_empty())
}

impl RuleEngine for YaraEngine {
    fn scan(&self, data: &[u8]) -> Result<Vec<HitRecord>, MatchError> {
        let mut scanner = yara_x::Scanner::new(&self.rules);
        let results = scanner.scan(data).map_err(|e| MatchError(e.to_string()))?;
        let hits: Vec<HitRecord> = results.matching_rules().map(|rule| to_hit(&rule)).collect();
        Ok(hits)
    }
}

fn to_hit(rule: &yara_x::Rule) -> HitRecord {
    HitRecord {
        meta: rule
            .metadata()
            .map(|(key, value)| (key.to_string(), meta_value(value)))
            .collect(),
        namespace: rule.namespace().to_string(),
        rule: rule.identifier().to_string(),
        tags: rule.tags().map(|t| t.identifier().to_string()).collect(),
    }
}

fn meta_value(value: yara_x::MetaValue) -> MetaValue {
    match value {
        yara_x::MetaValue::Integer(i) => MetaValue::Integer(i),
        yara_x::MetaValue::Float(f) => MetaValue::Float(f),
        yara_x::MetaValue::Bool(b) => MetaValue::Bool(b),
        yara_x::MetaValue::String(s) => MetaValue::String(s.to_string()),
        yara_x::MetaValue::Bytes(b) => MetaValue::String(String::from_utf8_lossy(b).into_owned()),
    }
}
