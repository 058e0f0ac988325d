//! 规则编译/匹配能力（对扫描流程不透明）
//!
//! 扫描流程不解析规则语法，只通过这两个 trait 与具体后端交互。
use crate::error::{CompileError, MatchError};
use crate::rules::RuleSet;
use crate::types::HitRecord;

/// 将规则集编译为可执行引擎
pub trait RuleCompiler {
    type Engine: RuleEngine;

    /// 编译整个规则集；`includes` 控制规则能否 include 其他文件。
    /// 语法错误需尽量通过 `CompileError::Syntax { file, .. }` 指出出错文件。
    fn compile(&self, rules: &RuleSet, includes: bool) -> Result<Self::Engine, CompileError>;
}

/// 编译完成的引擎，构造后只读
pub trait RuleEngine {
    /// 对完整的文件内容执行匹配
    fn scan(&self, data: &[u8]) -> Result<Vec<HitRecord>, MatchError>;
}
