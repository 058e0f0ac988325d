//! 错误类型
use std::io;
use std::path::PathBuf;
use thiserror::Error;

/// 规则编译失败
#[derive(Debug, Error)]
pub enum CompileError {
    /// 规则语法错误；`file` 为编译器指出的出错文件（可能不在当前规则集中）
    #[error("{message}")]
    Syntax { file: Option<PathBuf>, message: String },
    /// 与具体规则文件无关的后端故障
    #[error("rule backend failure: {0}")]
    Backend(String),
}

impl CompileError {
    pub fn syntax(file: impl Into<PathBuf>, message: impl Into<String>) -> Self {
        CompileError::Syntax { file: Some(file.into()), message: message.into() }
    }

    /// 编译器指出的出错文件
    pub fn offending_file(&self) -> Option<&std::path::Path> {
        match self {
            CompileError::Syntax { file, .. } => file.as_deref(),
            CompileError::Backend(_) => None,
        }
    }
}

/// 单个文件匹配失败（损坏、超限等）
#[derive(Debug, Error)]
#[error("match failed: {0}")]
pub struct MatchError(pub String);

/// 扫描无法进行（"无结果"），区别于"零命中"
#[derive(Debug, Error)]
pub enum ScanAbort {
    #[error("cannot read rule directory {}: {source}", .path.display())]
    RuleDirUnreadable {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
    #[error("invalid rule {} cannot be removed from the rule set: {message}", file_label(.file))]
    UnrecoverableRule { file: Option<PathBuf>, message: String },
    #[error(transparent)]
    Compile(CompileError),
}

fn file_label(file: &Option<PathBuf>) -> String {
    match file {
        Some(p) => p.display().to_string(),
        None => "<unknown>".to_string(),
    }
}
