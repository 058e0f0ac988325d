//! 单文件匹配
//!
//! 每个文件独立处理，任何失败都只跳过该文件，不影响整批扫描。
use std::io::{self, Read};
use std::path::Path;
use thiserror::Error;
use tracing::error;

use crate::acquire::acquire;
use crate::compiler::RuleEngine;
use crate::error::MatchError;
use crate::retry::RetryPolicy;
use crate::types::HitRecord;

/// 文件被跳过的原因
#[derive(Debug, Error)]
pub enum SkipReason {
    #[error("could not open after {attempts} attempts: {error}")]
    Unopenable { attempts: u32, error: io::Error },
    #[error("read failed: {0}")]
    Unreadable(io::Error),
    #[error(transparent)]
    MatchFailed(MatchError),
}

/// 单文件处理结果
#[derive(Debug)]
pub enum FileOutcome {
    /// 原始命中（未过滤，可能为空）
    Hits(Vec<HitRecord>),
    Skipped(SkipReason),
}

/// 打开（带重试）并匹配单个文件；文件句柄在返回前释放
pub fn match_file<E>(engine: &E, path: &Path, policy: &RetryPolicy) -> FileOutcome
where
    E: RuleEngine + ?Sized,
{
    let outcome = match acquire(path, policy) {
        Ok(file) => match_reader(engine, file),
        Err(failure) => FileOutcome::Skipped(SkipReason::Unopenable {
            attempts: failure.attempts,
            error: failure.error,
        }),
    };
    if let FileOutcome::Skipped(reason) = &outcome {
        error!(path = %path.display(), %reason, "skipping file");
    }
    outcome
}

/// 读取全部内容后匹配；`reader` 在此函数内被消费并释放
pub(crate) fn match_reader<E, R>(engine: &E, mut reader: R) -> FileOutcome
where
    E: RuleEngine + ?Sized,
    R: Read,
{
    let mut buf = Vec::new();
    if let Err(e) = reader.read_to_end(&mut buf) {
        return FileOutcome::Skipped(SkipReason::Unreadable(e));
    }
    match engine.scan(&buf) {
        Ok(hits) => FileOutcome::Hits(hits),
        Err(e) => FileOutcome::Skipped(SkipReason::MatchFailed(e)),
    }
}
