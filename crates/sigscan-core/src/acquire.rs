//! 目标文件获取（带重试的只读打开）
use std::fs::File;
use std::io;
use std::path::Path;
use tracing::error;

use crate::retry::{retry, Retry, RetryPolicy};

/// 重试耗尽后的失败信息
#[derive(Debug)]
pub struct AcquireFailure {
    pub attempts: u32,
    pub error: io::Error,
}

/// 以二进制只读方式打开文件；失败时按策略等待后重试
pub fn acquire(path: &Path, policy: &RetryPolicy) -> Result<File, AcquireFailure> {
    acquire_with(path, policy, |p| File::open(p))
}

/// 同 `acquire`，打开方式可替换
pub(crate) fn acquire_with<R, F>(path: &Path, policy: &RetryPolicy, mut open: F) -> Result<R, AcquireFailure>
where
    F: FnMut(&Path) -> io::Result<R>,
{
    let outcome = retry(policy, |attempt| {
        open(path).map_err(|e| {
            error!(path = %path.display(), attempt, error = %e, "cannot open file");
            e
        })
    });
    match outcome {
        Retry::Done { value, .. } => Ok(value),
        Retry::Exhausted { last_error, attempts } => Err(AcquireFailure { attempts, error: last_error }),
    }
}
