//! 有界重试组合子
//!
//! 固定间隔、固定次数，阻塞当前线程；最后一次失败后不再等待。
use std::time::Duration;

/// 重试策略
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    /// 总尝试次数（含首次）；0 按 1 处理
    pub max_attempts: u32,
    /// 相邻两次尝试之间的等待
    pub backoff: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self { max_attempts: 5, backoff: Duration::from_secs(3) }
    }
}

impl RetryPolicy {
    /// 不等待的策略（测试与本地调用）
    pub fn immediate(max_attempts: u32) -> Self {
        Self { max_attempts, backoff: Duration::ZERO }
    }
}

/// 重试结果
#[derive(Debug)]
pub enum Retry<T, E> {
    /// 第 `attempts` 次尝试成功
    Done { value: T, attempts: u32 },
    /// 尝试次数耗尽，保留最后一次错误
    Exhausted { last_error: E, attempts: u32 },
}

impl<T, E> Retry<T, E> {
    pub fn attempts(&self) -> u32 {
        match self {
            Retry::Done { attempts, .. } | Retry::Exhausted { attempts, .. } => *attempts,
        }
    }

    pub fn into_result(self) -> Result<T, E> {
        match self {
            Retry::Done { value, .. } => Ok(value),
            Retry::Exhausted { last_error, .. } => Err(last_error),
        }
    }
}

/// 按策略反复执行 `op`，`op` 收到当前尝试序号（从 1 开始）
pub fn retry<T, E, F>(policy: &RetryPolicy, mut op: F) -> Retry<T, E>
where
    F: FnMut(u32) -> Result<T, E>,
{
    let max = policy.max_attempts.max(1);
    let mut attempt = 1;
    loop {
        match op(attempt) {
            Ok(value) => return Retry::Done { value, attempts: attempt },
            Err(last_error) if attempt >= max => {
                return Retry::Exhausted { last_error, attempts: attempt };
            }
            Err(_) => {
                if !policy.backoff.is_zero() {
                    std::thread::sleep(policy.backoff);
                }
                attempt += 1;
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn succeeds_after_transient_failures() {
        let out = retry(&RetryPolicy::immediate(5), |n| if n < 3 { Err(n) } else { Ok("open") });
        assert_eq!(out.attempts(), 3);
        assert_eq!(out.into_result(), Ok("open"));
    }

    #[test]
    fn gives_up_after_max_attempts() {
        let mut calls = 0;
        let out: Retry<(), u32> = retry(&RetryPolicy::immediate(5), |n| {
            calls += 1;
            Err(n)
        });
        assert_eq!(calls, 5);
        assert!(matches!(out, Retry::Exhausted { last_error: 5, attempts: 5 }));
    }

    #[test]
    fn zero_attempts_still_tries_once() {
        let out: Retry<(), ()> = retry(&RetryPolicy::immediate(0), |_| Err(()));
        assert_eq!(out.attempts(), 1);
    }

    #[test]
    fn sleeps_between_attempts_only() {
        let policy = RetryPolicy { max_attempts: 3, backoff: Duration::from_millis(20) };
        let start = std::time::Instant::now();
        let out: Retry<(), ()> = retry(&policy, |_| Err(()));
        assert_eq!(out.attempts(), 3);
        // 3 次尝试之间只有 2 次等待
        assert!(start.elapsed() >= Duration::from_millis(40));
    }
}
