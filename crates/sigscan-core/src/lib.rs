//! 基于签名规则的内容扫描核心库
//!
//! 设计要点：
//! - 规则目录只编译一次；出错的规则文件被逐个剔除后重试（自愈编译），无法剔除时整次扫描返回"无结果"。
//! - 目标文件按输入顺序逐个处理；打开失败有限次重试，匹配失败只跳过该文件。
//! - 命中按忽略标签过滤，以 `<命名空间末段>:<规则名>` 为键归并，同键后者覆盖前者。
//! - 规则语法与匹配语义由 `RuleCompiler` / `RuleEngine` 后端决定（默认 yara-x）。

mod acquire;
mod compiler;
mod engine;
mod error;
mod findings;
mod options;
mod retry;
mod rules;
mod scan;
mod types;
#[cfg(feature = "yara")]
mod yara;

#[cfg(test)]
mod test_utils;

pub use acquire::{acquire, AcquireFailure};
pub use compiler::{RuleCompiler, RuleEngine};
pub use engine::{match_file, FileOutcome, SkipReason};
pub use error::{CompileError, MatchError, ScanAbort};
pub use findings::{canonical_key, is_ignored, normalize_hits};
pub use options::{load_config, ScanConfig, ScanStats, CONFIG_SECTION};
pub use retry::{retry, Retry, RetryPolicy};
pub use rules::{build_rules, collect_rule_set, compile_with_recovery, enumerate_rule_files, CompiledRules, EnumerateError, RuleSet};
pub use scan::{check, metadata_for, scan, scan_files, scan_parallel, scan_with_stats};
pub use types::{Availability, FileHitMap, HitRecord, MetaValue, ScanMetadata, ScanResult, NAME, TYPE};
#[cfg(feature = "yara")]
pub use yara::{YaraCompiler, YaraEngine};
