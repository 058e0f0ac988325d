//! 命中归一化：标签过滤 + 规范键 + 同键覆盖
use std::collections::BTreeSet;

use crate::types::{FileHitMap, HitRecord};

/// 计算命中的规范键
/// 回退顺序：
/// 1. 命名空间按 `/` 切分后的最后一段非空 → `"<段>:<规则>"`（无分隔符时整个命名空间即最后一段）
/// 2. 否则（空命名空间、以分隔符结尾）→ `"<规则>"`
pub fn canonical_key(hit: &HitRecord) -> String {
    match hit.namespace.rsplit('/').next().filter(|seg| !seg.is_empty()) {
        Some(seg) => format!("{}:{}", seg, hit.rule),
        None => hit.rule.clone(),
    }
}

/// 标签是否与忽略集合相交
pub fn is_ignored(hit: &HitRecord, ignore_tags: &BTreeSet<String>) -> bool {
    hit.tags.iter().any(|t| ignore_tags.contains(t))
}

/// 归一化单个文件的原始命中
/// - 丢弃标签与忽略集合相交的命中
/// - 以规范键写入，后出现者覆盖先出现者（不合并字段）
///
/// 返回命中表与被忽略的条数
pub fn normalize_hits<I>(hits: I, ignore_tags: &BTreeSet<String>) -> (FileHitMap, usize)
where
    I: IntoIterator<Item = HitRecord>,
{
    let mut map = FileHitMap::new();
    let mut ignored = 0usize;
    for hit in hits {
        if is_ignored(&hit, ignore_tags) {
            ignored += 1;
            continue;
        }
        map.insert(canonical_key(&hit), hit);
    }
    (map, ignored)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_utils::hit;

    fn ignore(tags: &[&str]) -> BTreeSet<String> {
        tags.iter().map(|t| t.to_string()).collect()
    }

    #[test]
    fn key_uses_last_namespace_segment() {
        assert_eq!(canonical_key(&hit("a/b/c", "R", &[])), "c:R");
        assert_eq!(canonical_key(&hit("/etc/yarasigs/a.yar", "R", &[])), "a.yar:R");
    }

    #[test]
    fn key_without_separator_keeps_namespace() {
        assert_eq!(canonical_key(&hit("default", "R", &[])), "default:R");
    }

    #[test]
    fn key_falls_back_to_rule() {
        assert_eq!(canonical_key(&hit("", "R", &[])), "R");
        assert_eq!(canonical_key(&hit("a/b/", "R", &[])), "R");
    }

    #[test]
    fn drops_hits_with_ignored_tags() {
        let hits = vec![
            hit("ns/a.yar", "Keep", &["FOO"]),
            hit("ns/b.yar", "Drop", &["TLPRED"]),
            hit("ns/c.yar", "DropToo", &["FOO", "TLPRED"]),
            hit("ns/d.yar", "Untagged", &[]),
        ];
        let (map, ignored) = normalize_hits(hits, &ignore(&["TLPRED"]));
        assert_eq!(ignored, 2);
        assert_eq!(map.keys().collect::<Vec<_>>(), vec!["a.yar:Keep", "d.yar:Untagged"]);
    }

    #[test]
    fn later_duplicate_overwrites() {
        let mut first = hit("x/a.yar", "R", &["ONE"]);
        first.meta.insert("n".into(), crate::types::MetaValue::Integer(1));
        let second = hit("y/a.yar", "R", &["TWO"]);
        let (map, _) = normalize_hits(vec![first, second.clone()], &ignore(&[]));
        assert_eq!(map.len(), 1);
        assert_eq!(map["a.yar:R"], second);
    }

    #[test]
    fn all_filtered_yields_empty_map() {
        let (map, ignored) = normalize_hits(vec![hit("a", "R", &["TLPRED"])], &ignore(&["TLPRED"]));
        assert!(map.is_empty());
        assert_eq!(ignored, 1);
    }
}
