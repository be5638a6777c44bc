//! 确定性的训练/测试划分.

use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use rand::SeedableRng;

/// 以 `seed` 为种子打乱 `items`. 相同输入和种子总是得到相同结果.
pub fn shuffled<T>(mut items: Vec<T>, seed: u64) -> Vec<T> {
    let mut rng = StdRng::seed_from_u64(seed);
    items.shuffle(&mut rng);
    items
}

/// 患者划分.
#[derive(Clone, Debug, Default, Eq, PartialEq)]
pub struct Split {
    /// 训练集患者, 保持打乱后的顺序.
    pub train: Vec<String>,

    /// 测试集患者, 即打乱后的前缀.
    pub test: Vec<String>,
}

impl Split {
    /// 总患者数.
    #[inline]
    pub fn len(&self) -> usize {
        self.train.len() + self.test.len()
    }

    /// 是否没有任何患者?
    #[inline]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// 将 `ids` 的前 `test_len` 项划为测试集, 其余为训练集.
/// `test_len` 超过总数时全部划为测试集.
pub fn partition(mut ids: Vec<String>, test_len: usize) -> Split {
    let train = ids.split_off(test_len.min(ids.len()));
    Split { train, test: ids }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;

    fn ids(n: usize) -> Vec<String> {
        (0..n).map(|i| format!("patient{i:04}")).collect()
    }

    #[test]
    fn test_shuffle_deterministic() {
        assert_eq!(shuffled(ids(50), 0), shuffled(ids(50), 0));
        assert_ne!(shuffled(ids(50), 0), shuffled(ids(50), 1));
        assert_ne!(shuffled(ids(50), 0), ids(50));
    }

    #[test]
    fn test_partition_disjoint_and_complete() {
        for seed in 0..5 {
            let split = partition(shuffled(ids(30), seed), 10);
            assert_eq!(split.test.len(), 10);
            assert_eq!(split.train.len(), 20);
            let train: HashSet<_> = split.train.iter().collect();
            let test: HashSet<_> = split.test.iter().collect();
            assert!(train.is_disjoint(&test));
            let all: HashSet<_> = train.union(&test).copied().cloned().collect();
            assert_eq!(all, ids(30).into_iter().collect());
        }
    }

    #[test]
    fn test_partition_small() {
        let split = partition(ids(3), 10);
        assert_eq!(split.test, ids(3));
        assert!(split.train.is_empty());
        assert_eq!(split.len(), 3);
        assert!(partition(Vec::new(), 10).is_empty());
    }
}
