//! 两阶段实体匹配
//!
//! 阶段一按几何哈希做精确匹配；阶段二在未消耗的同类导出实体中按锚点做网格近邻搜索。
//! 网格单元不小于容差，误差在容差内的候选其锚点必然落在 3×3 邻域里。

use super::compare::{compare, Comparison};
use super::hash::{geometric_hash, GeometricHash};
use super::ValidationOptions;
use std::collections::{HashMap, VecDeque};
use surveycad_core::entity::CanonicalEntity;
use surveycad_core::geometry::EntityKind;
use surveycad_core::math::{Point3, EPSILON};

/// 匹配阶段
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MatchStage {
    Exact,
    Fuzzy,
}

/// 一对匹配实体
#[derive(Debug, Clone, PartialEq)]
pub struct MatchedPair {
    pub original: usize,
    pub exported: usize,
    pub stage: MatchStage,
    pub comparison: Comparison,
}

/// 匹配结果
#[derive(Debug, Clone, Default, PartialEq)]
pub struct MatchOutcome {
    pub pairs: Vec<MatchedPair>,
    /// 未匹配的原始实体序号
    pub missing: Vec<usize>,
    /// 未匹配的导出实体序号
    pub spurious: Vec<usize>,
}

/// 按 (类型, 单元) 分桶的锚点网格
struct AnchorGrid {
    cell_size: f64,
    cells: HashMap<(EntityKind, i64, i64), Vec<usize>>,
}

impl AnchorGrid {
    fn new(cell_size: f64) -> Self {
        Self {
            cell_size: cell_size.max(EPSILON),
            cells: HashMap::new(),
        }
    }

    fn to_grid_coord(&self, p: &Point3<f64>) -> (i64, i64) {
        (
            (p.x / self.cell_size).floor() as i64,
            (p.y / self.cell_size).floor() as i64,
        )
    }

    fn insert(&mut self, kind: EntityKind, anchor: &Point3<f64>, index: usize) {
        let (gx, gy) = self.to_grid_coord(anchor);
        self.cells.entry((kind, gx, gy)).or_default().push(index);
    }

    /// 3×3 邻域内的候选
    fn neighbours(&self, kind: EntityKind, anchor: &Point3<f64>) -> impl Iterator<Item = usize> + '_ {
        let (gx, gy) = self.to_grid_coord(anchor);
        (-1..=1)
            .flat_map(move |dx| (-1..=1).map(move |dy| (kind, gx + dx, gy + dy)))
            .filter_map(|key| self.cells.get(&key))
            .flatten()
            .copied()
    }
}

/// 匹配两个实体集
pub fn match_entities(
    original: &[CanonicalEntity],
    exported: &[CanonicalEntity],
    options: &ValidationOptions,
) -> MatchOutcome {
    let mut consumed = vec![false; exported.len()];
    let mut matched = vec![None; original.len()];
    let mut exact = 0usize;
    // 哈希相同但实际超差的命中，先让阶段二寻找更近的候选
    let mut deferred: Vec<Option<(usize, Comparison)>> = (0..original.len()).map(|_| None).collect();

    // 阶段一：哈希精确匹配
    let mut by_hash: HashMap<GeometricHash, VecDeque<usize>> = HashMap::new();
    for (i, entity) in exported.iter().enumerate() {
        by_hash
            .entry(geometric_hash(entity.geometry(), options.hash_decimals))
            .or_default()
            .push_back(i);
    }

    for (i, entity) in original.iter().enumerate() {
        let hash = geometric_hash(entity.geometry(), options.hash_decimals);
        let Some(bucket) = by_hash.get_mut(&hash) else {
            continue;
        };
        let Some(j) = bucket.pop_front() else {
            continue;
        };
        if let Some(comparison) = compare(entity.geometry(), exported[j].geometry(), options) {
            if comparison.error > options.tolerance {
                deferred[i] = Some((j, comparison));
                continue;
            }
            consumed[j] = true;
            exact += 1;
            matched[i] = Some(MatchedPair {
                original: i,
                exported: j,
                stage: MatchStage::Exact,
                comparison,
            });
        } else {
            bucket.push_front(j);
        }
    }

    // 阶段二：网格近邻
    let mut grid = AnchorGrid::new(options.tolerance);
    for (j, entity) in exported.iter().enumerate() {
        if !consumed[j] {
            grid.insert(entity.kind(), &entity.geometry().anchor(), j);
        }
    }

    for (i, entity) in original.iter().enumerate() {
        if matched[i].is_some() {
            continue;
        }
        let best = grid
            .neighbours(entity.kind(), &entity.geometry().anchor())
            .filter(|&j| !consumed[j])
            .filter_map(|j| {
                compare(entity.geometry(), exported[j].geometry(), options).map(|c| (j, c))
            })
            .filter(|(_, c)| c.error <= options.tolerance)
            .min_by(|(ja, a), (jb, b)| {
                a.mismatch_count()
                    .cmp(&b.mismatch_count())
                    .then(a.error.total_cmp(&b.error))
                    .then(ja.cmp(jb))
            });

        if let Some((j, comparison)) = best {
            consumed[j] = true;
            matched[i] = Some(MatchedPair {
                original: i,
                exported: j,
                stage: MatchStage::Fuzzy,
                comparison,
            });
        }
    }

    // 阶段二找不到时退回哈希命中，误差由校验报告为 PositionalError
    for (i, fallback) in deferred.into_iter().enumerate() {
        let Some((j, comparison)) = fallback else {
            continue;
        };
        if matched[i].is_none() && !consumed[j] {
            consumed[j] = true;
            exact += 1;
            matched[i] = Some(MatchedPair {
                original: i,
                exported: j,
                stage: MatchStage::Exact,
                comparison,
            });
        }
    }

    let missing = matched
        .iter()
        .enumerate()
        .filter(|(_, m)| m.is_none())
        .map(|(i, _)| i)
        .collect();
    let spurious = consumed
        .iter()
        .enumerate()
        .filter(|(_, c)| !**c)
        .map(|(j, _)| j)
        .collect();
    let pairs: Vec<MatchedPair> = matched.into_iter().flatten().collect();

    tracing::debug!(
        exact,
        fuzzy = pairs.len() - exact,
        "Matched {} of {} original entities",
        pairs.len(),
        original.len()
    );

    MatchOutcome {
        pairs,
        missing,
        spurious,
    }
}
