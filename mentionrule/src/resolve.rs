//! Resolution of overlapping matches and the non-overlapping entity set of a document.

use itertools::Itertools;
use log::warn;
use std::collections::BTreeMap;

use crate::{
    schema::LabelId,
    types::{Document, Match},
    Error,
};

/// Two candidates of equal length which overlap. The first one in input order was kept.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct OverlapAmbiguity {
    pub kept: (usize, usize),
    pub rival: (usize, usize),
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct Resolution {
    /// Retained matches sorted by start. No two of them overlap.
    pub kept: Vec<Match>,
    pub ambiguities: Vec<OverlapAmbiguity>,
}

/// Reduces `matches` to a non-overlapping subset.
///
/// Matches are grouped into clusters of transitively intersecting ranges. Each cluster keeps its
/// longest match; if several share the maximum length the earliest in input order is kept and the
/// tie is reported as an [OverlapAmbiguity]. Empty matches and exact duplicates are dropped.
pub fn longest_matches(matches: &[Match]) -> Resolution {
    let candidates: Vec<(usize, &Match)> = matches
        .iter()
        .filter(|x| !x.is_empty())
        .unique()
        .enumerate()
        .collect();

    let mut order: Vec<usize> = (0..candidates.len()).collect();
    order.sort_by_key(|&i| (candidates[i].1.start, candidates[i].0));

    let mut resolution = Resolution::default();
    let mut cluster: Vec<usize> = Vec::new();
    let mut cluster_end = 0;

    for i in order {
        let candidate = candidates[i].1;

        if !cluster.is_empty() && candidate.start >= cluster_end {
            resolve_cluster(&candidates, &cluster, &mut resolution);
            cluster.clear();
        }

        cluster_end = if cluster.is_empty() {
            candidate.end
        } else {
            cluster_end.max(candidate.end)
        };
        cluster.push(i);
    }

    if !cluster.is_empty() {
        resolve_cluster(&candidates, &cluster, &mut resolution);
    }

    resolution.kept.sort_by_key(|x| (x.start, x.end));
    resolution
}

fn resolve_cluster(
    candidates: &[(usize, &Match)],
    cluster: &[usize],
    resolution: &mut Resolution,
) {
    let longest = cluster
        .iter()
        .map(|&i| candidates[i].1.len())
        .max()
        .unwrap_or(0);

    let mut longest_candidates = cluster
        .iter()
        .map(|&i| candidates[i])
        .filter(|(_, x)| x.len() == longest)
        .sorted_by_key(|(position, _)| *position)
        .map(|(_, x)| x);

    let kept = match longest_candidates.next() {
        Some(kept) => *kept,
        None => return,
    };

    for rival in longest_candidates {
        warn!(
            "exactly overlapping matches: keeping {}..{}, discarding {}..{}",
            kept.start, kept.end, rival.start, rival.end
        );
        resolution.ambiguities.push(OverlapAmbiguity {
            kept: (kept.start, kept.end),
            rival: (rival.start, rival.end),
        });
    }

    resolution.kept.push(kept);
}

/// A labelled, half-open token range.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Entity {
    pub start: usize,
    pub end: usize,
    pub label: LabelId,
}

impl Entity {
    pub fn new(start: usize, end: usize, label: LabelId) -> Self {
        Entity { start, end, label }
    }

    pub fn len(&self) -> usize {
        self.end - self.start
    }

    pub fn is_empty(&self) -> bool {
        self.end <= self.start
    }

    pub fn overlaps(&self, other: &Entity) -> bool {
        self.start < other.end && other.start < self.end
    }
}

/// The outcome of [EntitySet::insert].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Insertion {
    /// No existing entity overlapped.
    Added,
    /// The same range with the same label was already present.
    Duplicate,
    /// The new entity was strictly longer than every overlapping entity, which were removed.
    Replaced(Vec<Entity>),
    /// The new entity overlapped a longer entity and was not added.
    Rejected,
    /// The new entity overlapped an entity of the same length and was not added. `kept` is the
    /// existing entity, `rival` the new one.
    Tied(OverlapAmbiguity),
}

/// Entities of a document keyed by their token range. No two entities overlap.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct EntitySet {
    entities: BTreeMap<(usize, usize), Entity>,
}

impl EntitySet {
    /// Adds an entity if it does not overlap an existing entity of equal or greater length.
    pub fn insert(&mut self, entity: Entity) -> Insertion {
        if self.entities.get(&(entity.start, entity.end)) == Some(&entity) {
            return Insertion::Duplicate;
        }

        // entities are disjoint, so the overlapping ones are contiguous in start order
        let overlapping: Vec<Entity> = self
            .entities
            .range(..(entity.end, 0))
            .rev()
            .map(|(_, x)| *x)
            .take_while(|x| x.end > entity.start)
            .collect();

        if overlapping.is_empty() {
            self.entities.insert((entity.start, entity.end), entity);
            return Insertion::Added;
        }

        if let Some(tie) = overlapping.iter().find(|x| x.len() == entity.len()) {
            warn!(
                "exactly overlapping entities: keeping {}..{}, discarding {}..{}",
                tie.start, tie.end, entity.start, entity.end
            );
            return Insertion::Tied(OverlapAmbiguity {
                kept: (tie.start, tie.end),
                rival: (entity.start, entity.end),
            });
        }

        if overlapping.iter().all(|x| entity.len() > x.len()) {
            for removed in &overlapping {
                self.entities.remove(&(removed.start, removed.end));
            }
            self.entities.insert((entity.start, entity.end), entity);

            let mut removed = overlapping;
            removed.reverse();
            Insertion::Replaced(removed)
        } else {
            Insertion::Rejected
        }
    }

    /// Iterates over entities in document order.
    pub fn iter(&self) -> impl Iterator<Item = &Entity> {
        self.entities.values()
    }

    pub fn len(&self) -> usize {
        self.entities.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entities.is_empty()
    }

    /// Whether no two entities overlap and every range is non-empty.
    pub fn is_consistent(&self) -> bool {
        self.entities.values().all(|x| !x.is_empty())
            && self
                .entities
                .values()
                .tuple_windows()
                .all(|(a, b)| a.end <= b.start)
    }

    /// Maps every entity range through `f` and reinserts the results in document order.
    pub(crate) fn remap<F>(&mut self, f: F)
    where
        F: Fn(usize, usize) -> (usize, usize),
    {
        let old = std::mem::take(&mut self.entities);

        for entity in old.into_values() {
            let (start, end) = f(entity.start, entity.end);
            if start < end {
                self.insert(Entity::new(start, end, entity.label));
            }
        }
    }
}

impl<'s> Document<'s> {
    /// Adds an entity to the document through [EntitySet::insert].
    pub fn add_entity(&mut self, entity: Entity) -> Result<Insertion, Error> {
        if entity.is_empty() || entity.end > self.tokens.len() {
            return Err(Error::InvalidSpan {
                start: entity.start,
                end: entity.end,
                len: self.tokens.len(),
            });
        }

        Ok(self.entities.insert(entity))
    }
}
