use serde::{Deserialize, Serialize};

/// A detected region in output pixel coordinates.
///
/// The rectangle may extend past the frame edge; drawing clips it.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct MatchRect {
    pub x: u32,
    pub y: u32,
    pub width: u32,
    pub height: u32,
}

impl MatchRect {
    pub fn new(x: u32, y: u32, width: u32, height: u32) -> Self {
        Self {
            x,
            y,
            width,
            height,
        }
    }

    /// True when the interiors intersect. Shared edges do not count.
    pub fn overlaps(&self, other: &MatchRect) -> bool {
        let (ax, ay) = (u64::from(self.x), u64::from(self.y));
        let (bx, by) = (u64::from(other.x), u64::from(other.y));
        !(ax >= bx + u64::from(other.width)
            || ax + u64::from(self.width) <= bx
            || ay >= by + u64::from(other.height)
            || ay + u64::from(self.height) <= by)
    }
}

/// All regions from one detection pass, in the detector's emission order.
///
/// A set is published whole and never edited afterwards; newer passes
/// replace it.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct MatchSet {
    rects: Vec<MatchRect>,
}

impl MatchSet {
    pub fn new(rects: Vec<MatchRect>) -> Self {
        Self { rects }
    }

    pub fn empty() -> Self {
        Self::default()
    }

    pub fn rects(&self) -> &[MatchRect] {
        &self.rects
    }

    pub fn iter(&self) -> std::slice::Iter<'_, MatchRect> {
        self.rects.iter()
    }

    pub fn len(&self) -> usize {
        self.rects.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rects.is_empty()
    }

    /// Collapses every group of transitively overlapping rectangles into
    /// its integer-averaged rectangle.
    ///
    /// Clusters keep their creation order until a merge; an absorbed
    /// cluster's slot is taken by the last cluster, as a swap-remove.
    pub fn join_overlaps(&self) -> MatchSet {
        let mut clusters: Vec<Vec<MatchRect>> = Vec::new();

        for rect in &self.rects {
            let hits: Vec<usize> = clusters
                .iter()
                .enumerate()
                .filter(|(_, cluster)| cluster.iter().any(|m| m.overlaps(rect)))
                .map(|(i, _)| i)
                .collect();

            match hits.split_first() {
                None => clusters.push(vec![*rect]),
                Some((&first, rest)) => {
                    clusters[first].push(*rect);
                    // Highest index first so earlier indices stay valid.
                    for &k in rest.iter().rev() {
                        let absorbed = clusters.swap_remove(k);
                        clusters[first].extend(absorbed);
                    }
                }
            }
        }

        MatchSet::new(clusters.iter().map(|c| average(c)).collect())
    }
}

impl From<Vec<MatchRect>> for MatchSet {
    fn from(rects: Vec<MatchRect>) -> Self {
        Self::new(rects)
    }
}

impl<'a> IntoIterator for &'a MatchSet {
    type Item = &'a MatchRect;
    type IntoIter = std::slice::Iter<'a, MatchRect>;

    fn into_iter(self) -> Self::IntoIter {
        self.rects.iter()
    }
}

fn average(cluster: &[MatchRect]) -> MatchRect {
    let n = cluster.len().max(1) as u64;
    let sum = |f: fn(&MatchRect) -> u32| cluster.iter().map(|m| u64::from(f(m))).sum::<u64>() / n;
    MatchRect {
        x: sum(|m| m.x) as u32,
        y: sum(|m| m.y) as u32,
        width: sum(|m| m.width) as u32,
        height: sum(|m| m.height) as u32,
    }
}
