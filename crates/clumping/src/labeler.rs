//! Connected-component labeling over intervals.
//!
//! A single sweep visits rows in scan order. Each interval is compared with
//! the intervals of its already-visited neighbour rows: the previous row of
//! the same plane and the same row in up to `plane_link_depth` earlier
//! planes. Overlapping intervals with different provisional labels have
//! their labels recorded as equivalent. A final pass resolves the
//! equivalences and renumbers clumps `1..=n` in order of first appearance.

use storm_common::{Box3d, GridDims};

use crate::arena::Arena;
use crate::error::{ClumpingError, Result};
use crate::types::{Clump, Interval, RowHeader};

/// Connectivity options for one labeling run.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) struct LinkOptions {
    pub min_overlap: usize,
    pub plane_link_depth: usize,
}

/// Label equivalence table.
///
/// `parent[label]` points towards the representative label; 0 is unused.
#[derive(Debug, Default)]
struct Equivalences {
    parent: Arena<u32>,
}

impl Equivalences {
    fn reset(&mut self, max_labels: usize) -> Result<()> {
        self.parent.reset();
        self.parent.reserve(max_labels + 1)?;
        self.parent.push(0);
        Ok(())
    }

    fn new_label(&mut self) -> u32 {
        let label = self.parent.len() as u32;
        self.parent.push(label);
        label
    }

    fn n_labels(&self) -> usize {
        self.parent.len() - 1
    }

    fn find(&mut self, mut label: u32) -> u32 {
        while self.parent[label as usize] != label {
            let grandparent = self.parent[self.parent[label as usize] as usize];
            self.parent[label as usize] = grandparent;
            label = grandparent;
        }
        label
    }

    /// Record `a` and `b` as the same clump. The smaller root wins.
    fn union(&mut self, a: u32, b: u32) {
        let ra = self.find(a);
        let rb = self.find(b);
        if ra < rb {
            self.parent[rb as usize] = ra;
        } else if rb < ra {
            self.parent[ra as usize] = rb;
        }
    }
}

/// Reusable labeling workspace.
#[derive(Debug, Default)]
pub(crate) struct ClumpLabeler {
    equivalences: Equivalences,
    remap: Arena<u32>,
    cursor: Arena<usize>,
}

impl ClumpLabeler {
    /// Assign clump ids to every interval. Returns the number of clumps.
    pub(crate) fn label(
        &mut self,
        dims: GridDims,
        rows: &[RowHeader],
        intervals: &mut [Interval],
        opts: LinkOptions,
    ) -> Result<usize> {
        if opts.min_overlap < 1 {
            return Err(ClumpingError::InvalidMinOverlap(opts.min_overlap));
        }

        self.equivalences.reset(intervals.len())?;
        for interval in intervals.iter_mut() {
            interval.id = 0;
        }

        for plane in 0..dims.nz {
            for row_in_plane in 0..dims.ny {
                let current = rows[plane * dims.ny + row_in_plane];
                if current.len == 0 {
                    continue;
                }

                if row_in_plane > 0 {
                    let previous = rows[plane * dims.ny + row_in_plane - 1];
                    self.link_rows(intervals, current, previous, opts.min_overlap);
                }

                for depth in 1..=opts.plane_link_depth.min(plane) {
                    let below = rows[(plane - depth) * dims.ny + row_in_plane];
                    self.link_rows(intervals, current, below, opts.min_overlap);
                }

                for interval in &mut intervals[current.range()] {
                    if interval.id == 0 {
                        interval.id = self.equivalences.new_label();
                    }
                }
            }
        }

        self.resolve(intervals)
    }

    /// Link the intervals of `current` with overlapping intervals of an
    /// earlier row. Both rows are sorted and disjoint, so a sliding window
    /// over `earlier` suffices.
    fn link_rows(
        &mut self,
        intervals: &mut [Interval],
        current: RowHeader,
        earlier: RowHeader,
        min_overlap: usize,
    ) {
        if earlier.len == 0 {
            return;
        }

        let mut window = earlier.start;
        let earlier_end = earlier.start + earlier.len;

        for ci in current.range() {
            let cur = intervals[ci];
            while window < earlier_end && intervals[window].end < cur.begin {
                window += 1;
            }

            let mut ei = window;
            while ei < earlier_end && intervals[ei].begin <= cur.end {
                let prev = intervals[ei];
                if prev.overlap(&cur) >= min_overlap as isize {
                    let cur_id = intervals[ci].id;
                    if cur_id == 0 {
                        intervals[ci].id = self.equivalences.find(prev.id);
                    } else {
                        self.equivalences.union(cur_id, prev.id);
                    }
                }
                ei += 1;
            }
        }
    }

    /// Replace provisional labels with compact ids in scan order.
    fn resolve(&mut self, intervals: &mut [Interval]) -> Result<usize> {
        let n_labels = self.equivalences.n_labels();
        self.remap.fill(n_labels + 1, 0)?;

        let mut n_clumps = 0u32;
        for interval in intervals.iter_mut() {
            let root = self.equivalences.find(interval.id) as usize;
            if self.remap[root] == 0 {
                n_clumps += 1;
                self.remap[root] = n_clumps;
            }
            interval.id = self.remap[root];
        }

        Ok(n_clumps as usize)
    }

    /// Group labeled intervals by clump.
    ///
    /// `order` receives interval indices grouped by clump, in scan order
    /// within each clump; `clumps[k]` describes clump `k + 1`.
    pub(crate) fn build_clumps(
        &mut self,
        intervals: &[Interval],
        n_clumps: usize,
        clumps: &mut Arena<Clump>,
        order: &mut Arena<usize>,
    ) -> Result<()> {
        clumps.reset();
        clumps.reserve(n_clumps)?;
        for k in 0..n_clumps {
            clumps.push(Clump {
                id: k as u32 + 1,
                order_start: 0,
                n_intervals: 0,
                n_points: 0,
                bbox: Box3d::from_run(0, 0, 0, 0),
            });
        }

        for interval in intervals {
            let clump = &mut clumps[interval.id as usize - 1];
            if clump.n_intervals == 0 {
                clump.bbox = Box3d::from_run(
                    interval.begin,
                    interval.end,
                    interval.row_in_plane,
                    interval.plane,
                );
            } else {
                clump.bbox.include_run(
                    interval.begin,
                    interval.end,
                    interval.row_in_plane,
                    interval.plane,
                );
            }
            clump.n_intervals += 1;
            clump.n_points += interval.len();
        }

        let mut start = 0;
        for clump in clumps.iter_mut() {
            clump.order_start = start;
            start += clump.n_intervals;
        }

        self.cursor.fill(n_clumps, 0)?;
        order.fill(intervals.len(), 0)?;
        for (index, interval) in intervals.iter().enumerate() {
            let k = interval.id as usize - 1;
            order[clumps[k].order_start + self.cursor[k]] = index;
            self.cursor[k] += 1;
        }

        Ok(())
    }
}
