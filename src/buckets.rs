// Query-time partitioning of [begin, end) into equal-width display buckets.
// Each bucket accumulates whatever rows fall into it; empty buckets render as NaN.

use crate::aggregation;
use crate::models::NumericHighLowComposite;

pub const NUMBER_OF_BUCKETS: usize = 60;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Bucket {
    pub start_time: i64,
    pub end_time: i64,
}

#[derive(Debug, Clone, Default)]
struct Accumulator {
    avgs: Vec<f64>,
    mins: Vec<f64>,
    maxs: Vec<f64>,
}

impl Accumulator {
    fn to_composite(&self, time: i64) -> NumericHighLowComposite {
        NumericHighLowComposite::new(
            time,
            aggregation::mean(self.avgs.iter().copied()),
            aggregation::max_of(self.maxs.iter().copied()),
            aggregation::min_of(self.mins.iter().copied()),
        )
    }
}

#[derive(Debug, Clone)]
pub struct Buckets {
    begin: i64,
    end: i64,
    interval: i64,
    buckets: Vec<Bucket>,
    data: Vec<Accumulator>,
}

impl Buckets {
    pub fn new(begin: i64, end: i64) -> Self {
        Self::with_count(begin, end, NUMBER_OF_BUCKETS)
    }

    /// The last bucket absorbs the remainder of the integer division, so it always ends at `end`.
    /// Windows narrower than `count` ms give buckets starting past `end`; callers reject those.
    pub fn with_count(begin: i64, end: i64, count: usize) -> Self {
        let count = count.max(1);
        let interval = ((end - begin) / count as i64).max(1);
        let buckets = (0..count)
            .map(|i| {
                let start_time = begin + i as i64 * interval;
                let end_time = if i + 1 == count {
                    end.max(start_time + 1)
                } else {
                    start_time + interval
                };
                Bucket {
                    start_time,
                    end_time,
                }
            })
            .collect();
        Self {
            begin,
            end,
            interval,
            buckets,
            data: vec![Accumulator::default(); count],
        }
    }

    pub fn len(&self) -> usize {
        self.buckets.len()
    }

    pub fn is_empty(&self) -> bool {
        self.buckets.is_empty()
    }

    /// Width of every bucket but the last.
    pub fn interval(&self) -> i64 {
        self.interval
    }

    pub fn get(&self, index: usize) -> Option<Bucket> {
        self.buckets.get(index).copied()
    }

    pub fn iter(&self) -> impl Iterator<Item = &Bucket> {
        self.buckets.iter()
    }

    /// Index of the bucket containing `time`, or `None` outside [begin, end).
    pub fn find(&self, time: i64) -> Option<usize> {
        if time < self.begin || time >= self.end {
            return None;
        }
        let index = ((time - self.begin) / self.interval) as usize;
        Some(index.min(self.buckets.len() - 1))
    }

    /// Adds one raw sample. Returns false when `time` is outside the window.
    pub fn insert_raw(&mut self, time: i64, value: f64) -> bool {
        self.insert(time, value, value, value)
    }

    /// Adds one pre-aggregated row.
    pub fn insert_aggregate(&mut self, time: i64, avg: f64, min: f64, max: f64) -> bool {
        self.insert(time, avg, min, max)
    }

    fn insert(&mut self, time: i64, avg: f64, min: f64, max: f64) -> bool {
        let Some(index) = self.find(time) else {
            return false;
        };
        let acc = &mut self.data[index];
        acc.avgs.push(avg);
        acc.mins.push(min);
        acc.maxs.push(max);
        true
    }

    /// One point per bucket, stamped with the bucket start.
    pub fn to_composites(&self) -> Vec<NumericHighLowComposite> {
        self.buckets
            .iter()
            .zip(&self.data)
            .map(|(b, acc)| acc.to_composite(b.start_time))
            .collect()
    }
}
