//! Position of this process on the ring shared by every client of a service.
//!
//! The coordinate is set once at startup and read-only afterwards. Each process owns
//! the arc of the hash-ordered node ring that starts at `offset / total_units` of the
//! ring, so processes with distinct offsets window mostly distinct nodes.

use crate::error::{DistributorError, Result};
use anyhow::anyhow;
use serde::Serialize;
use std::fmt::Display;
use std::str::FromStr;
use std::sync::OnceLock;

static COORDINATE: OnceLock<Coordinate> = OnceLock::new();

/// Installs the process coordinate. Fails if one is already installed.
pub fn init_coordinate(coordinate: Coordinate) -> Result<()> {
    COORDINATE
        .set(coordinate)
        .map_err(|_| DistributorError::CoordinateAlreadySet)
}

pub fn process_coordinate() -> Option<Coordinate> {
    COORDINATE.get().copied()
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct Coordinate {
    offset: u32,
    total_units: u32,
}

impl Coordinate {
    pub fn new(offset: u32, total_units: u32) -> Result<Self> {
        if total_units == 0 || offset >= total_units {
            return Err(DistributorError::InvalidCoordinate {
                offset,
                total_units,
            });
        }

        Ok(Self {
            offset,
            total_units,
        })
    }

    pub fn offset(&self) -> u32 {
        self.offset
    }

    pub fn total_units(&self) -> u32 {
        self.total_units
    }

    /// Smallest window that lets the processes on the ring cover all `ring_size` nodes.
    pub fn min_width(&self, ring_size: usize) -> usize {
        ring_size.div_ceil(self.total_units as usize)
    }

    /// Arc of `width` nodes owned by this process on a ring of `ring_size` nodes.
    pub fn arc(&self, ring_size: usize, width: usize) -> RingRange {
        if ring_size == 0 {
            return RingRange { start: 0, end: 0 };
        }

        let start = (self.offset as u64 * ring_size as u64 / self.total_units as u64) as usize;
        let end = (start + width.min(ring_size)) % ring_size;

        RingRange { start, end }
    }
}

impl Display for Coordinate {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}/{}", self.offset, self.total_units)
    }
}

impl FromStr for Coordinate {
    type Err = anyhow::Error;

    /// Parses `offset/total_units`, e.g. `2/8`.
    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        let (offset, total_units) = s
            .split_once('/')
            .ok_or_else(|| anyhow!("coordinate must look like offset/total, got '{s}'"))?;

        let coordinate = Coordinate::new(offset.trim().parse()?, total_units.trim().parse()?)?;

        Ok(coordinate)
    }
}

/// Represents a range on the ring [start, end).
///
/// When `end < start`, the range wraps around the ring. `start == end` covers the
/// whole ring.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RingRange {
    pub start: usize,
    pub end: usize,
}

impl RingRange {
    pub fn iter(&self, ring_size: usize) -> RingRangeIterator {
        RingRangeIterator {
            range: *self,
            ring_size,
            current: self.start,
            done: ring_size == 0,
        }
    }

    pub fn contains(&self, position: usize) -> bool {
        match self.start.cmp(&self.end) {
            std::cmp::Ordering::Less => (self.start..self.end).contains(&position),
            std::cmp::Ordering::Greater => position >= self.start || position < self.end,
            std::cmp::Ordering::Equal => true,
        }
    }
}

impl Display for RingRange {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "[{},{})", self.start, self.end)
    }
}

pub struct RingRangeIterator {
    range: RingRange,
    ring_size: usize,
    current: usize,
    done: bool,
}

impl Iterator for RingRangeIterator {
    type Item = usize;

    fn next(&mut self) -> Option<Self::Item> {
        if self.done {
            return None;
        }

        let result = self.current;

        self.current = (self.current + 1) % self.ring_size;

        if self.current == self.range.end % self.ring_size {
            self.done = true;
        }

        Some(result)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_into_iter() {
        const RING_SIZE: usize = 10;

        let range = RingRange { start: 0, end: 1 };
        let result: Vec<usize> = range.iter(RING_SIZE).collect();
        assert_eq!(result, vec![0]);

        let range = RingRange { start: 0, end: 5 };
        let result: Vec<usize> = range.iter(RING_SIZE).collect();
        assert_eq!(result, vec![0, 1, 2, 3, 4]);

        let range = RingRange { start: 9, end: 1 };
        let result: Vec<usize> = range.iter(RING_SIZE).collect();
        assert_eq!(result, vec![9, 0]);

        let range = RingRange { start: 0, end: 0 };
        let result: Vec<usize> = range.iter(RING_SIZE).collect();
        assert_eq!(result, (0..10).collect::<Vec<_>>());

        let range = RingRange { start: 0, end: 3 };
        let result: Vec<usize> = range.iter(3).collect();
        assert_eq!(result, vec![0, 1, 2]);

        assert_eq!(range.iter(0).next(), None);
    }

    #[test]
    fn test_contains() {
        let range = RingRange { start: 2, end: 5 };
        assert!(range.contains(2));
        assert!(range.contains(4));
        assert!(!range.contains(5));
        assert!(!range.contains(1));

        let wrapping = RingRange { start: 8, end: 2 };
        assert!(wrapping.contains(9));
        assert!(wrapping.contains(1));
        assert!(!wrapping.contains(5));

        assert!(RingRange { start: 3, end: 3 }.contains(0));
    }

    #[test]
    fn test_invalid_coordinates() {
        assert_eq!(
            Coordinate::new(0, 0),
            Err(DistributorError::InvalidCoordinate {
                offset: 0,
                total_units: 0
            })
        );
        assert!(Coordinate::new(4, 4).is_err());
        assert!(Coordinate::new(3, 4).is_ok());
    }

    #[test]
    fn test_parse() {
        let coordinate: Coordinate = "2/8".parse().unwrap();
        assert_eq!(coordinate, Coordinate::new(2, 8).unwrap());
        assert_eq!(coordinate.to_string(), "2/8");

        assert!("2".parse::<Coordinate>().is_err());
        assert!("a/8".parse::<Coordinate>().is_err());
        assert!("9/8".parse::<Coordinate>().is_err());
    }

    #[test]
    fn test_arcs_tile_the_ring() {
        const RING_SIZE: usize = 10;
        const TOTAL: u32 = 4;

        let mut covered = vec![0; RING_SIZE];
        for offset in 0..TOTAL {
            let coordinate = Coordinate::new(offset, TOTAL).unwrap();
            let width = coordinate.min_width(RING_SIZE);
            assert_eq!(width, 3);

            for position in coordinate.arc(RING_SIZE, width).iter(RING_SIZE) {
                covered[position] += 1;
            }
        }

        assert!(covered.iter().all(|&count| count >= 1), "{covered:?}");
    }

    #[test]
    fn test_arc_never_exceeds_ring() {
        let coordinate = Coordinate::new(1, 2).unwrap();
        let arc = coordinate.arc(4, 9);

        assert_eq!(arc, RingRange { start: 2, end: 2 });
        assert_eq!(arc.iter(4).count(), 4);
    }

    #[test]
    fn test_process_coordinate_is_set_once() {
        let coordinate = Coordinate::new(1, 3).unwrap();

        // other tests may race to install one, only the first install wins
        let first = init_coordinate(coordinate);
        let second = init_coordinate(coordinate);

        assert!(process_coordinate().is_some());
        assert_eq!(second, Err(DistributorError::CoordinateAlreadySet));
        if first.is_ok() {
            assert_eq!(process_coordinate(), Some(coordinate));
        }
    }
}
