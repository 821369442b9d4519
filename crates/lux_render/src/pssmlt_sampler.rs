//! Kelemen-style lazy primary-sample-space sampler.
//!
//! Mutates the vector of uniform numbers that drives path construction.
//! Coordinates are mutated lazily: each keeps the time it was last brought
//! up to date, and catches up with the missed small steps when it is next
//! consumed. A large step replaces consumed coordinates with fresh
//! uniforms.

use crate::sampler::{RandomSampler, RestorableSampler, Sampler};

/// A primary-sample coordinate: committed value plus the time it was last
/// brought up to date.
#[derive(Debug, Clone, Copy, Default)]
struct Coord {
    value: f32,
    modify: u64,
}

/// Concrete uniform sources the primary sampler can draw from, so the
/// bootstrap can temporarily plug in a restorable stream and take it back.
pub enum SamplerSource {
    Random(RandomSampler),
    Restorable(RestorableSampler),
}

impl Sampler for SamplerSource {
    fn next(&mut self) -> f32 {
        match self {
            SamplerSource::Random(s) => s.next(),
            SamplerSource::Restorable(s) => s.next(),
        }
    }
}

/// The lazy Kelemen mutator.
///
/// One mutation step is: `set_large_step`, a sequence of `next`/`next_vec2`
/// calls rebuilding the path, then exactly one of `accept` or `reject`.
/// Both outcomes advance the global time; `accept` commits the proposed
/// coordinates, `reject` discards them.
pub struct PssmltPrimarySampler {
    coords: Vec<Coord>,
    /// Overwritten coordinates of the current step, for rollback
    backup: Vec<(usize, Coord)>,
    cursor: usize,
    time: u64,
    large_step_time: u64,
    large_step: bool,
    s1: f32,
    s2: f32,
    /// ln(s2 / s1), precomputed for the mutation kernel
    log_ratio: f32,
    source: SamplerSource,
}

impl PssmltPrimarySampler {
    /// `s1`/`s2` are the minimum/maximum kernel sizes of the truncated
    /// exponential mutation.
    ///
    /// A fresh sampler starts in large-step state: the first step draws
    /// every coordinate directly from the source, which is what lets the
    /// bootstrap replay a restorable stream draw-for-draw.
    pub fn new(s1: f32, s2: f32, source: SamplerSource) -> Self {
        Self {
            coords: Vec::new(),
            backup: Vec::new(),
            cursor: 0,
            time: 1,
            large_step_time: 0,
            large_step: true,
            s1,
            s2,
            log_ratio: (s2 / s1).ln(),
            source,
        }
    }

    /// Declare whether the next mutation step is a large step.
    pub fn set_large_step(&mut self, large: bool) {
        self.large_step = large;
    }

    /// Swap the underlying uniform source, returning the previous one.
    pub fn replace_source(&mut self, source: SamplerSource) -> SamplerSource {
        std::mem::replace(&mut self.source, source)
    }

    /// Commit the proposed coordinates.
    pub fn accept(&mut self) {
        self.backup.clear();
        if self.large_step {
            // Accepted large step: every stale coordinate restarts from a
            // fresh uniform rather than catching up
            self.large_step_time = self.time;
        }
        self.time += 1;
        self.cursor = 0;
    }

    /// Roll back the proposed coordinates.
    pub fn reject(&mut self) {
        for (i, c) in self.backup.drain(..).rev() {
            self.coords[i] = c;
        }
        self.time += 1;
        self.cursor = 0;
    }

    /// One small-step mutation: `delta = s2 * exp(-ln(s2/s1) * xi)` added
    /// modulo one with a random sign.
    fn mutate(&mut self, value: f32) -> f32 {
        let u = self.source.next();
        let (xi, sign) = if u < 0.5 {
            (u * 2.0, 1.0)
        } else {
            ((u - 0.5) * 2.0, -1.0)
        };
        let delta = self.s2 * (-self.log_ratio * xi).exp();
        let mut v = value + sign * delta;
        if v >= 1.0 {
            v -= 1.0;
        }
        if v < 0.0 {
            v += 1.0;
        }
        v
    }
}

impl Sampler for PssmltPrimarySampler {
    fn next(&mut self) -> f32 {
        let i = self.cursor;
        self.cursor += 1;
        if i >= self.coords.len() {
            self.coords.resize(i + 1, Coord::default());
        }

        let mut c = self.coords[i];
        if c.modify < self.time {
            if self.large_step {
                self.backup.push((i, c));
                c = Coord {
                    value: self.source.next(),
                    modify: self.time,
                };
            } else {
                // Coordinates untouched since the last accepted large step
                // restart from a fresh uniform
                if c.modify < self.large_step_time {
                    c.value = self.source.next();
                    c.modify = self.large_step_time;
                }
                // Catch up with the small steps missed while unused
                while c.modify + 1 < self.time {
                    c.value = self.mutate(c.value);
                    c.modify += 1;
                }
                self.backup.push((i, c));
                c.value = self.mutate(c.value);
                c.modify = self.time;
            }
            self.coords[i] = c;
        }
        c.value
    }
}
