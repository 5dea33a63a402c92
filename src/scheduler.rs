use std::ops::Range;

/// What [`Scheduler::advance`] did.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Advance {
    /// More triangles of the current iteration remain.
    Slice,
    /// An iteration finished and more remain.
    Iteration,
    /// The last iteration finished.
    Finished,
}

/// Slices the bake into steps: a step covers either all triangles or the next
/// `triangles_per_step` triangles of the current iteration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Scheduler {
    iteration: u32,
    budget: u32,
    cursor: usize,
    triangle_count: usize,
    triangles_per_step: Option<usize>,
}

impl Scheduler {
    pub fn new(budget: u32, triangle_count: usize, triangles_per_step: Option<usize>) -> Self {
        Self {
            iteration: 0,
            budget,
            cursor: 0,
            triangle_count,
            triangles_per_step,
        }
    }

    /// Completed iterations.
    pub fn iteration(&self) -> u32 {
        self.iteration
    }

    pub fn budget(&self) -> u32 {
        self.budget
    }

    /// First triangle of the next slice.
    pub fn cursor(&self) -> usize {
        self.cursor
    }

    pub fn is_finished(&self) -> bool {
        self.iteration >= self.budget
    }

    /// The iteration and triangle range of the next step, `None` once finished.
    pub fn next_slice(&self) -> Option<(u32, Range<usize>)> {
        if self.is_finished() {
            return None;
        }
        let end = match self.triangles_per_step {
            Some(count) => (self.cursor + count.max(1)).min(self.triangle_count),
            None => self.triangle_count,
        };
        Some((self.iteration, self.cursor..end))
    }

    /// Moves past the slice returned by [`Scheduler::next_slice`].
    pub fn advance(&mut self) -> Advance {
        let Some((_, slice)) = self.next_slice() else {
            return Advance::Finished;
        };

        if slice.end < self.triangle_count {
            self.cursor = slice.end;
            return Advance::Slice;
        }

        self.cursor = 0;
        self.iteration += 1;
        if self.is_finished() {
            Advance::Finished
        } else {
            Advance::Iteration
        }
    }

    /// Fraction of the bake done, in [0, 1].
    pub fn progress(&self) -> f32 {
        if self.budget == 0 || self.is_finished() {
            return 1.0;
        }
        let slice = if self.triangle_count > 0 {
            self.cursor as f32 / self.triangle_count as f32
        } else {
            0.0
        };
        (self.iteration as f32 + slice) / self.budget as f32
    }

    /// Starts over at the first iteration.
    pub fn reset(&mut self) {
        self.iteration = 0;
        self.cursor = 0;
    }
}
