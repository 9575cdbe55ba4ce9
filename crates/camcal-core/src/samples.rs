use camcal_types::Point2;

/// Ordered, bounded collection of accepted corner sets
#[derive(Debug, Clone)]
pub struct SampleSet {
    samples: Vec<Vec<Point2>>,
    max: usize,
}

impl SampleSet {
    pub fn new(max: usize) -> Self {
        Self {
            samples: Vec::with_capacity(max),
            max,
        }
    }

    /// Appends a sample; returns false once the set is full
    pub fn push(&mut self, corners: Vec<Point2>) -> bool {
        if self.is_full() {
            return false;
        }
        self.samples.push(corners);
        true
    }

    /// Removes the most recent sample
    pub fn undo_last(&mut self) -> bool {
        self.samples.pop().is_some()
    }

    pub fn clear(&mut self) -> bool {
        if self.samples.is_empty() {
            return false;
        }
        self.samples.clear();
        true
    }

    pub fn len(&self) -> usize {
        self.samples.len()
    }

    pub fn is_empty(&self) -> bool {
        self.samples.is_empty()
    }

    pub fn max(&self) -> usize {
        self.max
    }

    pub fn is_full(&self) -> bool {
        self.samples.len() >= self.max
    }

    pub fn as_slice(&self) -> &[Vec<Point2>] {
        &self.samples
    }

    pub fn last(&self) -> Option<&[Point2]> {
        self.samples.last().map(Vec::as_slice)
    }
}
