use std::sync::{Arc, PoisonError, RwLock, RwLockReadGuard};

use camcal_types::{AnalysisResult, GrayFrame, Point2};

/// Single-slot holder for the most recently completed analysis pass
///
/// Writers swap a whole [`AnalysisResult`] in; readers hold a shared guard
/// while they look at the found flag, the corners and the frame together.
#[derive(Default)]
pub struct ResultPublisher {
    slot: RwLock<Option<AnalysisResult>>,
}

impl ResultPublisher {
    pub fn new() -> Self {
        Self::default()
    }

    /// Replaces the published result, returning the previous one
    pub fn publish(&self, result: AnalysisResult) -> Option<AnalysisResult> {
        let mut slot = self.slot.write().unwrap_or_else(PoisonError::into_inner);
        slot.replace(result)
    }

    /// Takes the shared lock; it is held until the returned guard is dropped
    pub fn fetch(&self) -> LatestResult<'_> {
        LatestResult {
            guard: self.slot.read().unwrap_or_else(PoisonError::into_inner),
        }
    }

    pub fn clear(&self) {
        let mut slot = self.slot.write().unwrap_or_else(PoisonError::into_inner);
        slot.take();
    }
}

/// Scoped view of the published result
pub struct LatestResult<'a> {
    guard: RwLockReadGuard<'a, Option<AnalysisResult>>,
}

impl LatestResult<'_> {
    /// False when nothing has been published yet
    pub fn found(&self) -> bool {
        self.guard.as_ref().is_some_and(|result| result.found)
    }

    pub fn corners(&self) -> &[Point2] {
        self.guard
            .as_ref()
            .map(|result| result.corners.as_slice())
            .unwrap_or_default()
    }

    pub fn frame(&self) -> Option<&GrayFrame> {
        self.guard.as_ref().map(|result| result.frame.as_ref())
    }

    /// Owned copy that outlives the lock
    pub fn snapshot(&self) -> Option<AnalysisResult> {
        self.guard.as_ref().cloned()
    }

    /// Frame handle cheap enough to keep after release
    pub fn frame_handle(&self) -> Option<Arc<GrayFrame>> {
        self.guard.as_ref().map(|result| result.frame.clone())
    }

    pub fn release(self) {}
}

#[cfg(test)]
mod tests {
    use std::thread;

    use camcal_types::Detection;

    use super::*;

    fn result(tag: u8, found: bool) -> AnalysisResult {
        let detection = if found {
            Detection::found(vec![Point2::new(tag as f32, tag as f32); 4])
        } else {
            Detection::not_found()
        };
        AnalysisResult::from_detection(detection, GrayFrame::filled(8, 8, tag))
    }

    #[test]
    fn empty_slot_reads_as_not_found() {
        let publisher = ResultPublisher::new();
        let latest = publisher.fetch();
        assert!(!latest.found());
        assert!(latest.corners().is_empty());
        assert!(latest.frame().is_none());
    }

    #[test]
    fn publish_swaps_whole_result() {
        let publisher = ResultPublisher::new();
        assert!(publisher.publish(result(1, true)).is_none());

        let previous = publisher.publish(result(2, false));
        assert_eq!(previous.map(|r| r.frame.pixel(0, 0)), Some(1));

        let latest = publisher.fetch();
        assert!(!latest.found());
        assert!(latest.corners().is_empty());
        assert_eq!(latest.frame().map(|f| f.pixel(0, 0)), Some(2));
        latest.release();
    }

    #[test]
    fn readers_never_observe_mixed_results() {
        let publisher = Arc::new(ResultPublisher::new());
        publisher.publish(result(0, true));

        let writer = {
            let publisher = publisher.clone();
            thread::spawn(move || {
                for tag in 1..=200u8 {
                    publisher.publish(result(tag, tag % 2 == 0));
                }
            })
        };

        for _ in 0..500 {
            let latest = publisher.fetch();
            let frame_tag = latest.frame().map(|f| f.pixel(3, 3));
            if latest.found() {
                assert_eq!(Some(latest.corners()[0].x as u8), frame_tag);
            } else {
                assert!(latest.corners().is_empty());
            }
        }
        writer.join().unwrap();
    }
}
