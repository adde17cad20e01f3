//! Concurrent, deduplicated feature collection across a box partition.
//!
//! Boxes are dealt round-robin to `floor(sqrt(n))` workers. Each worker walks
//! its boxes in order and, per box, queries the three categories. Results for
//! a box are gathered in a worker-local buffer and handed to the aggregating
//! caller over a channel once the box is done; no container is ever written by
//! two tasks. The caller only merges after every worker has finished (or the
//! deadline fired), so metrics never see a half-filled collection.

use crate::retry::RetryPolicy;
use crate::source::{FeatureBatch, FeatureSource};
use std::str::FromStr;
use std::sync::Arc;
use std::time::{Duration, Instant};
use thiserror::Error;
use tokio::sync::mpsc;
use tokio::task::JoinSet;
use walksafe_core::{BoundingBox, FeatureCategory, FeatureCollection};

/// What `collect` returns when the deadline fires before every box is done.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum DeadlinePolicy {
    /// Discard everything and fail the collection.
    #[default]
    Fail,
    /// Keep finished boxes and report the rest as failed.
    Partial,
}

impl FromStr for DeadlinePolicy {
    type Err = String;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.trim().to_ascii_lowercase().as_str() {
            "fail" => Ok(Self::Fail),
            "partial" => Ok(Self::Partial),
            other => Err(format!("unknown deadline policy: {other}")),
        }
    }
}

#[derive(Debug, Clone)]
pub struct CollectorConfig {
    /// Upper bound on the whole collection. `None` waits indefinitely.
    pub deadline: Option<Duration>,
    pub deadline_policy: DeadlinePolicy,
    pub retry: RetryPolicy,
}

impl Default for CollectorConfig {
    fn default() -> Self {
        Self {
            deadline: Some(Duration::from_secs(60)),
            deadline_policy: DeadlinePolicy::Fail,
            retry: RetryPolicy::default(),
        }
    }
}

#[derive(Debug, Error, PartialEq)]
pub enum CollectError {
    #[error("feature collection did not finish within {0:?}")]
    DeadlineExceeded(Duration),
}

/// One category of one box that produced no data.
#[derive(Debug, Clone, PartialEq)]
pub struct BoxFailure {
    pub box_index: usize,
    pub bbox: BoundingBox,
    pub category: FeatureCategory,
    pub reason: String,
}

/// One category of one box whose response was cut off by the feature cap.
#[derive(Debug, Clone, PartialEq)]
pub struct TruncatedBox {
    pub box_index: usize,
    pub bbox: BoundingBox,
    pub category: FeatureCategory,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct CollectionReport {
    pub features: FeatureCollection,
    pub failed: Vec<BoxFailure>,
    pub truncated: Vec<TruncatedBox>,
    pub boxes_total: usize,
}

impl CollectionReport {
    /// True when not a single box answered any category.
    pub fn all_boxes_failed(&self) -> bool {
        self.boxes_total > 0 && self.failed.len() == self.boxes_total * FeatureCategory::ALL.len()
    }
}

#[derive(Debug)]
struct BoxOutcome {
    index: usize,
    results: Vec<(FeatureCategory, Result<FeatureBatch, String>)>,
}

pub struct FeatureCollector<S> {
    source: Arc<S>,
    config: CollectorConfig,
}

impl<S> FeatureCollector<S>
where
    S: FeatureSource + 'static,
{
    pub fn new(source: S, config: CollectorConfig) -> Self {
        Self::from_arc(Arc::new(source), config)
    }

    pub fn from_arc(source: Arc<S>, config: CollectorConfig) -> Self {
        Self { source, config }
    }

    pub fn source(&self) -> &S {
        &self.source
    }

    pub fn config(&self) -> &CollectorConfig {
        &self.config
    }

    /// `floor(sqrt(boxes))`, at least one.
    pub fn worker_count(boxes: usize) -> usize {
        ((boxes as f64).sqrt().floor() as usize).max(1)
    }

    /// Fetch all three categories for every box and merge them.
    ///
    /// A failed query only costs its own box and category; see
    /// [`CollectionReport::failed`]. Only the deadline can fail the call.
    pub async fn collect(&self, boxes: &[BoundingBox]) -> Result<CollectionReport, CollectError> {
        let started = Instant::now();
        if boxes.is_empty() {
            return Ok(CollectionReport::default());
        }

        let workers = Self::worker_count(boxes.len());
        let (tx, mut rx) = mpsc::channel::<BoxOutcome>(boxes.len());
        let mut tasks = JoinSet::new();

        for worker in 0..workers {
            let assigned: Vec<(usize, BoundingBox)> = boxes
                .iter()
                .copied()
                .enumerate()
                .skip(worker)
                .step_by(workers)
                .collect();
            let source = Arc::clone(&self.source);
            let retry = self.config.retry.clone();
            let tx = tx.clone();
            tasks.spawn(run_worker(worker, source, assigned, retry, tx));
        }
        drop(tx);

        let mut outcomes: Vec<Option<BoxOutcome>> = (0..boxes.len()).map(|_| None).collect();
        let finished = match self.config.deadline {
            Some(deadline) => {
                tokio::time::timeout(deadline, drain(&mut rx, &mut outcomes))
                    .await
                    .is_ok()
            }
            None => {
                drain(&mut rx, &mut outcomes).await;
                true
            }
        };

        if !finished {
            tasks.abort_all();
            while let Ok(outcome) = rx.try_recv() {
                let index = outcome.index;
                if let Some(slot) = outcomes.get_mut(index) {
                    *slot = Some(outcome);
                }
            }
            let deadline = self.config.deadline.unwrap_or_default();
            let done = outcomes.iter().filter(|outcome| outcome.is_some()).count();
            match self.config.deadline_policy {
                DeadlinePolicy::Fail => {
                    tracing::warn!(
                        ?deadline,
                        done,
                        total = boxes.len(),
                        "feature collection deadline exceeded; discarding partial data"
                    );
                    return Err(CollectError::DeadlineExceeded(deadline));
                }
                DeadlinePolicy::Partial => {
                    tracing::warn!(
                        ?deadline,
                        done,
                        total = boxes.len(),
                        "feature collection deadline exceeded; keeping finished boxes"
                    );
                }
            }
        }

        while let Some(joined) = tasks.join_next().await {
            if let Err(err) = joined {
                if err.is_panic() {
                    tracing::error!(error = %err, "collector worker panicked");
                }
            }
        }

        let missing_reason = if finished {
            "worker terminated before reporting"
        } else {
            "deadline exceeded"
        };
        let report = assemble(boxes, outcomes, missing_reason);

        tracing::info!(
            boxes = boxes.len(),
            workers,
            lights = report.features.lights.len(),
            sidewalks = report.features.sidewalks.len(),
            traffic = report.features.traffic.len(),
            failed = report.failed.len(),
            truncated = report.truncated.len(),
            elapsed_ms = started.elapsed().as_millis() as u64,
            "feature collection finished"
        );
        Ok(report)
    }
}

async fn drain(rx: &mut mpsc::Receiver<BoxOutcome>, outcomes: &mut [Option<BoxOutcome>]) {
    while let Some(outcome) = rx.recv().await {
        let index = outcome.index;
        if let Some(slot) = outcomes.get_mut(index) {
            *slot = Some(outcome);
        }
    }
}

async fn run_worker<S: FeatureSource>(
    worker: usize,
    source: Arc<S>,
    boxes: Vec<(usize, BoundingBox)>,
    retry: RetryPolicy,
    tx: mpsc::Sender<BoxOutcome>,
) {
    for (index, bbox) in boxes {
        let (lights, sidewalks, traffic) = tokio::join!(
            fetch(&*source, &retry, FeatureCategory::StreetLights, index, bbox),
            fetch(&*source, &retry, FeatureCategory::Sidewalks, index, bbox),
            fetch(&*source, &retry, FeatureCategory::TrafficVolumes, index, bbox),
        );

        let outcome = BoxOutcome {
            index,
            results: vec![
                (FeatureCategory::StreetLights, lights),
                (FeatureCategory::Sidewalks, sidewalks),
                (FeatureCategory::TrafficVolumes, traffic),
            ],
        };
        if tx.send(outcome).await.is_err() {
            tracing::debug!(worker, "collector stopped listening; worker exiting");
            return;
        }
    }
}

async fn fetch<S: FeatureSource>(
    source: &S,
    retry: &RetryPolicy,
    category: FeatureCategory,
    index: usize,
    bbox: BoundingBox,
) -> Result<FeatureBatch, String> {
    retry
        .run(|| source.query(category, bbox))
        .await
        .map_err(|err| {
            tracing::warn!(box_index = index, %category, error = %err, "feature query failed");
            err.to_string()
        })
}

/// Merge outcomes in box order so "first seen" is the lowest box index.
fn assemble(
    boxes: &[BoundingBox],
    outcomes: Vec<Option<BoxOutcome>>,
    missing_reason: &str,
) -> CollectionReport {
    let mut report = CollectionReport {
        boxes_total: boxes.len(),
        ..CollectionReport::default()
    };
    let mut merged = FeatureCollection::new();

    for (index, outcome) in outcomes.into_iter().enumerate() {
        let bbox = boxes[index];
        let Some(outcome) = outcome else {
            for category in FeatureCategory::ALL {
                report.failed.push(BoxFailure {
                    box_index: index,
                    bbox,
                    category,
                    reason: missing_reason.to_string(),
                });
            }
            continue;
        };

        for (category, result) in outcome.results {
            match result {
                Ok(batch) => {
                    if batch.truncated {
                        report.truncated.push(TruncatedBox {
                            box_index: index,
                            bbox,
                            category,
                        });
                    }
                    merged.extend(batch.features);
                }
                Err(reason) => report.failed.push(BoxFailure {
                    box_index: index,
                    bbox,
                    category,
                    reason,
                }),
            }
        }
    }

    report.features = merged.dedup();
    report
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::source::DataSourceError;
    use geo::Point;
    use std::collections::HashMap;
    use std::sync::Mutex;
    use walksafe_core::{split_box, Feature, StreetLight};

    /// Answers lights by box index; other categories are empty.
    #[derive(Default)]
    struct ScriptedSource {
        boxes: Vec<BoundingBox>,
        lights: HashMap<usize, Vec<i64>>,
        failing: Vec<usize>,
        stalled: Vec<usize>,
        truncated: Vec<usize>,
        calls: Mutex<Vec<(usize, FeatureCategory)>>,
    }

    impl ScriptedSource {
        fn index_of(&self, bbox: &BoundingBox) -> usize {
            self.boxes
                .iter()
                .position(|candidate| candidate == bbox)
                .expect("unknown box")
        }
    }

    impl FeatureSource for ScriptedSource {
        async fn query(
            &self,
            category: FeatureCategory,
            bbox: BoundingBox,
        ) -> Result<FeatureBatch, DataSourceError> {
            let index = self.index_of(&bbox);
            self.calls.lock().unwrap().push((index, category));

            if self.stalled.contains(&index) {
                tokio::time::sleep(Duration::from_secs(3600)).await;
            }
            if self.failing.contains(&index) {
                return Err(DataSourceError::Status {
                    status: 503,
                    body: "unavailable".to_string(),
                });
            }
            if category != FeatureCategory::StreetLights {
                return Ok(FeatureBatch::default());
            }

            let features = self
                .lights
                .get(&index)
                .into_iter()
                .flatten()
                .map(|id| {
                    Feature::StreetLight(StreetLight {
                        id: *id,
                        location: Point::new(bbox.sw.lon, bbox.sw.lat),
                    })
                })
                .collect();
            Ok(FeatureBatch {
                features,
                truncated: self.truncated.contains(&index),
            })
        }
    }

    fn boxes(count: usize) -> Vec<BoundingBox> {
        let bbox = BoundingBox::from_extremes(43.0, -81.3, 43.1, -81.2);
        split_box(&bbox, count).unwrap()
    }

    fn config() -> CollectorConfig {
        CollectorConfig {
            deadline: Some(Duration::from_secs(30)),
            deadline_policy: DeadlinePolicy::Fail,
            retry: RetryPolicy::none(),
        }
    }

    #[test]
    fn worker_count_is_floor_sqrt() {
        type C = FeatureCollector<ScriptedSource>;
        assert_eq!(C::worker_count(0), 1);
        assert_eq!(C::worker_count(1), 1);
        assert_eq!(C::worker_count(3), 1);
        assert_eq!(C::worker_count(25), 5);
        assert_eq!(C::worker_count(35), 5);
        assert_eq!(C::worker_count(36), 6);
    }

    #[tokio::test]
    async fn every_box_is_queried_once_per_category() {
        let boxes = boxes(9);
        let collector = FeatureCollector::new(
            ScriptedSource {
                boxes: boxes.clone(),
                ..ScriptedSource::default()
            },
            config(),
        );

        let report = collector.collect(&boxes).await.unwrap();
        assert!(report.failed.is_empty());
        assert_eq!(report.boxes_total, 9);

        let calls = collector.source.calls.lock().unwrap().clone();
        assert_eq!(calls.len(), 27);
        for index in 0..9 {
            for category in FeatureCategory::ALL {
                assert!(calls.contains(&(index, category)));
            }
        }
    }

    #[tokio::test]
    async fn overlapping_boxes_yield_one_copy_of_each_feature() {
        let boxes = boxes(4);
        let collector = FeatureCollector::new(
            ScriptedSource {
                boxes: boxes.clone(),
                lights: HashMap::from([(0, vec![42, 1]), (1, vec![42, 2]), (3, vec![42])]),
                ..ScriptedSource::default()
            },
            config(),
        );

        let report = collector.collect(&boxes).await.unwrap();
        let mut ids: Vec<i64> = report.features.lights.iter().map(|light| light.id).collect();
        ids.sort_unstable();
        assert_eq!(ids, vec![1, 2, 42]);
    }

    #[tokio::test]
    async fn failed_box_does_not_abort_the_others() {
        let boxes = boxes(4);
        let collector = FeatureCollector::new(
            ScriptedSource {
                boxes: boxes.clone(),
                lights: HashMap::from([(0, vec![10]), (2, vec![20]), (3, vec![30])]),
                failing: vec![2],
                ..ScriptedSource::default()
            },
            config(),
        );

        let report = collector.collect(&boxes).await.unwrap();
        let mut ids: Vec<i64> = report.features.lights.iter().map(|light| light.id).collect();
        ids.sort_unstable();
        assert_eq!(ids, vec![10, 30]);

        assert_eq!(report.failed.len(), 3);
        assert!(report.failed.iter().all(|failure| failure.box_index == 2));
        assert!(report.failed.iter().all(|failure| failure.bbox == boxes[2]));
        assert!(!report.all_boxes_failed());
    }

    #[tokio::test]
    async fn every_box_failing_is_reported() {
        let boxes = boxes(4);
        let collector = FeatureCollector::new(
            ScriptedSource {
                boxes: boxes.clone(),
                failing: vec![0, 1, 2, 3],
                ..ScriptedSource::default()
            },
            config(),
        );

        let report = collector.collect(&boxes).await.unwrap();
        assert!(report.all_boxes_failed());
        assert!(report.features.is_empty());
    }

    #[tokio::test]
    async fn truncated_responses_are_reported() {
        let boxes = boxes(4);
        let collector = FeatureCollector::new(
            ScriptedSource {
                boxes: boxes.clone(),
                lights: HashMap::from([(1, vec![5])]),
                truncated: vec![1],
                ..ScriptedSource::default()
            },
            config(),
        );

        let report = collector.collect(&boxes).await.unwrap();
        assert_eq!(
            report.truncated,
            vec![TruncatedBox {
                box_index: 1,
                bbox: boxes[1],
                category: FeatureCategory::StreetLights,
            }]
        );
    }

    #[tokio::test(start_paused = true)]
    async fn deadline_with_fail_policy_discards_everything() {
        let boxes = boxes(4);
        let collector = FeatureCollector::new(
            ScriptedSource {
                boxes: boxes.clone(),
                lights: HashMap::from([(0, vec![1])]),
                stalled: vec![3],
                ..ScriptedSource::default()
            },
            config(),
        );

        let result = collector.collect(&boxes).await;
        assert_eq!(
            result,
            Err(CollectError::DeadlineExceeded(Duration::from_secs(30)))
        );
    }

    #[tokio::test(start_paused = true)]
    async fn deadline_with_partial_policy_keeps_finished_boxes() {
        let boxes = boxes(4);
        let collector = FeatureCollector::new(
            ScriptedSource {
                boxes: boxes.clone(),
                lights: HashMap::from([(0, vec![1]), (3, vec![3])]),
                stalled: vec![3],
                ..ScriptedSource::default()
            },
            CollectorConfig {
                deadline_policy: DeadlinePolicy::Partial,
                ..config()
            },
        );

        let report = collector.collect(&boxes).await.unwrap();
        let ids: Vec<i64> = report.features.lights.iter().map(|light| light.id).collect();
        assert_eq!(ids, vec![1]);
        assert_eq!(report.failed.len(), 3);
        assert!(report
            .failed
            .iter()
            .all(|failure| failure.box_index == 3 && failure.reason == "deadline exceeded"));
    }

    #[tokio::test]
    async fn no_boxes_is_an_empty_report() {
        let collector = FeatureCollector::new(ScriptedSource::default(), config());
        let report = collector.collect(&[]).await.unwrap();
        assert_eq!(report, CollectionReport::default());
    }

    #[test]
    fn deadline_policy_parses() {
        assert_eq!("partial".parse::<DeadlinePolicy>(), Ok(DeadlinePolicy::Partial));
        assert_eq!(" FAIL ".parse::<DeadlinePolicy>(), Ok(DeadlinePolicy::Fail));
        assert!("maybe".parse::<DeadlinePolicy>().is_err());
    }
}
