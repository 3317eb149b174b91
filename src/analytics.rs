/*!
 * Workflow analytics.
 *
 * Everything here is a pure function of a set of requests and their
 * workflow events. Stage durations come from `status_change` events only:
 * for consecutive status changes of one request, the elapsed time is
 * attributed to the status entered by the earlier event.
 */

use chrono::{DateTime, Duration, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashMap};

use crate::workflow::{EventType, RequestStatus, TranslationRequest, WorkflowEvent};

/// Inclusive time window
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct DateRange {
    pub from: DateTime<Utc>,
    pub to: DateTime<Utc>,
}

impl DateRange {
    pub fn new(from: DateTime<Utc>, to: DateTime<Utc>) -> Self {
        Self { from, to }
    }

    /// The `days` days up to `now`
    pub fn last_days(days: i64, now: DateTime<Utc>) -> Self {
        Self::new(now - Duration::days(days), now)
    }

    pub fn contains(&self, at: DateTime<Utc>) -> bool {
        at >= self.from && at <= self.to
    }
}

/// Statistics of one language pair
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LanguageStats {
    pub source_language: String,
    pub target_language: String,
    pub count: usize,
    pub completed: usize,
    pub average_quality: Option<f64>,
    pub average_hours: Option<f64>,
}

/// Performance of one translator
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TranslatorPerformance {
    pub translator_id: String,
    pub translator_name: String,
    pub completed: usize,
    pub average_quality: Option<f64>,
    pub words_per_hour: Option<f64>,
    pub on_time_rate: Option<f64>,
}

/// Mean assessment score of one day
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DailyQuality {
    pub date: NaiveDate,
    pub average_quality: f64,
    pub assessments: usize,
}

/// Average time spent in one status
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StageDuration {
    pub status: RequestStatus,
    pub average_hours: f64,
    pub samples: usize,
}

/// Summary of the workflow over a window
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AnalyticsReport {
    pub range: DateRange,
    pub total_requests: usize,
    pub completed_requests: usize,
    /// Completed over total, 0 when there are no requests
    pub completion_rate: f64,
    pub average_completion_hours: Option<f64>,
    pub average_quality: Option<f64>,
    /// Share of approved requests with a deadline approved on time
    pub on_time_rate: Option<f64>,
    pub by_language: Vec<LanguageStats>,
    pub by_translator: Vec<TranslatorPerformance>,
    pub quality_trend: Vec<DailyQuality>,
    /// Slowest stage first
    pub bottlenecks: Vec<StageDuration>,
}

/// Running mean that never divides by zero
#[derive(Debug, Default, Clone, Copy)]
struct Mean {
    sum: f64,
    count: usize,
}

impl Mean {
    fn add(&mut self, value: f64) {
        self.sum += value;
        self.count += 1;
    }

    fn value(&self) -> Option<f64> {
        (self.count > 0).then(|| self.sum / self.count as f64)
    }
}

fn ratio(numerator: usize, denominator: usize) -> Option<f64> {
    (denominator > 0).then(|| numerator as f64 / denominator as f64)
}

/// Analytics over requests and their events
pub struct WorkflowAnalytics;

impl WorkflowAnalytics {
    /// Build the report for `range`
    ///
    /// `requests` are the requests created inside the window and `events`
    /// all of their events, whatever their timestamps.
    pub fn compute(
        range: DateRange,
        requests: &[TranslationRequest],
        events: &[WorkflowEvent],
    ) -> AnalyticsReport {
        let requests: Vec<&TranslationRequest> =
            requests.iter().filter(|r| range.contains(r.created_at)).collect();
        let approvals = approval_times(events);

        let on_time = |request: &TranslationRequest| -> Option<bool> {
            approvals
                .get(request.id.as_str())
                .and_then(|approved_at| request.delivered_on_time(*approved_at))
        };

        let mut completion_hours = Mean::default();
        let mut quality = Mean::default();
        let (mut on_time_count, mut deadline_count) = (0, 0);
        let mut completed = 0;

        let mut languages: BTreeMap<(String, String), (usize, usize, Mean, Mean)> = BTreeMap::new();
        let mut translators: BTreeMap<String, TranslatorAccumulator> = BTreeMap::new();
        let mut daily: BTreeMap<NaiveDate, Mean> = BTreeMap::new();

        for request in &requests {
            let is_completed = request.status().is_completed_or_later();
            let hours = request.workflow.actual_hours.filter(|_| is_completed);
            let score = request.quality.final_score;
            let delivered_on_time = on_time(request);

            let pair = languages
                .entry((request.source_language.clone(), request.target_language.clone()))
                .or_default();
            pair.0 += 1;

            if is_completed {
                completed += 1;
                pair.1 += 1;
            }
            if let Some(hours) = hours {
                completion_hours.add(hours);
                pair.3.add(hours);
            }
            if let Some(score) = score {
                quality.add(score);
                pair.2.add(score);
            }
            if let Some(on_time) = delivered_on_time {
                deadline_count += 1;
                if on_time {
                    on_time_count += 1;
                }
            }

            if let (true, Some(translator)) = (is_completed, request.workflow.assigned_translator.as_ref()) {
                let acc = translators
                    .entry(translator.id.clone())
                    .or_insert_with(|| TranslatorAccumulator::new(&translator.name));
                acc.completed += 1;
                if let Some(score) = score {
                    acc.quality.add(score);
                }
                if let Some(hours) = hours {
                    acc.words += request.source.word_count;
                    acc.hours += hours;
                }
                if let Some(on_time) = delivered_on_time {
                    acc.deadlines += 1;
                    if on_time {
                        acc.on_time += 1;
                    }
                }
            }

            for assessment in &request.quality.assessments {
                daily
                    .entry(assessment.assessed_at.date_naive())
                    .or_default()
                    .add(assessment.overall);
            }
        }

        let by_language = languages
            .into_iter()
            .map(|((source_language, target_language), (count, done, quality, hours))| LanguageStats {
                source_language,
                target_language,
                count,
                completed: done,
                average_quality: quality.value(),
                average_hours: hours.value(),
            })
            .collect();

        let by_translator = translators
            .into_iter()
            .map(|(translator_id, acc)| TranslatorPerformance {
                translator_id,
                translator_name: acc.name,
                completed: acc.completed,
                average_quality: acc.quality.value(),
                words_per_hour: (acc.hours > 0.0).then(|| acc.words as f64 / acc.hours),
                on_time_rate: ratio(acc.on_time, acc.deadlines),
            })
            .collect();

        let quality_trend = daily
            .into_iter()
            .filter_map(|(date, mean)| {
                mean.value().map(|average_quality| DailyQuality {
                    date,
                    average_quality,
                    assessments: mean.count,
                })
            })
            .collect();

        let request_ids: std::collections::HashSet<&str> =
            requests.iter().map(|r| r.id.as_str()).collect();
        let window_events: Vec<WorkflowEvent> = events
            .iter()
            .filter(|e| request_ids.contains(e.request_id.as_str()))
            .cloned()
            .collect();

        AnalyticsReport {
            range,
            total_requests: requests.len(),
            completed_requests: completed,
            completion_rate: ratio(completed, requests.len()).unwrap_or(0.0),
            average_completion_hours: completion_hours.value(),
            average_quality: quality.value(),
            on_time_rate: ratio(on_time_count, deadline_count),
            by_language,
            by_translator,
            quality_trend,
            bottlenecks: Self::stage_bottlenecks(&window_events),
        }
    }

    /// Average time per status, slowest first
    ///
    /// Events are grouped per request and taken in timestamp order (ties keep
    /// their input order). Requests with fewer than two status changes
    /// contribute nothing.
    pub fn stage_bottlenecks(events: &[WorkflowEvent]) -> Vec<StageDuration> {
        let mut per_request: HashMap<&str, Vec<&WorkflowEvent>> = HashMap::new();
        for event in events.iter().filter(|e| e.event_type == EventType::StatusChange) {
            per_request.entry(event.request_id.as_str()).or_default().push(event);
        }

        let mut stages: BTreeMap<RequestStatus, Mean> = BTreeMap::new();
        for changes in per_request.values_mut() {
            changes.sort_by_key(|e| e.timestamp);
            for pair in changes.windows(2) {
                let Some(status) = pair[0].new_status() else {
                    continue;
                };
                let millis = (pair[1].timestamp - pair[0].timestamp).num_milliseconds().max(0);
                stages.entry(status).or_default().add(millis as f64 / 3_600_000.0);
            }
        }

        let mut bottlenecks: Vec<StageDuration> = stages
            .into_iter()
            .filter_map(|(status, mean)| {
                mean.value().map(|average_hours| StageDuration {
                    status,
                    average_hours,
                    samples: mean.count,
                })
            })
            .collect();
        bottlenecks.sort_by(|a, b| b.average_hours.total_cmp(&a.average_hours));
        bottlenecks
    }
}

struct TranslatorAccumulator {
    name: String,
    completed: usize,
    quality: Mean,
    words: usize,
    hours: f64,
    on_time: usize,
    deadlines: usize,
}

impl TranslatorAccumulator {
    fn new(name: &str) -> Self {
        Self {
            name: name.to_string(),
            completed: 0,
            quality: Mean::default(),
            words: 0,
            hours: 0.0,
            on_time: 0,
            deadlines: 0,
        }
    }
}

/// Latest approval time of each request
fn approval_times(events: &[WorkflowEvent]) -> HashMap<&str, DateTime<Utc>> {
    let mut approvals: HashMap<&str, DateTime<Utc>> = HashMap::new();
    for event in events {
        if event.new_status() == Some(RequestStatus::Approved) {
            let latest = approvals.entry(event.request_id.as_str()).or_insert(event.timestamp);
            if event.timestamp > *latest {
                *latest = event.timestamp;
            }
        }
    }
    approvals
}
