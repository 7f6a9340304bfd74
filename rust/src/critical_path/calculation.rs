//! Critical path calculation using forward and backward passes.
//!
//! Both passes walk the dependency graph depth-first with an explicit work
//! stack over arena indices. A task is marked visited when it is first
//! entered; meeting a visited task that has not finished yet (a cycle)
//! does not recurse again: the forward pass falls back to that task's
//! literal start date, the backward pass to the project end.

use chrono::{NaiveDate, TimeDelta};

use crate::config::CriticalPathConfig;
use crate::interner::{TaskIdInterner, TaskIdx};
use crate::models::{Dependency, DependencyType, Task};
use crate::{log_changes, log_checks, log_debug};

use super::types::{CriticalPathError, CriticalPathResult, TaskTiming};

/// One side of a dependency, stored on the task at the other side.
#[derive(Clone, Copy, Debug)]
struct Edge {
    other: TaskIdx,
    dependency_type: DependencyType,
    lag_days: i64,
}

/// Tasks indexed once into flat vectors.
struct TaskGraph<'a> {
    index: TaskIdInterner,
    tasks: Vec<&'a Task>,
    durations: Vec<i64>,
    predecessors: Vec<Vec<Edge>>,
    successors: Vec<Vec<Edge>>,
}

impl<'a> TaskGraph<'a> {
    fn build(tasks: &'a [Task], dependencies: &[Dependency], verbosity: u8) -> Self {
        let mut index = TaskIdInterner::with_capacity(tasks.len());
        let mut slots: Vec<&'a Task> = Vec::with_capacity(tasks.len());

        for task in tasks {
            let (idx, added) = index.intern(&task.id);
            if added {
                slots.push(task);
            } else {
                log_checks!(verbosity, "Duplicate task id {}, keeping the later task", task.id);
                slots[idx as usize] = task;
            }
        }

        let n = slots.len();
        let durations = slots.iter().map(|t| t.duration_days()).collect();
        let mut predecessors: Vec<Vec<Edge>> = vec![Vec::new(); n];
        let mut successors: Vec<Vec<Edge>> = vec![Vec::new(); n];

        for dep in dependencies {
            let (Some(task_idx), Some(pred_idx)) =
                (index.get(&dep.task_id), index.get(&dep.depends_on_task_id))
            else {
                log_checks!(
                    verbosity,
                    "Skipping dangling dependency {} -> {}",
                    dep.depends_on_task_id,
                    dep.task_id
                );
                continue;
            };

            predecessors[task_idx as usize].push(Edge {
                other: pred_idx,
                dependency_type: dep.dependency_type,
                lag_days: dep.lag_days,
            });
            successors[pred_idx as usize].push(Edge {
                other: task_idx,
                dependency_type: dep.dependency_type,
                lag_days: dep.lag_days,
            });
        }

        Self {
            index,
            tasks: slots,
            durations,
            predecessors,
            successors,
        }
    }

    fn len(&self) -> usize {
        self.index.len()
    }

    fn name(&self, idx: usize) -> &str {
        self.index.resolve(idx as TaskIdx).unwrap_or("?")
    }
}

/// In-progress task on the traversal stack.
struct Frame {
    task: usize,
    next_edge: usize,
    /// Running max (forward) or min (backward) of the constraint dates.
    bound: Option<NaiveDate>,
}

enum Step {
    Descend(usize),
    Advance,
    Finish,
}

fn shift(date: NaiveDate, days: i64) -> Option<NaiveDate> {
    TimeDelta::try_days(days).and_then(|delta| date.checked_add_signed(delta))
}

fn shift_back(date: NaiveDate, days: i64) -> Option<NaiveDate> {
    TimeDelta::try_days(days).and_then(|delta| date.checked_sub_signed(delta))
}

fn out_of_range(graph: &TaskGraph<'_>, idx: usize) -> CriticalPathError {
    CriticalPathError::DateOutOfRange {
        task_id: graph.name(idx).to_string(),
    }
}

/// Earliest start and finish for every task.
///
/// ES starts at the task's own start date and is raised by each
/// predecessor's constraint: its literal start for start-to-start links,
/// its EF for every other link type, shifted by the lag.
fn forward_pass(
    graph: &TaskGraph<'_>,
    verbosity: u8,
) -> Result<(Vec<NaiveDate>, Vec<NaiveDate>), CriticalPathError> {
    let n = graph.len();
    let mut earliest_start: Vec<NaiveDate> = graph.tasks.iter().map(|t| t.start_date).collect();
    let mut earliest_finish: Vec<NaiveDate> = graph.tasks.iter().map(|t| t.end_date).collect();
    let mut visited = vec![false; n];
    let mut done = vec![false; n];
    let mut stack: Vec<Frame> = Vec::new();

    for root in 0..n {
        if visited[root] {
            continue;
        }
        visited[root] = true;
        stack.push(Frame {
            task: root,
            next_edge: 0,
            bound: Some(graph.tasks[root].start_date),
        });

        while let Some(frame) = stack.last_mut() {
            let step = match graph.predecessors[frame.task].get(frame.next_edge) {
                Some(edge) if !visited[edge.other as usize] => Step::Descend(edge.other as usize),
                Some(edge) => {
                    let pred = edge.other as usize;
                    let pred_start = graph.tasks[pred].start_date;
                    let driving = match edge.dependency_type {
                        DependencyType::StartToStart => pred_start,
                        DependencyType::FinishToStart
                        | DependencyType::FinishToFinish
                        | DependencyType::StartToFinish => {
                            if done[pred] {
                                earliest_finish[pred]
                            } else {
                                log_debug!(
                                    verbosity,
                                    "Cycle through {} while computing {}, using its start date",
                                    graph.name(pred),
                                    graph.name(frame.task)
                                );
                                pred_start
                            }
                        }
                    };
                    let constraint = shift(driving, edge.lag_days)
                        .ok_or_else(|| out_of_range(graph, frame.task))?;
                    frame.bound = frame.bound.max(Some(constraint));
                    Step::Advance
                }
                None => Step::Finish,
            };

            match step {
                Step::Descend(pred) => {
                    visited[pred] = true;
                    stack.push(Frame {
                        task: pred,
                        next_edge: 0,
                        bound: Some(graph.tasks[pred].start_date),
                    });
                }
                Step::Advance => frame.next_edge += 1,
                Step::Finish => {
                    let idx = frame.task;
                    let es = frame.bound.unwrap_or(graph.tasks[idx].start_date);
                    let ef = shift(es, graph.durations[idx])
                        .ok_or_else(|| out_of_range(graph, idx))?;
                    earliest_start[idx] = es;
                    earliest_finish[idx] = ef;
                    done[idx] = true;
                    log_debug!(verbosity, "{}: ES={} EF={}", graph.name(idx), es, ef);
                    stack.pop();
                }
            }
        }
    }

    Ok((earliest_start, earliest_finish))
}

/// Latest start and finish for every task.
///
/// LF is the minimum over successors of their LS minus the lag. Tasks
/// without successors finish at the project end.
fn backward_pass(
    graph: &TaskGraph<'_>,
    project_end: NaiveDate,
    verbosity: u8,
) -> Result<(Vec<NaiveDate>, Vec<NaiveDate>), CriticalPathError> {
    let n = graph.len();
    let mut latest_start: Vec<NaiveDate> = vec![project_end; n];
    let mut latest_finish: Vec<NaiveDate> = vec![project_end; n];
    let mut visited = vec![false; n];
    let mut done = vec![false; n];
    let mut stack: Vec<Frame> = Vec::new();

    for root in 0..n {
        if visited[root] {
            continue;
        }
        visited[root] = true;
        stack.push(Frame {
            task: root,
            next_edge: 0,
            bound: None,
        });

        while let Some(frame) = stack.last_mut() {
            let step = match graph.successors[frame.task].get(frame.next_edge) {
                Some(edge) if !visited[edge.other as usize] => Step::Descend(edge.other as usize),
                Some(edge) => {
                    let succ = edge.other as usize;
                    let succ_start = if done[succ] {
                        latest_start[succ]
                    } else {
                        log_debug!(
                            verbosity,
                            "Cycle through {} while computing {}, using project end",
                            graph.name(succ),
                            graph.name(frame.task)
                        );
                        shift_back(project_end, graph.durations[succ])
                            .ok_or_else(|| out_of_range(graph, succ))?
                    };
                    let required_finish = shift_back(succ_start, edge.lag_days)
                        .ok_or_else(|| out_of_range(graph, frame.task))?;
                    frame.bound = Some(match frame.bound {
                        Some(bound) => bound.min(required_finish),
                        None => required_finish,
                    });
                    Step::Advance
                }
                None => Step::Finish,
            };

            match step {
                Step::Descend(succ) => {
                    visited[succ] = true;
                    stack.push(Frame {
                        task: succ,
                        next_edge: 0,
                        bound: None,
                    });
                }
                Step::Advance => frame.next_edge += 1,
                Step::Finish => {
                    let idx = frame.task;
                    let lf = frame.bound.unwrap_or(project_end);
                    let ls = shift_back(lf, graph.durations[idx])
                        .ok_or_else(|| out_of_range(graph, idx))?;
                    latest_finish[idx] = lf;
                    latest_start[idx] = ls;
                    done[idx] = true;
                    log_debug!(verbosity, "{}: LS={} LF={}", graph.name(idx), ls, lf);
                    stack.pop();
                }
            }
        }
    }

    Ok((latest_start, latest_finish))
}

fn validate_durations(tasks: &[Task]) -> Result<(), CriticalPathError> {
    match tasks.iter().find(|t| t.end_date < t.start_date) {
        Some(task) => Err(CriticalPathError::InvalidTaskDuration {
            task_id: task.id.clone(),
            start_date: task.start_date,
            end_date: task.end_date,
        }),
        None => Ok(()),
    }
}

/// Compute slack and the critical task set for a project network.
///
/// # Arguments
/// * `tasks` - Tasks with fixed start/end dates
/// * `dependencies` - Typed, lagged links between tasks; links naming unknown tasks are ignored
/// * `config` - Verbosity and input validation switches
///
/// # Returns
/// * `Ok(CriticalPathResult)` with per-task slack, the critical set and the overall span in days
/// * `Err(CriticalPathError::InvalidTaskDuration)` if validation is enabled and a task ends before it starts
/// * `Err(CriticalPathError::DateOutOfRange)` if a lag moves a date outside chrono's calendar
pub fn compute_critical_path(
    tasks: &[Task],
    dependencies: &[Dependency],
    config: &CriticalPathConfig,
) -> Result<CriticalPathResult, CriticalPathError> {
    if tasks.is_empty() {
        return Ok(CriticalPathResult::default());
    }
    if config.validate_durations {
        validate_durations(tasks)?;
    }

    let verbosity = config.verbosity;
    let graph = TaskGraph::build(tasks, dependencies, verbosity);

    // Forward pass must be complete before LF can be seeded with the project end.
    let (earliest_start, earliest_finish) = forward_pass(&graph, verbosity)?;
    let project_end = earliest_finish
        .iter()
        .copied()
        .max()
        .unwrap_or(graph.tasks[0].end_date);
    let project_start = earliest_start
        .iter()
        .copied()
        .min()
        .unwrap_or(graph.tasks[0].start_date);

    let (latest_start, latest_finish) = backward_pass(&graph, project_end, verbosity)?;

    let mut result = CriticalPathResult {
        duration: (project_end - project_start).num_days(),
        project_start: Some(project_start),
        project_end: Some(project_end),
        ..Default::default()
    };

    for (idx, id) in graph.index.iter() {
        let i = idx as usize;
        let timing = TaskTiming {
            earliest_start: earliest_start[i],
            earliest_finish: earliest_finish[i],
            latest_start: latest_start[i],
            latest_finish: latest_finish[i],
            slack: (latest_start[i] - earliest_start[i]).num_days(),
        };
        if timing.is_critical() {
            result.critical_task_ids.insert(id.to_string());
        }
        result.slack.insert(id.to_string(), timing.slack);
        result.task_timings.insert(id.to_string(), timing);
    }

    log_changes!(
        verbosity,
        "Critical path: {} of {} tasks critical, {} days ({} to {})",
        result.critical_task_ids.len(),
        graph.len(),
        result.duration,
        project_start,
        project_end
    );

    Ok(result)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn day(offset: i64) -> NaiveDate {
        NaiveDate::from_ymd_opt(2025, 1, 1).unwrap() + TimeDelta::days(offset)
    }

    fn make_task(id: &str, start: i64, end: i64) -> Task {
        Task {
            id: id.to_string(),
            start_date: day(start),
            end_date: day(end),
            status: "not_started".to_string(),
            progress: None,
        }
    }

    fn fs(task_id: &str, depends_on: &str, lag: i64) -> Dependency {
        Dependency::finish_to_start(task_id, depends_on, lag)
    }

    fn typed(task_id: &str, depends_on: &str, dependency_type: DependencyType, lag: i64) -> Dependency {
        Dependency {
            task_id: task_id.to_string(),
            depends_on_task_id: depends_on.to_string(),
            dependency_type,
            lag_days: lag,
        }
    }

    fn run(tasks: &[Task], deps: &[Dependency]) -> CriticalPathResult {
        compute_critical_path(tasks, deps, &CriticalPathConfig::default()).unwrap()
    }

    #[test]
    fn test_empty_task_list() {
        let result = run(&[], &[fs("a", "b", 0)]);
        assert!(result.critical_task_ids.is_empty());
        assert!(result.slack.is_empty());
        assert_eq!(result.duration, 0);
        assert_eq!(result.project_end, None);
    }

    #[test]
    fn test_chain_all_critical() {
        // a (0-2) -> b (2-5) -> c (5-7)
        let tasks = vec![make_task("a", 0, 2), make_task("b", 2, 5), make_task("c", 5, 7)];
        let deps = vec![fs("b", "a", 0), fs("c", "b", 0)];

        let result = run(&tasks, &deps);

        assert_eq!(result.duration, 7);
        for id in ["a", "b", "c"] {
            assert_eq!(result.slack_for(id), Some(0), "slack of {id}");
            assert!(result.is_critical(id));
        }
        assert_eq!(result.project_end, Some(day(7)));
    }

    #[test]
    fn test_reconverging_chains() {
        // short: a (0-2) -> d
        // long:  b (0-3) -> c (3-6) -> d (6-8)
        let tasks = vec![
            make_task("a", 0, 2),
            make_task("b", 0, 3),
            make_task("c", 3, 6),
            make_task("d", 6, 8),
        ];
        let deps = vec![fs("d", "a", 0), fs("c", "b", 0), fs("d", "c", 0)];

        let result = run(&tasks, &deps);

        assert_eq!(result.task_timings["d"].earliest_start, day(6));
        assert_eq!(result.slack_for("a"), Some(4));
        assert!(!result.is_critical("a"));
        for id in ["b", "c", "d"] {
            assert!(result.is_critical(id), "{id} should be critical");
        }
        assert_eq!(result.duration, 8);
    }

    #[test]
    fn test_longer_chain_drives_successor_start() {
        // Successor's literal start is early; the predecessors push it out.
        let tasks = vec![
            make_task("a", 0, 2),
            make_task("b", 0, 5),
            make_task("c", 0, 1),
        ];
        let deps = vec![fs("c", "a", 0), fs("c", "b", 0)];

        let result = run(&tasks, &deps);

        let c = &result.task_timings["c"];
        assert_eq!(c.earliest_start, day(5));
        assert_eq!(c.earliest_finish, day(6));
        assert_eq!(result.slack_for("a"), Some(3));
        assert!(result.is_critical("b"));
        assert!(result.is_critical("c"));
    }

    #[test]
    fn test_negative_lag_pulls_successor_earlier() {
        let tasks = vec![make_task("a", 0, 4), make_task("b", 0, 3)];

        let no_lag = run(&tasks, &[fs("b", "a", 0)]);
        let lead = run(&tasks, &[fs("b", "a", -2)]);

        assert_eq!(no_lag.task_timings["b"].earliest_start, day(4));
        assert_eq!(lead.task_timings["b"].earliest_start, day(2));
    }

    #[test]
    fn test_positive_lag_extends_project() {
        let tasks = vec![make_task("a", 0, 2), make_task("b", 0, 1)];
        let result = run(&tasks, &[fs("b", "a", 3)]);

        assert_eq!(result.task_timings["b"].earliest_start, day(5));
        assert_eq!(result.duration, 6);
        assert!(result.is_critical("a"));
        assert!(result.is_critical("b"));
    }

    #[test]
    fn test_start_to_start_uses_predecessor_start() {
        let tasks = vec![make_task("a", 0, 5), make_task("b", 0, 2)];
        let result = run(
            &tasks,
            &[typed("b", "a", DependencyType::StartToStart, 1)],
        );

        assert_eq!(result.task_timings["b"].earliest_start, day(1));
        assert_eq!(result.task_timings["b"].earliest_finish, day(3));
    }

    #[test]
    fn test_start_to_start_ignores_pushed_predecessor_start() {
        // b is pushed to day 2 by a, but c keys off b's planned start.
        let tasks = vec![make_task("a", 0, 2), make_task("b", 0, 3), make_task("c", 0, 1)];
        let deps = vec![
            fs("b", "a", 0),
            typed("c", "b", DependencyType::StartToStart, 0),
        ];

        let result = run(&tasks, &deps);

        assert_eq!(result.task_timings["b"].earliest_start, day(2));
        assert_eq!(result.task_timings["c"].earliest_start, day(0));
    }

    #[test]
    fn test_finish_types_share_finish_to_start_rule() {
        let tasks = vec![make_task("a", 0, 5), make_task("b", 0, 2)];
        for dependency_type in [
            DependencyType::FinishToStart,
            DependencyType::FinishToFinish,
            DependencyType::StartToFinish,
        ] {
            let result = run(&tasks, &[typed("b", "a", dependency_type, 0)]);
            assert_eq!(
                result.task_timings["b"].earliest_start,
                day(5),
                "{dependency_type}"
            );
        }
    }

    #[test]
    fn test_negative_slack_is_critical() {
        // Start-to-start lets b finish well before a, but the backward pass
        // pins a's finish to b's latest start.
        let tasks = vec![make_task("a", 0, 4), make_task("b", 0, 1)];
        let result = run(
            &tasks,
            &[typed("b", "a", DependencyType::StartToStart, 0)],
        );

        assert_eq!(result.slack_for("a"), Some(-1));
        assert!(result.is_critical("a"));
        assert_eq!(result.slack_for("b"), Some(3));
        assert!(!result.is_critical("b"));
    }

    #[test]
    fn test_literal_start_is_floor_for_es() {
        // b is planned later than a's finish; ES keeps the planned start.
        let tasks = vec![make_task("a", 0, 2), make_task("b", 10, 12)];
        let result = run(&tasks, &[fs("b", "a", 0)]);

        assert_eq!(result.task_timings["b"].earliest_start, day(10));
        assert_eq!(result.slack_for("a"), Some(8));
        assert_eq!(result.duration, 12);
    }

    #[test]
    fn test_duration_spans_from_earliest_start() {
        let tasks = vec![make_task("a", 3, 5), make_task("b", 7, 9)];
        let result = run(&tasks, &[]);

        assert_eq!(result.project_start, Some(day(3)));
        assert_eq!(result.duration, 6);
        assert!(result.is_critical("b"));
        assert_eq!(result.slack_for("a"), Some(4));
    }

    #[test]
    fn test_dangling_dependency_ignored() {
        let tasks = vec![make_task("a", 2, 4)];
        let deps = vec![fs("a", "ghost", 5), fs("ghost", "a", 0)];

        let result = run(&tasks, &deps);

        assert_eq!(result.task_timings["a"].earliest_start, day(2));
        assert!(!result.slack.contains_key("ghost"));
        assert_eq!(result.slack_for("a"), Some(0));
        assert_eq!(result.duration, 2);
    }

    #[test]
    fn test_two_task_cycle_terminates() {
        let tasks = vec![make_task("a", 0, 2), make_task("b", 1, 4)];
        let deps = vec![fs("b", "a", 0), fs("a", "b", 0)];

        let result = run(&tasks, &deps);

        // Entering at a: b sees a in progress and uses a's start (day 0),
        // so its own start (day 1) holds.
        assert_eq!(result.task_timings["b"].earliest_start, day(1));
        assert_eq!(result.task_timings["a"].earliest_start, day(4));
        assert_eq!(result.slack.len(), 2);
    }

    #[test]
    fn test_self_dependency_terminates() {
        let tasks = vec![make_task("a", 0, 2)];
        let result = run(&tasks, &[fs("a", "a", 0)]);

        assert_eq!(result.task_timings["a"].earliest_start, day(0));
        assert_eq!(result.task_timings["a"].earliest_finish, day(2));
    }

    #[test]
    fn test_negative_lag_latest_finish_not_capped_at_project_end() {
        // b may start 5 days before a finishes, so a can finish as late as
        // b's latest start plus 5: day 6, past the project end (day 2).
        let tasks = vec![make_task("a", 0, 2), make_task("b", 0, 1)];
        let result = run(&tasks, &[fs("b", "a", -5)]);

        assert_eq!(result.project_end, Some(day(2)));
        assert_eq!(result.task_timings["b"].latest_start, day(1));
        assert_eq!(result.task_timings["a"].latest_finish, day(6));
        assert_eq!(result.slack_for("a"), Some(4));
        assert!(!result.is_critical("a"));
    }

    #[test]
    fn test_huge_lag_is_an_error() {
        let tasks = vec![make_task("a", 0, 2), make_task("b", 0, 1)];
        for lag in [100_000_000, -100_000_000, i64::MAX, i64::MIN] {
            let deps = [fs("b", "a", lag)];
            let err = compute_critical_path(&tasks, &deps, &CriticalPathConfig::default())
                .unwrap_err();
            assert_eq!(
                err,
                CriticalPathError::DateOutOfRange {
                    task_id: "b".to_string()
                },
                "lag {lag}"
            );
        }
    }

    #[test]
    fn test_long_chain_does_not_overflow_stack() {
        let n = 50_000;
        let tasks: Vec<Task> = (0..n)
            .map(|i| make_task(&format!("t{i}"), 0, 1))
            .collect();
        let deps: Vec<Dependency> = (1..n)
            .map(|i| fs(&format!("t{i}"), &format!("t{}", i - 1), 0))
            .collect();

        let result = run(&tasks, &deps);

        assert_eq!(result.duration, n);
        assert_eq!(result.critical_task_ids.len(), n as usize);
    }

    #[test]
    fn test_invalid_duration_rejected() {
        let tasks = vec![make_task("a", 0, 2), make_task("b", 5, 3)];
        let err = compute_critical_path(&tasks, &[], &CriticalPathConfig::default()).unwrap_err();

        assert_eq!(
            err,
            CriticalPathError::InvalidTaskDuration {
                task_id: "b".to_string(),
                start_date: day(5),
                end_date: day(3),
            }
        );
    }

    #[test]
    fn test_invalid_duration_allowed_when_validation_disabled() {
        let tasks = vec![make_task("a", 5, 3)];
        let config = CriticalPathConfig {
            validate_durations: false,
            ..Default::default()
        };
        let result = compute_critical_path(&tasks, &[], &config).unwrap();

        assert_eq!(result.task_timings["a"].earliest_finish, day(3));
    }

    #[test]
    fn test_duplicate_task_id_later_wins() {
        let tasks = vec![make_task("a", 0, 2), make_task("a", 0, 6)];
        let result = run(&tasks, &[]);

        assert_eq!(result.slack.len(), 1);
        assert_eq!(result.task_timings["a"].earliest_finish, day(6));
    }
}
