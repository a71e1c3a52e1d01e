use std::cmp::Reverse;
use std::collections::BinaryHeap;

use util::{HashMap, HashSet, IdVec};

use crate::{Error, Task, TaskId};

/// All tasks registered for one pipeline run, in insertion order, plus the
/// names the resume check marked as satisfied without a runnable task.
#[derive(Debug)]
pub struct TaskGraph {
    tasks: IdVec<TaskId, Task>,
    ids: HashMap<String, TaskId>,
    satisfied: HashSet<String>,
}

impl Default for TaskGraph {
    fn default() -> Self {
        Self::with_capacity(0)
    }
}

impl TaskGraph {
    pub fn with_capacity(cap: usize) -> Self {
        Self {
            tasks: IdVec::with_capacity(cap),
            ids: HashMap::default(),
            satisfied: HashSet::default(),
        }
    }

    /// Number of runnable tasks (satisfied names are not counted).
    pub fn len(&self) -> usize {
        self.tasks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tasks.is_empty()
    }

    /// Record a name whose output already exists; it is a valid dependency
    /// target but will never be scheduled.
    pub fn mark_satisfied(&mut self, name: String) {
        log::debug!("marking task {name} as satisfied by existing output");
        self.satisfied.insert(name);
    }

    pub fn is_satisfied(&self, name: &str) -> bool {
        self.satisfied.contains(name)
    }

    pub fn satisfied_count(&self) -> usize {
        self.satisfied.len()
    }

    /// Register a task. Every dependency must already be registered or
    /// marked satisfied; anything else is a stage-expansion bug.
    pub fn add_task(&mut self, task: Task) -> Result<TaskId, Error> {
        if self.ids.contains_key(&task.name) || self.satisfied.contains(&task.name) {
            return Err(Error::DuplicateTask(task.name));
        }
        for dep in &task.deps {
            if !self.ids.contains_key(dep) && !self.satisfied.contains(dep) {
                return Err(Error::UnknownDependency {
                    task: task.name.clone(),
                    dep: dep.clone(),
                });
            }
        }

        let name = task.name.clone();
        let id = self.tasks.push(task);
        self.ids.insert(name, id);
        Ok(id)
    }

    pub fn get(&self, id: TaskId) -> &Task {
        self.tasks.get(id)
    }

    /// Id of a runnable task, or None if the name is satisfied or unknown.
    pub fn id_of(&self, name: &str) -> Option<TaskId> {
        self.ids.get(name).copied()
    }

    pub fn iter(&self) -> impl Iterator<Item = (TaskId, &Task)> {
        self.tasks.iter().enumerate().map(|(i, t)| (TaskId::from(i), t))
    }

    /// Dependencies of `id` that are runnable tasks in this graph
    /// (satisfied names are filtered out).
    pub fn runnable_deps(&self, id: TaskId) -> Vec<TaskId> {
        self.tasks
            .get(id)
            .deps
            .iter()
            .filter_map(|dep| self.id_of(dep))
            .collect()
    }

    /// Submission order: every dependency strictly precedes its dependents,
    /// ties broken by insertion order so runs and tests are deterministic.
    pub fn topo_order(&self) -> Result<Vec<TaskId>, Error> {
        let len = self.tasks.len();
        let mut indegree = vec![0usize; len];
        let mut dependents: Vec<Vec<usize>> = vec![Vec::new(); len];

        for (id, task) in self.iter() {
            let idx = usize::from(id);
            for dep in &task.deps {
                if let Some(dep_id) = self.id_of(dep) {
                    indegree[idx] += 1;
                    dependents[usize::from(dep_id)].push(idx);
                }
            }
        }

        let mut ready = BinaryHeap::with_capacity(len);
        for (idx, deg) in indegree.iter().enumerate() {
            if *deg == 0 {
                ready.push(Reverse(idx));
            }
        }

        let mut order = Vec::with_capacity(len);
        while let Some(Reverse(idx)) = ready.pop() {
            order.push(TaskId::from(idx));
            for &dependent in &dependents[idx] {
                indegree[dependent] -= 1;
                if indegree[dependent] == 0 {
                    ready.push(Reverse(dependent));
                }
            }
        }

        if order.len() < len {
            // registration requires deps to pre-exist, so this means the
            // graph was corrupted, not that a user can trigger it.
            let culprit = indegree
                .iter()
                .position(|deg| *deg > 0)
                .map(|idx| self.tasks.get(TaskId::from(idx)).name.clone())
                .unwrap_or_default();
            return Err(Error::DependencyCycle(culprit));
        }

        Ok(order)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ResourceRequest;

    fn task(name: &str, deps: &[&str]) -> Task {
        Task {
            name: name.to_owned(),
            command: format!("echo {name}"),
            resources: ResourceRequest::new(1, 768),
            deps: deps.iter().map(|d| (*d).to_owned()).collect(),
            outputs: Vec::new(),
        }
    }

    #[test]
    fn test_unknown_dependency_rejected() {
        let mut g = TaskGraph::default();
        let err = g.add_task(task("count_0", &["subset_0"])).unwrap_err();
        assert!(matches!(err, Error::UnknownDependency { .. }));
    }

    #[test]
    fn test_duplicate_name_rejected() {
        let mut g = TaskGraph::default();
        g.add_task(task("subset_0", &[])).unwrap();
        let err = g.add_task(task("subset_0", &[])).unwrap_err();
        assert!(matches!(err, Error::DuplicateTask(_)));
    }

    #[test]
    fn test_satisfied_name_is_valid_dependency() {
        let mut g = TaskGraph::default();
        g.mark_satisfied("subset_0".to_owned());
        let id = g.add_task(task("count_0", &["subset_0"])).unwrap();
        // the satisfied dep is not a runnable dep:
        assert!(g.runnable_deps(id).is_empty());
        assert_eq!(g.len(), 1);
        assert_eq!(g.satisfied_count(), 1);
    }

    #[test]
    fn test_satisfied_name_cannot_be_reregistered() {
        let mut g = TaskGraph::default();
        g.mark_satisfied("subset_0".to_owned());
        let err = g.add_task(task("subset_0", &[])).unwrap_err();
        assert!(matches!(err, Error::DuplicateTask(_)));
    }

    #[test]
    fn test_topo_order_respects_edges() {
        let mut g = TaskGraph::default();
        g.add_task(task("subset_0", &[])).unwrap();
        g.add_task(task("subset_1", &[])).unwrap();
        g.add_task(task("count_0", &["subset_0"])).unwrap();
        g.add_task(task("count_1", &["subset_1"])).unwrap();
        g.add_task(task("compare_0", &["count_0", "count_1"])).unwrap();

        let order = g.topo_order().unwrap();
        let pos = |name: &str| {
            order
                .iter()
                .position(|id| g.get(*id).name == name)
                .unwrap()
        };
        for (dependent, dep) in [
            ("count_0", "subset_0"),
            ("count_1", "subset_1"),
            ("compare_0", "count_0"),
            ("compare_0", "count_1"),
        ] {
            assert!(pos(dep) < pos(dependent), "{dep} before {dependent}");
        }
    }

    #[test]
    fn test_topo_order_ties_broken_by_insertion() {
        let mut g = TaskGraph::default();
        g.add_task(task("subset_0", &[])).unwrap();
        g.add_task(task("subset_1", &[])).unwrap();
        g.add_task(task("subset_2", &[])).unwrap();

        let order = g.topo_order().unwrap();
        let names: Vec<&str> = order.iter().map(|id| g.get(*id).name.as_str()).collect();
        assert_eq!(names, ["subset_0", "subset_1", "subset_2"]);
    }
}
