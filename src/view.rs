// Derived view of the task collection

use crate::filter::TaskFilter;
use crate::task::Task;

/// What a presentation layer shows for a collection under a filter
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Projection {
    /// Tasks passing the filter, in collection order
    pub visible: Vec<Task>,
    /// Outstanding tasks in the whole collection, regardless of filter
    pub remaining_count: usize,
}

impl Projection {
    /// Nothing to show under this filter
    pub fn is_empty(&self) -> bool {
        self.visible.is_empty()
    }
}

pub fn project(tasks: &[Task], filter: TaskFilter) -> Projection {
    Projection {
        visible: tasks.iter().filter(|t| filter.matches(t)).cloned().collect(),
        remaining_count: remaining_count(tasks),
    }
}

pub fn remaining_count(tasks: &[Task]) -> usize {
    tasks.iter().filter(|t| t.is_outstanding()).count()
}
