// Interactive session over a task store
//
// Holds the state a front end needs on top of the store: which task is being
// edited, plus the confirmation and notification collaborators. The store
// itself never prompts and never produces display text.

use crate::error::StoreError;
use crate::filter::TaskFilter;
use crate::storage::SnapshotStorage;
use crate::store::TaskStore;
use crate::task::{Task, TaskId};
use tracing::{debug, warn};

pub const MSG_ADDED: &str = "Task added successfully!";
pub const MSG_ADD_EMPTY: &str = "Please enter a task before adding!";
pub const MSG_EDIT_EMPTY: &str = "Task cannot be empty!";
pub const MSG_UPDATED: &str = "Task updated successfully!";
pub const MSG_REMOVED: &str = "Task removed successfully!";
pub const MSG_REMOVE_CANCELED: &str = "Task removal canceled!";
pub const MSG_NOTHING_TO_CLEAR: &str = "No tasks to clear in this section!";
pub const MSG_CLEARED: &str = "Tasks cleared successfully!";
pub const MSG_CLEAR_CANCELED: &str = "Task clearing canceled!";
pub const MSG_COMPLETED: &str = "Task marked as completed!";
pub const MSG_INCOMPLETE: &str = "Task marked as incomplete!";
pub const MSG_NOT_FOUND: &str = "Task not found!";
pub const MSG_FINISH_EDITING: &str = "Finish editing the current task first!";

pub const PROMPT_REMOVE: &str = "Are you sure you want to delete this task?";
pub const PROMPT_CLEAR: &str = "Are you sure you want to clear these tasks?";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Level {
    Success,
    /// Nothing happened, but nothing went wrong either
    Notice,
    Failure,
}

/// A message for the user about the outcome of an action
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Notification {
    pub level: Level,
    pub message: String,
}

impl Notification {
    pub fn success<M: Into<String>>(message: M) -> Self {
        Self {
            level: Level::Success,
            message: message.into(),
        }
    }

    pub fn notice<M: Into<String>>(message: M) -> Self {
        Self {
            level: Level::Notice,
            message: message.into(),
        }
    }

    pub fn failure<M: Into<String>>(message: M) -> Self {
        Self {
            level: Level::Failure,
            message: message.into(),
        }
    }
}

/// Asks the user to confirm a destructive action
pub trait Confirm {
    fn confirm(&mut self, prompt: &str) -> bool;
}

impl<F: FnMut(&str) -> bool> Confirm for F {
    fn confirm(&mut self, prompt: &str) -> bool {
        self(prompt)
    }
}

/// Shows notifications to the user
pub trait Notify {
    fn notify(&mut self, notification: Notification);
}

impl Notify for Vec<Notification> {
    fn notify(&mut self, notification: Notification) {
        self.push(notification);
    }
}

/// One row of the rendered list
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ViewRow {
    Displayed(Task),
    Editing { task: Task, pending_name: String },
}

impl ViewRow {
    pub fn task(&self) -> &Task {
        match self {
            ViewRow::Displayed(task) => task,
            ViewRow::Editing { task, .. } => task,
        }
    }
}

#[derive(Debug, Clone)]
struct Draft {
    id: TaskId,
    pending_name: String,
}

pub struct Session<S: SnapshotStorage, C: Confirm, N: Notify> {
    store: TaskStore<S>,
    draft: Option<Draft>,
    confirm: C,
    notify: N,
}

impl<S: SnapshotStorage, C: Confirm, N: Notify> Session<S, C, N> {
    pub fn new(store: TaskStore<S>, confirm: C, notify: N) -> Self {
        Self {
            store,
            draft: None,
            confirm,
            notify,
        }
    }

    pub fn store(&self) -> &TaskStore<S> {
        &self.store
    }

    pub fn notifier(&self) -> &N {
        &self.notify
    }

    pub fn into_store(self) -> TaskStore<S> {
        self.store
    }

    /// Id of the task being edited, if any
    pub fn editing(&self) -> Option<TaskId> {
        self.draft.as_ref().map(|d| d.id)
    }

    pub fn filter(&self) -> TaskFilter {
        self.store.filter()
    }

    pub fn remaining(&self) -> usize {
        self.store.view().remaining_count
    }

    /// Rows visible under the current filter, with the draft shown in place
    pub fn rows(&self) -> Vec<ViewRow> {
        self.store
            .view()
            .visible
            .into_iter()
            .map(|task| match &self.draft {
                Some(draft) if draft.id == task.id => ViewRow::Editing {
                    task,
                    pending_name: draft.pending_name.clone(),
                },
                _ => ViewRow::Displayed(task),
            })
            .collect()
    }

    pub fn add(&mut self, raw_name: &str) -> Option<Task> {
        if self.refuse_while_editing() {
            return None;
        }

        match self.store.add_task(raw_name) {
            Ok(task) => {
                self.success(MSG_ADDED);
                Some(task)
            }
            Err(StoreError::Validation(ref msg)) if msg == "empty task" => {
                self.failure(MSG_ADD_EMPTY);
                None
            }
            Err(e) => {
                self.report(e);
                None
            }
        }
    }

    /// Enter edit mode for `id`, seeding the draft with its current name
    pub fn begin_edit(&mut self, id: TaskId) -> bool {
        if let Some(current) = self.editing() {
            if current == id {
                return true;
            }
            self.failure(MSG_FINISH_EDITING);
            return false;
        }

        let Some(task) = self.store.get(id) else {
            self.failure(MSG_NOT_FOUND);
            return false;
        };

        debug!(id, "begin_edit");
        self.draft = Some(Draft {
            id,
            pending_name: task.name.clone(),
        });
        true
    }

    /// Replace the pending name; ignored when not editing
    pub fn update_draft(&mut self, pending_name: &str) {
        if let Some(draft) = self.draft.as_mut() {
            draft.pending_name = pending_name.to_string();
        }
    }

    /// Commit the draft; an empty name keeps edit mode open
    pub fn save_edit(&mut self) -> Option<Task> {
        let draft = self.draft.clone()?;

        match self.store.edit_task(draft.id, &draft.pending_name) {
            Ok(task) => {
                self.draft = None;
                self.success(MSG_UPDATED);
                Some(task)
            }
            Err(StoreError::Validation(ref msg)) if msg == "empty task" => {
                self.failure(MSG_EDIT_EMPTY);
                None
            }
            Err(StoreError::Validation(msg)) => {
                self.failure(msg);
                None
            }
            Err(e) => {
                // The rename is applied in memory even when saving fails
                self.draft = None;
                self.report(e);
                None
            }
        }
    }

    pub fn cancel_edit(&mut self) {
        if let Some(draft) = self.draft.take() {
            debug!(id = draft.id, "cancel_edit");
        }
    }

    pub fn toggle(&mut self, id: TaskId) -> Option<bool> {
        match self.store.toggle_complete(id) {
            Ok(completed) => {
                self.success(if completed { MSG_COMPLETED } else { MSG_INCOMPLETE });
                Some(completed)
            }
            Err(e) => {
                self.report(e);
                None
            }
        }
    }

    /// Remove a task after the user confirms
    pub fn remove(&mut self, id: TaskId) -> bool {
        if self.refuse_while_editing() {
            return false;
        }

        if !self.confirm.confirm(PROMPT_REMOVE) {
            self.failure(MSG_REMOVE_CANCELED);
            return false;
        }

        match self.store.remove_task(id) {
            Ok(true) => {
                self.success(MSG_REMOVED);
                true
            }
            Ok(false) => {
                self.failure(MSG_NOT_FOUND);
                false
            }
            Err(e) => {
                self.report(e);
                false
            }
        }
    }

    /// Clear the tasks under the current filter after the user confirms
    ///
    /// An empty section is reported before any prompt is shown.
    pub fn clear(&mut self) -> usize {
        if self.refuse_while_editing() {
            return 0;
        }

        let filter = self.store.filter();
        if self.store.view().is_empty() {
            self.notice(MSG_NOTHING_TO_CLEAR);
            return 0;
        }

        if !self.confirm.confirm(PROMPT_CLEAR) {
            self.failure(MSG_CLEAR_CANCELED);
            return 0;
        }

        match self.store.clear(filter) {
            Ok(removed) => {
                self.success(MSG_CLEARED);
                removed
            }
            Err(e) => {
                self.report(e);
                0
            }
        }
    }

    /// Switch filter; refused while a draft is open
    pub fn set_filter(&mut self, filter: TaskFilter) -> bool {
        if self.refuse_while_editing() {
            return false;
        }
        self.store.set_filter(filter);
        true
    }

    fn refuse_while_editing(&mut self) -> bool {
        if self.draft.is_some() {
            self.failure(MSG_FINISH_EDITING);
            return true;
        }
        false
    }

    fn report(&mut self, err: StoreError) {
        if err.is_fault() {
            warn!(code = err.code(), error = %err, "Task operation failed");
        } else {
            debug!(code = err.code(), error = %err, "Task operation rejected");
        }

        let notification = match &err {
            StoreError::NotFound(_) => Notification::failure(MSG_NOT_FOUND),
            StoreError::EmptyClear(_) => Notification::notice(MSG_NOTHING_TO_CLEAR),
            StoreError::Validation(msg) => Notification::failure(msg.clone()),
            StoreError::Persistence(_) => Notification::failure(format!("Could not save tasks: {}", err)),
        };
        self.notify.notify(notification);
    }

    fn success<M: Into<String>>(&mut self, message: M) {
        self.notify.notify(Notification::success(message));
    }

    fn notice<M: Into<String>>(&mut self, message: M) {
        self.notify.notify(Notification::notice(message));
    }

    fn failure<M: Into<String>>(&mut self, message: M) {
        self.notify.notify(Notification::failure(message));
    }
}
