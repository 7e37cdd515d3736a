use tracing::debug;

use crate::workflow::{TabHints, TaskOf, Workflow};

/// Pestaña activa de una tarea, derivada de su status.
///
/// La derivación sólo corre cuando cambian las entradas:
/// - status nuevo: se recalcula la pestaña y se descarta la elección manual;
/// - mismo status con hints distintos: se recalcula sólo si el usuario no
///   eligió pestaña a mano dentro de este status;
/// - mismas entradas: no hace nada.
pub struct WorkflowStatusMachine<W: Workflow> {
    last_status: Option<W::Status>,
    last_hints: TabHints,
    tab: W::Tab,
    manual: bool,
}

impl<W: Workflow> WorkflowStatusMachine<W> {
    pub fn new() -> Self {
        Self {
            last_status: None,
            last_hints: TabHints::default(),
            tab: W::DEFAULT_TAB,
            manual: false,
        }
    }

    pub fn tab(&self) -> W::Tab {
        self.tab
    }

    pub fn is_manual(&self) -> bool {
        self.manual
    }

    /// Procesa una copia nueva de la tarea. Devuelve la pestaña si cambió.
    pub fn observe(&mut self, task: &TaskOf<W>) -> Option<W::Tab> {
        let hints = W::hints(task);
        let status_changed = self.last_status.as_ref() != Some(&task.status);

        if !status_changed && (hints == self.last_hints || self.manual) {
            self.last_hints = hints;
            return None;
        }

        if status_changed {
            self.manual = false;
            self.last_status = Some(task.status.clone());
        }
        self.last_hints = hints;

        let next = W::select_tab(&task.status, hints);
        if next == self.tab {
            return None;
        }

        debug!(
            kind = W::KIND,
            task_id = %task.task_id,
            status = %task.status,
            from = %self.tab,
            to = %next,
            "cambio automático de pestaña"
        );
        self.tab = next;
        Some(next)
    }

    /// Elección manual; se respeta hasta el próximo cambio de status.
    pub fn select(&mut self, tab: W::Tab) {
        self.tab = tab;
        self.manual = true;
    }
}

impl<W: Workflow> Default for WorkflowStatusMachine<W> {
    fn default() -> Self {
        Self::new()
    }
}
