use crate::storage::FrontierTask;

/// The scheduler loop's state
///
/// `Idle` means the last claim found no eligible task and the loop is waiting
/// for the idle poll interval. `Active` carries the task claimed for the
/// current cycle; it stays claimed until its outcome has been applied.
#[derive(Debug, Clone, PartialEq)]
pub enum LoopState {
    Idle,
    Active(FrontierTask),
}

impl LoopState {
    pub fn is_idle(&self) -> bool {
        matches!(self, Self::Idle)
    }

    /// The claimed task, if any
    pub fn task(&self) -> Option<&FrontierTask> {
        match self {
            Self::Idle => None,
            Self::Active(task) => Some(task),
        }
    }
}
