use super::types::State;

impl State {
    /// States a task may move to from `self`.
    pub fn successors(&self) -> &'static [State] {
        match self {
            State::Pending => &[State::Pending, State::Scheduled],
            State::Scheduled => &[State::Scheduled, State::Running, State::Failed],
            // No Running -> Running: a second start would duplicate the container.
            State::Running => &[State::Completed, State::Failed],
            State::Completed | State::Failed => &[],
        }
    }

    pub fn is_terminal(&self) -> bool {
        self.successors().is_empty()
    }
}

pub fn valid_state_transition(src: &State, dst: &State) -> bool {
    src.successors().contains(dst)
}
