//! Attempt-ladder state machine.
//!
//! The per-page pipeline is a small state machine. This module holds only the
//! transition table; the driver in `pipeline` performs the work for each state and
//! feeds back the resulting event. Keeping the table pure lets it be tested without
//! an engine.
//!
//! ```text
//! Load        --Loaded-------------> Preprocess
//! Load        --LoadTimedOut-------> Done(RenderTimeout)
//! Load        --LoadFailed---------> Done(LoadFailed)
//! Preprocess  --Preprocessed-------> Attempt(0), or Fallback for an empty ladder
//! Preprocess  --PreprocessFailed---> Fallback
//! Attempt(k)  --AttemptSucceeded---> Done(Recognized)
//! Attempt(k)  --AttemptFailed------> Attempt(k+1), or Fallback after the last rung
//! Fallback    --FallbackSucceeded--> Done(RecognizedByFallback)
//! Fallback    --FallbackFailed-----> Done(RecognitionFailure)
//! Fallback    --FallbackOverBudget-> Done(BudgetExceeded)
//! any active  --Skipped------------> Done(UserSkipped)
//! Load        --OverBudget---------> Done(BudgetExceeded)
//! Preprocess | Attempt(k) --OverBudget--> Fallback
//! ```

/// Where a page is in its pipeline.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LadderState {
    Load,
    Preprocess,
    Attempt(usize),
    Fallback,
    Done(Terminal),
}

impl LadderState {
    /// States that consult the page budget on entry.
    pub fn checks_budget(&self) -> bool {
        matches!(self, LadderState::Preprocess | LadderState::Attempt(_))
    }

    pub fn is_done(&self) -> bool {
        matches!(self, LadderState::Done(_))
    }
}

/// How a page's pipeline ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Terminal {
    Recognized,
    RecognizedByFallback,
    BudgetExceeded,
    UserSkipped,
    RenderTimeout,
    LoadFailed,
    RecognitionFailure,
}

/// What happened while in a state.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LadderEvent {
    Skipped,
    OverBudget,
    Loaded,
    LoadTimedOut,
    LoadFailed,
    Preprocessed,
    PreprocessFailed,
    AttemptSucceeded,
    AttemptFailed,
    FallbackSucceeded,
    FallbackFailed,
    FallbackOverBudget,
}

/// Look up the next state. `None` means the event is not valid in `state`.
pub fn transition(state: LadderState, event: LadderEvent, rungs: usize) -> Option<LadderState> {
    use LadderEvent as E;
    use LadderState as S;

    let first_rung_or_fallback = |next: usize| {
        if next < rungs {
            S::Attempt(next)
        } else {
            S::Fallback
        }
    };

    let next = match (state, event) {
        (S::Done(_), _) => return None,
        (_, E::Skipped) => S::Done(Terminal::UserSkipped),

        (S::Load, E::Loaded) => S::Preprocess,
        (S::Load, E::LoadTimedOut) => S::Done(Terminal::RenderTimeout),
        (S::Load, E::LoadFailed) => S::Done(Terminal::LoadFailed),
        (S::Load, E::OverBudget) => S::Done(Terminal::BudgetExceeded),

        (S::Preprocess, E::Preprocessed) => first_rung_or_fallback(0),
        (S::Preprocess, E::PreprocessFailed) => S::Fallback,
        (S::Preprocess, E::OverBudget) => S::Fallback,

        (S::Attempt(_), E::AttemptSucceeded) => S::Done(Terminal::Recognized),
        (S::Attempt(k), E::AttemptFailed) => first_rung_or_fallback(k + 1),
        (S::Attempt(_), E::OverBudget) => S::Fallback,

        (S::Fallback, E::FallbackSucceeded) => S::Done(Terminal::RecognizedByFallback),
        (S::Fallback, E::FallbackFailed) => S::Done(Terminal::RecognitionFailure),
        (S::Fallback, E::FallbackOverBudget) => S::Done(Terminal::BudgetExceeded),

        _ => return None,
    };
    Some(next)
}
