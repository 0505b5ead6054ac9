/// Lifecycle phases of a listing page and of a whole run
///
/// Every transition goes through `advance`, which rejects moves the
/// orchestrator should never make.
use crate::HarvestError;
use std::fmt;

/// Progress of one catalog page through the producer
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PagePhase {
    /// Listing the page under the retry policy
    Discovering,

    /// Pushing the page's new records onto the queue
    Enqueuing,

    /// Finished, successfully or not
    Done,
}

impl PagePhase {
    /// Returns true if no further transition is possible
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Done)
    }

    /// Discovering may jump straight to Done when the page is exhausted or empty
    pub fn can_transition_to(&self, next: Self) -> bool {
        matches!(
            (self, next),
            (Self::Discovering, Self::Enqueuing)
                | (Self::Discovering, Self::Done)
                | (Self::Enqueuing, Self::Done)
        )
    }

    pub fn advance(&mut self, next: Self) -> Result<(), HarvestError> {
        advance(self, next, Self::can_transition_to)
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Discovering => "discovering",
            Self::Enqueuing => "enqueuing",
            Self::Done => "done",
        }
    }
}

impl fmt::Display for PagePhase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Global phase of a run
///
/// Consumers run during `Producing` as well; `Draining` starts once the
/// producer has finished and ends when the queue is empty and acknowledged.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum RunPhase {
    Producing,
    Draining,
    Terminated,
}

impl RunPhase {
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Terminated)
    }

    pub fn can_transition_to(&self, next: Self) -> bool {
        matches!(
            (self, next),
            (Self::Producing, Self::Draining)
                | (Self::Draining, Self::Terminated)
                | (Self::Producing, Self::Terminated)
        )
    }

    pub fn advance(&mut self, next: Self) -> Result<(), HarvestError> {
        advance(self, next, Self::can_transition_to)
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Producing => "producing",
            Self::Draining => "draining",
            Self::Terminated => "terminated",
        }
    }
}

impl fmt::Display for RunPhase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

fn advance<P>(current: &mut P, next: P, allowed: fn(&P, P) -> bool) -> Result<(), HarvestError>
where
    P: Copy + fmt::Display,
{
    if !allowed(current, next) {
        return Err(HarvestError::InvalidTransition {
            from: current.to_string(),
            to: next.to_string(),
        });
    }
    *current = next;
    Ok(())
}
