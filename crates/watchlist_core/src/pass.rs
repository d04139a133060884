use std::fmt;

/// Stages of a single harvest pass.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum PassStage {
    #[default]
    FetchingUsernames,
    ProcessingUsers,
    Serializing,
    Publishing,
    Done,
    Aborted,
}

impl PassStage {
    pub fn is_terminal(self) -> bool {
        matches!(self, PassStage::Done | PassStage::Aborted)
    }

    /// Stages only move forward, one step at a time; any live stage may abort.
    pub fn can_advance_to(self, next: PassStage) -> bool {
        use PassStage::*;
        match (self, next) {
            (Done | Aborted, _) => false,
            (_, Aborted) => true,
            (FetchingUsernames, ProcessingUsers)
            | (ProcessingUsers, Serializing)
            | (Serializing, Publishing)
            | (Publishing, Done) => true,
            _ => false,
        }
    }
}

impl fmt::Display for PassStage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            PassStage::FetchingUsernames => "fetching-usernames",
            PassStage::ProcessingUsers => "processing-users",
            PassStage::Serializing => "serializing",
            PassStage::Publishing => "publishing",
            PassStage::Done => "done",
            PassStage::Aborted => "aborted",
        };
        f.write_str(label)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct InvalidTransition {
    pub from: PassStage,
    pub to: PassStage,
}

impl fmt::Display for InvalidTransition {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "invalid pass transition {} -> {}", self.from, self.to)
    }
}

impl std::error::Error for InvalidTransition {}

/// Counters collected over one pass.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct PassReport {
    stage: PassStage,
    pub usernames_listed: usize,
    pub empty_usernames: usize,
    pub profile_failures: usize,
    pub history_failures: usize,
    pub records: usize,
    pub anomalies: usize,
    pub published_key: Option<String>,
    pub published_bytes: Option<usize>,
}

impl PassReport {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn stage(&self) -> PassStage {
        self.stage
    }

    pub fn advance(&mut self, next: PassStage) -> Result<(), InvalidTransition> {
        if !self.stage.can_advance_to(next) {
            return Err(InvalidTransition {
                from: self.stage,
                to: next,
            });
        }
        self.stage = next;
        Ok(())
    }

    /// Usernames that reached the fetch step.
    pub fn attempted(&self) -> usize {
        self.usernames_listed.saturating_sub(self.empty_usernames)
    }

    pub fn skipped(&self) -> usize {
        self.profile_failures + self.history_failures
    }
}

impl fmt::Display for PassReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "stage={} listed={} empty={} records={} profile_failures={} \
             history_failures={} anomalies={}",
            self.stage,
            self.usernames_listed,
            self.empty_usernames,
            self.records,
            self.profile_failures,
            self.history_failures,
            self.anomalies
        )?;
        if let Some(key) = &self.published_key {
            write!(f, " key={key}")?;
        }
        Ok(())
    }
}
