//! In-process [`Forge`] keeping pull requests in memory.
//!
//! Used by tests and rehearsal runs. Listing honours the real contract:
//! newest created first, pages of [`PAGE_SIZE`].

use std::cell::RefCell;

use contentsync_core::{
    PullRequestCommit, PullRequestRef, PullRequestState, PullRequestSummary, SyncBranch,
};

use crate::error::ForgeError;
use crate::{Forge, NewPullRequest, PAGE_SIZE};

#[derive(Debug, Default)]
struct State {
    /// Oldest first; listing reverses.
    pulls: Vec<(PullRequestSummary, Vec<PullRequestCommit>)>,
    created: Vec<PullRequestRef>,
    auto_merge_requests: Vec<SyncBranch>,
    commits_on_create: Vec<PullRequestCommit>,
    list_calls: usize,
}

#[derive(Debug, Default)]
pub struct MemoryForge {
    state: RefCell<State>,
}

impl MemoryForge {
    pub fn new() -> Self {
        Self::default()
    }

    /// Commits attached to every pull request opened through this forge.
    pub fn with_commits_on_create(self, commits: Vec<PullRequestCommit>) -> Self {
        self.state.borrow_mut().commits_on_create = commits;
        self
    }

    /// Seed an existing open pull request. Later seeds are newer.
    pub fn seed(&self, title: &str, head: &str, commits: Vec<PullRequestCommit>) -> u64 {
        let mut state = self.state.borrow_mut();
        let number = state.pulls.len() as u64 + 1;
        state.pulls.push((
            PullRequestSummary {
                number,
                title: title.to_string(),
                head_ref: head.to_string(),
                base_ref: "main".to_string(),
                state: PullRequestState::Open,
                html_url: format!("memory://pull/{number}"),
            },
            commits,
        ));
        number
    }

    pub fn created(&self) -> Vec<PullRequestRef> {
        self.state.borrow().created.clone()
    }

    pub fn auto_merge_requests(&self) -> Vec<SyncBranch> {
        self.state.borrow().auto_merge_requests.clone()
    }

    /// Number of list-page requests served; zero means the forge was never asked.
    pub fn list_calls(&self) -> usize {
        self.state.borrow().list_calls
    }
}

impl Forge for MemoryForge {
    fn create_pull_request(&self, new: &NewPullRequest<'_>) -> Result<PullRequestRef, ForgeError> {
        let commits = self.state.borrow().commits_on_create.clone();
        let number = self.seed(new.title, new.head.as_str(), commits);
        let mut state = self.state.borrow_mut();
        if let Some((pr, _)) = state.pulls.last_mut() {
            pr.base_ref = new.base.to_string();
        }
        let created = PullRequestRef {
            head: new.head.clone(),
            base: new.base.to_string(),
            title: new.title.to_string(),
            url: Some(format!("memory://pull/{number}")),
        };
        state.created.push(created.clone());
        Ok(created)
    }

    fn open_pull_requests(&self, page: u32) -> Result<Vec<PullRequestSummary>, ForgeError> {
        let mut state = self.state.borrow_mut();
        state.list_calls += 1;
        let skip = page.saturating_sub(1) as usize * PAGE_SIZE as usize;
        Ok(state
            .pulls
            .iter()
            .rev()
            .filter(|(pr, _)| pr.state == PullRequestState::Open)
            .skip(skip)
            .take(PAGE_SIZE as usize)
            .map(|(pr, _)| pr.clone())
            .collect())
    }

    fn pull_request_commits(
        &self,
        number: u64,
        page: u32,
    ) -> Result<Vec<PullRequestCommit>, ForgeError> {
        let state = self.state.borrow();
        let skip = page.saturating_sub(1) as usize * PAGE_SIZE as usize;
        Ok(state
            .pulls
            .iter()
            .find(|(pr, _)| pr.number == number)
            .map(|(_, commits)| {
                commits
                    .iter()
                    .skip(skip)
                    .take(PAGE_SIZE as usize)
                    .cloned()
                    .collect()
            })
            .unwrap_or_default())
    }

    fn enable_auto_merge(&self, head: &SyncBranch) -> Result<(), ForgeError> {
        self.state.borrow_mut().auto_merge_requests.push(head.clone());
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn lists_newest_first() {
        let forge = MemoryForge::new();
        forge.seed("a", "h1", vec![]);
        forge.seed("b", "h2", vec![]);
        let prs = forge.open_pull_requests(1).unwrap();
        assert_eq!(prs[0].title, "b");
        assert_eq!(prs[1].title, "a");
        assert!(forge.open_pull_requests(2).unwrap().is_empty());
    }

    #[test]
    fn create_records_pull_request() {
        let forge = MemoryForge::new();
        let head = SyncBranch::from("content-sync-x");
        forge
            .create_pull_request(&NewPullRequest {
                title: "Update content",
                body: "b",
                head: &head,
                base: "develop",
            })
            .unwrap();
        assert_eq!(forge.created().len(), 1);
        let listed = forge.open_pull_requests(1).unwrap();
        assert_eq!(listed[0].head_ref, "content-sync-x");
        assert_eq!(listed[0].base_ref, "develop");
    }
}
