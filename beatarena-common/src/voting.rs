//! Pairwise voting and leaderboard ranking
//!
//! Pure functions behind the duel voting flow:
//! - Eligible pool: a voter never sees their own submission
//! - Pair selection: random sampling with bounded retries, then an
//!   exhaustive fallback over the pairs the voter has not judged yet
//! - Ballot validation and the per-contest vote budget
//! - Tally of votes won per submission and competition ranking
//!
//! Database access lives in `db::votes`; these functions only see ids.

use chrono::{DateTime, Utc};
use rand::Rng;
use serde::{Deserialize, Serialize};
use std::collections::{HashMap, HashSet};
use uuid::Uuid;

use crate::{Error, Result};

/// Random draws attempted before falling back to enumerating unvoted pairs
pub const MAX_PAIR_ATTEMPTS: usize = 16;

/// Unordered pair of submissions, normalized so `low < high`
///
/// A vote on (a, b) and a vote on (b, a) share the same key.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct PairKey {
    pub low: Uuid,
    pub high: Uuid,
}

impl PairKey {
    pub fn new(a: Uuid, b: Uuid) -> Self {
        if a <= b {
            Self { low: a, high: b }
        } else {
            Self { low: b, high: a }
        }
    }
}

/// A submission that may appear in a duel
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Candidate {
    pub submission_id: Uuid,
    pub owner_id: Uuid,
}

/// Submissions the voter may judge: everything except their own
pub fn eligible_pool(candidates: &[Candidate], voter_id: Uuid) -> Vec<Uuid> {
    candidates
        .iter()
        .filter(|c| c.owner_id != voter_id)
        .map(|c| c.submission_id)
        .collect()
}

/// Outcome of pair selection
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PairSelection {
    /// Two distinct submissions, in presentation order (beat A, beat B)
    Pair(Uuid, Uuid),
    /// Fewer than two eligible submissions
    NotEnoughSubmissions,
    /// The voter has judged every pair in the pool
    Exhausted,
}

/// Pick a pair the voter has not judged yet
///
/// Draws up to [`MAX_PAIR_ATTEMPTS`] random distinct pairs; when all of them
/// were already voted on, picks uniformly among the remaining unvoted pairs.
pub fn select_pair<R: Rng + ?Sized>(
    pool: &[Uuid],
    voted: &HashSet<PairKey>,
    rng: &mut R,
) -> PairSelection {
    let n = pool.len();
    if n < 2 {
        return PairSelection::NotEnoughSubmissions;
    }

    for _ in 0..MAX_PAIR_ATTEMPTS {
        let first = rng.gen_range(0..n);
        let mut second = rng.gen_range(0..n - 1);
        if second >= first {
            second += 1;
        }
        let (a, b) = (pool[first], pool[second]);
        if !voted.contains(&PairKey::new(a, b)) {
            return PairSelection::Pair(a, b);
        }
    }

    let remaining: Vec<(Uuid, Uuid)> = (0..n)
        .flat_map(|i| (i + 1..n).map(move |j| (i, j)))
        .map(|(i, j)| (pool[i], pool[j]))
        .filter(|(a, b)| !voted.contains(&PairKey::new(*a, *b)))
        .collect();

    if remaining.is_empty() {
        return PairSelection::Exhausted;
    }

    let (a, b) = remaining[rng.gen_range(0..remaining.len())];
    if rng.gen_bool(0.5) {
        PairSelection::Pair(a, b)
    } else {
        PairSelection::Pair(b, a)
    }
}

/// A duel vote as submitted by the client
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Ballot {
    pub beat1: Uuid,
    pub beat2: Uuid,
    pub voted: Uuid,
}

impl Ballot {
    /// Check the ballot is internally consistent and return its pair key
    pub fn validate(&self) -> Result<PairKey> {
        if self.beat1 == self.beat2 {
            return Err(Error::InvalidInput(
                "A duel needs two different submissions".to_string(),
            ));
        }
        if self.voted != self.beat1 && self.voted != self.beat2 {
            return Err(Error::InvalidInput(
                "Voted beat must be one of the two beats in the duel".to_string(),
            ));
        }
        Ok(PairKey::new(self.beat1, self.beat2))
    }
}

/// Fixed number of votes per voter per contest
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct VoteBudget {
    pub limit: u32,
}

impl VoteBudget {
    pub fn new(limit: u32) -> Self {
        Self { limit }
    }

    /// Votes left after `used` votes; never negative
    pub fn remaining(&self, used: u32) -> u32 {
        self.limit.saturating_sub(used)
    }

    /// Fail when no vote is left
    pub fn check(&self, used: u32) -> Result<()> {
        if used >= self.limit {
            return Err(Self::exhausted());
        }
        Ok(())
    }

    /// Error returned once every vote has been used
    pub fn exhausted() -> Error {
        Error::InvalidInput("You have reached the maximum number of votes for this contest".to_string())
    }
}

/// Count votes won per submission
///
/// Submissions that never won a duel are absent from the map.
pub fn tally<I>(winners: I) -> HashMap<Uuid, u32>
where
    I: IntoIterator<Item = Uuid>,
{
    winners.into_iter().fold(HashMap::new(), |mut acc, id| {
        *acc.entry(id).or_insert(0) += 1;
        acc
    })
}

/// A submission entering the leaderboard
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LeaderboardEntry {
    pub submission_id: Uuid,
    pub owner_id: Uuid,
    pub submitted_at: DateTime<Utc>,
}

/// A ranked leaderboard row
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Standing {
    /// 1-based competition rank; tied submissions share a rank
    pub rank: u32,
    pub submission_id: Uuid,
    pub owner_id: Uuid,
    pub votes: u32,
    pub submitted_at: DateTime<Utc>,
}

/// Sort entries by votes won and assign competition ranks ("1224")
///
/// Ties are ordered by earlier submission, then by id, so the output is
/// deterministic.
pub fn rank(entries: Vec<LeaderboardEntry>, tally: &HashMap<Uuid, u32>) -> Vec<Standing> {
    let mut rows: Vec<Standing> = entries
        .into_iter()
        .map(|e| Standing {
            rank: 0,
            votes: tally.get(&e.submission_id).copied().unwrap_or(0),
            submission_id: e.submission_id,
            owner_id: e.owner_id,
            submitted_at: e.submitted_at,
        })
        .collect();

    rows.sort_by(|a, b| {
        b.votes
            .cmp(&a.votes)
            .then(a.submitted_at.cmp(&b.submitted_at))
            .then(a.submission_id.cmp(&b.submission_id))
    });

    let mut previous_votes = None;
    let mut current_rank = 0;
    for (index, row) in rows.iter_mut().enumerate() {
        if previous_votes != Some(row.votes) {
            current_rank = index as u32 + 1;
            previous_votes = Some(row.votes);
        }
        row.rank = current_rank;
    }

    rows
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use rand::rngs::StdRng;
    use rand::SeedableRng;

    fn ids(n: usize) -> Vec<Uuid> {
        (0..n).map(|_| Uuid::new_v4()).collect()
    }

    fn all_pairs(pool: &[Uuid]) -> HashSet<PairKey> {
        let mut set = HashSet::new();
        for i in 0..pool.len() {
            for j in i + 1..pool.len() {
                set.insert(PairKey::new(pool[i], pool[j]));
            }
        }
        set
    }

    #[test]
    fn test_pair_key_is_unordered() {
        let (a, b) = (Uuid::new_v4(), Uuid::new_v4());
        assert_eq!(PairKey::new(a, b), PairKey::new(b, a));
        let key = PairKey::new(a, b);
        assert!(key.low <= key.high);
    }

    #[test]
    fn test_eligible_pool_excludes_voter() {
        let voter = Uuid::new_v4();
        let other = Uuid::new_v4();
        let own = Candidate { submission_id: Uuid::new_v4(), owner_id: voter };
        let theirs = Candidate { submission_id: Uuid::new_v4(), owner_id: other };

        let pool = eligible_pool(&[own, theirs], voter);
        assert_eq!(pool, vec![theirs.submission_id]);
    }

    #[test]
    fn test_select_pair_needs_two() {
        let mut rng = StdRng::seed_from_u64(1);
        assert_eq!(
            select_pair(&[], &HashSet::new(), &mut rng),
            PairSelection::NotEnoughSubmissions
        );
        assert_eq!(
            select_pair(&ids(1), &HashSet::new(), &mut rng),
            PairSelection::NotEnoughSubmissions
        );
    }

    #[test]
    fn test_select_pair_returns_distinct_pool_members() {
        let pool = ids(5);
        let mut rng = StdRng::seed_from_u64(7);
        for _ in 0..200 {
            match select_pair(&pool, &HashSet::new(), &mut rng) {
                PairSelection::Pair(a, b) => {
                    assert_ne!(a, b);
                    assert!(pool.contains(&a));
                    assert!(pool.contains(&b));
                }
                other => panic!("unexpected selection: {:?}", other),
            }
        }
    }

    #[test]
    fn test_select_pair_skips_voted_pairs() {
        let pool = ids(6);
        let mut voted = all_pairs(&pool);
        let open = PairKey::new(pool[2], pool[4]);
        voted.remove(&open);

        let mut rng = StdRng::seed_from_u64(42);
        for _ in 0..50 {
            match select_pair(&pool, &voted, &mut rng) {
                PairSelection::Pair(a, b) => assert_eq!(PairKey::new(a, b), open),
                other => panic!("unexpected selection: {:?}", other),
            }
        }
    }

    #[test]
    fn test_select_pair_exhausted() {
        let pool = ids(4);
        let voted = all_pairs(&pool);
        let mut rng = StdRng::seed_from_u64(3);
        assert_eq!(select_pair(&pool, &voted, &mut rng), PairSelection::Exhausted);
    }

    #[test]
    fn test_two_submissions_single_pair() {
        let pool = ids(2);
        let mut rng = StdRng::seed_from_u64(9);
        match select_pair(&pool, &HashSet::new(), &mut rng) {
            PairSelection::Pair(a, b) => assert_eq!(PairKey::new(a, b), PairKey::new(pool[0], pool[1])),
            other => panic!("unexpected selection: {:?}", other),
        }
    }

    #[test]
    fn test_ballot_validation() {
        let (a, b, c) = (Uuid::new_v4(), Uuid::new_v4(), Uuid::new_v4());

        assert!(Ballot { beat1: a, beat2: b, voted: a }.validate().is_ok());
        assert!(Ballot { beat1: a, beat2: b, voted: b }.validate().is_ok());
        assert!(Ballot { beat1: a, beat2: b, voted: c }.validate().is_err());
        assert!(Ballot { beat1: a, beat2: a, voted: a }.validate().is_err());

        let key = Ballot { beat1: b, beat2: a, voted: a }.validate().unwrap();
        assert_eq!(key, PairKey::new(a, b));
    }

    #[test]
    fn test_vote_budget() {
        let budget = VoteBudget::new(10);
        assert_eq!(budget.remaining(0), 10);
        assert_eq!(budget.remaining(4), 6);
        assert_eq!(budget.remaining(12), 0);
        assert!(budget.check(9).is_ok());
        assert!(budget.check(10).is_err());
    }

    #[test]
    fn test_tally_counts_winners() {
        let (a, b) = (Uuid::new_v4(), Uuid::new_v4());
        let counts = tally(vec![a, b, a, a]);
        assert_eq!(counts[&a], 3);
        assert_eq!(counts[&b], 1);
        assert_eq!(counts.len(), 2);
    }

    #[test]
    fn test_rank_orders_and_shares_ties() {
        let t0 = Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap();
        let entry = |minutes: i64| LeaderboardEntry {
            submission_id: Uuid::new_v4(),
            owner_id: Uuid::new_v4(),
            submitted_at: t0 + chrono::Duration::minutes(minutes),
        };
        let (first, tied_late, tied_early, silent) = (entry(0), entry(30), entry(10), entry(5));

        let mut counts = HashMap::new();
        counts.insert(first.submission_id, 5);
        counts.insert(tied_late.submission_id, 2);
        counts.insert(tied_early.submission_id, 2);

        let standings = rank(
            vec![silent.clone(), tied_late.clone(), first.clone(), tied_early.clone()],
            &counts,
        );

        let order: Vec<Uuid> = standings.iter().map(|s| s.submission_id).collect();
        assert_eq!(
            order,
            vec![
                first.submission_id,
                tied_early.submission_id,
                tied_late.submission_id,
                silent.submission_id
            ]
        );
        let ranks: Vec<u32> = standings.iter().map(|s| s.rank).collect();
        assert_eq!(ranks, vec![1, 2, 2, 4]);
        assert_eq!(standings[3].votes, 0);
    }

    #[test]
    fn test_rank_empty() {
        assert!(rank(Vec::new(), &HashMap::new()).is_empty());
    }
}
