//! Integration tests for the SQLite data access layer

use beatarena_common::auth::{hash_password, verify_password, Role};
use beatarena_common::db::{self, contests, sessions, submissions, users, votes};
use beatarena_common::db::{ContestStatus, NewContest, NewSubmission, NewUser, ProfileUpdate, SocialLinks, SubmissionStatus, User};
use beatarena_common::voting::{Ballot, VoteBudget};
use beatarena_common::Error;
use chrono::{Duration, Utc};
use sqlx::SqlitePool;
use tempfile::TempDir;
use uuid::Uuid;

async fn setup() -> (TempDir, SqlitePool) {
    let dir = TempDir::new().unwrap();
    let pool = db::init_database(&dir.path().join("beatarena.db")).await.unwrap();
    (dir, pool)
}

async fn user(pool: &SqlitePool, name: &str) -> User {
    users::create_user(
        pool,
        &NewUser {
            username: name.to_string(),
            email: format!("{}@example.com", name),
            name: name.to_string(),
            avatar: format!("https://avatars.test/{}", name),
            role: Role::User,
            password: Some(hash_password("secret-password")),
            oauth: None,
        },
    )
    .await
    .unwrap()
}

async fn active_contest(pool: &SqlitePool, admin: &User) -> Uuid {
    let now = Utc::now();
    let contest = contests::create_contest(
        pool,
        admin.id,
        &NewContest {
            title: "Boom Bap Week".to_string(),
            description: "Dusty drums only".to_string(),
            theme: "boom bap".to_string(),
            start_date: now - Duration::days(1),
            end_date: now + Duration::days(6),
            cover_image: "https://covers.test/boombap.png".to_string(),
            rules: "One beat per producer".to_string(),
            status: Some(ContestStatus::Active),
        },
    )
    .await
    .unwrap();
    contest.id
}

async fn submit(pool: &SqlitePool, contest_id: Uuid, owner: &User) -> Uuid {
    let id = Uuid::new_v4();
    submissions::create_submission(
        pool,
        &NewSubmission {
            id,
            contest_id,
            user_id: owner.id,
            track_path: format!("{}.wav", id),
            extract_start: 0.0,
            extract_end: 30.0,
            duration: 30.0,
        },
    )
    .await
    .unwrap();
    id
}

#[tokio::test]
async fn test_init_is_idempotent() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("nested").join("beatarena.db");

    let first = db::init_database(&path).await.unwrap();
    drop(first);
    let pool = db::init_database(&path).await.unwrap();

    let versions: Vec<i64> = sqlx::query_scalar("SELECT version FROM schema_version")
        .fetch_all(&pool)
        .await
        .unwrap();
    assert_eq!(versions, vec![db::init::SCHEMA_VERSION]);
}

#[tokio::test]
async fn test_duplicate_username_and_email_conflict() {
    let (_dir, pool) = setup().await;
    let alice = user(&pool, "alice").await;

    let same_email = NewUser {
        username: "alice2".to_string(),
        email: "  ALICE@example.com ".to_string(),
        name: "Alice Two".to_string(),
        avatar: String::new(),
        role: Role::User,
        password: None,
        oauth: None,
    };
    assert!(matches!(users::create_user(&pool, &same_email).await, Err(Error::Conflict(_))));

    let same_username = NewUser {
        username: "alice".to_string(),
        email: "other@example.com".to_string(),
        ..same_email
    };
    assert!(matches!(users::create_user(&pool, &same_username).await, Err(Error::Conflict(_))));

    let found = users::find_by_email(&pool, "Alice@Example.com").await.unwrap().unwrap();
    assert_eq!(found.id, alice.id);
}

#[tokio::test]
async fn test_credentials_verify_password() {
    let (_dir, pool) = setup().await;
    user(&pool, "bob").await;

    let creds = users::find_credentials_by_email(&pool, "bob@example.com")
        .await
        .unwrap()
        .unwrap();
    assert!(verify_password("secret-password", &creds.password_hash, &creds.password_salt));
    assert!(!verify_password("wrong", &creds.password_hash, &creds.password_salt));
    assert!(users::find_credentials_by_email(&pool, "nobody@example.com").await.unwrap().is_none());
}

#[tokio::test]
async fn test_profile_update_clears_blank_links() {
    let (_dir, pool) = setup().await;
    let carol = user(&pool, "carol").await;

    let updated = users::update_profile(
        &pool,
        carol.id,
        &ProfileUpdate {
            name: Some("Carol Beats".to_string()),
            bio: Some("Sampling vinyl since 2009".to_string()),
            social_links: Some(SocialLinks {
                soundcloud: Some("https://soundcloud.com/carol".to_string()),
                instagram: Some("  ".to_string()),
                twitter: None,
            }),
        },
    )
    .await
    .unwrap();

    assert_eq!(updated.name, "Carol Beats");
    assert_eq!(updated.bio, "Sampling vinyl since 2009");
    assert_eq!(updated.social_links.soundcloud.as_deref(), Some("https://soundcloud.com/carol"));
    assert_eq!(updated.social_links.instagram, None);

    let blank_name = ProfileUpdate {
        name: Some(" ".to_string()),
        ..Default::default()
    };
    assert!(matches!(
        users::update_profile(&pool, carol.id, &blank_name).await,
        Err(Error::InvalidInput(_))
    ));
}

#[tokio::test]
async fn test_oauth_lookup_and_username_allocation() {
    let (_dir, pool) = setup().await;
    let dave = user(&pool, "dave").await;

    users::link_oauth(&pool, dave.id, "google", "sub-123").await.unwrap();
    let linked = users::find_by_oauth(&pool, "google", "sub-123").await.unwrap().unwrap();
    assert_eq!(linked.id, dave.id);
    assert!(users::find_by_oauth(&pool, "google", "sub-999").await.unwrap().is_none());

    assert_eq!(users::available_username(&pool, "Dave").await.unwrap(), "dave2");
    assert_eq!(users::available_username(&pool, "New Person").await.unwrap(), "newperson");
}

#[tokio::test]
async fn test_session_lifecycle() {
    let (_dir, pool) = setup().await;
    let erin = user(&pool, "erin").await;

    let token = sessions::create_session(&pool, erin.id, Duration::hours(1)).await.unwrap();
    assert_eq!(token.len(), 64);

    let resolved = sessions::resolve_session(&pool, &token).await.unwrap().unwrap();
    assert_eq!(resolved.id, erin.id);
    assert!(sessions::resolve_session(&pool, "not-a-token").await.unwrap().is_none());

    sessions::delete_session(&pool, &token).await.unwrap();
    assert!(sessions::resolve_session(&pool, &token).await.unwrap().is_none());
}

#[tokio::test]
async fn test_expired_sessions_are_ignored_and_purged() {
    let (_dir, pool) = setup().await;
    let frank = user(&pool, "frank").await;

    let expired = sessions::create_session(&pool, frank.id, Duration::hours(-1)).await.unwrap();
    let live = sessions::create_session(&pool, frank.id, Duration::hours(1)).await.unwrap();

    assert!(sessions::resolve_session(&pool, &expired).await.unwrap().is_none());
    assert_eq!(sessions::purge_expired(&pool).await.unwrap(), 1);
    assert!(sessions::resolve_session(&pool, &live).await.unwrap().is_some());
}

#[tokio::test]
async fn test_contest_lifecycle() {
    let (_dir, pool) = setup().await;
    let admin = user(&pool, "admin").await;
    let now = Utc::now();

    let draft = contests::create_contest(
        &pool,
        admin.id,
        &NewContest {
            title: "Trap Nights".to_string(),
            description: "808s".to_string(),
            theme: "trap".to_string(),
            start_date: now - Duration::hours(1),
            end_date: now + Duration::days(3),
            cover_image: "cover.png".to_string(),
            rules: "Be original".to_string(),
            status: None,
        },
    )
    .await
    .unwrap();
    assert_eq!(draft.status, ContestStatus::Draft);
    assert!(contests::find_current(&pool, now).await.unwrap().is_none());
    assert!(contests::list_active(&pool).await.unwrap().is_empty());

    let active = contests::update_status(&pool, draft.id, ContestStatus::Active).await.unwrap();
    assert_eq!(active.status, ContestStatus::Active);

    let current = contests::find_current(&pool, now).await.unwrap().unwrap();
    assert_eq!(current.contest.id, draft.id);
    assert_eq!(current.created_by_user.name, "admin");

    contests::update_status(&pool, draft.id, ContestStatus::Ended).await.unwrap();
    assert!(matches!(
        contests::update_status(&pool, draft.id, ContestStatus::Active).await,
        Err(Error::InvalidInput(_))
    ));

    let all = contests::list_all(&pool).await.unwrap();
    assert_eq!(all.len(), 1);
    assert_eq!(all[0].contest.status, ContestStatus::Ended);
}

#[tokio::test]
async fn test_one_submission_per_user_per_contest() {
    let (_dir, pool) = setup().await;
    let admin = user(&pool, "admin").await;
    let gina = user(&pool, "gina").await;
    let contest_id = active_contest(&pool, &admin).await;

    submit(&pool, contest_id, &gina).await;

    let second = submissions::create_submission(
        &pool,
        &NewSubmission {
            id: Uuid::new_v4(),
            contest_id,
            user_id: gina.id,
            track_path: "again.wav".to_string(),
            extract_start: 0.0,
            extract_end: 10.0,
            duration: 10.0,
        },
    )
    .await;
    assert!(matches!(second, Err(Error::Conflict(_))));
}

#[tokio::test]
async fn test_cast_vote_rules() {
    let (_dir, pool) = setup().await;
    let admin = user(&pool, "admin").await;
    let p1 = user(&pool, "p1").await;
    let p2 = user(&pool, "p2").await;
    let p3 = user(&pool, "p3").await;
    let voter = user(&pool, "voter").await;
    let contest_id = active_contest(&pool, &admin).await;

    let a = submit(&pool, contest_id, &p1).await;
    let b = submit(&pool, contest_id, &p2).await;
    let c = submit(&pool, contest_id, &p3).await;
    let budget = VoteBudget::new(10);

    votes::cast_vote(&pool, contest_id, voter.id, Ballot { beat1: a, beat2: b, voted: a }, budget)
        .await
        .unwrap();

    // Same pair in the other order
    let again = votes::cast_vote(&pool, contest_id, voter.id, Ballot { beat1: b, beat2: a, voted: b }, budget).await;
    assert!(matches!(again, Err(Error::Conflict(_))));

    // Own submission
    let own = votes::cast_vote(&pool, contest_id, p1.id, Ballot { beat1: a, beat2: b, voted: b }, budget).await;
    assert!(matches!(own, Err(Error::InvalidInput(_))));

    // Beat from outside the contest
    let stranger = votes::cast_vote(
        &pool,
        contest_id,
        voter.id,
        Ballot { beat1: a, beat2: Uuid::new_v4(), voted: a },
        budget,
    )
    .await;
    assert!(matches!(stranger, Err(Error::InvalidInput(_))));

    // Rejected submissions are out of the duel
    submissions::update_status(&pool, c, SubmissionStatus::Rejected).await.unwrap();
    let rejected = votes::cast_vote(&pool, contest_id, voter.id, Ballot { beat1: a, beat2: c, voted: c }, budget).await;
    assert!(matches!(rejected, Err(Error::InvalidInput(_))));

    assert_eq!(votes::count_votes(&pool, contest_id, voter.id).await.unwrap(), 1);
    let pairs = votes::voted_pairs(&pool, contest_id, voter.id).await.unwrap();
    assert_eq!(pairs.len(), 1);
}

#[tokio::test]
async fn test_vote_budget_enforced() {
    let (_dir, pool) = setup().await;
    let admin = user(&pool, "admin").await;
    let voter = user(&pool, "voter").await;
    let contest_id = active_contest(&pool, &admin).await;

    let mut beats = Vec::new();
    for i in 0..4 {
        let producer = user(&pool, &format!("producer{}", i)).await;
        beats.push(submit(&pool, contest_id, &producer).await);
    }

    let budget = VoteBudget::new(2);
    let ballot = |x: usize, y: usize| Ballot { beat1: beats[x], beat2: beats[y], voted: beats[x] };

    votes::cast_vote(&pool, contest_id, voter.id, ballot(0, 1), budget).await.unwrap();
    votes::cast_vote(&pool, contest_id, voter.id, ballot(2, 3), budget).await.unwrap();

    let third = votes::cast_vote(&pool, contest_id, voter.id, ballot(0, 2), budget).await;
    assert!(matches!(third, Err(Error::InvalidInput(_))));
    assert_eq!(votes::count_votes(&pool, contest_id, voter.id).await.unwrap(), 2);

    let usage = votes::usage_for_voter(&pool, voter.id).await.unwrap();
    assert_eq!(usage, vec![(contest_id, 2)]);
}

#[tokio::test]
async fn test_leaderboard_ranks_and_ties() {
    let (_dir, pool) = setup().await;
    let admin = user(&pool, "admin").await;
    let contest_id = active_contest(&pool, &admin).await;

    let p1 = user(&pool, "p1").await;
    let p2 = user(&pool, "p2").await;
    let p3 = user(&pool, "p3").await;
    let a = submit(&pool, contest_id, &p1).await;
    let b = submit(&pool, contest_id, &p2).await;
    let c = submit(&pool, contest_id, &p3).await;

    let budget = VoteBudget::new(10);
    let v1 = user(&pool, "v1").await;
    let v2 = user(&pool, "v2").await;

    // a wins twice, b once, c never
    votes::cast_vote(&pool, contest_id, v1.id, Ballot { beat1: a, beat2: b, voted: a }, budget).await.unwrap();
    votes::cast_vote(&pool, contest_id, v1.id, Ballot { beat1: b, beat2: c, voted: b }, budget).await.unwrap();
    votes::cast_vote(&pool, contest_id, v2.id, Ballot { beat1: a, beat2: c, voted: a }, budget).await.unwrap();

    let stats = votes::vote_stats(&pool, contest_id).await.unwrap();
    assert_eq!(stats.get(&a), Some(&2));
    assert_eq!(stats.get(&b), Some(&1));
    assert_eq!(stats.get(&c), None);

    let board = votes::leaderboard(&pool, contest_id).await.unwrap();
    let order: Vec<(Uuid, u32, u32)> = board
        .iter()
        .map(|r| (r.standing.submission_id, r.standing.rank, r.standing.votes))
        .collect();
    assert_eq!(order, vec![(a, 1, 2), (b, 2, 1), (c, 3, 0)]);
    assert_eq!(board[0].producer.name, "p1");

    // Deleting a submission removes its votes
    submissions::delete_submission(&pool, a).await.unwrap();
    let stats = votes::vote_stats(&pool, contest_id).await.unwrap();
    assert_eq!(stats.get(&a), None);
    assert_eq!(stats.get(&b), Some(&1));
}
