use std::time::Duration;

use chrono::Duration as ChronoDuration;
use lexi_core::mastery::MasteryPolicy;
use lexi_core::model::{
    CategoryId, Exercise, ExerciseId, ExerciseType, Lesson, LessonId, MasteryLevel, ReviewResult,
    UserId, Word, WordCategory, WordId,
};
use lexi_core::scheduler::Scheduler;
use lexi_core::time::fixed_now;
use storage::repository::{
    LessonRepository, MasteryPersistence, MasteryRepository, ReviewHistoryRepository,
    ScheduleRepository, StorageError, WordRepository,
};
use storage::sqlite::SqliteRepository;

async fn repo(name: &str) -> SqliteRepository {
    let url = format!("sqlite:file:{name}?mode=memory&cache=shared");
    let repo = SqliteRepository::connect(&url).await.expect("connect");
    repo.migrate().await.expect("migrate");
    repo
}

fn word_id(raw: &str) -> WordId {
    WordId::new(raw).unwrap()
}

#[tokio::test]
async fn sqlite_words_keep_their_categories() {
    let repo = repo("memdb_words").await;
    let food = CategoryId::new("food").unwrap();
    let basics = CategoryId::new("basics").unwrap();
    repo.upsert_category(&WordCategory::new(food.clone(), "Food", 2).unwrap())
        .await
        .unwrap();
    repo.upsert_category(&WordCategory::new(basics.clone(), "Basics", 1).unwrap())
        .await
        .unwrap();

    let apple = Word::new(word_id("apple"), "apple", vec![food.clone(), basics.clone()]).unwrap();
    repo.upsert_word(&apple).await.unwrap();
    assert_eq!(repo.get_word(apple.id()).await.unwrap(), apple);

    // Re-upserting replaces the category links instead of appending.
    let narrowed = Word::new(word_id("apple"), "apple", vec![food.clone()]).unwrap();
    repo.upsert_word(&narrowed).await.unwrap();
    let words = repo.list_words().await.unwrap();
    assert_eq!(words, vec![narrowed]);

    let categories = repo.list_categories().await.unwrap();
    assert_eq!(categories.len(), 2);
    assert_eq!(categories[0].id(), &basics);

    let missing = repo.get_word(&word_id("pear")).await;
    assert!(matches!(missing, Err(StorageError::NotFound)));
}

#[tokio::test]
async fn sqlite_lessons_roundtrip_with_overrides() {
    let repo = repo("memdb_lessons").await;
    let exercises = vec![
        Exercise::word_matching(
            ExerciseId::new(1),
            word_id("hallo"),
            "hallo",
            "hello",
            &["hello", "bye"],
        )
        .unwrap(),
        Exercise::speaking(ExerciseId::new(2), word_id("hallo"), "hallo").unwrap(),
    ];
    let lesson = Lesson::new(LessonId::new(7), "Greetings", exercises)
        .unwrap()
        .with_lives(2)
        .unwrap()
        .with_rewards(30, 9);
    repo.upsert_lesson(&lesson).await.unwrap();

    let plain = Lesson::new(LessonId::new(3), "Numbers", Vec::new()).unwrap();
    repo.upsert_lesson(&plain).await.unwrap();

    assert_eq!(repo.get_lesson(LessonId::new(7)).await.unwrap(), lesson);
    let listed = repo.list_lessons().await.unwrap();
    assert_eq!(listed, vec![plain, lesson]);
    assert!(matches!(
        repo.get_lesson(LessonId::new(99)).await,
        Err(StorageError::NotFound)
    ));
}

#[tokio::test]
async fn sqlite_lesson_with_invalid_stored_exercise_is_rejected() {
    let repo = repo("memdb_bad_lesson").await;
    let exercises = r#"[{
        "id": 1,
        "word_id": "hallo",
        "kind": "multiple_choice",
        "prompt": "Pick the greeting",
        "correct_answer": "hello",
        "options": null
    }]"#;
    sqlx::query("INSERT INTO lessons (id, title, exercises) VALUES (?1, ?2, ?3)")
        .bind(5_i64)
        .bind("Broken")
        .bind(exercises)
        .execute(repo.pool())
        .await
        .unwrap();

    assert!(matches!(
        repo.get_lesson(LessonId::new(5)).await,
        Err(StorageError::Serialization(_))
    ));
}

#[tokio::test]
async fn sqlite_commit_review_persists_masteries_and_history() {
    let repo = repo("memdb_commit").await;
    let user = UserId::new("learner").unwrap();
    let now = fixed_now();
    let policy = MasteryPolicy::default();

    let mut mastery = policy.fresh(word_id("danke"));
    for _ in 0..3 {
        mastery = policy.update(mastery, 1.0, now).mastery;
    }
    assert_eq!(mastery.level(), MasteryLevel::Practicing);

    let result = ReviewResult::new(word_id("danke"), 0.5, now)
        .unwrap()
        .with_latency(Duration::from_millis(1_250))
        .with_attempts(2)
        .with_practiced([ExerciseType::Quiz, ExerciseType::Listening])
        .with_mistakes(["listening"])
        .unwrap()
        .with_reinforcement(true);

    repo.commit_review(&user, std::slice::from_ref(&mastery), std::slice::from_ref(&result))
        .await
        .unwrap();

    assert_eq!(repo.load_word_masteries(&user).await.unwrap(), vec![mastery]);
    assert_eq!(repo.load_review_history(&user).await.unwrap(), vec![result]);

    let other = UserId::new("someone-else").unwrap();
    assert!(repo.load_word_masteries(&other).await.unwrap().is_empty());
    assert!(repo.load_review_history(&other).await.unwrap().is_empty());
}

#[tokio::test]
async fn sqlite_history_is_returned_oldest_first() {
    let repo = repo("memdb_history").await;
    let user = UserId::new("learner").unwrap();
    let now = fixed_now();

    let later = ReviewResult::new(word_id("bitte"), 1.0, now).unwrap();
    let earlier = ReviewResult::new(word_id("bitte"), 0.0, now - ChronoDuration::days(2)).unwrap();
    repo.append_review_results(&user, std::slice::from_ref(&later))
        .await
        .unwrap();
    repo.append_review_results(&user, std::slice::from_ref(&earlier))
        .await
        .unwrap();

    let history = repo.load_review_history(&user).await.unwrap();
    assert_eq!(history, vec![earlier, later]);
}

#[tokio::test]
async fn sqlite_schedule_is_replaced_per_user() {
    let repo = repo("memdb_schedule").await;
    let user = UserId::new("learner").unwrap();
    let now = fixed_now();
    let policy = MasteryPolicy::default();
    let masteries = vec![policy.fresh(word_id("hallo")), policy.fresh(word_id("morgen"))];

    assert!(repo.load_schedule(&user).await.unwrap().is_none());

    let first = Scheduler::default()
        .compute_schedule(&masteries, &[], now)
        .schedule;
    repo.save_schedule(&user, &first).await.unwrap();

    let later = now + ChronoDuration::hours(6);
    let second = Scheduler::default()
        .compute_schedule(&masteries[..1], &[], later)
        .schedule;
    repo.save_schedule(&user, &second).await.unwrap();

    let loaded = repo.load_schedule(&user).await.unwrap().expect("schedule");
    assert_eq!(loaded.generated_at, later);
    assert_eq!(loaded.entries.len(), 1);
    assert_eq!(loaded.entries[0].word_id, word_id("hallo"));
    assert_eq!(
        loaded.batch.map(|batch| batch.words),
        Some(vec![word_id("hallo")])
    );
}
