mod common;

use chrono::{Duration, Timelike, Utc};
use common::{TestWorld, four_question_lesson, pairs_answer, pairs_question};
use uuid::Uuid;

use owlet_api::error::ApiError;
use owlet_db::models::{ActivityKind, Learner, ReviewItem};
use owlet_db::store::EngineStore;

async fn seed_item(world: &TestWorld, learner: Learner, box_no: i16, due_in_hours: i64) -> Uuid {
    let question_id = Uuid::new_v4();
    let item = ReviewItem::new(
        learner,
        question_id,
        box_no,
        Utc::now() + Duration::hours(due_in_hours),
        0,
        None,
    );
    assert!(world.store.insert_review_item_if_absent(&item).await.unwrap());
    question_id
}

#[tokio::test]
async fn queue_returns_due_items_oldest_first_and_excludes_future() {
    let world = TestWorld::new();
    let guardian = Uuid::new_v4();
    let learner = Learner::Account(guardian);

    // Give every item real content so enrichment keeps it
    let (lesson, ids) = four_question_lesson();
    world.store.insert_lesson(lesson);

    let now = Utc::now();
    for (question_id, hours) in [(ids[0], -2), (ids[1], -1), (ids[2], 1)] {
        let item = ReviewItem::new(learner, question_id, 2, now + Duration::hours(hours), 0, None);
        assert!(world.store.insert_review_item_if_absent(&item).await.unwrap());
    }

    let queue = world.reviews().queue(guardian, None, None).await.unwrap();

    assert_eq!(queue.total_due, 2);
    assert_eq!(queue.items.len(), 2);
    assert_eq!(queue.items[0].question_id, ids[0]);
    assert_eq!(queue.items[1].question_id, ids[1]);
    assert!(queue.items[0].due_at <= queue.items[1].due_at);

    // Enrichment carries the display context
    assert_eq!(queue.items[0].lesson_title, "Animals 1");
    assert!(!queue.items[0].prompt.is_empty());

    // Histogram counts every item, due or not
    assert_eq!(queue.boxes.box2, 3);
    assert_eq!(queue.boxes.box1, 0);
}

#[tokio::test]
async fn queue_limit_is_clamped_and_total_due_ignores_it() {
    let world = TestWorld::new();
    let guardian = Uuid::new_v4();
    let learner = Learner::Account(guardian);

    let (lesson, ids) = four_question_lesson();
    world.store.insert_lesson(lesson);

    for question_id in &ids[..3] {
        let item = ReviewItem::new(learner, *question_id, 1, Utc::now() - Duration::hours(1), 0, None);
        assert!(world.store.insert_review_item_if_absent(&item).await.unwrap());
    }

    let queue = world.reviews().queue(guardian, None, Some(2)).await.unwrap();
    assert_eq!(queue.items.len(), 2);
    assert_eq!(queue.total_due, 3);

    // limit 0 clamps up to 1
    let queue = world.reviews().queue(guardian, None, Some(0)).await.unwrap();
    assert_eq!(queue.items.len(), 1);
}

#[tokio::test]
async fn queue_drops_items_whose_content_is_gone() {
    let world = TestWorld::new();
    let guardian = Uuid::new_v4();
    let learner = Learner::Account(guardian);

    // One item with content, one orphaned
    let pairs = pairs_question("Match the animals", &[("cat", "gato")]);
    let pairs_id = pairs.id;
    let lesson = common::LessonBuilder::new("Matching")
        .activity(ActivityKind::MatchPairs, vec![pairs])
        .build();
    world.store.insert_lesson(lesson);

    for question_id in [pairs_id, Uuid::new_v4()] {
        let item = ReviewItem::new(learner, question_id, 1, Utc::now() - Duration::hours(1), 0, None);
        assert!(world.store.insert_review_item_if_absent(&item).await.unwrap());
    }

    let queue = world.reviews().queue(guardian, None, None).await.unwrap();
    assert_eq!(queue.items.len(), 1);
    assert_eq!(queue.items[0].question_id, pairs_id);
    assert_eq!(queue.items[0].activity_kind, ActivityKind::MatchPairs);
    // The orphan still exists as far as counts are concerned
    assert_eq!(queue.total_due, 2);
}

#[tokio::test]
async fn queue_is_scoped_to_the_learner() {
    let world = TestWorld::new();
    let guardian = Uuid::new_v4();
    let child = Uuid::new_v4();
    world.store.insert_child(child, guardian);

    seed_item(&world, Learner::Account(guardian), 1, -1).await;
    seed_item(&world, Learner::Child(child), 1, -1).await;
    seed_item(&world, Learner::Child(child), 2, -1).await;

    let own = world.reviews().queue(guardian, None, None).await.unwrap();
    assert_eq!(own.total_due, 1);

    let childs = world.reviews().queue(guardian, Some(child), None).await.unwrap();
    assert_eq!(childs.total_due, 2);

    // A stranger cannot read the child's queue
    let err = world
        .reviews()
        .queue(Uuid::new_v4(), Some(child), None)
        .await
        .unwrap_err();
    assert!(matches!(err, ApiError::Auth(_)), "got {err:?}");
}

#[tokio::test]
async fn grading_good_moves_up_and_schedules_double_the_box() {
    let world = TestWorld::new();
    let guardian = Uuid::new_v4();
    let learner = Learner::Account(guardian);

    let question_id = seed_item(&world, learner, 3, -1).await;

    let graded = world
        .reviews()
        .grade(guardian, None, question_id, 2)
        .await
        .unwrap();

    assert_eq!(graded.box_no, 4);
    assert_eq!(graded.lapses, 0);
    assert_eq!(graded.last_grade, 2);

    // Due 8 days out (4 × 2), pinned to 09:00
    let expected = owlet_srs::due_after(Utc::now(), 8);
    assert_eq!(graded.due_at, expected);
    assert_eq!(graded.due_at.hour(), 9);

    // The item itself was rescheduled, so nothing is due any more
    assert_eq!(graded.remaining_due, 0);

    let item = world.store.review_item(learner, question_id).await.unwrap().unwrap();
    assert_eq!(item.box_no, 4);
    assert_eq!(item.last_grade, Some(2));
}

#[tokio::test]
async fn grading_again_resets_to_box_one_and_counts_a_lapse() {
    let world = TestWorld::new();
    let guardian = Uuid::new_v4();
    let learner = Learner::Account(guardian);

    let question_id = seed_item(&world, learner, 4, -1).await;

    let graded = world
        .reviews()
        .grade(guardian, None, question_id, 0)
        .await
        .unwrap();

    assert_eq!(graded.box_no, 1);
    assert_eq!(graded.lapses, 1);
    assert_eq!(graded.due_at, owlet_srs::due_after(Utc::now(), 1));
}

#[tokio::test]
async fn grading_into_box_five_reports_mastery() {
    let world = TestWorld::new();
    let guardian = Uuid::new_v4();
    let learner = Learner::Account(guardian);

    let question_id = seed_item(&world, learner, 4, -1).await;

    let graded = world
        .reviews()
        .grade(guardian, None, question_id, 2)
        .await
        .unwrap();

    assert_eq!(graded.box_no, 5);
    assert!(graded.feedback.to_lowercase().contains("master"));
}

#[tokio::test]
async fn grading_decrements_the_remaining_due_count() {
    let world = TestWorld::new();
    let guardian = Uuid::new_v4();
    let learner = Learner::Account(guardian);

    let first = seed_item(&world, learner, 2, -2).await;
    seed_item(&world, learner, 2, -1).await;

    let graded = world.reviews().grade(guardian, None, first, 3).await.unwrap();
    assert_eq!(graded.remaining_due, 1);
}

#[tokio::test]
async fn grade_values_outside_the_scale_are_rejected() {
    let world = TestWorld::new();
    let guardian = Uuid::new_v4();
    let learner = Learner::Account(guardian);

    let question_id = seed_item(&world, learner, 2, -1).await;

    for bad in [-1, 4, 9] {
        let err = world
            .reviews()
            .grade(guardian, None, question_id, bad)
            .await
            .unwrap_err();
        assert!(matches!(err, ApiError::Validation(_)), "grade {bad}: {err:?}");
    }

    // Nothing was persisted by the rejected grades
    let item = world.store.review_item(learner, question_id).await.unwrap().unwrap();
    assert_eq!(item.box_no, 2);
    assert_eq!(item.last_grade, None);
}

#[tokio::test]
async fn grading_a_question_without_an_item_is_not_found() {
    let world = TestWorld::new();
    let guardian = Uuid::new_v4();

    let err = world
        .reviews()
        .grade(guardian, None, Uuid::new_v4(), 2)
        .await
        .unwrap_err();
    assert!(matches!(err, ApiError::NotFound(_)), "got {err:?}");
}

#[tokio::test]
async fn a_pairs_answer_feeds_the_same_review_loop() {
    // End to end: miss a pairs question in a lesson, find it in the
    // queue, grade it back up.
    let world = TestWorld::new();
    let guardian = Uuid::new_v4();
    let learner = Learner::Account(guardian);

    let question = pairs_question("Match!", &[("cat", "gato"), ("dog", "perro")]);
    let question_id = question.id;
    let lesson = common::LessonBuilder::new("Matching")
        .activity(ActivityKind::MatchPairs, vec![question])
        .build();
    let lesson_id = lesson.id;
    world.store.insert_lesson(lesson);

    let attempts = world.attempts();
    let started = attempts.start(guardian, lesson_id, None).await.unwrap();
    attempts
        .submit_answers(
            guardian,
            started.attempt_id,
            vec![pairs_answer(question_id, &[("cat", "perro"), ("dog", "gato")])],
        )
        .await
        .unwrap();
    attempts.finish(guardian, started.attempt_id).await.unwrap();

    // Seeded as a miss: box 1, lapse 1, due tomorrow — not due yet today
    let item = world.store.review_item(learner, question_id).await.unwrap().unwrap();
    assert_eq!(item.box_no, 1);
    assert_eq!(item.lapses, 1);

    // Fast-forward: make it due now, then grade it Good
    world
        .store
        .update_review_item(
            learner,
            question_id,
            item.box_no,
            Utc::now() - Duration::hours(1),
            item.lapses,
            item.last_grade,
        )
        .await
        .unwrap();

    let queue = world.reviews().queue(guardian, None, None).await.unwrap();
    assert_eq!(queue.items.len(), 1);

    let graded = world
        .reviews()
        .grade(guardian, None, question_id, 2)
        .await
        .unwrap();
    assert_eq!(graded.box_no, 2);
    assert_eq!(graded.lapses, 1);
}
