// tests/conversation_flow.rs
//
// Drives `Intake` directly with fake collaborators.
//
// Covered:
// - first event of a new user always greets
// - unexpected input keeps the step and sends nothing
// - complaint -> location -> image yields 3 replies and one complaint
// - media failures keep the user at the image step; a retry succeeds
// - a store rejection still ends the conversation
// - image upload / image row failures do not undo a registration
// - categorization runs detached after registration
// - reply failures never block a transition
// - events for one user are handled one at a time
// - the closing reply is sent before the next conversation can start

mod common;

use std::sync::atomic::Ordering;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use tokio::sync::Notify;

use common::*;
use nirvana_intake::archive::ComplaintArchive;
use nirvana_intake::classify::{ComplaintCategory, DynCategorizer, LocalCategorizer, Priority};
use nirvana_intake::config::Replies;
use nirvana_intake::conversation::{Intake, Outcome, Step};
use nirvana_intake::error::IntakeResult;
use nirvana_intake::store::{ComplaintStore, MemoryStore};
use nirvana_intake::submit::{SubmissionResult, Submitter};
use nirvana_intake::whatsapp::Messenger;

fn intake(
    messenger: &Arc<RecordingMessenger>,
    store: Arc<dyn ComplaintStore>,
    categorizer: Option<DynCategorizer>,
) -> Intake {
    Intake::new(
        messenger.clone(),
        Submitter::new(store, categorizer),
        Replies::default(),
    )
}

/// Greet, then park the user at `AskImage` with the standard complaint.
async fn walk_to_image_step(bot: &Intake) {
    assert_eq!(bot.handle(&text(USER, "hi")).await, Outcome::Greeted);
    assert_eq!(
        bot.handle(&text(USER, "Garbage overflow")).await,
        Outcome::ComplaintRecorded
    );
    assert_eq!(
        bot.handle(&location(USER, 12.9, 77.6)).await,
        Outcome::LocationRecorded
    );
    assert_eq!(bot.conversations().step_of(USER), Some(Step::AskImage));
}

#[tokio::test]
async fn first_event_greets_whatever_its_kind() {
    let messenger = RecordingMessenger::new();
    let bot = intake(&messenger, Arc::new(MemoryStore::new()), None);

    // an image from a brand-new user is only greeted, never fetched
    assert_eq!(bot.handle(&image(USER, "m-1")).await, Outcome::Greeted);
    assert_eq!(messenger.lookups.load(Ordering::SeqCst), 0);
    assert_eq!(messenger.replies_to(USER), vec![Replies::default().greeting]);
    assert_eq!(bot.conversations().step_of(USER), Some(Step::AskComplaint));
}

#[tokio::test]
async fn unexpected_input_is_ignored_without_reply() {
    let messenger = RecordingMessenger::new();
    let bot = intake(&messenger, Arc::new(MemoryStore::new()), None);
    bot.handle(&text(USER, "hi")).await;

    // location while a complaint text is expected
    assert_eq!(bot.handle(&location(USER, 1.0, 2.0)).await, Outcome::Ignored);
    // image while a complaint text is expected
    assert_eq!(bot.handle(&image(USER, "m-1")).await, Outcome::Ignored);

    assert_eq!(messenger.replies_to(USER).len(), 1, "only the greeting");
    assert_eq!(bot.conversations().step_of(USER), Some(Step::AskComplaint));
    assert_eq!(messenger.lookups.load(Ordering::SeqCst), 0);
}

#[tokio::test]
async fn full_script_registers_one_complaint() {
    let messenger = RecordingMessenger::new();
    let store = Arc::new(MemoryStore::new());
    let bot = intake(&messenger, store.clone(), None);

    walk_to_image_step(&bot).await;
    let outcome = bot.handle(&image(USER, "m-1")).await;

    let Outcome::Submitted(SubmissionResult::Registered { complaint_id }) = outcome else {
        panic!("expected a registered complaint, got {outcome:?}");
    };

    let replies = messenger.replies_to(USER);
    let defaults = Replies::default();
    // greeting + the three replies of the script
    assert_eq!(replies.len(), 4);
    assert_eq!(replies[1], defaults.ask_location);
    assert_eq!(replies[2], defaults.ask_image);
    assert_eq!(replies[3], defaults.registered_with(&complaint_id));
    assert!(replies[3].contains(&complaint_id));

    assert_eq!(bot.conversations().step_of(USER), None, "state cleared");
    assert_eq!(bot.conversations().active(), 0);

    let complaints = store.complaints();
    assert_eq!(complaints.len(), 1);
    let row = &complaints[0].record;
    assert_eq!(complaints[0].id, complaint_id);
    assert_eq!(row.description, "Garbage overflow");
    assert_eq!(row.location, "12.9, 77.6");
    assert_eq!(row.latitude, 12.9);
    assert_eq!(row.longitude, 77.6);

    let profiles = store.profiles();
    assert_eq!(profiles.len(), 1);
    assert_eq!(profiles[0].phone, USER);
    assert_eq!(profiles[0].full_name.as_deref(), Some("Asha"));
    assert_eq!(row.citizen_id, profiles[0].id);

    let images = store.images();
    assert_eq!(images.len(), 1);
    let object = images[0].image_url.trim_start_matches("memory://");
    assert_eq!(store.object(object).as_deref(), Some(PHOTO));
}

#[tokio::test]
async fn next_message_after_completion_starts_over() {
    let messenger = RecordingMessenger::new();
    let store = Arc::new(MemoryStore::new());
    let bot = intake(&messenger, store.clone(), None);

    walk_to_image_step(&bot).await;
    bot.handle(&image(USER, "m-1")).await;
    assert_eq!(bot.handle(&text(USER, "another one")).await, Outcome::Greeted);

    // the returning citizen keeps a single profile
    walk_to_image_step_after_greet(&bot).await;
    bot.handle(&image(USER, "m-2")).await;
    assert_eq!(store.profiles().len(), 1);
    assert_eq!(store.complaints().len(), 2);
}

async fn walk_to_image_step_after_greet(bot: &Intake) {
    bot.handle(&text(USER, "Pothole on main road")).await;
    bot.handle(&location(USER, 12.0, 77.0)).await;
}

#[tokio::test]
async fn media_lookup_failure_keeps_waiting_for_image() {
    let messenger = RecordingMessenger::new();
    let store = Arc::new(MemoryStore::new());
    let bot = intake(&messenger, store.clone(), None);
    walk_to_image_step(&bot).await;

    messenger.fail_next_lookups(1);
    assert_eq!(bot.handle(&image(USER, "m-1")).await, Outcome::MediaLookupFailed);
    assert_eq!(
        messenger.replies_to(USER).last(),
        Some(&Replies::default().media_lookup_failed)
    );
    assert_eq!(bot.conversations().step_of(USER), Some(Step::AskImage));
    assert!(store.complaints().is_empty());

    // retry goes through with the draft intact
    let outcome = bot.handle(&image(USER, "m-1")).await;
    assert!(matches!(
        outcome,
        Outcome::Submitted(SubmissionResult::Registered { .. })
    ));
    assert_eq!(store.complaints()[0].record.description, "Garbage overflow");
}

#[tokio::test]
async fn media_download_failure_keeps_waiting_for_image() {
    let messenger = RecordingMessenger::new();
    let store = Arc::new(MemoryStore::new());
    let bot = intake(&messenger, store.clone(), None);
    walk_to_image_step(&bot).await;

    messenger.fail_next_downloads(1);
    assert_eq!(bot.handle(&image(USER, "m-1")).await, Outcome::MediaDownloadFailed);
    assert_eq!(
        messenger.replies_to(USER).last(),
        Some(&Replies::default().media_download_failed)
    );
    assert_eq!(bot.conversations().step_of(USER), Some(Step::AskImage));
    assert!(store.complaints().is_empty());
}

#[tokio::test]
async fn store_rejection_ends_conversation_without_id() {
    let messenger = RecordingMessenger::new();
    let store = Arc::new(RejectingStore::default());
    let bot = intake(&messenger, store.clone(), None);
    walk_to_image_step(&bot).await;

    let outcome = bot.handle(&image(USER, "m-1")).await;
    assert_eq!(outcome, Outcome::Submitted(SubmissionResult::Failed));
    assert_eq!(
        messenger.replies_to(USER).last(),
        Some(&Replies::default().registration_failed)
    );
    assert_eq!(bot.conversations().step_of(USER), None);
    assert!(store.inner.images().is_empty());
}

#[tokio::test]
async fn image_upload_failure_still_registers() {
    let messenger = RecordingMessenger::new();
    let store = Arc::new(ImageFailingStore::default());
    let bot = intake(&messenger, store.clone(), None);
    walk_to_image_step(&bot).await;

    let outcome = bot.handle(&image(USER, "m-1")).await;
    let Outcome::Submitted(SubmissionResult::Registered { complaint_id }) = outcome else {
        panic!("expected registration despite upload failure, got {outcome:?}");
    };
    assert_eq!(store.inner.complaints().len(), 1);
    assert!(store.inner.images().is_empty());
    assert_eq!(
        messenger.replies_to(USER).last(),
        Some(&Replies::default().registered_with(&complaint_id))
    );
    assert_eq!(bot.conversations().step_of(USER), None);
}

#[tokio::test]
async fn image_record_failure_still_registers() {
    let messenger = RecordingMessenger::new();
    let store = Arc::new(ImageFailingStore {
        fail_record: true,
        ..Default::default()
    });
    let bot = intake(&messenger, store.clone(), None);
    walk_to_image_step(&bot).await;

    let outcome = bot.handle(&image(USER, "m-1")).await;
    assert!(matches!(
        outcome,
        Outcome::Submitted(SubmissionResult::Registered { .. })
    ));
    assert_eq!(store.inner.complaints().len(), 1);
    assert!(store.inner.images().is_empty());
}

#[tokio::test]
async fn categorization_runs_after_registration() {
    let messenger = RecordingMessenger::new();
    let (categorizer, mut calls) = ChannelCategorizer::new();
    let bot = intake(&messenger, Arc::new(MemoryStore::new()), Some(categorizer as DynCategorizer));
    walk_to_image_step(&bot).await;

    let outcome = bot.handle(&image(USER, "m-1")).await;
    let Outcome::Submitted(SubmissionResult::Registered { complaint_id }) = outcome else {
        panic!("expected registration, got {outcome:?}");
    };

    let (id, title, body) = tokio::time::timeout(Duration::from_secs(2), calls.recv())
        .await
        .expect("categorizer called in time")
        .expect("channel open");
    assert_eq!(id, complaint_id);
    assert_eq!(title, "WhatsApp complaint");
    assert_eq!(body, "Garbage overflow");
}

#[tokio::test]
async fn local_categorizer_writes_prediction_back() {
    let messenger = RecordingMessenger::new();
    let store = Arc::new(MemoryStore::new());
    let categorizer: DynCategorizer = Arc::new(LocalCategorizer::new(store.clone()));
    let bot = intake(&messenger, store.clone(), Some(categorizer));
    walk_to_image_step(&bot).await;
    bot.handle(&image(USER, "m-1")).await;

    let prediction = tokio::time::timeout(Duration::from_secs(2), async {
        loop {
            if let Some(p) = store.complaints()[0].prediction.clone() {
                return p;
            }
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
    })
    .await
    .expect("prediction written");

    assert_eq!(prediction.category, ComplaintCategory::Sanitation);
    assert_eq!(prediction.priority, Priority::Medium);
}

#[tokio::test]
async fn failed_replies_do_not_block_transitions() {
    let messenger = RecordingMessenger::new();
    messenger.fail_sends.store(true, Ordering::SeqCst);
    let store = Arc::new(MemoryStore::new());
    let bot = intake(&messenger, store.clone(), None);

    walk_to_image_step(&bot).await;
    let outcome = bot.handle(&image(USER, "m-1")).await;
    assert!(matches!(
        outcome,
        Outcome::Submitted(SubmissionResult::Registered { .. })
    ));
    assert_eq!(store.complaints().len(), 1);
    assert_eq!(messenger.reply_count(), 4, "every reply was attempted");
}

#[tokio::test]
async fn completed_draft_is_archived() {
    let dir = tempfile::tempdir().unwrap();
    let messenger = RecordingMessenger::new();
    let bot = intake(&messenger, Arc::new(MemoryStore::new()), None)
        .with_archive(ComplaintArchive::new(dir.path()));
    walk_to_image_step(&bot).await;
    bot.handle(&image(USER, "m-1")).await;

    let folders: Vec<_> = std::fs::read_dir(dir.path())
        .unwrap()
        .map(|e| e.unwrap().path())
        .collect();
    assert_eq!(folders.len(), 1);
    let name = folders[0].file_name().unwrap().to_string_lossy().to_string();
    assert!(name.starts_with(&format!("{USER}_")), "folder {name}");
    assert_eq!(std::fs::read(folders[0].join("image.jpg")).unwrap(), PHOTO);
    assert!(folders[0].join("data.json").exists());
}

#[tokio::test]
async fn same_user_events_are_serialized() {
    let messenger = RecordingMessenger::new();
    let bot = Arc::new(intake(&messenger, Arc::new(MemoryStore::new()), None));

    // two deliveries racing for a brand-new user: one greets, the other
    // must see the updated step instead of greeting again
    let a = tokio::spawn({
        let bot = bot.clone();
        async move { bot.handle(&text(USER, "Broken streetlight")).await }
    });
    let b = tokio::spawn({
        let bot = bot.clone();
        async move { bot.handle(&text(USER, "Broken streetlight")).await }
    });
    let mut outcomes = vec![a.await.unwrap(), b.await.unwrap()];
    outcomes.sort_by_key(|o| format!("{o:?}"));

    assert_eq!(outcomes, vec![Outcome::ComplaintRecorded, Outcome::Greeted]);
    assert_eq!(bot.conversations().step_of(USER), Some(Step::AskLocation));
}

#[tokio::test]
async fn users_do_not_share_state() {
    let messenger = RecordingMessenger::new();
    let bot = intake(&messenger, Arc::new(MemoryStore::new()), None);
    let other = "447700900123";

    walk_to_image_step(&bot).await;
    assert_eq!(bot.handle(&text(other, "hello")).await, Outcome::Greeted);
    assert_eq!(bot.conversations().step_of(USER), Some(Step::AskImage));
    assert_eq!(bot.conversations().step_of(other), Some(Step::AskComplaint));
    assert_eq!(bot.conversations().active(), 2);
}

/// Holds back any reply containing `hold` until `release` fires.
struct GatedMessenger {
    inner: Arc<RecordingMessenger>,
    hold: &'static str,
    reached: Notify,
    release: Notify,
}

#[async_trait]
impl Messenger for GatedMessenger {
    async fn send_text(&self, to: &str, body: &str) -> IntakeResult<()> {
        if body.contains(self.hold) {
            self.reached.notify_one();
            self.release.notified().await;
        }
        self.inner.send_text(to, body).await
    }

    async fn media_url(&self, media_id: &str) -> IntakeResult<String> {
        self.inner.media_url(media_id).await
    }

    async fn download_media(&self, url: &str) -> IntakeResult<Vec<u8>> {
        self.inner.download_media(url).await
    }

    fn name(&self) -> &'static str {
        "gated"
    }
}

#[tokio::test]
async fn closing_reply_precedes_next_greeting() {
    let recorder = RecordingMessenger::new();
    let gated = Arc::new(GatedMessenger {
        inner: recorder.clone(),
        hold: "registered with ID",
        reached: Notify::new(),
        release: Notify::new(),
    });
    let bot = Arc::new(Intake::new(
        gated.clone(),
        Submitter::new(Arc::new(MemoryStore::new()), None),
        Replies::default(),
    ));
    walk_to_image_step(&bot).await;

    let finishing = tokio::spawn({
        let bot = bot.clone();
        async move { bot.handle(&image(USER, "m-1")).await }
    });
    gated.reached.notified().await;

    // a new message arrives while the confirmation is still in flight
    let next = tokio::spawn({
        let bot = bot.clone();
        async move { bot.handle(&text(USER, "hi again")).await }
    });
    tokio::time::sleep(Duration::from_millis(50)).await;
    assert_eq!(recorder.replies_to(USER).len(), 3, "greeting sent before confirmation");

    gated.release.notify_one();
    assert!(matches!(
        finishing.await.unwrap(),
        Outcome::Submitted(SubmissionResult::Registered { .. })
    ));
    assert_eq!(next.await.unwrap(), Outcome::Greeted);

    let replies = recorder.replies_to(USER);
    assert_eq!(replies.len(), 5);
    assert!(replies[3].contains("registered with ID"), "{}", replies[3]);
    assert_eq!(replies[4], Replies::default().greeting);
    assert_eq!(bot.conversations().step_of(USER), Some(Step::AskComplaint));
}
