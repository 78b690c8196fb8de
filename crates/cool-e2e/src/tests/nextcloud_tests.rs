use super::fake::Event;
use super::session_with;
use crate::config::Integration;
use crate::document::TestState;
use crate::frame::{FrameScope, RICHDOCUMENTS_FRAME};
use crate::nextcloud::FILES_APP_URL;
use std::path::PathBuf;
use std::time::Duration;
use tokio::time::Instant;

const ROW: &str = "tr[data-file='simple.odt']";

#[tokio::test(start_paused = true)]
async fn load_uploads_opens_and_switches_into_the_document_frame() {
    let (fake, mut session) = session_with(Integration::Nextcloud);
    fake.with(|s| {
        s.add("input#user");
        s.add("input#password");
        s.add("input#submit-form");
        s.add(".button.new");
        s.add("#free_space").attr("value", "1073741824");
        s.add("#firstrunwizard");
        s.add("input#file_upload_start").hidden();
        s.add(RICHDOCUMENTS_FRAME);
        s.add(".leaflet-tile-loaded").in_scope(FrameScope::Leaflet);
    });
    fake.on_event(|event, s| {
        if let Event::Attach { .. } = event {
            s.add(ROW);
        }
    });

    let start = Instant::now();
    session
        .load_test_doc("simple.odt", Some("writer"), false, false)
        .await
        .unwrap();

    assert_eq!(session.frame(), FrameScope::Leaflet);
    // Wizard grace period plus the wait for the frames to settle.
    assert!(start.elapsed() >= Duration::from_secs(12));

    let events = fake.events();
    assert_eq!(events[0], Event::IgnoreExceptions);
    assert_eq!(events[1], Event::Visit(FILES_APP_URL.to_string()));
    assert!(events.contains(&Event::Hide("#firstrunwizard".to_string())));
    assert!(events.contains(&Event::Attach {
        selector: "input#file_upload_start".to_string(),
        path: PathBuf::from("/data/desktop/writer/simple.odt"),
    }));
    assert_eq!(events.last(), Some(&Event::Click(ROW.to_string())));
}

#[tokio::test(start_paused = true)]
async fn subsequent_load_skips_login_and_cleanup() {
    let (fake, session) = session_with(Integration::Nextcloud);
    fake.with(|s| {
        s.user_agent = "cypress-mobile".to_string();
        s.add("#free_space").attr("value", "1");
        s.add("input#file_upload_start");
        s.add("#fileList tr");
    });
    fake.on_event(|event, s| {
        if let Event::Attach { .. } = event {
            s.add(ROW);
        }
    });

    session
        .upload_file_to_nextcloud("simple.odt", None, true)
        .await
        .unwrap();

    let events = fake.events();
    assert!(!events
        .iter()
        .any(|e| matches!(e, Event::Click(_) | Event::Clear(_))));
    assert!(events.contains(&Event::Attach {
        selector: "input#file_upload_start".to_string(),
        path: PathBuf::from("/data/mobile/simple.odt"),
    }));
}

#[tokio::test(start_paused = true)]
async fn first_load_empties_the_file_list() {
    let (fake, session) = session_with(Integration::Nextcloud);
    fake.with(|s| {
        s.add("input#user");
        s.add("input#password");
        s.add("input#submit-form");
        s.add(".button.new");
        s.add("#free_space").attr("value", "1");
        s.add("input#file_upload_start");
        s.add("#fileList tr").also("#fileList tr:nth-of-type(1) .action-menu.permanent");
        s.add("#fileList tr").also("#fileList tr:nth-of-type(1) .action-menu.permanent");
        s.add(".menuitem.action.action-delete.permanent");
    });
    fake.on_event(|event, s| match event {
        Event::Click(selector) if selector == ".menuitem.action.action-delete.permanent" => {
            let first = s.node("#fileList tr");
            first.connected = false;
        }
        Event::Attach { .. } => {
            s.add(ROW);
        }
        _ => {}
    });

    session
        .upload_file_to_nextcloud("simple.odt", None, false)
        .await
        .unwrap();

    let deletes = fake
        .events()
        .iter()
        .filter(|e| **e == Event::Click(".menuitem.action.action-delete.permanent".to_string()))
        .count();
    assert_eq!(deletes, 2);
    assert_eq!(fake.with(|s| s.count("#fileList tr")), 0);
}

#[tokio::test(start_paused = true)]
async fn after_passed_test_closes_and_deletes_the_document() {
    let (fake, mut session) = session_with(Integration::Nextcloud);
    session.set_frame(FrameScope::Leaflet);
    fake.with(|s| {
        s.add("#closebutton").in_scope(FrameScope::Leaflet);
        s.add("#filestable");
        s.add(ROW).also("tr[data-file='simple.odt'] .action-menu.permanent");
        s.add(".menuitem.action.action-delete.permanent");
    });
    fake.on_event(|event, s| {
        if *event == Event::Click(".menuitem.action.action-delete.permanent".to_string()) {
            s.remove(ROW);
        }
    });

    session
        .after_all("simple.odt", TestState::Passed)
        .await
        .unwrap();

    assert_eq!(session.frame(), FrameScope::Top);
    assert_eq!(
        fake.events(),
        vec![
            Event::Click("#closebutton".to_string()),
            Event::Click("tr[data-file='simple.odt'] .action-menu.permanent".to_string()),
            Event::Click(".menuitem.action.action-delete.permanent".to_string()),
        ]
    );
}

#[tokio::test(start_paused = true)]
async fn after_failed_test_only_resets_the_frame() {
    let (fake, mut session) = session_with(Integration::Nextcloud);
    session.set_frame(FrameScope::Leaflet);

    session
        .after_all("simple.odt", TestState::Failed)
        .await
        .unwrap();

    assert_eq!(session.frame(), FrameScope::Top);
    assert!(fake.events().is_empty());
}
